use serde::Serialize;

use docket_core::render::AgendaView;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String, emoji: bool },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into(), emoji: true }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text, .. } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header { block_id: String, text: TextObject },
    Section { block_id: String, text: TextObject },
    Context { block_id: String, elements: Vec<TextObject> },
}

/// Legacy colored attachment; Slack still renders the side bar color only
/// through attachments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub text: String,
    pub color: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl MessageTemplate {
    /// A message carrying only fallback text.
    pub fn text(text: impl Into<String>) -> Self {
        Self { fallback_text: text.into(), blocks: Vec::new(), attachments: Vec::new() }
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
    attachments: Vec<Attachment>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new(), attachments: Vec::new() }
    }

    pub fn header(mut self, block_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Header { block_id: block_id.into(), text: TextObject::plain(text) });
        self
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn attachment(mut self, text: impl Into<String>, color: impl Into<String>) -> Self {
        self.attachments.push(Attachment { text: text.into(), color: color.into() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate {
            fallback_text: self.fallback_text,
            blocks: self.blocks,
            attachments: self.attachments,
        }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// Fallback text used when the agenda is posted to a channel.
pub const AGENDA_FALLBACK_TEXT: &str = "Agenda Items";

pub fn agenda_message(view: &AgendaView) -> MessageTemplate {
    view.entries
        .iter()
        .fold(
            MessageBuilder::new(AGENDA_FALLBACK_TEXT).header("agenda.list.header.v1", &view.header),
            |builder, entry| builder.attachment(&entry.text, entry.color.hex()),
        )
        .build()
}

/// One line per command, in menu order.
const HELP_ENTRIES: &[(&str, &str)] = &[
    (
        "additem",
        "*/additem* - adds an agenda item with an importance level, and optional additional info such as a description, due date, and assignees",
    ),
    ("remitem", "*/remitem* - removes an agenda item"),
    (
        "listitems",
        "*/listitems* - lists all agenda items in order of importance and then in insertion order",
    ),
    ("clearitems", "*/clearitems* - clears all agenda items"),
    (
        "update",
        "*/update* - updates an agenda item's name, importance, description, due date, or assignees",
    ),
    ("help", "*/help* - lists all commands and their descriptions"),
];

/// Full help menu, or the single entry named by `topic`. A leading `/` on the
/// topic is ignored.
pub fn help_message(topic: Option<&str>) -> MessageTemplate {
    let topic = topic.map(|raw| raw.trim().trim_start_matches('/')).filter(|raw| !raw.is_empty());
    let text = match topic {
        None => HELP_ENTRIES.iter().map(|(_, line)| *line).collect::<Vec<_>>().join("\n"),
        Some(topic) => HELP_ENTRIES
            .iter()
            .find(|(name, _)| *name == topic)
            .map(|(_, line)| (*line).to_owned())
            .unwrap_or_else(|| format!("invalid command: {topic}")),
    };

    MessageBuilder::new("Help Menu:")
        .header("agenda.help.header.v1", "Help Menu:")
        .section("agenda.help.body.v1", |section| {
            section.mrkdwn(text);
        })
        .build()
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("agenda.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {summary}"));
        })
        .context("agenda.error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}
