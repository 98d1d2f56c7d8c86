use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use docket_core::domain::item::{mention_list, AgendaItem, ItemField, ItemFields, UpdateValue};
use docket_core::errors::{AgendaError, ApplicationError};
use docket_core::render::{display_due_date, render_agenda};

use crate::blocks::{self, MessageTemplate};
use crate::modals::{
    self, FieldValue, ModalError, ModalView, ReplyTarget, ViewState, FIELD_BLOCK, NAME_BLOCK,
    SELECT_FIELD_ERROR,
};

pub const NAME_REQUIRED_ERROR: &str = "Please enter an item name";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub trigger_id: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgendaCommand {
    AddItem,
    RemoveItem,
    ListItems,
    ClearItems,
    Update,
    Help { topic: Option<String> },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error(transparent)]
    Modal(#[from] ModalError),
    #[error("unsupported view callback: {0}")]
    UnsupportedCallback(String),
}

/// Maps a slash command onto the agenda command it names. Any text after
/// `/help` selects a single help topic; other commands ignore their text.
pub fn normalize_agenda_command(
    payload: &SlashCommandPayload,
) -> Result<AgendaCommand, CommandParseError> {
    let command = payload.command.trim().trim_start_matches('/').to_ascii_lowercase();
    match command.as_str() {
        "additem" => Ok(AgendaCommand::AddItem),
        "remitem" => Ok(AgendaCommand::RemoveItem),
        "listitems" => Ok(AgendaCommand::ListItems),
        "clearitems" => Ok(AgendaCommand::ClearItems),
        "update" => Ok(AgendaCommand::Update),
        "help" => {
            let topic = payload.text.split_whitespace().next().map(str::to_owned);
            Ok(AgendaCommand::Help { topic })
        }
        _ => Err(CommandParseError::UnsupportedCommand(payload.command.clone())),
    }
}

/// Body of the acknowledgement returned to Slack for an envelope.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AckPayload {
    #[default]
    Empty,
    /// Keeps a modal open and shows an error under each named block.
    ViewErrors(BTreeMap<String, String>),
}

impl AckPayload {
    pub fn view_error(block_id: &str, message: &str) -> Self {
        Self::ViewErrors(BTreeMap::from([(block_id.to_owned(), message.to_owned())]))
    }

    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            Self::Empty => None,
            Self::ViewErrors(errors) => Some(serde_json::json!({
                "response_action": "errors",
                "errors": errors,
            })),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub channel_id: String,
    /// Set for replies only the named user should see.
    pub ephemeral_to: Option<String>,
    pub message: MessageTemplate,
}

impl Reply {
    pub fn in_channel(channel_id: impl Into<String>, message: MessageTemplate) -> Self {
        Self { channel_id: channel_id.into(), ephemeral_to: None, message }
    }

    pub fn ephemeral(
        channel_id: impl Into<String>,
        user_id: impl Into<String>,
        message: MessageTemplate,
    ) -> Self {
        Self { channel_id: channel_id.into(), ephemeral_to: Some(user_id.into()), message }
    }

    fn to_target(target: &ReplyTarget, text: String) -> Self {
        Self::ephemeral(&target.channel, &target.sender, MessageTemplate::text(text))
    }
}

/// Web API call to perform after the envelope has been acknowledged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    PostMessage(Reply),
    OpenView { trigger_id: String, view: ModalView },
    UpdateView { view_id: String, hash: Option<String>, view: ModalView },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Response {
    pub ack: AckPayload,
    pub effects: Vec<Effect>,
}

impl Response {
    pub fn ack_only() -> Self {
        Self::default()
    }

    pub fn with_effect(effect: Effect) -> Self {
        Self { ack: AckPayload::Empty, effects: vec![effect] }
    }

    pub fn reply(reply: Reply) -> Self {
        Self::with_effect(Effect::PostMessage(reply))
    }

    pub fn view_error(block_id: &str, message: &str) -> Self {
        Self { ack: AckPayload::view_error(block_id, message), effects: Vec::new() }
    }
}

/// Agenda operations the command layer needs. Failures carry the reason
/// shown back to the user.
#[async_trait]
pub trait AgendaCommandService: Send + Sync {
    async fn add_item(&self, fields: ItemFields, assignees: Vec<String>)
        -> Result<(), AgendaError>;

    async fn remove_item(&self, name: &str) -> Result<(), AgendaError>;

    async fn update_item(
        &self,
        name: &str,
        field: ItemField,
        value: UpdateValue,
    ) -> Result<(), AgendaError>;

    async fn list_items(&self, sorted: bool) -> Result<Vec<AgendaItem>, AgendaError>;

    async fn clear_items(&self) -> Result<(), AgendaError>;
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: AgendaCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub async fn route(
        &self,
        command: AgendaCommand,
        payload: &SlashCommandPayload,
    ) -> Result<Response, CommandRouteError> {
        let target = ReplyTarget::new(&payload.channel_id, &payload.user_id);
        let ephemeral = |message: MessageTemplate| {
            Response::reply(Reply::ephemeral(&payload.channel_id, &payload.user_id, message))
        };

        match command {
            AgendaCommand::AddItem => Ok(Response::with_effect(Effect::OpenView {
                trigger_id: payload.trigger_id.clone(),
                view: modals::add_item_modal(&target),
            })),
            AgendaCommand::RemoveItem => match self.item_names().await {
                Ok(names) => Ok(Response::with_effect(Effect::OpenView {
                    trigger_id: payload.trigger_id.clone(),
                    view: modals::remove_item_modal(&names, &target),
                })),
                Err(error) => Ok(ephemeral(unavailable_message(error, &payload.request_id))),
            },
            AgendaCommand::Update => match self.item_names().await {
                Ok(names) => Ok(Response::with_effect(Effect::OpenView {
                    trigger_id: payload.trigger_id.clone(),
                    view: modals::update_select_modal(&names, &target),
                })),
                Err(error) => Ok(ephemeral(unavailable_message(error, &payload.request_id))),
            },
            AgendaCommand::ListItems => {
                let listed = self
                    .service
                    .list_items(true)
                    .await
                    .and_then(|items| render_agenda(&items));
                match listed {
                    Ok(view) => Ok(Response::reply(Reply::in_channel(
                        &payload.channel_id,
                        blocks::agenda_message(&view),
                    ))),
                    Err(error) => {
                        warn!(
                            event_name = "agenda.command.list_failed",
                            correlation_id = %payload.request_id,
                            error_kind = error.kind(),
                            "listing agenda failed"
                        );
                        Ok(ephemeral(MessageTemplate::text(format!("listing failed: {error}"))))
                    }
                }
            }
            AgendaCommand::ClearItems => {
                let text = match self.service.clear_items().await {
                    Ok(()) => "clearing succeeded: all items successfully cleared".to_owned(),
                    Err(error) => format!("clearing failed: {error}"),
                };
                Ok(ephemeral(MessageTemplate::text(text)))
            }
            AgendaCommand::Help { topic } => Ok(ephemeral(blocks::help_message(topic.as_deref()))),
        }
    }

    /// Handles a modal submission, keyed by the view's callback id.
    pub async fn submit_view(&self, state: &ViewState) -> Result<Response, CommandRouteError> {
        match state.callback_id.as_str() {
            modals::ADD_CALLBACK_ID => self.submit_add(state).await,
            modals::REMOVE_CALLBACK_ID => {
                let submission = modals::parse_remove_submission(state)?;
                let text = match self.service.remove_item(&submission.item).await {
                    Ok(()) => {
                        format!("removal succeeded: {} successfully removed", submission.item)
                    }
                    Err(error) => format!("removal failed: {error}"),
                };
                Ok(Response::reply(Reply::to_target(&submission.target, text)))
            }
            // The picker only collects a choice; the field modal does the work.
            modals::UPDATE_SELECT_CALLBACK_ID => {
                Ok(Response::view_error(FIELD_BLOCK, SELECT_FIELD_ERROR))
            }
            modals::UPDATE_FIELD_CALLBACK_ID => self.submit_field_update(state).await,
            other => Err(CommandRouteError::UnsupportedCallback(other.to_owned())),
        }
    }

    /// Handles interactive changes inside an open modal. Only the update
    /// picker reacts: once both the item and the field are chosen the view is
    /// replaced with the field-specific form.
    pub async fn handle_action(
        &self,
        action_id: &str,
        state: Option<&ViewState>,
    ) -> Result<Response, CommandRouteError> {
        let Some(state) = state else {
            return Ok(Response::ack_only());
        };
        if action_id != modals::EDIT_ACTION || state.callback_id != modals::UPDATE_SELECT_CALLBACK_ID
        {
            return Ok(Response::ack_only());
        }

        let Some(target) = modals::parse_update_selection(state)? else {
            debug!(event_name = "agenda.command.update_selection_pending", "waiting for selection");
            return Ok(Response::ack_only());
        };

        Ok(Response::with_effect(Effect::UpdateView {
            view_id: state.view_id.clone(),
            hash: state.hash.clone(),
            view: modals::update_field_modal(&target),
        }))
    }

    async fn submit_add(&self, state: &ViewState) -> Result<Response, CommandRouteError> {
        let submission = match modals::parse_add_submission(state) {
            Ok(submission) => submission,
            Err(ModalError::MissingInput { .. }) => {
                return Ok(Response::view_error(NAME_BLOCK, NAME_REQUIRED_ERROR));
            }
            Err(error) => return Err(error.into()),
        };

        let fields = ItemFields::new(&submission.name, &submission.importance)
            .desc(&submission.desc)
            .due_date(submission.due_date());
        let text = match self.service.add_item(fields, submission.assignees.clone()).await {
            Ok(()) => added_text(
                &submission.name,
                &submission.importance_label,
                &submission.desc,
                &submission.due_date(),
                &submission.assignees,
            ),
            Err(error) => error.to_string(),
        };

        Ok(Response::reply(Reply::to_target(&submission.target, text)))
    }

    async fn submit_field_update(&self, state: &ViewState) -> Result<Response, CommandRouteError> {
        let submission = modals::parse_field_submission(state)?;
        let target = &submission.target;
        let (value, display) = match submission.value {
            FieldValue::Text { value, display } => (UpdateValue::Text(value), display),
            FieldValue::DueAt(seconds) => {
                let raw = seconds.to_string();
                let display = display_due_date(&raw);
                (UpdateValue::Text(raw), display)
            }
            FieldValue::Users(users) => {
                let display = mention_list(&users);
                (UpdateValue::Users(users), display)
            }
        };

        let text = match self.service.update_item(&target.item, target.field, value).await {
            Ok(()) => format!("updated {} of {} to {display}", target.field, target.item),
            Err(error) => format!("failed update: {error}"),
        };
        Ok(Response::reply(Reply::to_target(&target.reply_target(), text)))
    }

    async fn item_names(&self) -> Result<Vec<String>, AgendaError> {
        Ok(self.service.list_items(false).await?.into_iter().map(|item| item.name).collect())
    }
}

fn unavailable_message(error: AgendaError, correlation_id: &str) -> MessageTemplate {
    warn!(
        event_name = "agenda.command.items_unavailable",
        correlation_id = %correlation_id,
        error_kind = error.kind(),
        "could not load agenda items for modal"
    );
    let interface = ApplicationError::from(error).into_interface(correlation_id);
    blocks::error_message(interface.user_message(), correlation_id)
}

fn added_text(
    name: &str,
    importance_label: &str,
    desc: &str,
    due_date: &str,
    assignees: &[String],
) -> String {
    let desc = if desc.is_empty() { "<empty>".to_owned() } else { desc.to_owned() };
    let due = if due_date.is_empty() { "<none>".to_owned() } else { display_due_date(due_date) };
    let assignees =
        if assignees.is_empty() { "<none>".to_owned() } else { mention_list(assignees) };
    format!(
        "Added item \"{name}\" with {importance_label} importance, description \"{desc}\", due date \"{due}\", and assignees {assignees}"
    )
}
