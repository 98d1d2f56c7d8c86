//! Platform-neutral rendering of an agenda snapshot into a header plus one
//! colored entry per item.

use chrono::DateTime;
use serde::Serialize;

use crate::domain::importance::Importance;
use crate::domain::item::{mention_list, AgendaItem};
use crate::errors::AgendaError;

pub const AGENDA_HEADER: &str = "Current Agenda Items:";
pub const EMPTY_AGENDA_TEXT: &str = "nothing has to be done :D";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgendaColor {
    Neutral,
    Green,
    Amber,
    Red,
    Placeholder,
}

impl AgendaColor {
    /// Maps an importance level to its color. Levels outside 0..=3 are a
    /// contract violation and are reported, never clamped.
    pub fn for_level(level: u8) -> Result<Self, AgendaError> {
        match level {
            0 => Ok(Self::Neutral),
            1 => Ok(Self::Green),
            2 => Ok(Self::Amber),
            3 => Ok(Self::Red),
            other => Err(AgendaError::InvalidImportance(other.to_string())),
        }
    }

    pub fn for_importance(importance: Importance) -> Result<Self, AgendaError> {
        Self::for_level(importance.level())
    }

    pub fn hex(self) -> &'static str {
        match self {
            Self::Neutral => "#35373b",
            Self::Green => "#36a64f",
            Self::Amber => "#daa038",
            Self::Red => "#a30200",
            Self::Placeholder => "#ffffff",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgendaEntry {
    pub text: String,
    pub color: AgendaColor,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgendaView {
    pub header: String,
    pub entries: Vec<AgendaEntry>,
}

impl AgendaView {
    pub fn is_placeholder(&self) -> bool {
        matches!(self.entries.as_slice(), [entry] if entry.color == AgendaColor::Placeholder)
    }
}

/// Renders items in the order given. Callers pass an already sorted snapshot;
/// positions are 1-based ranks within it.
pub fn render_agenda(items: &[AgendaItem]) -> Result<AgendaView, AgendaError> {
    let mut entries = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            Ok(AgendaEntry {
                text: entry_text(index + 1, item),
                color: AgendaColor::for_importance(item.importance)?,
            })
        })
        .collect::<Result<Vec<_>, AgendaError>>()?;

    if entries.is_empty() {
        entries.push(AgendaEntry {
            text: EMPTY_AGENDA_TEXT.to_owned(),
            color: AgendaColor::Placeholder,
        });
    }

    Ok(AgendaView { header: AGENDA_HEADER.to_owned(), entries })
}

fn entry_text(position: usize, item: &AgendaItem) -> String {
    let mut text = format!("{position}. {}", item.name);

    if !item.desc.trim().is_empty() {
        text.push_str(&format!("\n description: {}", item.desc));
    }
    if item.has_due_date() {
        text.push_str(&format!("\n due: {}", display_due_date(&item.due_date)));
    }
    if !item.assignees.is_empty() {
        text.push_str(&format!("\n assigned to: {}", mention_list(&item.assignees)));
    }

    text
}

/// Epoch-second values render as a UTC date; anything else (for example a
/// date picker's `YYYY-MM-DD`) is shown verbatim.
pub fn display_due_date(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .parse::<i64>()
        .ok()
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
        .map(|due| due.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::{display_due_date, render_agenda, AgendaColor, AGENDA_HEADER, EMPTY_AGENDA_TEXT};
    use crate::domain::importance::Importance;
    use crate::domain::item::AgendaItem;
    use crate::errors::AgendaError;

    fn item(name: &str, importance: Importance) -> AgendaItem {
        AgendaItem {
            name: name.to_owned(),
            importance,
            desc: String::new(),
            due_date: String::new(),
            assignees: Vec::new(),
            time: "2026-01-01T00:00:00.000Z".to_owned(),
        }
    }

    #[test]
    fn empty_agenda_renders_single_placeholder() {
        let view = render_agenda(&[]).expect("render");

        assert_eq!(view.header, AGENDA_HEADER);
        assert_eq!(view.entries.len(), 1);
        assert_eq!(view.entries[0].text, EMPTY_AGENDA_TEXT);
        assert_eq!(view.entries[0].color, AgendaColor::Placeholder);
        assert!(view.is_placeholder());
    }

    #[test]
    fn entries_are_ranked_and_optional_lines_omitted_when_blank() {
        let mut full = item("Budget review", Importance::MAX);
        full.desc = "Q3 numbers".to_owned();
        full.due_date = "1767225600".to_owned();
        full.assignees = vec!["U1".to_owned(), "U2".to_owned()];
        let mut bare = item("Coffee", Importance::MIN);
        bare.desc = "   ".to_owned();

        let view = render_agenda(&[full, bare]).expect("render");

        assert_eq!(
            view.entries[0].text,
            "1. Budget review\n description: Q3 numbers\n due: 2026-01-01 00:00 UTC\n assigned to: <@U1>, <@U2>"
        );
        assert_eq!(view.entries[0].color, AgendaColor::Red);
        assert_eq!(view.entries[1].text, "2. Coffee");
        assert_eq!(view.entries[1].color, AgendaColor::Neutral);
        assert!(!view.is_placeholder());
    }

    #[test]
    fn color_mapping_is_total_over_levels_and_rejects_the_rest() {
        let hexes: Vec<_> = (0..=3)
            .map(|level| AgendaColor::for_level(level).expect("in range").hex())
            .collect();
        assert_eq!(hexes, vec!["#35373b", "#36a64f", "#daa038", "#a30200"]);

        assert_eq!(
            AgendaColor::for_level(4),
            Err(AgendaError::InvalidImportance("4".to_owned()))
        );
    }

    #[test]
    fn due_dates_fall_back_to_raw_text() {
        assert_eq!(display_due_date("2026-05-01"), "2026-05-01");
        assert_eq!(display_due_date("0"), "1970-01-01 00:00 UTC");
    }
}
