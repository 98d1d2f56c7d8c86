use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::importance::Importance;
use crate::errors::AgendaError;

/// Suffix of the auxiliary key holding an item's assignee list.
pub const ASSIGNEES_SUFFIX: &str = ":assignees";

/// An agenda entry as read back from the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgendaItem {
    pub name: String,
    pub importance: Importance,
    pub desc: String,
    pub due_date: String,
    pub assignees: Vec<String>,
    /// ISO-8601 creation timestamp; never rewritten after the item is added.
    pub time: String,
}

impl AgendaItem {
    pub fn has_due_date(&self) -> bool {
        !self.due_date.trim().is_empty()
    }
}

/// Caller-supplied fields for a new item. `importance` is raw user input and is
/// normalized by the store before anything is written.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFields {
    pub name: String,
    pub importance: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub due_date: String,
}

impl ItemFields {
    pub fn new(name: impl Into<String>, importance: impl Into<String>) -> Self {
        Self { name: name.into(), importance: importance.into(), ..Self::default() }
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    pub fn due_date(mut self, due_date: impl Into<String>) -> Self {
        self.due_date = due_date.into();
        self
    }
}

/// Field targeted by an update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemField {
    Name,
    Importance,
    Desc,
    DueDate,
    Assignees,
}

impl ItemField {
    pub const ALL: [Self; 5] =
        [Self::Name, Self::Desc, Self::Importance, Self::DueDate, Self::Assignees];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Importance => "importance",
            Self::Desc => "desc",
            Self::DueDate => "due_date",
            Self::Assignees => "assignees",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Importance => "Importance",
            Self::Desc => "Description",
            Self::DueDate => "Due Date",
            Self::Assignees => "Assignees",
        }
    }
}

impl FromStr for ItemField {
    type Err = AgendaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "importance" => Ok(Self::Importance),
            "desc" => Ok(Self::Desc),
            "due_date" => Ok(Self::DueDate),
            "assignees" => Ok(Self::Assignees),
            _ => Err(AgendaError::InvalidField(value.to_owned())),
        }
    }
}

impl fmt::Display for ItemField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// New value for an update. Assignees replace the whole list; every other
/// field takes a single string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UpdateValue {
    Text(String),
    Users(Vec<String>),
}

impl UpdateValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn users<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Users(users.into_iter().map(Into::into).collect())
    }

    /// Human-facing rendering used in confirmation messages.
    pub fn display(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Users(users) => mention_list(users),
        }
    }
}

/// Key of the assignee list that belongs to `name`.
pub fn assignees_key(name: &str) -> String {
    format!("{name}{ASSIGNEES_SUFFIX}")
}

pub fn is_assignees_key(key: &str) -> bool {
    key.ends_with(ASSIGNEES_SUFFIX)
}

/// Trims a candidate item name and rejects names the store cannot hold.
pub fn normalize_name(raw: &str) -> Result<String, AgendaError> {
    let name = raw.trim();
    if name.is_empty() || is_assignees_key(name) {
        return Err(AgendaError::InvalidName(name.to_owned()));
    }
    Ok(name.to_owned())
}

pub fn mention(user_id: &str) -> String {
    format!("<@{user_id}>")
}

pub fn mention_list(user_ids: &[String]) -> String {
    user_ids.iter().map(|user| mention(user)).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::{
        assignees_key, is_assignees_key, mention_list, normalize_name, ItemField, UpdateValue,
    };
    use crate::errors::AgendaError;

    #[test]
    fn field_names_parse_case_insensitively() {
        assert_eq!("NAME".parse::<ItemField>(), Ok(ItemField::Name));
        assert_eq!(" due_date ".parse::<ItemField>(), Ok(ItemField::DueDate));
        assert_eq!("assignees".parse::<ItemField>(), Ok(ItemField::Assignees));
        assert_eq!(
            "colour".parse::<ItemField>(),
            Err(AgendaError::InvalidField("colour".to_owned()))
        );
    }

    #[test]
    fn assignee_keys_use_reserved_suffix() {
        assert_eq!(assignees_key("standup"), "standup:assignees");
        assert!(is_assignees_key("standup:assignees"));
        assert!(!is_assignees_key("standup"));
    }

    #[test]
    fn names_are_trimmed_and_reserved_suffix_rejected() {
        assert_eq!(normalize_name("  retro  ").as_deref(), Ok("retro"));
        assert!(matches!(normalize_name("   "), Err(AgendaError::InvalidName(_))));
        assert!(matches!(normalize_name("x:assignees"), Err(AgendaError::InvalidName(_))));
    }

    #[test]
    fn users_render_as_mentions() {
        let users = vec!["U1".to_owned(), "U2".to_owned()];
        assert_eq!(mention_list(&users), "<@U1>, <@U2>");
        assert_eq!(UpdateValue::users(["U9"]).display(), "<@U9>");
        assert_eq!(UpdateValue::text("ship it").display(), "ship it");
    }
}
