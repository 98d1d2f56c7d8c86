//! Modal dialogs for the agenda commands and parsing of their submitted
//! state.
//!
//! Callback ids, block ids and action ids are part of the wire contract with
//! Slack: a view opened by one process version may be submitted to the next.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use docket_core::domain::importance::Importance;
use docket_core::domain::item::ItemField;

use crate::blocks::TextObject;

pub const ADD_CALLBACK_ID: &str = "additem";
pub const REMOVE_CALLBACK_ID: &str = "remitem";
pub const UPDATE_SELECT_CALLBACK_ID: &str = "updateitem";
pub const UPDATE_FIELD_CALLBACK_ID: &str = "updatedUpdate";

pub const NAME_BLOCK: &str = "NameBlock";
pub const IMPORTANCE_BLOCK: &str = "ImportanceBlock";
pub const DESC_BLOCK: &str = "DescBlock";
pub const DUE_DATE_BLOCK: &str = "DueDateBlock";
pub const ASSIGNEES_BLOCK: &str = "AssigneesBlock";
pub const ITEM_BLOCK: &str = "ItemBlock";
pub const FIELD_BLOCK: &str = "FieldBlock";
pub const UPDATE_BLOCK: &str = "updateBlock";

pub const ADD_NAME_ACTION: &str = "AddAgendaName";
pub const ADD_IMPORTANCE_ACTION: &str = "AddAgendaImportance";
pub const ADD_DESC_ACTION: &str = "AddAgendaDesc";
pub const ADD_DUE_DATE_ACTION: &str = "AddAgendaDueDate";
pub const ADD_ASSIGNEES_ACTION: &str = "AddAgendaAssignees";
pub const REMOVE_ITEM_ACTION: &str = "RemoveItem";
pub const EDIT_ACTION: &str = "Edit";
pub const UPDATE_INPUT_ACTION: &str = "updateInput";

pub const SELECT_FIELD_ERROR: &str = "Please select a field";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModalError {
    #[error("private metadata could not be decoded: {0}")]
    Metadata(String),
    #[error("missing input `{block_id}.{action_id}`")]
    MissingInput { block_id: String, action_id: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub text: TextObject,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { text: TextObject::plain(label), value: value.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputElement {
    PlainTextInput {
        action_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<TextObject>,
        #[serde(skip_serializing_if = "Option::is_none")]
        initial_value: Option<String>,
    },
    StaticSelect {
        action_id: String,
        placeholder: TextObject,
        options: Vec<SelectOption>,
        #[serde(skip_serializing_if = "Option::is_none")]
        initial_option: Option<SelectOption>,
    },
    Datetimepicker {
        action_id: String,
    },
    MultiUsersSelect {
        action_id: String,
        placeholder: TextObject,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModalBlock {
    Section {
        block_id: String,
        text: TextObject,
    },
    Input {
        block_id: String,
        label: TextObject,
        element: InputElement,
        optional: bool,
        dispatch_action: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModalView {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub callback_id: String,
    pub title: TextObject,
    pub submit: TextObject,
    pub close: TextObject,
    pub blocks: Vec<ModalBlock>,
    pub private_metadata: String,
}

impl ModalView {
    fn new(callback_id: &str, title: &str, private_metadata: String) -> Self {
        Self {
            kind: "modal",
            callback_id: callback_id.to_owned(),
            title: TextObject::plain(title),
            submit: TextObject::plain("Submit"),
            close: TextObject::plain("Cancel"),
            blocks: Vec::new(),
            private_metadata,
        }
    }

    fn input(mut self, block_id: &str, label: &str, element: InputElement) -> Self {
        self.blocks.push(ModalBlock::Input {
            block_id: block_id.to_owned(),
            label: TextObject::plain(label),
            element,
            optional: false,
            dispatch_action: false,
        });
        self
    }

    fn optional_input(mut self, block_id: &str, label: &str, element: InputElement) -> Self {
        self = self.input(block_id, label, element);
        if let Some(ModalBlock::Input { optional, .. }) = self.blocks.last_mut() {
            *optional = true;
        }
        self
    }

    fn dispatching_input(mut self, block_id: &str, label: &str, element: InputElement) -> Self {
        self = self.input(block_id, label, element);
        if let Some(ModalBlock::Input { dispatch_action, .. }) = self.blocks.last_mut() {
            *dispatch_action = true;
        }
        self
    }

    fn section(mut self, block_id: &str, text: String) -> Self {
        self.blocks.push(ModalBlock::Section {
            block_id: block_id.to_owned(),
            text: TextObject::plain(text),
        });
        self
    }
}

/// Where the confirmation for a modal goes once it is submitted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyTarget {
    pub channel: String,
    pub sender: String,
}

impl ReplyTarget {
    pub fn new(channel: impl Into<String>, sender: impl Into<String>) -> Self {
        Self { channel: channel.into(), sender: sender.into() }
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn decode(raw: &str) -> Result<Self, ModalError> {
        serde_json::from_str(raw).map_err(|error| ModalError::Metadata(error.to_string()))
    }
}

/// Metadata of the field-specific update modal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTarget {
    pub item: String,
    pub field: ItemField,
    pub channel: String,
    pub sender: String,
}

impl UpdateTarget {
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn decode(raw: &str) -> Result<Self, ModalError> {
        serde_json::from_str(raw).map_err(|error| ModalError::Metadata(error.to_string()))
    }

    pub fn reply_target(&self) -> ReplyTarget {
        ReplyTarget::new(&self.channel, &self.sender)
    }
}

fn importance_options() -> Vec<SelectOption> {
    Importance::ALL
        .iter()
        .map(|level| SelectOption::new(level.label(), level.to_stored()))
        .collect()
}

fn importance_select(action_id: &str) -> InputElement {
    InputElement::StaticSelect {
        action_id: action_id.to_owned(),
        placeholder: TextObject::plain("importance level"),
        options: importance_options(),
        initial_option: Some(SelectOption::new(
            Importance::MIN.label(),
            Importance::MIN.to_stored(),
        )),
    }
}

fn text_input(action_id: &str, placeholder: &str, initial_value: Option<&str>) -> InputElement {
    InputElement::PlainTextInput {
        action_id: action_id.to_owned(),
        placeholder: Some(TextObject::plain(placeholder)),
        initial_value: initial_value.map(str::to_owned),
    }
}

fn users_select(action_id: &str) -> InputElement {
    InputElement::MultiUsersSelect {
        action_id: action_id.to_owned(),
        placeholder: TextObject::plain("assignees"),
    }
}

fn item_select(action_id: &str, names: &[String]) -> InputElement {
    InputElement::StaticSelect {
        action_id: action_id.to_owned(),
        placeholder: TextObject::plain("Select an item"),
        options: names.iter().map(|name| SelectOption::new(name, name)).collect(),
        initial_option: None,
    }
}

pub fn add_item_modal(target: &ReplyTarget) -> ModalView {
    ModalView::new(ADD_CALLBACK_ID, "Add an Agenda item", target.encode())
        .input(NAME_BLOCK, "Item name", text_input(ADD_NAME_ACTION, "name", None))
        .input(IMPORTANCE_BLOCK, "Pick an importance level", importance_select(ADD_IMPORTANCE_ACTION))
        .optional_input(DESC_BLOCK, "Description", text_input(ADD_DESC_ACTION, "desc", Some("")))
        .optional_input(
            DUE_DATE_BLOCK,
            "Due Date",
            InputElement::Datetimepicker { action_id: ADD_DUE_DATE_ACTION.to_owned() },
        )
        .optional_input(ASSIGNEES_BLOCK, "Assignees", users_select(ADD_ASSIGNEES_ACTION))
}

/// Item picker for removal. `names` come from an unsorted listing.
pub fn remove_item_modal(names: &[String], target: &ReplyTarget) -> ModalView {
    ModalView::new(REMOVE_CALLBACK_ID, "Remove an Agenda item", target.encode()).input(
        ITEM_BLOCK,
        "Item",
        item_select(REMOVE_ITEM_ACTION, names),
    )
}

/// First step of an update: pick the item and the field. Choosing a field
/// fires a block action that swaps in [`update_field_modal`].
pub fn update_select_modal(names: &[String], target: &ReplyTarget) -> ModalView {
    let fields = InputElement::StaticSelect {
        action_id: EDIT_ACTION.to_owned(),
        placeholder: TextObject::plain("Select a field"),
        options: ItemField::ALL
            .iter()
            .map(|field| SelectOption::new(field.label(), field.as_str()))
            .collect(),
        initial_option: None,
    };

    ModalView::new(UPDATE_SELECT_CALLBACK_ID, "Update an Agenda item", target.encode())
        .dispatching_input(ITEM_BLOCK, "Item", item_select(EDIT_ACTION, names))
        .dispatching_input(FIELD_BLOCK, "Field", fields)
}

pub fn update_field_modal(target: &UpdateTarget) -> ModalView {
    let field = target.field;
    let element = match field {
        ItemField::Name => text_input(UPDATE_INPUT_ACTION, field.as_str(), None),
        ItemField::Desc => text_input(UPDATE_INPUT_ACTION, field.as_str(), Some("")),
        ItemField::Importance => importance_select(UPDATE_INPUT_ACTION),
        ItemField::DueDate => {
            InputElement::Datetimepicker { action_id: UPDATE_INPUT_ACTION.to_owned() }
        }
        ItemField::Assignees => users_select(UPDATE_INPUT_ACTION),
    };
    let label = format!("new {}", field.as_str());

    let view = ModalView::new(UPDATE_FIELD_CALLBACK_ID, "Update an Agenda item", target.encode())
        .section("updateSummary", format!("editing {} of {}", field.as_str(), target.item));
    match field {
        ItemField::Assignees => view.optional_input(UPDATE_BLOCK, &label, element),
        _ => view.input(UPDATE_BLOCK, &label, element),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct OptionState {
    pub text: OptionText,
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct OptionText {
    pub text: String,
}

/// State of one input element as Slack reports it in `view.state.values`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct InputState {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub selected_option: Option<OptionState>,
    #[serde(default)]
    pub selected_date_time: Option<i64>,
    #[serde(default)]
    pub selected_users: Option<Vec<String>>,
}

/// `view.state.values`: block id, then action id.
pub type ViewValues = HashMap<String, HashMap<String, InputState>>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewState {
    pub view_id: String,
    pub hash: Option<String>,
    pub callback_id: String,
    pub private_metadata: String,
    pub values: ViewValues,
}

impl ViewState {
    pub fn input(&self, block_id: &str, action_id: &str) -> Option<&InputState> {
        self.values.get(block_id).and_then(|actions| actions.get(action_id))
    }

    fn text(&self, block_id: &str, action_id: &str) -> Option<String> {
        self.input(block_id, action_id)
            .and_then(|input| input.value.clone())
            .filter(|value| !value.trim().is_empty())
    }

    fn selected(&self, block_id: &str, action_id: &str) -> Option<&OptionState> {
        self.input(block_id, action_id).and_then(|input| input.selected_option.as_ref())
    }

    fn date_time(&self, block_id: &str, action_id: &str) -> Option<i64> {
        self.input(block_id, action_id).and_then(|input| input.selected_date_time)
    }

    fn users(&self, block_id: &str, action_id: &str) -> Vec<String> {
        self.input(block_id, action_id)
            .and_then(|input| input.selected_users.clone())
            .unwrap_or_default()
    }
}

/// Parsed submission of the add modal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddSubmission {
    pub name: String,
    pub importance: String,
    pub importance_label: String,
    pub desc: String,
    /// Epoch seconds; `None` when no date was picked.
    pub due_at: Option<i64>,
    pub assignees: Vec<String>,
    pub target: ReplyTarget,
}

impl AddSubmission {
    pub fn due_date(&self) -> String {
        self.due_at.map(|seconds| seconds.to_string()).unwrap_or_default()
    }
}

pub fn parse_add_submission(state: &ViewState) -> Result<AddSubmission, ModalError> {
    let target = ReplyTarget::decode(&state.private_metadata)?;
    let name = state.text(NAME_BLOCK, ADD_NAME_ACTION).ok_or_else(|| ModalError::MissingInput {
        block_id: NAME_BLOCK.to_owned(),
        action_id: ADD_NAME_ACTION.to_owned(),
    })?;
    let (importance, importance_label) = state
        .selected(IMPORTANCE_BLOCK, ADD_IMPORTANCE_ACTION)
        .map(|option| (option.value.clone(), option.text.text.clone()))
        .unwrap_or_else(|| (Importance::MIN.to_stored(), Importance::MIN.label().to_owned()));

    Ok(AddSubmission {
        name: name.trim().to_owned(),
        importance,
        importance_label,
        desc: state.text(DESC_BLOCK, ADD_DESC_ACTION).unwrap_or_default(),
        due_at: state.date_time(DUE_DATE_BLOCK, ADD_DUE_DATE_ACTION),
        assignees: state.users(ASSIGNEES_BLOCK, ADD_ASSIGNEES_ACTION),
        target,
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoveSubmission {
    pub item: String,
    pub target: ReplyTarget,
}

pub fn parse_remove_submission(state: &ViewState) -> Result<RemoveSubmission, ModalError> {
    let target = ReplyTarget::decode(&state.private_metadata)?;
    let item = state
        .selected(ITEM_BLOCK, REMOVE_ITEM_ACTION)
        .map(|option| option.value.clone())
        .ok_or_else(|| ModalError::MissingInput {
            block_id: ITEM_BLOCK.to_owned(),
            action_id: REMOVE_ITEM_ACTION.to_owned(),
        })?;
    Ok(RemoveSubmission { item, target })
}

/// Reads the item and field chosen in the update picker. `None` until both
/// have been selected.
pub fn parse_update_selection(state: &ViewState) -> Result<Option<UpdateTarget>, ModalError> {
    let item = state.selected(ITEM_BLOCK, EDIT_ACTION).map(|option| option.value.clone());
    let field = state.selected(FIELD_BLOCK, EDIT_ACTION).map(|option| option.value.clone());
    let (Some(item), Some(field)) = (item, field) else {
        return Ok(None);
    };

    let field = field.parse::<ItemField>().map_err(|error| ModalError::Metadata(error.to_string()))?;
    let target = ReplyTarget::decode(&state.private_metadata)?;
    Ok(Some(UpdateTarget { item, field, channel: target.channel, sender: target.sender }))
}

/// New value from the field-specific update modal, along with the text shown
/// back to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSubmission {
    pub target: UpdateTarget,
    pub value: FieldValue,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Text { value: String, display: String },
    DueAt(i64),
    Users(Vec<String>),
}

pub fn parse_field_submission(state: &ViewState) -> Result<FieldSubmission, ModalError> {
    let target = UpdateTarget::decode(&state.private_metadata)?;
    let missing = || ModalError::MissingInput {
        block_id: UPDATE_BLOCK.to_owned(),
        action_id: UPDATE_INPUT_ACTION.to_owned(),
    };

    let value = match target.field {
        ItemField::Name => {
            let value = state.text(UPDATE_BLOCK, UPDATE_INPUT_ACTION).ok_or_else(missing)?;
            FieldValue::Text { display: value.clone(), value }
        }
        ItemField::Desc => {
            let value = state.text(UPDATE_BLOCK, UPDATE_INPUT_ACTION).unwrap_or_default();
            FieldValue::Text { display: value.clone(), value }
        }
        ItemField::Importance => {
            let option = state.selected(UPDATE_BLOCK, UPDATE_INPUT_ACTION).ok_or_else(missing)?;
            FieldValue::Text { value: option.value.clone(), display: option.text.text.clone() }
        }
        ItemField::DueDate => {
            FieldValue::DueAt(state.date_time(UPDATE_BLOCK, UPDATE_INPUT_ACTION).ok_or_else(missing)?)
        }
        ItemField::Assignees => FieldValue::Users(state.users(UPDATE_BLOCK, UPDATE_INPUT_ACTION)),
    };

    Ok(FieldSubmission { target, value })
}
