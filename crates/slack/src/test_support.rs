use std::collections::HashMap;

use async_trait::async_trait;

use docket_core::domain::item::{AgendaItem, ItemField, ItemFields, UpdateValue};
use docket_core::errors::AgendaError;
use docket_db::{AgendaRepository, InMemoryStore};

use crate::commands::{AgendaCommandService, SlashCommandPayload};
use crate::modals::{InputState, ViewState};

pub struct RepoService(pub AgendaRepository<InMemoryStore>);

pub fn repo_service() -> RepoService {
    RepoService(AgendaRepository::new(InMemoryStore::new()))
}

#[async_trait]
impl AgendaCommandService for RepoService {
    async fn add_item(
        &self,
        fields: ItemFields,
        assignees: Vec<String>,
    ) -> Result<(), AgendaError> {
        self.0.add(fields, assignees).await
    }

    async fn remove_item(&self, name: &str) -> Result<(), AgendaError> {
        self.0.remove(name).await
    }

    async fn update_item(
        &self,
        name: &str,
        field: ItemField,
        value: UpdateValue,
    ) -> Result<(), AgendaError> {
        self.0.update(name, field, value).await
    }

    async fn list_items(&self, sorted: bool) -> Result<Vec<AgendaItem>, AgendaError> {
        self.0.list(sorted).await
    }

    async fn clear_items(&self) -> Result<(), AgendaError> {
        self.0.clear().await
    }
}

/// Every operation fails as if the store were unreachable.
pub struct FailingService;

fn refused() -> AgendaError {
    AgendaError::Store("connection refused".to_owned())
}

#[async_trait]
impl AgendaCommandService for FailingService {
    async fn add_item(&self, _: ItemFields, _: Vec<String>) -> Result<(), AgendaError> {
        Err(refused())
    }

    async fn remove_item(&self, _: &str) -> Result<(), AgendaError> {
        Err(refused())
    }

    async fn update_item(&self, _: &str, _: ItemField, _: UpdateValue) -> Result<(), AgendaError> {
        Err(refused())
    }

    async fn list_items(&self, _: bool) -> Result<Vec<AgendaItem>, AgendaError> {
        Err(refused())
    }

    async fn clear_items(&self) -> Result<(), AgendaError> {
        Err(refused())
    }
}

pub fn payload(command: &str, text: &str) -> SlashCommandPayload {
    SlashCommandPayload {
        command: command.to_owned(),
        text: text.to_owned(),
        channel_id: "C1".to_owned(),
        user_id: "U1".to_owned(),
        trigger_id: "trigger-1".to_owned(),
        request_id: "req-1".to_owned(),
    }
}

pub fn view_state(callback_id: &str, metadata: String, values: serde_json::Value) -> ViewState {
    ViewState {
        view_id: "V1".to_owned(),
        hash: Some("h1".to_owned()),
        callback_id: callback_id.to_owned(),
        private_metadata: metadata,
        values: serde_json::from_value::<HashMap<String, HashMap<String, InputState>>>(values)
            .expect("view values"),
    }
}
