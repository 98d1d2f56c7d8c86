use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use docket_core::domain::item::{AgendaItem, ItemField, ItemFields, UpdateValue};
use docket_core::errors::AgendaError;
use docket_db::{AgendaRepository, KeyValueStore};
use docket_slack::commands::AgendaCommandService;

/// Command service backed by the shared agenda repository.
pub struct AgendaService<S> {
    repo: Arc<AgendaRepository<S>>,
}

impl<S> AgendaService<S> {
    pub fn new(repo: Arc<AgendaRepository<S>>) -> Self {
        Self { repo }
    }
}

fn log_outcome<T>(command: &'static str, result: &Result<T, AgendaError>) {
    match result {
        Ok(_) => info!(event_name = "agenda.command.completed", command, "agenda command completed"),
        Err(error) => warn!(
            event_name = "agenda.command.failed",
            command,
            error_kind = error.kind(),
            error = %error,
            "agenda command failed"
        ),
    }
}

#[async_trait]
impl<S: KeyValueStore + 'static> AgendaCommandService for AgendaService<S> {
    async fn add_item(
        &self,
        fields: ItemFields,
        assignees: Vec<String>,
    ) -> Result<(), AgendaError> {
        let result = self.repo.add(fields, assignees).await;
        log_outcome("add", &result);
        result
    }

    async fn remove_item(&self, name: &str) -> Result<(), AgendaError> {
        let result = self.repo.remove(name).await;
        log_outcome("remove", &result);
        result
    }

    async fn update_item(
        &self,
        name: &str,
        field: ItemField,
        value: UpdateValue,
    ) -> Result<(), AgendaError> {
        let result = self.repo.update(name, field, value).await;
        log_outcome("update", &result);
        result
    }

    async fn list_items(&self, sorted: bool) -> Result<Vec<AgendaItem>, AgendaError> {
        let result = self.repo.list(sorted).await;
        log_outcome("list", &result);
        result
    }

    async fn clear_items(&self) -> Result<(), AgendaError> {
        let result = self.repo.clear().await;
        log_outcome("clear", &result);
        result
    }
}
