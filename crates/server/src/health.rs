use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use docket_core::errors::AgendaError;
use docket_db::{AgendaRepository, KeyValueStore};

/// Backing-store reachability check.
#[async_trait]
pub trait StoreProbe: Send + Sync {
    async fn ping(&self) -> Result<(), AgendaError>;
}

#[async_trait]
impl<S: KeyValueStore> StoreProbe for AgendaRepository<S> {
    async fn ping(&self) -> Result<(), AgendaError> {
        AgendaRepository::ping(self).await
    }
}

#[derive(Clone)]
pub struct HealthState {
    store: Arc<dyn StoreProbe>,
}

impl HealthState {
    pub fn new(store: Arc<dyn StoreProbe>) -> Self {
        Self { store }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub store: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let store = match state.store.ping().await {
        Ok(()) => HealthCheck { status: "ready", detail: "store ping succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("store ping failed: {error}") }
        }
    };
    let ready = store.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "docket-server runtime initialized".to_string(),
        },
        store,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{extract::State, http::StatusCode, Json};

    use docket_core::errors::AgendaError;
    use docket_db::{AgendaRepository, InMemoryStore};

    use crate::health::{health, HealthState, StoreProbe};

    struct Unreachable;

    #[async_trait]
    impl StoreProbe for Unreachable {
        async fn ping(&self) -> Result<(), AgendaError> {
            Err(AgendaError::Store("connection refused".to_owned()))
        }
    }

    #[tokio::test]
    async fn health_returns_ready_when_store_answers_ping() {
        let repo = Arc::new(AgendaRepository::new(InMemoryStore::new()));

        let (status, Json(payload)) = health(State(HealthState::new(repo))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.store.status, "ready");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_store_is_down() {
        let (status, Json(payload)) = health(State(HealthState::new(Arc::new(Unreachable)))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.store.status, "degraded");
        assert!(payload.store.detail.contains("connection refused"));
        assert_eq!(payload.service.status, "ready");
    }
}
