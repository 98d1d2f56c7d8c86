use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use docket_core::config::{AppConfig, ConfigError, LoadOptions};
use docket_db::{AgendaRepository, RedisStore, StoreError};
use docket_slack::events::agenda_dispatcher;
use docket_slack::socket::{ReconnectPolicy, SocketModeRunner};

use crate::digest::DigestJob;
use crate::service::AgendaService;
use crate::slack_api::SlackWebClient;
use crate::socket_transport::WebSocketTransport;

pub struct Application {
    pub config: AppConfig,
    pub repo: Arc<AgendaRepository<RedisStore>>,
    pub slack_runner: SocketModeRunner,
    pub digest: Option<Arc<DigestJob<RedisStore>>>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("store setup failed: {0}")]
    Store(#[from] StoreError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Wires the store, Slack client, Socket Mode runner and digest job from an
/// already validated config. The Redis connection opens on first use.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let store = RedisStore::new(&config.redis.url, config.redis.connect_timeout_secs)?;
    let repo = Arc::new(AgendaRepository::new(store));
    info!(
        event_name = "system.bootstrap.store_configured",
        correlation_id = "bootstrap",
        "agenda store configured"
    );

    let slack = SlackWebClient::new(config.slack.bot_token.clone(), config.slack.app_token.clone());
    let slack_runner = SocketModeRunner::new(
        Arc::new(WebSocketTransport::new(Arc::new(slack.clone()))),
        agenda_dispatcher(AgendaService::new(repo.clone())),
        Arc::new(slack.clone()),
        ReconnectPolicy::default(),
    );

    let digest = config
        .slack
        .digest_channel
        .as_deref()
        .map(|channel| Arc::new(DigestJob::new(repo.clone(), Arc::new(slack), channel)));
    info!(
        event_name = "system.bootstrap.slack_configured",
        correlation_id = "bootstrap",
        digest_enabled = digest.is_some() && config.schedule.enabled,
        "slack runner configured"
    );

    Ok(Application { config, repo, slack_runner, digest })
}
