use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use docket_core::config::ScheduleConfig;
use docket_core::errors::AgendaError;
use docket_core::render::render_agenda;
use docket_db::{AgendaRepository, KeyValueStore};
use docket_slack::blocks::{agenda_message, MessageTemplate};

use crate::slack_api::{SlackApiError, SlackWebClient};

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("agenda could not be listed: {0}")]
    List(#[from] AgendaError),
    #[error("agenda could not be posted: {0}")]
    Post(#[from] SlackApiError),
    #[error("digest scheduler failed: {0}")]
    Scheduler(String),
}

/// Channel poster used by the digest.
#[async_trait]
pub trait MessagePoster: Send + Sync {
    async fn post(&self, channel: &str, message: &MessageTemplate) -> Result<(), SlackApiError>;
}

#[async_trait]
impl MessagePoster for SlackWebClient {
    async fn post(&self, channel: &str, message: &MessageTemplate) -> Result<(), SlackApiError> {
        self.post_message(channel, message).await
    }
}

/// Posts the sorted agenda to one channel.
pub struct DigestJob<S> {
    repo: Arc<AgendaRepository<S>>,
    poster: Arc<dyn MessagePoster>,
    channel: String,
}

impl<S: KeyValueStore + 'static> DigestJob<S> {
    pub fn new(
        repo: Arc<AgendaRepository<S>>,
        poster: Arc<dyn MessagePoster>,
        channel: impl Into<String>,
    ) -> Self {
        Self { repo, poster, channel: channel.into() }
    }

    pub async fn run_once(&self) -> Result<(), DigestError> {
        let items = self.repo.list(true).await?;
        let view = render_agenda(&items)?;
        self.poster.post(&self.channel, &agenda_message(&view)).await?;

        info!(
            event_name = "agenda.digest.posted",
            correlation_id = "digest",
            channel = %self.channel,
            item_count = items.len(),
            "weekly agenda posted"
        );
        Ok(())
    }

    /// One firing. Failures are logged and left for the next firing.
    pub async fn fire(&self) {
        match self.run_once().await {
            Ok(()) => {}
            Err(DigestError::List(error)) => warn!(
                event_name = "agenda.digest.list_failed",
                correlation_id = "digest",
                channel = %self.channel,
                error_kind = error.kind(),
                error = %error,
                "skipping digest; agenda could not be listed"
            ),
            Err(error) => error!(
                event_name = "agenda.digest.post_failed",
                correlation_id = "digest",
                channel = %self.channel,
                error = %error,
                "digest post failed"
            ),
        }
    }

    /// Registers the weekly trigger and starts the scheduler. Returns `None`
    /// when the digest is disabled. With `post_on_startup` the digest also
    /// fires once immediately in the background.
    pub async fn schedule(
        self: Arc<Self>,
        schedule: &ScheduleConfig,
    ) -> Result<Option<JobScheduler>, DigestError> {
        if !schedule.enabled {
            info!(event_name = "agenda.digest.disabled", "weekly digest disabled");
            return Ok(None);
        }

        let expression = schedule.cron_expression();
        let scheduler = JobScheduler::new().await.map_err(scheduler_error)?;
        let digest = self.clone();
        let job = Job::new_async(expression.as_str(), move |_uuid, _lock| {
            let digest = digest.clone();
            Box::pin(async move {
                digest.fire().await;
            })
        })
        .map_err(scheduler_error)?;

        scheduler.add(job).await.map_err(scheduler_error)?;
        scheduler.start().await.map_err(scheduler_error)?;
        info!(
            event_name = "agenda.digest.scheduled",
            correlation_id = "bootstrap",
            cron = %expression,
            channel = %self.channel,
            "weekly digest scheduled (UTC)"
        );

        if schedule.post_on_startup {
            tokio::spawn(async move { self.fire().await });
        }

        Ok(Some(scheduler))
    }
}

fn scheduler_error(error: impl std::fmt::Display) -> DigestError {
    DigestError::Scheduler(error.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Weekday;
    use tokio::sync::Mutex;

    use docket_core::config::ScheduleConfig;
    use docket_core::domain::item::ItemFields;
    use docket_db::{AgendaRepository, InMemoryStore};
    use docket_slack::blocks::MessageTemplate;

    use super::{DigestError, DigestJob, MessagePoster};
    use crate::slack_api::SlackApiError;

    #[derive(Default)]
    struct RecordingPoster {
        posts: Mutex<Vec<(String, MessageTemplate)>>,
    }

    #[async_trait]
    impl MessagePoster for RecordingPoster {
        async fn post(
            &self,
            channel: &str,
            message: &MessageTemplate,
        ) -> Result<(), SlackApiError> {
            self.posts.lock().await.push((channel.to_owned(), message.clone()));
            Ok(())
        }
    }

    struct RejectingPoster;

    #[async_trait]
    impl MessagePoster for RejectingPoster {
        async fn post(&self, _: &str, _: &MessageTemplate) -> Result<(), SlackApiError> {
            Err(SlackApiError::Api { method: "chat.postMessage", error: "not_in_channel".to_owned() })
        }
    }

    fn schedule(enabled: bool, hour: u32, post_on_startup: bool) -> ScheduleConfig {
        ScheduleConfig { enabled, day_of_week: Weekday::Tue, hour, minute: 45, post_on_startup }
    }

    async fn seeded_repo() -> Arc<AgendaRepository<InMemoryStore>> {
        let repo = Arc::new(AgendaRepository::new(InMemoryStore::new()));
        repo.add(ItemFields::new("Budget", "1"), Vec::new()).await.expect("add");
        repo.add(ItemFields::new("Outage", "3"), Vec::new()).await.expect("add");
        repo
    }

    #[tokio::test]
    async fn posts_sorted_agenda_to_configured_channel() {
        let poster = Arc::new(RecordingPoster::default());
        let job = DigestJob::new(seeded_repo().await, poster.clone(), "C-digest");

        job.run_once().await.expect("digest");

        let posts = poster.posts.lock().await;
        assert_eq!(posts.len(), 1);
        let (channel, message) = &posts[0];
        assert_eq!(channel, "C-digest");
        assert_eq!(message.fallback_text, "Agenda Items");
        let lines: Vec<_> = message.attachments.iter().map(|a| a.text.as_str()).collect();
        assert_eq!(lines, vec!["1. Outage", "2. Budget"]);
    }

    #[tokio::test]
    async fn empty_agenda_posts_placeholder() {
        let poster = Arc::new(RecordingPoster::default());
        let repo = Arc::new(AgendaRepository::new(InMemoryStore::new()));
        let job = DigestJob::new(repo, poster.clone(), "C-digest");

        job.run_once().await.expect("digest");

        assert_eq!(poster.posts.lock().await[0].1.attachments.len(), 1);
    }

    #[tokio::test]
    async fn post_failures_are_reported_not_retried() {
        let job = DigestJob::new(seeded_repo().await, Arc::new(RejectingPoster), "C-digest");

        let error = job.run_once().await.expect_err("post should fail");
        assert!(matches!(error, DigestError::Post(SlackApiError::Api { .. })));
        job.fire().await;
    }

    #[tokio::test]
    async fn disabled_schedule_starts_nothing() {
        let poster = Arc::new(RecordingPoster::default());
        let job = Arc::new(DigestJob::new(seeded_repo().await, poster.clone(), "C-digest"));

        let scheduler = job.schedule(&schedule(false, 17, true)).await.expect("schedule");

        assert!(scheduler.is_none());
        assert!(poster.posts.lock().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn startup_post_fires_once_scheduled() {
        let poster = Arc::new(RecordingPoster::default());
        let job = Arc::new(DigestJob::new(seeded_repo().await, poster.clone(), "C-digest"));

        let mut scheduler = job
            .schedule(&schedule(true, 17, true))
            .await
            .expect("schedule")
            .expect("scheduler running");

        for _ in 0..50 {
            if !poster.posts.lock().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(poster.posts.lock().await.len(), 1);
        scheduler.shutdown().await.expect("shutdown");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn out_of_range_schedule_is_a_scheduler_error() {
        let poster = Arc::new(RecordingPoster::default());
        let job = Arc::new(DigestJob::new(seeded_repo().await, poster, "C-digest"));

        let Err(error) = job.schedule(&schedule(true, 99, false)).await else {
            panic!("bad cron");
        };
        assert!(matches!(error, DigestError::Scheduler(_)));
    }
}
