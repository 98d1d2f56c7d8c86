use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::commands::Effect;
use crate::events::{EventContext, EventDispatcher, HandlerResult, SlackEnvelope};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
    /// Slack asked the client to reconnect.
    #[error("server requested reconnect: {0}")]
    Refresh(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("effect delivery failed: {0}")]
pub struct DeliveryError(pub String);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// Next envelope, or `None` once the stream has closed for good.
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    /// Acks an envelope, optionally with a response payload such as modal
    /// validation errors.
    async fn acknowledge(
        &self,
        envelope_id: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopSocketTransport;

#[async_trait]
impl SocketTransport for NoopSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(
        &self,
        _envelope_id: &str,
        _payload: Option<serde_json::Value>,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Performs the Web API calls a handler asked for once its envelope has been
/// acknowledged.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn deliver(&self, effect: &Effect) -> Result<(), DeliveryError>;
}

#[derive(Default)]
pub struct NoopResponseSink;

#[async_trait]
impl ResponseSink for NoopResponseSink {
    async fn deliver(&self, _effect: &Effect) -> Result<(), DeliveryError> {
        Ok(())
    }
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: EventDispatcher,
    sink: Arc<dyn ResponseSink>,
    reconnect_policy: ReconnectPolicy,
}

impl Default for SocketModeRunner {
    fn default() -> Self {
        Self {
            transport: Arc::new(NoopSocketTransport),
            dispatcher: EventDispatcher::new(),
            sink: Arc::new(NoopResponseSink),
            reconnect_policy: ReconnectPolicy::default(),
        }
    }
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        sink: Arc<dyn ResponseSink>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, sink, reconnect_policy }
    }

    /// Runs until the transport closes cleanly or reconnect attempts are
    /// exhausted. The attempt counter starts over after every successful
    /// connect, so routine reconnect requests never use up the budget.
    pub async fn start(&self) -> Result<()> {
        let mut attempt = 0;
        loop {
            let mut connected = false;
            match self.connect_and_pump(attempt, &mut connected).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    if connected {
                        attempt = 0;
                    }
                    warn!(
                        event_name = "ingress.slack.transport_failed",
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        connected: &mut bool,
    ) -> Result<(), TransportError> {
        info!(attempt, "opening socket mode transport connection");
        self.transport.connect().await?;
        *connected = true;
        info!(attempt, "socket mode transport connected");

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "socket mode transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            self.process(&envelope).await;
        }
    }

    /// Dispatches one envelope, acks it, then performs its effects.
    async fn process(&self, envelope: &SlackEnvelope) {
        let event_type = envelope.event.event_type();
        let user_id = envelope.event.user_id().unwrap_or("unknown");
        info!(
            event_name = "ingress.slack.envelope_received",
            envelope_id = %envelope.envelope_id,
            event_type = ?event_type,
            correlation_id = %envelope.envelope_id,
            user_id,
            "received slack envelope"
        );

        let context = EventContext { correlation_id: envelope.envelope_id.clone() };
        let result = match self.dispatcher.dispatch(envelope, &context).await {
            Ok(result) => result,
            Err(error) => {
                warn!(
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    event_type = ?event_type,
                    error = %error,
                    "event dispatch failed; continuing socket loop"
                );
                HandlerResult::Processed
            }
        };

        let response = result.response();
        let ack_payload = response.and_then(|response| response.ack.to_json());
        if let Err(error) = self.transport.acknowledge(&envelope.envelope_id, ack_payload).await {
            warn!(
                event_name = "ingress.slack.ack_sent",
                envelope_id = %envelope.envelope_id,
                correlation_id = %envelope.envelope_id,
                error = %error,
                "failed to acknowledge slack envelope"
            );
        } else {
            debug!(
                event_name = "ingress.slack.ack_sent",
                envelope_id = %envelope.envelope_id,
                correlation_id = %envelope.envelope_id,
                "acknowledged slack envelope"
            );
        }

        for effect in response.map(|response| response.effects.as_slice()).unwrap_or_default() {
            if let Err(error) = self.sink.deliver(effect).await {
                warn!(
                    event_name = "egress.slack.effect_failed",
                    correlation_id = %envelope.envelope_id,
                    effect = effect_name(effect),
                    error = %error,
                    "failed to deliver slack response"
                );
            }
        }
    }
}

fn effect_name(effect: &Effect) -> &'static str {
    match effect {
        Effect::PostMessage(reply) if reply.ephemeral_to.is_some() => "post_ephemeral",
        Effect::PostMessage(_) => "post_message",
        Effect::OpenView { .. } => "views_open",
        Effect::UpdateView { .. } => "views_update",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use super::{
        effect_name, DeliveryError, NoopResponseSink, ReconnectPolicy, ResponseSink,
        SocketModeRunner, SocketTransport, TransportError,
    };
    use crate::blocks::MessageTemplate;
    use crate::commands::{Effect, Reply};
    use crate::events::{
        agenda_dispatcher, EventDispatcher, SlackEnvelope, SlackEvent, ViewSubmissionEvent,
    };
    use crate::modals::ReplyTarget;
    use crate::test_support::{payload, repo_service, view_state};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        envelopes: VecDeque<Result<Option<SlackEnvelope>, TransportError>>,
        disconnect_results: VecDeque<Result<(), TransportError>>,
        connect_attempts: usize,
        acknowledgements: Vec<(String, Option<serde_json::Value>)>,
        disconnect_calls: usize,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            envelopes: Vec<Result<Option<SlackEnvelope>, TransportError>>,
            disconnect_results: Vec<Result<(), TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    envelopes: envelopes.into(),
                    disconnect_results: disconnect_results.into(),
                    connect_attempts: 0,
                    acknowledgements: Vec::new(),
                    disconnect_calls: 0,
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn acknowledgements(&self) -> Vec<(String, Option<serde_json::Value>)> {
            self.state.lock().await.acknowledgements.clone()
        }

        async fn disconnect_calls(&self) -> usize {
            self.state.lock().await.disconnect_calls
        }
    }

    #[async_trait]
    impl SocketTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
            let mut state = self.state.lock().await;
            state.envelopes.pop_front().unwrap_or(Ok(None))
        }

        async fn acknowledge(
            &self,
            envelope_id: &str,
            payload: Option<serde_json::Value>,
        ) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.acknowledgements.push((envelope_id.to_owned(), payload));
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.disconnect_calls += 1;
            state.disconnect_results.pop_front().unwrap_or(Ok(()))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<Effect>>,
        fail: bool,
    }

    #[async_trait]
    impl ResponseSink for RecordingSink {
        async fn deliver(&self, effect: &Effect) -> Result<(), DeliveryError> {
            self.delivered.lock().await.push(effect.clone());
            if self.fail {
                return Err(DeliveryError("channel_not_found".to_owned()));
            }
            Ok(())
        }
    }

    fn unsupported(id: &str) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: id.to_owned(),
            event: SlackEvent::Unsupported { event_type: "test".to_owned() },
        }
    }

    fn policy(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy { max_retries, base_delay_ms: 0, max_delay_ms: 0 }
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![Ok(Some(unsupported("env-1"))), Ok(None)],
            vec![Ok(())],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            Arc::new(NoopResponseSink),
            policy(2),
        );

        runner.start().await.expect("runner should not fail");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.acknowledgements().await, vec![("env-1".to_owned(), None)]);
        assert_eq!(transport.disconnect_calls().await, 1);
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
            vec![],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            Arc::new(NoopResponseSink),
            policy(2),
        );

        runner.start().await.expect("runner should degrade gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn refresh_requests_do_not_consume_retry_budget() {
        let refresh = || -> Result<Option<SlackEnvelope>, TransportError> {
            Err(TransportError::Refresh("refresh_requested".to_owned()))
        };
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![],
            vec![
                Ok(Some(unsupported("env-1"))),
                refresh(),
                Ok(Some(unsupported("env-2"))),
                refresh(),
                Ok(Some(unsupported("env-3"))),
                refresh(),
                Ok(None),
            ],
            vec![],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            Arc::new(NoopResponseSink),
            policy(1),
        );

        runner.start().await.expect("runner");
        assert_eq!(transport.connect_attempts().await, 4);
        assert_eq!(transport.acknowledgements().await.len(), 3);
    }

    #[tokio::test]
    async fn acks_carry_view_errors_and_effects_follow() {
        let blank_name = view_state(
            "additem",
            ReplyTarget::new("C1", "U1").encode(),
            json!({ "NameBlock": { "AddAgendaName": { "value": "" } } }),
        );
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![],
            vec![
                Ok(Some(SlackEnvelope {
                    envelope_id: "env-view".to_owned(),
                    event: SlackEvent::ViewSubmission(ViewSubmissionEvent {
                        user_id: "U1".to_owned(),
                        view: blank_name,
                    }),
                })),
                Ok(Some(SlackEnvelope {
                    envelope_id: "env-help".to_owned(),
                    event: SlackEvent::SlashCommand(payload("/help", "")),
                })),
                Ok(None),
            ],
            vec![],
        ));
        let sink = Arc::new(RecordingSink::default());

        let runner = SocketModeRunner::new(
            transport.clone(),
            agenda_dispatcher(repo_service()),
            sink.clone(),
            policy(0),
        );
        runner.start().await.expect("runner");

        let acks = transport.acknowledgements().await;
        assert_eq!(acks[0].0, "env-view");
        assert_eq!(
            acks[0].1,
            Some(json!({
                "response_action": "errors",
                "errors": { "NameBlock": "Please enter an item name" }
            }))
        );
        assert_eq!(acks[1], ("env-help".to_owned(), None));

        let delivered = sink.delivered.lock().await;
        assert_eq!(delivered.len(), 1);
        assert!(matches!(
            &delivered[0],
            Effect::PostMessage(Reply { ephemeral_to: Some(user), .. }) if user == "U1"
        ));
    }

    #[tokio::test]
    async fn delivery_failures_do_not_stop_the_loop() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![],
            vec![
                Ok(Some(SlackEnvelope {
                    envelope_id: "env-1".to_owned(),
                    event: SlackEvent::SlashCommand(payload("/help", "")),
                })),
                Ok(Some(SlackEnvelope {
                    envelope_id: "env-2".to_owned(),
                    event: SlackEvent::SlashCommand(payload("/listitems", "")),
                })),
                Ok(None),
            ],
            vec![],
        ));
        let sink = Arc::new(RecordingSink { fail: true, ..RecordingSink::default() });

        let runner = SocketModeRunner::new(
            transport.clone(),
            agenda_dispatcher(repo_service()),
            sink.clone(),
            policy(0),
        );
        runner.start().await.expect("runner");

        assert_eq!(transport.acknowledgements().await.len(), 2);
        assert_eq!(sink.delivered.lock().await.len(), 2);
    }

    #[test]
    fn effect_names_distinguish_ephemeral_replies() {
        let ephemeral =
            Effect::PostMessage(Reply::ephemeral("C1", "U1", MessageTemplate::text("x")));
        let public = Effect::PostMessage(Reply::in_channel("C1", MessageTemplate::text("x")));
        assert_eq!(effect_name(&ephemeral), "post_ephemeral");
        assert_eq!(effect_name(&public), "post_message");
    }
}
