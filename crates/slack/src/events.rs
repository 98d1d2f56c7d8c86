use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::{
    blocks,
    commands::{
        normalize_agenda_command, AgendaCommandService, CommandParseError, CommandRouteError,
        CommandRouter, Reply, Response, SlashCommandPayload,
    },
    modals::{ViewState, ViewValues},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    ViewSubmission(ViewSubmissionEvent),
    BlockAction(BlockActionEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::ViewSubmission(_) => SlackEventType::ViewSubmission,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::SlashCommand(payload) => Some(&payload.user_id),
            Self::ViewSubmission(event) => Some(&event.user_id),
            Self::BlockAction(event) => Some(&event.user_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    ViewSubmission,
    BlockAction,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewSubmissionEvent {
    pub user_id: String,
    pub view: ViewState,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub user_id: String,
    pub action_id: String,
    /// Present when the action fired inside a modal.
    pub view: Option<ViewState>,
}

/// One frame read from the Socket Mode connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketMessage {
    Hello,
    Disconnect { reason: String },
    Envelope(SlackEnvelope),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("malformed socket frame: {0}")]
    Malformed(String),
    #[error("socket frame `{0}` carries no envelope id")]
    MissingEnvelopeId(String),
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Option<serde_json::Value>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct RawSlashCommand {
    command: String,
    #[serde(default)]
    text: String,
    channel_id: String,
    user_id: String,
    #[serde(default)]
    trigger_id: String,
}

#[derive(Deserialize)]
struct RawInteraction {
    #[serde(rename = "type")]
    kind: String,
    user: RawUser,
    #[serde(default)]
    actions: Vec<RawAction>,
    #[serde(default)]
    view: Option<RawView>,
}

#[derive(Deserialize)]
struct RawUser {
    id: String,
}

#[derive(Deserialize)]
struct RawAction {
    action_id: String,
}

#[derive(Deserialize)]
struct RawView {
    id: String,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    callback_id: String,
    #[serde(default)]
    private_metadata: String,
    #[serde(default)]
    state: RawViewState,
}

#[derive(Default, Deserialize)]
struct RawViewState {
    #[serde(default)]
    values: ViewValues,
}

impl From<RawView> for ViewState {
    fn from(raw: RawView) -> Self {
        Self {
            view_id: raw.id,
            hash: raw.hash,
            callback_id: raw.callback_id,
            private_metadata: raw.private_metadata,
            values: raw.state.values,
        }
    }
}

/// Decodes a Socket Mode text frame. Envelope types this bot does not handle
/// come back as [`SlackEvent::Unsupported`] so they are still acknowledged.
pub fn parse_socket_message(text: &str) -> Result<SocketMessage, EnvelopeError> {
    let frame: RawFrame =
        serde_json::from_str(text).map_err(|error| EnvelopeError::Malformed(error.to_string()))?;

    match frame.kind.as_str() {
        "hello" => return Ok(SocketMessage::Hello),
        "disconnect" => {
            return Ok(SocketMessage::Disconnect { reason: frame.reason.unwrap_or_default() })
        }
        _ => {}
    }

    let envelope_id = frame
        .envelope_id
        .ok_or_else(|| EnvelopeError::MissingEnvelopeId(frame.kind.clone()))?;
    let payload = frame.payload.unwrap_or(serde_json::Value::Null);
    let event = match frame.kind.as_str() {
        "slash_commands" => {
            let raw: RawSlashCommand = decode(payload)?;
            SlackEvent::SlashCommand(SlashCommandPayload {
                command: raw.command,
                text: raw.text,
                channel_id: raw.channel_id,
                user_id: raw.user_id,
                trigger_id: raw.trigger_id,
                request_id: envelope_id.clone(),
            })
        }
        "interactive" => interaction_event(decode(payload)?),
        other => SlackEvent::Unsupported { event_type: other.to_owned() },
    };

    Ok(SocketMessage::Envelope(SlackEnvelope { envelope_id, event }))
}

fn decode<T: for<'de> Deserialize<'de>>(payload: serde_json::Value) -> Result<T, EnvelopeError> {
    serde_json::from_value(payload).map_err(|error| EnvelopeError::Malformed(error.to_string()))
}

fn interaction_event(raw: RawInteraction) -> SlackEvent {
    match (raw.kind.as_str(), raw.view) {
        ("view_submission", Some(view)) => SlackEvent::ViewSubmission(ViewSubmissionEvent {
            user_id: raw.user.id,
            view: view.into(),
        }),
        ("block_actions", view) => match raw.actions.into_iter().next() {
            Some(action) => SlackEvent::BlockAction(BlockActionEvent {
                user_id: raw.user.id,
                action_id: action.action_id,
                view: view.map(ViewState::from),
            }),
            None => SlackEvent::Unsupported { event_type: "block_actions".to_owned() },
        },
        (other, _) => SlackEvent::Unsupported { event_type: other.to_owned() },
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Response),
    Processed,
    Ignored,
}

impl HandlerResult {
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Responded(response) => Some(response),
            Self::Processed | Self::Ignored => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
    #[error(transparent)]
    Route(#[from] CommandRouteError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Dispatcher with every agenda handler registered over one shared router.
pub fn agenda_dispatcher<S>(service: S) -> EventDispatcher
where
    S: AgendaCommandService + 'static,
{
    let router = Arc::new(CommandRouter::new(service));
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(router.clone()));
    dispatcher.register(ViewSubmissionHandler::new(router.clone()));
    dispatcher.register(BlockActionHandler::new(router));
    dispatcher
}

pub struct SlashCommandHandler<S> {
    router: Arc<CommandRouter<S>>,
}

impl<S> SlashCommandHandler<S>
where
    S: AgendaCommandService,
{
    pub fn new(router: Arc<CommandRouter<S>>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: AgendaCommandService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let command = match normalize_agenda_command(payload) {
            Ok(command) => command,
            Err(CommandParseError::UnsupportedCommand(command)) => {
                warn!(
                    event_name = "agenda.command.unsupported",
                    correlation_id = %ctx.correlation_id,
                    command = %command,
                    "unsupported slash command"
                );
                let message = blocks::error_message(
                    &format!("Unsupported command `{command}`. Try `/help`."),
                    &ctx.correlation_id,
                );
                return Ok(HandlerResult::Responded(Response::reply(Reply::ephemeral(
                    &payload.channel_id,
                    &payload.user_id,
                    message,
                ))));
            }
        };

        let response = self.router.route(command, payload).await?;
        Ok(HandlerResult::Responded(response))
    }
}

pub struct ViewSubmissionHandler<S> {
    router: Arc<CommandRouter<S>>,
}

impl<S> ViewSubmissionHandler<S>
where
    S: AgendaCommandService,
{
    pub fn new(router: Arc<CommandRouter<S>>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl<S> EventHandler for ViewSubmissionHandler<S>
where
    S: AgendaCommandService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ViewSubmission
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ViewSubmission(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let response = self.router.submit_view(&event.view).await?;
        Ok(HandlerResult::Responded(response))
    }
}

pub struct BlockActionHandler<S> {
    router: Arc<CommandRouter<S>>,
}

impl<S> BlockActionHandler<S>
where
    S: AgendaCommandService,
{
    pub fn new(router: Arc<CommandRouter<S>>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl<S> EventHandler for BlockActionHandler<S>
where
    S: AgendaCommandService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockAction
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let response = self.router.handle_action(&event.action_id, event.view.as_ref()).await?;
        Ok(if response.effects.is_empty() && response.ack.to_json().is_none() {
            HandlerResult::Processed
        } else {
            HandlerResult::Responded(response)
        })
    }
}
