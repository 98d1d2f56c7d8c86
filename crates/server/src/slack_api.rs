use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use docket_slack::blocks::MessageTemplate;
use docket_slack::commands::{Effect, Reply};
use docket_slack::modals::ModalView;
use docket_slack::socket::{DeliveryError, ResponseSink};

pub const SLACK_API_BASE_URL: &str = "https://slack.com/api";

#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("slack method `{method}` request failed: {source}")]
    Request {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("slack method `{method}` returned HTTP {status}")]
    Status { method: &'static str, status: StatusCode },
    #[error("slack method `{method}` failed: {error}")]
    Api { method: &'static str, error: String },
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Minimal Web API client covering the methods the bot calls. Bot-token
/// methods post messages and drive modals; `apps.connections.open` uses the
/// app-level token.
#[derive(Clone)]
pub struct SlackWebClient {
    client: Client,
    base_url: String,
    bot_token: SecretString,
    app_token: SecretString,
}

impl SlackWebClient {
    pub fn new(bot_token: SecretString, app_token: SecretString) -> Self {
        Self::with_base_url(SLACK_API_BASE_URL, bot_token, app_token)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        bot_token: SecretString,
        app_token: SecretString,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            bot_token,
            app_token,
        }
    }

    pub async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        let mut body = message_body(message);
        body["channel"] = json!(channel);
        self.call("chat.postMessage", &self.bot_token, body).await.map(drop)
    }

    pub async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        let mut body = message_body(message);
        body["channel"] = json!(channel);
        body["user"] = json!(user);
        self.call("chat.postEphemeral", &self.bot_token, body).await.map(drop)
    }

    pub async fn open_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), SlackApiError> {
        let body = json!({ "trigger_id": trigger_id, "view": view });
        self.call("views.open", &self.bot_token, body).await.map(drop)
    }

    /// Replaces an open view. `hash` guards against overwriting a newer
    /// revision of the same view.
    pub async fn update_view(
        &self,
        view_id: &str,
        hash: Option<&str>,
        view: &ModalView,
    ) -> Result<(), SlackApiError> {
        let mut body = json!({ "view_id": view_id, "view": view });
        if let Some(hash) = hash {
            body["hash"] = json!(hash);
        }
        self.call("views.update", &self.bot_token, body).await.map(drop)
    }

    /// Requests a fresh Socket Mode WebSocket URL.
    pub async fn open_connection(&self) -> Result<String, SlackApiError> {
        const METHOD: &str = "apps.connections.open";
        let response = self.call(METHOD, &self.app_token, json!({})).await?;
        response.url.ok_or_else(|| SlackApiError::Api {
            method: METHOD,
            error: "response carried no url".to_owned(),
        })
    }

    async fn call(
        &self,
        method: &'static str,
        token: &SecretString,
        body: Value,
    ) -> Result<ApiResponse, SlackApiError> {
        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|source| SlackApiError::Request { method, source })?;

        if !response.status().is_success() {
            return Err(SlackApiError::Status { method, status: response.status() });
        }

        let payload: ApiResponse =
            response.json().await.map_err(|source| SlackApiError::Request { method, source })?;
        if !payload.ok {
            return Err(SlackApiError::Api {
                method,
                error: payload.error.unwrap_or_else(|| "unknown_error".to_owned()),
            });
        }

        debug!(event_name = "egress.slack.api_call", method, "slack api call succeeded");
        Ok(payload)
    }
}

fn message_body(message: &MessageTemplate) -> Value {
    let mut body = json!({ "text": message.fallback_text });
    if !message.blocks.is_empty() {
        body["blocks"] = json!(message.blocks);
    }
    if !message.attachments.is_empty() {
        body["attachments"] = json!(message.attachments);
    }
    body
}

#[async_trait]
impl ResponseSink for SlackWebClient {
    async fn deliver(&self, effect: &Effect) -> Result<(), DeliveryError> {
        let result = match effect {
            Effect::PostMessage(Reply { channel_id, ephemeral_to: Some(user), message }) => {
                self.post_ephemeral(channel_id, user, message).await
            }
            Effect::PostMessage(Reply { channel_id, ephemeral_to: None, message }) => {
                self.post_message(channel_id, message).await
            }
            Effect::OpenView { trigger_id, view } => self.open_view(trigger_id, view).await,
            Effect::UpdateView { view_id, hash, view } => {
                self.update_view(view_id, hash.as_deref(), view).await
            }
        };
        result.map_err(|error| DeliveryError(error.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use axum::{
        extract::{Path, State},
        http::HeaderMap,
        routing::post,
        Json, Router,
    };
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tokio::sync::Mutex;

    use docket_slack::blocks::{help_message, MessageTemplate};
    use docket_slack::commands::{Effect, Reply};
    use docket_slack::modals::{add_item_modal, ReplyTarget};
    use docket_slack::socket::ResponseSink;

    use super::{SlackApiError, SlackWebClient};

    /// One recorded Web API call: method, bearer token and JSON body.
    pub(crate) type RecordedCall = (String, String, Value);

    #[derive(Clone, Default)]
    pub(crate) struct MockSlack {
        pub(crate) calls: Arc<Mutex<Vec<RecordedCall>>>,
        pub(crate) fail_with: Option<&'static str>,
    }

    async fn record(
        State(mock): State<MockSlack>,
        Path(method): Path<String>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let token = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .trim_start_matches("Bearer ")
            .to_owned();
        mock.calls.lock().await.push((method.clone(), token, body));

        if let Some(error) = mock.fail_with {
            return Json(json!({ "ok": false, "error": error }));
        }
        if method == "apps.connections.open" {
            return Json(json!({ "ok": true, "url": "wss://example.invalid/link" }));
        }
        Json(json!({ "ok": true }))
    }

    /// Serves a fake Web API on an ephemeral port and returns its base URL.
    pub(crate) async fn spawn_mock(mock: MockSlack) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
        let address = listener.local_addr().expect("mock address");
        let app = Router::new().route("/api/{method}", post(record)).with_state(mock);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{address}/api")
    }

    pub(crate) fn client(base_url: &str) -> SlackWebClient {
        SlackWebClient::with_base_url(
            base_url,
            SecretString::from("xoxb-test".to_owned()),
            SecretString::from("xapp-test".to_owned()),
        )
    }

    #[tokio::test]
    async fn posts_messages_with_bot_token() {
        let mock = MockSlack::default();
        let client = client(&spawn_mock(mock.clone()).await);

        client.post_message("C1", &help_message(None)).await.expect("post");
        client
            .post_ephemeral("C1", "U1", &MessageTemplate::text("clearing succeeded"))
            .await
            .expect("ephemeral");

        let calls = mock.calls.lock().await;
        assert_eq!(calls[0].0, "chat.postMessage");
        assert_eq!(calls[0].1, "xoxb-test");
        assert_eq!(calls[0].2["channel"], "C1");
        assert_eq!(calls[0].2["text"], "Help Menu:");
        assert_eq!(calls[0].2["blocks"][0]["type"], "header");
        assert_eq!(calls[1].0, "chat.postEphemeral");
        assert_eq!(calls[1].2["user"], "U1");
        assert!(calls[1].2.get("blocks").is_none());
    }

    #[tokio::test]
    async fn opens_connection_with_app_token() {
        let mock = MockSlack::default();
        let client = client(&spawn_mock(mock.clone()).await);

        let url = client.open_connection().await.expect("open connection");

        assert_eq!(url, "wss://example.invalid/link");
        assert_eq!(mock.calls.lock().await[0].1, "xapp-test");
    }

    #[tokio::test]
    async fn api_errors_surface_slack_error_code() {
        let mock = MockSlack { fail_with: Some("channel_not_found"), ..MockSlack::default() };
        let client = client(&spawn_mock(mock).await);

        let error = client.post_message("C404", &MessageTemplate::text("x")).await.expect_err("fail");
        assert!(matches!(
            error,
            SlackApiError::Api { method: "chat.postMessage", ref error } if error == "channel_not_found"
        ));
    }

    #[tokio::test]
    async fn delivers_effects_to_matching_methods() {
        let mock = MockSlack::default();
        let client = client(&spawn_mock(mock.clone()).await);
        let view = add_item_modal(&ReplyTarget::new("C1", "U1"));

        for effect in [
            Effect::OpenView { trigger_id: "t-1".to_owned(), view: view.clone() },
            Effect::UpdateView { view_id: "V1".to_owned(), hash: Some("h1".to_owned()), view },
            Effect::PostMessage(Reply::in_channel("C1", MessageTemplate::text("hi"))),
        ] {
            client.deliver(&effect).await.expect("deliver");
        }

        let calls = mock.calls.lock().await;
        let methods: Vec<_> = calls.iter().map(|(method, _, _)| method.as_str()).collect();
        assert_eq!(methods, vec!["views.open", "views.update", "chat.postMessage"]);
        assert_eq!(calls[0].2["view"]["callback_id"], "additem");
        assert_eq!(calls[1].2["hash"], "h1");
    }

    #[tokio::test]
    async fn unreachable_api_is_a_request_error() {
        let client = client("http://127.0.0.1:1/api");
        let error = client.open_connection().await.expect_err("must fail");
        assert!(matches!(error, SlackApiError::Request { method: "apps.connections.open", .. }));
    }
}
