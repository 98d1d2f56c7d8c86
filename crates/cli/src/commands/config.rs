use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use docket_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let entries: Vec<(&str, String, &str)> = vec![
        ("redis.url", config.redis.url.clone(), "DOCKET_REDIS_URL"),
        (
            "redis.connect_timeout_secs",
            config.redis.connect_timeout_secs.to_string(),
            "DOCKET_REDIS_CONNECT_TIMEOUT_SECS",
        ),
        (
            "slack.app_token",
            redact_token(config.slack.app_token.expose_secret()),
            "DOCKET_SLACK_APP_TOKEN",
        ),
        (
            "slack.bot_token",
            redact_token(config.slack.bot_token.expose_secret()),
            "DOCKET_SLACK_BOT_TOKEN",
        ),
        (
            "slack.digest_channel",
            config.slack.digest_channel.clone().unwrap_or_else(|| "<unset>".to_string()),
            "DOCKET_SLACK_DIGEST_CHANNEL",
        ),
        ("schedule.enabled", config.schedule.enabled.to_string(), "DOCKET_SCHEDULE_ENABLED"),
        (
            "schedule.day_of_week",
            format!("{:?}", config.schedule.day_of_week),
            "DOCKET_SCHEDULE_DAY_OF_WEEK",
        ),
        ("schedule.hour", config.schedule.hour.to_string(), "DOCKET_SCHEDULE_HOUR"),
        ("schedule.minute", config.schedule.minute.to_string(), "DOCKET_SCHEDULE_MINUTE"),
        (
            "schedule.post_on_startup",
            config.schedule.post_on_startup.to_string(),
            "DOCKET_SCHEDULE_POST_ON_STARTUP",
        ),
        ("server.bind_address", config.server.bind_address.clone(), "DOCKET_SERVER_BIND_ADDRESS"),
        (
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            "DOCKET_SERVER_HEALTH_CHECK_PORT",
        ),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            "DOCKET_SERVER_GRACEFUL_SHUTDOWN_SECS",
        ),
        ("logging.level", config.logging.level.clone(), "DOCKET_LOGGING_LEVEL"),
        ("logging.format", format!("{:?}", config.logging.format), "DOCKET_LOGGING_FORMAT"),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(entries.iter().map(|(key, value, env_key)| {
        render_line(
            key,
            value,
            field_source(
                key,
                Some(*env_key),
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        )
    }));
    lines.push(format!("- digest cron = {} (UTC)", config.schedule.cron_expression()));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    ["docket.toml", "config/docket.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
