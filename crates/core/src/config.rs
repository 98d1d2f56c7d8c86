use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Weekday;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub redis: RedisConfig,
    pub slack: SlackConfig,
    pub schedule: ScheduleConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub url: String,
    pub connect_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub app_token: SecretString,
    pub bot_token: SecretString,
    pub digest_channel: Option<String>,
}

/// Weekly digest trigger. Times are interpreted in UTC.
#[derive(Clone, Debug)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub day_of_week: Weekday,
    pub hour: u32,
    pub minute: u32,
    pub post_on_startup: bool,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub redis_url: Option<String>,
    pub log_level: Option<String>,
    pub slack_app_token: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_digest_channel: Option<String>,
    pub schedule_enabled: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig {
                url: "redis://127.0.0.1:6379/".to_string(),
                connect_timeout_secs: 5,
            },
            slack: SlackConfig {
                app_token: String::new().into(),
                bot_token: String::new().into(),
                digest_channel: None,
            },
            schedule: ScheduleConfig {
                enabled: true,
                day_of_week: Weekday::Tue,
                hour: 17,
                minute: 45,
                post_on_startup: true,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl ScheduleConfig {
    /// Six-field cron expression (seconds first) for the weekly trigger.
    pub fn cron_expression(&self) -> String {
        format!("0 {} {} * * {}", self.minute, self.hour, weekday_token(self.day_of_week))
    }
}

fn weekday_token(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

fn parse_weekday(key: &str, value: &str) -> Result<Weekday, ConfigError> {
    value.trim().parse::<Weekday>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("docket.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(redis) = patch.redis {
            if let Some(url) = redis.url {
                self.redis.url = url;
            }
            if let Some(connect_timeout_secs) = redis.connect_timeout_secs {
                self.redis.connect_timeout_secs = connect_timeout_secs;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(slack_app_token_value) = slack.app_token {
                self.slack.app_token = secret_value(slack_app_token_value);
            }
            if let Some(slack_bot_token_value) = slack.bot_token {
                self.slack.bot_token = secret_value(slack_bot_token_value);
            }
            if let Some(digest_channel) = slack.digest_channel {
                self.slack.digest_channel = Some(digest_channel);
            }
        }

        if let Some(schedule) = patch.schedule {
            if let Some(enabled) = schedule.enabled {
                self.schedule.enabled = enabled;
            }
            if let Some(day_of_week) = schedule.day_of_week {
                self.schedule.day_of_week = parse_weekday("schedule.day_of_week", &day_of_week)?;
            }
            if let Some(hour) = schedule.hour {
                self.schedule.hour = hour;
            }
            if let Some(minute) = schedule.minute {
                self.schedule.minute = minute;
            }
            if let Some(post_on_startup) = schedule.post_on_startup {
                self.schedule.post_on_startup = post_on_startup;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("DOCKET_REDIS_URL") {
            self.redis.url = value;
        }
        if let Some(value) = read_env("DOCKET_REDIS_CONNECT_TIMEOUT_SECS") {
            self.redis.connect_timeout_secs =
                parse_u64("DOCKET_REDIS_CONNECT_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DOCKET_SLACK_APP_TOKEN") {
            self.slack.app_token = secret_value(value);
        }
        if let Some(value) = read_env("DOCKET_SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("DOCKET_SLACK_DIGEST_CHANNEL") {
            self.slack.digest_channel = Some(value);
        }

        if let Some(value) = read_env("DOCKET_SCHEDULE_ENABLED") {
            self.schedule.enabled = parse_bool("DOCKET_SCHEDULE_ENABLED", &value)?;
        }
        if let Some(value) = read_env("DOCKET_SCHEDULE_DAY_OF_WEEK") {
            self.schedule.day_of_week = parse_weekday("DOCKET_SCHEDULE_DAY_OF_WEEK", &value)?;
        }
        if let Some(value) = read_env("DOCKET_SCHEDULE_HOUR") {
            self.schedule.hour = parse_u32("DOCKET_SCHEDULE_HOUR", &value)?;
        }
        if let Some(value) = read_env("DOCKET_SCHEDULE_MINUTE") {
            self.schedule.minute = parse_u32("DOCKET_SCHEDULE_MINUTE", &value)?;
        }
        if let Some(value) = read_env("DOCKET_SCHEDULE_POST_ON_STARTUP") {
            self.schedule.post_on_startup =
                parse_bool("DOCKET_SCHEDULE_POST_ON_STARTUP", &value)?;
        }

        if let Some(value) = read_env("DOCKET_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("DOCKET_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("DOCKET_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("DOCKET_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("DOCKET_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("DOCKET_LOGGING_LEVEL").or_else(|| read_env("DOCKET_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("DOCKET_LOGGING_FORMAT").or_else(|| read_env("DOCKET_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(redis_url) = overrides.redis_url {
            self.redis.url = redis_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(slack_app_token) = overrides.slack_app_token {
            self.slack.app_token = secret_value(slack_app_token);
        }
        if let Some(slack_bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(slack_bot_token);
        }
        if let Some(digest_channel) = overrides.slack_digest_channel {
            self.slack.digest_channel = Some(digest_channel);
        }
        if let Some(enabled) = overrides.schedule_enabled {
            self.schedule.enabled = enabled;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_redis(&self.redis)?;
        validate_slack(&self.slack)?;
        validate_schedule(&self.schedule, &self.slack)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("docket.toml"), PathBuf::from("config/docket.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_redis(redis: &RedisConfig) -> Result<(), ConfigError> {
    let url = redis.url.trim();
    let redis_url = url.starts_with("redis://")
        || url.starts_with("rediss://")
        || url.starts_with("redis+unix://");
    if !redis_url {
        return Err(ConfigError::Validation(
            "redis.url must be a redis URL (`redis://...`, `rediss://...`, or `redis+unix://...`)"
                .to_string(),
        ));
    }

    if redis.connect_timeout_secs == 0 || redis.connect_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "redis.connect_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let app_token = slack.app_token.expose_secret();
    if app_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.app_token is required. Get it from https://api.slack.com/apps > Your App > Basic Information > App-Level Tokens".to_string()
        ));
    }
    if !app_token.starts_with("xapp-") {
        let hint = if app_token.starts_with("xoxb-") {
            " (hint: you may have used the bot token instead of the app token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.app_token must start with `xapp-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used the app token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    Ok(())
}

fn validate_schedule(schedule: &ScheduleConfig, slack: &SlackConfig) -> Result<(), ConfigError> {
    if schedule.hour > 23 {
        return Err(ConfigError::Validation("schedule.hour must be in range 0..=23".to_string()));
    }
    if schedule.minute > 59 {
        return Err(ConfigError::Validation(
            "schedule.minute must be in range 0..=59".to_string(),
        ));
    }

    cron::Schedule::from_str(&schedule.cron_expression()).map_err(|error| {
        ConfigError::Validation(format!("schedule does not form a valid cron expression: {error}"))
    })?;

    if schedule.enabled {
        let missing =
            slack.digest_channel.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "slack.digest_channel is required while schedule.enabled is true".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    redis: Option<RedisPatch>,
    slack: Option<SlackPatch>,
    schedule: Option<SchedulePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct RedisPatch {
    url: Option<String>,
    connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    app_token: Option<String>,
    bot_token: Option<String>,
    digest_channel: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SchedulePatch {
    enabled: Option<bool>,
    day_of_week: Option<String>,
    hour: Option<u32>,
    minute: Option<u32>,
    post_on_startup: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
