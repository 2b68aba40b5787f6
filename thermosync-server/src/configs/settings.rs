use std::env;
use std::net::IpAddr;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Database {
    pub clean_start: bool,
    pub url: String,
}

/// Which failure counter the error threshold is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCountMode {
    /// Alerts once per run of failures; a success re-arms the alert.
    Consecutive,
    /// Alerts once, when the lifetime failure total reaches the threshold.
    Cumulative,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Control {
    pub polling_interval_secs: u64,
    pub cooldown_period_secs: u64,
    /// Differential (°F) under which the setpoint gets lowered
    pub temperature_threshold: f64,
    /// Step (°F) the setpoint is lowered by
    pub temperature_adjustment: f64,
    pub error_threshold: u32,
    pub error_count_mode: ErrorCountMode,
    /// Consecutive errors tolerated before health reports degraded
    pub degraded_watermark: u32,
    pub drain_timeout_secs: u64,
}

impl Control {
    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_secs)
    }

    pub fn cooldown_period(&self) -> Duration {
        Duration::from_secs(self.cooldown_period_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl Default for Control {
    fn default() -> Self {
        Self {
            polling_interval_secs: 60,
            cooldown_period_secs: 1800,
            temperature_threshold: 5.0,
            temperature_adjustment: 5.0,
            error_threshold: 10,
            error_count_mode: ErrorCountMode::Consecutive,
            degraded_watermark: 3,
            drain_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retry {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub attempt_timeout_secs: u64,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            attempt_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub enabled: bool,
    pub rate_limit_enabled: bool,
    pub window_seconds: u64,
    pub max_per_window: u32,
    pub webhook_url: Option<String>,
    pub recipient: Option<String>,
}

impl Notification {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

impl Default for Notification {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_limit_enabled: true,
            window_seconds: 3600,
            max_per_window: 1,
            webhook_url: None,
            recipient: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Device {
    Simulated {
        device_id: String,
        initial_target: f64,
    },
    Nest {
        client_id: String,
        client_secret: String,
        refresh_token: String,
        project_id: String,
    },
}

impl Device {
    pub fn kind(&self) -> &'static str {
        match self {
            Device::Simulated { .. } => "simulated",
            Device::Nest { .. } => "nest",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub logger: Logger,
    pub database: Database,
    pub control: Control,
    #[serde(default)]
    pub retry: Retry,
    pub notification: Notification,
    pub device: Device,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or("development".into());

        let builder = Config::builder()
            .add_source(File::with_name("configs/default"))
            .add_source(File::with_name(&format!("configs/{run_mode}")).required(false))
            .add_source(Environment::with_prefix("THERMOSYNC").separator("__"));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    /// Parses and validates settings from a TOML document.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    /// Checks every value and reports all violations at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();
        let control = &self.control;

        if !(10..=3600).contains(&control.polling_interval_secs) {
            errors.push("control.polling_interval_secs must be within [10, 3600]".into());
        }
        if !(60..=86400).contains(&control.cooldown_period_secs) {
            errors.push("control.cooldown_period_secs must be within [60, 86400]".into());
        }
        if !(1.0..=20.0).contains(&control.temperature_threshold) {
            errors.push("control.temperature_threshold must be within [1.0, 20.0] °F".into());
        }
        if !(1.0..=20.0).contains(&control.temperature_adjustment) {
            errors.push("control.temperature_adjustment must be within [1.0, 20.0] °F".into());
        }
        if control.error_threshold < 1 {
            errors.push("control.error_threshold must be at least 1".into());
        }
        if control.degraded_watermark < 1 || control.degraded_watermark > control.error_threshold {
            errors.push("control.degraded_watermark must be within [1, error_threshold]".into());
        }
        if control.drain_timeout_secs < 1 {
            errors.push("control.drain_timeout_secs must be at least 1".into());
        }

        if self.server.host.parse::<IpAddr>().is_err() {
            errors.push(format!("server.host is not an IP address: {}", self.server.host));
        }
        if self.server.port < 1 {
            errors.push("server.port must be between 1 and 65535".into());
        }

        if self.retry.base_delay_ms < 1 || self.retry.max_delay_ms < self.retry.base_delay_ms {
            errors.push("retry.max_delay_ms must be at least retry.base_delay_ms (>= 1)".into());
        }
        if self.retry.attempt_timeout_secs < 1 {
            errors.push("retry.attempt_timeout_secs must be at least 1".into());
        }

        let notification = &self.notification;
        if notification.window_seconds < 1 {
            errors.push("notification.window_seconds must be at least 1".into());
        }
        if notification.max_per_window < 1 {
            errors.push("notification.max_per_window must be at least 1".into());
        }
        if let Some(url) = &notification.webhook_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push("notification.webhook_url must be an http(s) URL".into());
            }
            if notification.recipient.is_none() {
                errors.push("notification.recipient is required with a webhook".into());
            }
        }
        if let Some(recipient) = &notification.recipient {
            if !is_phone_number(recipient) {
                errors.push(format!(
                    "notification.recipient has an invalid format: {}",
                    mask_phone(recipient)
                ));
            }
        }

        match &self.device {
            Device::Simulated { device_id, .. } => {
                if device_id.trim().is_empty() {
                    errors.push("device.device_id must not be empty".into());
                }
            }
            Device::Nest {
                client_id,
                client_secret,
                refresh_token,
                project_id,
            } => {
                for (name, value) in [
                    ("client_id", client_id),
                    ("client_secret", client_secret),
                    ("refresh_token", refresh_token),
                    ("project_id", project_id),
                ] {
                    if value.trim().is_empty() {
                        errors.push(format!("device.{name} is required for the nest device"));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Message(format!(
                "configuration validation failed:\n{}",
                errors
                    .iter()
                    .map(|e| format!("  - {e}"))
                    .collect::<Vec<_>>()
                    .join("\n")
            )))
        }
    }
}

/// Accepts `480-442-0574`, `(480) 442-0574`, `4804420574` and `+14804420574`.
fn is_phone_number(value: &str) -> bool {
    let body = value.strip_prefix('+').unwrap_or(value);
    let digits = body.chars().filter(char::is_ascii_digit).count();

    body.chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')'))
        && (10..=15).contains(&digits)
}

/// Keeps only the last four characters, e.g. `***-***-0574`.
pub fn mask_phone(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() >= 4 {
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("***-***-{tail}")
    } else {
        "****".to_string()
    }
}
