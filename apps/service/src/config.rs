use std::time::Duration;
use std::{env, fmt, fs, io, path};

use chrono::Weekday;
use heartbeat::EngineConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to write {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config directory available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: Monitor,
    pub database: Database,
    pub http: Http,
    pub alerts: Alerts,
    pub report: Report,
    pub logging: Logging,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitor {
    pub tick_seconds: u64,
    pub probe_timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    /// Local file path, or a `libsql://` / `https://` remote URL
    pub url: String,
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Http {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Alerts {
    pub discord: Discord,
    pub email: Email,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Discord {
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Email {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub recipient: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
    pub enabled: bool,
    /// Day of week, e.g. "Mon" or "monday"
    pub weekday: String,
    /// Local hour of day, 0-23
    pub hour: u32,
    pub days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub format: String,
}

impl Default for Monitor {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            tick_seconds: engine.tick_period.as_secs(),
            probe_timeout_seconds: engine.probe_timeout.as_secs(),
            retry_attempts: engine.retry_attempts,
            retry_delay_seconds: engine.retry_delay.as_secs(),
        }
    }
}

impl Default for Database {
    fn default() -> Self {
        Self { url: "heartbeat.db".into(), auth_token: None }
    }
}

impl Default for Http {
    fn default() -> Self {
        Self { bind: "0.0.0.0".into(), port: 3000 }
    }
}

impl Default for Email {
    fn default() -> Self {
        Self {
            host: None,
            port: 465,
            username: None,
            password: None,
            from: "\"Uptime Monitor\" <alerts@localhost>".into(),
            recipient: None,
        }
    }
}

impl Default for Report {
    fn default() -> Self {
        Self { enabled: true, weekday: "Mon".into(), hour: 9, days: 7 }
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self { level: "info".into(), format: "compact".into() }
    }
}

impl Monitor {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tick_period: Duration::from_secs(self.tick_seconds),
            probe_timeout: Duration::from_secs(self.probe_timeout_seconds),
            retry_attempts: self.retry_attempts,
            retry_delay: Duration::from_secs(self.retry_delay_seconds),
        }
    }
}

impl Email {
    /// Host and recipient are both required to send anything
    pub fn is_configured(&self) -> bool {
        self.host.as_deref().is_some_and(|h| !h.is_empty())
            && self.recipient.as_deref().is_some_and(|r| !r.is_empty())
    }
}

impl Report {
    pub fn weekday(&self) -> Result<Weekday, Error> {
        self.weekday
            .parse::<Weekday>()
            .map_err(|_| Error::Invalid(format!("report.weekday '{}' is not a day of week", self.weekday)))
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/heartbeat/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("heartbeat/config.toml"))
}

fn mask(secret: &Option<String>) -> &'static str {
    if secret.as_deref().is_some_and(|s| !s.is_empty()) { "<set>" } else { "<unset>" }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Monitor")?;
        write_1(f, "Tick (s)", &self.monitor.tick_seconds)?;
        write_1(f, "Probe Timeout (s)", &self.monitor.probe_timeout_seconds)?;
        write_1(f, "Retry Attempts", &self.monitor.retry_attempts)?;
        write_1(f, "Retry Delay (s)", &self.monitor.retry_delay_seconds)?;
        write_title_1(f, "Database")?;
        write_1(f, "URL", &self.database.url)?;
        write_1(f, "Auth Token", &mask(&self.database.auth_token))?;
        write_title_1(f, "HTTP")?;
        write_1(f, "Bind Address", &self.http.bind)?;
        write_1(f, "Port", &self.http.port)?;
        write_title_1(f, "Alerts")?;
        write_1(f, "Discord Webhook", &mask(&self.alerts.discord.webhook_url))?;
        write_1(f, "Email Host", &self.alerts.email.host.as_deref().unwrap_or("<unset>"))?;
        write_1(f, "Email Recipient", &self.alerts.email.recipient.as_deref().unwrap_or("<unset>"))?;
        write_title_1(f, "Report")?;
        write_1(f, "Enabled", &self.report.enabled)?;
        write_1(f, "Schedule", &format!("{} {:02}:00", self.report.weekday, self.report.hour))?;
        write_title_1(f, "Logging")?;
        write_1(f, "Level", &self.logging.level)?;
        write_1(f, "Format", &self.logging.format)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/heartbeat/config.toml
    ///  or the specified path, with the name config.toml if one does not exist.
    /// Environment overrides are applied after reading.
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let mut config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            toml::from_str(raw_string.as_str())?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.apply_env(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| Error::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str).map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })
    }

    /// Override file values with environment variables found by `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(token) = var("DATABASE_AUTH_TOKEN") {
            self.database.auth_token = Some(token);
        }
        if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
            self.http.port = port;
        }
        if let Some(url) = var("DISCORD_WEBHOOK_URL") {
            self.alerts.discord.webhook_url = Some(url);
        }

        let email = &mut self.alerts.email;
        if let Some(host) = var("EMAIL_HOST") {
            email.host = Some(host);
        }
        if let Some(port) = var("EMAIL_PORT").and_then(|p| p.parse().ok()) {
            email.port = port;
        }
        if let Some(user) = var("EMAIL_USER") {
            email.username = Some(user);
        }
        if let Some(pass) = var("EMAIL_PASS") {
            email.password = Some(pass);
        }
        if let Some(from) = var("EMAIL_FROM") {
            email.from = from;
        }
        if let Some(recipient) = var("ALERT_RECIPIENT_EMAIL") {
            email.recipient = Some(recipient);
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |msg: &str| Err(Error::Invalid(msg.to_string()));

        if self.monitor.tick_seconds == 0 {
            return invalid("monitor.tick_seconds must be greater than 0");
        }
        if self.monitor.probe_timeout_seconds == 0 {
            return invalid("monitor.probe_timeout_seconds must be greater than 0");
        }
        if self.monitor.retry_attempts == 0 {
            return invalid("monitor.retry_attempts must be greater than 0");
        }
        if self.database.url.trim().is_empty() {
            return invalid("database.url must not be empty");
        }
        if self.report.hour > 23 {
            return invalid("report.hour must be between 0 and 23");
        }
        if self.report.days == 0 {
            return invalid("report.days must be greater than 0");
        }
        self.report.weekday()?;
        self.logging.format.parse::<logger::LogFormat>().map_err(Error::Invalid)?;

        Ok(())
    }
}
