use crate::error::{NotifierError, Result};
use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Notification id used when `NotifyId` is not configured.
pub const DEFAULT_NOTIFY_ID: &str = "weather_warning";

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: We're single-threaded at this point (called before any async runtime)
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut vars = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Find the first '=' and split there
        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            // Remove surrounding quotes if present
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            vars.push((key, value));
        }
    }

    vars
}

/// Default location of the app options file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("weather-warning-notifier").join("config.json"))
}

/// Pick the options file to load. An explicitly given path is always used;
/// the default location only when a file exists there.
pub fn options_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| default_config_path().filter(|path| path.exists()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub hass: HassConfig,
    pub app: NotifierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HassConfig {
    /// WebSocket endpoint, e.g. `ws://homeassistant.local:8123/api/websocket`
    pub url: String,
    /// Long-lived access token
    pub token: Option<String>,
}

/// App options as written by the user. Every field is optional; missing
/// values are reported and defaulted by [`NotifierSettings::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NotifierConfig {
    #[serde(default)]
    pub notify_title_prefix: Option<String>,
    #[serde(default)]
    pub notify_id: Option<String>,
    #[serde(default)]
    pub persistent_notification: Option<bool>,
    #[serde(default)]
    pub weather_warning_entity: Option<String>,
    #[serde(default)]
    pub mobile_notify_services: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hass: HassConfig {
                url: "ws://homeassistant.local:8123/api/websocket".to_string(),
                token: None,
            },
            app: NotifierConfig::default(),
        }
    }
}

impl Config {
    /// Load app options from `path` and then apply environment overrides on
    /// top. A given path that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = path {
            config.app = NotifierConfig::from_file(path).inspect_err(|e| {
                error!("Failed to read options file {}: {}", path.display(), e);
            })?;
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("HASS_URL") {
            self.hass.url = url;
        }
        if let Some(token) = lookup("HASS_TOKEN") {
            self.hass.token = Some(token);
        }

        if let Some(prefix) = lookup("NOTIFY_TITLE_PREFIX") {
            self.app.notify_title_prefix = Some(prefix);
        }
        if let Some(id) = lookup("NOTIFY_ID") {
            self.app.notify_id = Some(id);
        }
        if let Some(persistent) = lookup("PERSISTENT_NOTIFICATION") {
            match persistent.trim().parse() {
                Ok(p) => self.app.persistent_notification = Some(p),
                Err(_) => warn!(
                    "Ignoring PERSISTENT_NOTIFICATION='{}', expected true or false",
                    persistent
                ),
            }
        }
        if let Some(entity) = lookup("WEATHER_WARNING_ENTITY") {
            self.app.weather_warning_entity = Some(entity);
        }
        if let Some(services) = lookup("MOBILE_NOTIFY_SERVICES") {
            self.app.mobile_notify_services = Some(
                services
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            );
        }
    }
}

impl NotifierConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Validated notifier options with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct NotifierSettings {
    pub title_prefix: String,
    pub notify_id: String,
    pub persistent_notification: bool,
    pub weather_warning_entity: String,
    pub mobile_notify_services: Vec<String>,
}

impl NotifierSettings {
    /// Apply defaults to missing options, logging a warning for each one.
    ///
    /// A missing `WeatherWarningEntity` is the only error; the caller is
    /// expected to leave the notifier inert in that case.
    pub fn resolve(config: &NotifierConfig) -> Result<Self> {
        let title_prefix = match config.notify_title_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => prefix.to_string(),
            _ => {
                warn!("Option 'NotifyTitlePrefix' not found. No default value is used.");
                String::new()
            }
        };

        let notify_id = match config.notify_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                warn!(
                    "Option 'NotifyId' not found. Default value '{}' is used.",
                    DEFAULT_NOTIFY_ID
                );
                DEFAULT_NOTIFY_ID.to_string()
            }
        };

        let persistent_notification = config.persistent_notification.unwrap_or_else(|| {
            warn!("Option 'PersistentNotification' not found. Default value 'true' is used.");
            true
        });

        let weather_warning_entity = match config.weather_warning_entity.as_deref() {
            Some(entity) if !entity.trim().is_empty() => entity.trim().to_string(),
            _ => {
                error!("Option 'WeatherWarningEntity' not found.");
                return Err(NotifierError::MissingOption("WeatherWarningEntity"));
            }
        };

        let mut mobile_notify_services: Vec<String> = Vec::new();
        for service in config.mobile_notify_services.iter().flatten() {
            if !mobile_notify_services.contains(service) {
                mobile_notify_services.push(service.clone());
            }
        }

        Ok(Self {
            title_prefix,
            notify_id,
            persistent_notification,
            weather_warning_entity,
            mobile_notify_services,
        })
    }
}
