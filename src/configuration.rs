// Copyright (c) 2022 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Configuration file handling.

use crate::util::string_from_env;
use config::Config;
use log::{info, warn};
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use std::env;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default configuration file.
pub const DEF_CONFIG_FILE: &str = "configuration.yaml";

/// Base URL of the generative language API.
pub const DEF_LLM_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEF_LLM_MODEL: &str = "gemini-2.5-flash-lite";

/// Environment variable for the language model API key.
///
/// Overrides `llm.api_key` of the configuration file.
pub const ENV_API_KEY: &str = "ML_API_KEY";

/// Environment variable for the settings storage directory.
///
/// Used if `storage.path` is not set in the configuration file.
pub const ENV_CONFIG_HOME: &str = "ML_CONFIG_HOME";

/// Environment variable to enable language model message tracing.
///
/// **Attention:** this setting is only for debugging and exposes the full request including the
/// API key!
pub const ENV_LLM_MSG_TRACING: &str = "ML_LLM_MSG_TRACING";

/// Environment variable prefix to override configuration keys, e.g. `ML_LLM__MODEL`.
const ENV_PREFIX: &str = "ML";

const APP_DIR: &str = "mood-light";

#[derive(Default, serde::Deserialize, serde::Serialize)]
pub struct Settings {
    pub llm: LanguageModelSettings,
    pub devices: DeviceSettings,
    pub storage: StorageSettings,
    pub server: ServerSettings,
}

/// Generative language API settings.
#[serde_as]
#[derive(Clone, serde::Deserialize, serde::Serialize)]
pub struct LanguageModelSettings {
    pub url: Url,
    pub model: String,
    #[serde(default)]
    api_key: String,
    /// Max time allowed to connect to the API host, including DNS name resolution.
    #[serde_as(as = "DurationSeconds")]
    #[serde(rename = "connection_timeout_sec")]
    pub connection_timeout: Duration,
    /// Total time before a response must be received.
    #[serde_as(as = "DurationSeconds")]
    #[serde(rename = "request_timeout_sec")]
    pub request_timeout: Duration,
    pub retry: RetrySettings,
}

impl Default for LanguageModelSettings {
    fn default() -> Self {
        Self {
            url: Url::parse(DEF_LLM_URL).expect("valid default LLM URL"),
            model: DEF_LLM_MODEL.to_string(),
            api_key: "".to_string(),
            connection_timeout: Duration::from_secs(20),
            request_timeout: Duration::from_secs(40),
            retry: RetrySettings {
                attempts: 2,
                delay: Duration::from_millis(300),
            },
        }
    }
}

impl LanguageModelSettings {
    /// Return the API key.
    ///
    /// The environment variable [`ENV_API_KEY`] has precedence over the configuration file.
    pub fn get_api_key(&self) -> String {
        string_from_env(ENV_API_KEY).unwrap_or_else(|| self.api_key.clone())
    }

    /// Set the API key of the configuration file layer. The key is taken as is.
    pub fn set_api_key(&mut self, api_key: impl Into<String>) {
        self.api_key = api_key.into();
    }
}

/// Smart bulb HTTP command settings.
#[serde_as]
#[derive(Clone, serde::Deserialize, serde::Serialize)]
pub struct DeviceSettings {
    /// HTTP port of the devices. The default port 80 is omitted in the command URL.
    pub port: u16,
    #[serde_as(as = "DurationSeconds")]
    #[serde(rename = "connection_timeout_sec")]
    pub connection_timeout: Duration,
    #[serde_as(as = "DurationSeconds")]
    #[serde(rename = "request_timeout_sec")]
    pub request_timeout: Duration,
    pub retry: RetrySettings,
    /// Device addresses stored when the registry is initialized for the very first time.
    pub defaults: Vec<String>,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            port: 80,
            connection_timeout: Duration::from_secs(20),
            request_timeout: Duration::from_secs(20),
            retry: RetrySettings {
                attempts: 2,
                delay: Duration::from_millis(200),
            },
            defaults: (50..=54).map(|i| format!("192.168.0.{i}")).collect(),
        }
    }
}

/// Fixed delay retry settings. There's no backoff.
#[serde_as]
#[derive(Clone, Copy, Debug, serde::Deserialize, serde::Serialize)]
pub struct RetrySettings {
    /// Total number of attempts, including the first one.
    pub attempts: u32,
    #[serde_as(as = "DurationMilliSeconds")]
    #[serde(rename = "delay_ms")]
    pub delay: Duration,
}

impl Display for RetrySettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "attempts={}, delay={:?}", self.attempts, self.delay)
    }
}

/// Local settings storage.
#[derive(Clone, serde::Deserialize, serde::Serialize)]
pub struct StorageSettings {
    /// Storage directory. If empty: [`ENV_CONFIG_HOME`] or the user's configuration directory.
    #[serde(default)]
    pub path: String,
    /// Settings namespace, used as file name.
    pub namespace: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: "".to_string(),
            namespace: "device-registry".to_string(),
        }
    }
}

impl StorageSettings {
    /// Resolve the storage directory.
    ///
    /// Order: configured `path`, env variable `ML_CONFIG_HOME`, platform configuration directory,
    /// current directory.
    pub fn directory(&self) -> PathBuf {
        if !self.path.trim().is_empty() {
            return PathBuf::from(self.path.trim());
        }
        if let Ok(dir) = env::var(ENV_CONFIG_HOME) {
            return PathBuf::from(dir);
        }
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[derive(Clone, serde::Deserialize, serde::Serialize)]
pub struct ServerSettings {
    pub interface: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            interface: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

/// Load the configuration settings.
///
/// The application provides default values which can be overriden in the following order:
/// 1. Configuration settings in the yaml configuration file specified in `filename`
/// 2. Environment variables with prefix `ML_`, nested keys separated with `__`.
///    E.g. `ML_LLM__MODEL=gemini-2.5-flash` sets the `llm.model` key.
pub fn get_configuration(filename: Option<&str>) -> Result<Settings, config::ConfigError> {
    // default configuration
    let mut config = Config::builder().add_source(Config::try_from(&Settings::default())?);
    // read optional configuration file to override defaults
    if let Some(filename) = filename {
        info!("Loading configuration file: {filename}");
        config = config.add_source(config::File::with_name(filename));
    }

    let config = config
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let settings: Settings = config.try_deserialize()?;

    check_cfg_values(settings)
}

fn check_cfg_values(mut settings: Settings) -> Result<Settings, config::ConfigError> {
    if settings.llm.retry.attempts == 0 || settings.llm.retry.delay > Duration::from_secs(60) {
        warn!(
            "Invalid language model retry settings ({}), using defaults.",
            settings.llm.retry
        );
        settings.llm.retry = LanguageModelSettings::default().retry;
    }
    if settings.devices.retry.attempts == 0
        || settings.devices.retry.delay > Duration::from_secs(60)
    {
        warn!(
            "Invalid device retry settings ({}), using defaults.",
            settings.devices.retry
        );
        settings.devices.retry = DeviceSettings::default().retry;
    }

    if settings.llm.request_timeout < settings.llm.connection_timeout {
        warn!("Language model request timeout is shorter than the connection timeout, adjusting.");
        settings.llm.request_timeout = settings.llm.connection_timeout;
    }

    match settings.llm.url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(config::ConfigError::Message(format!(
                "invalid scheme in llm.url: {scheme}. Valid: [http, https]"
            )));
        }
    }

    let model = settings.llm.model.trim();
    if model.is_empty() {
        warn!("Empty language model identifier, using default: {DEF_LLM_MODEL}");
        settings.llm.model = DEF_LLM_MODEL.to_string();
    } else if model.len() != settings.llm.model.len() {
        settings.llm.model = model.to_string();
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration_is_valid() {
        let settings = check_cfg_values(Settings::default());
        assert!(settings.is_ok(), "Default settings must be valid");
        let settings = settings.unwrap();
        assert_eq!(2, settings.llm.retry.attempts);
        assert_eq!(Duration::from_millis(300), settings.llm.retry.delay);
        assert_eq!(2, settings.devices.retry.attempts);
        assert_eq!(Duration::from_millis(200), settings.devices.retry.delay);
        assert_eq!(5, settings.devices.defaults.len());
        assert_eq!("192.168.0.50", settings.devices.defaults[0]);
    }

    #[test]
    fn invalid_llm_url_scheme_returns_error() {
        let mut settings = Settings::default();
        settings.llm.url = Url::parse("ftp://example.com").unwrap();
        assert!(check_cfg_values(settings).is_err());
    }

    #[test]
    fn zero_retry_attempts_are_replaced_with_defaults() {
        let mut settings = Settings::default();
        settings.llm.retry.attempts = 0;
        settings.devices.retry.attempts = 0;

        let settings = check_cfg_values(settings).unwrap();
        assert_eq!(2, settings.llm.retry.attempts);
        assert_eq!(2, settings.devices.retry.attempts);
    }

    #[test]
    fn blank_model_is_replaced_with_default() {
        let mut settings = Settings::default();
        settings.llm.model = "  ".into();

        let settings = check_cfg_values(settings).unwrap();
        assert_eq!(DEF_LLM_MODEL, settings.llm.model);
    }

    #[test]
    fn api_key_is_stored_verbatim() {
        let mut settings = LanguageModelSettings::default();
        settings.set_api_key(" key with spaces ");
        assert_eq!(" key with spaces ", settings.api_key);
    }

    #[test]
    fn configured_storage_path_has_precedence() {
        let storage = StorageSettings {
            path: " /tmp/mood ".into(),
            namespace: "test".into(),
        };
        assert_eq!(PathBuf::from("/tmp/mood"), storage.directory());
    }

    #[test]
    fn get_configuration_without_file_returns_defaults() {
        let settings = get_configuration(None).expect("default configuration");
        assert_eq!(DEF_LLM_URL, settings.llm.url.as_str().trim_end_matches('/'));
        assert_eq!("device-registry", settings.storage.namespace);
    }
}
