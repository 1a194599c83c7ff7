use std::net::SocketAddr;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "HerediCheck";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Hosted prediction service (`POST /predict_proba`).
pub const DEFAULT_PREDICTION_URL: &str = "https://api-heredicheck.up.railway.app";

/// Public R4 sandbox used when no FHIR base is configured.
pub const DEFAULT_FHIR_BASE_URL: &str = "https://r4.smarthealthit.org";

/// OpenAI-compatible chat completions endpoint for the assistant.
pub const DEFAULT_CHAT_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.0-flash";

/// Outbound request timeout. The hosted services have none of their own.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "heredicheck_lib=info,tower_http=info"
}

/// Runtime configuration, read from `HEREDICHECK_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub prediction_url: String,
    pub fhir_base_url: String,
    pub chat_url: String,
    pub chat_model: String,
    pub chat_api_key: Option<String>,
    pub bind_addr: SocketAddr,
    pub request_timeout_secs: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            prediction_url: DEFAULT_PREDICTION_URL.to_string(),
            fhir_base_url: DEFAULT_FHIR_BASE_URL.to_string(),
            chat_url: DEFAULT_CHAT_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            chat_api_key: None,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = match get("HEREDICHECK_BIND_ADDR") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                var: "HEREDICHECK_BIND_ADDR",
                value: raw,
            })?,
            None => defaults.bind_addr,
        };

        let request_timeout_secs = match get("HEREDICHECK_REQUEST_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "HEREDICHECK_REQUEST_TIMEOUT_SECS",
                        value: raw,
                    })
                }
            },
            None => defaults.request_timeout_secs,
        };

        Ok(Self {
            prediction_url: get("HEREDICHECK_PREDICTION_URL").unwrap_or(defaults.prediction_url),
            fhir_base_url: get("HEREDICHECK_FHIR_BASE_URL").unwrap_or(defaults.fhir_base_url),
            chat_url: get("HEREDICHECK_CHAT_URL").unwrap_or(defaults.chat_url),
            chat_model: get("HEREDICHECK_CHAT_MODEL").unwrap_or(defaults.chat_model),
            chat_api_key: get("HEREDICHECK_CHAT_API_KEY"),
            bind_addr,
            request_timeout_secs,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
