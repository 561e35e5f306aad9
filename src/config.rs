//! Configuration
//!
//! Everything is read from environment variables (optionally via a `.env`
//! file). Missing model credentials are not an error here: they only matter
//! once the LLM backend is selected.

use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::{AssistantError, Result};
use crate::store::WooCommerceSettings;

/// Default OpenAI-compatible endpoint
const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model
const DEFAULT_MODEL: &str = "gpt-4o-mini";

const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DEADLINE_SECS: u64 = 90;
const DEFAULT_HISTORY_LIMIT: usize = 10;
const DEFAULT_HISTORY_MAX_AGE_DAYS: i64 = 7;
const DEFAULT_BIND: &str = "0.0.0.0:3000";

/// Which path answers questions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssistantBackend {
    /// Keyword dispatcher plus deterministic answer text
    #[default]
    Rule,
    /// Function-calling chat model
    Llm,
}

impl AssistantBackend {
    pub fn name(&self) -> &'static str {
        match self {
            AssistantBackend::Rule => "rule",
            AssistantBackend::Llm => "llm",
        }
    }
}

/// Error type for parsing AssistantBackend
#[derive(Debug)]
pub struct ParseBackendError(String);

impl std::fmt::Display for ParseBackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ParseBackendError {}

impl FromStr for AssistantBackend {
    type Err = ParseBackendError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rule" | "rules" | "keyword" => Ok(AssistantBackend::Rule),
            "llm" | "openai" | "model" => Ok(AssistantBackend::Llm),
            other => Err(ParseBackendError(format!(
                "Unknown ASSISTANT_BACKEND '{}'. Valid values: rule, llm",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AssistantBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Chat model connection settings
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: Url,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl LlmSettings {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            base_url: parse_url("LLM_BASE_URL", DEFAULT_LLM_BASE_URL)?,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        })
    }
}

/// Bounds on the conversation turns loaded as context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistorySettings {
    pub limit: usize,
    pub max_age_days: i64,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            limit: DEFAULT_HISTORY_LIMIT,
            max_age_days: DEFAULT_HISTORY_MAX_AGE_DAYS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub backend: AssistantBackend,
    /// `None` when no API key is configured
    pub llm: Option<LlmSettings>,
    /// `None` runs against the bundled demo store
    pub woocommerce: Option<WooCommerceSettings>,
    pub history: HistorySettings,
    /// Upper bound on one whole exchange
    pub request_deadline: Duration,
    pub bind_addr: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            backend: AssistantBackend::default(),
            llm: None,
            woocommerce: None,
            history: HistorySettings::default(),
            request_deadline: Duration::from_secs(DEFAULT_DEADLINE_SECS),
            bind_addr: DEFAULT_BIND.to_string(),
        }
    }
}

impl AssistantConfig {
    /// Load from the process environment, reading `.env` first if present
    pub fn from_env() -> Result<Self> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                tracing::warn!(error = %err, "Failed to read .env file");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend = match get("ASSISTANT_BACKEND") {
            Some(value) => value
                .parse()
                .map_err(|e: ParseBackendError| AssistantError::Configuration(e.to_string()))?,
            None => AssistantBackend::default(),
        };

        let timeout = Duration::from_secs(parse_number(
            "LLM_TIMEOUT_SECS",
            get("LLM_TIMEOUT_SECS"),
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?);

        let llm = match get("LLM_API_KEY") {
            Some(api_key) => Some(LlmSettings {
                api_key,
                base_url: parse_url(
                    "LLM_BASE_URL",
                    get("LLM_BASE_URL").as_deref().unwrap_or(DEFAULT_LLM_BASE_URL),
                )?,
                model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                temperature: parse_number(
                    "LLM_TEMPERATURE",
                    get("LLM_TEMPERATURE"),
                    DEFAULT_TEMPERATURE,
                )?,
                timeout,
            }),
            None => None,
        };

        let woocommerce = match get("WC_BASE_URL") {
            Some(base) => Some(WooCommerceSettings {
                base_url: parse_url("WC_BASE_URL", &base)?,
                consumer_key: get("WC_CONSUMER_KEY").ok_or_else(|| {
                    AssistantError::Configuration("WC_CONSUMER_KEY is not set".into())
                })?,
                consumer_secret: get("WC_CONSUMER_SECRET").ok_or_else(|| {
                    AssistantError::Configuration("WC_CONSUMER_SECRET is not set".into())
                })?,
                timeout,
            }),
            None => None,
        };

        Ok(Self {
            backend,
            llm,
            woocommerce,
            history: HistorySettings {
                limit: parse_number("HISTORY_LIMIT", get("HISTORY_LIMIT"), DEFAULT_HISTORY_LIMIT)?,
                max_age_days: parse_number(
                    "HISTORY_MAX_AGE_DAYS",
                    get("HISTORY_MAX_AGE_DAYS"),
                    DEFAULT_HISTORY_MAX_AGE_DAYS,
                )?,
            },
            request_deadline: Duration::from_secs(parse_number(
                "ASSISTANT_DEADLINE_SECS",
                get("ASSISTANT_DEADLINE_SECS"),
                DEFAULT_DEADLINE_SECS,
            )?),
            bind_addr: get("ASSISTANT_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
        })
    }

    /// Model settings, required once the LLM backend is selected
    pub fn require_llm(&self) -> Result<&LlmSettings> {
        self.llm
            .as_ref()
            .ok_or_else(|| AssistantError::Configuration("LLM_API_KEY is not set".into()))
    }
}

fn parse_url(key: &str, value: &str) -> Result<Url> {
    Url::parse(value)
        .map_err(|e| AssistantError::Configuration(format!("{} is not a valid URL: {}", key, e)))
}

fn parse_number<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        Some(raw) => raw.parse().map_err(|_| {
            AssistantError::Configuration(format!("{} must be a number, got '{}'", key, raw))
        }),
        None => Ok(default),
    }
}
