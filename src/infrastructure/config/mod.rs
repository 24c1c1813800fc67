use crate::domain::audio::{FailurePolicy, OutputFormat};
use crate::domain::auth::parse_algorithm;
use crate::domain::tts::{DispatcherConfig, RetryPolicy, VoiceParams};
use crate::infrastructure::iam::DEFAULT_IAM_TOKEN_URL;
use crate::infrastructure::repositories::DEFAULT_SPEECHKIT_TTS_URL;
use jsonwebtoken::Algorithm;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: &'static str, message: String },
}

fn invalid(name: &'static str, message: impl fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        name,
        message: message.to_string(),
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected `pretty` or `json`, got `{}`", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level `{}`", other)),
        }
    }
}

/// Service account key material
#[derive(Clone)]
pub struct CredentialConfig {
    pub key_id: String,
    pub service_account_id: String,
    pub algorithm: Algorithm,
    pub private_key: String,
    pub public_key: Option<String>,
}

impl fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("key_id", &self.key_id)
            .field("service_account_id", &self.service_account_id)
            .field("algorithm", &self.algorithm)
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key.as_ref().map(|_| "<set>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Voice
    pub voice: String,
    pub role: String,
    pub language: String,
    pub sample_rate: u32,
    pub default_format: OutputFormat,
    // Segmentation
    pub max_chunk_size: usize,
    // Dispatch
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub max_retry_delay: Duration,
    pub retry_jitter: f64,
    pub requests_per_second: f64,
    pub rate_limit_burst: u32,
    pub max_concurrency: usize,
    pub max_auth_refreshes: u32,
    pub token_refresh_margin: Duration,
    pub shutdown_grace: Duration,
    pub request_timeout: Duration,
    // Assembly
    pub failure_policy: FailurePolicy,
    pub gap_marker: Duration,
    pub ffmpeg_path: PathBuf,
    pub temp_dir: PathBuf,
    // Remote endpoints
    pub speechkit_url: String,
    pub iam_token_url: String,
    pub folder_id: Option<String>,
    // Logging
    pub log_level: LogLevel,
    pub log_format: LogFormat,
    pub credentials: CredentialConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let credentials = CredentialConfig {
            key_id: vars.required("YANDEX_KEY_ID")?,
            service_account_id: vars.required("YANDEX_SERVICE_ACCOUNT_ID")?,
            algorithm: parse_algorithm(&vars.string("YANDEX_KEY_ALGORITHM", "RSA_2048"))
                .map_err(|e| invalid("YANDEX_KEY_ALGORITHM", e))?,
            private_key: vars.required("YANDEX_PRIVATE_KEY")?,
            public_key: vars.optional("YANDEX_PUBLIC_KEY"),
        };

        let config = Config {
            voice: vars.string("DEFAULT_VOICE", "jane"),
            role: vars.string("DEFAULT_ROLE", "good"),
            language: vars.string("SPEECH_LANGUAGE", "ru-RU"),
            sample_rate: vars.parsed("SYNTHESIS_SAMPLE_RATE", 48_000)?,
            default_format: vars.parsed("DEFAULT_FORMAT", OutputFormat::Wav)?,
            max_chunk_size: vars.parsed("MAX_CHUNK_SIZE", 4500)?,
            max_retries: vars.parsed("MAX_RETRIES", 3)?,
            retry_delay: vars.seconds("RETRY_DELAY", 1.0)?,
            max_retry_delay: vars.seconds("MAX_RETRY_DELAY", 30.0)?,
            retry_jitter: vars.parsed("RETRY_JITTER", 0.1)?,
            requests_per_second: vars.parsed("REQUESTS_PER_SECOND", 35.0)?,
            rate_limit_burst: vars.parsed("RATE_LIMIT_BURST", 1)?,
            max_concurrency: vars.parsed("MAX_CONCURRENCY", 4)?,
            max_auth_refreshes: vars.parsed("MAX_AUTH_REFRESHES", 5)?,
            token_refresh_margin: vars.seconds("TOKEN_REFRESH_MARGIN", 60.0)?,
            shutdown_grace: vars.seconds("SHUTDOWN_GRACE", 5.0)?,
            request_timeout: vars.seconds("REQUEST_TIMEOUT", 30.0)?,
            failure_policy: vars.parsed("FAILED_CHUNK_POLICY", FailurePolicy::Abort)?,
            gap_marker: Duration::from_millis(vars.parsed("GAP_MARKER_MS", 1000)?),
            ffmpeg_path: PathBuf::from(vars.string("FFMPEG_PATH", "ffmpeg")),
            temp_dir: vars
                .optional("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| env::temp_dir().join("text-to-audio")),
            speechkit_url: vars.string("SPEECHKIT_TTS_URL", DEFAULT_SPEECHKIT_TTS_URL),
            iam_token_url: vars.string("IAM_TOKEN_URL", DEFAULT_IAM_TOKEN_URL),
            folder_id: vars.optional("YANDEX_FOLDER_ID"),
            log_level: vars.parsed("LOG_LEVEL", LogLevel::Info)?,
            log_format: vars.parsed("LOG_FORMAT", LogFormat::Pretty)?,
            credentials,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_chunk_size == 0 {
            return Err(invalid("MAX_CHUNK_SIZE", "must be greater than zero"));
        }
        if self.max_concurrency == 0 {
            return Err(invalid("MAX_CONCURRENCY", "must be greater than zero"));
        }
        if !self.requests_per_second.is_finite() || self.requests_per_second <= 0.0 {
            return Err(invalid("REQUESTS_PER_SECOND", "must be a positive number"));
        }
        if !(0.0..=1.0).contains(&self.retry_jitter) {
            return Err(invalid("RETRY_JITTER", "must be between 0 and 1"));
        }
        if self.sample_rate == 0 {
            return Err(invalid("SYNTHESIS_SAMPLE_RATE", "must be greater than zero"));
        }
        if self.max_retry_delay < self.retry_delay {
            return Err(invalid("MAX_RETRY_DELAY", "must not be shorter than RETRY_DELAY"));
        }
        Ok(())
    }

    pub fn voice_params(&self) -> VoiceParams {
        VoiceParams {
            voice: self.voice.clone(),
            role: self.role.clone(),
            language: self.language.clone(),
            sample_rate: self.sample_rate,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: self.retry_delay,
            max_delay: self.max_retry_delay,
            jitter: self.retry_jitter,
            max_auth_refreshes: self.max_auth_refreshes,
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            max_concurrency: self.max_concurrency,
            requests_per_second: self.requests_per_second,
            rate_limit_burst: self.rate_limit_burst,
            retry: self.retry_policy(),
            shutdown_grace: self.shutdown_grace,
        }
    }
}

/// Typed reads over a variable lookup
struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn string(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.optional(name) {
            Some(value) => value.parse().map_err(|e| invalid(name, e)),
            None => Ok(default),
        }
    }

    fn seconds(&self, name: &'static str, default: f64) -> Result<Duration, ConfigError> {
        let secs: f64 = self.parsed(name, default)?;
        Duration::try_from_secs_f64(secs).map_err(|e| invalid(name, e))
    }
}
