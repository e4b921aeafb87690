//! Server configuration.
//!
//! Values come from an optional TOML file, then environment variables on
//! top. The binary loads `.env` through `dotenvy` before calling
//! [`ServerConfig::load`], so `.env` entries behave like real variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use zeroize::Zeroizing;

/// Environment variable naming the TOML file.
pub const CONFIG_ENV: &str = "RAINCHECK_CONFIG";

/// TOML file read when [`CONFIG_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config/server.toml";

const DEFAULT_PORT: u16 = 1000;
const DEFAULT_AUTH_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MODEL: &str = "DeepSeek-R1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

// ---------------------------------------------------------------------------
// Secret values
// ---------------------------------------------------------------------------

/// A configuration value that must never appear in logs.
#[derive(Clone, Deserialize)]
#[serde(from = "String")]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(Zeroizing::new(value))
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Which scheme guards `POST /api/analyze-code`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzeAuth {
    /// Per-user tokens from the credential store.
    #[default]
    Issued,
    /// The shared service secret.
    Static,
}

impl std::str::FromStr for AnalyzeAuth {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issued" => Ok(Self::Issued),
            "static" => Ok(Self::Static),
            other => Err(ConfigError::Invalid {
                key: "ANALYZE_AUTH",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Invalid {
                key: "RAINCHECK_LOG_FORMAT",
                value: other.to_string(),
            }),
        }
    }
}

/// OpenAI-compatible chat completion endpoint used for reviews.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<SecretString>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_analysis_timeout")]
    pub timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: None,
            model: default_model(),
            timeout_secs: DEFAULT_ANALYSIS_TIMEOUT_SECS,
        }
    }
}

/// Federated identity provider whose ID tokens gate `/api/apikey`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub audience: String,
    #[serde(default)]
    pub hmac_secret: Option<SecretString>,
    /// PEM-encoded RSA public key.
    #[serde(default)]
    pub rsa_pem: Option<String>,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Shared service secret for the static scheme.
    pub api_key: Option<SecretString>,
    /// SQLite file for issued tokens. `None` keeps tokens in memory.
    pub database_path: Option<PathBuf>,
    /// Bound on every credential store or identity provider call.
    pub auth_timeout_ms: u64,
    pub analyze_auth: AnalyzeAuth,
    pub log_format: LogFormat,
    pub analysis: Option<AnalysisConfig>,
    pub identity: Option<IdentityConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            api_key: None,
            database_path: None,
            auth_timeout_ms: DEFAULT_AUTH_TIMEOUT_MS,
            analyze_auth: AnalyzeAuth::default(),
            log_format: LogFormat::default(),
            analysis: None,
            identity: None,
        }
    }
}

impl ServerConfig {
    /// Load from the TOML file and the process environment, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Like [`ServerConfig::load`] with an explicit variable lookup.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match non_empty(&lookup, CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay environment variables. Empty values count as unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(v) = non_empty(&lookup, "API_KEY") {
            self.api_key = Some(v.into());
        }
        if let Some(v) = non_empty(&lookup, "BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = non_empty(&lookup, "PORT") {
            self.port = parse("PORT", v)?;
        }
        if let Some(v) = non_empty(&lookup, "RAINCHECK_DB") {
            self.database_path = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty(&lookup, "AUTH_TIMEOUT_MS") {
            self.auth_timeout_ms = parse("AUTH_TIMEOUT_MS", v)?;
        }
        if let Some(v) = non_empty(&lookup, "ANALYZE_AUTH") {
            self.analyze_auth = v.parse()?;
        }
        if let Some(v) = non_empty(&lookup, "RAINCHECK_LOG_FORMAT") {
            self.log_format = v.parse()?;
        }

        if let Some(v) = non_empty(&lookup, "ANALYSIS_URL") {
            self.analysis.get_or_insert_with(AnalysisConfig::default).url = v;
        }
        if let Some(v) = non_empty(&lookup, "ANALYSIS_API_KEY") {
            self.analysis.get_or_insert_with(AnalysisConfig::default).api_key = Some(v.into());
        }
        if let Some(v) = non_empty(&lookup, "ANALYSIS_MODEL") {
            self.analysis.get_or_insert_with(AnalysisConfig::default).model = v;
        }

        if let Some(v) = non_empty(&lookup, "IDP_ISSUER") {
            self.identity.get_or_insert_with(IdentityConfig::default).issuer = v;
        }
        if let Some(v) = non_empty(&lookup, "IDP_AUDIENCE") {
            self.identity.get_or_insert_with(IdentityConfig::default).audience = v;
        }
        if let Some(v) = non_empty(&lookup, "IDP_HMAC_SECRET") {
            self.identity.get_or_insert_with(IdentityConfig::default).hmac_secret = Some(v.into());
        }
        if let Some(v) = non_empty(&lookup, "IDP_RSA_PEM") {
            self.identity.get_or_insert_with(IdentityConfig::default).rsa_pem = Some(v);
        }

        Ok(())
    }

    /// Reject configurations the server cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.as_ref().is_none_or(SecretString::is_empty) {
            return Err(ConfigError::Missing("API_KEY"));
        }
        if self.auth_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "AUTH_TIMEOUT_MS",
                value: "0".into(),
            });
        }

        if let Some(analysis) = &self.analysis
            && analysis.url.is_empty()
        {
            return Err(ConfigError::Missing("ANALYSIS_URL"));
        }

        if let Some(identity) = &self.identity {
            if identity.issuer.is_empty() {
                return Err(ConfigError::Missing("IDP_ISSUER"));
            }
            if identity.audience.is_empty() {
                return Err(ConfigError::Missing("IDP_AUDIENCE"));
            }
            match (&identity.hmac_secret, &identity.rsa_pem) {
                (Some(_), None) | (None, Some(_)) => {}
                (None, None) => return Err(ConfigError::Missing("IDP_HMAC_SECRET or IDP_RSA_PEM")),
                (Some(_), Some(_)) => {
                    return Err(ConfigError::Invalid {
                        key: "IDP_HMAC_SECRET",
                        value: "set together with IDP_RSA_PEM".into(),
                    });
                }
            }
        }

        Ok(())
    }

    /// The `host:port` string to bind.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.is_empty())
}

fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}

fn default_analysis_timeout() -> u64 {
    DEFAULT_ANALYSIS_TIMEOUT_SECS
}
