//! Configuration loading for vendorad.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.vendora/config.toml` (user)
//! 3. `/etc/vendora/config.toml` (system)
//!
//! Every field has a default; with no file at all the defaults are used.
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.vendora/secrets.toml` (user, must be 0600 or 0400)
//! 2. `/etc/vendora/secrets.toml` (system, must be 0600 or 0400)

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::agent::{ConversationConfig, ModelConfig};
use crate::business::BusinessDataConfig;
use crate::resilience::{BreakerConfig, CacheConfig, RetryConfig};
use crate::{Result, VendoraError};

/// Daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub breaker: BreakerSection,
    pub cache: CacheSection,
    pub locks: LocksSection,
    pub conversation: ConversationSection,
    pub model: ModelSection,
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0:8001).
    pub address: String,
    /// Budget for one chat request, agent build included (default: 120).
    pub chat_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8001".to_string(),
            chat_timeout_secs: 120,
        }
    }
}

/// Business API endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub information_url: String,
    /// FAQ endpoint; the information URL when unset.
    pub faq_url: Option<String>,
    /// Per-request timeout in seconds (default: 10).
    pub timeout_secs: u64,
    pub retry: RetrySection,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            information_url: "https://api.maravia.pe/servicio/ws_informacion_ia.php".to_string(),
            faq_url: None,
            timeout_secs: 10,
            retry: RetrySection::default(),
        }
    }
}

impl UpstreamConfig {
    pub fn faq_url(&self) -> &str {
        self.faq_url.as_deref().unwrap_or(&self.information_url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 4_000,
        }
    }
}

impl From<&RetrySection> for RetryConfig {
    fn from(section: &RetrySection) -> Self {
        RetryConfig::new()
            .max_attempts(section.max_attempts)
            .initial_delay(Duration::from_millis(section.initial_delay_ms))
            .max_delay(Duration::from_millis(section.max_delay_ms))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BreakerSection {
    pub threshold: u32,
    pub reset_ttl_secs: u64,
    pub max_keys: usize,
}

impl Default for BreakerSection {
    fn default() -> Self {
        Self {
            threshold: 3,
            reset_ttl_secs: 300,
            max_keys: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub agent_max_entries: usize,
    pub agent_ttl_secs: u64,
    pub data_max_entries: usize,
    pub data_ttl_secs: u64,
    pub search_max_entries: usize,
    pub search_ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            agent_max_entries: 500,
            agent_ttl_secs: 3_600,
            data_max_entries: 500,
            data_ttl_secs: 3_600,
            search_max_entries: 2_000,
            search_ttl_secs: 900,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocksSection {
    /// Session lock registry size that triggers a sweep (default: 1500).
    pub session_sweep_threshold: usize,
}

impl Default for LocksSection {
    fn default() -> Self {
        Self {
            session_sweep_threshold: crate::resilience::DEFAULT_SESSION_SWEEP_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConversationSection {
    pub max_sessions: usize,
    pub session_ttl_secs: u64,
    pub max_messages: usize,
}

impl Default for ConversationSection {
    fn default() -> Self {
        Self {
            max_sessions: 10_000,
            session_ttl_secs: 86_400,
            max_messages: 40,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    /// `openai`, `anthropic`, `openrouter`, `ollama` or `google`.
    pub backend: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub base_url: Option<String>,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            backend: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.5,
            max_tokens: 2048,
            timeout_secs: 90,
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset (default: info).
    pub level: String,
    /// `text` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// An explicit path must exist. Without one, the first of
    /// `~/.vendora/config.toml` and `/etc/vendora/config.toml` is used, or
    /// the defaults when neither exists.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            VendoraError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::parse(&content).map_err(|e| match e {
            VendoraError::Configuration(msg) => {
                VendoraError::Configuration(format!("Config file {path:?}: {msg}"))
            }
            other => other,
        })
    }

    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| VendoraError::Configuration(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(VendoraError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".vendora").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/vendora/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    fn validate(&self) -> Result<()> {
        if self.upstream.information_url.trim().is_empty() {
            return Err(VendoraError::Configuration(
                "upstream.information_url is empty".to_string(),
            ));
        }
        if self.server.chat_timeout_secs == 0 {
            return Err(VendoraError::Configuration(
                "server.chat_timeout_secs must be positive".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(VendoraError::Configuration(format!(
                "model.temperature {} is outside 0.0..=2.0",
                self.model.temperature
            )));
        }
        match self.logging.format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(VendoraError::Configuration(format!(
                "logging.format must be \"text\" or \"json\", got {other:?}"
            ))),
        }
    }

    pub fn chat_timeout(&self) -> Duration {
        Duration::from_secs(self.server.chat_timeout_secs)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig::from(&self.upstream.retry)
    }

    pub fn breaker(&self) -> BreakerConfig {
        BreakerConfig::new()
            .threshold(self.breaker.threshold)
            .reset_ttl(Duration::from_secs(self.breaker.reset_ttl_secs))
            .max_keys(self.breaker.max_keys)
    }

    pub fn agent_cache(&self) -> CacheConfig {
        CacheConfig::new()
            .max_entries(self.cache.agent_max_entries)
            .ttl(Duration::from_secs(self.cache.agent_ttl_secs))
    }

    pub fn business(&self) -> BusinessDataConfig {
        BusinessDataConfig {
            breaker: self.breaker(),
            data_cache: CacheConfig::new()
                .max_entries(self.cache.data_max_entries)
                .ttl(Duration::from_secs(self.cache.data_ttl_secs)),
            search_cache: CacheConfig::new()
                .max_entries(self.cache.search_max_entries)
                .ttl(Duration::from_secs(self.cache.search_ttl_secs)),
        }
    }

    pub fn conversation(&self) -> ConversationConfig {
        ConversationConfig::new()
            .max_sessions(self.conversation.max_sessions)
            .session_ttl(Duration::from_secs(self.conversation.session_ttl_secs))
            .max_messages(self.conversation.max_messages)
    }

    /// Model settings with the backend's key from `secrets`.
    pub fn model(&self, secrets: &Secrets) -> ModelConfig {
        let mut config = ModelConfig::new()
            .backend(&self.model.backend)
            .model(&self.model.model)
            .temperature(self.model.temperature)
            .max_tokens(self.model.max_tokens)
            .timeout(Duration::from_secs(self.model.timeout_secs));
        if let Some(ref url) = self.model.base_url {
            config = config.base_url(url);
        }
        if let Some(key) = secrets.api_key(&self.model.backend) {
            config = config.api_key(key);
        }
        config
    }
}

/// Secrets configuration (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub openai: Option<ApiKeySecret>,
    #[serde(default)]
    pub anthropic: Option<ApiKeySecret>,
    #[serde(default)]
    pub openrouter: Option<ApiKeySecret>,
    #[serde(default)]
    pub google: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

/// Backend name → environment variable name mapping.
const BACKEND_ENV_VARS: &[(&str, &str)] = &[
    ("openai", "OPENAI_API_KEY"),
    ("anthropic", "ANTHROPIC_API_KEY"),
    ("openrouter", "OPENROUTER_API_KEY"),
    ("google", "GOOGLE_API_KEY"),
];

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns empty secrets if no file exists (keys may come from env vars).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".vendora").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/vendora/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load a secrets file after checking its permissions.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            VendoraError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            VendoraError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            VendoraError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(VendoraError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// API key for a backend, falling back to its environment variable.
    pub fn api_key(&self, backend: &str) -> Option<String> {
        let from_file = match backend {
            "openai" => self.openai.as_ref(),
            "anthropic" => self.anthropic.as_ref(),
            "openrouter" => self.openrouter.as_ref(),
            "google" => self.google.as_ref(),
            _ => None,
        }
        .map(|s| s.api_key.clone());

        from_file.or_else(|| {
            BACKEND_ENV_VARS
                .iter()
                .find(|(name, _)| *name == backend)
                .and_then(|(_, env_var)| std::env::var(env_var).ok())
                .filter(|key| !key.trim().is_empty())
        })
    }
}
