//! # Lookup Configuration
//!
//! Configuration management for the lookup service.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     LOOKUP_TIMEOUT_SECONDS=2.5                                         │
//! │     EAN_DB_API_KEY=...                                                 │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/larder/lookup.toml (Linux)                               │
//! │     ~/Library/Application Support/com.larder.larder/lookup.toml        │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     3 s timeout, 2 attempts, breaker after 3 failures                  │
//! │                                                                         │
//! │  Then: clamp() pulls values into their min/max range, validate()       │
//! │  rejects what cannot be repaired.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [policy]
//! timeout_ms = 3000
//! max_attempts = 2
//! retry_base_delay_ms = 350
//! provider_spacing_ms = 250
//! breaker_failure_threshold = 3
//! breaker_cooldown_secs = 60
//! negative_cache_secs = 180
//!
//! [policy.provider_timeouts_ms]
//! barcode_list_mirror = 6000
//!
//! [providers]
//! local_index_path = "/var/lib/larder/index.json"
//! ean_db_enabled = true
//! ean_db_api_key = "..."
//! open_food_facts_enabled = true
//! barcode_list_enabled = true
//! barcode_list_mirror_enabled = true
//! mirror_base_url = "https://r.jina.ai/"
//! allow_insecure_endpoints = false
//!
//! [database]
//! path = "/var/lib/larder/larder.db"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ConfigError, ConfigResult};

/// Minimum per-attempt timeout.
pub const MIN_TIMEOUT_MS: u64 = 500;

/// Upper bounds applied by [`LookupConfig::clamp`].
pub const MAX_TIMEOUT_MS: u64 = 60_000;
pub const MAX_RETRY_DELAY_MS: u64 = 60_000;
pub const MAX_PROVIDER_SPACING_MS: u64 = 60_000;
pub const MAX_BREAKER_COOLDOWN_SECS: u64 = 24 * 60 * 60;
pub const MAX_NEGATIVE_CACHE_SECS: u64 = 7 * 24 * 60 * 60;

// =============================================================================
// Policy Settings
// =============================================================================

/// Timing and resilience knobs, as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySettings {
    /// Per-attempt provider timeout (milliseconds). Minimum 500.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Attempts per provider per lookup. Minimum 1.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Retry delay is `retry_base_delay_ms × attempt_number`.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Minimum spacing between two calls to the same provider.
    #[serde(default = "default_provider_spacing")]
    pub provider_spacing_ms: u64,

    /// Consecutive failures that open a provider's circuit. Minimum 1.
    #[serde(default = "default_breaker_threshold")]
    pub breaker_failure_threshold: u32,

    /// How long an open circuit stays open (seconds). Minimum 1.
    #[serde(default = "default_breaker_cooldown")]
    pub breaker_cooldown_secs: u64,

    /// How long a read-only total miss is remembered (seconds). 0 disables.
    #[serde(default = "default_negative_cache")]
    pub negative_cache_secs: u64,

    /// Per-provider timeout overrides (milliseconds), keyed by provider id.
    #[serde(default)]
    pub provider_timeouts_ms: HashMap<String, u64>,
}

fn default_timeout_ms() -> u64 {
    3_000
}
fn default_max_attempts() -> u32 {
    2
}
fn default_retry_base_delay() -> u64 {
    350
}
fn default_provider_spacing() -> u64 {
    250
}
fn default_breaker_threshold() -> u32 {
    3
}
fn default_breaker_cooldown() -> u64 {
    60
}
fn default_negative_cache() -> u64 {
    180
}

impl Default for PolicySettings {
    fn default() -> Self {
        PolicySettings {
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay(),
            provider_spacing_ms: default_provider_spacing(),
            breaker_failure_threshold: default_breaker_threshold(),
            breaker_cooldown_secs: default_breaker_cooldown(),
            negative_cache_secs: default_negative_cache(),
            provider_timeouts_ms: HashMap::new(),
        }
    }
}

// =============================================================================
// Lookup Policy (runtime form)
// =============================================================================

/// The policy the orchestrator actually runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub provider_spacing: Duration,
    /// 0 disables the circuit breaker.
    pub breaker_failure_threshold: u32,
    pub breaker_cooldown: Duration,
    pub negative_cache_ttl: Duration,
    pub provider_timeouts: HashMap<String, Duration>,
}

impl Default for LookupPolicy {
    fn default() -> Self {
        LookupPolicy::from(&PolicySettings::default())
    }
}

impl From<&PolicySettings> for LookupPolicy {
    fn from(settings: &PolicySettings) -> Self {
        LookupPolicy {
            timeout: Duration::from_millis(settings.timeout_ms),
            max_attempts: settings.max_attempts,
            retry_base_delay: Duration::from_millis(settings.retry_base_delay_ms),
            provider_spacing: Duration::from_millis(settings.provider_spacing_ms),
            breaker_failure_threshold: settings.breaker_failure_threshold,
            breaker_cooldown: Duration::from_secs(settings.breaker_cooldown_secs),
            negative_cache_ttl: Duration::from_secs(settings.negative_cache_secs),
            provider_timeouts: settings
                .provider_timeouts_ms
                .iter()
                .map(|(id, ms)| (id.clone(), Duration::from_millis(*ms)))
                .collect(),
        }
    }
}

impl LookupPolicy {
    /// Per-attempt timeout for one provider.
    ///
    /// A configured override wins, then the provider's own default, then
    /// the policy timeout.
    pub fn timeout_for(&self, provider_id: &str, provider_default: Option<Duration>) -> Duration {
        self.provider_timeouts
            .get(provider_id)
            .copied()
            .or(provider_default)
            .unwrap_or(self.timeout)
    }
}

// =============================================================================
// Provider Settings
// =============================================================================

/// Which providers are registered and where they live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// JSON barcode index loaded at startup. Unset disables the local provider.
    #[serde(default)]
    pub local_index_path: Option<PathBuf>,

    /// EAN-DB needs an API key; it stays off without one.
    #[serde(default)]
    pub ean_db_enabled: bool,

    #[serde(default)]
    pub ean_db_api_key: Option<String>,

    #[serde(default = "default_ean_db_endpoint")]
    pub ean_db_endpoint: String,

    #[serde(default = "default_true")]
    pub open_food_facts_enabled: bool,

    #[serde(default = "default_open_food_facts_endpoint")]
    pub open_food_facts_endpoint: String,

    #[serde(default = "default_true")]
    pub barcode_list_enabled: bool,

    #[serde(default = "default_barcode_list_endpoint")]
    pub barcode_list_endpoint: String,

    #[serde(default = "default_true")]
    pub barcode_list_mirror_enabled: bool,

    /// Prefix prepended to the barcode-list.ru page URL.
    #[serde(default = "default_mirror_base_url")]
    pub mirror_base_url: String,

    /// Accept `http://` endpoints as well as `https://`.
    #[serde(default)]
    pub allow_insecure_endpoints: bool,
}

fn default_true() -> bool {
    true
}
fn default_ean_db_endpoint() -> String {
    "https://ean-db.com/api".to_string()
}
fn default_open_food_facts_endpoint() -> String {
    "https://world.openfoodfacts.org".to_string()
}
fn default_barcode_list_endpoint() -> String {
    "https://barcode-list.ru".to_string()
}
fn default_mirror_base_url() -> String {
    "https://r.jina.ai/".to_string()
}

impl Default for ProviderSettings {
    fn default() -> Self {
        ProviderSettings {
            local_index_path: None,
            ean_db_enabled: false,
            ean_db_api_key: None,
            ean_db_endpoint: default_ean_db_endpoint(),
            open_food_facts_enabled: true,
            open_food_facts_endpoint: default_open_food_facts_endpoint(),
            barcode_list_enabled: true,
            barcode_list_endpoint: default_barcode_list_endpoint(),
            barcode_list_mirror_enabled: true,
            mirror_base_url: default_mirror_base_url(),
            allow_insecure_endpoints: false,
        }
    }
}

impl ProviderSettings {
    /// Parses an endpoint and enforces the scheme rule: `https` always,
    /// `http` only when insecure endpoints are allowed.
    pub fn checked_endpoint(&self, raw: &str) -> ConfigResult<Url> {
        let trimmed = raw.trim();
        let url = Url::parse(trimmed).map_err(|e| ConfigError::InvalidEndpoint {
            url: trimmed.to_string(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "https" => Ok(url),
            "http" if self.allow_insecure_endpoints => Ok(url),
            other => Err(ConfigError::InvalidEndpoint {
                url: trimmed.to_string(),
                reason: format!("scheme '{}' not allowed", other),
            }),
        }
    }

    /// API key with surrounding whitespace removed; blank counts as missing.
    pub fn ean_db_key(&self) -> Option<&str> {
        self.ean_db_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to `larder.db` in the platform data directory.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "larder", "larder")
        .map(|dirs| dirs.data_dir().join("larder.db"))
        .unwrap_or_else(|| PathBuf::from("larder.db"))
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
        }
    }
}

// =============================================================================
// Main Lookup Configuration
// =============================================================================

/// Complete lookup configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupConfig {
    #[serde(default)]
    pub policy: PolicySettings,

    #[serde(default)]
    pub providers: ProviderSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl LookupConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (lookup.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading lookup config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.clamp();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load lookup config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::SaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        info!(?path, "Lookup config saved");
        Ok(())
    }

    /// Pulls every policy value into its allowed range.
    pub fn clamp(&mut self) {
        let policy = &mut self.policy;

        if policy.timeout_ms < MIN_TIMEOUT_MS {
            warn!(timeout_ms = policy.timeout_ms, "Lookup timeout below minimum, clamping");
            policy.timeout_ms = MIN_TIMEOUT_MS;
        }
        policy.timeout_ms = cap("timeout_ms", policy.timeout_ms, MAX_TIMEOUT_MS);
        for (id, ms) in policy.provider_timeouts_ms.iter_mut() {
            *ms = cap(id, *ms, MAX_TIMEOUT_MS);
        }
        policy.max_attempts = policy.max_attempts.max(1);
        policy.retry_base_delay_ms =
            cap("retry_base_delay_ms", policy.retry_base_delay_ms, MAX_RETRY_DELAY_MS);
        policy.provider_spacing_ms =
            cap("provider_spacing_ms", policy.provider_spacing_ms, MAX_PROVIDER_SPACING_MS);
        policy.breaker_failure_threshold = policy.breaker_failure_threshold.max(1);
        policy.breaker_cooldown_secs = cap(
            "breaker_cooldown_secs",
            policy.breaker_cooldown_secs.max(1),
            MAX_BREAKER_COOLDOWN_SECS,
        );
        policy.negative_cache_secs =
            cap("negative_cache_secs", policy.negative_cache_secs, MAX_NEGATIVE_CACHE_SECS);
    }

    /// Validates the configuration.
    ///
    /// Endpoints are not checked here: a bad endpoint only disables the
    /// provider using it.
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some((id, _)) = self
            .policy
            .provider_timeouts_ms
            .iter()
            .find(|(_, ms)| **ms == 0)
        {
            return Err(ConfigError::InvalidValue(format!(
                "provider_timeouts_ms.{} must be greater than 0",
                id
            )));
        }

        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue(
                "database.path must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Runtime policy derived from the `[policy]` section.
    pub fn policy(&self) -> LookupPolicy {
        LookupPolicy::from(&self.policy)
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies overrides from any key/value source. Unparseable values are
    /// logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(key) = read("EAN_DB_API_KEY") {
            debug!("Overriding EAN-DB API key from environment");
            self.providers.ean_db_api_key = Some(key);
        }

        if let Some(flag) = read("ENABLE_EANDB_LOOKUP").and_then(|v| parse_flag("ENABLE_EANDB_LOOKUP", &v)) {
            self.providers.ean_db_enabled = flag;
        }

        if let Some(flag) = read("ENABLE_OPEN_FOOD_FACTS_LOOKUP")
            .and_then(|v| parse_flag("ENABLE_OPEN_FOOD_FACTS_LOOKUP", &v))
        {
            self.providers.open_food_facts_enabled = flag;
        }

        if let Some(flag) = read("ALLOW_INSECURE_LOOKUP_ENDPOINTS")
            .and_then(|v| parse_flag("ALLOW_INSECURE_LOOKUP_ENDPOINTS", &v))
        {
            self.providers.allow_insecure_endpoints = flag;
        }

        if let Some(secs) = read("LOOKUP_TIMEOUT_SECONDS").and_then(|v| parse_number::<f64>("LOOKUP_TIMEOUT_SECONDS", &v)) {
            self.policy.timeout_ms = seconds_to_ms(secs);
        }

        if let Some(n) = read("LOOKUP_RETRY_COUNT").and_then(|v| parse_number::<u32>("LOOKUP_RETRY_COUNT", &v)) {
            self.policy.max_attempts = n;
        }

        if let Some(ms) = read("LOOKUP_RETRY_DELAY_MS").and_then(|v| parse_number::<u64>("LOOKUP_RETRY_DELAY_MS", &v)) {
            self.policy.retry_base_delay_ms = ms;
        }

        if let Some(ms) = read("LOOKUP_PROVIDER_COOLDOWN_MS")
            .and_then(|v| parse_number::<u64>("LOOKUP_PROVIDER_COOLDOWN_MS", &v))
        {
            self.policy.provider_spacing_ms = ms;
        }

        if let Some(n) = read("LOOKUP_CIRCUIT_BREAKER_FAILURE_THRESHOLD")
            .and_then(|v| parse_number::<u32>("LOOKUP_CIRCUIT_BREAKER_FAILURE_THRESHOLD", &v))
        {
            self.policy.breaker_failure_threshold = n;
        }

        if let Some(secs) = read("LOOKUP_CIRCUIT_BREAKER_COOLDOWN_SECONDS")
            .and_then(|v| parse_number::<f64>("LOOKUP_CIRCUIT_BREAKER_COOLDOWN_SECONDS", &v))
        {
            self.policy.breaker_cooldown_secs = secs.max(0.0).round() as u64;
        }

        if let Some(secs) = read("LOOKUP_NEGATIVE_CACHE_SECONDS")
            .and_then(|v| parse_number::<f64>("LOOKUP_NEGATIVE_CACHE_SECONDS", &v))
        {
            self.policy.negative_cache_secs = secs.max(0.0).round() as u64;
        }

        if let Some(path) = read("LARDER_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "larder", "larder")
            .map(|dirs| dirs.config_dir().join("lookup.toml"))
    }
}

/// Parses `1/true/yes/y/on` and `0/false/no/n/off`, case-insensitively.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn parse_flag(name: &str, value: &str) -> Option<bool> {
    let parsed = parse_bool(value);
    if parsed.is_none() {
        warn!(variable = name, value = %value, "Ignoring unrecognized boolean");
    }
    parsed
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Option<T> {
    let parsed = value.parse::<T>().ok();
    if parsed.is_none() {
        warn!(variable = name, value = %value, "Ignoring unparseable number");
    }
    parsed
}

fn cap(name: &str, value: u64, max: u64) -> u64 {
    if value > max {
        warn!(setting = name, value, max, "Lookup setting above maximum, clamping");
        return max;
    }
    value
}

fn seconds_to_ms(secs: f64) -> u64 {
    (secs.max(0.0) * 1000.0).round() as u64
}
