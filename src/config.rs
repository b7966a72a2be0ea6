use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::models::ScoringWeights;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Appwrite,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub database_id: String,
    #[serde(default)]
    pub collections: CollectionSettings,
    /// Largest value list the store accepts in one membership predicate
    #[serde(default = "default_membership_limit")]
    pub membership_limit: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            endpoint: String::new(),
            api_key: String::new(),
            project_id: String::new(),
            database_id: String::new(),
            collections: CollectionSettings::default(),
            membership_limit: default_membership_limit(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_membership_limit() -> usize { 30 }
fn default_request_timeout_secs() -> u64 { 30 }

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionSettings {
    #[serde(default = "default_users_collection")]
    pub users: String,
    #[serde(default = "default_swipes_collection")]
    pub swipes: String,
    #[serde(default = "default_matches_collection")]
    pub matches: String,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            users: default_users_collection(),
            swipes: default_swipes_collection(),
            matches: default_matches_collection(),
        }
    }
}

fn default_users_collection() -> String { "users".to_string() }
fn default_swipes_collection() -> String { "swipes".to_string() }
fn default_matches_collection() -> String { "matches".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// "HS256" (shared secret) or "RS256" (public key)
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    pub secret: Option<String>,
    pub public_key_pem: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            secret: None,
            public_key_pem: None,
            issuer: None,
            audience: None,
        }
    }
}

fn default_algorithm() -> String { "HS256".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalSettings {
    /// Overrides the store's own membership limit when set
    pub membership_limit: Option<usize>,
    #[serde(default = "default_batch_cap")]
    pub batch_cap: usize,
    #[serde(default = "default_filter_limit")]
    pub default_filter_limit: usize,
    #[serde(default = "default_max_filter_limit")]
    pub max_filter_limit: usize,
    #[serde(default = "default_over_fetch_multiplier")]
    pub over_fetch_multiplier: usize,
    #[serde(default = "default_max_distance_km")]
    pub default_max_distance_km: f64,
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    pub partition_timeout_ms: Option<u64>,
    #[serde(default = "default_recommendation_pool")]
    pub recommendation_pool: usize,
    #[serde(default = "default_recommendation_batch")]
    pub recommendation_batch: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            membership_limit: None,
            batch_cap: default_batch_cap(),
            default_filter_limit: default_filter_limit(),
            max_filter_limit: default_max_filter_limit(),
            over_fetch_multiplier: default_over_fetch_multiplier(),
            default_max_distance_km: default_max_distance_km(),
            fetch_concurrency: default_fetch_concurrency(),
            partition_timeout_ms: None,
            recommendation_pool: default_recommendation_pool(),
            recommendation_batch: default_recommendation_batch(),
        }
    }
}

fn default_batch_cap() -> usize { 200 }
fn default_filter_limit() -> usize { 50 }
fn default_max_filter_limit() -> usize { 100 }
fn default_over_fetch_multiplier() -> usize { 2 }
fn default_max_distance_km() -> f64 { 50.0 }
fn default_fetch_concurrency() -> usize { 4 }
fn default_recommendation_pool() -> usize { 100 }
fn default_recommendation_batch() -> usize { 10 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_age_weight")]
    pub age: f64,
    #[serde(default = "default_interests_weight")]
    pub interests: f64,
    #[serde(default = "default_location_weight")]
    pub location: f64,
    #[serde(default = "default_education_weight")]
    pub education: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            age: default_age_weight(),
            interests: default_interests_weight(),
            location: default_location_weight(),
            education: default_education_weight(),
        }
    }
}

impl From<&WeightsConfig> for ScoringWeights {
    fn from(config: &WeightsConfig) -> Self {
        Self {
            age: config.age,
            interests: config.interests,
            location: config.location,
            education: config.education,
        }
    }
}

fn default_age_weight() -> f64 { 30.0 }
fn default_interests_weight() -> f64 { 40.0 }
fn default_location_weight() -> f64 { 20.0 }
fn default_education_weight() -> f64 { 10.0 }

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Redis is optional; without it only the in-process tier is used
    pub redis_url: Option<String>,
    #[serde(default = "default_l1_cache_size")]
    pub l1_cache_size: u64,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            l1_cache_size: default_l1_cache_size(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_l1_cache_size() -> u64 { 1000 }
fn default_ttl_secs() -> u64 { 60 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "compact".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with DATING_)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., DATING__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("DATING")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = apply_secret_overrides(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("DATING")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Membership limit the batch fetcher partitions with
    pub fn effective_membership_limit(&self) -> usize {
        self.retrieval
            .membership_limit
            .unwrap_or(self.store.membership_limit)
            .max(1)
    }
}

/// Secrets are commonly injected under their conventional unprefixed names
fn apply_secret_overrides(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(api_key) = env::var("APPWRITE_API_KEY") {
        builder = builder.set_override("store.api_key", api_key)?;
    }
    if let Ok(secret) = env::var("JWT_SECRET") {
        builder = builder.set_override("auth.secret", secret)?;
    }

    builder.build()
}
