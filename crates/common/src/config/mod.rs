//! Configuration management for Collabnet pipelines
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values
//!
//! The configuration object is built once and handed to the transport and
//! pipeline constructors; nothing reads credentials from global state.

use crate::errors::{AppError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Scopus API access
    #[serde(default)]
    pub scopus: ScopusConfig,

    /// Harvest stage (collaborator table construction)
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Analysis stage (name resolution and ranking)
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScopusConfig {
    /// API root, e.g. https://api.elsevier.com/
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Search endpoint path relative to base_url
    #[serde(default = "default_search_path")]
    pub search_path: String,

    /// API key (takes precedence over api_key_file)
    pub api_key: Option<String>,

    /// File whose first line holds the API key
    #[serde(default = "default_api_key_file")]
    pub api_key_file: Option<PathBuf>,

    /// Value of the httpAccept query parameter
    #[serde(default = "default_http_accept")]
    pub http_accept: String,

    /// Search results per page (the `count` parameter)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Ops-layer retries for transient failures (0 disables)
    #[serde(default)]
    pub max_retries: u32,

    /// Client-side request rate
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Burst capacity for the rate limiter
    #[serde(default = "default_burst")]
    pub burst: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarvestConfig {
    /// JSON file with a `people` array of seed identities
    #[serde(default = "default_seeds_path")]
    pub seeds_path: PathBuf,

    /// Seed field holding the Scopus author id
    #[serde(default = "default_identifier_field")]
    pub identifier_field: String,

    /// Seed field used to name dropped seeds in warnings
    #[serde(default = "default_name_field")]
    pub name_field: String,

    /// Unified table CSV output
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Directory for per-seed checkpoints (disabled when unset)
    pub checkpoint_dir: Option<PathBuf>,

    /// Concurrent author-list requests per seed identity
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    /// Skip entries without an author-affiliation link instead of failing
    #[serde(default)]
    pub skip_malformed: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisConfig {
    /// Unified table CSV produced by the harvester
    #[serde(default = "default_output_path")]
    pub input_path: PathBuf,

    /// Collaborator ranking CSV output
    #[serde(default = "default_ranking_path")]
    pub ranking_path: PathBuf,

    /// Ranking exploded by affiliation id
    #[serde(default = "default_affiliations_path")]
    pub affiliations_path: PathBuf,

    /// Restrict the ranking to one publication subtype (e.g. "Article")
    pub subtype: Option<String>,

    /// Keep only the first N ranked collaborators
    pub top_n: Option<usize>,

    /// Let arrival order settle variants tied on count and length
    #[serde(default)]
    pub break_ties_by_arrival: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_base_url() -> String { "https://api.elsevier.com/".to_string() }
fn default_search_path() -> String { "content/search/scopus".to_string() }
fn default_api_key_file() -> Option<PathBuf> { Some(PathBuf::from(".scopus_api")) }
fn default_http_accept() -> String { "application/json".to_string() }
fn default_page_size() -> u32 { 200 }
fn default_timeout() -> u64 { 30 }
fn default_requests_per_second() -> u32 { 5 }
fn default_burst() -> u32 { 5 }
fn default_seeds_path() -> PathBuf { PathBuf::from("data/research_leaders.json") }
fn default_identifier_field() -> String { "Scopus ID".to_string() }
fn default_name_field() -> String { "Name".to_string() }
fn default_output_path() -> PathBuf { PathBuf::from("data/collaborator_data.csv") }
fn default_ranking_path() -> PathBuf { PathBuf::from("data/common_collaborators.csv") }
fn default_affiliations_path() -> PathBuf {
    PathBuf::from("data/common_collaborators_affiliations.csv")
}
fn default_max_concurrent() -> usize { 4 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "collabnet".to_string() }

impl Default for ScopusConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            search_path: default_search_path(),
            api_key: None,
            api_key_file: default_api_key_file(),
            http_accept: default_http_accept(),
            page_size: default_page_size(),
            timeout_secs: default_timeout(),
            max_retries: 0,
            requests_per_second: default_requests_per_second(),
            burst: default_burst(),
        }
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            seeds_path: default_seeds_path(),
            identifier_field: default_identifier_field(),
            name_field: default_name_field(),
            output_path: default_output_path(),
            checkpoint_dir: None,
            max_concurrent_requests: default_max_concurrent(),
            skip_malformed: false,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            input_path: default_output_path(),
            ranking_path: default_ranking_path(),
            affiliations_path: default_affiliations_path(),
            subtype: None,
            top_n: None,
            break_ties_by_arrival: false,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            service_name: default_service_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SCOPUS__PAGE_SIZE=25
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }
}

impl ScopusConfig {
    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the API key from config or the key file
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }

        let path = self.api_key_file.as_ref().ok_or_else(|| {
            AppError::config(
                "no Scopus API key configured (set scopus.api_key or scopus.api_key_file)",
            )
        })?;

        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("cannot read API key file {}: {}", path.display(), e))
        })?;

        contents
            .lines()
            .next()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::config(format!("API key file {} is empty", path.display())))
    }

    /// Fixed parameters appended to every request (apiKey, httpAccept)
    pub fn fixed_params(&self, api_key: &str) -> QueryParams {
        let mut params = QueryParams::new();
        params.insert("apiKey".to_string(), api_key.to_string());
        params.insert("httpAccept".to_string(), self.http_accept.clone());
        params
    }

    /// Parameters for the first page of a search: fixed params plus `count`
    pub fn search_params(&self, api_key: &str) -> QueryParams {
        let mut params = self.fixed_params(api_key);
        params.insert("count".to_string(), self.page_size.to_string());
        params
    }

    /// Absolute search endpoint URL
    pub fn search_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.search_path.trim_start_matches('/')
        )
    }
}

/// Ordered query parameters
pub type QueryParams = BTreeMap<String, String>;
