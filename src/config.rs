//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - nl2sql.toml (default configuration)
//! - nl2sql.local.toml (git-ignored local overrides)
//! - Environment variables (NL2SQL_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # nl2sql.toml
//! [storage]
//! db_root = "/var/lib/nl2sql/database"
//!
//! [generation]
//! endpoint = "http://127.0.0.1:8500/generate"
//! num_return_sequences = 2
//!
//! [generation.oracle]
//! enabled = true
//! endpoint = "http://127.0.0.1:9090"
//!
//! [serialization]
//! style = "compact"
//! with_foreign_keys = true
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! NL2SQL_STORAGE__DB_ROOT=/custom/path
//! NL2SQL_SERIALIZATION__STYLE=verbose
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::TranslateError;

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub serialization: SerializationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Database catalog location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding one `<db_id>/<db_id>.sqlite` subtree per
    /// database. The self-naming convention is load-bearing: files whose
    /// stem does not match their directory name are not listed.
    #[serde(default = "default_db_root")]
    pub db_root: PathBuf,
}

/// Settings for the external sequence-to-sequence generator and the
/// constraint oracle sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Inference service endpoint accepting generation requests.
    #[serde(default = "default_generation_endpoint")]
    pub endpoint: String,

    /// How many ranked SQL candidates a request produces by default.
    #[serde(default = "default_num_return_sequences")]
    pub num_return_sequences: usize,

    /// Beam width the generator searches with. Candidates are drawn from
    /// these beams, so `num_return_sequences <= num_beams` must hold.
    #[serde(default = "default_num_beams")]
    pub num_beams: usize,

    /// Maximum generated sequence length in tokens.
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Text prepended to every generator input (model-specific task
    /// prefix; empty for most checkpoints).
    #[serde(default)]
    pub source_prefix: String,

    /// Normalize generated SQL (whitespace, casing outside quoted
    /// literals) before returning it.
    #[serde(default = "default_true")]
    pub normalize: bool,

    /// Per-request timeout for the inference call, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Constraint oracle settings.
    #[serde(default)]
    pub oracle: OracleConfig,
}

/// Constraint oracle sidecar. When enabled, generation runs under the
/// oracle's incremental SQL parser; a dead oracle fails the request
/// instead of silently degrading to unconstrained output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Require constrained decoding for every generation request
    #[serde(default)]
    pub enabled: bool,

    /// Oracle service endpoint
    #[serde(default = "default_oracle_endpoint")]
    pub endpoint: String,
}

/// Named token layouts for rendering a schema as generator input. Each
/// style is a different grammar over the same table/column/foreign-key
/// data; see `schema::serialize` for the layout tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SerializationStyle {
    /// Sentence-like: `Database: d. Table: t. Columns: a, b`
    Verbose,
    /// Pipe-delimited: ` | d | t : a , b` (the layout most checkpoints
    /// are trained on)
    #[default]
    Compact,
    /// CREATE TABLE statements with foreign keys in a trailing comment block
    Ddl,
    /// Parenthesized groups: `[d] t ( a , b )`
    Grouped,
}

impl SerializationStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            SerializationStyle::Verbose => "verbose",
            SerializationStyle::Compact => "compact",
            SerializationStyle::Ddl => "ddl",
            SerializationStyle::Grouped => "grouped",
        }
    }
}

impl std::fmt::Display for SerializationStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SerializationStyle {
    type Err = TranslateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verbose" => Ok(SerializationStyle::Verbose),
            "compact" => Ok(SerializationStyle::Compact),
            "ddl" => Ok(SerializationStyle::Ddl),
            "grouped" => Ok(SerializationStyle::Grouped),
            other => Err(TranslateError::Config {
                message: format!(
                    "unknown serialization style '{other}' (expected one of: verbose, compact, ddl, grouped)"
                ),
            }),
        }
    }
}

/// How a schema is rendered into generator input. The config section
/// holds the process defaults; the `/serialized-schema` endpoint exposes
/// a subset of these as per-request query parameter overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializationConfig {
    /// Token layout to render with.
    #[serde(default)]
    pub style: SerializationStyle,

    /// Shuffle table order (and column order within each table) with a
    /// fresh per-request seed. Training-time augmentation; off for
    /// serving determinism.
    #[serde(default)]
    pub randomize_order: bool,

    /// Prefix the database identifier to the rendered schema.
    #[serde(default = "default_true")]
    pub with_db_id: bool,

    /// Append sampled cell values to each column token. Issues bounded
    /// read-only queries against the database file.
    #[serde(default)]
    pub with_content: bool,

    /// Append one relation token per foreign-key pair.
    #[serde(default)]
    pub with_foreign_keys: bool,

    /// Lowercase table and column names in the rendered schema.
    #[serde(default = "default_true")]
    pub normalize_columns: bool,

    /// Cap on sampled values per column when `with_content` is set.
    #[serde(default = "default_content_sample_limit")]
    pub content_sample_limit: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// HTTP server bind address
    #[serde(default = "default_http_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Allowed CORS origins (empty = same-origin only, unless
    /// cors_allow_all is true)
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Explicitly allow all CORS origins (dev mode opt-in)
    #[serde(default)]
    pub cors_allow_all: bool,
}

// Default value functions
fn default_db_root() -> PathBuf {
    PathBuf::from("./database")
}
fn default_generation_endpoint() -> String {
    "http://127.0.0.1:8500/generate".to_string()
}
fn default_num_return_sequences() -> usize {
    2
}
fn default_num_beams() -> usize {
    4
}
fn default_max_length() -> usize {
    512
}
fn default_request_timeout_secs() -> u64 {
    120
}
fn default_oracle_endpoint() -> String {
    "http://127.0.0.1:9090".to_string()
}
fn default_true() -> bool {
    true
}
fn default_content_sample_limit() -> usize {
    3
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_http_host() -> String {
    "127.0.0.1".to_string()
}
fn default_http_port() -> u16 {
    8000
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. nl2sql.toml (base configuration)
    /// 2. nl2sql.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (NL2SQL_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("nl2sql.toml"))
            .merge(Toml::file("nl2sql.local.toml"))
            .merge(Env::prefixed("NL2SQL_").split("__"))
            .extract()
    }

    /// Load configuration from specific file path
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("NL2SQL_").split("__"))
            .extract()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageConfig::default(),
            generation: GenerationConfig::default(),
            serialization: SerializationConfig::default(),
            logging: LoggingConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            db_root: default_db_root(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            endpoint: default_generation_endpoint(),
            num_return_sequences: default_num_return_sequences(),
            num_beams: default_num_beams(),
            max_length: default_max_length(),
            source_prefix: String::new(),
            normalize: true,
            request_timeout_secs: default_request_timeout_secs(),
            oracle: OracleConfig::default(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig {
            enabled: false,
            endpoint: default_oracle_endpoint(),
        }
    }
}

impl Default for SerializationConfig {
    fn default() -> Self {
        SerializationConfig {
            style: SerializationStyle::default(),
            randomize_order: false,
            with_db_id: true,
            with_content: false,
            with_foreign_keys: false,
            normalize_columns: true,
            content_sample_limit: default_content_sample_limit(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            host: default_http_host(),
            port: default_http_port(),
            cors_origins: Vec::new(),
            cors_allow_all: false,
        }
    }
}
