//! Configuration loading and types for the file portal.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Every section has defaults, so an empty file (or no
//! file at all, for the edge binary) yields a usable configuration.
//!
//! Two settings name "the bucket" and are intentionally kept apart: the
//! edge pipeline derives its bucket from `edge.origin_domain` (the storage
//! domain CloudFront puts on each request), while the upload API reads the
//! bucket from the environment variable named by `upload.bucket_env`.

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Observability settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Edge pipeline settings.
    #[serde(default)]
    pub edge: EdgeConfig,

    /// Upload URL API settings.
    #[serde(default)]
    pub upload: UploadConfig,

    /// Object storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics collection and the `/metrics` endpoint.
    #[serde(default = "default_true")]
    pub metrics: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { metrics: true }
    }
}

/// Edge pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeConfig {
    /// Storage origin domain attached to every emulated edge request,
    /// e.g. `my-bucket.s3.us-east-1.amazonaws.com`.  The bucket is the
    /// first label.
    #[serde(default)]
    pub origin_domain: String,

    /// Title and heading of the listing page.
    #[serde(default = "default_listing_title")]
    pub listing_title: String,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            origin_domain: String::new(),
            listing_title: default_listing_title(),
        }
    }
}

/// Upload URL API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Name of the environment variable holding the upload bucket.
    #[serde(default = "default_bucket_env")]
    pub bucket_env: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            bucket_env: default_bucket_env(),
        }
    }
}

/// Object storage backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend type: `aws` or `memory`.
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// AWS S3 configuration.
    #[serde(default)]
    pub aws: AwsStorageConfig,

    /// In-memory backend configuration.
    #[serde(default)]
    pub memory: MemoryStorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            aws: AwsStorageConfig::default(),
            memory: MemoryStorageConfig::default(),
        }
    }
}

/// AWS S3 configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AwsStorageConfig {
    /// AWS region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom S3-compatible endpoint (e.g. MinIO, LocalStack).
    #[serde(default)]
    pub endpoint_url: String,
    /// Force path-style URL addressing.
    #[serde(default)]
    pub use_path_style: bool,
    /// Explicit AWS access key (falls back to env/credential chain).
    #[serde(default)]
    pub access_key_id: String,
    /// Explicit AWS secret key (falls back to env/credential chain).
    #[serde(default)]
    pub secret_access_key: String,
}

impl Default for AwsStorageConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint_url: String::new(),
            use_path_style: false,
            access_key_id: String::new(),
            secret_access_key: String::new(),
        }
    }
}

/// In-memory backend configuration.
///
/// Presigned URLs point at `endpoint` (path-style) and are signed with the
/// given static credentials.  `buckets` are created empty at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryStorageConfig {
    #[serde(default = "default_memory_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_memory_access_key")]
    pub access_key: String,
    #[serde(default = "default_memory_secret_key")]
    pub secret_key: String,
    #[serde(default)]
    pub buckets: Vec<String>,
}

impl Default for MemoryStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: default_memory_endpoint(),
            region: default_region(),
            access_key: default_memory_access_key(),
            secret_key: default_memory_secret_key(),
            buckets: Vec::new(),
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9080
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_listing_title() -> String {
    "S3 File Portal".to_string()
}

fn default_bucket_env() -> String {
    "S3_BUCKET_NAME".to_string()
}

fn default_storage_backend() -> String {
    "aws".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_memory_endpoint() -> String {
    "http://localhost:9000".to_string()
}

fn default_memory_access_key() -> String {
    "fileportal".to_string()
}

fn default_memory_secret_key() -> String {
    "fileportal-secret".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}
