//! Configuration management for NebulaFS.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Main configuration for the NebulaFS server.
///
/// Unknown keys in the configuration file are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Multipart cleanup configuration.
    pub cleanup: CleanupConfig,
    /// Observability configuration.
    pub observability: ObservabilityConfig,
    /// Authentication configuration.
    pub auth: AuthConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed.
    pub fn parse(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Validate cross-field invariants that cannot be expressed in serde.
    ///
    /// # Errors
    ///
    /// Returns an invalid-argument configuration error when:
    /// - auth is enabled without a non-blank issuer and JWKS URL,
    /// - any of the multipart TTL, sweep interval, or sweep batch size is
    ///   non-positive.
    pub fn validate(&self) -> crate::Result<()> {
        if self.auth.enabled {
            if self.auth.issuer.trim().is_empty() {
                return Err(Error::Config(
                    "auth.issuer must be set when auth.enabled is true".to_string(),
                ));
            }
            if self.auth.jwks_url.trim().is_empty() {
                return Err(Error::Config(
                    "auth.jwks_url must be set when auth.enabled is true".to_string(),
                ));
            }
        }
        if self.storage.multipart.max_upload_ttl_seconds <= 0 {
            return Err(Error::Config(
                "storage.multipart.max_upload_ttl_seconds must be positive".to_string(),
            ));
        }
        if self.cleanup.sweep_interval_seconds == 0 {
            return Err(Error::Config(
                "cleanup.sweep_interval_seconds must be positive".to_string(),
            ));
        }
        if self.cleanup.max_uploads_per_sweep == 0 {
            return Err(Error::Config(
                "cleanup.max_uploads_per_sweep must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub host: String,
    /// Port to bind the server to.
    pub port: u16,
    /// Worker threads for the async runtime.
    pub threads: usize,
    /// TLS configuration.
    pub tls: TlsConfig,
    /// Request limits.
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            threads: 4,
            tls: TlsConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

/// TLS configuration for the HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TlsConfig {
    /// Enable TLS termination.
    pub enabled: bool,
    /// Path to the PEM certificate chain.
    pub certificate: String,
    /// Path to the PEM private key.
    pub private_key: String,
}

/// Request and connection limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes. Zero disables the cap.
    pub max_body_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { max_body_bytes: 256 * 1024 * 1024 }
    }
}

/// Storage configuration for the local filesystem backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for published blobs.
    pub base_path: PathBuf,
    /// Staging directory for in-flight writes.
    pub temp_path: PathBuf,
    /// SQLite database path (defaults to `<base_path>/metadata.db`).
    pub database_path: Option<PathBuf>,
    /// Multipart upload settings.
    pub multipart: MultipartConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("data"),
            temp_path: PathBuf::from("data/tmp"),
            database_path: None,
            multipart: MultipartConfig::default(),
        }
    }
}

impl StorageConfig {
    /// Returns the metadata database path.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(|| self.base_path.join("metadata.db"))
    }
}

/// Multipart upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MultipartConfig {
    /// Lifetime of an upload from initiation until the sweeper may reap it.
    pub max_upload_ttl_seconds: i64,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self { max_upload_ttl_seconds: 86_400 }
    }
}

/// Background cleanup (expiry sweeper) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Enable the periodic sweeper.
    pub enabled: bool,
    /// Seconds between sweeps.
    pub sweep_interval_seconds: u64,
    /// Extra slack past `expires_at` before an upload is reaped.
    pub grace_period_seconds: i64,
    /// Upper bound of uploads reaped per sweep.
    pub max_uploads_per_sweep: u32,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_seconds: 300,
            grace_period_seconds: 60,
            max_uploads_per_sweep: 200,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// JSON format.
    Json,
}

/// Observability (logging) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level: trace, debug, information, or error.
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "information".to_string(), log_format: LogFormat::Pretty }
    }
}

/// Bearer-token authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Enable bearer-token authorization.
    pub enabled: bool,
    /// Expected `iss` claim. Required when auth is enabled.
    pub issuer: String,
    /// Expected audience; empty disables the audience check.
    pub audience: String,
    /// JWKS document location: `file://`, a bare path, `http://`, `https://`.
    pub jwks_url: String,
    /// JWKS cache lifetime.
    pub cache_ttl_seconds: u64,
    /// Allowed clock skew for `exp` / `nbf` checks.
    pub clock_skew_seconds: u64,
    /// Accepted signature algorithm.
    pub allowed_alg: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            issuer: String::new(),
            audience: String::new(),
            jwks_url: String::new(),
            cache_ttl_seconds: 300,
            clock_skew_seconds: 60,
            allowed_alg: "RS256".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.threads, 4);
        assert_eq!(config.server.limits.max_body_bytes, 268_435_456);
        assert_eq!(config.storage.base_path, PathBuf::from("data"));
        assert_eq!(config.storage.multipart.max_upload_ttl_seconds, 86_400);
        assert!(config.cleanup.enabled);
        assert_eq!(config.cleanup.sweep_interval_seconds, 300);
        assert_eq!(config.cleanup.grace_period_seconds, 60);
        assert_eq!(config.cleanup.max_uploads_per_sweep, 200);
        assert!(!config.auth.enabled);
        assert_eq!(config.auth.allowed_alg, "RS256");
        config.validate().expect("defaults must validate");
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9090
threads = 8

[storage]
base_path = "/var/lib/nebulafs"

[cleanup]
sweep_interval_seconds = 30

[observability]
log_level = "debug"
log_format = "json"

[auth]
enabled = true
issuer = "https://issuer.example.com"
audience = "nebulafs"
jwks_url = "https://issuer.example.com/jwks.json"
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.threads, 8);
        assert_eq!(config.storage.base_path, PathBuf::from("/var/lib/nebulafs"));
        assert_eq!(config.cleanup.sweep_interval_seconds, 30);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert!(config.auth.enabled);
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let toml = r#"
[server]
port = 8081
totally_unknown = "ignored"

[experimental]
flags = ["a", "b"]
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.server.port, 8081);
    }

    #[test]
    fn test_validate_auth_requires_issuer() {
        let toml = r#"
[auth]
enabled = true
issuer = ""
jwks_url = "https://issuer.example.com/jwks.json"
"#;
        let config = Config::parse(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_auth_requires_jwks_url() {
        let toml = r#"
[auth]
enabled = true
issuer = "https://issuer.example.com"
jwks_url = "  "
"#;
        let config = Config::parse(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_auth_disabled_allows_blank() {
        let toml = r#"
[auth]
enabled = false
issuer = ""
jwks_url = ""
"#;
        let config = Config::parse(toml).unwrap();
        config.validate().unwrap();
        assert!(!config.auth.enabled);
    }

    #[test]
    fn test_validate_positive_intervals() {
        let mut config = Config::default();
        config.storage.multipart.max_upload_ttl_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cleanup.sweep_interval_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cleanup.max_uploads_per_sweep = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        assert_eq!(config.storage.database_path(), PathBuf::from("data/metadata.db"));

        let toml = r#"
[storage]
database_path = "/tmp/meta.db"
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.storage.database_path(), PathBuf::from("/tmp/meta.db"));
    }
}
