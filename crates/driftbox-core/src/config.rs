use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level client configuration (loaded from `driftbox.toml`, overridable
/// by CLI flags).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftboxConfig {
    pub logging: LoggingConfig,
    pub transport: TransportConfig,
    pub cache: CacheConfig,
    pub state: StateConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_format: "text".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Authenticated JSON API base URL.
    pub api_base: String,
    /// Unauthenticated chunk-download base URL.
    pub egest_base: String,
    /// Authenticated chunk-upload base URL.
    pub ingest_base: String,
    /// Number of retries for network errors and HTTP 5xx responses.
    pub retry_attempts: u32,
    /// Backoff delay (milliseconds) before each retry, in order.
    pub retry_backoff_ms: Vec<u64>,
    /// Hard per-chunk upload timeout.
    pub chunk_upload_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            api_base: "https://gateway.example.invalid".into(),
            egest_base: "https://egest.example.invalid".into(),
            ingest_base: "https://ingest.example.invalid".into(),
            retry_attempts: 3,
            retry_backoff_ms: vec![1000, 2000, 4000],
            chunk_upload_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Listing cache entry lifetime, in seconds (default: 10 minutes).
    pub listing_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            listing_ttl_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Directory holding credentials and batch state (default: `~/.driftbox`).
    pub state_dir: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("~/.driftbox"),
        }
    }
}

impl StateConfig {
    pub fn credentials_file(&self) -> PathBuf {
        self.state_dir.join("credentials.json")
    }

    pub fn batch_state_dir(&self) -> PathBuf {
        self.state_dir.join("batch_states")
    }

    pub fn batch_state_file(&self, batch_id: &str) -> PathBuf {
        self.batch_state_dir()
            .join(format!("batch_state_{batch_id}.json"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Save batch progress after at least this many newly-completed chunks.
    pub persist_every_chunks: u32,
    /// Save batch progress after at least this many seconds, regardless of
    /// chunk count.
    pub persist_every_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            persist_every_chunks: 10,
            persist_every_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[logging]
log_level = "debug"
log_format = "json"

[transport]
api_base = "https://api.example.com"
retry_attempts = 5

[cache]
listing_ttl_secs = 120

[state]
state_dir = "/tmp/driftbox"

[batch]
persist_every_chunks = 20
"#;
        let config: DriftboxConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.logging.log_level, "debug");
        assert_eq!(config.transport.api_base, "https://api.example.com");
        assert_eq!(config.transport.retry_attempts, 5);
        assert_eq!(config.cache.listing_ttl_secs, 120);
        assert_eq!(config.state.state_dir, PathBuf::from("/tmp/driftbox"));
        assert_eq!(config.batch.persist_every_chunks, 20);
    }

    #[test]
    fn parse_defaults() {
        let config: DriftboxConfig = toml::from_str("").unwrap();
        assert_eq!(config.logging.log_level, "info");
        assert_eq!(config.transport.retry_attempts, 3);
        assert_eq!(config.transport.retry_backoff_ms, vec![1000, 2000, 4000]);
        assert_eq!(config.cache.listing_ttl_secs, 600);
        assert_eq!(config.batch.persist_every_secs, 5);
    }

    #[test]
    fn parse_partial_config_keeps_other_defaults() {
        let toml_str = r#"
[transport]
api_base = "http://localhost:8080"
"#;
        let config: DriftboxConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.transport.api_base, "http://localhost:8080");
        assert_eq!(config.transport.retry_attempts, 3);
        assert_eq!(config.cache.listing_ttl_secs, 600);
    }

    #[test]
    fn serialize_roundtrip() {
        let config = DriftboxConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: DriftboxConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.transport.api_base, parsed.transport.api_base);
        assert_eq!(config.cache.listing_ttl_secs, parsed.cache.listing_ttl_secs);
    }

    #[test]
    fn batch_state_file_is_namespaced_under_state_dir() {
        let config = StateConfig {
            state_dir: PathBuf::from("/home/user/.driftbox"),
        };
        assert_eq!(
            config.batch_state_file("abc123"),
            PathBuf::from("/home/user/.driftbox/batch_states/batch_state_abc123.json")
        );
    }
}
