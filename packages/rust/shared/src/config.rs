//! Application configuration for mfgraph.
//!
//! User config lives at `~/.mfgraph/mfgraph.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{MfGraphError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "mfgraph.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".mfgraph";

// ---------------------------------------------------------------------------
// Config structs (matching mfgraph.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Snapshot cache and traversal limits.
    #[serde(default)]
    pub cache: CacheConfig,

    /// HTTP façade settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream data sources, fetched concurrently on every rebuild.
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            server: ServerConfig::default(),
            sources: default_sources(),
        }
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Snapshot time-to-live in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Upper bound on a single source fetch during rebuild.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Hop budget for context traversal.
    #[serde(default = "default_max_hops")]
    pub max_hops: u32,

    /// Hard cap on nodes visited by one context build.
    #[serde(default = "default_max_visited")]
    pub max_visited: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_hops: default_max_hops(),
            max_visited: default_max_visited(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn default_ttl_secs() -> u64 {
    30 * 60
}
fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_max_hops() -> u32 {
    4
}
fn default_max_visited() -> usize {
    10_000
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP façade binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr.parse().map_err(|e| {
            MfGraphError::config(format!("invalid listen_addr '{}': {e}", self.listen_addr))
        })
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".into()
}

/// Payload shape spoken by an upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Erp,
    Mes,
    Scada,
    Generic,
}

/// `[[sources]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source name, used in logs and error reports.
    pub name: String,

    /// Payload dialect.
    pub dialect: Dialect,

    /// Base URL of the upstream REST surface.
    pub base_url: String,

    /// Identifier prefix used for namespace qualification (defaults to `name`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Concurrent per-instance relationship requests.
    #[serde(default = "default_source_concurrency")]
    pub concurrency: u32,

    #[serde(default = "default_namespaces_path")]
    pub namespaces_path: String,

    #[serde(default = "default_types_path")]
    pub types_path: String,

    #[serde(default = "default_objects_path")]
    pub objects_path: String,

    /// Relationship path template; `{id}` is replaced by the local element id.
    #[serde(default = "default_relationships_path")]
    pub relationships_path: String,
}

impl SourceConfig {
    /// Build a source entry with default paths.
    pub fn new(name: impl Into<String>, dialect: Dialect, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dialect,
            base_url: base_url.into(),
            prefix: None,
            concurrency: default_source_concurrency(),
            namespaces_path: default_namespaces_path(),
            types_path: default_types_path(),
            objects_path: default_objects_path(),
            relationships_path: default_relationships_path(),
        }
    }

    /// Effective identifier prefix.
    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or(&self.name)
    }

    /// Parse `base_url`.
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|e| {
            MfGraphError::config(format!(
                "source '{}': invalid base_url '{}': {e}",
                self.name, self.base_url
            ))
        })
    }
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::new("erp", Dialect::Erp, "http://localhost:8001"),
        SourceConfig::new("mes", Dialect::Mes, "http://localhost:8002"),
        SourceConfig::new("scada", Dialect::Scada, "http://localhost:8003"),
    ]
}
fn default_source_concurrency() -> u32 {
    8
}
fn default_namespaces_path() -> String {
    "/namespaces".into()
}
fn default_types_path() -> String {
    "/objecttypes".into()
}
fn default_objects_path() -> String {
    "/objects".into()
}
fn default_relationships_path() -> String {
    "/objects/{id}/relationships".into()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Reject configs the rebuild pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl_secs == 0 {
            return Err(MfGraphError::config("cache.ttl_secs must be greater than 0"));
        }
        if self.cache.max_hops == 0 {
            return Err(MfGraphError::config("cache.max_hops must be greater than 0"));
        }
        if self.cache.max_visited == 0 {
            return Err(MfGraphError::config(
                "cache.max_visited must be greater than 0",
            ));
        }
        self.server.socket_addr()?;

        let mut names = HashSet::new();
        let mut prefixes = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(MfGraphError::config("source name must not be empty"));
            }
            if !names.insert(source.name.as_str()) {
                return Err(MfGraphError::config(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            if !prefixes.insert(source.prefix()) {
                return Err(MfGraphError::config(format!(
                    "duplicate source prefix '{}'",
                    source.prefix()
                )));
            }
            if source.concurrency == 0 {
                return Err(MfGraphError::config(format!(
                    "source '{}': concurrency must be greater than 0",
                    source.name
                )));
            }
            source.base_url()?;
        }
        Ok(())
    }

    /// All configured identifier prefixes, in source order.
    pub fn prefixes(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.prefix().to_string()).collect()
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.mfgraph/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| MfGraphError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.mfgraph/mfgraph.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load and validate the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MfGraphError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        MfGraphError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| MfGraphError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| MfGraphError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MfGraphError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("ttl_secs = 1800"));
        assert!(toml_str.contains("http://localhost:8002"));
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.cache.ttl(), Duration::from_secs(1800));
        assert_eq!(config.cache.max_hops, 4);
        assert_eq!(config.prefixes(), vec!["erp", "mes", "scada"]);
    }

    #[test]
    fn config_with_sources() {
        let toml_str = r#"
[cache]
ttl_secs = 60

[[sources]]
name = "erp"
dialect = "erp"
base_url = "http://erp.plant.local:9000"

[[sources]]
name = "telemetry"
dialect = "scada"
base_url = "http://scada.plant.local"
prefix = "scada"
concurrency = 2
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        config.validate().expect("valid");
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.fetch_timeout_secs, 30);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[1].prefix(), "scada");
        assert_eq!(config.sources[1].dialect, Dialect::Scada);
        assert_eq!(config.sources[0].objects_path, "/objects");
    }

    #[test]
    fn duplicate_prefix_rejected() {
        let mut config = AppConfig::default();
        config.sources[1].prefix = Some("erp".into());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate source prefix 'erp'"));
    }

    #[test]
    fn invalid_base_url_rejected() {
        let mut config = AppConfig::default();
        config.sources[0].base_url = "not a url".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("invalid base_url"));
    }

    #[test]
    fn zero_ttl_rejected() {
        let mut config = AppConfig::default();
        config.cache.ttl_secs = 0;
        assert!(config.validate().is_err());
    }
}
