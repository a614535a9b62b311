//! Server configuration
//!
//! Loaded from a TOML file, then overridden by `BONDSMITH_*` environment
//! variables and finally by command-line flags. A missing file is not an
//! error: the defaults bind to localhost with no seeded characters.
//!
//! ```toml
//! bind_address = "0.0.0.0:7420"
//! log_level = "info"
//!
//! [gateway]
//! facilitator_name = "Storyteller"
//!
//! [[characters]]
//! character_id = "kaladin"
//! level = 5
//! ```

use bondsmith_core::{CharacterId, GatewayConfig};
use bondsmith_sync::InMemoryCharacterRecords;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::info;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file exists but could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid TOML for this schema
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    /// The bind address does not parse as a socket address
    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),
}

/// Character record seeded into the in-memory record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSeed {
    /// Record-store key
    pub character_id: CharacterId,
    /// Persisted level
    pub level: u32,
}

/// Top-level server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP/websocket listener binds to
    pub bind_address: String,
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Delivery gateway tunables
    pub gateway: GatewayConfig,
    /// Characters known to the record store at startup
    pub characters: Vec<CharacterSeed>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:7420".to_string(),
            log_level: "info".to_string(),
            gateway: GatewayConfig::default(),
            characters: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config file, or fall back to defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            info!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `BONDSMITH_BIND`, `BONDSMITH_LOG` and `BONDSMITH_FACILITATOR`
    pub fn merge_with_env(&mut self) {
        self.merge_with(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`, keyed by environment variable name
    pub fn merge_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = lookup("BONDSMITH_BIND") {
            self.bind_address = bind;
        }
        if let Some(level) = lookup("BONDSMITH_LOG") {
            self.log_level = level;
        }
        if let Some(name) = lookup("BONDSMITH_FACILITATOR") {
            self.gateway.facilitator_name = name;
        }
    }

    /// Parsed bind address
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.bind_address.clone()))
    }

    /// Record store seeded from `[[characters]]`
    pub fn records(&self) -> InMemoryCharacterRecords {
        InMemoryCharacterRecords::from_levels(
            self.characters
                .iter()
                .map(|seed| (seed.character_id.clone(), seed.level)),
        )
    }
}
