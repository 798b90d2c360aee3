use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::error::ConfigError;

/// Port used when neither `PORT` nor `port` is set.
pub const DEFAULT_PORT: u16 = 3000;

/// Database file used when `SYNCLIST_DB` is not set.
pub const DEFAULT_DB_FILE: &str = "synclist.db";

/// Where the record store keeps its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    /// Rows vanish when the process exits.
    Memory,
}

impl Default for DatabaseLocation {
    fn default() -> Self {
        Self::File(PathBuf::from(DEFAULT_DB_FILE))
    }
}

/// Server process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub database: DatabaseLocation,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            database: DatabaseLocation::default(),
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    ///
    /// Recognized keys: `PORT` (or lowercase `port`), `SYNCLIST_HOST`,
    /// `SYNCLIST_DB` (`:memory:` selects an in-memory store).
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = get("PORT").or_else(|| get("port")) {
            config.port = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("PORT must be a port number, got {raw:?}"))
            })?;
        }

        if let Some(raw) = get("SYNCLIST_HOST") {
            config.host = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("SYNCLIST_HOST must be an IP address, got {raw:?}"))
            })?;
        }

        if let Some(raw) = get("SYNCLIST_DB") {
            config.database = if raw == ":memory:" {
                DatabaseLocation::Memory
            } else {
                DatabaseLocation::File(PathBuf::from(raw))
            };
        }

        Ok(config)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
