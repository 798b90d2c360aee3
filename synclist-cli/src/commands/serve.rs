use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tokio::net::TcpListener;
use tracing::info;

use synclist_core::config::{DatabaseLocation, ServerConfig};
use synclist_core::service::ChecklistService;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Address to bind (overrides SYNCLIST_HOST)
    #[arg(long)]
    pub host: Option<IpAddr>,

    /// Database file (overrides SYNCLIST_DB)
    #[arg(long, conflicts_with = "in_memory")]
    pub db: Option<PathBuf>,

    /// Keep records in memory only
    #[arg(long)]
    pub in_memory: bool,
}

impl ServeArgs {
    /// Layer command-line flags over an environment-derived config.
    fn apply(&self, mut config: ServerConfig) -> ServerConfig {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if self.in_memory {
            config.database = DatabaseLocation::Memory;
        } else if let Some(db) = &self.db {
            config.database = DatabaseLocation::File(db.clone());
        }
        config
    }
}

pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let config = args.apply(ServerConfig::from_env().context("Invalid configuration")?);

    let store = super::open_store(&config.database)?;
    match &config.database {
        DatabaseLocation::File(path) => info!(db = %path.display(), "Store ready"),
        DatabaseLocation::Memory => info!("Store ready (in memory)"),
    }

    let addr = config.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Cannot bind {addr}"))?;

    synclist_server::serve(
        listener,
        ChecklistService::new(store),
        synclist_server::shutdown_signal(),
    )
    .await
    .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn args() -> ServeArgs {
        ServeArgs {
            port: None,
            host: None,
            db: None,
            in_memory: false,
        }
    }

    #[test]
    fn no_flags_keep_environment_values() {
        let env = ServerConfig {
            port: 8080,
            ..ServerConfig::default()
        };
        assert_eq!(args().apply(env.clone()), env);
    }

    #[test]
    fn flags_override_environment() {
        let flags = ServeArgs {
            port: Some(4000),
            host: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            db: Some(PathBuf::from("other.db")),
            ..args()
        };
        let config = flags.apply(ServerConfig::default());
        assert_eq!(config.port, 4000);
        assert_eq!(config.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(
            config.database,
            DatabaseLocation::File(PathBuf::from("other.db"))
        );
    }

    #[test]
    fn in_memory_flag_wins() {
        let flags = ServeArgs {
            in_memory: true,
            ..args()
        };
        let config = flags.apply(ServerConfig::default());
        assert_eq!(config.database, DatabaseLocation::Memory);
    }
}
