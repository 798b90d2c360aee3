pub mod serve;
pub mod status;

use std::sync::Arc;

use anyhow::Context;
use clap::Subcommand;

use synclist_core::config::DatabaseLocation;
use synclist_core::store::sqlite::SqliteStore;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API server
    Serve(serve::ServeArgs),
    /// Show record counts for a database
    Status(status::StatusArgs),
}

impl Command {
    /// Whether this command runs the long-lived server.
    pub fn is_server(&self) -> bool {
        matches!(self, Self::Serve(_))
    }
}

pub async fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Serve(args) => serve::run(args).await,
        Command::Status(args) => status::run(args).await,
    }
}

/// Open (and migrate) the store at `location`.
pub(crate) fn open_store(location: &DatabaseLocation) -> anyhow::Result<Arc<SqliteStore>> {
    let store = match location {
        DatabaseLocation::File(path) => SqliteStore::open(path)
            .with_context(|| format!("Cannot open database: {}", path.display()))?,
        DatabaseLocation::Memory => {
            SqliteStore::in_memory().context("Cannot open in-memory database")?
        }
    };
    Ok(Arc::new(store))
}
