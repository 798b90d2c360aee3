use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use synclist_core::config::{DEFAULT_DB_FILE, DatabaseLocation};
use synclist_core::store::RecordStore;
use synclist_core::types::StoreStats;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Database file to inspect
    #[arg(long, env = "SYNCLIST_DB", default_value = DEFAULT_DB_FILE)]
    pub db: PathBuf,
}

pub async fn run(args: StatusArgs) -> anyhow::Result<()> {
    if !args.db.exists() {
        anyhow::bail!("Database not found: {}", args.db.display());
    }

    let store = super::open_store(&DatabaseLocation::File(args.db.clone()))?;
    let stats = store.stats().await.context("Failed to read database stats")?;

    println!("SyncList status for {}", args.db.display());
    println!();
    print!("{}", render_stats(&stats));
    Ok(())
}

fn render_stats(stats: &StoreStats) -> String {
    let mut out = String::new();
    if stats.db_size_bytes > 0 {
        out.push_str(&format!("  Size:        {}\n", format_bytes(stats.db_size_bytes)));
    }
    out.push_str(&format!("  Categories:  {:>6}\n", stats.categories));
    out.push_str(&format!("  Checklists:  {:>6}\n", stats.checklists));
    out.push_str(&format!(
        "  Items:       {:>6} ({} completed)\n",
        stats.items, stats.completed_items
    ));
    out
}

#[allow(clippy::cast_precision_loss)]
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
