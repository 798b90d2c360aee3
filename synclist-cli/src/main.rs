use clap::Parser;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "synclist",
    version,
    about = "Serve and inspect SyncList checklists"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Classify an error into a process exit code.
///
/// Exit codes:
///   0 success
///   1 general/unknown error
///   2 configuration error
///   4 database error
fn classify_exit_code(err: &anyhow::Error) -> i32 {
    let lower = format!("{err:#}").to_lowercase();

    if lower.contains("config") {
        2
    } else if lower.contains("database") || lower.contains("sqlite") {
        4
    } else {
        1
    }
}

fn main() {
    let cli = Cli::parse();

    // The server logs each request at info, so `serve` defaults one level up.
    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) if cli.command.is_server() => "info",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create runtime: {e}");
            std::process::exit(1);
        }
    };

    match runtime.block_on(commands::run(cli.command)) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(classify_exit_code(&e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_config() {
        let err = anyhow::anyhow!("Invalid configuration: PORT must be a port number");
        assert_eq!(classify_exit_code(&err), 2);
    }

    #[test]
    fn exit_code_database() {
        let err = anyhow::anyhow!("Cannot open database: /nope/synclist.db");
        assert_eq!(classify_exit_code(&err), 4);
    }

    #[test]
    fn exit_code_context_chain_is_searched() {
        let err = anyhow::anyhow!("disk I/O error").context("Cannot open database: lists.db");
        assert_eq!(classify_exit_code(&err), 4);
    }

    #[test]
    fn exit_code_general() {
        let err = anyhow::anyhow!("Cannot bind 0.0.0.0:3000: address in use");
        assert_eq!(classify_exit_code(&err), 1);
    }

    #[test]
    fn cli_parses_serve_flags() {
        let cli = Cli::try_parse_from([
            "synclist", "-v", "serve", "--port", "8080", "--host", "127.0.0.1", "--in-memory",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        assert!(cli.command.is_server());
    }

    #[test]
    fn cli_rejects_db_with_in_memory() {
        let parsed = Cli::try_parse_from(["synclist", "serve", "--db", "a.db", "--in-memory"]);
        assert!(parsed.is_err());
    }
}
