//! # larder-scan
//!
//! Resolves scanned codes from the command line.
//!
//! ```text
//! larder-scan [--config PATH] [--db PATH] [--read-only] CODE...
//!
//! $ larder-scan 4601234567890 '010460123456789017260228'
//! {"outcome":"created","product":{...},"provider":"open_food_facts",...}
//! {"outcome":"found","product":{...},"suggested_expiry":"2026-02-28",...}
//! ```
//!
//! Logs go to stderr, resolutions to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use larder_core::ScanResolution;
use larder_db::{Database, DbConfig};
use larder_lookup::{build_providers, http_client, LookupConfig, LookupService, RuntimeGuard};

#[derive(Parser, Debug)]
#[command(name = "larder-scan")]
#[command(about = "Resolve scanned product codes into products")]
struct Args {
    /// Lookup config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database file, overriding the config
    #[arg(long)]
    db: Option<PathBuf>,

    /// Never create products; remember misses in the negative cache
    #[arg(long)]
    read_only: bool,

    /// Raw scanner output: EAN-13, GS1 DataMatrix, or an internal code
    #[arg(required = true)]
    codes: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    let mut config = LookupConfig::load(args.config)?;
    if let Some(path) = args.db {
        config.database.path = path;
    }

    if let Some(parent) = config.database.path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    info!(path = %config.database.path.display(), "Opening database");
    let db = Database::new(DbConfig::new(&config.database.path)).await?;

    let providers = build_providers(&config.providers, http_client()?);
    let service = LookupService::new(
        Arc::new(db.clone()),
        providers,
        config.policy(),
        Arc::new(RuntimeGuard::new()),
    );

    let allow_create = !args.read_only;
    for code in &args.codes {
        let resolution = service.resolve(code, allow_create).await;
        debug!(code = %code, outcome = resolution.outcome(), "Scan resolved");
        print_resolution(&resolution)?;
    }

    db.close().await;
    Ok(())
}

fn print_resolution(resolution: &ScanResolution) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string(resolution)?);
    Ok(())
}

/// Initializes the tracing subscriber on stderr.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=larder_lookup=trace` - Trace the lookup crate only
/// - Default: INFO, DEBUG for larder crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,larder=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
