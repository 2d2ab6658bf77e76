//! LIDAR Fetcher CLI application
//!
//! Command-line interface for searching the National Map catalog and
//! downloading LIDAR point cloud tiles from the requester-pays bucket.

use std::process;

use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use lidar_fetcher::cli::{handle_auth, handle_download, handle_search, Cli, Commands};
use lidar_fetcher::config::AppConfig;
use lidar_fetcher::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // A missing .env is fine; credentials may come from the environment
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    if cli.global.config.is_none() {
        AppConfig::initialize_first_run().await?;
    }
    let config = AppConfig::load(cli.global.config.clone()).await?;

    init_logging(&cli, &config);
    info!("LIDAR Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    let quiet = cli.global.quiet;
    match cli.command {
        Commands::Search(args) => {
            info!("Executing search command");
            handle_search(args, &config).await
        }
        Commands::Download(args) => {
            info!("Executing download command");
            handle_download(args, &config, quiet).await
        }
        Commands::Auth(args) => {
            info!("Executing auth command");
            handle_auth(args, &config).await
        }
    }
}

/// Initialize logging from CLI flags, falling back to the configured level
///
/// `RUST_LOG` directives still apply on top of the crate directive.
fn init_logging(cli: &Cli, config: &AppConfig) {
    let flags_given = cli.global.quiet || cli.global.verbose || cli.global.very_verbose;
    let level = if flags_given {
        cli.log_level().to_string().to_lowercase()
    } else {
        config.logging.level.clone()
    };

    let mut filter = EnvFilter::from_default_env();
    let mut bad_level = None;
    match format!("lidar_fetcher={}", level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(_) => bad_level = Some(level),
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .init();

    if let Some(level) = bad_level {
        warn!("Ignoring invalid log level '{}' from configuration", level);
    }
    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
