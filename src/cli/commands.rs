//! Command handlers for the CLI
//!
//! Each handler takes its parsed arguments plus the loaded [`AppConfig`],
//! applies command-line overrides and drives the library.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::catalog::{PaginatedSearchClient, SearchOutcome, SearchQuery};
use crate::app::models::format_file_size;
use crate::app::orchestrator::{
    AcquisitionOrchestrator, AcquisitionPlan, AcquisitionReport, OrchestratorConfig,
};
use crate::app::store::{S3Store, StoreCredentials};
use crate::auth::{setup_credentials, show_auth_status, verify_credentials};
use crate::cli::args::{AuthAction, AuthArgs, DownloadArgs, QueryArgs, SearchArgs};
use crate::cli::progress::{ProgressConfig, ProgressDisplay};
use crate::config::AppConfig;
use crate::errors::{AppError, ConfigError, Result};

/// How many failed keys are listed after a run
const MAX_LISTED_FAILURES: usize = 20;

/// How long to wait for stray progress senders after the pool returns
const PROGRESS_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle the search command
pub async fn handle_search(args: SearchArgs, config: &AppConfig) -> Result<()> {
    args.validate().map_err(AppError::generic)?;
    let query = build_query(&args.query)?;

    let client = PaginatedSearchClient::new(config.catalog.clone())?;
    println!("🔍 Searching catalog...");
    let outcome = client.search(&query).await?;

    println!(
        "Found {} unique records ({}) in {} pages",
        outcome.len(),
        format_file_size(outcome.total_size()),
        outcome.pages
    );
    if outcome.duplicates > 0 {
        println!("   {} duplicate records removed", outcome.duplicates);
    }

    let orchestrator = AcquisitionOrchestrator::new(config.download.to_runtime_config(), client)?;
    print_plan(&orchestrator.plan(&outcome.items));

    if let Some(path) = args.save {
        save_results(&path, &outcome).await?;
        println!("💾 Results saved to {}", path.display());
    }

    Ok(())
}

/// Handle the download command
pub async fn handle_download(args: DownloadArgs, config: &AppConfig, quiet: bool) -> Result<()> {
    download_with_env(args, config, quiet, |name| std::env::var(name).ok()).await
}

async fn download_with_env<F>(
    args: DownloadArgs,
    config: &AppConfig,
    quiet: bool,
    env_lookup: F,
) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    args.validate().map_err(AppError::generic)?;

    let runtime = apply_overrides(config.download.to_runtime_config(), &args);
    info!(
        "Starting download into {} with {} workers",
        runtime.output_dir.display(),
        runtime.worker_config.worker_count
    );

    let client = PaginatedSearchClient::new(config.catalog.clone())?;
    let orchestrator = AcquisitionOrchestrator::new(runtime, client)?;

    // Credentials are checked before any catalog request; dry runs never need them
    let store = if args.dry_run {
        None
    } else {
        Some(build_store(env_lookup, config)?)
    };

    let outcome = match &args.from {
        Some(path) => {
            let outcome = load_results(path).await?;
            println!(
                "📂 Loaded {} records from {}",
                outcome.len(),
                path.display()
            );
            outcome
        }
        None => {
            let query = build_query(&args.query)?;
            println!("🔍 Searching catalog...");
            let outcome = orchestrator.search(&query).await?;
            println!(
                "Found {} unique records ({} duplicates removed)",
                outcome.len(),
                outcome.duplicates
            );
            outcome
        }
    };

    let plan = orchestrator.plan(&outcome.items);
    print_plan(&plan);

    let Some(store) = store else {
        println!("Dry run - nothing downloaded");
        return Ok(());
    };

    if plan.is_empty() {
        print_report(&AcquisitionReport::empty(outcome.len(), &plan, Duration::ZERO));
        return Ok(());
    }

    let worker_config = &orchestrator.config().worker_config;
    let (progress_tx, progress_rx) = mpsc::channel(worker_config.progress_buffer_size);
    let progress_config = if quiet {
        ProgressConfig::hidden()
    } else {
        ProgressConfig::default()
    };
    let display = ProgressDisplay::start(
        progress_config,
        plan.task_count(),
        worker_config.worker_count,
        progress_rx,
    );

    let report = orchestrator
        .execute(&plan, outcome.len(), store, Some(progress_tx))
        .await?;

    match tokio::time::timeout(PROGRESS_DRAIN_TIMEOUT, display.finish()).await {
        Ok(totals) => debug!("Progress channel closed after {} events", totals.processed()),
        Err(_) => debug!("Progress display still waiting on workers; not waiting longer"),
    }

    print_report(&report);
    Ok(())
}

/// Handle authentication commands
pub async fn handle_auth(args: AuthArgs, config: &AppConfig) -> Result<()> {
    match args.action {
        AuthAction::Setup => {
            setup_credentials(&config.store).await?;
        }
        AuthAction::Verify => {
            if verify_credentials(&config.store).await? {
                println!("✅ Credentials verified successfully");
            } else {
                println!("❌ Credential verification failed");
            }
        }
        AuthAction::Status { verify } => {
            show_auth_status(&config.store, verify).await?;
        }
    }

    Ok(())
}

/// Resolve store credentials through `lookup` and build the S3 client
fn build_store<F>(lookup: F, config: &AppConfig) -> Result<Arc<S3Store>>
where
    F: Fn(&str) -> Option<String>,
{
    let credentials = StoreCredentials::from_lookup(lookup).inspect_err(|e| {
        if matches!(e, ConfigError::MissingCredentials) {
            println!("⚠️  No object store credentials found.");
            println!("   Run 'lidar_fetcher auth setup' to configure them.");
        }
    })?;
    Ok(Arc::new(S3Store::new(&credentials, &config.store)))
}

fn build_query(args: &QueryArgs) -> Result<SearchQuery> {
    let (polygon, start, end) = args.parts().ok_or_else(|| {
        AppError::generic("--polygon, --start and --end are all required for a search")
    })?;
    Ok(SearchQuery::parse(polygon, start, end)?)
}

fn apply_overrides(mut runtime: OrchestratorConfig, args: &DownloadArgs) -> OrchestratorConfig {
    if let Some(output) = &args.output {
        runtime = runtime.with_output_dir(output.clone());
    }
    if let Some(workers) = args.workers {
        runtime = runtime.with_worker_count(workers);
    }
    if args.max_files_per_project.is_some() {
        runtime = runtime.with_max_files_per_project(args.max_files_per_project);
    }
    runtime
}

/// Write search results as `{ "items": [...] }`
pub async fn save_results(path: &Path, outcome: &SearchOutcome) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(outcome)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

/// Read results written by [`save_results`], dropping repeated ids
pub async fn load_results(path: &Path) -> Result<SearchOutcome> {
    let content = tokio::fs::read_to_string(path).await?;
    let saved: SearchOutcome = serde_json::from_str(&content)?;
    Ok(SearchOutcome::from_items(saved.items))
}

fn print_plan(plan: &AcquisitionPlan) {
    println!();
    println!("📦 Projects");
    println!("==========");
    for (entry, project) in plan.summary().iter().zip(&plan.projects) {
        println!(
            "  {:<50} {:>6} files  {:>10}",
            entry.project,
            entry.files,
            format_file_size(entry.total_bytes)
        );
        if let Some(dir) = project.tasks.first().and_then(|t| t.local_path.parent()) {
            println!("    -> {}", dir.display());
        }
    }
    println!(
        "  Total: {} files ({}) across {} projects",
        plan.task_count(),
        format_file_size(plan.total_size()),
        plan.projects.len()
    );
    if !plan.invalid.is_empty() {
        warn!("{} records cannot be downloaded", plan.invalid.len());
        println!(
            "  {} records skipped: unusable locator or destination taken by another record",
            plan.invalid.len()
        );
    }
    println!();
}

fn print_report(report: &AcquisitionReport) {
    println!();
    if report.is_complete_success() {
        println!("✅ Download complete in {:.1?}", report.elapsed);
    } else {
        println!("⚠️  Download finished with problems in {:.1?}", report.elapsed);
    }
    println!("   {}", report.summary_line());

    if !report.failures.is_empty() {
        println!();
        println!("Failed files:");
        for failure in report.failures.iter().take(MAX_LISTED_FAILURES) {
            println!("  ❌ {}: {}", failure.key, failure.error);
        }
        if report.failures.len() > MAX_LISTED_FAILURES {
            println!(
                "  ... and {} more",
                report.failures.len() - MAX_LISTED_FAILURES
            );
        }
        println!("Re-run the same command to retry; completed files are skipped.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use crate::app::models::CatalogRecord;

    #[tokio::test]
    async fn test_saved_results_load_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("results.json");

        let outcome = SearchOutcome::from_items(vec![
            CatalogRecord::new("a", "s3://usgs-lidar/Projects/P/a.laz").with_size(10),
            CatalogRecord::new("b", "s3://usgs-lidar/Projects/P/b.laz"),
        ]);
        save_results(&path, &outcome).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"items\""));

        let loaded = load_results(&path).await.unwrap();
        assert_eq!(loaded.items, outcome.items);
    }

    #[tokio::test]
    async fn test_load_results_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, "not json").unwrap();

        let err = load_results(&path).await.unwrap_err();
        assert_eq!(err.category(), "results");
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let args = DownloadArgs {
            query: QueryArgs::default(),
            from: Some(PathBuf::from("results.json")),
            output: Some(PathBuf::from("/data/lidar")),
            workers: Some(7),
            max_files_per_project: Some(2),
            dry_run: true,
        };

        let runtime = apply_overrides(OrchestratorConfig::default(), &args);
        assert_eq!(runtime.output_dir, PathBuf::from("/data/lidar"));
        assert_eq!(runtime.worker_config.worker_count, 7);
        assert_eq!(runtime.max_files_per_project, Some(2));
    }

    fn download_args(from: Option<PathBuf>, output: &Path, dry_run: bool) -> DownloadArgs {
        DownloadArgs {
            query: QueryArgs::default(),
            from,
            output: Some(output.to_path_buf()),
            workers: Some(1),
            max_files_per_project: None,
            dry_run,
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[tokio::test]
    async fn test_build_store_needs_credentials() {
        let err = build_store(no_env, &AppConfig::default()).unwrap_err();
        assert_eq!(err.category(), "config");
        assert!(matches!(err, AppError::Config(ConfigError::MissingCredentials)));

        let env = |name: &str| match name {
            "AWS_ACCESS_KEY_ID" => Some("AKIAEXAMPLEEXAMPLE".to_string()),
            "AWS_SECRET_ACCESS_KEY" => Some("secret".to_string()),
            _ => None,
        };
        assert!(build_store(env, &AppConfig::default()).is_ok());
    }

    /// Missing credentials fail the run before the results file is even read
    #[tokio::test]
    async fn test_download_checks_credentials_before_loading_results() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist.json");
        let args = download_args(Some(missing), dir.path(), false);

        let err = download_with_env(args, &AppConfig::default(), true, no_env)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::MissingCredentials)));
    }

    /// Missing credentials fail the run before any catalog request
    #[tokio::test]
    async fn test_download_checks_credentials_before_searching() {
        let dir = TempDir::new().unwrap();
        let mut args = download_args(None, dir.path(), false);
        args.query = QueryArgs {
            polygon: Some("-105.1 39.9,-105.0 39.9,-105.0 40.0".to_string()),
            start: Some("2016-01-01".to_string()),
            end: Some("2016-12-31".to_string()),
        };
        let mut config = AppConfig::default();
        config.catalog.base_url = "http://127.0.0.1:9/api/v1/products".to_string();

        let err = download_with_env(args, &config, true, no_env)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::MissingCredentials)));
    }

    #[tokio::test]
    async fn test_dry_run_needs_no_credentials() {
        let dir = TempDir::new().unwrap();
        let results = dir.path().join("results.json");
        let outcome = SearchOutcome::from_items(vec![CatalogRecord::new(
            "a",
            "s3://usgs-lidar/Projects/P/a.laz",
        )]);
        save_results(&results, &outcome).await.unwrap();

        let args = download_args(Some(results), &dir.path().join("out"), true);
        download_with_env(args, &AppConfig::default(), true, no_env)
            .await
            .unwrap();
        assert!(!dir.path().join("out").join("Unknown").join("a.laz").exists());
    }

    #[test]
    fn test_build_query_requires_all_parts() {
        let partial = QueryArgs {
            polygon: Some("1 1,2 2,3 3".to_string()),
            start: Some("2016-01-01".to_string()),
            end: None,
        };
        assert!(build_query(&partial).is_err());
    }
}
