//! Integration tests for the download pipeline.
//!
//! These drive the orchestrator and worker pool end to end against the
//! in-memory object store, writing into a temporary output directory.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use lidar_fetcher::app::catalog::{CatalogConfig, PaginatedSearchClient};
use lidar_fetcher::app::models::{CatalogRecord, DownloadTask};
use lidar_fetcher::app::orchestrator::{AcquisitionOrchestrator, OrchestratorConfig};
use lidar_fetcher::app::store::MemoryStore;
use lidar_fetcher::app::worker::{ConfigPresets, PoolState, WorkerConfig, WorkerPool};
use lidar_fetcher::errors::DownloadError;

const BUCKET_URL: &str = "s3://usgs-lidar";

fn tile_key(project: &str, n: usize) -> String {
    format!("Projects/{project}/laz/USGS_LPC_{project}_{n:04}.laz")
}

fn record(project: &str, n: usize) -> CatalogRecord {
    CatalogRecord::new(
        format!("{project}-{n}"),
        format!("{BUCKET_URL}/{}", tile_key(project, n)),
    )
    .with_size(16)
}

/// Five tiles in each of two projects
fn two_project_records() -> Vec<CatalogRecord> {
    ["CO_Denver_2016", "TX_Austin_2018"]
        .iter()
        .flat_map(|project| (1..=5).map(move |n| record(project, n)))
        .collect()
}

fn store_for(records: &[CatalogRecord]) -> MemoryStore {
    records.iter().fold(MemoryStore::new(), |store, r| {
        let key = r.download_url.trim_start_matches("s3://usgs-lidar/");
        store.with_object(key, format!("points for {}", r.source_id).into_bytes())
    })
}

fn orchestrator(output: &Path, max_files_per_project: Option<usize>) -> AcquisitionOrchestrator {
    let search = PaginatedSearchClient::new(CatalogConfig::with_base_url("http://127.0.0.1:9/api"))
        .expect("client should build");
    let config = OrchestratorConfig {
        output_dir: output.to_path_buf(),
        worker_config: ConfigPresets::testing(),
        max_files_per_project,
        handle_signals: false,
    };
    AcquisitionOrchestrator::new(config, search).expect("orchestrator should build")
}

fn count_files_with_suffix(dir: &Path, suffix: &str) -> usize {
    let mut count = 0;
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else if path.to_string_lossy().ends_with(suffix) {
                count += 1;
            }
        }
    }
    count
}

#[tokio::test]
async fn test_files_land_in_project_directories() {
    let dir = TempDir::new().unwrap();
    let records = two_project_records();
    let store = Arc::new(store_for(&records));

    let report = orchestrator(dir.path(), None)
        .run_from_records(records, store.clone(), None)
        .await
        .unwrap();

    assert_eq!(report.projects, 2);
    assert_eq!(report.downloaded, 10);
    assert!(report.is_complete_success());

    let denver = dir
        .path()
        .join("USGS_LPC_CO_Denver_2016")
        .join("USGS_LPC_CO_Denver_2016_0003.laz");
    assert_eq!(
        std::fs::read_to_string(denver).unwrap(),
        "points for CO_Denver_2016-3"
    );
    assert!(dir
        .path()
        .join("USGS_LPC_TX_Austin_2018")
        .join("USGS_LPC_TX_Austin_2018_0005.laz")
        .exists());
}

/// A second run over the same output transfers nothing
#[tokio::test]
async fn test_rerun_skips_completed_files() {
    let dir = TempDir::new().unwrap();
    let records = two_project_records();
    let store = Arc::new(store_for(&records));
    let orchestrator = orchestrator(dir.path(), None);

    let first = orchestrator
        .run_from_records(records.clone(), store.clone(), None)
        .await
        .unwrap();
    assert_eq!(first.downloaded, 10);
    assert_eq!(store.fetch_count(), 10);

    let second = orchestrator
        .run_from_records(records, store.clone(), None)
        .await
        .unwrap();
    assert_eq!(second.downloaded, 0);
    assert_eq!(second.skipped, 10);
    assert_eq!(second.bytes_downloaded, 0);
    assert_eq!(store.fetch_count(), 10);
}

#[tokio::test]
async fn test_existing_file_is_not_overwritten() {
    let dir = TempDir::new().unwrap();
    let records = vec![record("CO_Denver_2016", 1)];
    let store = Arc::new(store_for(&records));

    let project_dir = dir.path().join("USGS_LPC_CO_Denver_2016");
    std::fs::create_dir_all(&project_dir).unwrap();
    let existing = project_dir.join("USGS_LPC_CO_Denver_2016_0001.laz");
    std::fs::write(&existing, "local copy").unwrap();

    let report = orchestrator(dir.path(), None)
        .run_from_records(records, store.clone(), None)
        .await
        .unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(store.fetch_count(), 0);
    assert_eq!(std::fs::read_to_string(existing).unwrap(), "local copy");
}

/// One failing object does not disturb the other transfers
#[tokio::test]
async fn test_failure_is_isolated() {
    let dir = TempDir::new().unwrap();
    let records: Vec<CatalogRecord> = (1..=5).map(|n| record("CO_Denver_2016", n)).collect();
    let store = Arc::new(store_for(&records).with_failure(tile_key("CO_Denver_2016", 3)));

    let report = orchestrator(dir.path(), None)
        .run_from_records(records, store.clone(), None)
        .await
        .unwrap();

    assert_eq!(report.downloaded, 4);
    assert_eq!(report.failed, 1);
    assert!(!report.is_complete_success());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].key, tile_key("CO_Denver_2016", 3));

    let project_dir = dir.path().join("USGS_LPC_CO_Denver_2016");
    assert!(!project_dir.join("USGS_LPC_CO_Denver_2016_0003.laz").exists());
    assert_eq!(count_files_with_suffix(dir.path(), ".tmp"), 0);
    assert_eq!(count_files_with_suffix(dir.path(), ".laz"), 4);
}

/// A failed file is retried by the next run once the store recovers
#[tokio::test]
async fn test_rerun_retries_failed_file() {
    let dir = TempDir::new().unwrap();
    let records: Vec<CatalogRecord> = (1..=3).map(|n| record("CO_Denver_2016", n)).collect();
    let orchestrator = orchestrator(dir.path(), None);

    let flaky = Arc::new(store_for(&records).with_failure(tile_key("CO_Denver_2016", 2)));
    let first = orchestrator
        .run_from_records(records.clone(), flaky, None)
        .await
        .unwrap();
    assert_eq!(first.failed, 1);

    let healthy = Arc::new(store_for(&records));
    let second = orchestrator
        .run_from_records(records, healthy.clone(), None)
        .await
        .unwrap();
    assert_eq!(second.downloaded, 1);
    assert_eq!(second.skipped, 2);
    assert_eq!(healthy.fetch_count(), 1);
}

#[tokio::test]
async fn test_sampling_caps_each_project() {
    let dir = TempDir::new().unwrap();
    let records = two_project_records();
    let store = Arc::new(store_for(&records));

    let report = orchestrator(dir.path(), Some(2))
        .run_from_records(records, store.clone(), None)
        .await
        .unwrap();

    assert_eq!(report.records_found, 10);
    assert_eq!(report.tasks_planned, 4);
    assert_eq!(report.downloaded, 4);
    assert_eq!(count_files_with_suffix(&dir.path().join("USGS_LPC_CO_Denver_2016"), ".laz"), 2);
    assert_eq!(count_files_with_suffix(&dir.path().join("USGS_LPC_TX_Austin_2018"), ".laz"), 2);
}

/// Stopping drops queued work, counts it as cancelled and refuses new tasks
#[tokio::test]
async fn test_stop_cancels_queued_tasks() {
    let dir = TempDir::new().unwrap();
    let records: Vec<CatalogRecord> = (1..=10).map(|n| record("CO_Denver_2016", n)).collect();
    let store = Arc::new(store_for(&records).with_delay(Duration::from_millis(200)));

    let config = WorkerConfig {
        worker_count: 1,
        shutdown_timeout: Duration::from_secs(2),
        ..ConfigPresets::testing()
    };
    let mut pool = WorkerPool::new(config, store).unwrap();
    for r in &records {
        pool.enqueue(DownloadTask::new(r.clone(), "USGS_LPC_CO_Denver_2016", dir.path()).unwrap())
            .unwrap();
    }
    pool.start(1).unwrap();

    let stop = pool.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.stop();
    });

    let report = tokio::time::timeout(Duration::from_secs(5), pool.wait())
        .await
        .expect("wait should return after stop");

    assert!(report.cancelled >= 8, "cancelled: {}", report.cancelled);
    assert_eq!(report.processed() + report.cancelled, 10);
    assert_eq!(pool.state(), &PoolState::Shutdown);
    assert_eq!(count_files_with_suffix(dir.path(), ".tmp"), 0);

    let late = DownloadTask::new(records[0].clone(), "USGS_LPC_CO_Denver_2016", dir.path()).unwrap();
    let err = pool.enqueue(late).unwrap_err();
    assert!(matches!(err, DownloadError::Rejected { .. }));
}

/// Two keys sharing a file name resolve to one local path; only one is transferred
#[tokio::test]
async fn test_shared_file_name_downloads_once() {
    let dir = TempDir::new().unwrap();
    let records = vec![
        CatalogRecord::new("a", format!("{BUCKET_URL}/Projects/A/laz/X.laz")),
        CatalogRecord::new("a2", format!("{BUCKET_URL}/Projects/A_v2/LAZ/X.laz")),
    ];
    let store = Arc::new(store_for(&records).with_delay(Duration::from_millis(50)));

    // testing preset runs two workers
    let report = orchestrator(dir.path(), None)
        .run_from_records(records, store.clone(), None)
        .await
        .unwrap();

    assert_eq!(report.tasks_planned, 1);
    assert_eq!(report.downloaded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(store.fetch_count(), 1);
    assert_eq!(report.failures[0].key, "Projects/A_v2/LAZ/X.laz");
    assert!(report.failures[0].error.contains("already claimed"));

    assert_eq!(count_files_with_suffix(dir.path(), ".tmp"), 0);
    assert_eq!(count_files_with_suffix(dir.path(), ".laz"), 1);
    let file = dir.path().join("Unknown").join("X.laz");
    assert_eq!(std::fs::read_to_string(file).unwrap(), "points for a");
}
