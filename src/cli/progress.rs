//! Progress display for download runs
//!
//! Consumes the [`WorkerProgress`] channel fed by the worker pool and renders
//! an indicatif bar over the planned task count, with one status line per
//! worker. When stderr is not a terminal (or bars are disabled) the display
//! falls back to periodic log lines.
//!
//! # Examples
//!
//! ```rust,no_run
//! use lidar_fetcher::cli::{ProgressConfig, ProgressDisplay};
//! use tokio::sync::mpsc;
//!
//! # async fn example() {
//! let (tx, rx) = mpsc::channel(100);
//! let display = ProgressDisplay::start(ProgressConfig::default(), 42, 3, rx);
//! // hand `tx` to the worker pool, run it, drop every sender...
//! # drop(tx);
//! let totals = display.finish().await;
//! println!("{} files processed", totals.processed());
//! # }
//! ```

use std::collections::HashMap;
use std::io::IsTerminal;
use std::time::{Duration, Instant};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::models::format_file_size;
use crate::app::worker::{WorkerProgress, WorkerStatus};

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Draw progress bars (ignored when stderr is not a terminal)
    pub enable_progress_bars: bool,
    /// Show one status line per worker
    pub show_worker_details: bool,
    /// How often text mode logs a summary line
    pub text_report_interval: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bars: true,
            show_worker_details: true,
            text_report_interval: Duration::from_secs(10),
        }
    }
}

impl ProgressConfig {
    /// No bars, no worker lines; used for quiet runs and tests
    pub fn hidden() -> Self {
        Self {
            enable_progress_bars: false,
            show_worker_details: false,
            ..Self::default()
        }
    }
}

/// Counts observed on the progress channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressTotals {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes: u64,
}

impl ProgressTotals {
    pub fn processed(&self) -> usize {
        self.completed + self.skipped + self.failed
    }

    fn record(&mut self, event: &WorkerProgress) {
        match event.status {
            WorkerStatus::Completed => {
                self.completed += 1;
                self.bytes += event.bytes;
            }
            WorkerStatus::Skipped => self.skipped += 1,
            WorkerStatus::Failed => self.failed += 1,
            _ => {}
        }
    }

    fn message(&self) -> String {
        format!(
            "{} downloaded ({}), {} skipped, {} failed",
            self.completed,
            format_file_size(self.bytes),
            self.skipped,
            self.failed
        )
    }
}

/// Running progress display; finishes once every sender is dropped
pub struct ProgressDisplay {
    task: JoinHandle<ProgressTotals>,
}

impl ProgressDisplay {
    /// Spawn the display task for `total_tasks` files handled by `worker_count` workers
    pub fn start(
        config: ProgressConfig,
        total_tasks: usize,
        worker_count: usize,
        rx: mpsc::Receiver<WorkerProgress>,
    ) -> Self {
        let use_bars = config.enable_progress_bars && std::io::stderr().is_terminal();

        let task = if use_bars {
            let bars = Bars::new(&config, total_tasks, worker_count);
            tokio::spawn(run_bars(bars, rx))
        } else {
            tokio::spawn(run_text(config.text_report_interval, total_tasks, rx))
        };

        debug!(
            "Progress display started for {} files with {} workers",
            total_tasks, worker_count
        );
        Self { task }
    }

    /// Wait for the channel to close and return what was observed
    pub async fn finish(self) -> ProgressTotals {
        match self.task.await {
            Ok(totals) => totals,
            Err(e) => {
                warn!("Progress display task failed: {}", e);
                ProgressTotals::default()
            }
        }
    }
}

struct Bars {
    _multi: MultiProgress,
    main: ProgressBar,
    workers: HashMap<u32, ProgressBar>,
}

impl Bars {
    fn new(config: &ProgressConfig, total_tasks: usize, worker_count: usize) -> Self {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());

        let main = multi.add(ProgressBar::new(total_tasks as u64));
        match ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        {
            Ok(style) => main.set_style(style.progress_chars("##-")),
            Err(e) => debug!("Progress bar template error: {}", e),
        }
        main.enable_steady_tick(Duration::from_millis(120));

        let mut workers = HashMap::new();
        if config.show_worker_details {
            let spinner_style = ProgressStyle::default_spinner()
                .template("  Worker {prefix}: {spinner:.blue} {msg}")
                .ok();
            for id in 0..worker_count as u32 {
                let bar = multi.add(ProgressBar::new_spinner());
                if let Some(style) = &spinner_style {
                    bar.set_style(style.clone());
                }
                bar.set_prefix((id + 1).to_string());
                bar.set_message("Starting...");
                workers.insert(id, bar);
            }
        }

        Self {
            _multi: multi,
            main,
            workers,
        }
    }

    fn apply(&self, event: &WorkerProgress, totals: &ProgressTotals) {
        if let Some(bar) = self.workers.get(&event.worker_id) {
            bar.set_message(event.status_description());
            if event.status == WorkerStatus::Shutdown {
                bar.finish();
            }
        }
        if event.status.is_terminal() {
            self.main.inc(1);
            self.main.set_message(totals.message());
        }
    }

    fn finish(&self, totals: &ProgressTotals) {
        for bar in self.workers.values() {
            bar.finish_and_clear();
        }
        self.main.finish_with_message(totals.message());
    }
}

async fn run_bars(bars: Bars, mut rx: mpsc::Receiver<WorkerProgress>) -> ProgressTotals {
    let mut totals = ProgressTotals::default();
    while let Some(event) = rx.recv().await {
        totals.record(&event);
        bars.apply(&event, &totals);
    }
    bars.finish(&totals);
    totals
}

async fn run_text(
    interval: Duration,
    total_tasks: usize,
    mut rx: mpsc::Receiver<WorkerProgress>,
) -> ProgressTotals {
    let mut totals = ProgressTotals::default();
    let mut last_report = Instant::now();

    while let Some(event) = rx.recv().await {
        totals.record(&event);
        if event.status == WorkerStatus::Failed {
            debug!("{}", event.status_description());
        }
        if last_report.elapsed() >= interval {
            info!(
                "Progress: {}/{} - {}",
                totals.processed(),
                total_tasks,
                totals.message()
            );
            last_report = Instant::now();
        }
    }

    totals
}
