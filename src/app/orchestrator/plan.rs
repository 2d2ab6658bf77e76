//! Conversion of grouped records into download tasks

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::app::models::DownloadTask;
use crate::app::projects::ProjectGroups;
use crate::app::worker::FailedTask;
use crate::errors::DownloadError;

/// Tasks for one project bucket
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectPlan {
    pub name: String,
    pub tasks: Vec<DownloadTask>,
}

impl ProjectPlan {
    /// Sum of reported record sizes
    pub fn total_size(&self) -> u64 {
        self.tasks.iter().filter_map(|t| t.record.size_bytes).sum()
    }
}

/// Every task a run will enqueue, by project
///
/// Records whose download URL is not a store locator cannot become tasks;
/// they are kept in `invalid` and reported as failures. So are records whose
/// local path is already taken by an earlier task, since two workers must
/// never write the same file. The first record for a path keeps it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcquisitionPlan {
    pub projects: Vec<ProjectPlan>,
    pub invalid: Vec<FailedTask>,
}

impl AcquisitionPlan {
    /// Build tasks rooted at `output_dir` from grouped records
    pub fn build(groups: ProjectGroups, output_dir: &Path) -> Self {
        let mut plan = Self::default();
        let mut claimed: HashMap<PathBuf, String> = HashMap::new();

        for (name, records) in groups {
            let mut tasks = Vec::with_capacity(records.len());
            for record in records {
                let fallback_path = output_dir.join(&name).join(record.file_name());
                let download_url = record.download_url.clone();

                match DownloadTask::new(record, &name, output_dir) {
                    Ok(task) => match claimed.get(&task.local_path) {
                        Some(owner) => {
                            let error = DownloadError::DuplicateDestination {
                                path: task.local_path.clone(),
                                claimed_by: owner.clone(),
                            };
                            warn!("Skipping {}: {}", task.location.key, error);
                            plan.invalid.push(FailedTask {
                                key: task.location.key,
                                local_path: task.local_path,
                                error: error.to_string(),
                            });
                        }
                        None => {
                            claimed.insert(task.local_path.clone(), task.location.key.clone());
                            tasks.push(task);
                        }
                    },
                    Err(e) => {
                        warn!("Skipping record with unusable locator: {}", e);
                        plan.invalid.push(FailedTask {
                            key: download_url,
                            local_path: fallback_path,
                            error: e.to_string(),
                        });
                    }
                }
            }

            if !tasks.is_empty() {
                plan.projects.push(ProjectPlan { name, tasks });
            }
        }

        plan
    }

    /// Number of tasks across all projects
    pub fn task_count(&self) -> usize {
        self.projects.iter().map(|p| p.tasks.len()).sum()
    }

    /// Sum of reported sizes across all projects
    pub fn total_size(&self) -> u64 {
        self.projects.iter().map(ProjectPlan::total_size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.task_count() == 0
    }

    /// Per-project summary rows: name, task count, total size
    pub fn summary(&self) -> Vec<PlanSummary> {
        self.projects
            .iter()
            .map(|p| PlanSummary {
                project: p.name.clone(),
                files: p.tasks.len(),
                total_bytes: p.total_size(),
            })
            .collect()
    }

    /// Consume the plan, yielding tasks project by project
    pub fn into_tasks(self) -> impl Iterator<Item = DownloadTask> {
        self.projects.into_iter().flat_map(|p| p.tasks)
    }
}

/// One line of a dry-run plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanSummary {
    pub project: String,
    pub files: usize,
    pub total_bytes: u64,
}
