//! Batch orchestrator: fetch each name in order, admit it through the gate,
//! and run its pipeline on the blocking pool.
//!
//! Fetches are sequential. A fetch failure stops further fetches, but
//! pipelines already admitted always run to completion and are joined before
//! `run` returns. The first failure recorded by any task is kept.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::downloader;
use crate::error::DownloadError;
use crate::progress::ProgressDisplay;
use crate::remote::{Container, ObjectStore};
use crate::storage;

use super::failure::FirstFailure;
use super::gate::ConcurrencyGate;

/// Default number of simultaneous downloads.
pub const DEFAULT_THREADS: usize = 5;

/// What happened to each requested name.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Names downloaded and verified (completion order).
    pub completed: Vec<String>,
    /// Names whose fetch or pipeline failed.
    pub failed: Vec<String>,
    /// Names never fetched because an earlier fetch failed.
    pub not_attempted: Vec<String>,
    /// The first failure recorded across all tasks.
    pub first_failure: Option<DownloadError>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.first_failure.is_none()
    }

    pub fn into_result(self) -> Result<(), DownloadError> {
        match self.first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

enum TaskOutcome {
    Completed(String),
    Failed(String),
}

/// Downloads batches of objects from one container.
pub struct BatchDownloader<C: Container + 'static> {
    container: Arc<C>,
    gate: Arc<ConcurrencyGate>,
    display: Arc<dyn ProgressDisplay>,
    dest_root: PathBuf,
}

impl<C: Container + 'static> BatchDownloader<C> {
    /// `threads` bounds simultaneous pipelines (clamped to at least 1);
    /// objects are written under `dest_root` at their own names.
    pub fn new(
        container: C,
        threads: usize,
        dest_root: impl Into<PathBuf>,
        display: Arc<dyn ProgressDisplay>,
    ) -> Self {
        Self {
            container: Arc::new(container),
            gate: Arc::new(ConcurrencyGate::new(threads)),
            display,
            dest_root: dest_root.into(),
        }
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Download `names` in the order given.
    pub async fn run(&self, names: &[String]) -> BatchReport {
        let failures = Arc::new(FirstFailure::new());
        let mut report = BatchReport::default();
        let mut tasks: JoinSet<TaskOutcome> = JoinSet::new();
        // Names of spawned tasks that have not reported an outcome yet.
        let mut in_flight: Vec<String> = Vec::new();
        tracing::info!(
            container = %self.container.id(),
            count = names.len(),
            threads = self.gate.capacity(),
            "batch started"
        );

        for (index, name) in names.iter().enumerate() {
            let dest = match storage::destination_path(&self.dest_root, name) {
                Ok(dest) => dest,
                Err(err) => {
                    report_failure(&failures, self.display.as_ref(), err);
                    report.failed.push(name.clone());
                    continue;
                }
            };

            let fetched = {
                let container = Arc::clone(&self.container);
                let name = name.clone();
                tokio::task::spawn_blocking(move || container.fetch_object(&name)).await
            };
            let handle = match fetched {
                Ok(Ok(handle)) => handle,
                Ok(Err(err)) => {
                    let err = DownloadError::from_fetch(self.container.id(), name, err);
                    report_failure(&failures, self.display.as_ref(), err);
                    report.failed.push(name.clone());
                    report.not_attempted = names[index + 1..].to_vec();
                    break;
                }
                Err(join_err) => {
                    let err = DownloadError::TaskAborted {
                        name: name.clone(),
                        reason: format!("metadata fetch: {}", join_err),
                    };
                    report_failure(&failures, self.display.as_ref(), err);
                    report.failed.push(name.clone());
                    report.not_attempted = names[index + 1..].to_vec();
                    break;
                }
            };

            let permit = self.gate.acquire().await;
            let display = Arc::clone(&self.display);
            let failures = Arc::clone(&failures);
            let name = name.clone();
            in_flight.push(name.clone());
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    downloader::download_object(handle, &dest, display.as_ref())
                }));
                let err = match result {
                    Ok(Ok(outcome)) => {
                        tracing::info!(
                            name = %outcome.name,
                            bytes = outcome.bytes,
                            sha1 = %outcome.sha1,
                            "downloaded"
                        );
                        return TaskOutcome::Completed(name);
                    }
                    Ok(Err(err)) => err,
                    Err(payload) => DownloadError::TaskAborted {
                        name: name.clone(),
                        reason: panic_message(payload.as_ref()),
                    },
                };
                report_failure(&failures, display.as_ref(), err);
                TaskOutcome::Failed(name)
            });
        }

        let mut lost = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    lost.get_or_insert_with(|| join_err.to_string());
                    continue;
                }
            };
            let name = match outcome {
                TaskOutcome::Completed(name) => {
                    report.completed.push(name.clone());
                    name
                }
                TaskOutcome::Failed(name) => {
                    report.failed.push(name.clone());
                    name
                }
            };
            if let Some(pos) = in_flight.iter().position(|n| *n == name) {
                in_flight.swap_remove(pos);
            }
        }

        // Tasks the runtime dropped without an outcome.
        for name in in_flight {
            let err = DownloadError::TaskAborted {
                name: name.clone(),
                reason: lost.clone().unwrap_or_else(|| "task lost".to_string()),
            };
            report_failure(&failures, self.display.as_ref(), err);
            report.failed.push(name);
        }

        report.first_failure = failures.take();
        tracing::info!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            not_attempted = report.not_attempted.len(),
            peak = self.gate.peak(),
            "batch finished"
        );
        report
    }
}

/// Resolve `id` in `store`, treating an absent container as `ContainerNotFound`.
pub async fn resolve_container<S>(store: Arc<S>, id: &str) -> Result<S::Container, DownloadError>
where
    S: ObjectStore + 'static,
{
    let lookup = {
        let id = id.to_string();
        tokio::task::spawn_blocking(move || store.resolve_container(&id)).await
    };
    match lookup {
        Ok(Ok(Some(container))) => Ok(container),
        Ok(Ok(None)) => Err(DownloadError::ContainerNotFound {
            container: id.to_string(),
            source: None,
        }),
        Ok(Err(err)) => Err(DownloadError::from_lookup(id, err)),
        Err(join_err) => Err(DownloadError::TaskAborted {
            name: id.to_string(),
            reason: join_err.to_string(),
        }),
    }
}

/// Resolve the container and download `names` from it. A missing container
/// is reported as the batch's only failure with every name left unattempted.
pub async fn download_batch<S>(
    store: Arc<S>,
    container_id: &str,
    names: &[String],
    threads: usize,
    dest_root: impl Into<PathBuf>,
    display: Arc<dyn ProgressDisplay>,
) -> BatchReport
where
    S: ObjectStore + 'static,
{
    match resolve_container(store, container_id).await {
        Ok(container) => {
            BatchDownloader::new(container, threads, dest_root, display)
                .run(names)
                .await
        }
        Err(err) => {
            display.report(&err.to_string());
            tracing::error!(container = %container_id, error = %err, "could not resolve bucket");
            BatchReport {
                not_attempted: names.to_vec(),
                first_failure: Some(err),
                ..BatchReport::default()
            }
        }
    }
}

/// Print a failure immediately and offer it to the shared first-failure slot.
fn report_failure(failures: &FirstFailure, display: &dyn ProgressDisplay, err: DownloadError) {
    tracing::error!(kind = ?err.kind(), error = %err, "download failed");
    display.report(&err.to_string());
    failures.record(err);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "pipeline panicked".to_string()
    }
}
