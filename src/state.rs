//! Per-owner run registry for the polling layer.
//!
//! At most one run per owner is active at a time. A run's latest snapshot
//! stays readable after it finishes until `sweep_expired` removes it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::db::EnrichmentDb;
use crate::enrichment::{run_enrichment, BatchResult, CancelHandle, ProgressSink, RunOptions};
use crate::provider::IdentityProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// What a poller sees for one owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub status: RunStatus,
    pub result: BatchResult,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Why the run could not complete (store or runtime failure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("An enrichment run is already in progress for {0}")]
    AlreadyRunning(String),
}

struct RunEntry {
    snapshot: RunSnapshot,
    cancel: CancelHandle,
    finished: Option<Instant>,
}

#[derive(Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<String, RunEntry>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the owner's slot. Fails while a previous run is still active.
    pub fn try_start(self: &Arc<Self>, owner_id: &str) -> Result<RunHandle, RegistryError> {
        let mut runs = self.runs.lock();
        if let Some(entry) = runs.get(owner_id) {
            if entry.snapshot.status == RunStatus::Running {
                return Err(RegistryError::AlreadyRunning(owner_id.to_string()));
            }
        }

        let cancel = CancelHandle::new();
        runs.insert(
            owner_id.to_string(),
            RunEntry {
                snapshot: RunSnapshot {
                    status: RunStatus::Running,
                    result: BatchResult::default(),
                    started_at: Utc::now(),
                    finished_at: None,
                    failure: None,
                },
                cancel: cancel.clone(),
                finished: None,
            },
        );

        Ok(RunHandle {
            registry: Arc::clone(self),
            owner_id: owner_id.to_string(),
            cancel,
            finished: false,
        })
    }

    pub fn snapshot(&self, owner_id: &str) -> Option<RunSnapshot> {
        self.runs.lock().get(owner_id).map(|entry| entry.snapshot.clone())
    }

    /// Ask an active run to stop. Returns false if nothing is running.
    pub fn cancel(&self, owner_id: &str) -> bool {
        match self.runs.lock().get(owner_id) {
            Some(entry) if entry.snapshot.status == RunStatus::Running => {
                entry.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Drop finished runs older than `ttl`. Active runs are never removed.
    pub fn sweep_expired(&self, ttl: Duration) -> usize {
        let mut runs = self.runs.lock();
        let before = runs.len();
        runs.retain(|_, entry| match entry.finished {
            Some(at) => at.elapsed() < ttl,
            None => true,
        });
        before - runs.len()
    }

    fn publish(&self, owner_id: &str, result: &BatchResult) {
        if let Some(entry) = self.runs.lock().get_mut(owner_id) {
            entry.snapshot.result = result.clone();
        }
    }

    fn complete(&self, owner_id: &str, status: RunStatus, result: Option<BatchResult>, failure: Option<String>) {
        if let Some(entry) = self.runs.lock().get_mut(owner_id) {
            entry.snapshot.status = status;
            if let Some(result) = result {
                entry.snapshot.result = result;
            }
            entry.snapshot.failure = failure;
            entry.snapshot.finished_at = Some(Utc::now());
            entry.finished = Some(Instant::now());
        }
    }
}

/// Exclusive claim on one owner's run slot.
///
/// Publishes every progress snapshot into the registry. Dropping the handle
/// without calling [`RunHandle::finish`] marks the run failed.
pub struct RunHandle {
    registry: Arc<RunRegistry>,
    owner_id: String,
    cancel: CancelHandle,
    finished: bool,
}

impl RunHandle {
    pub fn cancel_handle(&self) -> &CancelHandle {
        &self.cancel
    }

    pub fn finish(mut self, outcome: Result<BatchResult, String>) {
        self.finished = true;
        match outcome {
            Ok(result) => {
                let status = if self.cancel.is_cancelled() {
                    RunStatus::Cancelled
                } else {
                    RunStatus::Completed
                };
                self.registry.complete(&self.owner_id, status, Some(result), None);
            }
            Err(e) => {
                self.registry.complete(&self.owner_id, RunStatus::Failed, None, Some(e));
            }
        }
    }
}

impl ProgressSink for RunHandle {
    fn report(&self, snapshot: &BatchResult) {
        self.registry.publish(&self.owner_id, snapshot);
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        if !self.finished {
            log::warn!("Enrichment run for {} ended without a result", self.owner_id);
            self.registry.complete(
                &self.owner_id,
                RunStatus::Failed,
                None,
                Some("Run ended unexpectedly".to_string()),
            );
        }
    }
}

/// Start a run on a dedicated thread with its own runtime and connection.
///
/// Returns once the owner's slot is claimed; poll the registry for progress.
pub fn spawn_enrichment_run(
    db_path: PathBuf,
    provider: Arc<dyn IdentityProvider>,
    registry: Arc<RunRegistry>,
    owner_id: String,
    options: RunOptions,
) -> Result<JoinHandle<()>, RegistryError> {
    registry.sweep_expired(options.settings.registry_ttl());
    let handle = registry.try_start(&owner_id)?;

    Ok(std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                handle.finish(Err(format!("Failed to create runtime: {}", e)));
                return;
            }
        };

        let db = match EnrichmentDb::open_at(db_path) {
            Ok(db) => db,
            Err(e) => {
                log::warn!("Enrichment run: failed to open database: {}", e);
                handle.finish(Err(e.to_string()));
                return;
            }
        };

        let cancel = handle.cancel_handle().clone();
        let outcome = rt.block_on(run_enrichment(
            &db,
            provider.as_ref(),
            &owner_id,
            &options,
            &handle,
            &cancel,
        ));
        handle.finish(outcome.map_err(|e| e.to_string()));
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::{sample_person, test_db_path};
    use crate::enrichment::EnrichmentSettings;
    use crate::provider::testing::{profile, Scripted, ScriptedProvider};

    #[test]
    fn test_one_run_per_owner() {
        let registry = Arc::new(RunRegistry::new());
        let handle = registry.try_start("u1").expect("first run");
        assert!(matches!(registry.try_start("u1"), Err(RegistryError::AlreadyRunning(_))));
        // Other owners are independent.
        let other = registry.try_start("u2").expect("other owner");

        handle.finish(Ok(BatchResult::default()));
        other.finish(Ok(BatchResult::default()));
        assert!(registry.try_start("u1").is_ok(), "slot frees once finished");
    }

    #[test]
    fn test_progress_is_published_and_final_result_kept() {
        let registry = Arc::new(RunRegistry::new());
        let handle = registry.try_start("u1").expect("start");
        handle.report(&BatchResult { total: 10, enriched: 3, ..Default::default() });

        let snap = registry.snapshot("u1").expect("snapshot");
        assert_eq!(snap.status, RunStatus::Running);
        assert_eq!(snap.result.enriched, 3);

        let final_result = BatchResult { total: 10, enriched: 4, skipped: 6, ..Default::default() };
        handle.finish(Ok(final_result.clone()));
        let snap = registry.snapshot("u1").expect("snapshot");
        assert_eq!(snap.status, RunStatus::Completed);
        assert_eq!(snap.result, final_result);
        assert!(snap.finished_at.is_some());
    }

    #[test]
    fn test_cancel_marks_run_cancelled() {
        let registry = Arc::new(RunRegistry::new());
        let handle = registry.try_start("u1").expect("start");
        assert!(registry.cancel("u1"));
        assert!(handle.cancel_handle().is_cancelled());
        handle.finish(Ok(BatchResult::default()));

        assert_eq!(registry.snapshot("u1").expect("snapshot").status, RunStatus::Cancelled);
        assert!(!registry.cancel("u1"), "nothing left to cancel");
        assert!(!registry.cancel("nobody"));
    }

    #[test]
    fn test_dropped_handle_marks_failed() {
        let registry = Arc::new(RunRegistry::new());
        drop(registry.try_start("u1").expect("start"));
        let snap = registry.snapshot("u1").expect("snapshot");
        assert_eq!(snap.status, RunStatus::Failed);
        assert!(snap.failure.is_some());
    }

    #[test]
    fn test_sweep_only_removes_finished_runs() {
        let registry = Arc::new(RunRegistry::new());
        let done = registry.try_start("done").expect("start");
        done.finish(Ok(BatchResult::default()));
        let _active = registry.try_start("active").expect("start");

        assert_eq!(registry.sweep_expired(Duration::from_secs(3600)), 0);
        assert_eq!(registry.sweep_expired(Duration::ZERO), 1);
        assert!(registry.snapshot("done").is_none());
        assert!(registry.snapshot("active").is_some());
    }

    #[test]
    fn test_spawned_run_completes() {
        let path = test_db_path();
        {
            let db = EnrichmentDb::open_at(path.clone()).expect("open");
            db.upsert_person(&sample_person("p1", "u1", "sam@acme.com")).expect("insert");
            db.upsert_person(&sample_person("p2", "u1", "info@acme.com")).expect("insert");
        }

        let provider: Arc<dyn IdentityProvider> = Arc::new(
            ScriptedProvider::new().person("sam@acme.com", Scripted::Found(profile("ap-1", "CTO"))),
        );
        let registry = Arc::new(RunRegistry::new());
        let options = RunOptions {
            force: false,
            settings: EnrichmentSettings { throttle_ms: 0, ..EnrichmentSettings::default() },
        };

        let join = spawn_enrichment_run(path.clone(), provider, registry.clone(), "u1".to_string(), options)
            .expect("spawn");
        join.join().expect("run thread");

        let snap = registry.snapshot("u1").expect("snapshot");
        assert_eq!(snap.status, RunStatus::Completed);
        assert_eq!((snap.result.total, snap.result.enriched, snap.result.skipped), (2, 1, 1));

        let db = EnrichmentDb::open_at(path).expect("reopen");
        assert_eq!(
            db.get_person("p1").expect("query").expect("exists").title.as_deref(),
            Some("CTO")
        );
    }

    #[test]
    fn test_spawn_rejects_concurrent_run() {
        let registry = Arc::new(RunRegistry::new());
        let _held = registry.try_start("u1").expect("start");
        let provider: Arc<dyn IdentityProvider> = Arc::new(ScriptedProvider::new());
        let result = spawn_enrichment_run(test_db_path(), provider, registry, "u1".to_string(), RunOptions::default());
        assert!(matches!(result, Err(RegistryError::AlreadyRunning(_))));
    }
}
