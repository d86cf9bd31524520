//! Persistence layer with bincode serialization and background snapshots.

use crate::plagiarism::PolicyConfig;
use crate::store::SubmissionStore;
use crate::structures::Submission;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::interval;
use tracing::{error, info};

#[derive(Debug, Serialize, Deserialize)]
struct PersistedState {
    submissions: HashMap<String, Submission>,
    version: u32,
    saved_at: u64,
}

const PERSISTENCE_VERSION: u32 = 1;
pub const SNAPSHOT_FILE: &str = "submissions.bin";

pub struct PersistenceManager {
    data_dir: PathBuf,
    snapshot_interval: Duration,
}

impl PersistenceManager {
    pub fn new(data_dir: impl AsRef<Path>, snapshot_interval_secs: u64) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();

        if let Err(e) = fs::create_dir_all(&data_dir) {
            error!("Failed to create data directory {:?}: {}", data_dir, e);
        }

        Self {
            data_dir,
            snapshot_interval: Duration::from_secs(snapshot_interval_secs),
        }
    }

    fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }

    pub fn load_state(&self) -> Result<DashMap<String, Submission>, Box<dyn std::error::Error>> {
        let snapshot_path = self.snapshot_path();

        if !snapshot_path.exists() {
            info!("No existing snapshot found, starting with empty state");
            return Ok(DashMap::new());
        }

        Self::load_from_path(&snapshot_path)
    }

    pub fn load_from_path(path: &Path) -> Result<DashMap<String, Submission>, Box<dyn std::error::Error>> {
        info!("Loading state from {:?}", path);

        let data = fs::read(path)?;
        let state: PersistedState = bincode::deserialize(&data)?;

        info!(
            "Loaded {} submissions from snapshot (version: {}, saved: {})",
            state.submissions.len(),
            state.version,
            state.saved_at
        );

        Ok(state.submissions.into_iter().collect())
    }

    pub fn save_state(&self, store: &SubmissionStore) -> Result<(), Box<dyn std::error::Error>> {
        Self::save_to_path(store, &self.snapshot_path())
    }

    /// Writes a snapshot to `path` via a temp file and rename.
    pub fn save_to_path(store: &SubmissionStore, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let start = std::time::Instant::now();

        let submissions: HashMap<String, Submission> = store
            .get_submissions()
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let state = PersistedState {
            submissions,
            version: PERSISTENCE_VERSION,
            saved_at: SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs(),
        };

        let data = bincode::serialize(&state)?;

        let temp_path = path.with_extension("bin.tmp");
        fs::write(&temp_path, &data)?;
        fs::rename(&temp_path, path)?;

        info!(
            "Saved {} submissions to snapshot in {:?} ({} bytes)",
            state.submissions.len(),
            start.elapsed(),
            data.len()
        );

        Ok(())
    }

    /// Restores a store from the data directory, or an empty one.
    pub fn restore(&self, policy: PolicyConfig) -> SubmissionStore {
        match self.load_state() {
            Ok(submissions) => SubmissionStore::from_state(submissions, policy),
            Err(e) => {
                info!("Failed to load state: {}, starting fresh", e);
                SubmissionStore::with_policy(policy)
            }
        }
    }

    pub async fn start_background_snapshots(
        &self,
        store: Arc<SubmissionStore>,
    ) -> tokio::task::JoinHandle<()> {
        let persistence = self.clone();

        tokio::spawn(async move {
            let mut interval = interval(persistence.snapshot_interval);

            loop {
                interval.tick().await;

                if let Err(e) = persistence.save_state(&store) {
                    error!("Background snapshot failed: {}", e);
                } else {
                    info!("Background snapshot completed");
                }
            }
        })
    }
}

impl Clone for PersistenceManager {
    fn clone(&self) -> Self {
        Self {
            data_dir: self.data_dir.clone(),
            snapshot_interval: self.snapshot_interval,
        }
    }
}

/// Save a final snapshot on SIGINT/SIGTERM, then exit.
pub async fn setup_shutdown_handler(persistence: PersistenceManager, store: Arc<SubmissionStore>) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;

        info!("Saving final snapshot before shutdown...");
        if let Err(e) = persistence.save_state(&store) {
            error!("Failed to save final snapshot: {}", e);
        } else {
            info!("Final snapshot saved successfully");
        }

        std::process::exit(0);
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(i), Ok(t)) => (i, t),
        _ => {
            error!("Failed to install signal handlers, falling back to ctrl-c");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received ctrl-c, shutting down gracefully...");
}
