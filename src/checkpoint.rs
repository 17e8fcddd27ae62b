//! Durable training progress. A checkpoint bundles the session's
//! `TrainingState` with a full network snapshot and is written atomically
//! (write new file, then rename) so a crash mid-write always leaves the
//! previous checkpoint intact.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::network::NetworkSnapshot;

/// The permanent experiment record, owned exclusively by the training
/// session. Created at session start, mutated once per completed trial,
/// never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingState {
    pub session_id: String,
    /// Monotonically increasing trial counter.
    pub step: u64,
    /// Snapshotted once at session start, immutable thereafter.
    pub hyperparameters: BTreeMap<String, String>,
    /// Append-only per-step result log.
    pub results: Vec<StepResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step: u64,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub training_state: TrainingState,
    pub network: NetworkSnapshot,
}

pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let path = self.path(&checkpoint.training_state.session_id);
        let tmp_path = path.with_extension("json.tmp");

        fs::write(&tmp_path, serde_json::to_vec(checkpoint)?)?;
        fs::rename(&tmp_path, &path)?;

        Ok(())
    }

    pub fn load(&self, session_id: &str) -> Result<Checkpoint> {
        let path = self.path(session_id);

        if !path.exists() {
            return Err(Error::ResumeMismatch(format!(
                "no checkpoint found for session '{}'",
                session_id
            )));
        }

        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }

    pub fn exists(&self, session_id: &str) -> bool {
        self.path(session_id).exists()
    }

    /// Removes the checkpoint of a completed run.
    pub fn remove(&self, session_id: &str) -> Result<()> {
        fs::remove_file(self.path(session_id))?;
        Ok(())
    }

    fn path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", session_id))
    }
}
