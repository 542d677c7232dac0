//! Opt-in per-epoch artifacts, one JSON file per quantity.
//!
//! Files are named `e{epoch}_{name}.json` inside the configured directory.

use serde::Serialize;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use ucbmd_core::Result;

pub const GOAL_DATA: &str = "goaldata";
pub const ACTIONS: &str = "actions";
pub const Q_VALUES: &str = "qval";
pub const N_VALUES: &str = "nval";
pub const UCB_VALUES: &str = "ucbvals";
pub const MODEL: &str = "adapt_model";

/// Writer for the artifacts of one epoch.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    epoch: usize,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, epoch: usize) -> Self {
        Self {
            dir: dir.into(),
            epoch,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path an artifact would be written to.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("e{}_{}.json", self.epoch, name))
    }

    /// Serializes `value` to its artifact file, creating the directory on demand.
    pub fn save<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(name);
        let writer = BufWriter::new(fs::File::create(&path)?);
        serde_json::to_writer(writer, value)?;
        log::debug!("Saved {}", path.display());
        Ok(path)
    }
}
