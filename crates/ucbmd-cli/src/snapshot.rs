//! Epoch snapshots: the clustered, modelled state of a campaign as JSON.
//!
//! Lets the decision pass run on data produced by external clustering and
//! Markov-model tools.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use ucbmd_core::{SimRecord, Trajectory, TrajectoryDataset};

/// One trajectory of the snapshot, already assigned to action-space states.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotTrajectory {
    pub sim: SimRecord,
    pub labels: Vec<i32>,
    /// Stationary probability of each frame's state
    pub statdist: Vec<f64>,
    /// Goal value of each frame
    #[serde(default)]
    pub goal: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochSnapshot {
    pub epoch: usize,
    /// Simulations still running
    #[serde(default)]
    pub running: usize,
    pub n_states: usize,
    pub trajectories: Vec<SnapshotTrajectory>,
}

impl EpochSnapshot {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let snapshot: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn validate(&self) -> Result<()> {
        if self.trajectories.is_empty() {
            bail!("snapshot has no trajectories");
        }
        for traj in &self.trajectories {
            let n = traj.labels.len();
            if traj.statdist.len() != n {
                bail!(
                    "simulation {}: {} labels but {} stationary probabilities",
                    traj.sim.id,
                    n,
                    traj.statdist.len()
                );
            }
            if let Some(goal) = &traj.goal {
                if goal.len() != n {
                    bail!(
                        "simulation {}: {} labels but {} goal values",
                        traj.sim.id,
                        n,
                        goal.len()
                    );
                }
            }
        }
        let with_goal = self.trajectories.iter().filter(|t| t.goal.is_some()).count();
        if with_goal != 0 && with_goal != self.trajectories.len() {
            bail!(
                "goal values given for {} of {} trajectories",
                with_goal,
                self.trajectories.len()
            );
        }
        Ok(())
    }

    pub fn dataset(&self, skip: usize) -> Result<TrajectoryDataset> {
        let trajectories = self
            .trajectories
            .iter()
            .map(|t| Trajectory::from_labels(t.sim.clone(), t.labels.clone()))
            .collect();
        Ok(TrajectoryDataset::clustered(trajectories, self.n_states, skip)?)
    }

    pub fn statdist(&self) -> Vec<Vec<f64>> {
        self.trajectories.iter().map(|t| t.statdist.clone()).collect()
    }

    /// Concatenated goal values, when the snapshot carries them.
    pub fn goal(&self) -> Option<Vec<f64>> {
        self.trajectories
            .iter()
            .map(|t| t.goal.clone())
            .collect::<Option<Vec<_>>>()
            .map(|g| g.concat())
    }
}
