//! Collaborator contracts consumed by the adaptive loop.
//!
//! Projection, dimensionality reduction, clustering and Markov-model
//! estimation are implemented outside this workspace. The orchestrator only
//! sees them through these narrow traits, and every call returns a fresh
//! snapshot rather than mutating its input.

use crate::errors::Result;
use crate::model::MarkovModel;
use crate::types::{SimRecord, TrajectoryDataset};

/// Turns finished simulations into per-frame feature vectors.
pub trait Projector {
    /// Projects every simulation, keeping one frame in `skip`.
    ///
    /// Simulations that cannot be read are left out of the result, so the
    /// returned dataset may hold fewer trajectories than `sims`.
    fn project(&self, sims: &[SimRecord], skip: usize) -> Result<TrajectoryDataset>;
}

/// Linear dimensionality reduction (TICA or equivalent).
pub trait DimensionReducer {
    /// Projects `data` onto its `dim` slowest components at the given lag.
    fn reduce(&self, data: &TrajectoryDataset, lag: usize, dim: usize)
        -> Result<TrajectoryDataset>;
}

/// Labels produced by one clustering run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAssignment {
    /// One label per frame, per trajectory
    pub labels: Vec<Vec<i32>>,
    /// Number of clusters actually produced
    pub n_clusters: usize,
}

/// Conformational clustering.
pub trait Clusterer {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// Clusters all frames of `data` into `n_clusters` groups.
    ///
    /// Pathological cluster counts are reported as
    /// [`UcbError::TransientClustering`](crate::UcbError::TransientClustering)
    /// and retried by the caller with identical parameters.
    fn cluster(&self, data: &TrajectoryDataset, n_clusters: usize) -> Result<ClusterAssignment>;
}

/// Markov state model estimation on a clustered dataset.
pub trait MarkovModeller {
    /// The `n_timescales` slowest implied relaxation timescales at `lag`, in frames.
    fn implied_timescales(
        &self,
        data: &TrajectoryDataset,
        lag: usize,
        n_timescales: usize,
    ) -> Result<Vec<f64>>;

    /// Estimates the model and lumps it into `n_macrostates` macrostates.
    fn estimate(
        &self,
        data: &TrajectoryDataset,
        lag: usize,
        n_macrostates: usize,
    ) -> Result<MarkovModel>;
}
