//! Mock collaborators - Testing Implementation
//!
//! Deterministic stand-ins for projection, reduction, clustering and Markov
//! model estimation. Useful for:
//! - Unit tests
//! - Integration tests
//! - Dry runs of the decision logic on precomputed data

use std::cell::Cell;
use std::collections::HashMap;
use ucbmd_core::{
    ClusterAssignment, Clusterer, DimensionReducer, MarkovModel, MarkovModeller, Projector,
    Result, SimRecord, Trajectory, TrajectoryDataset, UcbError,
};

/// Serves fixed per-simulation feature vectors.
///
/// Simulations it has no data for are skipped, like unreadable trajectories.
#[derive(Debug, Clone, Default)]
pub struct FixedProjector {
    features: HashMap<usize, Vec<Vec<f64>>>,
}

impl FixedProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the full-resolution frames of simulation `sim_id`.
    pub fn with_sim(mut self, sim_id: usize, features: Vec<Vec<f64>>) -> Self {
        self.features.insert(sim_id, features);
        self
    }

    /// Registers one scalar per frame.
    pub fn with_scalars(self, sim_id: usize, values: &[f64]) -> Self {
        self.with_sim(sim_id, values.iter().map(|&v| vec![v]).collect())
    }
}

impl Projector for FixedProjector {
    fn project(&self, sims: &[SimRecord], skip: usize) -> Result<TrajectoryDataset> {
        let skip = skip.max(1);
        let trajectories = sims
            .iter()
            .filter_map(|sim| {
                let frames = self.features.get(&sim.id)?;
                Some(Trajectory::new(
                    sim.clone(),
                    frames.iter().step_by(skip).cloned().collect(),
                ))
            })
            .collect();
        Ok(TrajectoryDataset::new(trajectories, skip))
    }
}

/// Keeps the first `dim` feature columns; the lag is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct TruncatingReducer;

impl DimensionReducer for TruncatingReducer {
    fn reduce(
        &self,
        data: &TrajectoryDataset,
        _lag: usize,
        dim: usize,
    ) -> Result<TrajectoryDataset> {
        let trajectories = data
            .trajectories()
            .iter()
            .map(|t| {
                Trajectory::new(
                    t.sim.clone(),
                    t.features
                        .iter()
                        .map(|f| f.iter().take(dim).copied().collect())
                        .collect(),
                )
            })
            .collect();
        Ok(TrajectoryDataset::new(trajectories, data.skip()))
    }
}

/// Returns precomputed labels keyed by simulation id.
///
/// The requested cluster count is ignored. The first `failures` calls report
/// a transient clustering failure.
#[derive(Debug, Default)]
pub struct PrecomputedClusterer {
    labels: HashMap<usize, Vec<i32>>,
    n_clusters: usize,
    failures: Cell<usize>,
    calls: Cell<usize>,
}

impl PrecomputedClusterer {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            ..Self::default()
        }
    }

    pub fn with_labels(mut self, sim_id: usize, labels: Vec<i32>) -> Self {
        self.labels.insert(sim_id, labels);
        self
    }

    pub fn failing(self, failures: usize) -> Self {
        self.failures.set(failures);
        self
    }

    /// Number of `cluster` calls so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Clusterer for PrecomputedClusterer {
    fn name(&self) -> &str {
        "precomputed"
    }

    fn cluster(&self, data: &TrajectoryDataset, n_clusters: usize) -> Result<ClusterAssignment> {
        self.calls.set(self.calls.get() + 1);
        let remaining = self.failures.get();
        if remaining > 0 {
            self.failures.set(remaining - 1);
            return Err(UcbError::transient_clustering(format!(
                "index out of range for {} clusters",
                n_clusters
            )));
        }
        let labels = data
            .trajectories()
            .iter()
            .map(|t| {
                self.labels.get(&t.sim.id).cloned().ok_or_else(|| {
                    UcbError::data(format!("no precomputed labels for simulation {}", t.sim.id))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ClusterAssignment {
            labels,
            n_clusters: self.n_clusters,
        })
    }
}

/// Serves a fixed Markov model and timescale spectrum.
#[derive(Debug, Clone)]
pub struct FixedModeller {
    model: MarkovModel,
    timescales: Vec<f64>,
}

impl FixedModeller {
    pub fn new(model: MarkovModel, timescales: Vec<f64>) -> Self {
        Self { model, timescales }
    }

    /// Single-macrostate model where every cluster is its own connected microstate.
    pub fn uniform(stationary_distribution: Vec<f64>) -> Self {
        let n = stationary_distribution.len();
        let model = MarkovModel {
            lag: 1,
            micronum: n,
            macronum: 1,
            micro_of_cluster: (0..n as i32).collect(),
            macro_of_cluster: vec![0; n],
            stationary_distribution,
        };
        Self::new(model, Vec::new())
    }
}

impl MarkovModeller for FixedModeller {
    fn implied_timescales(
        &self,
        _data: &TrajectoryDataset,
        _lag: usize,
        n_timescales: usize,
    ) -> Result<Vec<f64>> {
        Ok(self.timescales.iter().take(n_timescales).copied().collect())
    }

    fn estimate(
        &self,
        _data: &TrajectoryDataset,
        lag: usize,
        _n_macrostates: usize,
    ) -> Result<MarkovModel> {
        Ok(MarkovModel {
            lag,
            ..self.model.clone()
        })
    }
}
