//! Trajectory datasets and frame references.
//!
//! A [`TrajectoryDataset`] is an immutable snapshot: clustering or label
//! mapping produces a new dataset instead of mutating the one the caller holds.

use crate::errors::{Result, UcbError};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Cluster label of a frame outside every state (unassigned or disconnected).
pub const UNASSIGNED: i32 = -1;

/// A frame addressed relative to a dataset: trajectory index + projected frame index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameRef {
    pub traj: usize,
    pub frame: usize,
}

impl FrameRef {
    pub fn new(traj: usize, frame: usize) -> Self {
        Self { traj, frame }
    }
}

/// A frame addressed in the raw simulation output: simulation id + absolute frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimFrame {
    pub sim_id: usize,
    pub frame: usize,
}

impl SimFrame {
    pub fn new(sim_id: usize, frame: usize) -> Self {
        Self { sim_id, frame }
    }
}

/// Lineage record of one finished simulation.
///
/// `parent` is the conformation the simulation was restarted from, `None`
/// for the initial seeds of the campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimRecord {
    pub id: usize,
    #[serde(default)]
    pub parent: Option<SimFrame>,
}

impl SimRecord {
    pub fn new(id: usize) -> Self {
        Self { id, parent: None }
    }

    pub fn spawned_from(id: usize, parent: SimFrame) -> Self {
        Self {
            id,
            parent: Some(parent),
        }
    }
}

/// One projected trajectory: a feature vector per frame plus optional cluster labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub sim: SimRecord,
    pub features: Vec<Vec<f64>>,
    #[serde(default)]
    pub labels: Option<Vec<i32>>,
}

impl Trajectory {
    pub fn new(sim: SimRecord, features: Vec<Vec<f64>>) -> Self {
        Self {
            sim,
            features,
            labels: None,
        }
    }

    /// Trajectory that only carries labels (one empty feature vector per frame).
    pub fn from_labels(sim: SimRecord, labels: Vec<i32>) -> Self {
        Self {
            sim,
            features: vec![Vec::new(); labels.len()],
            labels: Some(labels),
        }
    }

    /// Trajectory of one scalar per frame, the shape goal projections produce.
    pub fn from_scalars(sim: SimRecord, values: &[f64]) -> Self {
        Self::new(sim, values.iter().map(|&v| vec![v]).collect())
    }

    pub fn num_frames(&self) -> usize {
        self.features.len()
    }
}

/// Ordered collection of projected trajectories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryDataset {
    trajectories: Vec<Trajectory>,
    /// Number of discrete states (`K`), set once the dataset is clustered
    n_states: Option<usize>,
    /// Frame stride used at projection time
    skip: usize,
}

impl TrajectoryDataset {
    /// Creates an unclustered dataset. Labels already present on trajectories are discarded.
    pub fn new(mut trajectories: Vec<Trajectory>, skip: usize) -> Self {
        for traj in &mut trajectories {
            traj.labels = None;
        }
        Self {
            trajectories,
            n_states: None,
            skip: skip.max(1),
        }
    }

    /// Creates a clustered dataset, validating label lengths and ranges.
    pub fn clustered(trajectories: Vec<Trajectory>, n_states: usize, skip: usize) -> Result<Self> {
        let labels = trajectories
            .iter()
            .map(|t| {
                t.labels.clone().ok_or_else(|| {
                    UcbError::data(format!("trajectory of simulation {} has no labels", t.sim.id))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(trajectories, skip).with_clusters(labels, n_states)
    }

    pub fn trajectories(&self) -> &[Trajectory] {
        &self.trajectories
    }

    pub fn num_trajectories(&self) -> usize {
        self.trajectories.len()
    }

    pub fn traj_lengths(&self) -> Vec<usize> {
        self.trajectories.iter().map(Trajectory::num_frames).collect()
    }

    pub fn num_frames(&self) -> usize {
        self.trajectories.iter().map(Trajectory::num_frames).sum()
    }

    pub fn skip(&self) -> usize {
        self.skip
    }

    /// Number of discrete states `K`, `None` while unclustered.
    pub fn n_states(&self) -> Option<usize> {
        self.n_states
    }

    pub fn is_clustered(&self) -> bool {
        self.n_states.is_some()
    }

    pub fn sims(&self) -> Vec<SimRecord> {
        self.trajectories.iter().map(|t| t.sim.clone()).collect()
    }

    /// Per-trajectory cluster labels (`St`).
    pub fn labels(&self) -> Result<Vec<&[i32]>> {
        self.trajectories
            .iter()
            .map(|t| {
                t.labels
                    .as_deref()
                    .ok_or_else(|| UcbError::data("dataset has not been clustered"))
            })
            .collect()
    }

    /// Labels of all frames in trajectory order.
    pub fn concat_labels(&self) -> Result<Vec<i32>> {
        Ok(self.labels()?.concat())
    }

    /// Returns a copy of this dataset carrying the given labels.
    pub fn with_clusters(&self, labels: Vec<Vec<i32>>, n_states: usize) -> Result<Self> {
        if labels.len() != self.trajectories.len() {
            return Err(UcbError::data(format!(
                "got labels for {} trajectories, dataset has {}",
                labels.len(),
                self.trajectories.len()
            )));
        }
        let mut trajectories = self.trajectories.clone();
        for (traj, st) in trajectories.iter_mut().zip(labels) {
            if st.len() != traj.num_frames() {
                return Err(UcbError::data(format!(
                    "simulation {}: {} labels for {} frames",
                    traj.sim.id,
                    st.len(),
                    traj.num_frames()
                )));
            }
            if let Some(bad) = st
                .iter()
                .find(|&&l| l != UNASSIGNED && (l < 0 || l as usize >= n_states))
            {
                return Err(UcbError::data(format!(
                    "simulation {}: label {} outside [0, {})",
                    traj.sim.id, bad, n_states
                )));
            }
            traj.labels = Some(st);
        }
        Ok(Self {
            trajectories,
            n_states: Some(n_states),
            skip: self.skip,
        })
    }

    /// Relabels every frame through `mapping[label]`, e.g. micro-clusters to macrostates.
    pub fn map_clusters(&self, mapping: &[i32], n_states: usize) -> Result<Self> {
        let mapped = self
            .labels()?
            .into_iter()
            .map(|st| {
                st.iter()
                    .map(|&l| {
                        if l == UNASSIGNED {
                            Ok(UNASSIGNED)
                        } else {
                            mapping.get(l as usize).copied().ok_or_else(|| {
                                UcbError::data(format!("no mapping for cluster {}", l))
                            })
                        }
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        self.with_clusters(mapped, n_states)
    }

    /// Drops trajectories without frames.
    pub fn drop_empty(self) -> Self {
        let before = self.trajectories.len();
        let trajectories: Vec<_> = self
            .trajectories
            .into_iter()
            .filter(|t| t.num_frames() > 0)
            .collect();
        if trajectories.len() != before {
            log::debug!("Dropped {} empty trajectories", before - trajectories.len());
        }
        Self {
            trajectories,
            n_states: self.n_states,
            skip: self.skip,
        }
    }

    /// Splits a per-frame array into per-trajectory arrays.
    pub fn deconcatenate<T: Clone>(&self, flat: &[T]) -> Result<Vec<Vec<T>>> {
        if flat.len() != self.num_frames() {
            return Err(UcbError::data(format!(
                "cannot deconcatenate {} values over {} frames",
                flat.len(),
                self.num_frames()
            )));
        }
        let mut out = Vec::with_capacity(self.trajectories.len());
        let mut start = 0;
        for len in self.traj_lengths() {
            out.push(flat[start..start + len].to_vec());
            start += len;
        }
        Ok(out)
    }

    /// Concatenated per-frame scalars of a one-dimensional projection.
    pub fn scalar_values(&self) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(self.num_frames());
        for traj in &self.trajectories {
            for (i, f) in traj.features.iter().enumerate() {
                match f.as_slice() {
                    [v] => out.push(*v),
                    _ => {
                        return Err(UcbError::data(format!(
                            "simulation {} frame {}: expected one value, got {}",
                            traj.sim.id,
                            i,
                            f.len()
                        )))
                    }
                }
            }
        }
        Ok(out)
    }

    /// Translates dataset-relative frames to absolute simulation frames.
    pub fn rel2sim(&self, frames: &[FrameRef]) -> Result<Vec<SimFrame>> {
        frames
            .iter()
            .map(|r| {
                let traj = self.trajectories.get(r.traj).ok_or_else(|| {
                    UcbError::data(format!("trajectory index {} out of range", r.traj))
                })?;
                if r.frame >= traj.num_frames() {
                    return Err(UcbError::data(format!(
                        "frame {} out of range for simulation {}",
                        r.frame, traj.sim.id
                    )));
                }
                Ok(SimFrame::new(traj.sim.id, r.frame * self.skip))
            })
            .collect()
    }

    /// Index of the trajectory produced by simulation `sim_id`.
    pub fn find_sim(&self, sim_id: usize) -> Option<usize> {
        self.trajectories.iter().position(|t| t.sim.id == sim_id)
    }

    /// Resolves the conformation a trajectory was spawned from to a dataset frame.
    ///
    /// `None` when the trajectory has no parent, the parent simulation is not
    /// part of this dataset, or the frame fell outside the projected range.
    pub fn resolve_parent(&self, traj: usize) -> Option<FrameRef> {
        let parent = self.trajectories.get(traj)?.sim.parent?;
        let idx = self.find_sim(parent.sim_id)?;
        let frame = parent.frame / self.skip;
        (frame < self.trajectories[idx].num_frames()).then(|| FrameRef::new(idx, frame))
    }

    /// Cluster label of one frame.
    pub fn label_of(&self, frame: FrameRef) -> Option<i32> {
        self.trajectories
            .get(frame.traj)?
            .labels
            .as_ref()?
            .get(frame.frame)
            .copied()
    }

    /// All frames assigned to `state`.
    pub fn frames_in_state(&self, state: usize) -> Result<Vec<FrameRef>> {
        let mut out = Vec::new();
        for (t, st) in self.labels()?.into_iter().enumerate() {
            for (f, &l) in st.iter().enumerate() {
                if l >= 0 && l as usize == state {
                    out.push(FrameRef::new(t, f));
                }
            }
        }
        Ok(out)
    }

    /// Draws exactly `counts[i]` frames of state `states[i]`, uniformly and with replacement.
    ///
    /// Returns one list per requested state. A state with a non-zero request
    /// but no frames is a data consistency error.
    pub fn sample_clusters<R: Rng + ?Sized>(
        &self,
        states: &[usize],
        counts: &[usize],
        rng: &mut R,
    ) -> Result<Vec<Vec<FrameRef>>> {
        if states.len() != counts.len() {
            return Err(UcbError::data(format!(
                "{} states but {} counts",
                states.len(),
                counts.len()
            )));
        }
        let mut picks = Vec::with_capacity(states.len());
        for (&state, &count) in states.iter().zip(counts) {
            if count == 0 {
                picks.push(Vec::new());
                continue;
            }
            let pool = self.frames_in_state(state)?;
            if pool.is_empty() {
                return Err(UcbError::data(format!(
                    "state {} has no frames to spawn from",
                    state
                )));
            }
            picks.push(
                (0..count)
                    .map(|_| pool[rng.gen_range(0..pool.len())])
                    .collect(),
            );
        }
        Ok(picks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn dataset() -> TrajectoryDataset {
        let trajs = vec![
            Trajectory::from_labels(SimRecord::new(10), vec![0, 0, 1]),
            Trajectory::from_labels(
                SimRecord::spawned_from(11, SimFrame::new(10, 4)),
                vec![1, -1],
            ),
        ];
        TrajectoryDataset::clustered(trajs, 2, 2).unwrap()
    }

    #[test]
    fn test_shape_accessors() {
        let data = dataset();
        assert_eq!(data.num_trajectories(), 2);
        assert_eq!(data.num_frames(), 5);
        assert_eq!(data.traj_lengths(), vec![3, 2]);
        assert_eq!(data.n_states(), Some(2));
        assert_eq!(data.concat_labels().unwrap(), vec![0, 0, 1, 1, -1]);
    }

    #[test]
    fn test_label_range_is_checked() {
        let trajs = vec![Trajectory::from_labels(SimRecord::new(0), vec![0, 2])];
        let err = TrajectoryDataset::clustered(trajs, 2, 1).unwrap_err();
        assert!(matches!(err, UcbError::DataConsistencyError(_)));
    }

    #[test]
    fn test_deconcatenate() {
        let data = dataset();
        let parts = data.deconcatenate(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(parts, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0]]);
        assert!(data.deconcatenate(&[1.0]).is_err());
    }

    #[test]
    fn test_rel2sim_scales_by_skip() {
        let data = dataset();
        let sims = data.rel2sim(&[FrameRef::new(0, 2), FrameRef::new(1, 0)]).unwrap();
        assert_eq!(sims, vec![SimFrame::new(10, 4), SimFrame::new(11, 0)]);
        assert!(data.rel2sim(&[FrameRef::new(1, 5)]).is_err());
    }

    #[test]
    fn test_resolve_parent() {
        let data = dataset();
        assert_eq!(data.resolve_parent(1), Some(FrameRef::new(0, 2)));
        assert_eq!(data.resolve_parent(0), None);
    }

    #[test]
    fn test_map_clusters() {
        let data = dataset();
        let mapped = data.map_clusters(&[0, 0], 1).unwrap();
        assert_eq!(mapped.concat_labels().unwrap(), vec![0, 0, 0, 0, -1]);
        assert_eq!(mapped.n_states(), Some(1));
    }

    #[test]
    fn test_sample_clusters_exact_counts() {
        let data = dataset();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let picks = data.sample_clusters(&[0, 1], &[3, 0], &mut rng).unwrap();
        assert_eq!(picks[0].len(), 3);
        assert!(picks[1].is_empty());
        for frame in &picks[0] {
            assert_eq!(data.label_of(*frame), Some(0));
        }
    }

    #[test]
    fn test_sample_clusters_empty_state() {
        let trajs = vec![Trajectory::from_labels(SimRecord::new(0), vec![0, 0])];
        let data = TrajectoryDataset::clustered(trajs, 2, 1).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(data.sample_clusters(&[1], &[1], &mut rng).is_err());
    }

    #[test]
    fn test_drop_empty() {
        let trajs = vec![
            Trajectory::new(SimRecord::new(0), vec![vec![1.0]]),
            Trajectory::new(SimRecord::new(1), vec![]),
        ];
        let data = TrajectoryDataset::new(trajs, 1).drop_empty();
        assert_eq!(data.num_trajectories(), 1);
    }
}
