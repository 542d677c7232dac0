//! Scoring and respawn selection on an already-modelled epoch.
//!
//! The decision pass starts where the kinetic model ends: it takes the
//! clustered action-space dataset, the per-frame stationary distribution and
//! optional goal values, and produces the slot allocation and restart frames.

use crate::artifacts::{self, ArtifactStore};
use crate::config::AdaptiveConfig;
use crate::heuristics::ClusterCountStrategy;
use crate::policy::{self, SelectionPolicy};
use crate::reward::RewardEngine;
use crate::spawn;
use crate::values::StateValues;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use ucbmd_core::{FrameRef, Result, SimFrame, TrajectoryDataset, UcbError};

/// Inputs of one decision pass.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInput<'a> {
    pub epoch: usize,
    /// Slots to fill: `nmax - running`
    pub n_launch: usize,
    /// Clustered action-space dataset
    pub data_q: &'a TrajectoryDataset,
    /// Per-frame stationary probability, shaped like `data_q`
    pub statdist: &'a [Vec<f64>],
    /// Concatenated per-frame goal values, already preprocessed
    pub goal: Option<&'a [f64]>,
}

/// Scored action space, before any slot is allocated.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredStates {
    pub num_states: usize,
    /// Q/N table, absent in random mode
    pub values: Option<StateValues>,
    /// Scores, absent in random mode
    pub scores: Option<Vec<f64>>,
}

/// Outcome of one decision pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Respawn slots per state
    pub allocation: Vec<usize>,
    /// Restart frames, relative to `data_q`
    pub frames: Vec<FrameRef>,
    /// Q/N table, absent in random mode
    pub values: Option<StateValues>,
    /// Scores, absent in random mode
    pub scores: Option<Vec<f64>>,
}

impl Decision {
    /// Resolves the restart frames to absolute simulation frames.
    pub fn into_plan(self, epoch: usize, data_q: &TrajectoryDataset) -> Result<SpawnPlan> {
        let frames = data_q.rel2sim(&self.frames)?;
        let (q_values, n_values) = match self.values {
            Some(values) => (Some(values.q().to_vec()), Some(values.n().to_vec())),
            None => (None, None),
        };
        Ok(SpawnPlan {
            epoch,
            created_at: Utc::now(),
            allocation: self.allocation,
            frames,
            q_values,
            n_values,
            scores: self.scores,
        })
    }
}

/// Simulations to launch at the end of an epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnPlan {
    pub epoch: usize,
    pub created_at: DateTime<Utc>,
    /// Respawn slots per state
    pub allocation: Vec<usize>,
    /// One restart conformation per new simulation
    pub frames: Vec<SimFrame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q_values: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_values: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<Vec<f64>>,
}

impl SpawnPlan {
    pub fn num_simulations(&self) -> usize {
        self.frames.len()
    }
}

/// Runs rewards → Q/N → scores → selection → spawn frames.
pub struct DecisionPass<'a> {
    config: &'a AdaptiveConfig,
    cluster_count: &'a dyn ClusterCountStrategy,
    artifacts: Option<&'a ArtifactStore>,
}

impl<'a> DecisionPass<'a> {
    pub fn new(config: &'a AdaptiveConfig, cluster_count: &'a dyn ClusterCountStrategy) -> Self {
        Self {
            config,
            cluster_count,
            artifacts: None,
        }
    }

    /// Persist Q, N, scores and actions through `store` when `save_qval` is set.
    pub fn with_artifacts(mut self, store: &'a ArtifactStore) -> Self {
        self.artifacts = Some(store);
        self
    }

    fn save<T: serde::Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        if self.config.save_qval {
            if let Some(store) = self.artifacts {
                store.save(name, value)?;
            }
        }
        Ok(())
    }

    pub fn run<R: Rng + ?Sized>(&self, input: DecisionInput<'_>, rng: &mut R) -> Result<Decision> {
        let scored = self.score(input)?;
        self.select(scored, input, rng)
    }

    /// Rewards, Q/N and scores. Random mode skips all three.
    pub fn score(&self, input: DecisionInput<'_>) -> Result<ScoredStates> {
        let num_states = input
            .data_q
            .n_states()
            .ok_or_else(|| UcbError::data("action space has not been clustered"))?;
        log::info!("Numstates: {}", num_states);
        if num_states == 0 {
            return Err(UcbError::config("action space has zero states"));
        }

        if self.config.random {
            return Ok(ScoredStates {
                num_states,
                values: None,
                scores: None,
            });
        }

        let mut values = StateValues::new(num_states);
        let mut selection = SelectionPolicy::Ucb;
        if let Some(goal) = input.goal {
            let labels = input.data_q.concat_labels()?;
            let maxima = policy::goal_state_maxima(&labels, goal, num_states)?;
            if self.config.pucb {
                selection = SelectionPolicy::Pucb { priors: maxima };
            } else {
                values.seed_goal_prior(&maxima, self.config.temperature, self.goal_pseudo_count())?;
            }
        }

        let rewards = RewardEngine::from_config(self.config).collect(
            input.data_q,
            input.statdist,
            num_states,
        )?;
        values.absorb(&rewards)?;
        self.save(artifacts::Q_VALUES, values.q())?;
        self.save(artifacts::N_VALUES, values.n())?;

        let scores = selection.score(&values, self.config.exploration, input.epoch)?;
        self.save(artifacts::UCB_VALUES, &scores)?;

        Ok(ScoredStates {
            num_states,
            values: Some(values),
            scores: Some(scores),
        })
    }

    /// Slot allocation and restart frames for scored states.
    pub fn select<R: Rng + ?Sized>(
        &self,
        scored: ScoredStates,
        input: DecisionInput<'_>,
        rng: &mut R,
    ) -> Result<Decision> {
        let allocation = match &scored.scores {
            Some(scores) => {
                policy::select_actions(scores, input.n_launch, self.config.action_pool, rng)?
            }
            None => policy::random_actions(scored.num_states, input.n_launch, rng)?,
        };
        self.save(artifacts::ACTIONS, &allocation)?;

        let frames = spawn::spawn_frames(&allocation, input.data_q, rng)?;
        Ok(Decision {
            allocation,
            frames,
            values: scored.values,
            scores: scored.scores,
        })
    }

    /// `floor((nframes / K(nframes)) * goal_init)`, zero without a frame budget.
    fn goal_pseudo_count(&self) -> u64 {
        let nframes = self.config.nframes;
        let k = self.cluster_count.num_clusters(nframes);
        if nframes == 0 || k == 0 {
            log::warn!("Goal pseudo-count needs a frame budget (nframes); skipping it");
            return 0;
        }
        ((nframes as f64 / k as f64) * self.config.goal_init) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::LogFramesHeuristic;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use ucbmd_core::{SimRecord, Trajectory};

    fn data_q() -> TrajectoryDataset {
        let trajs = vec![
            Trajectory::from_labels(SimRecord::new(0), vec![0, 1]),
            Trajectory::from_labels(SimRecord::new(1), vec![1, 1]),
        ];
        TrajectoryDataset::clustered(trajs, 2, 1).unwrap()
    }

    #[test]
    fn test_goal_pseudo_count() {
        let config = AdaptiveConfig::builder().nframes(10_000).goal_init(0.3).build();
        let pass = DecisionPass::new(&config, &LogFramesHeuristic);
        // 10000 / 650 * 0.3 = 4.6
        assert_eq!(pass.goal_pseudo_count(), 4);

        let config = AdaptiveConfig::default();
        let pass = DecisionPass::new(&config, &LogFramesHeuristic);
        assert_eq!(pass.goal_pseudo_count(), 0);
    }

    #[test]
    fn test_random_mode_skips_scoring() {
        let config = AdaptiveConfig::builder().random(true).build();
        let pass = DecisionPass::new(&config, &LogFramesHeuristic);
        let data = data_q();
        let statdist = vec![vec![0.5, 0.5], vec![0.5, 0.5]];
        let input = DecisionInput {
            epoch: 0,
            n_launch: 3,
            data_q: &data,
            statdist: &statdist,
            goal: None,
        };
        let decision = pass.run(input, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
        assert_eq!(decision.allocation.iter().sum::<usize>(), 3);
        assert_eq!(decision.frames.len(), 3);
        assert!(decision.values.is_none());
        assert!(decision.scores.is_none());
    }

    #[test]
    fn test_score_then_select_matches_run() {
        let config = AdaptiveConfig::builder().exploration(0.5).build();
        let pass = DecisionPass::new(&config, &LogFramesHeuristic);
        let data = data_q();
        let statdist = vec![vec![0.3, 0.7], vec![0.7, 0.7]];
        let input = DecisionInput {
            epoch: 1,
            n_launch: 2,
            data_q: &data,
            statdist: &statdist,
            goal: None,
        };

        let scored = pass.score(input).unwrap();
        assert_eq!(scored.num_states, 2);
        assert!(scored.scores.is_some());
        let split = pass
            .select(scored, input, &mut ChaCha8Rng::seed_from_u64(9))
            .unwrap();
        let whole = pass.run(input, &mut ChaCha8Rng::seed_from_u64(9)).unwrap();
        assert_eq!(split, whole);
    }

    #[test]
    fn test_pucb_uses_goal_prior() {
        let config = AdaptiveConfig::builder()
            .pucb(true)
            .reward(
                crate::config::RewardMode::Frames,
                crate::config::RewardMethod::Max,
                None,
            )
            .exploration(1.0)
            .build();
        let pass = DecisionPass::new(&config, &LogFramesHeuristic);
        let data = data_q();
        let statdist = vec![vec![0.0, 0.0], vec![0.0, 0.0]];
        let goal = [0.2, 0.1, 0.0, 0.6];
        let input = DecisionInput {
            epoch: 2,
            n_launch: 1,
            data_q: &data,
            statdist: &statdist,
            goal: Some(&goal),
        };
        let decision = pass.run(input, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
        let scores = decision.scores.unwrap();
        let bonus = (3.0f64).ln().sqrt();
        assert!((scores[0] - 0.2 * bonus).abs() < 1e-12);
        assert!((scores[1] - 0.6 * bonus).abs() < 1e-12);
        assert_eq!(decision.allocation, vec![0, 1]);
    }
}
