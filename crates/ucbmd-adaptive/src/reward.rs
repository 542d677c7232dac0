//! Free-energy rewards from the stationary distribution.
//!
//! Each connected frame earns `-kB * T * ln(1 - p)` where `p` is the
//! equilibrium probability of its microstate. Rewards along a trajectory are
//! then aggregated over a trailing window and credited to states according
//! to the configured [`RewardMode`].

use crate::config::{AdaptiveConfig, RewardMethod, RewardMode};
use ucbmd_core::{Result, TrajectoryDataset, UcbError, UNASSIGNED};

/// Boltzmann constant in kcal/(mol K).
pub const BOLTZMANN_KCAL: f64 = 0.0019872041;

/// Free-energy-like reward of a frame whose state has stationary probability `p`.
pub fn free_energy_reward(p: f64, temperature: f64) -> f64 {
    -BOLTZMANN_KCAL * temperature * (1.0 - p).ln()
}

/// Trailing-window aggregation of a per-frame reward sequence.
///
/// Entry `i` aggregates `energies[i..i + w]` (truncated at the end), which is a
/// rolling statistic over the reversed sequence with a minimum fill of one.
/// `window = None` spans the whole sequence.
pub fn windowed_reward(energies: &[f64], window: Option<usize>, method: RewardMethod) -> Vec<f64> {
    let n = energies.len();
    let w = window.unwrap_or(n).max(1);
    (0..n)
        .map(|i| {
            let span = &energies[i..(i + w).min(n)];
            match method {
                RewardMethod::Mean => span.iter().sum::<f64>() / span.len() as f64,
                RewardMethod::Max => span.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            }
        })
        .collect()
}

/// Collects reward observations per state for one epoch.
#[derive(Debug, Clone, Copy)]
pub struct RewardEngine {
    pub temperature: f64,
    pub method: RewardMethod,
    pub mode: RewardMode,
    pub window: Option<usize>,
}

impl RewardEngine {
    pub fn from_config(config: &AdaptiveConfig) -> Self {
        Self {
            temperature: config.temperature,
            method: config.reward_method,
            mode: config.reward_mode,
            window: config.reward_window,
        }
    }

    /// Reward lists per state for every trajectory of `data_q`.
    ///
    /// `statdist` has the per-trajectory shape of `data_q`. Frames that are
    /// unassigned or have zero stationary probability are disconnected and
    /// earn nothing; trajectories without connected frames are skipped.
    pub fn collect(
        &self,
        data_q: &TrajectoryDataset,
        statdist: &[Vec<f64>],
        num_states: usize,
    ) -> Result<Vec<Vec<f64>>> {
        let labels = data_q.labels()?;
        if statdist.len() != labels.len() {
            return Err(UcbError::data(format!(
                "stationary distribution covers {} trajectories, action space has {}",
                statdist.len(),
                labels.len()
            )));
        }

        let mut rewards = vec![Vec::new(); num_states];
        for (traj, (states, statprob)) in labels.iter().zip(statdist).enumerate() {
            if states.len() != statprob.len() {
                return Err(UcbError::data(format!(
                    "trajectory {}: {} labels but {} stationary probabilities",
                    traj,
                    states.len(),
                    statprob.len()
                )));
            }

            let (connected, energies): (Vec<i32>, Vec<f64>) = states
                .iter()
                .zip(statprob)
                .filter(|(s, p)| **s != UNASSIGNED && **p != 0.0)
                .map(|(&s, &p)| (s, free_energy_reward(p, self.temperature)))
                .unzip();
            if connected.is_empty() {
                continue;
            }
            if let Some(bad) = energies.iter().find(|e| !e.is_finite()) {
                return Err(UcbError::numerical(format!(
                    "trajectory {}: non-finite reward {}",
                    traj, bad
                )));
            }

            let windowed = windowed_reward(&energies, self.window, self.method);

            match self.mode {
                RewardMode::Parent => {
                    let Some(parent) = data_q.resolve_parent(traj) else {
                        log::debug!("Trajectory {} has no resolvable parent frame", traj);
                        continue;
                    };
                    match data_q.label_of(parent) {
                        Some(action) if action != UNASSIGNED => {
                            state_bucket(&mut rewards, action)?.push(windowed[0]);
                        }
                        _ => {
                            log::info!("Parent frame doesn't belong to any state");
                        }
                    }
                }
                RewardMode::Frames => {
                    for (&st, &re) in connected.iter().zip(&windowed) {
                        state_bucket(&mut rewards, st)?.push(re);
                    }
                }
            }
        }
        Ok(rewards)
    }
}

fn state_bucket(rewards: &mut [Vec<f64>], state: i32) -> Result<&mut Vec<f64>> {
    let n = rewards.len();
    rewards
        .get_mut(state as usize)
        .ok_or_else(|| UcbError::data(format!("state {} outside [0, {})", state, n)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ucbmd_core::{SimFrame, SimRecord, Trajectory};

    const T: f64 = 300.0;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_windowed_mean_and_max() {
        let e = [1.0, 3.0, 2.0, 5.0];
        assert_eq!(
            windowed_reward(&e, Some(2), RewardMethod::Max),
            vec![3.0, 3.0, 5.0, 5.0]
        );
        assert_eq!(
            windowed_reward(&e, Some(2), RewardMethod::Mean),
            vec![2.0, 2.5, 3.5, 5.0]
        );
        assert_eq!(
            windowed_reward(&e, None, RewardMethod::Max),
            vec![5.0, 5.0, 5.0, 5.0]
        );
        assert_eq!(
            windowed_reward(&e, None, RewardMethod::Mean),
            vec![2.75, 10.0 / 3.0, 3.5, 5.0]
        );
    }

    #[test]
    fn test_disconnected_frames_are_excluded() {
        let trajs = vec![Trajectory::from_labels(SimRecord::new(0), vec![0, 1, 1])];
        let data = TrajectoryDataset::clustered(trajs, 2, 1).unwrap();
        let engine = RewardEngine {
            temperature: T,
            method: RewardMethod::Mean,
            mode: RewardMode::Frames,
            window: None,
        };
        let rewards = engine
            .collect(&data, &[vec![0.2, 0.0, 0.4]], 2)
            .unwrap();

        let e0 = free_energy_reward(0.2, T);
        let e2 = free_energy_reward(0.4, T);
        assert_eq!(rewards[0].len(), 1);
        assert_eq!(rewards[1].len(), 1);
        assert!(approx(rewards[0][0], (e0 + e2) / 2.0));
        assert!(approx(rewards[1][0], e2));
        assert!(approx(e2, -BOLTZMANN_KCAL * T * (0.6f64).ln()));
    }

    #[test]
    fn test_parent_mode_credits_parent_state() {
        let trajs = vec![
            Trajectory::from_labels(SimRecord::new(0), vec![0, 1]),
            Trajectory::from_labels(SimRecord::spawned_from(1, SimFrame::new(0, 1)), vec![0, 0]),
        ];
        let data = TrajectoryDataset::clustered(trajs, 2, 1).unwrap();
        let engine = RewardEngine {
            temperature: T,
            method: RewardMethod::Max,
            mode: RewardMode::Parent,
            window: None,
        };
        let rewards = engine
            .collect(&data, &[vec![0.3, 0.7], vec![0.3, 0.3]], 2)
            .unwrap();
        // First trajectory is a seed without a parent.
        assert!(rewards[0].is_empty());
        assert_eq!(rewards[1].len(), 1);
        assert!(approx(rewards[1][0], free_energy_reward(0.3, T)));
    }

    #[test]
    fn test_parent_in_unassigned_frame_is_skipped() {
        let trajs = vec![
            Trajectory::from_labels(SimRecord::new(0), vec![-1, 1]),
            Trajectory::from_labels(SimRecord::spawned_from(1, SimFrame::new(0, 0)), vec![0]),
        ];
        let data = TrajectoryDataset::clustered(trajs, 2, 1).unwrap();
        let engine = RewardEngine {
            temperature: T,
            method: RewardMethod::Max,
            mode: RewardMode::Parent,
            window: None,
        };
        let rewards = engine.collect(&data, &[vec![0.0, 0.5], vec![0.5]], 2).unwrap();
        assert!(rewards.iter().all(Vec::is_empty));
    }

    #[test]
    fn test_shape_mismatch_is_error() {
        let trajs = vec![Trajectory::from_labels(SimRecord::new(0), vec![0, 1])];
        let data = TrajectoryDataset::clustered(trajs, 2, 1).unwrap();
        let engine = RewardEngine {
            temperature: T,
            method: RewardMethod::Max,
            mode: RewardMode::Frames,
            window: None,
        };
        assert!(engine.collect(&data, &[vec![0.5]], 2).is_err());
    }
}
