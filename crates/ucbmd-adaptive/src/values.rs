//! Per-state running mean rewards (`Q`) and visit counts (`N`).
//!
//! Both arrays are recomputed from scratch every epoch; nothing carries over
//! between epochs except what the goal prior seeds.

use crate::reward::free_energy_reward;
use serde::{Deserialize, Serialize};
use ucbmd_core::{Result, UcbError};

/// Combines a prior mean over `old_count` samples with a new batch.
///
/// Returns `old_mean` unchanged when `samples` is empty.
pub fn updating_mean(old_mean: f64, old_count: u64, samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return old_mean;
    }
    let total = old_count as f64 + samples.len() as f64;
    (old_mean * old_count as f64 + samples.iter().sum::<f64>()) / total
}

/// Q/N table over the states of the current action space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateValues {
    q: Vec<f64>,
    n: Vec<u64>,
}

impl StateValues {
    pub fn new(num_states: usize) -> Self {
        Self {
            q: vec![0.0; num_states],
            n: vec![0; num_states],
        }
    }

    pub fn num_states(&self) -> usize {
        self.q.len()
    }

    pub fn q(&self) -> &[f64] {
        &self.q
    }

    pub fn n(&self) -> &[u64] {
        &self.n
    }

    /// Seeds `Q` with goal free energies and adds a uniform pseudo-count to `N`.
    ///
    /// `goal_max[i]` is the largest goal value seen in state `i` and must lie
    /// in `[0, 1)`.
    pub fn seed_goal_prior(
        &mut self,
        goal_max: &[f64],
        temperature: f64,
        pseudo_count: u64,
    ) -> Result<()> {
        if goal_max.len() != self.q.len() {
            return Err(UcbError::data(format!(
                "goal prior has {} states, table has {}",
                goal_max.len(),
                self.q.len()
            )));
        }
        if let Some(g) = goal_max.iter().find(|g| !(0.0..1.0).contains(*g)) {
            return Err(UcbError::data(format!(
                "goal value {} outside [0, 1), cannot derive a goal energy",
                g
            )));
        }
        for (q, &g) in self.q.iter_mut().zip(goal_max) {
            *q = free_energy_reward(g, temperature);
        }
        for n in &mut self.n {
            *n += pseudo_count;
        }
        Ok(())
    }

    /// Folds this epoch's reward lists into the table.
    pub fn absorb(&mut self, rewards: &[Vec<f64>]) -> Result<()> {
        if rewards.len() != self.q.len() {
            return Err(UcbError::data(format!(
                "reward lists for {} states, table has {}",
                rewards.len(),
                self.q.len()
            )));
        }
        for (i, samples) in rewards.iter().enumerate() {
            self.q[i] = updating_mean(self.q[i], self.n[i], samples);
            self.n[i] += samples.len() as u64;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_updating_mean_empty_is_identity() {
        assert_eq!(updating_mean(1.5, 4, &[]), 1.5);
    }

    #[test]
    fn test_updating_mean_chunking() {
        let r = [0.3, 1.2, 0.0, 4.5, 2.25, 0.75];
        let once = updating_mean(0.0, 0, &r);
        let first = updating_mean(0.0, 0, &r[..2]);
        let twice = updating_mean(first, 2, &r[2..]);
        assert!((once - twice).abs() < 1e-12);
        assert!((once - r.iter().sum::<f64>() / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_absorb_counts() {
        let mut values = StateValues::new(3);
        values
            .absorb(&[vec![1.0, 3.0], vec![], vec![0.5]])
            .unwrap();
        assert_eq!(values.q(), &[2.0, 0.0, 0.5]);
        assert_eq!(values.n(), &[2, 0, 1]);
    }

    #[test]
    fn test_goal_seed_damps_updates() {
        let mut values = StateValues::new(2);
        values.seed_goal_prior(&[0.0, 0.5], 300.0, 4).unwrap();
        assert_eq!(values.n(), &[4, 4]);
        assert_eq!(values.q()[0], 0.0);
        let prior = values.q()[1];
        assert!(prior > 0.0);

        values.absorb(&[vec![], vec![0.0]]).unwrap();
        assert!((values.q()[1] - prior * 4.0 / 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_goal_seed_rejects_out_of_range() {
        let mut values = StateValues::new(1);
        assert!(values.seed_goal_prior(&[1.0], 300.0, 1).is_err());
        assert!(values.seed_goal_prior(&[0.2, 0.3], 300.0, 1).is_err());
    }
}
