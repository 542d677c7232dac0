//! UCB / PUCB state scoring and respawn slot allocation.
//!
//! ```text
//! UCB:   score[i] = Q[i] + c *            sqrt(ln(t) / (N[i] + 1))
//! PUCB:  score[i] = Q[i] + c * prior[i] * sqrt(ln(t) / (N[i] + 1))
//! ```
//!
//! with `t = epoch + 1`, so the bonus is zero at epoch 0 and grows slowly.

use crate::values::StateValues;
use rand::seq::index;
use rand::Rng;
use std::cmp::Ordering;
use ucbmd_core::{Result, UcbError, UNASSIGNED};

pub fn ucb_score(q: f64, exploration: f64, step: f64, n: u64) -> f64 {
    q + exploration * (step.ln() / (n as f64 + 1.0)).sqrt()
}

pub fn pucb_score(q: f64, exploration: f64, prior: f64, step: f64, n: u64) -> f64 {
    q + exploration * prior * (step.ln() / (n as f64 + 1.0)).sqrt()
}

/// Per-state maximum of the goal values over the frames assigned to it.
///
/// States start at `0`, so negative goal values never lower a state's prior.
/// Unassigned frames are ignored.
pub fn goal_state_maxima(labels: &[i32], goal: &[f64], num_states: usize) -> Result<Vec<f64>> {
    if labels.len() != goal.len() {
        return Err(UcbError::data(format!(
            "{} labelled frames but {} goal values",
            labels.len(),
            goal.len()
        )));
    }
    let mut maxima = vec![0.0f64; num_states];
    for (&label, &value) in labels.iter().zip(goal) {
        if label == UNASSIGNED {
            continue;
        }
        let slot = maxima
            .get_mut(label as usize)
            .ok_or_else(|| UcbError::data(format!("state {} outside [0, {})", label, num_states)))?;
        *slot = slot.max(value);
    }
    Ok(maxima)
}

/// Exploration rule applied to the Q/N table.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionPolicy {
    Ucb,
    /// Bonus weighted by a per-state goal prior
    Pucb { priors: Vec<f64> },
}

impl SelectionPolicy {
    /// Bonus-augmented score of every state at `epoch`.
    pub fn score(&self, values: &StateValues, exploration: f64, epoch: usize) -> Result<Vec<f64>> {
        let step = (epoch + 1) as f64;
        let scores: Vec<f64> = match self {
            SelectionPolicy::Ucb => values
                .q()
                .iter()
                .zip(values.n())
                .map(|(&q, &n)| ucb_score(q, exploration, step, n))
                .collect(),
            SelectionPolicy::Pucb { priors } => {
                if priors.len() != values.num_states() {
                    return Err(UcbError::data(format!(
                        "PUCB prior has {} states, table has {}",
                        priors.len(),
                        values.num_states()
                    )));
                }
                values
                    .q()
                    .iter()
                    .zip(values.n())
                    .zip(priors)
                    .map(|((&q, &n), &p)| pucb_score(q, exploration, p, step, n))
                    .collect()
            }
        };
        if let Some(bad) = scores.iter().position(|s| !s.is_finite()) {
            return Err(UcbError::numerical(format!(
                "state {} has non-finite score {}",
                bad, scores[bad]
            )));
        }
        Ok(scores)
    }
}

/// Allocates `n_launch` respawn slots over states from their scores.
///
/// The `action_pool` best states (the launch quota when `0`) form the pool;
/// up to `n_launch` of them are drawn without replacement, and any remaining
/// slots are handed out round-robin over the drawn states.
pub fn select_actions<R: Rng + ?Sized>(
    scores: &[f64],
    n_launch: usize,
    action_pool: usize,
    rng: &mut R,
) -> Result<Vec<usize>> {
    let num_states = scores.len();
    if num_states == 0 {
        return Err(UcbError::config("cannot select actions from zero states"));
    }
    let mut allocation = vec![0usize; num_states];
    if n_launch == 0 {
        return Ok(allocation);
    }

    let pool_size = if action_pool == 0 { n_launch } else { action_pool };
    let mut ranked: Vec<usize> = (0..num_states).collect();
    ranked.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));
    ranked.truncate(pool_size.min(num_states));

    let drawn: Vec<usize> = index::sample(rng, ranked.len(), n_launch.min(ranked.len()))
        .into_iter()
        .map(|i| ranked[i])
        .collect();

    let mut assigned = 0;
    'fill: loop {
        for &state in &drawn {
            allocation[state] += 1;
            assigned += 1;
            if assigned == n_launch {
                break 'fill;
            }
        }
    }
    Ok(allocation)
}

/// Random baseline: `n_launch` uniform draws over all states, with replacement.
pub fn random_actions<R: Rng + ?Sized>(
    num_states: usize,
    n_launch: usize,
    rng: &mut R,
) -> Result<Vec<usize>> {
    if num_states == 0 {
        return Err(UcbError::config("cannot select actions from zero states"));
    }
    let mut allocation = vec![0usize; num_states];
    for _ in 0..n_launch {
        allocation[rng.gen_range(0..num_states)] += 1;
    }
    Ok(allocation)
}
