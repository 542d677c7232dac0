//! Cluster-count, macrostate-count and TICA-lag heuristics.

/// Strategy for choosing how many clusters to request from a frame count.
pub trait ClusterCountStrategy {
    fn num_clusters(&self, num_frames: usize) -> usize;
}

impl<F> ClusterCountStrategy for F
where
    F: Fn(usize) -> usize,
{
    fn num_clusters(&self, num_frames: usize) -> usize {
        self(num_frames)
    }
}

/// `K = max(round(0.6 * log10(frames / 1000) * 1000 + 50), 100)`, capped at `frames / 3`.
///
/// Empirical; the cap keeps low-data epochs from over-fragmenting.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFramesHeuristic;

impl ClusterCountStrategy for LogFramesHeuristic {
    fn num_clusters(&self, num_frames: usize) -> usize {
        let frames = num_frames as f64;
        let k = ((0.6 * (frames / 1000.0).log10() * 1000.0 + 50.0).round()).max(100.0);
        if k > frames / 3.0 {
            (frames / 3.0) as usize
        } else {
            k as usize
        }
    }
}

/// Number of timescales to request when sizing the macrostate model.
///
/// Falls back to half the microstates (rounded up) when the model has fewer
/// microstates than requested macrostates.
pub fn macrostate_request(requested: usize, n_micro: usize) -> usize {
    if n_micro < requested {
        let halved = n_micro.div_ceil(2);
        log::warn!(
            "Using less macrostates than requested due to lack of microstates. macronum = {}",
            halved
        );
        halved
    } else {
        requested
    }
}

/// Macrostate count from the relaxation timescales slower than the lag time, floored at 2.
pub fn num_macrostates(requested: usize, timescales: &[f64], lag: usize) -> usize {
    let slow = timescales.iter().filter(|&&t| t > lag as f64).count();
    requested.min(slow.max(2))
}

/// TICA lag clamped to `[2, min_traj_len / 2]`, rounded up.
pub fn tica_lag(min_traj_len: usize, requested: usize) -> usize {
    let upper = (min_traj_len as f64 / 2.0).min(requested as f64);
    upper.max(2.0).ceil() as usize
}
