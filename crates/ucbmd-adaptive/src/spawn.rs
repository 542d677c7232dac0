//! Conversion of a per-state slot allocation into restart conformations.

use rand::Rng;
use ucbmd_core::{FrameRef, Result, TrajectoryDataset, UcbError};

/// Picks exactly `allocation[s]` frames labelled `s` for every state `s`.
///
/// States with a zero allocation are never sampled. Frames are drawn with
/// replacement, so a small state can seed several simulations.
pub fn spawn_frames<R: Rng + ?Sized>(
    allocation: &[usize],
    data_q: &TrajectoryDataset,
    rng: &mut R,
) -> Result<Vec<FrameRef>> {
    if let Some(k) = data_q.n_states() {
        if allocation.len() != k {
            return Err(UcbError::data(format!(
                "allocation over {} states, action space has {}",
                allocation.len(),
                k
            )));
        }
    }
    let (states, counts): (Vec<usize>, Vec<usize>) = allocation
        .iter()
        .enumerate()
        .filter(|(_, &count)| count > 0)
        .map(|(state, &count)| (state, count))
        .unzip();
    let picks = data_q.sample_clusters(&states, &counts, rng)?;
    let frames: Vec<FrameRef> = picks.into_iter().flatten().collect();
    log::debug!("relFrames {:?}", frames);
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use ucbmd_core::{SimRecord, Trajectory};

    fn data() -> TrajectoryDataset {
        let trajs = vec![
            Trajectory::from_labels(SimRecord::new(0), vec![0, 1, 1, 2]),
            Trajectory::from_labels(SimRecord::new(1), vec![2, 2, -1]),
        ];
        TrajectoryDataset::clustered(trajs, 3, 1).unwrap()
    }

    #[test]
    fn test_exact_counts_per_state() {
        let data = data();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let frames = spawn_frames(&[0, 2, 3], &data, &mut rng).unwrap();
        assert_eq!(frames.len(), 5);
        let labels: Vec<i32> = frames.iter().map(|f| data.label_of(*f).unwrap()).collect();
        assert_eq!(labels.iter().filter(|&&l| l == 1).count(), 2);
        assert_eq!(labels.iter().filter(|&&l| l == 2).count(), 3);
    }

    #[test]
    fn test_zero_allocation_is_empty() {
        let data = data();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let frames = spawn_frames(&[0, 0, 0], &data, &mut rng).unwrap();
        assert!(frames.is_empty());
        assert!(data.rel2sim(&frames).unwrap().is_empty());
    }

    #[test]
    fn test_allocation_length_checked() {
        let data = data();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        assert!(spawn_frames(&[1, 1], &data, &mut rng).is_err());
    }
}
