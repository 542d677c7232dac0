//! Markov-model data contract.
//!
//! The estimator lives outside this workspace; the adaptive loop only reads
//! the stationary distribution and the cluster → micro/macrostate maps.

use crate::errors::{Result, UcbError};
use crate::types::{TrajectoryDataset, UNASSIGNED};
use serde::{Deserialize, Serialize};

/// A fitted Markov state model over the clusters of one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkovModel {
    /// Lag time in frames the model was estimated at
    pub lag: usize,
    /// Number of microstates in the connected set
    pub micronum: usize,
    /// Number of macrostates after lumping
    pub macronum: usize,
    /// Cluster → microstate, `-1` for clusters outside the connected set
    pub micro_of_cluster: Vec<i32>,
    /// Cluster → macrostate, `-1` for clusters outside the connected set
    pub macro_of_cluster: Vec<i32>,
    /// Equilibrium probability per microstate
    pub stationary_distribution: Vec<f64>,
}

impl MarkovModel {
    /// Checks the internal shape of the model against its own counts.
    pub fn validate(&self) -> Result<()> {
        if self.stationary_distribution.len() != self.micronum {
            return Err(UcbError::data(format!(
                "stationary distribution has {} entries for {} microstates",
                self.stationary_distribution.len(),
                self.micronum
            )));
        }
        if self.micro_of_cluster.len() != self.macro_of_cluster.len() {
            return Err(UcbError::data(
                "micro and macro cluster maps differ in length",
            ));
        }
        if let Some(m) = self
            .micro_of_cluster
            .iter()
            .find(|&&m| m != UNASSIGNED && (m < 0 || m as usize >= self.micronum))
        {
            return Err(UcbError::data(format!("microstate {} out of range", m)));
        }
        if let Some(m) = self
            .macro_of_cluster
            .iter()
            .find(|&&m| m != UNASSIGNED && (m < 0 || m as usize >= self.macronum))
        {
            return Err(UcbError::data(format!("macrostate {} out of range", m)));
        }
        Ok(())
    }

    /// Per-frame equilibrium probability of the microstate each frame belongs to.
    ///
    /// Frames that are unassigned or whose cluster is outside the connected
    /// set get `0`. The result has the per-trajectory shape of `data`.
    pub fn conformation_stationary_distribution(
        &self,
        data: &TrajectoryDataset,
    ) -> Result<Vec<Vec<f64>>> {
        let labels = data.concat_labels()?;
        let mut statdist = vec![0.0; labels.len()];
        for (p, &label) in statdist.iter_mut().zip(&labels) {
            if label == UNASSIGNED {
                continue;
            }
            let micro = *self.micro_of_cluster.get(label as usize).ok_or_else(|| {
                UcbError::data(format!("cluster {} unknown to the Markov model", label))
            })?;
            if micro != UNASSIGNED {
                *p = *self
                    .stationary_distribution
                    .get(micro as usize)
                    .ok_or_else(|| {
                        UcbError::data(format!(
                            "microstate {} has no stationary probability",
                            micro
                        ))
                    })?;
            }
        }
        data.deconcatenate(&statdist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SimRecord, Trajectory};

    fn model() -> MarkovModel {
        MarkovModel {
            lag: 1,
            micronum: 2,
            macronum: 1,
            micro_of_cluster: vec![0, -1, 1],
            macro_of_cluster: vec![0, -1, 0],
            stationary_distribution: vec![0.25, 0.75],
        }
    }

    #[test]
    fn test_conformation_stationary_distribution() {
        let trajs = vec![
            Trajectory::from_labels(SimRecord::new(0), vec![0, 1, 2]),
            Trajectory::from_labels(SimRecord::new(1), vec![-1, 2]),
        ];
        let data = TrajectoryDataset::clustered(trajs, 3, 1).unwrap();
        let sd = model().conformation_stationary_distribution(&data).unwrap();
        assert_eq!(sd, vec![vec![0.25, 0.0, 0.75], vec![0.0, 0.75]]);
    }

    #[test]
    fn test_unvalidated_model_reports_missing_microstate() {
        let mut short = model();
        short.stationary_distribution.pop();
        let trajs = vec![Trajectory::from_labels(SimRecord::new(0), vec![0, 2])];
        let data = TrajectoryDataset::clustered(trajs, 3, 1).unwrap();
        assert!(matches!(
            short.conformation_stationary_distribution(&data),
            Err(UcbError::DataConsistencyError(_))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(model().validate().is_ok());
        let mut bad = model();
        bad.stationary_distribution.pop();
        assert!(bad.validate().is_err());
        let mut bad = model();
        bad.micro_of_cluster[0] = 5;
        assert!(bad.validate().is_err());
    }
}
