//! # ucbmd-adaptive
//!
//! Upper-confidence-bound adaptive sampling for MD campaigns.
//!
//! Each epoch the orchestrator projects and clusters the simulations
//! produced so far, builds a Markov model, turns stationary probabilities into
//! free-energy rewards, and launches new simulations from the states with the
//! best bonus-augmented score.
//!
//! ## Components
//! - [`reward`]: windowed free-energy rewards, parent or per-frame attribution
//! - [`values`]: per-state running means (`Q`) and visit counts (`N`)
//! - [`policy`]: UCB / PUCB scores and respawn slot allocation
//! - [`spawn`]: slot allocation → restart frames
//! - [`orchestrator`]: the epoch state machine
//!
//! ## Usage
//! ```rust,ignore
//! use ucbmd_adaptive::{AdaptiveConfig, AdaptiveUcb, Collaborators, EpochInput};
//!
//! let config = AdaptiveConfig::from_file("adaptive.toml")?;
//! let mut adaptive = AdaptiveUcb::new(config, collaborators)?;
//! let outcome = adaptive.run_epoch(&EpochInput { epoch: 3, sims, running: 2 })?;
//! ```

pub mod artifacts;
pub mod config;
pub mod decision;
pub mod heuristics;
pub mod mock;
pub mod orchestrator;
pub mod policy;
pub mod reward;
pub mod spawn;
pub mod values;

pub use artifacts::ArtifactStore;
pub use config::{ActionSpace, AdaptiveConfig, ReclusterConfig, RewardMethod, RewardMode};
pub use decision::{Decision, DecisionInput, DecisionPass, ScoredStates, SpawnPlan};
pub use heuristics::{ClusterCountStrategy, LogFramesHeuristic};
pub use orchestrator::{AdaptiveUcb, Collaborators, EpochInput, EpochOutcome, EpochStage};
pub use policy::SelectionPolicy;
pub use reward::RewardEngine;
pub use values::StateValues;
