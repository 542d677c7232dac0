//! # ucbmd-core
//!
//! Core types, collaborator traits, and errors for UCB adaptive sampling.
//!
//! - **Types**: trajectory datasets, frame references, simulation lineage
//! - **Model**: the Markov-model data contract the adaptive loop reads
//! - **Traits**: Projector, DimensionReducer, Clusterer, MarkovModeller
//! - **Errors**: unified error handling with `UcbError`
//!
//! ```text
//! ┌─────────────────┐
//! │   ucbmd-core    │  ← types / traits / errors
//! └─────────────────┘
//!         ▲
//!    ┌────┴──────────────┐
//!    │                   │
//! ┌──▼────────────┐ ┌────▼─────────┐
//! │ucbmd-adaptive │ │ucbmd-builder │
//! └───────────────┘ └──────────────┘
//!         ▲                 ▲
//!         └────────┬────────┘
//!         ┌────────▼────────┐
//!         │    ucbmd-cli    │
//!         └─────────────────┘
//! ```

pub mod errors;
pub mod model;
pub mod traits;
pub mod types;

pub use errors::{Result, UcbError};
pub use model::MarkovModel;
pub use traits::{ClusterAssignment, Clusterer, DimensionReducer, MarkovModeller, Projector};
pub use types::{FrameRef, SimFrame, SimRecord, Trajectory, TrajectoryDataset, UNASSIGNED};
