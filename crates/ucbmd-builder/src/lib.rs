//! # ucbmd-builder
//!
//! Prepares molecular systems for AMBER with tleap.
//!
//! The input molecule gets segment ids, AMBER lipid names and terminal caps,
//! then tleap builds it. The built system is neutralised and salted by
//! replacing waters with ions, and rebuilt with disulfide bonds in place.
//!
//! ```rust,ignore
//! use ucbmd_builder::{AmberBuilder, BuildConfig, Molecule};
//!
//! let mol = Molecule::from_pdb_file("solvated.pdb".as_ref())?;
//! let config = BuildConfig { outdir: "build".into(), saltconc: 0.15, ..Default::default() };
//! let built = AmberBuilder::new(config)?.build(&mol)?;
//! ```

pub mod amber;
pub mod caps;
pub mod disulfide;
pub mod ionize;
pub mod lipids;
pub mod molecule;
pub mod prmtop;
pub mod tleap;

pub use amber::{list_files, AmberBuilder, BuildConfig};
pub use caps::{CapMap, Caps};
pub use disulfide::{DisulfideBond, ResidueId};
pub use ionize::IonPlan;
pub use lipids::LipidTable;
pub use molecule::{Atom, Molecule};
