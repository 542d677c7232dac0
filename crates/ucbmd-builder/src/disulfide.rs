//! Disulfide bridges between cysteine SG atoms.

use crate::molecule::Molecule;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ucbmd_core::{Result, UcbError};

/// SG–SG distance below which two cysteines are considered bonded (Å).
pub const DISULFIDE_CUTOFF: f64 = 3.0;

const CYSTEINES: &[&str] = &["CYS", "CYX", "CYM"];

/// One cysteine, addressed by segment and residue number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResidueId {
    pub segid: String,
    pub resid: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisulfideBond {
    pub first: ResidueId,
    pub second: ResidueId,
}

impl FromStr for ResidueId {
    type Err = UcbError;

    /// `SEG:RESID`
    fn from_str(s: &str) -> Result<Self> {
        let (segid, resid) = s
            .split_once(':')
            .ok_or_else(|| UcbError::config(format!("expected SEG:RESID, got '{}'", s)))?;
        let resid = resid
            .trim()
            .parse()
            .map_err(|_| UcbError::config(format!("invalid residue number in '{}'", s)))?;
        Ok(Self {
            segid: segid.trim().to_string(),
            resid,
        })
    }
}

impl FromStr for DisulfideBond {
    type Err = UcbError;

    /// `SEG:RESID-SEG:RESID`
    fn from_str(s: &str) -> Result<Self> {
        let (a, b) = s.split_once('-').ok_or_else(|| {
            UcbError::config(format!("expected SEG:RESID-SEG:RESID, got '{}'", s))
        })?;
        Ok(Self {
            first: a.parse()?,
            second: b.parse()?,
        })
    }
}

impl fmt::Display for DisulfideBond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.first.segid, self.first.resid, self.second.segid, self.second.resid
        )
    }
}

/// Cysteine pairs whose SG atoms lie within [`DISULFIDE_CUTOFF`].
pub fn detect_disulfides(mol: &Molecule) -> Vec<DisulfideBond> {
    let sg: Vec<usize> = mol
        .atoms
        .iter()
        .enumerate()
        .filter(|(_, a)| a.name == "SG" && CYSTEINES.contains(&a.resname.as_str()))
        .map(|(i, _)| i)
        .collect();
    let mut bonds = Vec::new();
    for (k, &i) in sg.iter().enumerate() {
        for &j in &sg[k + 1..] {
            let (a, b) = (&mol.atoms[i], &mol.atoms[j]);
            if a.distance_to(b) < DISULFIDE_CUTOFF {
                bonds.push(DisulfideBond {
                    first: ResidueId {
                        segid: a.segid.clone(),
                        resid: a.resid,
                    },
                    second: ResidueId {
                        segid: b.segid.clone(),
                        resid: b.resid,
                    },
                });
            }
        }
    }
    log::info!("Detected {} disulfide bonds", bonds.len());
    bonds
}

fn sg_of<'a>(mol: &'a Molecule, res: &ResidueId) -> Result<&'a crate::molecule::Atom> {
    mol.atoms
        .iter()
        .find(|a| a.name == "SG" && a.segid == res.segid && a.resid == res.resid)
        .ok_or_else(|| {
            UcbError::data(format!(
                "no SG atom in disulfide residue {}:{}",
                res.segid, res.resid
            ))
        })
}

/// Maximum displacement of an SG atom between two builds of the same system (Å).
const REBIND_TOLERANCE: f64 = 0.1;

/// Re-addresses `bonds` of `from` in `to`, matching SG atoms by position.
///
/// tleap rewrites segment ids and residue numbers but keeps coordinates, so
/// the rebuilt system is located through its SG atoms.
pub fn rebind_disulfides(
    from: &Molecule,
    to: &Molecule,
    bonds: &[DisulfideBond],
) -> Result<Vec<DisulfideBond>> {
    let rebind = |res: &ResidueId| -> Result<ResidueId> {
        let sg = sg_of(from, res)?;
        to.atoms
            .iter()
            .filter(|a| a.name == "SG")
            .find(|a| a.distance_to(sg) < REBIND_TOLERANCE)
            .map(|a| ResidueId {
                segid: a.segid.clone(),
                resid: a.resid,
            })
            .ok_or_else(|| {
                UcbError::data(format!(
                    "disulfide residue {}:{} is missing from the built system",
                    res.segid, res.resid
                ))
            })
    };
    bonds
        .iter()
        .map(|b| {
            Ok(DisulfideBond {
                first: rebind(&b.first)?,
                second: rebind(&b.second)?,
            })
        })
        .collect()
}

/// Renames bonded cysteines to CYX and returns the tleap `bond` commands.
///
/// tleap addresses residues by their 1-based position in the loaded PDB.
pub fn apply_disulfides(mol: &mut Molecule, bonds: &[DisulfideBond]) -> Result<Vec<String>> {
    let seq = mol.sequence_ids();
    let mut commands = Vec::with_capacity(bonds.len());
    for bond in bonds {
        let mut locate = |res: &ResidueId| -> Result<usize> {
            let mut position = None;
            for (atom, &s) in mol.atoms.iter_mut().zip(&seq) {
                if atom.segid == res.segid && atom.resid == res.resid {
                    atom.resname = "CYX".to_string();
                    position = Some(s);
                }
            }
            position.ok_or_else(|| {
                UcbError::data(format!(
                    "disulfide residue {}:{} not found",
                    res.segid, res.resid
                ))
            })
        };
        let a = locate(&bond.first)?;
        let b = locate(&bond.second)?;
        commands.push(format!("bond mol.{}.SG mol.{}.SG", a, b));
    }
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::Atom;

    fn two_cysteines(distance: f64) -> Molecule {
        Molecule::new(vec![
            Atom::new("CA", "ALA", 1, "P", [0.0; 3]),
            Atom::new("CA", "CYS", 2, "P", [0.0; 3]),
            Atom::new("SG", "CYS", 2, "P", [0.0; 3]),
            Atom::new("CA", "GLY", 3, "P", [0.0; 3]),
            Atom::new("SG", "CYS", 7, "Q", [distance, 0.0, 0.0]),
        ])
    }

    #[test]
    fn test_parse_bond() {
        let bond: DisulfideBond = "P:2-Q:7".parse().unwrap();
        assert_eq!(bond.first.segid, "P");
        assert_eq!(bond.second.resid, 7);
        assert_eq!(bond.to_string(), "P:2-Q:7");
        assert!("P2-Q7".parse::<DisulfideBond>().is_err());
    }

    #[test]
    fn test_detect_by_distance() {
        assert_eq!(detect_disulfides(&two_cysteines(2.04)).len(), 1);
        assert!(detect_disulfides(&two_cysteines(4.5)).is_empty());
    }

    #[test]
    fn test_apply_renames_and_numbers() {
        let mut mol = two_cysteines(2.04);
        let bonds = detect_disulfides(&mol);
        let commands = apply_disulfides(&mut mol, &bonds).unwrap();
        assert_eq!(commands, vec!["bond mol.2.SG mol.4.SG".to_string()]);
        assert_eq!(mol.atoms[1].resname, "CYX");
        assert_eq!(mol.atoms[4].resname, "CYX");
    }

    #[test]
    fn test_rebind_by_position() {
        let from = two_cysteines(2.04);
        let mut to = from.clone();
        for atom in &mut to.atoms {
            atom.segid = "X1".to_string();
            atom.resid += 100;
        }
        let bonds = detect_disulfides(&from);
        let rebound = rebind_disulfides(&from, &to, &bonds).unwrap();
        assert_eq!(rebound[0].to_string(), "X1:102-X1:107");

        to.atoms[4].coord[0] += 1.0;
        assert!(rebind_disulfides(&from, &to, &bonds).is_err());
    }
}
