//! Terminal capping of protein segments.
//!
//! tleap cannot add caps itself, so they are carved out of terminal atoms:
//! the N-terminal `H2` becomes the `C` of the N-cap and the C-terminal `OXT`
//! becomes the `N` of the C-cap. The remaining amine hydrogens `H1`/`H3` are
//! dropped, and the new atoms are moved to the segment boundaries.

use crate::molecule::Molecule;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use ucbmd_core::{Result, UcbError};

/// N- and C-terminal cap residue names of one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caps {
    pub nterm: String,
    pub cterm: String,
}

impl Caps {
    pub fn new(nterm: &str, cterm: &str) -> Self {
        Self {
            nterm: nterm.to_string(),
            cterm: cterm.to_string(),
        }
    }

    /// Neutral ACE/NME caps.
    pub fn neutral() -> Self {
        Self::new("ACE", "NME")
    }
}

pub type CapMap = BTreeMap<String, Caps>;

/// ACE/NME for every protein segment, nothing for the rest.
///
/// Segments mixing protein and non-protein atoms are rejected.
pub fn default_caps(mol: &Molecule) -> Result<CapMap> {
    let mut protein = BTreeSet::new();
    let mut other = BTreeSet::new();
    for atom in &mol.atoms {
        if atom.is_protein() {
            protein.insert(atom.segid.clone());
        } else {
            other.insert(atom.segid.clone());
        }
    }
    let mixed: Vec<_> = protein.intersection(&other).cloned().collect();
    if !mixed.is_empty() {
        return Err(UcbError::config(format!(
            "Segments {:?} contain both protein and non-protein atoms. Please assign separate segments to them.",
            mixed
        )));
    }
    Ok(protein
        .into_iter()
        .map(|seg| (seg, Caps::neutral()))
        .collect())
}

pub fn apply_caps(mol: &mut Molecule, caps: &CapMap) -> Result<()> {
    for (seg, cap) in caps {
        cap_segment(mol, seg, cap)?;
    }
    Ok(())
}

fn cap_segment(mol: &mut Molecule, seg: &str, cap: &Caps) -> Result<()> {
    let segment = mol.segment_indices(seg);
    let (Some(&first), Some(&last)) = (segment.first(), segment.last()) else {
        return Err(UcbError::config(format!("Cannot cap missing segment {}", seg)));
    };
    let min_resid = segment.iter().map(|&i| mol.atoms[i].resid).min().unwrap_or_default();
    let max_resid = segment.iter().map(|&i| mol.atoms[i].resid).max().unwrap_or_default();

    let find_one = |name: &str, resid: i32| -> Result<usize> {
        let hits: Vec<usize> = segment
            .iter()
            .copied()
            .filter(|&i| mol.atoms[i].resid == resid && mol.atoms[i].name == name)
            .collect();
        match hits.as_slice() {
            [i] => Ok(*i),
            _ => Err(UcbError::data(format!(
                "Segment {} is missing atom {} in resid {}. Cannot cap.",
                seg, name, resid
            ))),
        }
    };
    let mut nterm = find_one("H2", min_resid)?;
    let mut cterm = find_one("OXT", max_resid)?;

    {
        let atom = &mut mol.atoms[nterm];
        atom.resname = cap.nterm.clone();
        atom.name = "C".to_string();
        atom.element = "C".to_string();
        atom.resid = min_resid - 1;
    }
    {
        let atom = &mut mol.atoms[cterm];
        atom.resname = cap.cterm.clone();
        atom.name = "N".to_string();
        atom.element = "N".to_string();
        atom.resid = max_resid + 1;
    }

    mol.atoms.swap(nterm, first);
    if cterm == first {
        cterm = nterm;
    }
    nterm = first;
    mol.atoms.swap(cterm, last);
    log::debug!(
        "Capped segment {} with {} (atom {}) and {} (atom {})",
        seg,
        cap.nterm,
        nterm,
        cap.cterm,
        last
    );

    mol.remove(|a| {
        a.segid == seg && a.resid == min_resid && (a.name == "H1" || a.name == "H3")
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::Atom;

    fn peptide() -> Molecule {
        let names = [
            ("N", "ALA", 1),
            ("H1", "ALA", 1),
            ("H2", "ALA", 1),
            ("H3", "ALA", 1),
            ("CA", "ALA", 1),
            ("C", "ALA", 1),
            ("N", "GLY", 2),
            ("CA", "GLY", 2),
            ("C", "GLY", 2),
            ("O", "GLY", 2),
            ("OXT", "GLY", 2),
        ];
        let mut atoms: Vec<Atom> = names
            .iter()
            .enumerate()
            .map(|(i, (n, r, id))| Atom::new(n, r, *id, "P", [i as f64, 0.0, 0.0]))
            .collect();
        atoms.push(Atom::new("O", "WAT", 1, "W", [50.0, 0.0, 0.0]));
        Molecule::new(atoms)
    }

    #[test]
    fn test_default_caps() {
        let caps = default_caps(&peptide()).unwrap();
        assert_eq!(caps.len(), 1);
        assert_eq!(caps["P"], Caps::neutral());
    }

    #[test]
    fn test_mixed_segment_rejected() {
        let mut mol = peptide();
        mol.atoms[11].segid = "P".to_string();
        assert!(matches!(
            default_caps(&mol),
            Err(UcbError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_apply_caps() {
        let mut mol = peptide();
        let caps = default_caps(&mol).unwrap();
        apply_caps(&mut mol, &caps).unwrap();

        assert_eq!(mol.num_atoms(), 10);
        let first = &mol.atoms[0];
        assert_eq!((first.name.as_str(), first.resname.as_str(), first.resid), ("C", "ACE", 0));
        let last = &mol.atoms[8];
        assert_eq!((last.name.as_str(), last.resname.as_str(), last.resid), ("N", "NME", 3));
        assert!(mol.atoms.iter().all(|a| a.name != "H1" && a.name != "H3"));
        assert_eq!(mol.atoms[9].resname, "WAT");
    }

    #[test]
    fn test_missing_oxt() {
        let mut mol = peptide();
        mol.atoms.remove(10);
        let caps = default_caps(&mol).unwrap();
        let err = apply_caps(&mut mol, &caps).unwrap_err();
        assert!(matches!(err, UcbError::DataConsistencyError(_)));
    }
}
