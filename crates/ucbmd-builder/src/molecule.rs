//! Atom-level molecular system and PDB reading/writing.
//!
//! Only the fields tleap and the build steps need are kept: names, residue
//! numbering, segment ids, coordinates and charges.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use ucbmd_core::{Result, UcbError};

/// Amino-acid residue names, AMBER protonation variants and caps included.
const PROTEIN_RESIDUES: &[&str] = &[
    "ALA", "ARG", "ASN", "ASP", "CYS", "GLN", "GLU", "GLY", "HIS", "ILE", "LEU", "LYS", "MET",
    "PHE", "PRO", "SER", "THR", "TRP", "TYR", "VAL", "HID", "HIE", "HIP", "HSD", "HSE", "HSP",
    "CYX", "CYM", "ASH", "GLH", "LYN", "ACE", "NME",
];

const WATER_RESIDUES: &[&str] = &["WAT", "HOH", "TIP3", "SOL", "TIP"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    Atom,
    Hetatm,
}

/// One atom of a molecular system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub record: Record,
    pub name: String,
    pub resname: String,
    pub chain: String,
    pub resid: i32,
    pub insertion: String,
    pub coord: [f64; 3],
    pub occupancy: f64,
    pub beta: f64,
    pub segid: String,
    pub element: String,
    /// Partial charge in elementary charges
    #[serde(default)]
    pub charge: f64,
}

impl Atom {
    pub fn new(name: &str, resname: &str, resid: i32, segid: &str, coord: [f64; 3]) -> Self {
        Self {
            record: Record::Atom,
            name: name.to_string(),
            resname: resname.to_string(),
            chain: String::new(),
            resid,
            insertion: String::new(),
            coord,
            occupancy: 1.0,
            beta: 0.0,
            segid: segid.to_string(),
            element: guess_element(name),
            charge: 0.0,
        }
    }

    pub fn is_protein(&self) -> bool {
        PROTEIN_RESIDUES.contains(&self.resname.as_str())
    }

    pub fn is_water(&self) -> bool {
        WATER_RESIDUES.contains(&self.resname.as_str())
    }

    pub fn is_hydrogen(&self) -> bool {
        self.element == "H"
    }

    pub fn distance_to(&self, other: &Atom) -> f64 {
        distance(&self.coord, &other.coord)
    }

    fn same_residue(&self, other: &Atom) -> bool {
        self.resid == other.resid && self.insertion == other.insertion && self.segid == other.segid
    }
}

pub fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// An ordered list of atoms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Molecule {
    pub atoms: Vec<Atom>,
}

impl Molecule {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self { atoms }
    }

    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn from_pdb_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_pdb_str(&contents).map_err(|e| match e {
            UcbError::DataConsistencyError(msg) => {
                UcbError::data(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parses ATOM/HETATM records of the first model.
    pub fn from_pdb_str(contents: &str) -> Result<Self> {
        let mut atoms = Vec::new();
        for (lineno, line) in contents.lines().enumerate() {
            if line.starts_with("ENDMDL") {
                break;
            }
            let record = match line.get(0..6).unwrap_or("").trim() {
                "ATOM" => Record::Atom,
                "HETATM" => Record::Hetatm,
                _ => continue,
            };
            atoms.push(parse_atom_line(line, record).map_err(|msg| {
                UcbError::data(format!("line {}: {}", lineno + 1, msg))
            })?);
        }
        Ok(Self { atoms })
    }

    /// PDB text with a TER record at every segment change.
    pub fn to_pdb_string(&self) -> String {
        let mut out = String::with_capacity(self.atoms.len() * 81);
        for (i, atom) in self.atoms.iter().enumerate() {
            if i > 0 && self.atoms[i - 1].segid != atom.segid {
                out.push_str("TER\n");
            }
            out.push_str(&format_atom_line(i + 1, atom));
            out.push('\n');
        }
        if !self.atoms.is_empty() {
            out.push_str("TER\n");
        }
        out.push_str("END\n");
        out
    }

    pub fn write_pdb(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_pdb_string())?;
        Ok(())
    }

    /// Distinct segment ids in order of first appearance.
    pub fn segids(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.atoms
            .iter()
            .filter(|a| seen.insert(a.segid.clone()))
            .map(|a| a.segid.clone())
            .collect()
    }

    pub fn segment_indices(&self, segid: &str) -> Vec<usize> {
        self.atoms
            .iter()
            .enumerate()
            .filter(|(_, a)| a.segid == segid)
            .map(|(i, _)| i)
            .collect()
    }

    /// Gives every chain of atoms without a segment id its own unused id.
    pub fn fill_missing_segids(&mut self) {
        if self.atoms.iter().all(|a| !a.segid.is_empty()) {
            return;
        }
        let mut used: BTreeSet<String> = self.atoms.iter().map(|a| a.segid.clone()).collect();
        let mut assigned: Vec<(String, String)> = Vec::new();
        let mut next = 0usize;
        for atom in self.atoms.iter_mut().filter(|a| a.segid.is_empty()) {
            if let Some((_, seg)) = assigned.iter().find(|(chain, _)| *chain == atom.chain) {
                atom.segid = seg.clone();
                continue;
            }
            let seg = loop {
                let candidate = format!("X{}", next);
                next += 1;
                if !used.contains(&candidate) {
                    break candidate;
                }
            };
            log::warn!(
                "Atoms of chain '{}' have no segment id, assigning segment {}",
                atom.chain,
                seg
            );
            used.insert(seg.clone());
            assigned.push((atom.chain.clone(), seg.clone()));
            atom.segid = seg;
        }
    }

    /// Reorders atoms so that position `i` holds the atom previously at `order[i]`.
    pub fn reorder(&mut self, order: &[usize]) -> Result<()> {
        if order.len() != self.atoms.len() {
            return Err(UcbError::data(format!(
                "reorder of {} atoms with {} indices",
                self.atoms.len(),
                order.len()
            )));
        }
        let mut seen = vec![false; order.len()];
        for &i in order {
            if i >= order.len() || std::mem::replace(&mut seen[i], true) {
                return Err(UcbError::data("reorder indices are not a permutation"));
            }
        }
        self.atoms = order.iter().map(|&i| self.atoms[i].clone()).collect();
        Ok(())
    }

    /// Removes every atom matching `pred`, returning how many were removed.
    pub fn remove<F: Fn(&Atom) -> bool>(&mut self, pred: F) -> usize {
        let before = self.atoms.len();
        self.atoms.retain(|a| !pred(a));
        before - self.atoms.len()
    }

    /// 1-based sequential residue number of every atom, as tleap numbers residues.
    pub fn sequence_ids(&self) -> Vec<usize> {
        let mut ids = Vec::with_capacity(self.atoms.len());
        let mut current = 0;
        for (i, atom) in self.atoms.iter().enumerate() {
            if i == 0 || !self.atoms[i - 1].same_residue(atom) || self.atoms[i - 1].resname != atom.resname {
                current += 1;
            }
            ids.push(current);
        }
        ids
    }

    pub fn total_charge(&self) -> f64 {
        self.atoms.iter().map(|a| a.charge).sum()
    }

    /// Water oxygens, i.e. one heavy atom per water molecule.
    pub fn water_oxygens(&self) -> Vec<usize> {
        self.atoms
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_water() && !a.is_hydrogen())
            .map(|(i, _)| i)
            .collect()
    }
}

fn parse_atom_line(line: &str, record: Record) -> std::result::Result<Atom, String> {
    let name = field(line, 12..16)
        .filter(|s| !s.is_empty())
        .ok_or("missing atom name")?
        .to_string();
    let resname = field(line, 17..21).unwrap_or_default().to_string();
    let chain = field(line, 21..22).unwrap_or_default().to_string();
    let resid = field(line, 22..26)
        .and_then(|s| s.parse::<i32>().ok())
        .ok_or("invalid residue number")?;
    let insertion = field(line, 26..27).unwrap_or_default().to_string();
    let mut coord = [0.0; 3];
    for (k, range) in [30..38, 38..46, 46..54].into_iter().enumerate() {
        coord[k] = field(line, range)
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or("invalid coordinates")?;
    }
    let occupancy = field(line, 54..60).and_then(|s| s.parse().ok()).unwrap_or(1.0);
    let beta = field(line, 60..66).and_then(|s| s.parse().ok()).unwrap_or(0.0);
    let segid = field(line, 72..76).unwrap_or_default().to_string();
    let element = match field(line, 76..78) {
        Some(e) if !e.is_empty() => e.to_ascii_uppercase(),
        _ => guess_element(&name),
    };
    Ok(Atom {
        record,
        name,
        resname,
        chain,
        resid,
        insertion,
        coord,
        occupancy,
        beta,
        segid,
        element,
        charge: 0.0,
    })
}

fn field(line: &str, range: std::ops::Range<usize>) -> Option<&str> {
    let end = range.end.min(line.len());
    line.get(range.start..end).map(str::trim)
}

fn format_atom_line(serial: usize, atom: &Atom) -> String {
    let record = match atom.record {
        Record::Atom => "ATOM",
        Record::Hetatm => "HETATM",
    };
    format!(
        "{:<6}{:>5} {:<4} {:<4}{:1}{:>4}{:1}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}      {:<4}{:>2}",
        record,
        serial % 100_000,
        atom.name,
        atom.resname,
        atom.chain.chars().next().unwrap_or(' '),
        atom.resid % 10_000,
        atom.insertion.chars().next().unwrap_or(' '),
        atom.coord[0],
        atom.coord[1],
        atom.coord[2],
        atom.occupancy,
        atom.beta,
        atom.segid,
        atom.element
    )
}

/// Element from the leading letters of an atom name.
fn guess_element(name: &str) -> String {
    name.chars()
        .find(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase().to_string())
        .unwrap_or_default()
}
