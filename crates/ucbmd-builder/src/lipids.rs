//! CHARMM → AMBER (Lipid14) membrane nomenclature conversion.
//!
//! The conversion table is a CSV file whose first line is a free-form title
//! and whose second line holds the column names:
//!
//! ```text
//! search,replace,order,num_atom,TER
//! N POPC,N PC,0,134,True
//! ```
//!
//! `search`/`replace` are `"<atom> <residue>"` pairs, `order` is the atom's
//! position inside the converted lipid, `num_atom` its atom count, and `TER`
//! marks lipids that form their own segment.

use crate::molecule::Molecule;
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use ucbmd_core::{Result, UcbError};

/// More segments than this cannot be named `L<n>` within the PDB segid columns.
pub const MAX_LIPID_SEGMENTS: usize = 999;

#[derive(Debug, Deserialize)]
struct RuleRecord {
    search: String,
    replace: String,
    order: usize,
    num_atom: usize,
    #[serde(rename = "TER")]
    ter: String,
}

/// Replacement for one CHARMM atom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LipidRule {
    pub resname: String,
    pub name: String,
    pub order: usize,
    pub num_atoms: usize,
    pub ter: bool,
}

/// Conversion rules keyed by CHARMM residue then atom name.
#[derive(Debug, Clone, Default)]
pub struct LipidTable {
    rules: HashMap<String, HashMap<String, LipidRule>>,
}

fn split_pair(field: &str) -> Result<(String, String)> {
    let mut parts = field.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(atom), Some(res)) => Ok((atom.to_string(), res.to_string())),
        _ => Err(UcbError::config(format!(
            "expected '<atom> <residue>' in lipid table, got '{}'",
            field
        ))),
    }
}

impl LipidTable {
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(UcbError::config(format!(
                "File {} does not exist",
                path.display()
            )));
        }
        Self::from_csv_str(&fs::read_to_string(path)?)
    }

    pub fn from_csv_str(contents: &str) -> Result<Self> {
        let body = contents.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
        let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(body.as_bytes());
        let mut table = Self::default();
        for record in reader.deserialize::<RuleRecord>() {
            let record = record.map_err(|e| UcbError::config(format!("lipid table: {}", e)))?;
            let (search_atom, search_res) = split_pair(&record.search)?;
            let (replace_atom, replace_res) = split_pair(&record.replace)?;
            table.rules.entry(search_res).or_default().insert(
                search_atom,
                LipidRule {
                    resname: replace_res,
                    name: replace_atom,
                    order: record.order,
                    num_atoms: record.num_atom,
                    ter: record.ter == "True",
                },
            );
        }
        log::debug!("Loaded lipid conversion rules for {} residues", table.rules.len());
        Ok(table)
    }

    pub fn num_residues(&self) -> usize {
        self.rules.len()
    }

    fn rule(&self, resname: &str, name: &str) -> Option<&LipidRule> {
        self.rules.get(resname)?.get(name)
    }

    /// Renames, reorders and resegments every lipid of `mol`.
    pub fn convert(&self, mol: &Molecule) -> Result<Molecule> {
        let n = mol.num_atoms();
        let mut out = mol.clone();
        let mut keys: Vec<usize> = (0..n).collect();
        let mut begins = vec![false; n];
        let mut ter_begins = vec![false; n];
        let mut ter_ends = vec![false; n];

        for (i, atom) in mol.atoms.iter().enumerate() {
            let Some(rule) = self.rule(&atom.resname, &atom.name) else {
                continue;
            };
            out.atoms[i].resname = rule.resname.clone();
            out.atoms[i].name = rule.name.clone();
            keys[i] = rule.order;
            begins[i] = rule.order == 0;
            ter_begins[i] = rule.order == 0 && rule.ter;
            ter_ends[i] = rule.order + 1 == rule.num_atoms && rule.ter;
        }
        if !begins.iter().any(|&b| b) {
            return Ok(out);
        }

        // Offset in-lipid orders by the start of the original residue
        let seq = mol.sequence_ids();
        let mut start = 0;
        while start < n {
            let mut end = start;
            while end + 1 < n && seq[end + 1] == seq[start] {
                end += 1;
            }
            if begins[start..=end].iter().any(|&b| b) {
                for key in &mut keys[start..=end] {
                    *key += start;
                }
            }
            start = end + 1;
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&i| (keys[i], i));
        out.reorder(&order)?;

        let ter_begins: Vec<usize> = (0..n).filter(|&j| ter_begins[order[j]]).collect();
        let ter_ends: Vec<usize> = (0..n).filter(|&j| ter_ends[order[j]]).collect();
        if ter_begins.len() > MAX_LIPID_SEGMENTS {
            return Err(UcbError::data(format!(
                "More than {} lipids ({}). Cannot define separate segments for all of them.",
                MAX_LIPID_SEGMENTS,
                ter_begins.len()
            )));
        }
        if ter_begins.len() != ter_ends.len() {
            return Err(UcbError::data(format!(
                "lipid table matched {} lipid starts but {} ends",
                ter_begins.len(),
                ter_ends.len()
            )));
        }

        for (k, (&b, &e)) in ter_begins.iter().zip(&ter_ends).enumerate() {
            if e < b {
                return Err(UcbError::data(format!("lipid {} ends before it starts", k + 1)));
            }
            let segid = format!("L{}", k + 1);
            let mut resid = 0;
            for j in b..=e {
                if j == b || out.atoms[j].resname != out.atoms[j - 1].resname {
                    resid += 1;
                }
                out.atoms[j].resid = resid;
                out.atoms[j].segid = segid.clone();
            }
        }
        log::info!("Converted {} CHARMM lipids to AMBER", ter_begins.len());
        Ok(out)
    }
}
