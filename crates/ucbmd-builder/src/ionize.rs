//! Neutralisation and salt ions placed by replacing water molecules.

use crate::molecule::{Atom, Molecule, Record};
use rand::seq::SliceRandom;
use rand::Rng;
use ucbmd_core::{Result, UcbError};

/// Molar concentration of pure water.
const WATER_MOLARITY: f64 = 55.5;

/// Minimum distance between a new ion and any solute atom or other ion (Å).
pub const ION_MIN_DISTANCE: f64 = 5.0;

pub const ION_SEGMENT: &str = "I";

const AMBER_ANIONS: &[&str] = &["Cl-"];
const AMBER_CATIONS: &[&str] = &["Na+", "K+", "Cs+"];

/// How many ions of each species to add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IonPlan {
    pub anion: String,
    pub cation: String,
    pub n_anions: usize,
    pub n_cations: usize,
}

impl IonPlan {
    pub fn total(&self) -> usize {
        self.n_anions + self.n_cations
    }
}

/// Counter-ions cancelling `total_charge` plus salt pairs for `saltconc` (mol/L).
pub fn plan_ions(
    total_charge: f64,
    n_water: usize,
    saltconc: f64,
    anion: Option<&str>,
    cation: Option<&str>,
) -> Result<IonPlan> {
    let anion = anion.unwrap_or("Cl-");
    let cation = cation.unwrap_or("Na+");
    if !AMBER_ANIONS.contains(&anion) {
        return Err(UcbError::config(format!(
            "Unsupported anion {}, use one of {:?}",
            anion, AMBER_ANIONS
        )));
    }
    if !AMBER_CATIONS.contains(&cation) {
        return Err(UcbError::config(format!(
            "Unsupported cation {}, use one of {:?}",
            cation, AMBER_CATIONS
        )));
    }
    if !(saltconc >= 0.0) {
        return Err(UcbError::config(format!(
            "salt concentration must be >= 0 (got {})",
            saltconc
        )));
    }

    let charge = total_charge.round() as i64;
    if (total_charge - charge as f64).abs() > 0.01 {
        log::warn!("System has a non-integer charge of {:.4}", total_charge);
    }
    let salt = (saltconc * n_water as f64 / WATER_MOLARITY).round() as usize;
    let n_anions = charge.max(0) as usize + salt;
    let n_cations = (-charge).max(0) as usize + salt;
    log::info!(
        "Charge {}: adding {} {} and {} {} ions",
        charge,
        n_anions,
        anion,
        n_cations,
        cation
    );
    Ok(IonPlan {
        anion: anion.to_string(),
        cation: cation.to_string(),
        n_anions,
        n_cations,
    })
}

/// Replaces randomly chosen water molecules, away from the solute, by ions.
pub fn place_ions<R: Rng + ?Sized>(mol: &Molecule, plan: &IonPlan, rng: &mut R) -> Result<Molecule> {
    if plan.total() == 0 {
        return Ok(mol.clone());
    }
    let solute: Vec<&Atom> = mol.atoms.iter().filter(|a| !a.is_water()).collect();
    let mut candidates = mol.water_oxygens();
    candidates.shuffle(rng);

    let mut picked: Vec<usize> = Vec::with_capacity(plan.total());
    for &o in &candidates {
        if picked.len() == plan.total() {
            break;
        }
        let oxygen = &mol.atoms[o];
        let clear_of_solute = solute.iter().all(|a| a.distance_to(oxygen) >= ION_MIN_DISTANCE);
        let clear_of_ions = picked
            .iter()
            .all(|&p| mol.atoms[p].distance_to(oxygen) >= ION_MIN_DISTANCE);
        if clear_of_solute && clear_of_ions {
            picked.push(o);
        }
    }
    if picked.len() < plan.total() {
        return Err(UcbError::data(format!(
            "only {} water molecules can host the {} ions needed",
            picked.len(),
            plan.total()
        )));
    }

    let removed: Vec<(String, i32, String)> = picked
        .iter()
        .map(|&o| {
            let a = &mol.atoms[o];
            (a.segid.clone(), a.resid, a.insertion.clone())
        })
        .collect();
    let mut out = mol.clone();
    out.remove(|a| {
        a.is_water()
            && removed
                .iter()
                .any(|(seg, resid, ins)| a.segid == *seg && a.resid == *resid && a.insertion == *ins)
    });

    let species = std::iter::repeat(plan.anion.as_str())
        .take(plan.n_anions)
        .chain(std::iter::repeat(plan.cation.as_str()).take(plan.n_cations));
    for (k, (ion, &o)) in species.zip(&picked).enumerate() {
        let mut atom = Atom::new(ion, ion, k as i32 + 1, ION_SEGMENT, mol.atoms[o].coord);
        atom.record = Record::Hetatm;
        atom.element = ion.trim_end_matches(|c: char| c == '+' || c == '-').to_ascii_uppercase();
        out.atoms.push(atom);
    }
    Ok(out)
}
