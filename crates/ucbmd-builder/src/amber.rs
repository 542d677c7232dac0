//! AMBER system build: preparation, tleap run, ionization and rebuild.

use crate::caps::{apply_caps, default_caps, CapMap};
use crate::disulfide::{apply_disulfides, detect_disulfides, rebind_disulfides, DisulfideBond};
use crate::ionize::{place_ions, plan_ions};
use crate::lipids::LipidTable;
use crate::molecule::Molecule;
use crate::prmtop::read_charges;
use crate::tleap::{find_tleap, run_tleap, LeapScript, INPUT_PDB, LOG_NAME};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use ucbmd_core::{Result, UcbError};

fn default_ff() -> Vec<String> {
    vec![
        "leaprc.lipid14".to_string(),
        "leaprc.ff14SB".to_string(),
        "leaprc.gaff".to_string(),
    ]
}

fn default_prefix() -> String {
    "structure".to_string()
}

fn default_outdir() -> PathBuf {
    PathBuf::from("./")
}

fn default_true() -> bool {
    true
}

fn default_tleap() -> String {
    "tleap".to_string()
}

fn default_timeout_secs() -> u64 {
    600
}

/// Options of one AMBER build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// leaprc force-field command files
    #[serde(default = "default_ff")]
    pub ff: Vec<String>,

    /// prepi topology files, copied into the output directory
    #[serde(default)]
    pub topo: Vec<PathBuf>,

    /// frcmod parameter files, copied into the output directory
    #[serde(default)]
    pub param: Vec<PathBuf>,

    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_outdir")]
    pub outdir: PathBuf,

    /// Caps per segment; ACE/NME on every protein segment when unset
    #[serde(default)]
    pub caps: Option<CapMap>,

    #[serde(default = "default_true")]
    pub ionize: bool,

    /// Salt concentration in mol/L on top of neutralisation
    #[serde(default)]
    pub saltconc: f64,

    #[serde(default)]
    pub saltanion: Option<String>,

    #[serde(default)]
    pub saltcation: Option<String>,

    /// Disulfide bonds; detected from SG distances when unset
    #[serde(default)]
    pub disulfide: Option<Vec<DisulfideBond>>,

    /// tleap executable name or path
    #[serde(default = "default_tleap")]
    pub tleap: String,

    /// Run tleap; only the script and input PDB are written otherwise
    #[serde(default = "default_true")]
    pub execute: bool,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// CHARMM→AMBER lipid rename table
    #[serde(default)]
    pub lipid_table: Option<PathBuf>,

    /// Seed for ion placement
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            ff: default_ff(),
            topo: Vec::new(),
            param: Vec::new(),
            prefix: default_prefix(),
            outdir: default_outdir(),
            caps: None,
            ionize: true,
            saltconc: 0.0,
            saltanion: None,
            saltcation: None,
            disulfide: None,
            tleap: default_tleap(),
            execute: true,
            timeout_secs: default_timeout_secs(),
            lipid_table: None,
            seed: None,
        }
    }
}

impl BuildConfig {
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            return Err(UcbError::config("output prefix must not be empty"));
        }
        if !(self.saltconc >= 0.0) {
            return Err(UcbError::config(format!(
                "salt concentration must be >= 0 (got {})",
                self.saltconc
            )));
        }
        if self.timeout_secs == 0 {
            return Err(UcbError::config("tleap timeout must be positive"));
        }
        for file in self.topo.iter().chain(&self.param) {
            if !file.is_file() {
                return Err(UcbError::config(format!(
                    "File {} does not exist",
                    file.display()
                )));
            }
        }
        Ok(())
    }
}

/// Force-field command files shipped with AmberTools.
pub fn list_files() -> Result<Vec<String>> {
    let amberhome = env::var_os("AMBERHOME")
        .ok_or_else(|| UcbError::config("AMBERHOME environment variable is not defined"))?;
    list_files_in(&Path::new(&amberhome).join("dat").join("leap").join("cmd"))
}

fn list_files_in(dir: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    files.sort();
    Ok(files)
}

/// Builds molecular systems for AMBER through tleap.
pub struct AmberBuilder {
    config: BuildConfig,
    lipids: Option<LipidTable>,
    rng: ChaCha8Rng,
}

impl AmberBuilder {
    pub fn new(config: BuildConfig) -> Result<Self> {
        config.validate()?;
        let lipids = match &config.lipid_table {
            Some(path) => Some(LipidTable::from_path(path)?),
            None => None,
        };
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Ok(Self {
            config,
            lipids,
            rng,
        })
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Builds `mol`. Returns the built system, or `None` on a dry run.
    ///
    /// With ionization on, the system is built once without ions, ions
    /// replace waters according to the prmtop charges, and the ionized
    /// system is built again without caps. The ion-free outputs are kept as
    /// `<prefix>.noions.*`.
    pub fn build(&mut self, mol: &Molecule) -> Result<Option<Molecule>> {
        let outdir = self.config.outdir.clone();
        fs::create_dir_all(&outdir)?;
        clean_outdir(&outdir, &self.config.prefix)?;

        let mut mol = mol.clone();
        mol.fill_missing_segids();
        let caps = match &self.config.caps {
            Some(caps) => caps.clone(),
            None => default_caps(&mol)?,
        };
        let disulfide = self.config.disulfide.clone();
        self.build_pass(mol, &caps, self.config.ionize, disulfide)
    }

    fn build_pass(
        &mut self,
        mut mol: Molecule,
        caps: &CapMap,
        ionize: bool,
        disulfide: Option<Vec<DisulfideBond>>,
    ) -> Result<Option<Molecule>> {
        let outdir = self.config.outdir.clone();
        mol.fill_missing_segids();
        if let Some(table) = &self.lipids {
            log::info!("Converting CHARMM membranes to AMBER");
            mol = table.convert(&mol)?;
        }
        apply_caps(&mut mol, caps)?;

        let bonds = match disulfide {
            Some(bonds) => bonds,
            None => detect_disulfides(&mol),
        };
        // Bonds go in once the ions are placed
        let bond_commands = if ionize {
            Vec::new()
        } else {
            apply_disulfides(&mut mol, &bonds)?
        };

        let script = LeapScript {
            forcefields: self.config.ff.clone(),
            topologies: stage_files(&self.config.topo, &outdir)?,
            parameters: stage_files(&self.config.param, &outdir)?,
            bonds: bond_commands,
            prefix: self.config.prefix.clone(),
        };
        log::info!("Writing PDB file for input to tleap");
        mol.write_pdb(&outdir.join(INPUT_PDB))?;
        script.write(&outdir)?;

        if !self.config.execute {
            log::info!("Dry run, tleap input written to {}", outdir.display());
            return Ok(None);
        }
        let exe = find_tleap(&self.config.tleap)?;
        run_tleap(&exe, &outdir, Duration::from_secs(self.config.timeout_secs))?;
        log::info!("Finished building");
        let built = self.read_built()?;
        if !ionize {
            return Ok(Some(built));
        }

        for ext in ["pdb", "crd", "prmtop"] {
            fs::rename(
                self.output(ext),
                outdir.join(format!("{}.noions.{}", self.config.prefix, ext)),
            )?;
        }
        let n_water = built.water_oxygens().len();
        let plan = plan_ions(
            built.total_charge(),
            n_water,
            self.config.saltconc,
            self.config.saltanion.as_deref(),
            self.config.saltcation.as_deref(),
        )?;
        let ionized = place_ions(&built, &plan, &mut self.rng)?;
        let rebound = rebind_disulfides(&mol, &ionized, &bonds)?;
        self.build_pass(ionized, &CapMap::new(), false, Some(rebound))
    }

    fn output(&self, ext: &str) -> PathBuf {
        self.config
            .outdir
            .join(format!("{}.{}", self.config.prefix, ext))
    }

    /// Reads the built PDB with the prmtop charges attached.
    fn read_built(&self) -> Result<Molecule> {
        let pdb = self.output("pdb");
        let prmtop = self.output("prmtop");
        let empty = |p: &Path| fs::metadata(p).map(|m| m.len() == 0).unwrap_or(true);
        if empty(&pdb) || empty(&prmtop) {
            return Err(UcbError::data(format!(
                "No structure pdb/prmtop file was generated. Check {} for errors in building.",
                self.config.outdir.join(LOG_NAME).display()
            )));
        }

        let mut mol = Molecule::from_pdb_file(&pdb)?;
        let charges = read_charges(&prmtop)?;
        if charges.len() != mol.num_atoms() {
            return Err(UcbError::data(format!(
                "{} has {} atoms but {} has {} charges",
                pdb.display(),
                mol.num_atoms(),
                prmtop.display(),
                charges.len()
            )));
        }
        for (atom, q) in mol.atoms.iter_mut().zip(charges) {
            atom.charge = q;
        }
        mol.fill_missing_segids();
        Ok(mol)
    }
}

/// Copies input files next to the script; returns their names.
fn stage_files(files: &[PathBuf], outdir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::with_capacity(files.len());
    for file in files {
        let name = file
            .file_name()
            .ok_or_else(|| UcbError::config(format!("invalid file name {}", file.display())))?;
        let target = outdir.join(name);
        if fs::canonicalize(file).ok() != fs::canonicalize(&target).ok() {
            fs::copy(file, &target)?;
        }
        names.push(name.to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Removes outputs of earlier builds from `outdir`.
fn clean_outdir(outdir: &Path, prefix: &str) -> Result<()> {
    let stale_prefix = format!("{}.", prefix);
    for entry in fs::read_dir(outdir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&stale_prefix) || name.starts_with("log.") || name.ends_with(".log") {
            log::debug!("Removing stale {}", name);
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BuildConfig::default();
        assert_eq!(config.ff, vec!["leaprc.lipid14", "leaprc.ff14SB", "leaprc.gaff"]);
        assert_eq!(config.prefix, "structure");
        assert!(config.ionize && config.execute);
        assert_eq!(config.timeout_secs, 600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_negative_salt() {
        let config = BuildConfig {
            saltconc: -0.1,
            ..BuildConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(UcbError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_clean_outdir() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["structure.pdb", "structure.noions.prmtop", "log.txt", "tleap.log", "keep.pdb"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        clean_outdir(dir.path(), "structure").unwrap();
        let left: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(left, vec!["keep.pdb".to_string()]);
    }

    #[test]
    fn test_list_files_in() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("leaprc.ff14SB"), "").unwrap();
        fs::write(dir.path().join("leaprc.gaff"), "").unwrap();
        fs::create_dir(dir.path().join("oldff")).unwrap();
        assert_eq!(
            list_files_in(dir.path()).unwrap(),
            vec!["leaprc.ff14SB".to_string(), "leaprc.gaff".to_string()]
        );
    }
}
