//! ucbmd CLI entry point.
//!
//! - `select`: UCB respawn decision on a clustered epoch snapshot
//! - `build`: AMBER system preparation with tleap
//! - `list-ff`: force-field files available to tleap

mod snapshot;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fs;
use std::path::PathBuf;
use ucbmd_adaptive::{AdaptiveConfig, ArtifactStore, DecisionInput, DecisionPass, LogFramesHeuristic};
use ucbmd_builder::{AmberBuilder, BuildConfig, CapMap, Caps, DisulfideBond, Molecule};

use crate::snapshot::EpochSnapshot;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "ucbmd")]
#[command(version = VERSION)]
#[command(about = "UCB adaptive sampling and AMBER system building for MD campaigns", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Choose the states to respawn from an epoch snapshot
    Select {
        /// Adaptive configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Clustered epoch snapshot (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Spawn plan output (JSON); printed to stdout when omitted
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Build a system for AMBER with tleap
    Build(BuildArgs),

    /// List the force-field files under $AMBERHOME/dat/leap/cmd
    ListFf,
}

#[derive(clap::Args, Debug)]
struct BuildArgs {
    /// Input structure (PDB)
    #[arg(long)]
    pdb: PathBuf,

    /// Force-field command files
    ///
    /// Example: --ff leaprc.ff14SB --ff leaprc.gaff
    #[arg(long)]
    ff: Vec<String>,

    /// prepi topology files
    #[arg(long)]
    topo: Vec<PathBuf>,

    /// frcmod parameter files
    #[arg(long)]
    param: Vec<PathBuf>,

    #[arg(long, default_value = "structure")]
    prefix: String,

    #[arg(long, default_value = "./")]
    outdir: PathBuf,

    /// Segment caps as SEG=NTERM,CTERM; ACE/NME on protein segments when omitted
    ///
    /// Example: --caps P=ACE,NME
    #[arg(long)]
    caps: Vec<String>,

    /// Skip neutralisation and salt
    #[arg(long)]
    no_ionize: bool,

    /// Salt concentration (mol/L)
    #[arg(long, default_value_t = 0.0)]
    saltconc: f64,

    #[arg(long)]
    saltanion: Option<String>,

    #[arg(long)]
    saltcation: Option<String>,

    /// Disulfide bonds as SEG:RESID-SEG:RESID; detected when omitted
    #[arg(long)]
    disulfide: Vec<DisulfideBond>,

    /// CHARMM→AMBER lipid conversion table (CSV)
    #[arg(long)]
    lipid_table: Option<PathBuf>,

    /// tleap executable
    #[arg(long, default_value = "tleap")]
    tleap: String,

    /// Write tleap.in and input.pdb without running tleap
    #[arg(long)]
    dry_run: bool,

    #[arg(long, default_value_t = 600)]
    timeout_secs: u64,

    /// Seed for ion placement
    #[arg(long)]
    seed: Option<u64>,
}

fn parse_caps(specs: &[String]) -> Result<Option<CapMap>> {
    if specs.is_empty() {
        return Ok(None);
    }
    let mut caps = CapMap::new();
    for entry in specs {
        let Some((seg, pair)) = entry.split_once('=') else {
            bail!("invalid cap '{}', expected SEG=NTERM,CTERM", entry);
        };
        let Some((nterm, cterm)) = pair.split_once(',') else {
            bail!("invalid cap '{}', expected SEG=NTERM,CTERM", entry);
        };
        caps.insert(seg.trim().to_string(), Caps::new(nterm.trim(), cterm.trim()));
    }
    Ok(Some(caps))
}

impl BuildArgs {
    fn into_config(self) -> Result<BuildConfig> {
        let defaults = BuildConfig::default();
        Ok(BuildConfig {
            ff: if self.ff.is_empty() { defaults.ff } else { self.ff },
            topo: self.topo,
            param: self.param,
            prefix: self.prefix,
            outdir: self.outdir,
            caps: parse_caps(&self.caps)?,
            ionize: !self.no_ionize,
            saltconc: self.saltconc,
            saltanion: self.saltanion,
            saltcation: self.saltcation,
            disulfide: if self.disulfide.is_empty() {
                None
            } else {
                Some(self.disulfide)
            },
            tleap: self.tleap,
            execute: !self.dry_run,
            timeout_secs: self.timeout_secs,
            lipid_table: self.lipid_table,
            seed: self.seed,
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Select {
            config,
            snapshot,
            out,
        } => run_select(&config, &snapshot, out.as_deref()),
        Commands::Build(args) => run_build(args),
        Commands::ListFf => {
            for file in ucbmd_builder::list_files()? {
                println!("{}", file);
            }
            Ok(())
        }
    }
}

fn run_select(
    config_path: &std::path::Path,
    snapshot_path: &std::path::Path,
    out: Option<&std::path::Path>,
) -> Result<()> {
    let config = AdaptiveConfig::from_file(config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    let snapshot = EpochSnapshot::from_file(snapshot_path)?;
    let data_q = snapshot.dataset(config.skip)?;
    let statdist = snapshot.statdist();
    let goal = snapshot.goal();
    if config.pucb && goal.is_none() {
        bail!("PUCB needs goal values in the snapshot");
    }

    let mut rng = match config.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    let heuristic = LogFramesHeuristic;
    let store = ArtifactStore::new(&config.output_dir, snapshot.epoch);
    let n_launch = config.nmax.saturating_sub(snapshot.running);
    log::info!(
        "Epoch {}: {} frames in {} states, launching {}",
        snapshot.epoch,
        data_q.num_frames(),
        snapshot.n_states,
        n_launch
    );

    let decision = DecisionPass::new(&config, &heuristic)
        .with_artifacts(&store)
        .run(
            DecisionInput {
                epoch: snapshot.epoch,
                n_launch,
                data_q: &data_q,
                statdist: &statdist,
                goal: goal.as_deref(),
            },
            &mut rng,
        )?;
    let plan = decision.into_plan(snapshot.epoch, &data_q)?;

    let json = serde_json::to_string_pretty(&plan)?;
    match out {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("Failed to write plan {}", path.display()))?;
            log::info!("Spawn plan written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn run_build(args: BuildArgs) -> Result<()> {
    let pdb = args.pdb.clone();
    let mol = Molecule::from_pdb_file(&pdb)
        .with_context(|| format!("Failed to read {}", pdb.display()))?;
    let config = args.into_config()?;
    let outdir = config.outdir.clone();

    let mut builder = AmberBuilder::new(config)?;
    match builder.build(&mol).map_err(|e| anyhow::anyhow!(e.user_message()))? {
        Some(built) => log::info!(
            "Built {} atoms in {}",
            built.num_atoms(),
            outdir.display()
        ),
        None => log::info!("tleap input written to {}", outdir.display()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_caps() {
        let caps = parse_caps(&["P=ACE,NHE".to_string()]).unwrap().unwrap();
        assert_eq!(caps["P"], Caps::new("ACE", "NHE"));
        assert!(parse_caps(&[]).unwrap().is_none());
        assert!(parse_caps(&["P:ACE".to_string()]).is_err());
    }

    #[test]
    fn test_build_args() {
        let cli = Cli::try_parse_from([
            "ucbmd",
            "build",
            "--pdb",
            "in.pdb",
            "--no-ionize",
            "--disulfide",
            "P:2-P:9",
            "--dry-run",
        ])
        .unwrap();
        let Commands::Build(args) = cli.command else {
            panic!("expected build");
        };
        let config = args.into_config().unwrap();
        assert!(!config.ionize && !config.execute);
        assert_eq!(config.ff, BuildConfig::default().ff);
        assert_eq!(config.disulfide.unwrap()[0].to_string(), "P:2-P:9");
    }
}
