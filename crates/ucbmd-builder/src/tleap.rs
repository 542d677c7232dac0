//! tleap script generation and execution.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use ucbmd_core::{Result, UcbError};

pub const SCRIPT_NAME: &str = "tleap.in";
pub const INPUT_PDB: &str = "input.pdb";
pub const LOG_NAME: &str = "log.txt";

/// Ion parameters matching the TIP3P water model, always loaded.
const ION_PARAMS: &str = "frcmod.ionsjc_tip3p";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Everything that goes into one `tleap.in`.
#[derive(Debug, Clone, Default)]
pub struct LeapScript {
    /// leaprc files passed to `source`
    pub forcefields: Vec<String>,
    /// prepi topologies, relative to the output directory
    pub topologies: Vec<String>,
    /// frcmod parameter files, relative to the output directory
    pub parameters: Vec<String>,
    /// Extra commands run right after loading the PDB (disulfide bonds)
    pub bonds: Vec<String>,
    pub prefix: String,
}

impl LeapScript {
    pub fn render(&self) -> String {
        let mut s = String::from("# tleap file generated by ucbmd\n");
        for ff in &self.forcefields {
            s.push_str(&format!("source {}\n", ff));
        }
        s.push_str(&format!("loadamberparams {}\n", ION_PARAMS));
        for topo in &self.topologies {
            s.push_str(&format!("loadamberprep {}\n", topo));
        }
        for param in &self.parameters {
            s.push_str(&format!("loadamberparams {}\n", param));
        }
        s.push_str(&format!("mol = loadpdb {}\n", INPUT_PDB));
        for bond in &self.bonds {
            s.push_str(bond);
            s.push('\n');
        }
        s.push_str(&format!("savepdb mol {}.pdb\n", self.prefix));
        s.push_str(&format!(
            "saveamberparm mol {0}.prmtop {0}.crd\n",
            self.prefix
        ));
        s.push_str("quit\n");
        s
    }

    pub fn write(&self, outdir: &Path) -> Result<PathBuf> {
        let path = outdir.join(SCRIPT_NAME);
        fs::write(&path, self.render())?;
        Ok(path)
    }
}

/// Locates the tleap executable, either a path or a name on `PATH`.
pub fn find_tleap(exe: &str) -> Result<PathBuf> {
    which::which(exe).map_err(|_| {
        UcbError::config(format!(
            "Cannot find tleap executable '{}'. Please install AmberTools or pass its path.",
            exe
        ))
    })
}

/// Runs `tleap -f ./tleap.in` inside `outdir`, output captured in `log.txt`.
///
/// The process is killed once `timeout` elapses.
pub fn run_tleap(exe: &Path, outdir: &Path, timeout: Duration) -> Result<()> {
    let log_path = outdir.join(LOG_NAME);
    let log = File::create(&log_path)?;
    let log_err = log.try_clone()?;

    log::info!("Starting the build with {}", exe.display());
    let mut child = Command::new(exe)
        .current_dir(outdir)
        .arg("-f")
        .arg(format!("./{}", SCRIPT_NAME))
        .stdin(Stdio::null())
        .stdout(log)
        .stderr(log_err)
        .spawn()
        .map_err(|e| {
            UcbError::external_tool("tleap", &log_path, format!("failed to launch: {}", e))
        })?;

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if start.elapsed() >= timeout {
            log::warn!(
                "tleap still running after {}s, killing it",
                timeout.as_secs()
            );
            let _ = child.kill();
            let _ = child.wait();
            return Err(UcbError::timeout(format!(
                "tleap did not finish within {}s (see {})",
                timeout.as_secs(),
                log_path.display()
            )));
        }
        thread::sleep(POLL_INTERVAL);
    };

    if !status.success() {
        return Err(UcbError::external_tool(
            "tleap",
            &log_path,
            format!("exited with {}", status),
        ));
    }
    log::debug!("tleap finished in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}
