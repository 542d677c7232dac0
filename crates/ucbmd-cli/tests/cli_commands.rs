//! Runs the `ucbmd` binary on files in temporary directories.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use ucbmd_builder::{Atom, Molecule};

fn ucbmd(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ucbmd"))
        .args(args)
        .env_remove("AMBERHOME")
        .output()
        .expect("failed to run ucbmd")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "ucbmd failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

const CONFIG: &str = r#"
temperature = 300.0
exploration = 0.5
reward_mode = "frames"
reward_method = "max"
nmax = 3
seed = 42
"#;

/// Three trajectories over two states with stationary probabilities 0.3 / 0.7.
const SNAPSHOT: &str = r#"{
    "epoch": 0,
    "running": 2,
    "n_states": 2,
    "trajectories": [
        {"sim": {"id": 0}, "labels": [0, 0, 1], "statdist": [0.3, 0.3, 0.7]},
        {"sim": {"id": 1}, "labels": [1, 1], "statdist": [0.7, 0.7]},
        {"sim": {"id": 2}, "labels": [0, 1, 1, 0], "statdist": [0.3, 0.7, 0.7, 0.3]}
    ]
}"#;

fn write_inputs(dir: &Path) {
    fs::write(dir.join("adaptive.toml"), CONFIG).unwrap();
    fs::write(dir.join("snapshot.json"), SNAPSHOT).unwrap();
}

#[test]
fn test_select_writes_plan() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let plan_path = dir.path().join("plan.json");

    let output = ucbmd(&[
        "select",
        "--config",
        dir.path().join("adaptive.toml").to_str().unwrap(),
        "--snapshot",
        dir.path().join("snapshot.json").to_str().unwrap(),
        "--out",
        plan_path.to_str().unwrap(),
    ]);
    assert_success(&output);

    let plan: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&plan_path).unwrap()).unwrap();
    assert_eq!(plan["epoch"], 0);
    assert_eq!(plan["allocation"], serde_json::json!([0, 1]));
    assert_eq!(plan["n_values"], serde_json::json!([4, 5]));
    let frames = plan["frames"].as_array().unwrap();
    assert_eq!(frames.len(), 1);
    let spawned = (
        frames[0]["sim_id"].as_u64().unwrap(),
        frames[0]["frame"].as_u64().unwrap(),
    );
    assert!([(0, 2), (1, 0), (1, 1), (2, 1), (2, 2)].contains(&spawned));
}

#[test]
fn test_select_rejects_unknown_mode() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    fs::write(dir.path().join("adaptive.toml"), "reward_mode = \"sideways\"\n").unwrap();

    let output = ucbmd(&[
        "select",
        "--config",
        dir.path().join("adaptive.toml").to_str().unwrap(),
        "--snapshot",
        dir.path().join("snapshot.json").to_str().unwrap(),
    ]);
    assert!(!output.status.success());
}

#[test]
fn test_build_dry_run() {
    let dir = tempfile::tempdir().unwrap();
    let pdb = dir.path().join("in.pdb");
    let atoms: Vec<Atom> = [
        ("N", 3),
        ("H1", 3),
        ("H2", 3),
        ("H3", 3),
        ("CA", 3),
        ("SG", 3),
        ("CA", 8),
        ("SG", 8),
        ("C", 8),
        ("O", 8),
        ("OXT", 8),
    ]
    .iter()
    .enumerate()
    .map(|(i, (name, resid))| Atom::new(name, "CYS", *resid, "P", [i as f64, 0.0, 0.0]))
    .collect();
    Molecule::new(atoms).write_pdb(&pdb).unwrap();
    let outdir = dir.path().join("build");

    let output = ucbmd(&[
        "build",
        "--pdb",
        pdb.to_str().unwrap(),
        "--outdir",
        outdir.to_str().unwrap(),
        "--caps",
        "P=ACE,NME",
        "--no-ionize",
        "--ff",
        "leaprc.ff14SB",
        "--disulfide",
        "P:3-P:8",
        "--dry-run",
    ])
    .status;
    assert!(output.success());

    let script = fs::read_to_string(outdir.join("tleap.in")).unwrap();
    assert!(script.contains("source leaprc.ff14SB\n"));
    assert!(!script.contains("leaprc.gaff"));
    // ACE takes position 1
    assert!(script.contains("bond mol.2.SG mol.3.SG\n"));
}

#[test]
fn test_build_reports_missing_cap_atoms() {
    let dir = tempfile::tempdir().unwrap();
    let pdb = dir.path().join("in.pdb");
    Molecule::new(vec![Atom::new("CA", "ALA", 1, "P", [0.0; 3])])
        .write_pdb(&pdb)
        .unwrap();

    let output = ucbmd(&[
        "build",
        "--pdb",
        pdb.to_str().unwrap(),
        "--outdir",
        dir.path().join("build").to_str().unwrap(),
        "--dry-run",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Cannot cap"));
}

#[test]
fn test_list_ff_needs_amberhome() {
    let output = ucbmd(&["list-ff"]);
    assert!(!output.status.success());

    let home = tempfile::tempdir().unwrap();
    let cmd = home.path().join("dat").join("leap").join("cmd");
    fs::create_dir_all(&cmd).unwrap();
    fs::write(cmd.join("leaprc.water.tip3p"), "").unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_ucbmd"))
        .arg("list-ff")
        .env("AMBERHOME", home.path())
        .output()
        .unwrap();
    assert_success(&output);
    assert_eq!(String::from_utf8_lossy(&output.stdout), "leaprc.water.tip3p\n");
}
