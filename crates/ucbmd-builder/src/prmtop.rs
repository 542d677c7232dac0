//! Minimal AMBER prmtop reader: atom charges only.

use std::fs;
use std::path::Path;
use ucbmd_core::{Result, UcbError};

/// prmtop charges are stored multiplied by this factor.
pub const AMBER_CHARGE_SCALE: f64 = 18.2223;

/// Reads the `%FLAG CHARGE` section, in elementary charges.
pub fn read_charges(path: &Path) -> Result<Vec<f64>> {
    let contents = fs::read_to_string(path)?;
    parse_charges(&contents)
        .map_err(|e| UcbError::data(format!("{}: {}", path.display(), e)))
}

pub fn parse_charges(contents: &str) -> std::result::Result<Vec<f64>, String> {
    let mut lines = contents.lines();
    if !lines.any(|l| l.trim_end() == "%FLAG CHARGE") {
        return Err("no CHARGE section".to_string());
    }
    let mut charges = Vec::new();
    for line in lines {
        if line.starts_with("%FLAG") {
            break;
        }
        if line.starts_with("%FORMAT") || line.starts_with("%COMMENT") {
            continue;
        }
        for token in line.split_whitespace() {
            let q: f64 = token
                .parse()
                .map_err(|_| format!("invalid charge value '{}'", token))?;
            charges.push(q / AMBER_CHARGE_SCALE);
        }
    }
    Ok(charges)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_charges() {
        let prmtop = "\
%VERSION  VERSION_STAMP = V0001.000
%FLAG ATOM_NAME
%FORMAT(20a4)
Na+ Cl- O   H1  H2
%FLAG CHARGE
%FORMAT(5E16.8)
  1.82223000E+01 -1.82223000E+01 -1.51973982E+01  7.59869910E+00  7.59869910E+00
%FLAG ATOMIC_NUMBER
%FORMAT(10I8)
      11      17       8       1       1
";
        let q = parse_charges(prmtop).unwrap();
        assert_eq!(q.len(), 5);
        assert!((q[0] - 1.0).abs() < 1e-9);
        assert!((q[1] + 1.0).abs() < 1e-9);
        assert!(q.iter().sum::<f64>().abs() < 1e-6);
    }

    #[test]
    fn test_missing_section() {
        assert!(parse_charges("%FLAG TITLE\n%FORMAT(20a4)\n").is_err());
    }
}
