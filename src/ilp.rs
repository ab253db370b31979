//! Optional external-ILP-solver shell-out (`ilp` feature), used as a
//! validation oracle rather than as part of the core search.
//!
//! Emits an LP-format model equivalent to the B&B engine's objective and
//! constraints, invokes `lp_solve` out of process, and reads its optimum
//! back from the `Value of objective function: ` sentinel line in its
//! stdout -- the same contract the original branch's `IlpAllocator`
//! used for its `LPSOLVE` backend.

use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::process::Command;

use crate::error::IlpError;
use crate::params::AllocatorParams;
use crate::problem::Problem;

const SENTINEL_PREFIX: &str = "Value of objective function: ";

/// Writes an lp_solve-format LP file for `problem` under `params` to
/// `lp_path`. The model: minimize `W_HOSTS * sum(Active_i) + W_MIG *
/// sum(Migr_j)` subject to one-PM-per-VM, active-iff-hosting, per-dimension
/// capacity, and migration-indicator/budget constraints.
pub fn write_lp_file(problem: &Problem, params: &AllocatorParams, lp_path: &Path) -> Result<(), IlpError> {
    let num_vms = problem.vms.len();
    let num_pms = problem.pms.len();
    let weights = params.cost_weights;

    let mut lp = String::new();

    lp.push_str("min: ");
    for i in 0..num_pms {
        if i > 0 {
            lp.push_str(" + ");
        }
        lp.push_str(&format!("{} Active_{}", weights.hosts, i));
    }
    for j in 0..num_vms {
        lp.push_str(&format!(" + {} Migr_{}", weights.migrations, j));
    }
    lp.push_str(";\n\n");

    for j in 0..num_vms {
        for i in 0..num_pms {
            if i > 0 {
                lp.push_str(" + ");
            }
            lp.push_str(&format!("Alloc_{j}_{i}"));
        }
        lp.push_str(" = 1;\n");
    }

    for j in 0..num_vms {
        for i in 0..num_pms {
            lp.push_str(&format!("Alloc_{j}_{i} - Active_{i} <= 0;\n"));
        }
    }

    for d in 0..problem.dimension {
        for i in 0..num_pms {
            lp.push_str(&format!("dim_{d}_PM_{i}: "));
            for j in 0..num_vms {
                if j > 0 {
                    lp.push_str(" + ");
                }
                lp.push_str(&format!("{} Alloc_{j}_{i}", problem.vms[j].demand[d]));
            }
            lp.push_str(&format!(" <= {};\n", problem.pms[i].capacity[d]));
        }
    }

    for (j, vm) in problem.vms.iter().enumerate() {
        let initial = vm.initial.unwrap_or(0);
        lp.push_str(&format!("Alloc_{j}_{initial} + Migr_{j} = 1;\n"));
    }
    for j in 0..num_vms {
        if j > 0 {
            lp.push_str(" + ");
        }
        lp.push_str(&format!("Migr_{j}"));
    }
    let max_migrations = num_pms as i64 / params.max_migrations_ratio;
    lp.push_str(&format!(" <= {max_migrations};\n\n"));

    lp.push_str("bin ");
    for j in 0..num_vms {
        if j > 0 {
            lp.push_str(", ");
        }
        lp.push_str(&format!("Migr_{j}"));
    }
    for i in 0..num_pms {
        lp.push_str(&format!(", Active_{i}"));
    }
    for j in 0..num_vms {
        for i in 0..num_pms {
            lp.push_str(&format!(", Alloc_{j}_{i}"));
        }
    }
    lp.push_str(";\n");

    let mut file = fs::File::create(lp_path).map_err(|source| IlpError::Io {
        path: lp_path.display().to_string(),
        source,
    })?;
    file.write_all(lp.as_bytes()).map_err(|source| IlpError::Io {
        path: lp_path.display().to_string(),
        source,
    })?;
    Ok(())
}

/// Invokes the `lp_solve` binary on `lp_path` with a wall-clock timeout
/// and returns its optimum objective value, read from the sentinel line
/// in its stdout.
pub fn solve_with_lp_solve(lp_path: &Path, timeout_secs: f64) -> Result<f64, IlpError> {
    let output = Command::new("lp_solve")
        .arg("-timeout")
        .arg((timeout_secs.round() as i64).to_string())
        .arg(lp_path)
        .output()
        .map_err(|source| IlpError::Spawn {
            binary: "lp_solve".to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(IlpError::NonZeroExit(output.status));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_sentinel(&stdout)
}

fn parse_sentinel(stdout: &str) -> Result<f64, IlpError> {
    for line in stdout.lines() {
        if let Some(rest) = line.strip_prefix(SENTINEL_PREFIX) {
            return rest.trim().parse().map_err(|_| IlpError::UnparsableObjective(line.to_string()));
        }
    }
    Err(IlpError::MissingSentinel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{Pm, Vm};

    fn sample_problem() -> Problem {
        Problem::new(
            1,
            vec![
                Vm {
                    id: 0,
                    demand: vec![6],
                    initial: Some(0),
                },
                Vm {
                    id: 1,
                    demand: vec![3],
                    initial: Some(1),
                },
            ],
            vec![Pm { id: 0, capacity: vec![10] }, Pm { id: 1, capacity: vec![10] }],
        )
    }

    #[test]
    fn writes_lp_file_with_expected_sections() {
        let dir = std::env::temp_dir().join(format!("vmallocate-ilp-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let lp_path = dir.join("model.lp");
        let problem = sample_problem();
        let params = AllocatorParams::default();
        write_lp_file(&problem, &params, &lp_path).unwrap();
        let text = fs::read_to_string(&lp_path).unwrap();
        assert!(text.starts_with("min: "));
        assert!(text.contains("Alloc_0_0 + Alloc_0_1 = 1;"));
        assert!(text.contains("bin "));
        fs::remove_file(&lp_path).ok();
        fs::remove_dir(&dir).ok();
    }

    #[test]
    fn parses_sentinel_line() {
        let stdout = "\nValue of objective function: 21.00000000\n\nActual values...\n";
        assert_eq!(parse_sentinel(stdout).unwrap(), 21.0);
    }

    #[test]
    fn missing_sentinel_is_an_error() {
        let stdout = "no solution here\n";
        assert!(matches!(parse_sentinel(stdout), Err(IlpError::MissingSentinel)));
    }
}
