//! Command-line front end for the B&B placement optimizer (§4.10).
//!
//! `run` loads a config file, runs every configured instance against every
//! configured parameter set, and writes a CSV runtime/cost table plus a
//! line-oriented log. `solve` runs a single instance against a single
//! named parameter set and prints the result to stdout, for scripting and
//! end-to-end checks.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use vmallocate::allocator::Allocator;
use vmallocate::config::{parse_config_file, Config};
use vmallocate::generator::ProblemGenerator;
use vmallocate::params::AllocatorParams;
use vmallocate::problem::Problem;
use vmallocate::report::{self, RunResult};

/// CSV column name for the external-solver reference cost (§4.10),
/// present only when built with the `ilp` feature.
const ILP_COLUMN: &str = "lpsolve: cost";

#[derive(Parser)]
#[command(name = "vmallocate", about = "Exact branch-and-bound VM-to-PM placement optimizer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configured instance against every configured parameter
    /// set, writing a CSV table and a log file.
    Run {
        /// Path to the config file (§4.8).
        #[arg(long)]
        config: PathBuf,
        /// Directory to write the CSV table and log into (created if
        /// missing). Defaults to the current directory.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Seed the problem generator for reproducible instances.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Solve a single instance file against one named parameter set from
    /// a config file, printing the result to stdout.
    Solve {
        /// Path to the config file (§4.8), used only to look up the
        /// named parameter set.
        #[arg(long)]
        config: PathBuf,
        /// Name of the `Allocator{ ... }` block to use.
        #[arg(long)]
        param_set: String,
        /// Path to a plain-text instance file (§4.9).
        #[arg(long)]
        instance: PathBuf,
        /// Resource dimensionality of the instance file.
        #[arg(long)]
        dimensions: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config, out_dir, seed } => run(&config, &out_dir, seed),
        Commands::Solve {
            config,
            param_set,
            instance,
            dimensions,
        } => solve(&config, &param_set, &instance, dimensions),
    }
}

fn run(config_path: &Path, out_dir: &Path, seed: Option<u64>) -> Result<()> {
    let config = parse_config_file(config_path).with_context(|| format!("loading config '{}'", config_path.display()))?;

    std::fs::create_dir_all(out_dir).with_context(|| format!("creating output directory '{}'", out_dir.display()))?;
    let mut csv_file = File::create(out_dir.join("runtimes.csv")).context("creating runtimes.csv")?;
    let mut log_file = File::create(out_dir.join("log.txt")).context("creating log.txt")?;

    let names: Vec<String> = config.param_sets.iter().map(|p| p.name.clone()).collect();
    let ilp_column = if cfg!(feature = "ilp") { Some(ILP_COLUMN) } else { None };
    report::write_csv_header(&mut csv_file, &names, ilp_column)?;

    let mut generator = build_generator(&config, seed);

    println!(
        "Running {} test(s) with {} parameter setups each...",
        config.general.num_tests,
        config.param_sets.len()
    );

    for instance_idx in 0..config.general.num_tests {
        let problem = next_instance(&config, &mut generator)?;
        writeln!(log_file, "Instance {}:", instance_idx)?;

        let mut results = Vec::with_capacity(config.param_sets.len());
        for params in &config.param_sets {
            print!("\t{}...", params.name);
            io::stdout().flush().ok();

            let start = Instant::now();
            let mut allocator = Allocator::new(problem.clone(), params.clone(), &mut log_file)
                .with_context(|| format!("invalid parameter set '{}'", params.name))?;
            allocator.solve();
            let elapsed = start.elapsed().as_secs_f64();

            let result = RunResult {
                elapsed_secs: elapsed,
                cost: allocator.best_cost(),
                active_pms: allocator.best_active_pms().unwrap_or(0),
                migrations: allocator.best_migrations().unwrap_or(0),
            };
            report::log_result(&mut log_file, instance_idx as usize, &params.name, result)?;
            results.push(result);
            println!(" done");
        }

        let ilp_cost = ilp_reference_cost(&problem, &config.param_sets[0], out_dir, instance_idx as usize, &mut log_file);
        report::write_csv_row(&mut csv_file, &results, ilp_cost)?;
    }

    println!("(Finished.)");
    Ok(())
}

fn build_generator(config: &Config, seed: Option<u64>) -> ProblemGenerator {
    let gen_params = config.general.to_generator_params();
    match seed {
        Some(s) => ProblemGenerator::with_seed(gen_params, s),
        None => ProblemGenerator::new(gen_params),
    }
}

fn next_instance(config: &Config, generator: &mut ProblemGenerator) -> Result<Problem> {
    match &config.general.instance_file {
        Some(path) => ProblemGenerator::load_from_file(config.general.dimensions, std::path::Path::new(path))
            .with_context(|| format!("loading instance file '{path}'")),
        None => Ok(generator.generate()),
    }
}

/// Cross-checks `instance_idx` against the external LP solver, writing its
/// LP model alongside the run's output and returning its reported optimum
/// (§4.10). Any failure (solver missing, non-zero exit, unparsable output)
/// is logged as a warning and reported as `NaN` rather than aborting the
/// rest of the run. Returns `None` when the crate was built without the
/// `ilp` feature, in which case no reference column is emitted at all.
#[cfg(feature = "ilp")]
fn ilp_reference_cost(problem: &Problem, params: &AllocatorParams, out_dir: &Path, instance_idx: usize, log_file: &mut File) -> Option<f64> {
    let lp_path = out_dir.join(format!("instance_{instance_idx}.lp"));
    if let Err(e) = vmallocate::ilp::write_lp_file(problem, params, &lp_path) {
        let _ = report::log_warning(log_file, instance_idx, "ilp", &e.to_string());
        return Some(f64::NAN);
    }
    match vmallocate::ilp::solve_with_lp_solve(&lp_path, params.timeout_secs) {
        Ok(cost) => Some(cost),
        Err(e) => {
            let _ = report::log_warning(log_file, instance_idx, "ilp", &e.to_string());
            Some(f64::NAN)
        }
    }
}

#[cfg(not(feature = "ilp"))]
fn ilp_reference_cost(_problem: &Problem, _params: &AllocatorParams, _out_dir: &Path, _instance_idx: usize, _log_file: &mut File) -> Option<f64> {
    None
}

fn solve(config_path: &Path, param_set_name: &str, instance_path: &Path, dimensions: usize) -> Result<()> {
    let config = parse_config_file(config_path).with_context(|| format!("loading config '{}'", config_path.display()))?;

    let params: AllocatorParams = config
        .param_sets
        .iter()
        .find(|p| p.name == param_set_name)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("no parameter set named '{param_set_name}' in config"))?;

    let problem =
        ProblemGenerator::load_from_file(dimensions, instance_path).with_context(|| format!("loading instance '{}'", instance_path.display()))?;

    let mut log = io::stderr();
    let mut allocator = Allocator::new(problem, params, &mut log)?;
    allocator.solve();

    let cost = allocator.best_cost();
    if !cost.is_finite() {
        println!("no allocation found within timeout");
        bail!("no solution found");
    }

    println!("cost={} activePMs={} migrations={}", cost, allocator.best_active_pms().unwrap(), allocator.best_migrations().unwrap());
    if let Some(allocation) = allocator.best_allocation() {
        let mut vm_ids: Vec<&usize> = allocation.keys().collect();
        vm_ids.sort();
        for vm_id in vm_ids {
            println!("vm {} -> pm {}", vm_id, allocation[vm_id]);
        }
    }
    Ok(())
}
