//! Results harness: CSV runtime/cost table and line-oriented run log
//! (§4.10, ambient Result record in §3).
//!
//! Column order mirrors the original harness: one time column per
//! parameter set (in configured order), followed by one cost column per
//! parameter set, followed by any ILP reference columns when the `ilp`
//! feature is enabled and solvers were run.

use std::io::{self, Write};

/// One (parameter-set, instance) measurement: wall-clock time and the
/// three cost-function outputs.
#[derive(Debug, Clone, Copy)]
pub struct RunResult {
    pub elapsed_secs: f64,
    pub cost: f64,
    pub active_pms: i64,
    pub migrations: i64,
}

/// Writes the CSV header row: one time column and one cost column per
/// parameter set name, in order, followed by `ilp_column` (the ILP
/// reference-cost column name) when present.
pub fn write_csv_header<W: Write>(out: &mut W, param_set_names: &[String], ilp_column: Option<&str>) -> io::Result<()> {
    let mut cols: Vec<String> = param_set_names.to_vec();
    cols.extend(param_set_names.iter().map(|n| format!("{n}: cost")));
    if let Some(name) = ilp_column {
        cols.push(name.to_string());
    }
    writeln!(out, "{}", cols.join("; "))
}

/// Writes one CSV data row: elapsed times for every parameter set, then
/// costs for every parameter set, then `ilp_cost` (the external solver's
/// reference objective value for this instance) when present, in the
/// same order as the header.
pub fn write_csv_row<W: Write>(out: &mut W, results: &[RunResult], ilp_cost: Option<f64>) -> io::Result<()> {
    let times: Vec<String> = results.iter().map(|r| r.elapsed_secs.to_string()).collect();
    let costs: Vec<String> = results.iter().map(|r| r.cost.to_string()).collect();
    let mut cols = times;
    cols.extend(costs);
    if let Some(cost) = ilp_cost {
        cols.push(cost.to_string());
    }
    writeln!(out, "{}", cols.join("; "))
}

/// Appends one line-oriented log entry recording the result of a single
/// (instance, parameter-set) pair, as written alongside the `Allocator`'s
/// own preprocessing/incumbent log lines.
pub fn log_result<W: Write>(out: &mut W, instance: usize, param_set_name: &str, result: RunResult) -> io::Result<()> {
    writeln!(
        out,
        "instance={} paramSet={} cost={} activePMs={} migrations={} elapsed={:.6}s",
        instance, param_set_name, result.cost, result.active_pms, result.migrations, result.elapsed_secs
    )
}

/// Appends a warning line for a parameter set or solver invocation that
/// failed for one instance, without aborting the rest of the run.
pub fn log_warning<W: Write>(out: &mut W, instance: usize, context: &str, message: &str) -> io::Result<()> {
    writeln!(out, "instance={} WARNING [{}]: {}", instance, context, message)
}
