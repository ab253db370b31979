//! Hand-rolled line-oriented configuration file parser (§4.8).
//!
//! Mirrors the general-parameter / `Allocator{ ... }` block shape of the
//! original config format: general keys configure the problem generator,
//! and each `Allocator{ ... }` block fully specifies one named
//! `AllocatorParams`. Unlike the original, unknown keys and out-of-range
//! values are reported as a typed `ConfigError` instead of `exit(1)`.

use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::generator::GeneratorParams;
use crate::params::{AllocatorParams, CostWeights};
use crate::problem::SortMethod;

/// General (non-allocator) parameters: problem generator shape plus the
/// number of test instances to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneralParams {
    pub num_tests: i64,
    pub dimensions: usize,
    pub vms: usize,
    pub pms: usize,
    pub vm_min: i64,
    pub vm_max: i64,
    pub pm_min: i64,
    pub pm_max: i64,
    pub num_pm_types: usize,
    /// Optional path to a file-based instance (§4.9), used in place of
    /// the random generator for every test iteration when present.
    pub instance_file: Option<String>,
}

impl GeneralParams {
    /// Converts to the shape `ProblemGenerator` expects.
    pub fn to_generator_params(self) -> GeneratorParams {
        GeneratorParams {
            dimension: self.dimensions,
            num_vms: self.vms,
            num_pms: self.pms,
            min_res_demand: self.vm_min,
            max_res_demand: self.vm_max,
            min_res_supply: self.pm_min,
            max_res_supply: self.pm_max,
            num_pm_types: self.num_pm_types,
        }
    }
}

/// A fully parsed configuration: the generator shape plus every named
/// `Allocator{ ... }` parameter set, in file order.
#[derive(Debug, Clone)]
pub struct Config {
    pub general: GeneralParams,
    pub param_sets: Vec<AllocatorParams>,
}

/// Parses a config file from `path`.
pub fn parse_config_file(path: &Path) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&text)
}

/// Parses a config file already read into a string (used directly by
/// tests, and internally by `parse_config_file`).
pub fn parse_config(text: &str) -> Result<Config, ConfigError> {
    let mut general = PartialGeneral::default();
    let mut param_sets = Vec::new();

    let mut lines = text.lines().peekable();
    while let Some(line) = lines.next() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "Allocator{" {
            param_sets.push(parse_allocator_block(&mut lines)?);
            continue;
        }
        let (key, value) = split_key_value(trimmed)?;
        general.set(key, value)?;
    }

    if param_sets.is_empty() {
        return Err(ConfigError::NoParamSets);
    }

    Ok(Config {
        general: general.finish()?,
        param_sets,
    })
}

fn split_key_value(line: &str) -> Result<(&str, &str), ConfigError> {
    let mut parts = line.splitn(2, '=');
    let key = parts.next().unwrap_or("").trim();
    let value = parts.next().map(str::trim).ok_or_else(|| ConfigError::UnknownGeneralKey(line.to_string()))?;
    Ok((key, value))
}

fn parse_allocator_block<'a>(lines: &mut std::iter::Peekable<std::str::Lines<'a>>) -> Result<AllocatorParams, ConfigError> {
    let mut block = PartialAllocator::default();
    loop {
        let line = lines.next().ok_or(ConfigError::UnterminatedBlock)?;
        let trimmed = line.trim();
        if trimmed == "}" {
            break;
        }
        if trimmed.is_empty() {
            continue;
        }
        let (key, value) = split_key_value(trimmed)?;
        block.set(key, value)?;
    }
    let params = block.finish()?;
    params.validate()?;
    Ok(params)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_int(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidInt {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_float(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidFloat {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_sort_method(key: &str, value: &str) -> Result<SortMethod, ConfigError> {
    SortMethod::from_str(value).ok_or_else(|| ConfigError::InvalidSortMethod {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Default)]
struct PartialGeneral {
    num_tests: Option<i64>,
    dimensions: Option<usize>,
    vms: Option<usize>,
    pms: Option<usize>,
    vm_min: Option<i64>,
    vm_max: Option<i64>,
    pm_min: Option<i64>,
    pm_max: Option<i64>,
    num_pm_types: Option<usize>,
    instance_file: Option<String>,
}

impl PartialGeneral {
    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "numTests" => self.num_tests = Some(parse_int(key, value)?),
            "dimensions" => self.dimensions = Some(parse_int(key, value)? as usize),
            "VMs" => self.vms = Some(parse_int(key, value)? as usize),
            "PMs" => self.pms = Some(parse_int(key, value)? as usize),
            "VMmin" => self.vm_min = Some(parse_int(key, value)?),
            "VMmax" => self.vm_max = Some(parse_int(key, value)?),
            "PMmin" => self.pm_min = Some(parse_int(key, value)?),
            "PMmax" => self.pm_max = Some(parse_int(key, value)?),
            "numPMtypes" => self.num_pm_types = Some(parse_int(key, value)? as usize),
            "instanceFile" => self.instance_file = Some(value.to_string()),
            other => return Err(ConfigError::UnknownGeneralKey(other.to_string())),
        }
        Ok(())
    }

    fn finish(self) -> Result<GeneralParams, ConfigError> {
        Ok(GeneralParams {
            num_tests: self.num_tests.ok_or(ConfigError::MissingGeneralKey("numTests"))?,
            dimensions: self.dimensions.ok_or(ConfigError::MissingGeneralKey("dimensions"))?,
            vms: self.vms.ok_or(ConfigError::MissingGeneralKey("VMs"))?,
            pms: self.pms.ok_or(ConfigError::MissingGeneralKey("PMs"))?,
            vm_min: self.vm_min.ok_or(ConfigError::MissingGeneralKey("VMmin"))?,
            vm_max: self.vm_max.ok_or(ConfigError::MissingGeneralKey("VMmax"))?,
            pm_min: self.pm_min.ok_or(ConfigError::MissingGeneralKey("PMmin"))?,
            pm_max: self.pm_max.ok_or(ConfigError::MissingGeneralKey("PMmax"))?,
            num_pm_types: self.num_pm_types.ok_or(ConfigError::MissingGeneralKey("numPMtypes"))?,
            instance_file: self.instance_file,
        })
    }
}

#[derive(Default)]
struct PartialAllocator {
    name: Option<String>,
    fail_first: Option<bool>,
    vm_sort_method: Option<SortMethod>,
    pm_sort_method: Option<SortMethod>,
    initial_pm_first: Option<bool>,
    symmetry_breaking: Option<bool>,
    intelligent_bound: Option<bool>,
    bound_threshold: Option<f64>,
    max_migrations_ratio: Option<i64>,
    timeout_secs: Option<f64>,
    cost_weight_hosts: Option<i64>,
    cost_weight_migrations: Option<i64>,
}

impl PartialAllocator {
    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "name" => self.name = Some(value.to_string()),
            "failFirst" => self.fail_first = Some(parse_bool(key, value)?),
            "VMSortMethod" | "vmSortMethod" => self.vm_sort_method = Some(parse_sort_method(key, value)?),
            "PMSortMethod" | "pmSortMethod" => self.pm_sort_method = Some(parse_sort_method(key, value)?),
            "initialPMFirst" | "initialPmFirst" => self.initial_pm_first = Some(parse_bool(key, value)?),
            "symmetryBreaking" => self.symmetry_breaking = Some(parse_bool(key, value)?),
            "intelligentBound" => self.intelligent_bound = Some(parse_bool(key, value)?),
            "boundThreshold" => self.bound_threshold = Some(parse_float(key, value)?),
            "maxMigrationsRatio" => self.max_migrations_ratio = Some(parse_int(key, value)?),
            "timeout" => self.timeout_secs = Some(parse_float(key, value)?),
            "costWeightHosts" => self.cost_weight_hosts = Some(parse_int(key, value)?),
            "costWeightMigrations" => self.cost_weight_migrations = Some(parse_int(key, value)?),
            other => return Err(ConfigError::UnknownAllocatorKey(other.to_string())),
        }
        Ok(())
    }

    fn finish(self) -> Result<AllocatorParams, ConfigError> {
        let defaults = AllocatorParams::default();
        let weights = CostWeights {
            hosts: self.cost_weight_hosts.unwrap_or(defaults.cost_weights.hosts),
            migrations: self.cost_weight_migrations.unwrap_or(defaults.cost_weights.migrations),
        };
        Ok(AllocatorParams {
            name: self.name.unwrap_or(defaults.name),
            fail_first: self.fail_first.unwrap_or(defaults.fail_first),
            vm_sort_method: self.vm_sort_method.unwrap_or(defaults.vm_sort_method),
            pm_sort_method: self.pm_sort_method.unwrap_or(defaults.pm_sort_method),
            initial_pm_first: self.initial_pm_first.unwrap_or(defaults.initial_pm_first),
            symmetry_breaking: self.symmetry_breaking.unwrap_or(defaults.symmetry_breaking),
            intelligent_bound: self.intelligent_bound.unwrap_or(defaults.intelligent_bound),
            bound_threshold: self.bound_threshold.unwrap_or(defaults.bound_threshold),
            max_migrations_ratio: self.max_migrations_ratio.unwrap_or(defaults.max_migrations_ratio),
            timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
            cost_weights: weights,
        })
    }
}
