//! Synthetic problem generator (§4.9) and plain-text instance loader.
//!
//! Mirrors the original generator's approach: a small number of PM "types"
//! (capacity vectors) stand in for a limited set of real-world hardware
//! SKUs, every PM is a copy of a randomly chosen type, and every VM gets a
//! uniformly random demand vector and a uniformly random initial PM.

use std::fs;
use std::path::Path;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::InstanceError;
use crate::problem::{Pm, Problem, Vm};

/// Parameters for synthetic instance generation.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorParams {
    pub dimension: usize,
    pub num_vms: usize,
    pub num_pms: usize,
    pub min_res_demand: i64,
    pub max_res_demand: i64,
    pub min_res_supply: i64,
    pub max_res_supply: i64,
    pub num_pm_types: usize,
}

/// Builds random `Problem` instances from a fixed set of PM "types", or
/// loads a single instance from a plain-text file.
pub struct ProblemGenerator {
    params: GeneratorParams,
    rng: SmallRng,
}

impl ProblemGenerator {
    /// Builds a generator seeded from the OS entropy source -- successive
    /// calls to `generate` produce different instances.
    pub fn new(params: GeneratorParams) -> Self {
        ProblemGenerator {
            params,
            rng: SmallRng::from_entropy(),
        }
    }

    /// Builds a generator with a fixed seed, for reproducible test
    /// instances.
    pub fn with_seed(params: GeneratorParams, seed: u64) -> Self {
        ProblemGenerator {
            params,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Generates one random problem instance per the configured
    /// parameters (§4.9).
    pub fn generate(&mut self) -> Problem {
        let p = self.params;

        let vms = (0..p.num_vms)
            .map(|i| Vm {
                id: i,
                demand: (0..p.dimension)
                    .map(|_| self.rng.gen_range(p.min_res_demand..=p.max_res_demand))
                    .collect(),
                initial: Some(self.rng.gen_range(0..p.num_pms)),
            })
            .collect();

        let pm_types: Vec<Vec<i64>> = (0..p.num_pm_types)
            .map(|_| {
                (0..p.dimension)
                    .map(|_| self.rng.gen_range(p.min_res_supply..=p.max_res_supply))
                    .collect()
            })
            .collect();

        let pms = (0..p.num_pms)
            .map(|i| {
                let type_idx = self.rng.gen_range(0..p.num_pm_types);
                Pm {
                    id: i,
                    capacity: pm_types[type_idx].clone(),
                }
            })
            .collect();

        Problem::new(p.dimension, vms, pms)
    }

    /// Loads one instance from `path`: a header line `<numVMs> <numPMs>`,
    /// then `numVMs` lines of `<demand...> <initialPM>`, then `numPMs`
    /// lines of `<capacity...>` (§4.9).
    pub fn load_from_file(dimension: usize, path: &Path) -> Result<Problem, InstanceError> {
        let text = fs::read_to_string(path).map_err(|source| InstanceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse_instance(dimension, &text)
    }

    fn parse_instance(dimension: usize, text: &str) -> Result<Problem, InstanceError> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());

        let header = lines.next().ok_or(InstanceError::MissingHeader)?;
        let mut header_fields = header.split_whitespace();
        let num_vms: usize = header_fields
            .next()
            .ok_or_else(|| InstanceError::MalformedHeader(header.to_string()))?
            .parse()
            .map_err(|_| InstanceError::MalformedHeader(header.to_string()))?;
        let num_pms: usize = header_fields
            .next()
            .ok_or_else(|| InstanceError::MalformedHeader(header.to_string()))?
            .parse()
            .map_err(|_| InstanceError::MalformedHeader(header.to_string()))?;
        if header_fields.next().is_some() {
            return Err(InstanceError::MalformedHeader(header.to_string()));
        }

        let mut vms = Vec::with_capacity(num_vms);
        for i in 0..num_vms {
            let line = lines.next().ok_or(InstanceError::WrongVmCount {
                expected: num_vms,
                found: i,
            })?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != dimension + 1 {
                return Err(InstanceError::WrongVmFieldCount {
                    line: i,
                    expected: dimension + 1,
                    found: fields.len(),
                });
            }
            let demand = fields[..dimension]
                .iter()
                .map(|f| parse_i64(f))
                .collect::<Result<Vec<i64>, InstanceError>>()?;
            let initial = parse_i64(fields[dimension])? as usize;
            vms.push(Vm {
                id: i,
                demand,
                initial: Some(initial),
            });
        }

        let mut pms = Vec::with_capacity(num_pms);
        for i in 0..num_pms {
            let line = lines.next().ok_or(InstanceError::WrongPmCount {
                expected: num_pms,
                found: i,
            })?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != dimension {
                return Err(InstanceError::WrongPmFieldCount {
                    line: i,
                    expected: dimension,
                    found: fields.len(),
                });
            }
            let capacity = fields.iter().map(|f| parse_i64(f)).collect::<Result<Vec<i64>, InstanceError>>()?;
            pms.push(Pm { id: i, capacity });
        }

        Ok(Problem::new(dimension, vms, pms))
    }
}

fn parse_i64(field: &str) -> Result<i64, InstanceError> {
    field.parse().map_err(|_| InstanceError::NonNumericField(field.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> GeneratorParams {
        GeneratorParams {
            dimension: 2,
            num_vms: 20,
            num_pms: 5,
            min_res_demand: 1,
            max_res_demand: 4,
            min_res_supply: 10,
            max_res_supply: 20,
            num_pm_types: 3,
        }
    }

    #[test]
    fn generated_instance_has_configured_shape() {
        let mut gen = ProblemGenerator::with_seed(params(), 42);
        let problem = gen.generate();
        assert_eq!(problem.vms.len(), 20);
        assert_eq!(problem.pms.len(), 5);
        for vm in &problem.vms {
            assert_eq!(vm.demand.len(), 2);
            assert!(vm.demand.iter().all(|&d| (1..=4).contains(&d)));
            assert!(vm.initial.unwrap() < 5);
        }
        for pm in &problem.pms {
            assert_eq!(pm.capacity.len(), 2);
            assert!(pm.capacity.iter().all(|&c| (10..=20).contains(&c)));
        }
    }

    #[test]
    fn same_seed_is_reproducible() {
        let mut a = ProblemGenerator::with_seed(params(), 7);
        let mut b = ProblemGenerator::with_seed(params(), 7);
        let pa = a.generate();
        let pb = b.generate();
        let demands_a: Vec<_> = pa.vms.iter().map(|v| v.demand.clone()).collect();
        let demands_b: Vec<_> = pb.vms.iter().map(|v| v.demand.clone()).collect();
        assert_eq!(demands_a, demands_b);
    }

    #[test]
    fn parses_plain_text_instance() {
        let text = "2 1\n3 4 0\n1 1 0\n10 10\n";
        let problem = ProblemGenerator::parse_instance(2, text).unwrap();
        assert_eq!(problem.vms.len(), 2);
        assert_eq!(problem.pms.len(), 1);
        assert_eq!(problem.vms[0].demand, vec![3, 4]);
        assert_eq!(problem.vms[0].initial, Some(0));
        assert_eq!(problem.pms[0].capacity, vec![10, 10]);
    }

    #[test]
    fn rejects_malformed_header() {
        let err = ProblemGenerator::parse_instance(1, "not a header\n").unwrap_err();
        assert!(matches!(err, InstanceError::MalformedHeader(_)));
    }

    #[test]
    fn rejects_wrong_vm_field_count() {
        let text = "1 1\n3 0\n10\n";
        let err = ProblemGenerator::parse_instance(2, text).unwrap_err();
        assert!(matches!(err, InstanceError::WrongVmFieldCount { .. }));
    }

    #[test]
    fn rejects_non_numeric_field() {
        let text = "1 1\nthree 0\n10\n";
        let err = ProblemGenerator::parse_instance(1, text).unwrap_err();
        assert!(matches!(err, InstanceError::NonNumericField(_)));
    }
}
