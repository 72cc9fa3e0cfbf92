//! Processor topology
//!
//! Reads logical processors from `/proc/cpuinfo` and groups hyper-threaded
//! siblings into physical cores.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;

use crate::domain::{CpuId, LogicalProcessor, PortStatError};

/// Default topology source
pub const DEFAULT_CPUINFO: &str = "/proc/cpuinfo";

/// TSC ticks at a constant rate regardless of P-state
pub const CONSTANT_TSC: &str = "constant_tsc";

/// Read and parse a cpuinfo file.
///
/// # Errors
/// Returns an error if the file cannot be read or is malformed
pub fn read_cpuinfo(path: &Path) -> Result<Vec<LogicalProcessor>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse_cpuinfo(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

#[derive(Default)]
struct Record {
    first_line: usize,
    processor: Option<u32>,
    package_id: Option<u32>,
    core_id: Option<u32>,
    flags: BTreeSet<String>,
}

impl Record {
    fn finish(self) -> Result<LogicalProcessor, PortStatError> {
        let Some(id) = self.processor else {
            return Err(PortStatError::TopologyParse {
                line: self.first_line,
                reason: "record has no 'processor' field".to_string(),
            });
        };

        // VMs often omit these; treat every processor as its own core
        Ok(LogicalProcessor {
            id: CpuId(id),
            package_id: self.package_id.unwrap_or(0),
            core_group_id: self.core_id.unwrap_or(id),
            flags: self.flags,
        })
    }
}

/// Parse `key : value` records separated by blank lines.
///
/// Only `processor`, `physical id`, `core id` and `flags` are used; other
/// keys are ignored.
///
/// # Errors
/// [`PortStatError::TopologyParse`] on a line without `:`, a record without
/// a `processor` field, or a non-numeric id.
pub fn parse_cpuinfo(content: &str) -> Result<Vec<LogicalProcessor>, PortStatError> {
    let mut processors = Vec::new();
    let mut record: Option<Record> = None;

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;

        if line.trim().is_empty() {
            if let Some(done) = record.take() {
                processors.push(done.finish()?);
            }
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            return Err(PortStatError::TopologyParse {
                line: line_no,
                reason: format!("missing ':' in {:?}", line.trim()),
            });
        };
        let (key, value) = (key.trim(), value.trim());

        let current =
            record.get_or_insert_with(|| Record { first_line: line_no, ..Record::default() });

        let number = || {
            value.parse::<u32>().map_err(|e| PortStatError::TopologyParse {
                line: line_no,
                reason: format!("'{key}' is not a number: {e}"),
            })
        };

        match key {
            "processor" => current.processor = Some(number()?),
            "physical id" => current.package_id = Some(number()?),
            "core id" => current.core_id = Some(number()?),
            "flags" => current.flags = value.split_whitespace().map(str::to_string).collect(),
            _ => {}
        }
    }

    if let Some(done) = record.take() {
        processors.push(done.finish()?);
    }

    Ok(processors)
}

/// Hyper-threaded siblings sharing one physical core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreGroup {
    /// Dense index in `[0, num_cores)`, in order of first appearance
    pub index: usize,
    pub package_id: u32,
    pub core_group_id: u32,
    pub cpus: Vec<CpuId>,
}

#[derive(Debug, Clone)]
pub struct Topology {
    processors: Vec<LogicalProcessor>,
    cores: Vec<CoreGroup>,
}

impl Topology {
    /// Group logical processors into cores.
    ///
    /// Raw core ids are not assumed contiguous: each distinct
    /// `(physical id, core id)` pair gets the next dense index.
    ///
    /// # Errors
    /// [`PortStatError::EmptyTopology`] for no processors,
    /// [`PortStatError::AsymmetricTopology`] if cores differ in thread count.
    pub fn from_processors(processors: Vec<LogicalProcessor>) -> Result<Self, PortStatError> {
        if processors.is_empty() {
            return Err(PortStatError::EmptyTopology);
        }

        let mut index_of: HashMap<(u32, u32), usize> = HashMap::new();
        let mut cores: Vec<CoreGroup> = Vec::new();

        for cpu in &processors {
            let key = (cpu.package_id, cpu.core_group_id);
            let index = *index_of.entry(key).or_insert_with(|| {
                cores.push(CoreGroup {
                    index: cores.len(),
                    package_id: cpu.package_id,
                    core_group_id: cpu.core_group_id,
                    cpus: Vec::new(),
                });
                cores.len() - 1
            });
            cores[index].cpus.push(cpu.id);
        }

        let expected = cores[0].cpus.len();
        if let Some(odd) = cores.iter().find(|c| c.cpus.len() != expected) {
            return Err(PortStatError::AsymmetricTopology {
                core: odd.index,
                expected,
                found: odd.cpus.len(),
            });
        }

        for core in &cores {
            debug!(
                "core {} (package {}, core id {}): {:?}",
                core.index, core.package_id, core.core_group_id, core.cpus
            );
        }

        Ok(Self { processors, cores })
    }

    /// Require `flag` on every logical processor.
    ///
    /// # Errors
    /// [`PortStatError::MissingCapabilityFlag`] naming the first processor
    /// without it.
    pub fn require_flag(&self, flag: &str) -> Result<(), PortStatError> {
        match self.processors.iter().find(|p| !p.has_flag(flag)) {
            Some(cpu) => {
                Err(PortStatError::MissingCapabilityFlag { flag: flag.to_string(), cpu: cpu.id })
            }
            None => Ok(()),
        }
    }

    pub fn cores(&self) -> &[CoreGroup] {
        &self.cores
    }

    pub fn processors(&self) -> &[LogicalProcessor] {
        &self.processors
    }

    pub fn threads_per_core(&self) -> usize {
        self.cores.first().map_or(0, |c| c.cpus.len())
    }
}
