//! Structured error types for portstat
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Every variant carries the hardware ids, register addresses or byte counts
//! needed to diagnose a failure without re-running under a debugger.

use std::path::PathBuf;

use super::types::{CpuId, MsrAddress, MsrOp};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortStatError {
    #[error(
        "unsupported CPU: family = {family}, model = {model}, \
         architectural PMC version = {version}"
    )]
    UnsupportedHardware { family: u32, model: u32, version: u8 },

    #[error("required CPU flag '{flag}' is not reported for {cpu}")]
    MissingCapabilityFlag { flag: String, cpu: CpuId },

    #[error("cannot open {path} for {cpu}: {source}")]
    MsrAccess {
        cpu: CpuId,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{op} of {register} on {cpu} transferred {transferred} of 8 bytes")]
    MsrIo {
        op: MsrOp,
        cpu: CpuId,
        register: MsrAddress,
        transferred: usize,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("malformed topology input at line {line}: {reason}")]
    TopologyParse { line: usize, reason: String },

    #[error("topology source reported no logical processors")]
    EmptyTopology,

    #[error(
        "core {core} has {found} logical processors but core 0 has {expected}; \
         asymmetric topologies are not supported"
    )]
    AsymmetricTopology { core: usize, expected: usize, found: usize },

    #[error(
        "{events} events do not fit {counters_per_thread} counters per thread \
         on {threads_per_core} threads per core"
    )]
    PlanInfeasible { events: usize, counters_per_thread: usize, threads_per_core: usize },

    #[error("cannot {operation} while sampler is {state}")]
    InvalidState { operation: &'static str, state: &'static str },

    #[error("failed to emit sample: {0}")]
    Output(String),
}

impl PortStatError {
    /// Errors meaning "this machine cannot run the tool as configured",
    /// as opposed to failures while talking to the hardware.
    pub fn is_unsupported_hardware(&self) -> bool {
        matches!(
            self,
            PortStatError::UnsupportedHardware { .. }
                | PortStatError::MissingCapabilityFlag { .. }
                | PortStatError::PlanInfeasible { .. }
                | PortStatError::AsymmetricTopology { .. }
                | PortStatError::EmptyTopology
        )
    }

    /// True when an MSR handle could not be opened for lack of privilege.
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            PortStatError::MsrAccess { source, .. }
                if source.kind() == std::io::ErrorKind::PermissionDenied
        )
    }
}
