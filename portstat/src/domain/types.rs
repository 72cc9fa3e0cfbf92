//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent common bugs like passing a logical CPU
//! number where a register address is expected.

use std::collections::BTreeSet;
use std::fmt;

/// Logical processor ID
///
/// The kernel's logical CPU number (`processor` in `/proc/cpuinfo`), which is
/// also the directory name under `/dev/cpu/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CpuId(pub u32);

impl fmt::Display for CpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CPU:{}", self.0)
    }
}

/// Model-specific register address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MsrAddress(pub u32);

impl MsrAddress {
    /// Byte offset of this register in the msr device file.
    pub fn offset(self) -> u64 {
        u64::from(self.0)
    }
}

impl fmt::Display for MsrAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MSR 0x{:x}", self.0)
    }
}

/// Direction of a register transfer, used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsrOp {
    Read,
    Write,
}

impl fmt::Display for MsrOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MsrOp::Read => f.write_str("read"),
            MsrOp::Write => f.write_str("write"),
        }
    }
}

/// Raw output registers of one CPUID invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuidRegisters {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

/// Processor family and model as reported by CPUID leaf 0x01
/// (after extended family/model correction).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuIdentity {
    pub family: u32,
    pub model: u32,
}

impl fmt::Display for CpuIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "family = {}, model = {}", self.family, self.model)
    }
}

/// Architectural performance monitoring capability (CPUID leaf 0x0A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmcCapability {
    /// Architectural PMC version, EAX[7:0]
    pub version: u8,
    /// General-purpose counters per logical processor, EAX[15:8]
    pub counters_per_thread: u8,
    /// Bit width of each general-purpose counter, EAX[23:16]
    pub counter_bit_width: u8,
}

/// One logical processor as reported by the topology source.
///
/// Siblings of a hyper-threaded core share `package_id` and `core_group_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalProcessor {
    pub id: CpuId,
    pub package_id: u32,
    pub core_group_id: u32,
    pub flags: BTreeSet<String>,
}

impl LogicalProcessor {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }
}
