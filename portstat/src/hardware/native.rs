//! Native x86-64 Linux hardware access
//!
//! CPUID and RDTSC come from `core::arch`; MSRs are read and written through
//! the `msr` driver's character devices (`/dev/cpu/<n>/msr`), where the file
//! offset selects the register.

#![allow(unsafe_code)] // cpuid and rdtsc intrinsics are unsafe

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use log::trace;

use super::{HardwareAccess, MsrAccess};
use crate::domain::{CpuId, CpuidRegisters, MsrAddress, MsrOp, PortStatError};

/// Default root of the per-CPU MSR device nodes
pub const DEFAULT_MSR_DIR: &str = "/dev/cpu";

/// Hardware access for the machine this process runs on.
#[derive(Debug, Clone)]
pub struct NativeHardware {
    msr_dir: PathBuf,
}

impl NativeHardware {
    pub fn new(msr_dir: impl Into<PathBuf>) -> Self {
        Self { msr_dir: msr_dir.into() }
    }

    /// Path of the MSR device node for `cpu`.
    pub fn msr_path(&self, cpu: CpuId) -> PathBuf {
        msr_path(&self.msr_dir, cpu)
    }
}

impl Default for NativeHardware {
    fn default() -> Self {
        Self::new(DEFAULT_MSR_DIR)
    }
}

pub fn msr_path(msr_dir: &Path, cpu: CpuId) -> PathBuf {
    msr_dir.join(cpu.0.to_string()).join("msr")
}

impl HardwareAccess for NativeHardware {
    type Msr = MsrChannel;

    #[cfg(target_arch = "x86_64")]
    fn cpuid(&self, leaf: u32, subleaf: u32) -> CpuidRegisters {
        // SAFETY: CPUID is available on every x86-64 processor
        let r = unsafe { core::arch::x86_64::__cpuid_count(leaf, subleaf) };
        CpuidRegisters { eax: r.eax, ebx: r.ebx, ecx: r.ecx, edx: r.edx }
    }

    // All-zero leaves decode to PMC version 0, which the prober rejects.
    #[cfg(not(target_arch = "x86_64"))]
    fn cpuid(&self, _leaf: u32, _subleaf: u32) -> CpuidRegisters {
        CpuidRegisters::default()
    }

    #[cfg(target_arch = "x86_64")]
    fn read_tsc(&self) -> u64 {
        // SAFETY: RDTSC has no preconditions in user mode unless CR4.TSD is set
        unsafe { core::arch::x86_64::_rdtsc() }
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn read_tsc(&self) -> u64 {
        0
    }

    fn open_msr(&self, cpu: CpuId) -> Result<MsrChannel, PortStatError> {
        MsrChannel::open(cpu, self.msr_path(cpu))
    }
}

/// Owned read/write handle on one CPU's MSR device.
///
/// Not `Clone`: exactly one owner per handle, which is closed when the
/// channel is dropped.
#[derive(Debug)]
pub struct MsrChannel {
    cpu: CpuId,
    file: File,
}

impl MsrChannel {
    /// Open the MSR device at `path` for reading and writing.
    ///
    /// # Errors
    /// [`PortStatError::MsrAccess`] when the node is missing (driver not
    /// loaded) or the caller lacks privilege.
    pub fn open(cpu: CpuId, path: PathBuf) -> Result<Self, PortStatError> {
        match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => {
                trace!("opened {} for {cpu}", path.display());
                Ok(Self { cpu, file })
            }
            Err(source) => Err(PortStatError::MsrAccess { cpu, path, source }),
        }
    }

    fn io_error(
        &self,
        op: MsrOp,
        register: MsrAddress,
        transferred: usize,
        source: Option<std::io::Error>,
    ) -> PortStatError {
        PortStatError::MsrIo { op, cpu: self.cpu, register, transferred, source }
    }
}

impl MsrAccess for MsrChannel {
    fn cpu(&self) -> CpuId {
        self.cpu
    }

    fn read(&self, register: MsrAddress) -> Result<u64, PortStatError> {
        let mut buf = [0u8; 8];
        match self.file.read_at(&mut buf, register.offset()) {
            Ok(8) => Ok(u64::from_ne_bytes(buf)),
            Ok(n) => Err(self.io_error(MsrOp::Read, register, n, None)),
            Err(e) => Err(self.io_error(MsrOp::Read, register, 0, Some(e))),
        }
    }

    fn write(&mut self, register: MsrAddress, value: u64) -> Result<(), PortStatError> {
        match self.file.write_at(&value.to_ne_bytes(), register.offset()) {
            Ok(8) => Ok(()),
            Ok(n) => Err(self.io_error(MsrOp::Write, register, n, None)),
            Err(e) => Err(self.io_error(MsrOp::Write, register, 0, Some(e))),
        }
    }
}
