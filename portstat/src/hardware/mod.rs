//! Hardware access seam
//!
//! Everything privileged or platform-specific goes through [`HardwareAccess`]:
//! CPUID, the time-stamp counter, and per-CPU MSR handles. The prober,
//! planner and sampler only see this trait, so they run unchanged against
//! [`native::NativeHardware`] or the recording [`scripted::ScriptedHardware`].

pub mod native;
pub mod scripted;

use crate::domain::{CpuId, CpuidRegisters, MsrAddress, PortStatError};

pub use native::{MsrChannel, NativeHardware};
pub use scripted::ScriptedHardware;

/// Exclusive handle to one logical processor's MSR space.
///
/// Implementations release the underlying handle on drop.
pub trait MsrAccess {
    /// Logical processor this handle talks to.
    fn cpu(&self) -> CpuId;

    /// Read all 8 bytes of `register`.
    ///
    /// # Errors
    /// [`PortStatError::MsrIo`] on a failed or short read.
    fn read(&self, register: MsrAddress) -> Result<u64, PortStatError>;

    /// Write all 8 bytes of `value` to `register`.
    ///
    /// # Errors
    /// [`PortStatError::MsrIo`] on a failed or short write.
    fn write(&mut self, register: MsrAddress, value: u64) -> Result<(), PortStatError>;
}

pub trait HardwareAccess {
    type Msr: MsrAccess;

    /// Execute CPUID with the given leaf and subleaf.
    fn cpuid(&self, leaf: u32, subleaf: u32) -> CpuidRegisters;

    /// Current value of the time-stamp counter.
    fn read_tsc(&self) -> u64;

    /// Open the MSR handle of `cpu`.
    ///
    /// # Errors
    /// [`PortStatError::MsrAccess`] if the handle cannot be opened.
    fn open_msr(&self, cpu: CpuId) -> Result<Self::Msr, PortStatError>;
}
