//! Scripted hardware for tests and dry runs
//!
//! Returns preset CPUID leaves, a queue of TSC readings and an in-memory
//! register file, and records every MSR open and write so callers can assert
//! on exactly what would have been programmed.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::rc::Rc;

use super::native::{msr_path, DEFAULT_MSR_DIR};
use super::{HardwareAccess, MsrAccess};
use crate::domain::{CpuId, CpuidRegisters, MsrAddress, MsrOp, PortStatError};

/// One recorded register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsrWrite {
    pub cpu: CpuId,
    pub register: MsrAddress,
    pub value: u64,
}

#[derive(Debug, Default)]
struct ScriptState {
    leaves: HashMap<u32, CpuidRegisters>,
    tsc: VecDeque<u64>,
    last_tsc: u64,
    registers: HashMap<(CpuId, MsrAddress), u64>,
    writes: Vec<MsrWrite>,
    opened: Vec<CpuId>,
    denied: HashSet<CpuId>,
    failing_reads: HashSet<(CpuId, MsrAddress)>,
}

/// Cloning shares the script: a clone kept by a test observes everything
/// done through the copy handed to the sampler.
#[derive(Debug, Clone, Default)]
pub struct ScriptedHardware {
    state: Rc<RefCell<ScriptState>>,
}

/// Leaf 0x01 EAX encoding of `family`/`model`, the inverse of the
/// extended family/model decoding rule.
pub fn identity_eax(family: u32, model: u32) -> u32 {
    let (base_family, ext_family) = if family >= 0x0f { (0x0f, family - 0x0f) } else { (family, 0) };
    let (base_model, ext_model) = (model & 0x0f, (model >> 4) & 0x0f);
    ((ext_family & 0xff) << 20) | (ext_model << 16) | (base_family << 8) | (base_model << 4)
}

/// Leaf 0x0A EAX encoding of a PMC capability.
pub fn pmc_eax(version: u8, counters_per_thread: u8, counter_bit_width: u8) -> u32 {
    u32::from(version) | (u32::from(counters_per_thread) << 8) | (u32::from(counter_bit_width) << 16)
}

impl ScriptedHardware {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_leaf(self, leaf: u32, registers: CpuidRegisters) -> Self {
        self.state.borrow_mut().leaves.insert(leaf, registers);
        self
    }

    #[must_use]
    pub fn with_identity(self, family: u32, model: u32) -> Self {
        let eax = identity_eax(family, model);
        self.with_leaf(0x01, CpuidRegisters { eax, ..CpuidRegisters::default() })
    }

    #[must_use]
    pub fn with_pmc(self, version: u8, counters_per_thread: u8, counter_bit_width: u8) -> Self {
        let eax = pmc_eax(version, counters_per_thread, counter_bit_width);
        self.with_leaf(0x0a, CpuidRegisters { eax, ..CpuidRegisters::default() })
    }

    /// Queue TSC readings; once drained, the last value repeats.
    pub fn push_tsc(&self, values: impl IntoIterator<Item = u64>) {
        self.state.borrow_mut().tsc.extend(values);
    }

    pub fn set_register(&self, cpu: CpuId, register: MsrAddress, value: u64) {
        self.state.borrow_mut().registers.insert((cpu, register), value);
    }

    pub fn register(&self, cpu: CpuId, register: MsrAddress) -> Option<u64> {
        self.state.borrow().registers.get(&(cpu, register)).copied()
    }

    /// Make opening `cpu`'s handle fail with permission denied.
    pub fn deny_open(&self, cpu: CpuId) {
        self.state.borrow_mut().denied.insert(cpu);
    }

    /// Make reads of `register` on `cpu` come back empty.
    pub fn fail_reads(&self, cpu: CpuId, register: MsrAddress) {
        self.state.borrow_mut().failing_reads.insert((cpu, register));
    }

    pub fn writes(&self) -> Vec<MsrWrite> {
        self.state.borrow().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.borrow_mut().writes.clear();
    }

    pub fn opened(&self) -> Vec<CpuId> {
        self.state.borrow().opened.clone()
    }
}

impl HardwareAccess for ScriptedHardware {
    type Msr = ScriptedMsr;

    fn cpuid(&self, leaf: u32, _subleaf: u32) -> CpuidRegisters {
        self.state.borrow().leaves.get(&leaf).copied().unwrap_or_default()
    }

    fn read_tsc(&self) -> u64 {
        let mut state = self.state.borrow_mut();
        if let Some(value) = state.tsc.pop_front() {
            state.last_tsc = value;
        }
        state.last_tsc
    }

    fn open_msr(&self, cpu: CpuId) -> Result<ScriptedMsr, PortStatError> {
        let mut state = self.state.borrow_mut();
        if state.denied.contains(&cpu) {
            return Err(PortStatError::MsrAccess {
                cpu,
                path: msr_path(Path::new(DEFAULT_MSR_DIR), cpu),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            });
        }
        state.opened.push(cpu);
        Ok(ScriptedMsr { cpu, state: Rc::clone(&self.state) })
    }
}

#[derive(Debug)]
pub struct ScriptedMsr {
    cpu: CpuId,
    state: Rc<RefCell<ScriptState>>,
}

impl MsrAccess for ScriptedMsr {
    fn cpu(&self) -> CpuId {
        self.cpu
    }

    fn read(&self, register: MsrAddress) -> Result<u64, PortStatError> {
        let state = self.state.borrow();
        if state.failing_reads.contains(&(self.cpu, register)) {
            return Err(PortStatError::MsrIo {
                op: MsrOp::Read,
                cpu: self.cpu,
                register,
                transferred: 0,
                source: None,
            });
        }
        Ok(state.registers.get(&(self.cpu, register)).copied().unwrap_or(0))
    }

    fn write(&mut self, register: MsrAddress, value: u64) -> Result<(), PortStatError> {
        let mut state = self.state.borrow_mut();
        state.registers.insert((self.cpu, register), value);
        state.writes.push(MsrWrite { cpu: self.cpu, register, value });
        Ok(())
    }
}
