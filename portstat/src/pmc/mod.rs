//! Performance-monitoring counter model
//!
//! - `probe`: CPUID decoding and the supported-generation gate
//! - `events`: the monitored port events and the counter register map
//! - `config_register`: bit-exact `IA32_PERFEVTSELx` encoding
//! - `planner`: event → (thread offset, counter slot) assignment

pub mod config_register;
pub mod events;
pub mod planner;
pub mod probe;

pub use config_register::CounterConfig;
pub use events::{HardwareEvent, UOPS_DISPATCHED_PORT};
pub use planner::{CounterPlan, SlotAssignment};
pub use probe::{check_supported, probe_identity, probe_pmc_capability, SUPPORTED_GENERATION};
