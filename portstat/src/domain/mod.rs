//! Domain model for portstat
//!
//! This module contains core domain types and errors that provide:
//! - Compile-time safety via newtype pattern (a CPU id is never a register address)
//! - Self-documenting function signatures
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{
    CpuId, CpuIdentity, CpuidRegisters, LogicalProcessor, MsrAddress, MsrOp, PmcCapability,
};

pub use errors::PortStatError;
