//! # portstat - Execution Port Utilization Sampler
//!
//! portstat programs the general-purpose performance counters of every
//! logical processor to count `UOPS_DISPATCHED_PORT` events, then reports,
//! once per interval, the fraction of TSC cycles during which each execution
//! port of each physical core dispatched at least one uop.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   CPUID      │   │ /proc/cpuinfo│   │  /dev/cpu/   │
//! │  (probe)     │   │  (topology)  │   │   N/msr      │
//! └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!        │ family/model,    │ cores ×          │ IA32_PERFEVTSELx
//!        │ PMC capability   │ siblings         │ IA32_PMCx
//!        ▼                  ▼                  ▼
//! ┌─────────────────────────────────────────────────────┐
//! │  setup: gate → topology → plan → open → configure   │
//! └───────────────────────┬─────────────────────────────┘
//!                         ▼
//! ┌─────────────────────────────────────────────────────┐
//! │  sampler: every interval read TSC + all counters,   │
//! │  delta / elapsed cycles → % per port per core       │
//! └───────────────────────┬─────────────────────────────┘
//!                         ▼
//!                 report (text / JSON)
//! ```
//!
//! ## Module Structure
//!
//! - [`hardware`]: the [`hardware::HardwareAccess`] seam, with a native
//!   implementation and a scripted one for tests
//! - [`pmc`]: CPUID decoding, event definitions, `IA32_PERFEVTSELx`
//!   encoding and counter slot planning
//! - [`topology`]: `/proc/cpuinfo` parsing and core grouping
//! - [`sampling`]: session setup, the sampling loop and output rendering
//! - [`preflight`]: privilege and driver checks
//! - [`cli`]: command-line arguments
//! - [`domain`]: shared types and errors
//!
//! ## Typical Usage
//!
//! ```bash
//! sudo modprobe msr
//! sudo ./portstat --interval 1000
//! ```
//!
//! Counters stay programmed after exit; a later run reprograms them.

pub mod cli;
pub mod domain;
pub mod hardware;
pub mod pmc;
pub mod preflight;
pub mod sampling;
pub mod topology;
