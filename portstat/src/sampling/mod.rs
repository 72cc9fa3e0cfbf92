//! Sampling pipeline
//!
//! - `setup`: validation and planning ahead of any privileged access
//! - `sampler`: counter programming and the periodic tick
//! - `report`: text and JSON rendering of samples

pub mod report;
pub mod sampler;
pub mod setup;

pub use report::{OutputFormat, SampleWriter};
pub use sampler::{counter_delta, utilization_percent, CoreSample, Sampler, SamplerState, TickSample};
pub use setup::{plan_session, start_session, SessionPlan};
