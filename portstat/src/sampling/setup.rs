//! Session setup
//!
//! Orders startup so every "this machine cannot run" failure happens before
//! any MSR handle is opened:
//!
//! 1. probe CPUID and apply the generation gate
//! 2. group the topology and require `constant_tsc`
//! 3. plan counter slots
//! 4. (caller) pre-flight checks
//! 5. open handles, program event selects, zero counters

use log::info;

use crate::domain::{LogicalProcessor, PmcCapability, PortStatError};
use crate::hardware::HardwareAccess;
use crate::pmc::probe::probe_and_check;
use crate::pmc::{CounterPlan, HardwareEvent};
use crate::topology::{Topology, CONSTANT_TSC};

use super::sampler::Sampler;

/// Everything decided before touching a privileged handle.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub capability: PmcCapability,
    pub topology: Topology,
    pub events: Vec<HardwareEvent>,
    pub plan: CounterPlan,
}

/// Validate the machine and plan counter placement for `events`.
///
/// # Errors
/// Unsupported hardware, missing `constant_tsc`, an empty or asymmetric
/// topology, or an event list that does not fit the counters.
pub fn plan_session<H: HardwareAccess>(
    hardware: &H,
    processors: Vec<LogicalProcessor>,
    events: &[HardwareEvent],
) -> Result<SessionPlan, PortStatError> {
    let capability = probe_and_check(hardware)?;

    let topology = Topology::from_processors(processors)?;
    topology.require_flag(CONSTANT_TSC)?;
    info!(
        "{} cores, {} logical processors per core",
        topology.cores().len(),
        topology.threads_per_core()
    );

    let plan = CounterPlan::new(
        events.len(),
        usize::from(capability.counters_per_thread),
        topology.threads_per_core(),
    )?;
    info!(
        "{} events on {} counters per thread, {} of {} threads per core used",
        plan.len(),
        plan.counters_per_thread(),
        plan.threads_used(),
        plan.threads_per_core()
    );

    Ok(SessionPlan { capability, topology, events: events.to_vec(), plan })
}

/// Open all MSR handles, program the counters and take the first baseline.
///
/// # Errors
/// The first handle that fails to open or register write that fails.
pub fn start_session<H: HardwareAccess>(
    hardware: H,
    session: &SessionPlan,
) -> Result<Sampler<H>, PortStatError> {
    let mut sampler = Sampler::new(hardware, session)?;
    sampler.configure()?;
    sampler.reset()?;
    Ok(sampler)
}
