//! Port utilization sampler
//!
//! Programs the planned counters on every core, then turns raw counter
//! deltas into the share of TSC cycles in which each port was busy.
//!
//! ```text
//! Unconfigured ──configure()──▶ Configured ──reset()──▶ Sampling ──tick()──┐
//!                                                          ▲               │
//!                                                          └───────────────┘
//! ```

// Cycle counts are converted to f64 for display
#![allow(clippy::cast_precision_loss)]

use std::thread;
use std::time::Duration;

use log::{debug, trace, warn};
use serde::Serialize;

use crate::domain::{CpuId, PortStatError};
use crate::hardware::{HardwareAccess, MsrAccess};
use crate::pmc::{CounterConfig, HardwareEvent};
use crate::topology::CoreGroup;

use super::setup::SessionPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Unconfigured,
    Configured,
    Sampling,
}

impl SamplerState {
    fn name(self) -> &'static str {
        match self {
            SamplerState::Unconfigured => "unconfigured",
            SamplerState::Configured => "configured",
            SamplerState::Sampling => "sampling",
        }
    }
}

/// A physical core and the MSR handles of all its logical processors.
#[derive(Debug)]
pub struct Core<M: MsrAccess> {
    group: CoreGroup,
    channels: Vec<M>,
}

impl<M: MsrAccess> Core<M> {
    pub fn group(&self) -> &CoreGroup {
        &self.group
    }

    pub fn cpus(&self) -> Vec<CpuId> {
        self.channels.iter().map(MsrAccess::cpu).collect()
    }
}

/// Utilization of every port on one core over one interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoreSample {
    pub core: usize,
    pub package_id: u32,
    pub core_id: u32,
    /// Percent of elapsed TSC cycles, in event order
    pub percentages: Vec<f64>,
}

/// Result of one tick across all cores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickSample {
    pub elapsed_cycles: u64,
    pub cores: Vec<CoreSample>,
}

/// Counter increase from `previous` to `current`, modulo the counter width.
///
/// A counter that wrapped once during the interval still yields the right
/// delta; a width of 0 or ≥ 64 means plain 64-bit wrapping arithmetic.
pub fn counter_delta(previous: u64, current: u64, bit_width: u8) -> u64 {
    current.wrapping_sub(previous) & width_mask(bit_width)
}

fn width_mask(bit_width: u8) -> u64 {
    if bit_width == 0 || bit_width >= 64 {
        u64::MAX
    } else {
        (1u64 << bit_width) - 1
    }
}

/// `delta` as a percentage of `elapsed_cycles`; 0 when no cycles elapsed.
pub fn utilization_percent(delta: u64, elapsed_cycles: u64) -> f64 {
    if elapsed_cycles == 0 {
        return 0.0;
    }
    delta as f64 / elapsed_cycles as f64 * 100.0
}

pub struct Sampler<H: HardwareAccess> {
    hardware: H,
    events: Vec<HardwareEvent>,
    plan: crate::pmc::CounterPlan,
    counter_bit_width: u8,
    cores: Vec<Core<H::Msr>>,
    state: SamplerState,
    /// Last raw counter value per core, per event
    previous: Vec<Vec<u64>>,
    previous_tsc: u64,
}

impl<H: HardwareAccess> Sampler<H> {
    /// Open one MSR handle per logical processor of every core.
    ///
    /// Handles are held until the sampler is dropped.
    ///
    /// # Errors
    /// [`PortStatError::MsrAccess`] for the first handle that fails to open.
    pub fn new(hardware: H, session: &SessionPlan) -> Result<Self, PortStatError> {
        let mut cores = Vec::with_capacity(session.topology.cores().len());
        for group in session.topology.cores() {
            let channels = group
                .cpus
                .iter()
                .map(|&cpu| hardware.open_msr(cpu))
                .collect::<Result<Vec<_>, _>>()?;
            cores.push(Core { group: group.clone(), channels });
        }

        let previous = vec![vec![0; session.events.len()]; cores.len()];

        Ok(Self {
            hardware,
            events: session.events.clone(),
            plan: session.plan.clone(),
            counter_bit_width: session.capability.counter_bit_width,
            cores,
            state: SamplerState::Unconfigured,
            previous,
            previous_tsc: 0,
        })
    }

    pub fn state(&self) -> SamplerState {
        self.state
    }

    pub fn events(&self) -> &[HardwareEvent] {
        &self.events
    }

    pub fn cores(&self) -> &[Core<H::Msr>] {
        &self.cores
    }

    /// Last raw counter values recorded for `core`, in event order.
    pub fn previous_values(&self, core: usize) -> Option<&[u64]> {
        self.previous.get(core).map(Vec::as_slice)
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    /// Program every planned event-select register on every core.
    ///
    /// May be called again to reprogram; sampling must then be reset.
    ///
    /// # Errors
    /// The first failed register write. Counters already programmed keep
    /// their new configuration.
    pub fn configure(&mut self) -> Result<(), PortStatError> {
        for core in &mut self.cores {
            for slot in self.plan.assignments() {
                let event = &self.events[slot.event_index];
                let raw = CounterConfig::for_event(event).encode();
                let channel = &mut core.channels[slot.thread_offset];

                debug!(
                    "core {}: {} → {} on {} = {raw:#x}",
                    core.group.index,
                    event.name,
                    slot.event_select_register,
                    channel.cpu()
                );
                channel.write(slot.event_select_register, raw)?;
            }
        }

        self.state = SamplerState::Configured;
        Ok(())
    }

    /// Zero every planned counter and take a fresh TSC baseline.
    ///
    /// # Errors
    /// [`PortStatError::InvalidState`] before [`Sampler::configure`], or the
    /// first failed register write.
    pub fn reset(&mut self) -> Result<(), PortStatError> {
        if self.state == SamplerState::Unconfigured {
            return Err(self.invalid("reset"));
        }

        for (core, previous) in self.cores.iter_mut().zip(&mut self.previous) {
            for slot in self.plan.assignments() {
                core.channels[slot.thread_offset].write(slot.counter_register, 0)?;
            }
            previous.fill(0);
        }

        self.previous_tsc = self.hardware.read_tsc();
        self.state = SamplerState::Sampling;
        Ok(())
    }

    /// Read every counter and compute utilization since the previous tick
    /// (or since [`Sampler::reset`]).
    ///
    /// # Errors
    /// [`PortStatError::InvalidState`] before [`Sampler::reset`], or the
    /// first failed register read. A failed read invalidates the whole
    /// sample.
    pub fn tick(&mut self) -> Result<TickSample, PortStatError> {
        if self.state != SamplerState::Sampling {
            return Err(self.invalid("tick"));
        }

        let tsc = self.hardware.read_tsc();
        let elapsed_cycles = tsc.wrapping_sub(self.previous_tsc);
        self.previous_tsc = tsc;

        if elapsed_cycles == 0 {
            warn!("no TSC cycles elapsed since last sample; reporting 0%");
        }

        let mut cores = Vec::with_capacity(self.cores.len());
        for (core, previous) in self.cores.iter().zip(&mut self.previous) {
            let mut percentages = Vec::with_capacity(self.plan.len());
            for slot in self.plan.assignments() {
                let value = core.channels[slot.thread_offset].read(slot.counter_register)?;
                let last = &mut previous[slot.event_index];
                let delta = counter_delta(*last, value, self.counter_bit_width);
                trace!("core {} event {}: {value} (+{delta})", core.group.index, slot.event_index);

                percentages.push(utilization_percent(delta, elapsed_cycles));
                *last = value;
            }

            cores.push(CoreSample {
                core: core.group.index,
                package_id: core.group.package_id,
                core_id: core.group.core_group_id,
                percentages,
            });
        }

        Ok(TickSample { elapsed_cycles, cores })
    }

    /// Sleep `interval`, tick, hand the sample to `sink`; repeat.
    ///
    /// Runs until `count` ticks have been emitted, or forever when `count`
    /// is 0. Returns the number of ticks emitted.
    ///
    /// # Errors
    /// Any error from [`Sampler::tick`] or `sink` ends the loop.
    pub fn run<F>(&mut self, interval: Duration, count: u64, mut sink: F) -> Result<u64, PortStatError>
    where
        F: FnMut(&TickSample) -> Result<(), PortStatError>,
    {
        let mut ticks = 0;
        while count == 0 || ticks < count {
            thread::sleep(interval);
            let sample = self.tick()?;
            sink(&sample)?;
            ticks += 1;
        }
        Ok(ticks)
    }

    fn invalid(&self, operation: &'static str) -> PortStatError {
        PortStatError::InvalidState { operation, state: self.state.name() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_without_wrap() {
        assert_eq!(counter_delta(100, 350, 64), 250);
        assert_eq!(counter_delta(0, 0, 48), 0);
    }

    #[test]
    fn test_delta_across_64_bit_wrap() {
        let previous = u64::MAX - 9;
        let current = 5;
        assert_eq!(counter_delta(previous, current, 64), 15);
        assert_eq!(counter_delta(previous, current, 0), 15);
        assert_eq!(counter_delta(previous, current, 64), current.wrapping_sub(previous));
    }

    #[test]
    fn test_delta_across_48_bit_wrap() {
        let top = (1u64 << 48) - 1;
        assert_eq!(counter_delta(top - 2, 4, 48), 7);
    }

    #[test]
    fn test_delta_matches_modular_subtraction() {
        let samples = [0, 1, 42, 1 << 31, 1 << 47, u64::MAX / 3, u64::MAX - 1, u64::MAX];
        for &previous in &samples {
            for &current in &samples {
                let expected = ((u128::from(current) + (1u128 << 64) - u128::from(previous))
                    % (1u128 << 64)) as u64;
                assert_eq!(counter_delta(previous, current, 64), expected);
            }
        }
    }

    #[test]
    fn test_utilization_percent() {
        assert!((utilization_percent(10_000, 1_000_000) - 1.0).abs() < 1e-9);
        assert!((utilization_percent(1_000_000, 1_000_000) - 100.0).abs() < 1e-9);
        assert_eq!(utilization_percent(5, 0), 0.0);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(SamplerState::Unconfigured.name(), "unconfigured");
        assert_eq!(SamplerState::Sampling.name(), "sampling");
    }
}
