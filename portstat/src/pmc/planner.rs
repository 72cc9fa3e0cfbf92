//! Counter slot planning
//!
//! Events are packed sequentially: slots 0..n of the core's first logical
//! processor, then slots 0..n of its sibling, and so on. The same plan is
//! applied to every core.

use crate::domain::{MsrAddress, PortStatError};

use super::events::{counter_register, event_select_register, MAX_COUNTER_SLOTS};

/// Where one event is counted within a core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotAssignment {
    /// Index of the event in the configured event list
    pub event_index: usize,
    /// Which of the core's logical processors programs the counter
    pub thread_offset: usize,
    /// Counter slot on that logical processor
    pub slot: usize,
    pub event_select_register: MsrAddress,
    pub counter_register: MsrAddress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterPlan {
    assignments: Vec<SlotAssignment>,
    counters_per_thread: usize,
    threads_per_core: usize,
}

impl CounterPlan {
    /// Plan `event_count` events onto cores of `threads_per_core` logical
    /// processors with `counters_per_thread` programmable counters each.
    ///
    /// Counters beyond the eight-entry register map are never used.
    ///
    /// # Errors
    /// [`PortStatError::PlanInfeasible`] if any event would need a thread
    /// offset ≥ `threads_per_core`, or there are no usable counters.
    pub fn new(
        event_count: usize,
        counters_per_thread: usize,
        threads_per_core: usize,
    ) -> Result<Self, PortStatError> {
        let usable = counters_per_thread.min(MAX_COUNTER_SLOTS);
        let infeasible = || PortStatError::PlanInfeasible {
            events: event_count,
            counters_per_thread,
            threads_per_core,
        };

        if usable == 0 {
            return Err(infeasible());
        }

        let mut assignments = Vec::with_capacity(event_count);
        for event_index in 0..event_count {
            let thread_offset = event_index / usable;
            let slot = event_index % usable;
            if thread_offset >= threads_per_core {
                return Err(infeasible());
            }

            let (Some(event_select_register), Some(counter_register)) =
                (event_select_register(slot), counter_register(slot))
            else {
                return Err(infeasible());
            };

            assignments.push(SlotAssignment {
                event_index,
                thread_offset,
                slot,
                event_select_register,
                counter_register,
            });
        }

        Ok(Self { assignments, counters_per_thread: usable, threads_per_core })
    }

    pub fn assignments(&self) -> &[SlotAssignment] {
        &self.assignments
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Counters used per logical processor (capped at the register map size).
    pub fn counters_per_thread(&self) -> usize {
        self.counters_per_thread
    }

    pub fn threads_per_core(&self) -> usize {
        self.threads_per_core
    }

    /// Number of logical processors per core that actually carry counters.
    pub fn threads_used(&self) -> usize {
        self.assignments.last().map_or(0, |a| a.thread_offset + 1)
    }
}
