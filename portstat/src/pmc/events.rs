//! Monitored events and the counter register map
//!
//! Event encodings are from the Intel SDM vol. 3B, "Performance Monitoring
//! Events for 2nd Generation Intel Core Processors" (`UOPS_DISPATCHED_PORT`,
//! event 0xA1).

use serde::Serialize;

use crate::domain::MsrAddress;

/// Number of (event-select, counter) register pairs in the address map.
pub const MAX_COUNTER_SLOTS: usize = 8;

/// `IA32_PMC0`; `IA32_PMCx` follow contiguously.
pub const IA32_PMC0: u32 = 0xc1;
/// `IA32_PERFEVTSEL0`; `IA32_PERFEVTSELx` follow contiguously.
pub const IA32_PERFEVTSEL0: u32 = 0x186;

/// A hardware event selectable through `IA32_PERFEVTSELx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HardwareEvent {
    pub name: &'static str,
    pub event_select: u8,
    pub unit_mask: u8,
}

impl HardwareEvent {
    pub const fn new(name: &'static str, event_select: u8, unit_mask: u8) -> Self {
        Self { name, event_select, unit_mask }
    }
}

/// Cycles in which at least one uop was dispatched to each port.
///
/// Order fixes both counter slot assignment and output column order.
pub const UOPS_DISPATCHED_PORT: [HardwareEvent; 6] = [
    HardwareEvent::new("port0", 0xa1, 0x01),
    HardwareEvent::new("port1", 0xa1, 0x02),
    HardwareEvent::new("port2", 0xa1, 0x0c),
    HardwareEvent::new("port3", 0xa1, 0x30),
    HardwareEvent::new("port4", 0xa1, 0x40),
    HardwareEvent::new("port5", 0xa1, 0x80),
];

/// Counter register of `slot`, or `None` past the end of the map.
#[allow(clippy::cast_possible_truncation)]
pub fn counter_register(slot: usize) -> Option<MsrAddress> {
    (slot < MAX_COUNTER_SLOTS).then(|| MsrAddress(IA32_PMC0 + slot as u32))
}

/// Event-select register of `slot`, or `None` past the end of the map.
#[allow(clippy::cast_possible_truncation)]
pub fn event_select_register(slot: usize) -> Option<MsrAddress> {
    (slot < MAX_COUNTER_SLOTS).then(|| MsrAddress(IA32_PERFEVTSEL0 + slot as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_blocks() {
        assert_eq!(counter_register(0), Some(MsrAddress(0xc1)));
        assert_eq!(counter_register(7), Some(MsrAddress(0xc8)));
        assert_eq!(counter_register(8), None);
        assert_eq!(event_select_register(0), Some(MsrAddress(0x186)));
        assert_eq!(event_select_register(7), Some(MsrAddress(0x18d)));
        assert_eq!(event_select_register(8), None);
    }

    #[test]
    fn test_port_events_share_event_code() {
        assert!(UOPS_DISPATCHED_PORT.iter().all(|e| e.event_select == 0xa1));
        let masks: Vec<u8> = UOPS_DISPATCHED_PORT.iter().map(|e| e.unit_mask).collect();
        assert_eq!(masks, vec![0x01, 0x02, 0x0c, 0x30, 0x40, 0x80]);
    }
}
