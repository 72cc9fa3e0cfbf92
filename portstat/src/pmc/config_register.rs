//! `IA32_PERFEVTSELx` layout
//!
//! Packed explicitly into a `u64` instead of relying on native bit-field
//! layout:
//!
//! ```text
//!  63            32 31    24 23  22  21  20  19  18  17  16 15     8 7      0
//! ┌────────────────┬────────┬───┬───┬───┬───┬───┬───┬───┬───┬────────┬────────┐
//! │    reserved    │  CMASK │INV│EN │ANY│INT│PC │ E │OS │USR│  UMASK │ EVENT  │
//! └────────────────┴────────┴───┴───┴───┴───┴───┴───┴───┴───┴────────┴────────┘
//! ```

use super::events::HardwareEvent;

const USR: u32 = 16;
const OS: u32 = 17;
const EDGE: u32 = 18;
const PIN_CONTROL: u32 = 19;
const INTERRUPT: u32 = 20;
const ANY_THREAD: u32 = 21;
const ENABLE: u32 = 22;
const INVERT: u32 = 23;
const CMASK_SHIFT: u32 = 24;
const RESERVED_SHIFT: u32 = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct CounterConfig {
    pub event_select: u8,
    pub unit_mask: u8,
    pub user_mode: bool,
    pub kernel_mode: bool,
    pub edge_detect: bool,
    pub pin_control: bool,
    pub interrupt_enable: bool,
    pub any_thread: bool,
    pub enable: bool,
    pub invert: bool,
    pub counter_mask: u8,
    pub reserved: u32,
}

impl CounterConfig {
    /// Count `event` in user and kernel mode on both hyper-threads of the
    /// core; everything else zero.
    pub fn for_event(event: &HardwareEvent) -> Self {
        Self {
            event_select: event.event_select,
            unit_mask: event.unit_mask,
            user_mode: true,
            kernel_mode: true,
            any_thread: true,
            enable: true,
            ..Self::default()
        }
    }

    pub fn encode(&self) -> u64 {
        let flag = |set: bool, bit: u32| u64::from(set) << bit;

        u64::from(self.event_select)
            | (u64::from(self.unit_mask) << 8)
            | flag(self.user_mode, USR)
            | flag(self.kernel_mode, OS)
            | flag(self.edge_detect, EDGE)
            | flag(self.pin_control, PIN_CONTROL)
            | flag(self.interrupt_enable, INTERRUPT)
            | flag(self.any_thread, ANY_THREAD)
            | flag(self.enable, ENABLE)
            | flag(self.invert, INVERT)
            | (u64::from(self.counter_mask) << CMASK_SHIFT)
            | (u64::from(self.reserved) << RESERVED_SHIFT)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn decode(raw: u64) -> Self {
        let bit = |n: u32| raw & (1 << n) != 0;

        Self {
            event_select: raw as u8,
            unit_mask: (raw >> 8) as u8,
            user_mode: bit(USR),
            kernel_mode: bit(OS),
            edge_detect: bit(EDGE),
            pin_control: bit(PIN_CONTROL),
            interrupt_enable: bit(INTERRUPT),
            any_thread: bit(ANY_THREAD),
            enable: bit(ENABLE),
            invert: bit(INVERT),
            counter_mask: (raw >> CMASK_SHIFT) as u8,
            reserved: (raw >> RESERVED_SHIFT) as u32,
        }
    }
}

impl From<CounterConfig> for u64 {
    fn from(config: CounterConfig) -> Self {
        config.encode()
    }
}
