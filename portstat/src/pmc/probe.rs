//! CPU identification and PMC capability discovery
//!
//! Decoding is split from the CPUID call so the bit slicing can be tested
//! against fixed register values.

use log::info;

use crate::domain::{CpuIdentity, PmcCapability, PortStatError};
use crate::hardware::HardwareAccess;

/// CPUID leaf: version information (family/model/stepping)
pub const LEAF_VERSION_INFO: u32 = 0x01;
/// CPUID leaf: architectural performance monitoring
pub const LEAF_PERFMON: u32 = 0x0a;

/// Minimum architectural PMC version (AnyThread support in `IA32_PERFEVTSELx`)
pub const MIN_PMC_VERSION: u8 = 3;

/// The only generation whose port events and register layout are known
/// (Sandy Bridge client, family 6 model 0x2A).
pub const SUPPORTED_GENERATION: CpuIdentity = CpuIdentity { family: 6, model: 42 };

/// Decode family and model from leaf 0x01 EAX.
pub fn decode_identity(eax: u32) -> CpuIdentity {
    let base_family = (eax >> 8) & 0x0f;
    let ext_family = (eax >> 20) & 0xff;
    let base_model = (eax >> 4) & 0x0f;
    let ext_model = (eax >> 16) & 0x0f;

    let family = if base_family == 0x0f { base_family + ext_family } else { base_family };
    let model = if base_family == 0x06 || base_family == 0x0f {
        (ext_model << 4) + base_model
    } else {
        base_model
    };

    CpuIdentity { family, model }
}

/// Decode leaf 0x0A EAX.
#[allow(clippy::cast_possible_truncation)]
pub fn decode_pmc_capability(eax: u32) -> PmcCapability {
    PmcCapability {
        version: (eax & 0xff) as u8,
        counters_per_thread: ((eax >> 8) & 0xff) as u8,
        counter_bit_width: ((eax >> 16) & 0xff) as u8,
    }
}

pub fn probe_identity<H: HardwareAccess>(hardware: &H) -> CpuIdentity {
    decode_identity(hardware.cpuid(LEAF_VERSION_INFO, 0).eax)
}

pub fn probe_pmc_capability<H: HardwareAccess>(hardware: &H) -> PmcCapability {
    decode_pmc_capability(hardware.cpuid(LEAF_PERFMON, 0).eax)
}

/// Refuse anything but the supported generation with PMC version ≥ 3.
///
/// # Errors
/// [`PortStatError::UnsupportedHardware`] naming the detected family/model.
pub fn check_supported(
    identity: CpuIdentity,
    capability: PmcCapability,
) -> Result<(), PortStatError> {
    if capability.version < MIN_PMC_VERSION || identity != SUPPORTED_GENERATION {
        return Err(PortStatError::UnsupportedHardware {
            family: identity.family,
            model: identity.model,
            version: capability.version,
        });
    }
    Ok(())
}

/// Probe the machine, log what was found and apply the generation gate.
///
/// # Errors
/// See [`check_supported`].
pub fn probe_and_check<H: HardwareAccess>(hardware: &H) -> Result<PmcCapability, PortStatError> {
    let identity = probe_identity(hardware);
    let capability = probe_pmc_capability(hardware);

    info!("CPU {identity}");
    info!(
        "architectural PMC version {}, {} counters per logical processor, {} bits wide",
        capability.version, capability.counters_per_thread, capability.counter_bit_width
    );

    check_supported(identity, capability)?;
    Ok(capability)
}
