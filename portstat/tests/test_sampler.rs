use std::collections::BTreeSet;
use std::time::Duration;

use portstat::domain::{CpuId, LogicalProcessor, MsrAddress, PortStatError};
use portstat::hardware::ScriptedHardware;
use portstat::pmc::{CounterConfig, UOPS_DISPATCHED_PORT};
use portstat::sampling::{plan_session, start_session, Sampler, SamplerState};

fn cpu(id: u32, core: u32) -> LogicalProcessor {
    LogicalProcessor {
        id: CpuId(id),
        package_id: 0,
        core_group_id: core,
        flags: ["fpu", "tsc", "constant_tsc"].iter().map(|f| (*f).to_string()).collect(),
    }
}

fn sandy_bridge() -> ScriptedHardware {
    ScriptedHardware::new().with_identity(6, 42).with_pmc(3, 4, 48)
}

const PMC: [MsrAddress; 4] = [MsrAddress(0xc1), MsrAddress(0xc2), MsrAddress(0xc3), MsrAddress(0xc4)];

#[test]
fn test_one_thread_per_core_is_rejected_before_opening_msrs() {
    let hw = sandy_bridge();
    let err = plan_session(&hw, vec![cpu(0, 0)], &UOPS_DISPATCHED_PORT).unwrap_err();

    assert!(matches!(err, PortStatError::PlanInfeasible { events: 6, .. }));
    assert!(err.is_unsupported_hardware());
    assert!(hw.opened().is_empty());
}

#[test]
fn test_unsupported_model_is_rejected_before_opening_msrs() {
    let hw = ScriptedHardware::new().with_identity(6, 45).with_pmc(3, 4, 48);
    let err = plan_session(&hw, vec![cpu(0, 0), cpu(1, 0)], &UOPS_DISPATCHED_PORT).unwrap_err();

    assert!(matches!(err, PortStatError::UnsupportedHardware { family: 6, model: 45, .. }));
    assert!(hw.opened().is_empty());
}

#[test]
fn test_missing_constant_tsc_is_rejected() {
    let hw = sandy_bridge();
    let mut no_tsc = cpu(1, 0);
    no_tsc.flags = BTreeSet::from(["tsc".to_string()]);

    let err = plan_session(&hw, vec![cpu(0, 0), no_tsc], &UOPS_DISPATCHED_PORT).unwrap_err();
    assert!(matches!(err, PortStatError::MissingCapabilityFlag { cpu: CpuId(1), .. }));
    assert!(hw.opened().is_empty());
}

#[test]
fn test_configure_and_reset_write_counts() {
    let hw = sandy_bridge();
    let session = plan_session(&hw, vec![cpu(0, 0), cpu(1, 0)], &UOPS_DISPATCHED_PORT).unwrap();

    let mut sampler = Sampler::new(hw.clone(), &session).unwrap();
    assert_eq!(hw.opened(), vec![CpuId(0), CpuId(1)]);

    sampler.configure().unwrap();
    let writes = hw.writes();
    assert_eq!(writes.len(), 6);
    assert!(writes.iter().all(|w| (0x186..=0x189).contains(&w.register.0)));
    assert_eq!(writes.iter().filter(|w| w.cpu == CpuId(0)).count(), 4);
    assert_eq!(writes.iter().filter(|w| w.cpu == CpuId(1)).count(), 2);

    // Port 4 lands in slot 0 of the sibling thread
    let port4 = writes.iter().find(|w| w.cpu == CpuId(1) && w.register == MsrAddress(0x186)).unwrap();
    assert_eq!(CounterConfig::decode(port4.value), CounterConfig::for_event(&UOPS_DISPATCHED_PORT[4]));

    hw.clear_writes();
    sampler.reset().unwrap();
    let writes = hw.writes();
    assert_eq!(writes.len(), 6);
    assert!(writes.iter().all(|w| (0xc1..=0xc4).contains(&w.register.0) && w.value == 0));
}

#[test]
fn test_first_tick_reports_one_percent() {
    let hw = sandy_bridge();
    let session = plan_session(&hw, vec![cpu(0, 0), cpu(1, 0)], &UOPS_DISPATCHED_PORT).unwrap();

    hw.push_tsc([5_000_000, 6_000_000]);
    let mut sampler = start_session(hw.clone(), &session).unwrap();
    assert_eq!(sampler.state(), SamplerState::Sampling);

    for register in PMC {
        hw.set_register(CpuId(0), register, 10_000);
    }
    hw.set_register(CpuId(1), PMC[0], 10_000);
    hw.set_register(CpuId(1), PMC[1], 10_000);

    let sample = sampler.tick().unwrap();
    assert_eq!(sample.elapsed_cycles, 1_000_000);
    assert_eq!(sample.cores.len(), 1);
    for pct in &sample.cores[0].percentages {
        assert_eq!(format!("{pct:.2}"), "1.00");
    }
    assert_eq!(sampler.previous_values(0).unwrap(), &[10_000; 6]);
}

#[test]
fn test_second_tick_uses_previous_values() {
    let hw = sandy_bridge();
    let session = plan_session(&hw, vec![cpu(0, 0), cpu(1, 0)], &UOPS_DISPATCHED_PORT).unwrap();

    hw.push_tsc([0, 1_000, 3_000]);
    let mut sampler = start_session(hw.clone(), &session).unwrap();

    hw.set_register(CpuId(0), PMC[0], 500);
    sampler.tick().unwrap();

    hw.set_register(CpuId(0), PMC[0], 1_500);
    let sample = sampler.tick().unwrap();
    assert_eq!(sample.elapsed_cycles, 2_000);
    assert!((sample.cores[0].percentages[0] - 50.0).abs() < 1e-9);
    assert_eq!(sample.cores[0].percentages[1], 0.0);
}

#[test]
fn test_counter_wrap_within_interval() {
    let hw = sandy_bridge();
    let session = plan_session(&hw, vec![cpu(0, 0), cpu(1, 0)], &UOPS_DISPATCHED_PORT).unwrap();

    hw.push_tsc([0, 100, 200]);
    let mut sampler = start_session(hw.clone(), &session).unwrap();

    let top = (1u64 << 48) - 1;
    hw.set_register(CpuId(0), PMC[0], top - 9);
    sampler.tick().unwrap();

    hw.set_register(CpuId(0), PMC[0], 40);
    let sample = sampler.tick().unwrap();
    assert!((sample.cores[0].percentages[0] - 50.0).abs() < 1e-9);
}

#[test]
fn test_reset_twice_keeps_baseline_at_zero() {
    let hw = sandy_bridge();
    let session = plan_session(&hw, vec![cpu(0, 0), cpu(1, 0)], &UOPS_DISPATCHED_PORT).unwrap();

    let mut sampler = start_session(hw.clone(), &session).unwrap();
    assert_eq!(sampler.previous_values(0).unwrap(), &[0; 6]);

    sampler.reset().unwrap();
    assert_eq!(sampler.previous_values(0).unwrap(), &[0; 6]);
    assert_eq!(hw.register(CpuId(0), PMC[0]), Some(0));
}

#[test]
fn test_out_of_order_transitions() {
    let hw = sandy_bridge();
    let session = plan_session(&hw, vec![cpu(0, 0), cpu(1, 0)], &UOPS_DISPATCHED_PORT).unwrap();
    let mut sampler = Sampler::new(hw, &session).unwrap();

    assert!(matches!(sampler.reset(), Err(PortStatError::InvalidState { operation: "reset", .. })));
    assert!(matches!(sampler.tick(), Err(PortStatError::InvalidState { operation: "tick", .. })));

    sampler.configure().unwrap();
    assert!(matches!(sampler.tick(), Err(PortStatError::InvalidState { .. })));
}

#[test]
fn test_read_failure_during_tick_is_fatal() {
    let hw = sandy_bridge();
    let session = plan_session(&hw, vec![cpu(0, 0), cpu(1, 0)], &UOPS_DISPATCHED_PORT).unwrap();
    let mut sampler = start_session(hw.clone(), &session).unwrap();

    hw.fail_reads(CpuId(1), PMC[1]);
    let err = sampler.tick().unwrap_err();
    assert!(err.to_string().contains("MSR 0xc2 on CPU:1"));

    let mut emitted = 0;
    let result = sampler.run(Duration::ZERO, 3, |_| {
        emitted += 1;
        Ok(())
    });
    assert!(result.is_err());
    assert_eq!(emitted, 0);
}

#[test]
fn test_denied_msr_open_surfaces_cpu() {
    let hw = sandy_bridge();
    hw.deny_open(CpuId(3));
    let cpus = vec![cpu(0, 0), cpu(1, 1), cpu(2, 0), cpu(3, 1)];
    let session = plan_session(&hw, cpus, &UOPS_DISPATCHED_PORT).unwrap();

    let err = start_session(hw.clone(), &session).err().unwrap();
    assert!(err.is_permission_denied());
    assert!(matches!(err, PortStatError::MsrAccess { cpu: CpuId(3), .. }));
}

#[test]
fn test_run_emits_requested_count_for_every_core() {
    let hw = sandy_bridge();
    let cpus = vec![cpu(0, 0), cpu(1, 1), cpu(2, 0), cpu(3, 1)];
    let session = plan_session(&hw, cpus, &UOPS_DISPATCHED_PORT).unwrap();

    hw.push_tsc([0, 10, 20, 30]);
    let mut sampler = start_session(hw.clone(), &session).unwrap();

    // Core 1 = CPUs 1 and 3; its sixth port is slot 1 on CPU 3
    hw.set_register(CpuId(3), PMC[1], 5);

    let mut rows = Vec::new();
    let ticks = sampler
        .run(Duration::ZERO, 3, |sample| {
            rows.push(sample.clone());
            Ok(())
        })
        .unwrap();

    assert_eq!(ticks, 3);
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.cores.len() == 2 && r.elapsed_cycles == 10));
    assert!((rows[0].cores[1].percentages[5] - 50.0).abs() < 1e-9);
    assert_eq!(rows[1].cores[1].percentages[5], 0.0);
    assert!(rows[0].cores[0].percentages.iter().all(|p| *p == 0.0));
}
