//! # portstat - Main Entry Point
//!
//! Validates the machine, programs the port counters and prints one line per
//! interval until interrupted (or until `--count` samples were printed).

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::time::Duration;

use portstat::cli::Args;
use portstat::domain::PortStatError;
use portstat::hardware::NativeHardware;
use portstat::pmc::UOPS_DISPATCHED_PORT;
use portstat::preflight::run_preflight_checks;
use portstat::sampling::report::format_header;
use portstat::sampling::{plan_session, start_session, OutputFormat, SampleWriter};
use portstat::topology::read_cpuinfo;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_UNSUPPORTED: i32 = 3;
const EXIT_NOPERM: i32 = 77;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<PortStatError>() {
        if e.is_unsupported_hardware() {
            return EXIT_UNSUPPORTED;
        }
        if e.is_permission_denied() {
            return EXIT_NOPERM;
        }
    }

    let msg = err.to_string().to_lowercase();
    if msg.contains("permission denied") || msg.contains("requires root") {
        EXIT_NOPERM
    } else {
        EXIT_ERROR
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let hardware = NativeHardware::new(&args.msr_dir);

    // Everything that can reject the machine runs before any MSR is opened
    let processors = read_cpuinfo(&args.cpuinfo)?;
    let session = plan_session(&hardware, processors, &UOPS_DISPATCHED_PORT)?;

    let first_cpu = session
        .topology
        .processors()
        .first()
        .map(|p| p.id)
        .context("topology has no logical processors")?;
    run_preflight_checks(&args.msr_dir, first_cpu)?;

    let mut sampler = start_session(hardware, &session)?;

    if !args.quiet {
        eprintln!("portstat v{}", env!("CARGO_PKG_VERSION"));
        eprintln!("interval: {}ms", args.interval);
        if args.format == OutputFormat::Text {
            eprintln!("{}", format_header(sampler.events(), sampler.cores().len()));
        }
    }

    let mut writer = SampleWriter::new(std::io::stdout().lock(), args.format, sampler.events());
    let ticks = sampler.run(Duration::from_millis(args.interval), args.count, |sample| {
        writer.write_sample(sample)
    })?;

    info!("stopped after {ticks} samples");
    Ok(())
}
