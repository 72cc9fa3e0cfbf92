//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

use crate::hardware::native::DEFAULT_MSR_DIR;
use crate::sampling::OutputFormat;
use crate::topology::DEFAULT_CPUINFO;

#[derive(Parser, Debug)]
#[command(
    name = "portstat",
    version,
    about = "Show per-core execution port utilization from hardware performance counters",
    after_help = "\
EXAMPLES:
    sudo portstat                            Sample every second until interrupted
    sudo portstat --interval 250 --count 20  20 samples, 250ms apart
    sudo portstat --format json > ports.log  One JSON object per sample"
)]
pub struct Args {
    /// Sampling interval in milliseconds
    #[arg(short, long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Stop after N samples (0 = unlimited)
    #[arg(short = 'n', long, default_value = "0")]
    pub count: u64,

    /// Topology source
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CPUINFO)]
    pub cpuinfo: PathBuf,

    /// Directory holding <cpu>/msr device nodes
    #[arg(long, value_name = "DIR", default_value = DEFAULT_MSR_DIR)]
    pub msr_dir: PathBuf,

    /// Output format for samples
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Suppress the startup banner
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["portstat"]);
        assert_eq!(args.interval, 1000);
        assert_eq!(args.count, 0);
        assert_eq!(args.cpuinfo, PathBuf::from("/proc/cpuinfo"));
        assert_eq!(args.msr_dir, PathBuf::from("/dev/cpu"));
        assert_eq!(args.format, OutputFormat::Text);
        assert!(!args.quiet);
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from(["portstat", "-i", "250", "-n", "3", "--format", "json", "-q"]);
        assert_eq!(args.interval, 250);
        assert_eq!(args.count, 3);
        assert_eq!(args.format, OutputFormat::Json);
        assert!(args.quiet);
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(Args::try_parse_from(["portstat", "--interval", "0"]).is_err());
    }
}
