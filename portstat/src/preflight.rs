//! Pre-flight checks for portstat
//!
//! Validates access requirements before opening MSR device nodes.
//! Provides clear, actionable error messages when requirements aren't met.

#![allow(unsafe_code)] // geteuid() requires unsafe

use anyhow::{bail, Result};
use std::path::Path;

use crate::domain::CpuId;
use crate::hardware::native::msr_path;

/// Run all pre-flight checks before opening MSR handles
pub fn run_preflight_checks(msr_dir: &Path, first_cpu: CpuId) -> Result<()> {
    check_msr_driver(msr_dir, first_cpu)?;
    check_privileges()?;
    Ok(())
}

/// Check if running with sufficient privileges for MSR writes
fn check_privileges() -> Result<()> {
    if unsafe { libc::geteuid() } == 0 {
        return Ok(());
    }

    // CAP_SYS_RAWIO alone is not enough: the msr driver also checks file
    // permissions on the device node, which default to root-only
    bail!(
        "Permission denied: portstat requires root privileges to program MSRs.\n\n\
         Run with: sudo portstat ..."
    );
}

/// Check that the msr driver exposes a device node for `cpu`
fn check_msr_driver(msr_dir: &Path, cpu: CpuId) -> Result<()> {
    let path = msr_path(msr_dir, cpu);
    if !path.exists() {
        bail!(
            "MSR device not found: {}\n\n\
             Load the msr driver with: sudo modprobe msr",
            path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_msr_driver() {
        let result = check_msr_driver(Path::new("/nonexistent/cpu"), CpuId(0));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("modprobe msr"));
        assert!(err.contains("/nonexistent/cpu/0/msr"));
    }

    #[test]
    fn test_present_msr_node() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("3")).unwrap();
        std::fs::write(dir.path().join("3").join("msr"), b"").unwrap();
        assert!(check_msr_driver(dir.path(), CpuId(3)).is_ok());
    }

    #[test]
    fn test_privilege_check_matches_euid() {
        let is_root = unsafe { libc::geteuid() } == 0;
        assert_eq!(check_privileges().is_ok(), is_root);
    }
}
