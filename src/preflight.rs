//! Preflight checks for host tools.
//!
//! Validates that the build host has the required external commands before
//! any work starts, so a missing tool fails up front instead of halfway
//! through a chroot session or a make run.

use anyhow::{bail, Result};

/// Check if a command is resolvable on the host PATH.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Tools needed to resolve versions and generate the build description.
///
/// Each tuple is (command_name, package_name).
pub const GENERATE_TOOLS: &[(&str, &str)] = &[("schroot", "schroot")];

/// Tools invoked by the generated Makefile during `--build`.
pub const BUILD_TOOLS: &[(&str, &str)] = &[
    ("make", "make"),
    ("rsync", "rsync"),
    ("schroot", "schroot"),
    ("dtc", "device-tree-compiler"),
    ("dpkg-deb", "dpkg"),
];

/// Check that specific tools are available.
///
/// Returns an error listing every missing tool and the package providing
/// it.
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let mut missing = Vec::new();
    for (tool, package) in tools {
        if !command_exists(tool) {
            missing.push((*tool, *package));
        }
    }
    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(tool, package)| format!("  {} (install: {})", tool, package))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Missing required host tools:\n{}", msg);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_commands_exist() {
        assert!(command_exists("ls"));
        assert!(!command_exists("definitely_not_a_real_command_12345"));
    }

    #[test]
    fn present_tools_pass() {
        let tools = &[("ls", "coreutils"), ("cat", "coreutils")];
        assert!(check_required_tools(tools).is_ok());
    }

    #[test]
    fn missing_tools_are_listed() {
        let tools = &[("nonexistent_command_xyz", "fake-package")];
        let err = check_required_tools(tools).unwrap_err();
        assert!(err.to_string().contains("fake-package"));
    }
}
