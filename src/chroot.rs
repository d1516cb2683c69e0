//! Build-chroot package operations.
//!
//! Kernel headers are listed and installed inside a schroot session on the
//! build host. This module only shapes and runs the commands; the engine
//! consumes their text output elsewhere.

use anyhow::{Context, Result};
use std::path::Path;

use crate::exec::run_streaming;

/// A named schroot session wrapping apt operations as root.
#[derive(Debug, Clone)]
pub struct BuildChroot {
    name: String,
}

impl BuildChroot {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Derive the schroot session name from the build-root path (its final
    /// component, e.g. `/var/chroot/buildroot/` -> `buildroot`).
    pub fn from_root(chroot_root: &Path) -> Result<Self> {
        let name = chroot_root
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| {
                format!(
                    "deriving schroot session name from '{}'",
                    chroot_root.display()
                )
            })?;
        Ok(Self::new(name))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn run_apt(&self, apt_args: &[String]) -> Result<String> {
        let mut args = vec![
            "-c".to_string(),
            self.name.clone(),
            "-u".to_string(),
            "root".to_string(),
            "-d".to_string(),
            "/".to_string(),
            "--".to_string(),
            "apt".to_string(),
        ];
        args.extend(apt_args.iter().cloned());
        run_streaming("schroot", &args)
    }

    pub fn apt_update(&self) -> Result<()> {
        self.run_apt(&["update".to_string()]).map(|_| ())
    }

    /// List matching packages; returns the raw listing text for parsing.
    pub fn apt_list(&self, globs: &[String]) -> Result<String> {
        let mut args = vec!["list".to_string(), "-a".to_string()];
        args.extend(globs.iter().cloned());
        self.run_apt(&args)
    }

    pub fn apt_install(&self, packages: &[String]) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }
        let mut args = vec![
            "install".to_string(),
            "-y".to_string(),
            "--no-install-recommends".to_string(),
        ];
        args.extend(packages.iter().cloned());
        self.run_apt(&args).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_name_from_root_path() {
        let chroot = BuildChroot::from_root(Path::new("/var/chroot/buildroot/")).unwrap();
        assert_eq!(chroot.name(), "buildroot");
        let chroot = BuildChroot::from_root(Path::new("/srv/chroots/trixie-arm64")).unwrap();
        assert_eq!(chroot.name(), "trixie-arm64");
    }

    #[test]
    fn rootless_path_is_rejected() {
        assert!(BuildChroot::from_root(Path::new("/")).is_err());
    }
}
