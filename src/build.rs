//! Driving the generated Makefile across kernel versions.
//!
//! Which versions to build for comes from the build root's installed
//! module directories, or from an explicit override list; it is
//! deliberately independent of the version manifest.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use crate::exec::run_streaming;
use crate::version::semver_key;

/// Kernel versions installed in the build root: the non-hidden directory
/// names under `<chroot_root>/lib/modules`, oldest first.
pub fn installed_kernel_versions(chroot_root: &Path) -> Result<Vec<String>> {
    let modules_dir = chroot_root.join("lib/modules");
    let mut versions = Vec::new();
    for entry in fs::read_dir(&modules_dir)
        .with_context(|| format!("reading modules directory '{}'", modules_dir.display()))?
    {
        let entry = entry
            .with_context(|| format!("iterating modules directory '{}'", modules_dir.display()))?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        versions.push(name.to_string());
    }
    versions.sort_by(|a, b| semver_key(a).cmp(&semver_key(b)).then_with(|| a.cmp(b)));
    Ok(versions)
}

/// The version list a build or Makefile generation runs against: the
/// override when given, otherwise the installed versions. Resolving zero
/// versions is a configuration error.
pub fn kernel_versions_for_build(
    override_list: Option<&[String]>,
    chroot_root: &Path,
) -> Result<Vec<String>> {
    let versions = match override_list {
        Some(list) => list.to_vec(),
        None => installed_kernel_versions(chroot_root)?,
    };
    if versions.is_empty() {
        bail!(
            "no kernel versions found under '{}' and none given on the command line",
            chroot_root.join("lib/modules").display()
        );
    }
    Ok(versions)
}

/// Build every version, then package once.
///
/// Invokes `driver-<version>` for every version except the last and the
/// aggregate `all` target for the final one, so the packaging side effects
/// of `all` run exactly once, after every other version has been built.
pub fn build_all(build_dir: &Path, versions: &[String], jobs: usize) -> Result<()> {
    if versions.is_empty() {
        bail!("no kernel versions to build");
    }
    let (head, last) = versions.split_at(versions.len() - 1);
    for version in head {
        println!("[build] driver for kernel {version}");
        run_make(build_dir, &format!("driver-{version}"), jobs)?;
    }
    println!("[build] kernel {} and packaging", last[0]);
    run_make(build_dir, "all", jobs)?;
    Ok(())
}

fn run_make(build_dir: &Path, target: &str, jobs: usize) -> Result<()> {
    let mut args = vec!["-C".to_string(), build_dir.display().to_string()];
    if jobs > 1 {
        args.push("-j".to_string());
        args.push(jobs.to_string());
    }
    args.push(target.to_string());
    run_streaming("make", &args).map(|_| ())
}

/// Default `-j` degree for make invocations.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
