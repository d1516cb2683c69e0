//! Top-level kernel version resolution.
//!
//! The stored manifest is the commit point: it is written only after the
//! selected headers installed successfully, and from then on every run
//! derives its dependency bounds from the file alone. A run that fails
//! before the manifest write leaves nothing behind and is simply re-run.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::chroot::BuildChroot;
use crate::listing::parse_versions;
use crate::manifest::{
    self, bounds_from_manifest, install_set, load_manifest, select_and_store, DependencyBounds,
};
use crate::target::target_platforms;

pub struct ResolveOptions<'a> {
    /// Build chroot holding (and receiving) the kernel header packages.
    pub chroot: &'a BuildChroot,
    /// Target root directory containing the `target` descriptor file.
    pub target_dir: &'a Path,
    /// Newest versions to keep per platform.
    pub keep_count: usize,
    /// Directory holding the version manifest.
    pub manifest_dir: &'a Path,
}

/// Resolve the packaging dependency bounds, installing kernel headers and
/// recording the selection on the first run only.
///
/// When the manifest already exists this issues no chroot or package
/// manager commands at all.
pub fn resolve_dependency_bounds(opts: &ResolveOptions) -> Result<DependencyBounds> {
    if manifest::manifest_exists(opts.manifest_dir) {
        println!(
            "[resolve] using existing manifest {}",
            manifest::manifest_path(opts.manifest_dir).display()
        );
        return load_manifest(opts.manifest_dir);
    }

    println!(
        "[resolve] updating package lists in chroot '{}'",
        opts.chroot.name()
    );
    opts.chroot.apt_update()?;

    let descriptor_path = opts.target_dir.join("target");
    let descriptor = fs::read_to_string(&descriptor_path)
        .with_context(|| format!("reading target descriptor '{}'", descriptor_path.display()))?;
    let platforms = target_platforms(&descriptor)?;
    println!("[resolve] target platforms: {}", platforms.join(", "));

    let globs: Vec<String> = platforms
        .iter()
        .map(|platform| format!("linux-headers-*-{platform}"))
        .collect();
    let listing = opts.chroot.apt_list(&globs)?;
    let available = parse_versions(&listing, &platforms);

    let to_install = install_set(opts.keep_count, &available);
    println!(
        "[resolve] installing {} kernel header package(s)",
        to_install.len()
    );
    opts.chroot.apt_install(&to_install)?;

    let stored = select_and_store(opts.keep_count, &available, opts.manifest_dir)?;
    println!(
        "[resolve] stored manifest {}",
        manifest::manifest_path(opts.manifest_dir).display()
    );
    Ok(bounds_from_manifest(&stored))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::PlatformVersions;
    use tempfile::TempDir;

    #[test]
    fn existing_manifest_short_circuits_all_external_commands() {
        let tmp = TempDir::new().unwrap();
        let mut available = PlatformVersions::new();
        available.insert(
            "rpi-v8",
            vec![
                "6.12.62+rpt-rpi-v8".to_string(),
                "6.12.34+rpt-rpi-v8".to_string(),
            ],
        );
        select_and_store(2, &available, tmp.path()).unwrap();

        // The chroot points at a session that does not exist; any command
        // against it would fail, so returning bounds proves none ran.
        let chroot = BuildChroot::new("no-such-session");
        let opts = ResolveOptions {
            chroot: &chroot,
            target_dir: tmp.path(),
            keep_count: 2,
            manifest_dir: tmp.path(),
        };
        let first = resolve_dependency_bounds(&opts).unwrap();
        let second = resolve_dependency_bounds(&opts).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.min_supported[0].version, "1:6.12.34+rpt-rpi-v8");
        assert_eq!(first.max_supported[0].version, "1:6.12.62+rpt-rpi-v8");
    }
}
