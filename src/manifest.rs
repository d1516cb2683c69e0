//! Kernel version selection and the persisted version manifest.
//!
//! The manifest records which kernel versions were selected per platform,
//! as a JSON object at a fixed filename. Once written it is the single
//! source of truth: later runs derive packaging dependency bounds from it
//! without touching the chroot or the network, and its mere presence tells
//! the resolution flow that nothing is left to do.

use anyhow::{Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Reverse;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::version::semver_key;

/// Fixed manifest filename; presence marks the resolution as done.
pub const MANIFEST_FILENAME: &str = "kernel_version_file_list.json";

/// Ordered mapping of platform tag to kernel version ids.
///
/// Platform order is first-seen insertion order, in memory and on disk.
/// Serializes as a plain JSON object so the manifest stays hand-readable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformVersions {
    entries: Vec<(String, Vec<String>)>,
}

impl PlatformVersions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the version list for a platform.
    pub fn insert(&mut self, platform: impl Into<String>, versions: Vec<String>) {
        let platform = platform.into();
        match self.entries.iter_mut().find(|(p, _)| *p == platform) {
            Some(entry) => entry.1 = versions,
            None => self.entries.push((platform, versions)),
        }
    }

    pub fn get(&self, platform: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(p, _)| p == platform)
            .map(|(_, versions)| versions.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(platform, versions)| (platform.as_str(), versions.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for PlatformVersions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (platform, versions) in &self.entries {
            map.serialize_entry(platform, versions)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PlatformVersions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MapVisitor;

        impl<'de> Visitor<'de> for MapVisitor {
            type Value = PlatformVersions;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of platform tags to version lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = PlatformVersions::new();
                while let Some((platform, versions)) = access.next_entry::<String, Vec<String>>()? {
                    out.insert(platform, versions);
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(MapVisitor)
    }
}

/// A (package, version) pair bounding one end of a packaging dependency's
/// acceptable install range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyBound {
    pub package: String,
    pub version: String,
}

/// Per-platform minimum and maximum supported kernel package versions,
/// in manifest platform order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyBounds {
    pub min_supported: Vec<DependencyBound>,
    pub max_supported: Vec<DependencyBound>,
}

pub fn manifest_path(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_FILENAME)
}

/// Whether a manifest has already been written under `dir`.
pub fn manifest_exists(dir: &Path) -> bool {
    manifest_path(dir).is_file()
}

/// Package references to install: the first `count` versions of every
/// platform, formatted as installable `linux-headers-<id>` names and
/// concatenated in platform order. `count == 0` selects nothing.
pub fn install_set(count: usize, available: &PlatformVersions) -> Vec<String> {
    let mut packages = Vec::new();
    for (_, versions) in available.iter() {
        packages.extend(
            versions
                .iter()
                .take(count)
                .map(|version| format!("linux-headers-{version}")),
        );
    }
    packages
}

/// Select the `count` newest versions per platform and persist the result.
///
/// Each pool is re-sorted newest-first (idempotent when already sorted)
/// before truncation. The manifest file under `dir` is overwritten; the
/// stored mapping is returned.
pub fn select_and_store(
    count: usize,
    available: &PlatformVersions,
    dir: &Path,
) -> Result<PlatformVersions> {
    let mut manifest = PlatformVersions::new();
    for (platform, versions) in available.iter() {
        let mut versions = versions.to_vec();
        versions.sort_by_key(|version| Reverse(semver_key(version)));
        versions.truncate(count);
        manifest.insert(platform, versions);
    }
    let path = manifest_path(dir);
    let bytes = serde_json::to_vec_pretty(&manifest).context("encoding kernel version manifest")?;
    fs::write(&path, bytes)
        .with_context(|| format!("writing kernel version manifest '{}'", path.display()))?;
    Ok(manifest)
}

/// Derive packaging dependency bounds from a selected version mapping.
///
/// Per platform the pool is sorted ascending, so the lowest and highest
/// versions fall out positionally no matter how the list was ordered on
/// disk. Both the image and the headers package get one bound per end.
pub fn bounds_from_manifest(manifest: &PlatformVersions) -> DependencyBounds {
    let mut bounds = DependencyBounds::default();
    for (platform, versions) in manifest.iter() {
        let mut versions = versions.to_vec();
        versions.sort_by_key(|version| semver_key(version));
        let (Some(lowest), Some(highest)) = (versions.first(), versions.last()) else {
            continue;
        };
        for package in [
            format!("linux-image-{platform}"),
            format!("linux-headers-{platform}"),
        ] {
            bounds.min_supported.push(DependencyBound {
                package: package.clone(),
                version: format!("1:{lowest}"),
            });
            bounds.max_supported.push(DependencyBound {
                package,
                version: format!("1:{highest}"),
            });
        }
    }
    bounds
}

/// Load the stored manifest under `dir` and derive bounds from it.
///
/// A missing file is a hard error; callers decide between resolving and
/// loading by checking [`manifest_exists`] first.
pub fn load_manifest(dir: &Path) -> Result<DependencyBounds> {
    let path = manifest_path(dir);
    let bytes = fs::read(&path)
        .with_context(|| format!("reading kernel version manifest '{}'", path.display()))?;
    let manifest: PlatformVersions = serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing kernel version manifest '{}'", path.display()))?;
    Ok(bounds_from_manifest(&manifest))
}
