//! Parsing of apt package-listing output into per-platform version pools.
//!
//! Input is the raw line-oriented output of `apt list` run inside the build
//! chroot, e.g.:
//!
//! ```text
//! linux-headers-6.12.47+rpt-rpi-v8/stable,now 1:6.12.47-1+rpt1 arm64 [installed]
//! ```
//!
//! Lines that do not look like a header package reference are routine noise
//! (warnings, blank separators, other packages) and are skipped silently.

use regex::Regex;
use std::cmp::Reverse;
use std::sync::LazyLock;

use crate::manifest::PlatformVersions;
use crate::version::semver_key;

static HEADER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^linux-headers-([\w.+-]+)(?:/|\s)").expect("header listing pattern")
});

/// Extract the version ids available for one platform, newest first.
///
/// A line matches when it names a `linux-headers-` package whose version
/// token ends with the platform tag. Equal [`semver_key`]s keep their
/// relative input order (stable sort); duplicate ids are preserved verbatim.
pub fn parse_versions_single(listing: &str, platform: &str) -> Vec<String> {
    let mut ids: Vec<String> = listing
        .lines()
        .filter_map(|line| {
            let caps = HEADER_LINE.captures(line)?;
            let token = caps.get(1)?.as_str();
            (token.len() > platform.len() && token.ends_with(platform))
                .then(|| token.to_string())
        })
        .collect();
    ids.sort_by_key(|id| Reverse(semver_key(id)));
    ids
}

/// Extract the version pools for every requested platform.
///
/// Platforms are independent: a line contributes at most to the platform
/// whose tag it literally ends with. The result keeps the requested
/// platform order.
pub fn parse_versions(listing: &str, platforms: &[String]) -> PlatformVersions {
    let mut available = PlatformVersions::new();
    for platform in platforms {
        available.insert(platform.clone(), parse_versions_single(listing, platform));
    }
    available
}
