//! Target root-filesystem descriptor parsing.
//!
//! The target image ships a descriptor file in environment-file syntax
//! (`KEY=value` lines, values optionally quoted). Two keys matter here:
//! `RPI_KERNEL_VER_LIST`, a comma-separated list of kernel version tokens
//! whose platform suffixes identify the header flavors the image needs, and
//! `TARGET_ARCH`, the Debian architecture the driver package is built for.

use anyhow::{anyhow, bail, Result};
use regex::Regex;
use std::sync::LazyLock;

static PLATFORM_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(rpi-.+)$").expect("platform suffix pattern"));

/// Look up a key in env-file style descriptor text.
///
/// Comment lines and lines without `=` are skipped; a matching single- or
/// double-quote pair around the value is stripped.
fn descriptor_value(descriptor: &str, key: &str) -> Option<String> {
    for line in descriptor.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        if name.trim() != key {
            continue;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('\'')
            .and_then(|v| v.strip_suffix('\''))
            .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
            .unwrap_or(value);
        return Some(value.to_string());
    }
    None
}

/// Recover the kernel platform tags the target descriptor declares.
///
/// Each comma-separated token of `RPI_KERNEL_VER_LIST` contributes the
/// substring from its trailing `-rpi-` family marker to the end of the
/// token. Token order is preserved and tokens without a platform suffix
/// (including the usual trailing empty token) are skipped.
///
/// Recovering zero platforms means the target environment is broken and is
/// a hard error, not a retry condition.
pub fn target_platforms(descriptor: &str) -> Result<Vec<String>> {
    let verlist = descriptor_value(descriptor, "RPI_KERNEL_VER_LIST").unwrap_or_default();
    let platforms: Vec<String> = verlist
        .split(',')
        .filter_map(|token| PLATFORM_SUFFIX.captures(token.trim()))
        .map(|caps| caps[1].to_string())
        .collect();
    if platforms.is_empty() {
        bail!("no Raspberry Pi kernel versions found in target descriptor (RPI_KERNEL_VER_LIST)");
    }
    Ok(platforms)
}

/// Read the target architecture from the descriptor.
pub fn target_arch(descriptor: &str) -> Result<String> {
    descriptor_value(descriptor, "TARGET_ARCH")
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow!("could not determine target architecture (TARGET_ARCH)"))
}
