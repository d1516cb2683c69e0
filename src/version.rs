//! Ordering keys for kernel version identifiers.
//!
//! Kernel header packages carry version ids like `6.12.47+rpt-rpi-v8`: a
//! dotted numeric triple, an optional build-metadata suffix, and a platform
//! tag. Every ordering decision in this crate (newest-first selection,
//! min/max dependency bounds) reduces to comparing the leading triple.

use regex::Regex;
use std::sync::LazyLock;

static SEMVER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)\.([0-9]+)\.([0-9]+)").expect("semver prefix pattern"));

/// Sort key extracted from the leading `MAJOR.MINOR.PATCH` of a version id.
///
/// Orders lexicographically on the triple. Version ids without a leading
/// triple map to the low sentinel `(0, 0, 0)` and sort before everything
/// that has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemverKey(pub u64, pub u64, pub u64);

/// Extract the [`SemverKey`] of a version id.
///
/// Total over arbitrary input: malformed ids yield the sentinel key rather
/// than an error. Callers pick the sort direction per use site.
pub fn semver_key(version_id: &str) -> SemverKey {
    match SEMVER_PREFIX.captures(version_id) {
        Some(caps) => {
            let part = |i: usize| caps[i].parse::<u64>().unwrap_or(u64::MAX);
            SemverKey(part(1), part(2), part(3))
        }
        None => SemverKey(0, 0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_leading_triple() {
        assert_eq!(semver_key("6.12.34+rpt-rpi-v8"), SemverKey(6, 12, 34));
        assert_eq!(semver_key("1.2.3"), SemverKey(1, 2, 3));
    }

    #[test]
    fn sentinel_for_non_numeric_input() {
        assert_eq!(semver_key("foo"), SemverKey(0, 0, 0));
        assert_eq!(semver_key(""), SemverKey(0, 0, 0));
        assert_eq!(semver_key("6.12-rpi-v8"), SemverKey(0, 0, 0));
    }

    #[test]
    fn orders_numerically_not_lexically() {
        assert!(semver_key("6.6.73+rpt-rpi-v8") < semver_key("6.12.25+rpt-rpi-v8"));
        assert!(semver_key("6.12.47+rpt-rpi-v8") < semver_key("6.12.62+rpt-rpi-v8"));
        assert!(semver_key("foo") < semver_key("0.0.1"));
    }
}
