//! Driver project descriptor.
//!
//! Every driver project carries a `driver.toml` at its root naming the
//! package, the kernel module, and the packaging metadata. All renderer
//! inputs come from this file or the command line; nothing is looked up
//! dynamically later.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::process::Command;

pub const PROJECT_CONFIG_FILENAME: &str = "driver.toml";

/// Loaded project descriptor with defaults applied.
#[derive(Debug, Clone)]
pub struct DriverProject {
    pub project: String,
    pub module: Option<String>,
    pub source_dir: String,
    pub kbuild_flags: String,
    pub maintainer: String,
    pub description: String,
    pub version: String,
    pub dts_only: bool,
    pub blacklist: Option<String>,
    pub public_header: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DriverConfigToml {
    driver: DriverToml,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DriverToml {
    project: String,
    module: Option<String>,
    source_dir: Option<String>,
    kbuild_flags: Option<String>,
    maintainer: String,
    description: String,
    version: String,
    dts_only: Option<bool>,
    blacklist: Option<String>,
    public_header: Option<String>,
}

/// Load and validate `<project_dir>/driver.toml`.
///
/// `version = "auto"` is resolved from the project's source-control tags
/// at load time, so the rest of the tool only ever sees a concrete
/// version string.
pub fn load_project(project_dir: &Path) -> Result<DriverProject> {
    let config_path = project_dir.join(PROJECT_CONFIG_FILENAME);
    let raw = fs::read_to_string(&config_path)
        .with_context(|| format!("reading project config '{}'", config_path.display()))?;
    let parsed: DriverConfigToml = toml::from_str(&raw)
        .with_context(|| format!("parsing project config '{}'", config_path.display()))?;
    let driver = parsed.driver;

    if driver.project.trim().is_empty() || driver.project.contains(['/', ' ']) {
        bail!(
            "invalid project name '{}' in '{}'",
            driver.project,
            config_path.display()
        );
    }
    let dts_only = driver.dts_only.unwrap_or(false);
    if !dts_only && driver.module.is_none() {
        bail!(
            "project config '{}' must set 'module' unless dts_only = true",
            config_path.display()
        );
    }

    let version = if driver.version == "auto" {
        version_from_git(project_dir)?
    } else {
        driver.version
    };

    Ok(DriverProject {
        project: driver.project,
        module: driver.module,
        source_dir: driver.source_dir.unwrap_or_else(|| "src".to_string()),
        kbuild_flags: driver.kbuild_flags.unwrap_or_default(),
        maintainer: driver.maintainer,
        description: driver.description,
        version,
        dts_only,
        blacklist: driver.blacklist,
        public_header: driver.public_header,
    })
}

/// Derive a version string from `git describe --tags --always`, without a
/// leading `v`.
pub fn version_from_git(project_dir: &Path) -> Result<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(project_dir)
        .args(["describe", "--tags", "--always"])
        .output()
        .with_context(|| format!("running git describe in '{}'", project_dir.display()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "git describe failed in '{}': {}",
            project_dir.display(),
            stderr.trim()
        );
    }
    let described = String::from_utf8_lossy(&output.stdout)
        .trim()
        .trim_start_matches('v')
        .to_string();
    if described.is_empty() {
        bail!(
            "git describe returned empty output in '{}'",
            project_dir.display()
        );
    }
    Ok(described)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &Path, body: &str) {
        fs::write(dir.join(PROJECT_CONFIG_FILENAME), body).unwrap();
    }

    #[test]
    fn loads_full_config_with_defaults() {
        let tmp = TempDir::new().unwrap();
        write_config(
            tmp.path(),
            r#"
[driver]
project = "mydriver"
module = "mymod"
maintainer = "Jo Developer <jo@example.com>"
description = "An expansion-board driver"
version = "1.2.0"
"#,
        );
        let project = load_project(tmp.path()).unwrap();
        assert_eq!(project.project, "mydriver");
        assert_eq!(project.module.as_deref(), Some("mymod"));
        assert_eq!(project.source_dir, "src");
        assert_eq!(project.kbuild_flags, "");
        assert_eq!(project.version, "1.2.0");
        assert!(!project.dts_only);
        assert!(project.blacklist.is_none());
    }

    #[test]
    fn overlay_only_project_needs_no_module() {
        let tmp = TempDir::new().unwrap();
        write_config(
            tmp.path(),
            r#"
[driver]
project = "myoverlay"
maintainer = "Jo Developer <jo@example.com>"
description = "An overlay"
version = "0.3.1"
dts_only = true
source_dir = "overlay"
"#,
        );
        let project = load_project(tmp.path()).unwrap();
        assert!(project.dts_only);
        assert!(project.module.is_none());
        assert_eq!(project.source_dir, "overlay");
    }

    #[test]
    fn module_project_without_module_is_rejected() {
        let tmp = TempDir::new().unwrap();
        write_config(
            tmp.path(),
            r#"
[driver]
project = "mydriver"
maintainer = "Jo Developer <jo@example.com>"
description = "A driver"
version = "1.0.0"
"#,
        );
        assert!(load_project(tmp.path()).is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let tmp = TempDir::new().unwrap();
        write_config(
            tmp.path(),
            r#"
[driver]
project = "mydriver"
module = "mymod"
maintainer = "m"
description = "d"
version = "1.0.0"
surprise = true
"#,
        );
        assert!(load_project(tmp.path()).is_err());
    }

    #[test]
    fn missing_config_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(load_project(tmp.path()).is_err());
    }
}
