//! Debian staging tree: control file and maintainer scripts.
//!
//! The generated Makefile stages artifacts under `staging/`; this module
//! writes the `staging/DEBIAN/` metadata that turns the tree into a
//! package. The control file's dependency range comes straight from the
//! resolved bounds: the package depends on at least the lowest supported
//! kernel and breaks with anything newer than the highest.

use anyhow::{bail, Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::manifest::DependencyBounds;

/// Inputs for the Debian metadata renderers, enumerated.
#[derive(Debug, Clone)]
pub struct DebianContext<'a> {
    pub package: &'a str,
    pub version: &'a str,
    pub architecture: &'a str,
    pub maintainer: &'a str,
    pub description: &'a str,
    pub module: Option<&'a str>,
    pub dts_only: bool,
    pub bounds: &'a DependencyBounds,
}

/// Write `staging/DEBIAN/` under `root`.
///
/// Module packages get `control`, `preinst`, `postinst`, and `postrm`;
/// overlay-only packages get `control` and `preinst`. Maintainer scripts
/// are written executable.
pub fn create_staging(root: &Path, ctx: &DebianContext) -> Result<()> {
    let debian_dir = root.join("staging/DEBIAN");
    fs::create_dir_all(&debian_dir)
        .with_context(|| format!("creating staging directory '{}'", debian_dir.display()))?;

    write_metadata_file(&debian_dir.join("control"), &render_control(ctx), false)?;
    write_metadata_file(&debian_dir.join("preinst"), &render_preinst(), true)?;

    if !ctx.dts_only {
        let Some(module) = ctx.module else {
            bail!(
                "package '{}' ships a kernel module but no module name is configured",
                ctx.package
            );
        };
        write_metadata_file(
            &debian_dir.join("postinst"),
            &render_postinst(module),
            true,
        )?;
        write_metadata_file(&debian_dir.join("postrm"), &render_postrm(module), true)?;
    }
    Ok(())
}

fn write_metadata_file(path: &Path, content: &str, executable: bool) -> Result<()> {
    fs::write(path, content).with_context(|| format!("writing '{}'", path.display()))?;
    if executable {
        let mut perms = fs::metadata(path)
            .with_context(|| format!("reading metadata of '{}'", path.display()))?
            .permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms)
            .with_context(|| format!("marking '{}' executable", path.display()))?;
    }
    Ok(())
}

fn render_control(ctx: &DebianContext) -> String {
    let mut out = String::new();
    out.push_str(&format!("Package: {}\n", ctx.package));
    out.push_str(&format!("Version: {}\n", ctx.version));
    out.push_str("Section: kernel\n");
    out.push_str("Priority: optional\n");
    out.push_str(&format!("Architecture: {}\n", ctx.architecture));
    out.push_str(&format!("Maintainer: {}\n", ctx.maintainer));
    if !ctx.bounds.min_supported.is_empty() {
        let depends: Vec<String> = ctx
            .bounds
            .min_supported
            .iter()
            .map(|bound| format!("{} (>={})", bound.package, bound.version))
            .collect();
        out.push_str(&format!("Depends: {}\n", depends.join(", ")));
    }
    if !ctx.bounds.max_supported.is_empty() {
        let breaks: Vec<String> = ctx
            .bounds
            .max_supported
            .iter()
            .map(|bound| format!("{} (>>{})", bound.package, bound.version))
            .collect();
        out.push_str(&format!("Breaks: {}\n", breaks.join(", ")));
    }
    out.push_str(&format!("Description: {}\n", ctx.description));
    out
}

fn render_preinst() -> String {
    "#!/bin/sh\nset -e\nexit 0\n".to_string()
}

fn render_postinst(module: &str) -> String {
    format!("#!/bin/sh\nset -e\ndepmod -a\nmodprobe {module} || true\nexit 0\n")
}

fn render_postrm(module: &str) -> String {
    format!("#!/bin/sh\nset -e\nrmmod {module} || true\ndepmod -a\nexit 0\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::DependencyBound;
    use tempfile::TempDir;

    fn sample_bounds() -> DependencyBounds {
        DependencyBounds {
            min_supported: vec![
                DependencyBound {
                    package: "linux-image-testproj".to_string(),
                    version: "1:6.12.34+rpt-testproj".to_string(),
                },
                DependencyBound {
                    package: "linux-headers-testproj".to_string(),
                    version: "1:6.12.34+rpt-testproj".to_string(),
                },
            ],
            max_supported: vec![
                DependencyBound {
                    package: "linux-image-testproj".to_string(),
                    version: "1:6.12.62+rpt-testproj".to_string(),
                },
                DependencyBound {
                    package: "linux-headers-testproj".to_string(),
                    version: "1:6.12.62+rpt-testproj".to_string(),
                },
            ],
        }
    }

    #[test]
    fn control_carries_bound_dependency_range() {
        let bounds = sample_bounds();
        let ctx = DebianContext {
            package: "testproj",
            version: "1.0",
            architecture: "arm64",
            maintainer: "maint",
            description: "desc",
            module: Some("testmod"),
            dts_only: false,
            bounds: &bounds,
        };
        let control = render_control(&ctx);
        assert!(control.contains("Package: testproj"));
        assert!(control.contains("Version: 1.0"));
        assert!(control.contains("Maintainer: maint"));
        assert!(control.contains("linux-image-testproj (>=1:6.12.34+rpt-testproj)"));
        assert!(control.contains("linux-headers-testproj (>=1:6.12.34+rpt-testproj)"));
        assert!(control.contains("linux-image-testproj (>>1:6.12.62+rpt-testproj)"));
        assert!(control.contains("linux-headers-testproj (>>1:6.12.62+rpt-testproj)"));
    }

    #[test]
    fn module_package_gets_all_maintainer_scripts() {
        let tmp = TempDir::new().unwrap();
        let bounds = sample_bounds();
        let ctx = DebianContext {
            package: "testproj",
            version: "1.0",
            architecture: "arm64",
            maintainer: "maint",
            description: "desc",
            module: Some("testmod"),
            dts_only: false,
            bounds: &bounds,
        };
        create_staging(tmp.path(), &ctx).unwrap();

        let debian = tmp.path().join("staging/DEBIAN");
        for name in ["control", "preinst", "postinst", "postrm"] {
            assert!(debian.join(name).is_file(), "missing {name}");
        }
        let postinst_mode = fs::metadata(debian.join("postinst"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(postinst_mode & 0o777, 0o755);
        let postinst = fs::read_to_string(debian.join("postinst")).unwrap();
        assert!(postinst.contains("modprobe testmod"));
        let postrm = fs::read_to_string(debian.join("postrm")).unwrap();
        assert!(postrm.contains("rmmod testmod"));
    }

    #[test]
    fn overlay_package_gets_control_and_preinst_only() {
        let tmp = TempDir::new().unwrap();
        let bounds = sample_bounds();
        let ctx = DebianContext {
            package: "myoverlay",
            version: "1.0",
            architecture: "arm64",
            maintainer: "maint",
            description: "desc",
            module: None,
            dts_only: true,
            bounds: &bounds,
        };
        create_staging(tmp.path(), &ctx).unwrap();

        let debian = tmp.path().join("staging/DEBIAN");
        assert!(debian.join("control").is_file());
        assert!(debian.join("preinst").is_file());
        assert!(!debian.join("postinst").exists());
        assert!(!debian.join("postrm").exists());
    }
}
