//! Makefile generation: one fully instantiated target family per kernel
//! version.
//!
//! Nothing in the emitted Makefile is parameterized over "the current
//! kernel": every build, stage, and deploy target is stamped with its
//! version, and every module build runs in a scratch directory unique to
//! that version. Independent per-version targets therefore stay isolated
//! under `make -j`, and one `all` invocation builds the whole matrix with
//! packaging running exactly once at the end.

use anyhow::{bail, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Default remote used by the `quickdeploy-<version>` targets; overridable
/// at make time via `DEPLOY_HOST=`.
pub const DEFAULT_DEPLOY_HOST: &str = "crossbuilder@target";

/// Everything the Makefile renderer may read, enumerated. There are no
/// optional or dynamic lookups beyond these fields.
#[derive(Debug, Clone)]
pub struct MakefileSpec {
    /// Project (and Debian package) name.
    pub project: String,
    /// Kernel module name; required unless `dts_only`.
    pub module: Option<String>,
    /// Absolute path of the driver project checkout.
    pub project_root: PathBuf,
    /// Source directory below the project root.
    pub source_dir: String,
    /// Extra flags appended to the kbuild make invocation.
    pub kbuild_flags: String,
    /// Debian architecture tag.
    pub architecture: String,
    /// Package version stamped into the archive filename.
    pub package_version: String,
    /// Build only the device-tree overlay: no module rules, no deploys.
    pub dts_only: bool,
    /// In-tree module to blacklist on the target, if any.
    pub blacklist: Option<String>,
    /// Public header (relative to the source dir) shipped in the package.
    pub public_header: Option<String>,
    /// schroot session name of the build root holding the kernel headers.
    pub chroot_name: String,
    /// Default `DEPLOY_HOST` for quickdeploy targets.
    pub deploy_host: String,
    /// Kernel versions to build against, in input order.
    pub kernel_versions: Vec<String>,
}

impl MakefileSpec {
    fn source_path(&self) -> String {
        format!("{}/{}", self.project_root.display(), self.source_dir)
    }

    fn scratch_dir(&self, version: &str) -> String {
        format!("/tmp/drv-{}-{}", self.project, version)
    }

    fn module_artifact(&self, module: &str, version: &str) -> String {
        format!("staging/lib/modules/{version}/{module}.ko")
    }

    fn overlay_artifact(&self, version: &str) -> String {
        format!("staging/usr/lib/er-overlays/{version}/{}.dtbo", self.project)
    }
}

/// Render the multi-version build description for `spec`.
pub fn render_makefile(spec: &MakefileSpec) -> Result<String> {
    if spec.kernel_versions.is_empty() {
        bail!(
            "no kernel versions to generate build targets for project '{}'",
            spec.project
        );
    }
    let module = match (spec.dts_only, spec.module.as_deref()) {
        (true, _) => None,
        (false, Some(module)) => Some(module),
        (false, None) => bail!(
            "project '{}' builds a kernel module but no module name is configured",
            spec.project
        ),
    };

    let mut out = String::new();
    out.push_str(&format!(
        "# Makefile generated by driver-builder for {} {}. Do not edit.\n",
        spec.project, spec.package_version
    ));
    out.push_str(&format!(
        "KERNEL_VERSIONS = {}\n",
        spec.kernel_versions.join(" ")
    ));
    if module.is_some() {
        out.push_str(&format!("DEPLOY_HOST ?= {}\n", spec.deploy_host));
    }
    out.push('\n');

    render_package_target(spec, module, &mut out);
    render_aggregate_target(spec, &mut out);
    for version in &spec.kernel_versions {
        render_version_family(spec, module, version, &mut out);
    }
    render_phony(spec, module, &mut out);

    Ok(out)
}

/// Render and write the Makefile into `dir`.
pub fn write_makefile(spec: &MakefileSpec, dir: &Path) -> Result<PathBuf> {
    use anyhow::Context;

    let path = dir.join("Makefile");
    let rendered = render_makefile(spec)?;
    fs::write(&path, rendered)
        .with_context(|| format!("writing generated Makefile '{}'", path.display()))?;
    Ok(path)
}

/// `all`: every driver plus the packaging steps, which must run once and
/// last.
fn render_package_target(spec: &MakefileSpec, module: Option<&str>, out: &mut String) {
    out.push_str("all: all-drivers");
    if module.is_some() {
        for version in &spec.kernel_versions {
            out.push_str(&format!(" {}", spec.overlay_artifact(version)));
        }
    }
    out.push('\n');
    if let Some(blacklisted) = &spec.blacklist {
        out.push_str("\tmkdir -p staging/etc/modprobe.d\n");
        out.push_str(&format!(
            "\tprintf 'blacklist {}\\n' > staging/etc/modprobe.d/{}.conf\n",
            blacklisted, spec.project
        ));
    }
    if let Some(header) = &spec.public_header {
        out.push_str("\tmkdir -p staging/usr/include\n");
        out.push_str(&format!(
            "\tcp {}/{} staging/usr/include/\n",
            spec.source_path(),
            header
        ));
    }
    out.push_str(&format!(
        "\tdpkg-deb --root-owner-group --build staging {}_{}_{}.deb\n\n",
        spec.project, spec.package_version, spec.architecture
    ));
}

fn render_aggregate_target(spec: &MakefileSpec, out: &mut String) {
    out.push_str("all-drivers:");
    for version in &spec.kernel_versions {
        out.push_str(&format!(" driver-{version}"));
    }
    out.push_str("\n\n");
}

/// The per-version target family: driver alias, artifact rules, and (with a
/// module) the quickdeploy target.
fn render_version_family(
    spec: &MakefileSpec,
    module: Option<&str>,
    version: &str,
    out: &mut String,
) {
    match module {
        Some(module) => {
            out.push_str(&format!(
                "driver-{version}: {}\n\n",
                spec.module_artifact(module, version)
            ));
            render_module_rule(spec, module, version, out);
            render_overlay_rule(spec, version, out);
            render_quickdeploy_rule(spec, module, version, out);
        }
        None => {
            out.push_str(&format!(
                "driver-{version}: {}\n\n",
                spec.overlay_artifact(version)
            ));
            render_overlay_rule(spec, version, out);
        }
    }
}

/// Kernel module build rule. The scratch directory embeds the project name
/// and the kernel version: concurrent builds of different versions must
/// never share a mutable build directory.
fn render_module_rule(spec: &MakefileSpec, module: &str, version: &str, out: &mut String) {
    let scratch = spec.scratch_dir(version);
    let artifact = spec.module_artifact(module, version);
    let kbuild_flags = if spec.kbuild_flags.is_empty() {
        String::new()
    } else {
        format!(" {}", spec.kbuild_flags)
    };
    out.push_str(&format!("{artifact}:\n"));
    out.push_str(&format!("\tmkdir -p {scratch}\n"));
    out.push_str(&format!(
        "\trsync --delete -r {}/ {scratch}\n",
        spec.source_path()
    ));
    out.push_str(&format!(
        "\tschroot -c {} -u root -d {scratch} -- make -C /usr/src/linux-headers-{version} M={scratch} ARCH={}{kbuild_flags} modules\n",
        spec.chroot_name, spec.architecture
    ));
    out.push_str(&format!("\tmkdir -p staging/lib/modules/{version}\n"));
    out.push_str(&format!(
        "\tcp {scratch}/{module}.ko staging/lib/modules/{version}/\n\n"
    ));
}

fn render_overlay_rule(spec: &MakefileSpec, version: &str, out: &mut String) {
    let artifact = spec.overlay_artifact(version);
    let source = format!("{}/{}-overlay.dts", spec.source_path(), spec.project);
    out.push_str(&format!("{artifact}: {source}\n"));
    out.push_str(&format!(
        "\tmkdir -p staging/usr/lib/er-overlays/{version}\n"
    ));
    out.push_str(&format!("\tdtc -@ -I dts -O dtb -o {artifact} {source}\n\n"));
}

/// Copy the staged module to the deploy host and reload it there.
fn render_quickdeploy_rule(spec: &MakefileSpec, module: &str, version: &str, out: &mut String) {
    let artifact = spec.module_artifact(module, version);
    out.push_str(&format!("quickdeploy-{version}: driver-{version}\n"));
    out.push_str(&format!(
        "\tscp {artifact} $(DEPLOY_HOST):/tmp/{module}.ko\n"
    ));
    out.push_str(&format!(
        "\tssh $(DEPLOY_HOST) 'sudo install -m 0644 -D /tmp/{module}.ko /lib/modules/{version}/extra/{module}.ko && sudo depmod {version}'\n"
    ));
    out.push_str(&format!(
        "\tssh $(DEPLOY_HOST) 'sudo rmmod {module} || true'\n"
    ));
    out.push_str(&format!("\tssh $(DEPLOY_HOST) 'sudo modprobe {module}'\n\n"));
}

fn render_phony(spec: &MakefileSpec, module: Option<&str>, out: &mut String) {
    out.push_str(".PHONY: all all-drivers");
    for version in &spec.kernel_versions {
        out.push_str(&format!(" driver-{version}"));
    }
    if module.is_some() {
        for version in &spec.kernel_versions {
            out.push_str(&format!(" quickdeploy-{version}"));
        }
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_spec() -> MakefileSpec {
        MakefileSpec {
            project: "mydriver".to_string(),
            module: Some("mymod".to_string()),
            project_root: PathBuf::from("/test/project"),
            source_dir: "src".to_string(),
            kbuild_flags: String::new(),
            architecture: "arm64".to_string(),
            package_version: "1.0.0".to_string(),
            dts_only: false,
            blacklist: None,
            public_header: None,
            chroot_name: "buildroot".to_string(),
            deploy_host: DEFAULT_DEPLOY_HOST.to_string(),
            kernel_versions: vec![
                "6.12.34+rpt-rpi-v8".to_string(),
                "6.12.62+rpt-rpi-v8".to_string(),
                "6.6.73+rpt-rpi-v8".to_string(),
            ],
        }
    }

    fn overlay_spec() -> MakefileSpec {
        MakefileSpec {
            project: "myoverlay".to_string(),
            module: None,
            dts_only: true,
            kernel_versions: vec![
                "6.12.34+rpt-rpi-v8".to_string(),
                "6.12.62+rpt-rpi-v8".to_string(),
            ],
            ..module_spec()
        }
    }

    fn phony_line(makefile: &str) -> &str {
        makefile
            .lines()
            .find(|line| line.starts_with(".PHONY:"))
            .expect("generated Makefile has a .PHONY line")
    }

    #[test]
    fn default_mode_emits_full_target_families() {
        let makefile = render_makefile(&module_spec()).unwrap();

        for version in [
            "6.12.34+rpt-rpi-v8",
            "6.12.62+rpt-rpi-v8",
            "6.6.73+rpt-rpi-v8",
        ] {
            assert!(makefile.contains(&format!("driver-{version}:")));
            assert!(makefile.contains(&format!("quickdeploy-{version}: driver-{version}")));
            assert!(makefile.contains(&format!("staging/lib/modules/{version}/mymod.ko:")));
            assert!(makefile.contains(&format!("staging/usr/lib/er-overlays/{version}/mydriver.dtbo:")));
            // Version-unique scratch dir keeps concurrent builds isolated.
            assert!(makefile.contains(&format!("/tmp/drv-mydriver-{version}")));
        }

        assert!(makefile.contains("all-drivers: driver-6.12.34+rpt-rpi-v8 driver-6.12.62+rpt-rpi-v8 driver-6.6.73+rpt-rpi-v8"));
        assert!(makefile.contains("scp staging/lib/modules/6.12.34+rpt-rpi-v8/mymod.ko"));
        assert!(makefile.contains("sudo rmmod mymod"));
        assert!(makefile.contains("sudo modprobe mymod"));
        assert!(makefile.contains(
            "KERNEL_VERSIONS = 6.12.34+rpt-rpi-v8 6.12.62+rpt-rpi-v8 6.6.73+rpt-rpi-v8"
        ));
    }

    #[test]
    fn default_mode_has_no_generic_version_target() {
        let makefile = render_makefile(&module_spec()).unwrap();
        assert!(!makefile.contains("KVER ?="));
        assert!(!makefile.contains("$(KVER)"));
        // No shared scratch dir without a version suffix.
        assert!(!makefile.contains("/tmp/drv-mydriver \n"));
        assert!(!makefile.contains("-d /tmp/drv-mydriver --"));
    }

    #[test]
    fn phony_enumerates_every_target() {
        let makefile = render_makefile(&module_spec()).unwrap();
        let phony = phony_line(&makefile);
        assert!(phony.contains("all-drivers"));
        for version in [
            "6.12.34+rpt-rpi-v8",
            "6.12.62+rpt-rpi-v8",
            "6.6.73+rpt-rpi-v8",
        ] {
            assert!(phony.contains(&format!("driver-{version}")));
            assert!(phony.contains(&format!("quickdeploy-{version}")));
        }
    }

    #[test]
    fn overlay_mode_has_no_module_or_deploy_targets() {
        let makefile = render_makefile(&overlay_spec()).unwrap();

        assert!(makefile.contains("driver-6.12.34+rpt-rpi-v8: staging/usr/lib/er-overlays/6.12.34+rpt-rpi-v8/myoverlay.dtbo"));
        assert!(makefile.contains("driver-6.12.62+rpt-rpi-v8: staging/usr/lib/er-overlays/6.12.62+rpt-rpi-v8/myoverlay.dtbo"));

        assert!(!makefile.contains("quickdeploy"));
        assert!(!makefile.contains("rmmod"));
        assert!(!makefile.contains("modprobe"));
        assert!(!makefile.contains(".ko"));
        assert!(!makefile.contains("staging/lib/modules/"));

        assert!(makefile.contains("all-drivers: driver-6.12.34+rpt-rpi-v8 driver-6.12.62+rpt-rpi-v8"));
        let phony = phony_line(&makefile);
        assert!(phony.contains("driver-6.12.34+rpt-rpi-v8"));
        assert!(!phony.contains("quickdeploy"));
    }

    #[test]
    fn packaging_runs_in_the_aggregate_entry_target() {
        let mut spec = module_spec();
        spec.blacklist = Some("in-tree-mod".to_string());
        spec.public_header = Some("mydriver_api.h".to_string());
        let makefile = render_makefile(&spec).unwrap();

        assert!(makefile.contains("all: all-drivers"));
        assert!(makefile.contains("dpkg-deb --root-owner-group --build staging mydriver_1.0.0_arm64.deb"));
        assert!(makefile.contains("blacklist in-tree-mod"));
        assert!(makefile.contains("cp /test/project/src/mydriver_api.h staging/usr/include/"));
    }

    #[test]
    fn kbuild_flags_reach_the_module_rule() {
        let mut spec = module_spec();
        spec.kbuild_flags = "CONFIG_DEBUG_INFO=y".to_string();
        let makefile = render_makefile(&spec).unwrap();
        assert!(makefile.contains("ARCH=arm64 CONFIG_DEBUG_INFO=y modules"));
    }

    #[test]
    fn zero_versions_is_a_configuration_error() {
        let mut spec = module_spec();
        spec.kernel_versions.clear();
        assert!(render_makefile(&spec).is_err());
    }

    #[test]
    fn module_mode_without_module_name_is_rejected() {
        let mut spec = module_spec();
        spec.module = None;
        assert!(render_makefile(&spec).is_err());
    }
}
