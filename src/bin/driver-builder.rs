use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

use driver_builder::build::{build_all, default_jobs, kernel_versions_for_build};
use driver_builder::chroot::BuildChroot;
use driver_builder::lock::InvocationLock;
use driver_builder::makefile::{self, MakefileSpec};
use driver_builder::preflight;
use driver_builder::project::load_project;
use driver_builder::resolve::{resolve_dependency_bounds, ResolveOptions};
use driver_builder::staging::{create_staging, DebianContext};
use driver_builder::target::target_arch;

/// Cross-driver build configurator: resolves kernel header versions for a
/// target image, generates a per-version Makefile, and stages the Debian
/// package metadata.
#[derive(Debug, Parser)]
#[command(name = "driver-builder", version)]
struct Cli {
    /// Path to the project directory containing a driver.toml file.
    #[arg(default_value = ".")]
    project_dir: PathBuf,

    /// Build the driver using this previously generated build directory.
    #[arg(long)]
    build: Option<PathBuf>,

    /// Kernel versions to build against; defaults to every version
    /// installed in the build root.
    #[arg(long = "kernel-ver", num_args = 1..)]
    kernel_ver: Option<Vec<String>>,

    /// Path to the build root holding the kernel headers.
    #[arg(long, default_value = "/var/chroot/buildroot/")]
    chroot_root: PathBuf,

    /// Path to the target root filesystem.
    #[arg(long, default_value = "/home/crossbuilder/target")]
    target_dir: PathBuf,

    /// Target architecture; read from the target descriptor when omitted.
    #[arg(long)]
    arch: Option<String>,

    /// Number of newest kernel versions to install per platform.
    #[arg(long, default_value_t = 3)]
    kernel_ver_count: usize,

    /// Parallel make jobs; defaults to the available parallelism.
    #[arg(short, long)]
    jobs: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("resolving current directory")?;
    let _lock = InvocationLock::acquire(&cwd)?;

    match &cli.build {
        Some(build_dir) => run_build(&cli, build_dir),
        None => run_generate(&cli, &cwd),
    }
}

fn run_build(cli: &Cli, build_dir: &Path) -> Result<()> {
    preflight::check_required_tools(preflight::BUILD_TOOLS)?;
    let versions = kernel_versions_for_build(cli.kernel_ver.as_deref(), &cli.chroot_root)?;
    let jobs = cli.jobs.unwrap_or_else(default_jobs);
    build_all(build_dir, &versions, jobs)
}

fn run_generate(cli: &Cli, cwd: &Path) -> Result<()> {
    preflight::check_required_tools(preflight::GENERATE_TOOLS)?;

    let project = load_project(&cli.project_dir)?;
    let chroot = BuildChroot::from_root(&cli.chroot_root)?;
    let architecture = resolve_architecture(cli)?;

    let bounds = resolve_dependency_bounds(&ResolveOptions {
        chroot: &chroot,
        target_dir: &cli.target_dir,
        keep_count: cli.kernel_ver_count,
        manifest_dir: cwd,
    })?;

    let kernel_versions = kernel_versions_for_build(cli.kernel_ver.as_deref(), &cli.chroot_root)?;
    let project_root = cli.project_dir.canonicalize().with_context(|| {
        format!(
            "resolving project directory '{}'",
            cli.project_dir.display()
        )
    })?;

    let spec = MakefileSpec {
        project: project.project.clone(),
        module: project.module.clone(),
        project_root,
        source_dir: project.source_dir.clone(),
        kbuild_flags: project.kbuild_flags.clone(),
        architecture: architecture.clone(),
        package_version: project.version.clone(),
        dts_only: project.dts_only,
        blacklist: project.blacklist.clone(),
        public_header: project.public_header.clone(),
        chroot_name: chroot.name().to_string(),
        deploy_host: makefile::DEFAULT_DEPLOY_HOST.to_string(),
        kernel_versions,
    };
    let makefile_path = makefile::write_makefile(&spec, cwd)?;
    println!("[generate] wrote {}", makefile_path.display());

    create_staging(
        cwd,
        &DebianContext {
            package: &project.project,
            version: &project.version,
            architecture: &architecture,
            maintainer: &project.maintainer,
            description: &project.description,
            module: project.module.as_deref(),
            dts_only: project.dts_only,
            bounds: &bounds,
        },
    )?;
    println!(
        "[generate] staged Debian metadata for {} {} ({})",
        project.project, project.version, architecture
    );
    Ok(())
}

fn resolve_architecture(cli: &Cli) -> Result<String> {
    if let Some(arch) = &cli.arch {
        return Ok(arch.clone());
    }
    let descriptor_path = cli.target_dir.join("target");
    let descriptor = fs::read_to_string(&descriptor_path)
        .with_context(|| format!("reading target descriptor '{}'", descriptor_path.display()))?;
    target_arch(&descriptor)
}
