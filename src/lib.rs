//! Cross-builds a Raspberry Pi kernel driver against multiple kernel
//! header versions and packages the result as a Debian archive.
//!
//! The crate decides *which* kernel versions to build for and *how* the
//! per-version build steps relate; a stock `make` does the compiling:
//!
//! - **Version resolution** - discover the kernel platforms a target root
//!   filesystem needs, parse the chroot's package listing into per-platform
//!   version pools, select the newest N, and install the matching headers
//! - **Manifest** - persist the selection as JSON; its presence makes later
//!   runs derive packaging bounds without any chroot or network activity
//! - **Build description** - emit a Makefile with one build/stage/deploy
//!   target family per kernel version plus an aggregate target, each
//!   version isolated in its own scratch directory
//! - **Build driving** - run the generated targets per version, with the
//!   packaging aggregate last
//!
//! # Example
//!
//! ```rust,ignore
//! use driver_builder::{listing, manifest};
//!
//! let platforms = vec!["rpi-v8".to_string()];
//! let available = listing::parse_versions(&apt_list_output, &platforms);
//! let packages = manifest::install_set(3, &available);
//! ```

pub mod build;
pub mod chroot;
pub mod exec;
pub mod listing;
pub mod lock;
pub mod makefile;
pub mod manifest;
pub mod preflight;
pub mod project;
pub mod resolve;
pub mod staging;
pub mod target;
pub mod version;

pub use makefile::MakefileSpec;
pub use manifest::{DependencyBound, DependencyBounds, PlatformVersions};
pub use version::{semver_key, SemverKey};
