//! Build automation for universal iOS frameworks.
//!
//! ## Overview
//!
//! The builders cover the complete pipeline:
//!
//! 1. **Per-target build** - cmake (Xcode generator) + xcodebuild per (arch, platform)
//! 2. **Library merge** - `libtool -static` per build directory
//! 3. **Framework assembly** - `lipo -create` plus the versioned bundle layout
//!
//! ## Builders
//!
//! | Builder | Stage | Output |
//! |---------|-------|--------|
//! | [`TargetBuilder`] | Per-target build | `<out>/build/<Platform>-<arch>/` with `install/` |
//! | [`LibraryMerger`] | Library merge | `lib/Release/<merged_library>` per build directory |
//! | [`FrameworkAssembler`] | Framework assembly | `<out>/<name>.framework` |
//!
//! ## Common Utilities
//!
//! The `common` module provides shared functionality:
//!
//! - [`Invocation`] / [`Executor`] - external commands with explicit working directories
//! - [`SystemExecutor`] - real execution, with a dry-run mode
//! - Filesystem helpers that map I/O failures onto [`crate::BuildError`]
//!
//! ## Example
//!
//! ```ignore
//! use fwbuild_sdk::builders::{SystemExecutor, TargetBuilder};
//! use fwbuild_sdk::{Arch, Target};
//!
//! let executor = SystemExecutor::new().dry_run(true); // Preview only
//! TargetBuilder::new("/src/opencv", "/out/build", Target::new(Arch::Arm64))
//!     .extra_flags(["-DBUILD_opencv_world=OFF"])
//!     .build(&executor)?;
//! # Ok::<(), fwbuild_sdk::BuildError>(())
//! ```

pub mod cmake;
pub mod common;
pub mod framework;
pub mod merge;

// Re-export builders
pub use cmake::{TargetBuilder, module_exclusion_flags};
pub use common::{CommandLine, Executor, Invocation, SystemExecutor};
pub use framework::FrameworkAssembler;
pub use merge::{LibraryMerger, platform_build_dirs};
