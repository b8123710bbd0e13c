//! Universal iOS framework builder SDK
//!
//! `fwbuild-sdk` drives cmake and the Xcode command-line tools to turn a
//! CMake-based native library into one multi-architecture static
//! `.framework` bundle. It compiles nothing itself: it sequences external
//! tools and lays out directories.
//!
//! # Pipeline
//!
//! 1. **Per-target build** - one isolated, reusable build directory per
//!    (architecture, platform) pair under `<out>/build/`
//! 2. **Library merge** - `libtool -static` folds each target's module
//!    libraries into one merged library
//! 3. **Framework assembly** - `lipo -create` combines every target into a
//!    universal library inside a freshly recreated `<name>.framework`
//!
//! # Example
//!
//! ```ignore
//! use fwbuild_sdk::builders::SystemExecutor;
//! use fwbuild_sdk::{Arch, FrameworkBuild, Target};
//!
//! let result = FrameworkBuild::new("/src/opencv", "/tmp/ios")
//!     .targets(Target::select(&[Arch::Arm64, Arch::X86_64]))
//!     .run(&SystemExecutor::new())?;
//! println!("Built {:?}", result.framework_path);
//! ```
//!
//! # Output Layout
//!
//! ```text
//! <out>/
//! ├── build/
//! │   ├── iPhoneOS-arm64/         (cmake-generated build tree, kept between runs)
//! │   └── iPhoneSimulator-x86_64/
//! └── opencv2.framework/          (erased and recreated on every run)
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

// Public modules
pub mod builders;
pub mod pipeline;
pub mod types;

// Re-export key types for convenience
pub use pipeline::{FrameworkBuild, PipelineError, Stage};
pub use types::{
    Arch, BuildError, FrameworkLayout, FrameworkResult, Platform, Target, ToolchainSettings,
    parse_arch_list,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
