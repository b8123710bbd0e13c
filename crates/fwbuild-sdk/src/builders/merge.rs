//! Static library merging
//!
//! After install, every build directory holds one `.a` per module under
//! `lib/Release`. `libtool -static` folds them into a single merged library
//! per build directory, which is what `lipo` later combines.

use std::path::{Path, PathBuf};

use super::common::{Executor, Invocation, sorted_glob};
use crate::types::BuildError;

/// Relative location of per-module libraries inside a build directory
pub const RELEASE_LIB_DIR: &str = "lib/Release";

/// Lists every build directory directly under `build_root`, sorted by name.
///
/// Directories left behind by earlier runs for other architectures are
/// included; stray files are not.
pub fn platform_build_dirs(build_root: &Path) -> Result<Vec<PathBuf>, BuildError> {
    Ok(sorted_glob(build_root, "*")?
        .into_iter()
        .filter(|p| p.is_dir())
        .collect())
}

/// Merges per-module static libraries with `libtool`.
pub struct LibraryMerger {
    /// Directory holding one subdirectory per target
    build_root: PathBuf,
    /// Output file name inside each `lib/Release`
    merged_library: String,
}

impl LibraryMerger {
    pub fn new(build_root: impl Into<PathBuf>, merged_library: impl Into<String>) -> Self {
        Self {
            build_root: build_root.into(),
            merged_library: merged_library.into(),
        }
    }

    /// Path of the merged library for one build directory
    pub fn merged_library_path(&self, build_dir: &Path) -> PathBuf {
        build_dir.join(RELEASE_LIB_DIR).join(&self.merged_library)
    }

    /// The `libtool -static -o <merged> <libs...>` command for one build directory
    ///
    /// The merged output of an earlier run is never an input, even when its
    /// name ends in `.a`.
    pub fn merge_invocation(&self, build_dir: &Path) -> Result<Invocation, BuildError> {
        let merged = self.merged_library_path(build_dir);
        let libs: Vec<PathBuf> = sorted_glob(&build_dir.join(RELEASE_LIB_DIR), "*.a")?
            .into_iter()
            .filter(|lib| *lib != merged)
            .collect();
        if libs.is_empty() {
            return Err(BuildError::Config(format!(
                "no static libraries to merge in {}",
                build_dir.join(RELEASE_LIB_DIR).display()
            )));
        }

        tracing::info!(
            "Merging libraries:\n\t{}",
            libs.iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join("\n\t")
        );

        let mut args = vec!["-static".into(), "-o".into(), merged.into_os_string()];
        args.extend(libs.into_iter().map(PathBuf::into_os_string));
        Ok(Invocation::argv("libtool", args))
    }

    /// Merges the libraries of every build directory under the build root
    ///
    /// # Returns
    ///
    /// The merged library paths, in build directory order.
    pub fn merge_all(&self, executor: &dyn Executor) -> Result<Vec<PathBuf>, BuildError> {
        let mut merged = Vec::new();
        for build_dir in platform_build_dirs(&self.build_root)? {
            executor.run(&self.merge_invocation(&build_dir)?)?;
            merged.push(self.merged_library_path(&build_dir));
        }
        Ok(merged)
    }
}
