//! Framework bundle assembly
//!
//! Produces the classic versioned framework layout:
//!
//! ```text
//! opencv2.framework/
//! ├── Headers -> Versions/Current/Headers
//! ├── Resources -> Versions/Current/Resources
//! ├── opencv2 -> Versions/Current/opencv2
//! └── Versions/
//!     ├── Current -> A
//!     └── A/
//!         ├── Headers/          (copied from the reference target's install tree)
//!         ├── Resources/
//!         │   └── Info.plist
//!         └── opencv2           (universal static library from lipo)
//! ```
//!
//! The bundle is erased and recreated on every run.

use std::path::{Path, PathBuf};

use super::common::{
    Executor, Invocation, copy_dir_recursive, copy_file, create_dir_all, remove_dir_if_exists,
    symlink,
};
use super::merge::{LibraryMerger, platform_build_dirs};
use crate::types::{BuildError, FrameworkLayout, Platform};

const VERSION: &str = "A";

/// Assembles the `.framework` bundle from already merged build directories.
pub struct FrameworkAssembler {
    /// Directory holding one subdirectory per target
    build_root: PathBuf,
    /// Directory the bundle is written into
    output_dir: PathBuf,
    layout: FrameworkLayout,
    /// Platform whose install tree provides headers and Info.plist
    reference_platform: Platform,
}

impl FrameworkAssembler {
    pub fn new(
        build_root: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        reference_platform: Platform,
    ) -> Self {
        Self {
            build_root: build_root.into(),
            output_dir: output_dir.into(),
            layout: FrameworkLayout::default(),
            reference_platform,
        }
    }

    pub fn layout(mut self, layout: FrameworkLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Path of the bundle, e.g. `<out>/opencv2.framework`
    pub fn framework_path(&self) -> PathBuf {
        self.output_dir.join(self.layout.bundle_dir_name())
    }

    /// Relative path of the versioned directory inside the bundle
    fn version_dir(&self) -> PathBuf {
        Path::new("Versions").join(VERSION)
    }

    /// Path of the universal library inside the versioned directory
    pub fn universal_library_path(&self) -> PathBuf {
        self.framework_path()
            .join(self.version_dir())
            .join(&self.layout.name)
    }

    /// Picks the first build directory (in sorted order) that belongs to the reference platform
    pub fn reference_dir<'a>(&self, build_dirs: &'a [PathBuf]) -> Result<&'a PathBuf, BuildError> {
        build_dirs
            .iter()
            .find(|dir| {
                dir.file_name()
                    .and_then(|n| n.to_str())
                    .and_then(Platform::from_build_dir_name)
                    == Some(self.reference_platform)
            })
            .ok_or_else(|| {
                BuildError::Config(format!(
                    "no build directory for reference platform {} under {}",
                    self.reference_platform,
                    self.build_root.display()
                ))
            })
    }

    /// The `lipo -create <merged libs...> -o Versions/A/<name>` command
    ///
    /// Runs inside the bundle directory; inputs keep build directory order.
    pub fn lipo_invocation(&self, build_dirs: &[PathBuf]) -> Invocation {
        let merger = LibraryMerger::new(&self.build_root, &self.layout.merged_library);
        let mut args = vec!["-create".into()];
        args.extend(
            build_dirs
                .iter()
                .map(|dir| merger.merged_library_path(dir).into_os_string()),
        );
        args.push("-o".into());
        args.push(self.version_dir().join(&self.layout.name).into_os_string());
        Invocation::argv("lipo", args).in_dir(self.framework_path())
    }

    /// Erases any previous bundle and assembles a fresh one
    ///
    /// # Returns
    ///
    /// * `Ok(PathBuf)` - the bundle path
    /// * `Err(BuildError)` - the first failing step; the partial bundle is left
    ///   in place and replaced by the next run
    pub fn assemble(&self, executor: &dyn Executor) -> Result<PathBuf, BuildError> {
        let build_dirs = platform_build_dirs(&self.build_root)?;
        if build_dirs.is_empty() {
            return Err(BuildError::Config(format!(
                "no build directories found under {}",
                self.build_root.display()
            )));
        }
        let reference = self.reference_dir(&build_dirs)?;
        tracing::debug!("Reference build directory: {}", reference.display());

        let framework_dir = self.framework_path();
        remove_dir_if_exists(&framework_dir)?;
        let version_dir = framework_dir.join(self.version_dir());
        create_dir_all(&version_dir.join("Resources"))?;

        copy_dir_recursive(
            &reference.join("install/include").join(&self.layout.name),
            &version_dir.join("Headers"),
        )?;

        let lipo = self.lipo_invocation(&build_dirs);
        tracing::info!(
            "Creating universal library from:\n\t{}",
            build_dirs
                .iter()
                .map(|d| d.display().to_string())
                .collect::<Vec<_>>()
                .join("\n\t")
        );
        executor.run(&lipo)?;

        copy_file(
            &reference.join("ios/Info.plist"),
            &version_dir.join("Resources/Info.plist"),
        )?;

        self.link_current_version(&framework_dir)?;

        Ok(framework_dir)
    }

    /// `Versions/Current -> A` plus top-level links that go through `Current`
    fn link_current_version(&self, framework_dir: &Path) -> Result<(), BuildError> {
        symlink(Path::new(VERSION), &framework_dir.join("Versions/Current"))?;

        let current = Path::new("Versions/Current");
        for entry in ["Headers", "Resources", self.layout.name.as_str()] {
            symlink(&current.join(entry), &framework_dir.join(entry))?;
        }
        Ok(())
    }
}
