//! Per-target cmake + xcodebuild automation
//!
//! Each [`Target`] gets its own build directory under the build root. The
//! directory survives between runs: when `CMakeCache.txt` is already there,
//! cmake is re-run against `.` to refresh the generated Xcode project instead
//! of configuring from scratch.

use std::path::PathBuf;

use super::common::{Executor, Invocation, create_dir_all, double_quote_escape, shell_quote};
use crate::types::{BuildError, Target, ToolchainSettings};

/// File whose presence marks a build directory as already configured.
pub const CMAKE_CACHE_FILE: &str = "CMakeCache.txt";

/// Builds and installs one target with cmake's Xcode generator.
pub struct TargetBuilder {
    /// Root of the library source tree
    source_root: PathBuf,
    /// Directory holding one subdirectory per target
    build_root: PathBuf,
    target: Target,
    /// Extra `-D` flags appended after the base flags
    extra_flags: Vec<String>,
    settings: ToolchainSettings,
}

impl TargetBuilder {
    /// Creates a builder for `target`
    ///
    /// # Arguments
    ///
    /// * `source_root` - Root of the library source tree (contains the top-level CMakeLists.txt)
    /// * `build_root` - Directory under which `<Platform>-<arch>` build directories live
    /// * `target` - The (arch, platform) pair to build
    pub fn new(
        source_root: impl Into<PathBuf>,
        build_root: impl Into<PathBuf>,
        target: Target,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            build_root: build_root.into(),
            target,
            extra_flags: Vec::new(),
            settings: ToolchainSettings::default(),
        }
    }

    /// Appends extra cmake flags such as module exclusions
    pub fn extra_flags(mut self, flags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_flags.extend(flags.into_iter().map(Into::into));
        self
    }

    /// Overrides toolchain settings
    pub fn settings(mut self, settings: ToolchainSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// Build directory for this target, e.g. `<build_root>/iPhoneOS-armv7`
    pub fn build_dir(&self) -> PathBuf {
        self.build_root.join(self.target.dir_name())
    }

    /// Absolute path to the platform's cmake toolchain file
    pub fn toolchain_file(&self) -> PathBuf {
        self.source_root
            .join(&self.settings.toolchain_dir)
            .join(self.target.platform.toolchain_file_name())
    }

    /// Whether this target has been configured by an earlier run
    pub fn is_configured(&self) -> bool {
        self.build_dir().join(CMAKE_CACHE_FILE).is_file()
    }

    /// The cmake argument string shared by fresh and update configuration
    pub fn cmake_args(&self) -> String {
        let mut args = vec![
            "-GXcode".to_string(),
            "-DCMAKE_BUILD_TYPE=Release".to_string(),
            format!(
                "-DCMAKE_TOOLCHAIN_FILE={}",
                shell_quote(&self.toolchain_file().to_string_lossy())
            ),
            format!(
                "-DCMAKE_C_FLAGS=\"{}\"",
                double_quote_escape(&self.settings.c_flags)
            ),
            "-DCMAKE_INSTALL_PREFIX=install".to_string(),
        ];

        if self.target.arch.wants_neon() {
            args.push("-DENABLE_NEON=ON".to_string());
        }

        // One shell word per flag, whatever the module name contains
        args.extend(self.extra_flags.iter().map(|flag| shell_quote(flag)));
        args.join(" ")
    }

    /// The configure command
    ///
    /// With an existing cache cmake only regenerates the project (`cmake <args> .`);
    /// otherwise it configures fresh against the source root.
    pub fn configure_invocation(&self, cache_exists: bool) -> Invocation {
        let source = if cache_exists {
            ".".to_string()
        } else {
            shell_quote(&self.source_root.to_string_lossy())
        };
        Invocation::shell(format!("cmake {} {}", self.cmake_args(), source))
            .in_dir(self.build_dir())
    }

    /// Parallel build of every target in the generated project
    pub fn build_invocation(&self) -> Invocation {
        Invocation::shell(format!(
            "xcodebuild IPHONEOS_DEPLOYMENT_TARGET={} -parallelizeTargets ARCHS={} -jobs {} -sdk {} -configuration Release -target ALL_BUILD",
            self.settings.deployment_target,
            self.target.arch,
            self.settings.jobs,
            self.target.platform.sdk(),
        ))
        .in_dir(self.build_dir())
    }

    /// Runs the generated `install` target into `<build_dir>/install`
    pub fn install_invocation(&self) -> Invocation {
        Invocation::shell(format!(
            "xcodebuild IPHONEOS_DEPLOYMENT_TARGET={} ARCHS={} -sdk {} -configuration Release -target install install",
            self.settings.deployment_target,
            self.target.arch,
            self.target.platform.sdk(),
        ))
        .in_dir(self.build_dir())
    }

    /// Configures, builds and installs the target
    ///
    /// # Returns
    ///
    /// * `Ok(PathBuf)` - the build directory
    /// * `Err(BuildError)` - the first failing step; nothing after it runs
    pub fn build(&self, executor: &dyn Executor) -> Result<PathBuf, BuildError> {
        let toolchain = self.toolchain_file();
        if !toolchain.is_file() {
            return Err(BuildError::Config(format!(
                "no toolchain file for platform {}: expected {}",
                self.target.platform,
                toolchain.display()
            )));
        }

        let build_dir = self.build_dir();
        if !executor.is_dry_run() {
            create_dir_all(&build_dir)?;
        }

        let cache_exists = self.is_configured();
        if cache_exists {
            tracing::info!("Reusing cmake cache in {}", build_dir.display());
        } else {
            tracing::info!("Configuring {} from scratch", build_dir.display());
        }

        executor.run(&self.configure_invocation(cache_exists))?;
        executor.run(&self.build_invocation())?;
        executor.run(&self.install_invocation())?;

        Ok(build_dir)
    }
}

/// Turns module names into `-D<prefix><module>=OFF` flags
pub fn module_exclusion_flags(prefix: &str, modules: &[String]) -> Vec<String> {
    modules
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .map(|m| format!("-D{}{}=OFF", prefix, m))
        .collect()
}
