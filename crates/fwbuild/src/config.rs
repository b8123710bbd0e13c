//! Configuration file support for fwbuild.
//!
//! This module provides support for `fwbuild.toml` configuration files that
//! persist project settings, so repeated builds of the same library do not
//! need the same flags every time.
//!
//! ## Configuration File Location
//!
//! Unless `--config` names a file explicitly, the configuration file is
//! searched for in the following order:
//! 1. Current working directory (`./fwbuild.toml`)
//! 2. Parent directories (up to the repository root or filesystem root)
//!
//! ## Example Configuration
//!
//! ```toml
//! [project]
//! source_root = "../opencv"
//! framework_name = "opencv2"
//! merged_library = "libopencv_merged"
//! module_flag_prefix = "BUILD_opencv_"
//!
//! [toolchain]
//! toolchain_dir = "platforms/ios/cmake/Toolchains"
//! deployment_target = "6.0"
//! jobs = 8
//! c_flags = "-Wno-implicit-function-declaration"
//!
//! [framework]
//! reference_platform = "iPhoneOS"
//! ```
//!
//! A relative `source_root` is resolved against the directory holding the
//! configuration file.

use anyhow::{Context, Result};
use fwbuild_sdk::pipeline::DEFAULT_MODULE_FLAG_PREFIX;
use fwbuild_sdk::{FrameworkLayout, Platform, ToolchainSettings};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The default configuration file name.
pub const CONFIG_FILE_NAME: &str = "fwbuild.toml";

/// Root configuration structure for `fwbuild.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FwbuildConfig {
    /// Project-level configuration.
    pub project: ProjectConfig,

    /// Toolchain and xcodebuild settings.
    pub toolchain: ToolchainConfig,

    /// Framework assembly settings.
    pub framework: FrameworkConfig,
}

/// Project-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Root of the CMake project to build.
    ///
    /// Defaults to the current directory when neither `--source-root` nor
    /// this field is given.
    pub source_root: Option<PathBuf>,

    /// Name of the framework bundle and of the universal library inside it.
    ///
    /// Defaults to "opencv2".
    pub framework_name: Option<String>,

    /// File name of the per-target merged library.
    ///
    /// Defaults to "libopencv_merged".
    pub merged_library: Option<String>,

    /// Prefix turning a module name into a cmake option.
    ///
    /// Defaults to "BUILD_opencv_".
    pub module_flag_prefix: Option<String>,
}

/// Toolchain configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Directory of the `Toolchain-<Platform>_Xcode.cmake` files, relative to
    /// the source root.
    pub toolchain_dir: PathBuf,

    /// `IPHONEOS_DEPLOYMENT_TARGET` passed to xcodebuild.
    ///
    /// Defaults to "6.0".
    pub deployment_target: String,

    /// Parallel jobs for xcodebuild.
    ///
    /// Defaults to 8.
    pub jobs: u32,

    /// Value of `CMAKE_C_FLAGS`.
    pub c_flags: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        let settings = ToolchainSettings::default();
        Self {
            toolchain_dir: settings.toolchain_dir,
            deployment_target: settings.deployment_target,
            jobs: settings.jobs,
            c_flags: settings.c_flags,
        }
    }
}

impl From<ToolchainConfig> for ToolchainSettings {
    fn from(config: ToolchainConfig) -> Self {
        Self {
            toolchain_dir: config.toolchain_dir,
            deployment_target: config.deployment_target,
            jobs: config.jobs,
            c_flags: config.c_flags,
        }
    }
}

/// Framework assembly configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FrameworkConfig {
    /// Platform whose build directory supplies headers and `Info.plist`.
    ///
    /// Either "iPhoneOS" or "iPhoneSimulator". If not specified, the
    /// platform of the first requested target is used.
    pub reference_platform: Option<String>,
}

impl FwbuildConfig {
    /// Loads configuration from the specified file path.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Ok(FwbuildConfig)` - Successfully loaded configuration
    /// * `Err` - If the file cannot be read or parsed
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: FwbuildConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Attempts to find and load configuration starting from the specified directory.
    ///
    /// # Returns
    ///
    /// * `Ok(Some((config, path)))` - Found and loaded configuration with its path
    /// * `Ok(None)` - No configuration file found
    /// * `Err` - If a config file was found but couldn't be parsed
    pub fn discover_from(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }

            // Stop at repository root or filesystem root
            if current.join(".git").exists() || !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Framework naming, with defaults for anything not configured.
    pub fn layout(&self) -> FrameworkLayout {
        let defaults = FrameworkLayout::default();
        FrameworkLayout {
            name: self.project.framework_name.clone().unwrap_or(defaults.name),
            merged_library: self
                .project
                .merged_library
                .clone()
                .unwrap_or(defaults.merged_library),
        }
    }
}

/// Configuration resolver that merges config file values with CLI arguments.
///
/// CLI arguments always take precedence over config file values.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    /// Loaded configuration, if any.
    pub config: Option<FwbuildConfig>,

    /// Path to the loaded config file, if any.
    pub config_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Creates a resolver by discovering configuration from `start_dir` upwards.
    pub fn discover_from(start_dir: &Path) -> Result<Self> {
        match FwbuildConfig::discover_from(start_dir)? {
            Some((config, path)) => Ok(Self {
                config: Some(config),
                config_path: Some(path),
            }),
            None => Ok(Self::default()),
        }
    }

    /// Creates a resolver from an explicitly named configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self {
            config: Some(FwbuildConfig::load_from_file(path)?),
            config_path: Some(path.to_path_buf()),
        })
    }

    /// Returns the configured source root, resolved against the config file's directory.
    pub fn source_root(&self) -> Option<PathBuf> {
        let source_root = self.config.as_ref()?.project.source_root.as_ref()?;
        let base = self
            .config_path
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new(""));
        Some(base.join(source_root))
    }

    /// Returns the module flag prefix from config, or the default.
    pub fn module_flag_prefix(&self) -> String {
        self.resolve(
            None,
            |c| c.project.module_flag_prefix.clone(),
            DEFAULT_MODULE_FLAG_PREFIX.to_string(),
        )
    }

    /// Returns the toolchain settings.
    pub fn toolchain(&self) -> ToolchainSettings {
        self.config
            .as_ref()
            .map(|c| c.toolchain.clone())
            .unwrap_or_default()
            .into()
    }

    /// Returns the framework layout.
    pub fn layout(&self) -> FrameworkLayout {
        self.config
            .as_ref()
            .map(FwbuildConfig::layout)
            .unwrap_or_default()
    }

    /// Returns the configured reference platform.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - Not configured
    /// * `Err` - If the configured name is not a known platform
    pub fn reference_platform(&self) -> Result<Option<Platform>> {
        let Some(name) = self
            .config
            .as_ref()
            .and_then(|c| c.framework.reference_platform.as_deref())
        else {
            return Ok(None);
        };
        let platform = name
            .parse::<Platform>()
            .with_context(|| format!("Invalid framework.reference_platform in {:?}", self.config_path))?;
        Ok(Some(platform))
    }

    /// Resolves a CLI value, using config as fallback.
    ///
    /// # Arguments
    ///
    /// * `cli_value` - Value from CLI argument (None if not provided)
    /// * `config_getter` - Function to get value from config
    /// * `default` - Default value if neither CLI nor config provides a value
    ///
    /// # Returns
    ///
    /// The resolved value, preferring CLI over config over default.
    pub fn resolve<T, F>(&self, cli_value: Option<T>, config_getter: F, default: T) -> T
    where
        F: FnOnce(&FwbuildConfig) -> Option<T>,
    {
        cli_value
            .or_else(|| self.config.as_ref().and_then(config_getter))
            .unwrap_or(default)
    }
}
