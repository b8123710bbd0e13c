//! Core types for fwbuild-sdk.
//!
//! This module defines the fundamental types used throughout the SDK:
//!
//! - [`BuildError`] - Error types for command execution and filesystem work
//! - [`Arch`] / [`Platform`] / [`Target`] - What gets built
//! - [`ToolchainSettings`] - Knobs passed to cmake and xcodebuild
//! - [`FrameworkResult`] - Output from a completed pipeline run

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Error types for fwbuild-sdk operations.
///
/// Every failure in the pipeline is one of these. Nothing is retried: the
/// error travels up through every stage and is reported once at the top.
///
/// # Example
///
/// ```ignore
/// use fwbuild_sdk::BuildError;
///
/// match pipeline.run(&executor) {
///     Ok(result) => println!("Framework at {:?}", result.framework_path),
///     Err(BuildError::CommandExit { command, code, .. }) => {
///         eprintln!("{} returned {}", command, code);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// An external command exited with a non-zero status.
    #[error("command `{command}` in {cwd} returned exit status {code}")]
    CommandExit {
        command: String,
        cwd: String,
        code: i32,
    },

    /// An external command was terminated by a signal.
    #[error("command `{command}` in {cwd} was terminated by signal {signal}")]
    CommandSignal {
        command: String,
        cwd: String,
        signal: i32,
    },

    /// An external command could not be started.
    ///
    /// Usually the tool is not installed or not on PATH.
    #[error("failed to start `{command}` in {cwd}. Ensure the tool is installed and on PATH")]
    Spawn {
        command: String,
        cwd: String,
        #[source]
        source: io::Error,
    },

    /// Creating, removing, copying or linking something on disk failed.
    #[error("failed to {action} {}", path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Invalid input or a missing prerequisite in the source or build tree.
    #[error("configuration error: {0}")]
    Config(String),
}

impl BuildError {
    /// Wraps an I/O error with the action and path it came from.
    pub fn fs(action: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
        BuildError::Filesystem {
            action,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// CPU architectures the framework can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Arch {
    Armv7,
    Armv7s,
    Arm64,
    I386,
    X86_64,
}

impl Arch {
    /// Every supported architecture in canonical order.
    pub const ALL: [Arch; 5] = [
        Arch::Armv7,
        Arch::Armv7s,
        Arch::Arm64,
        Arch::I386,
        Arch::X86_64,
    ];

    /// Returns the name used by `ARCHS=` and in build directory names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Armv7 => "armv7",
            Arch::Armv7s => "armv7s",
            Arch::Arm64 => "arm64",
            Arch::I386 => "i386",
            Arch::X86_64 => "x86_64",
        }
    }

    /// The platform this architecture is built against.
    pub const fn platform(&self) -> Platform {
        match self {
            Arch::Armv7 | Arch::Armv7s | Arch::Arm64 => Platform::IPhoneOS,
            Arch::I386 | Arch::X86_64 => Platform::IPhoneSimulator,
        }
    }

    /// 32-bit ARM variants get NEON switched on explicitly.
    pub fn wants_neon(&self) -> bool {
        self.as_str().starts_with("armv")
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Arch::ALL
            .into_iter()
            .find(|arch| arch.as_str() == s.trim())
            .ok_or_else(|| {
                BuildError::Config(format!(
                    "unknown architecture '{}'. Supported: {}",
                    s,
                    Arch::ALL.map(|a| a.as_str()).join(", ")
                ))
            })
    }
}

/// Apple SDK platforms, one toolchain file each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Platform {
    IPhoneOS,
    IPhoneSimulator,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::IPhoneOS, Platform::IPhoneSimulator];

    /// Returns the platform name as it appears in directory and toolchain file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::IPhoneOS => "iPhoneOS",
            Platform::IPhoneSimulator => "iPhoneSimulator",
        }
    }

    /// Returns the value passed to `xcodebuild -sdk`.
    pub fn sdk(&self) -> &'static str {
        match self {
            Platform::IPhoneOS => "iphoneos",
            Platform::IPhoneSimulator => "iphonesimulator",
        }
    }

    /// File name of the cmake toolchain description for this platform.
    pub fn toolchain_file_name(&self) -> String {
        format!("Toolchain-{}_Xcode.cmake", self.as_str())
    }

    /// Finds the platform that owns a build directory named `<Platform>-<arch>`.
    pub fn from_build_dir_name(name: &str) -> Option<Platform> {
        let (platform, _) = name.split_once('-')?;
        Platform::ALL.into_iter().find(|p| p.as_str() == platform)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                BuildError::Config(format!(
                    "unknown platform '{}'. Supported: iPhoneOS, iPhoneSimulator",
                    s
                ))
            })
    }
}

/// One (architecture, platform) pair, built in its own directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Target {
    pub arch: Arch,
    pub platform: Platform,
}

impl Target {
    /// The full supported set, in the order targets are built.
    pub const ALL: [Target; 5] = [
        Target::new(Arch::Armv7),
        Target::new(Arch::Armv7s),
        Target::new(Arch::Arm64),
        Target::new(Arch::I386),
        Target::new(Arch::X86_64),
    ];

    pub const fn new(arch: Arch) -> Self {
        Self {
            arch,
            platform: arch.platform(),
        }
    }

    /// Directory name under the build root, e.g. `iPhoneOS-armv7`.
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.platform, self.arch)
    }

    /// Selects the supported targets whose arch appears in `archs`.
    ///
    /// The result keeps canonical order regardless of the order of `archs`.
    pub fn select(archs: &[Arch]) -> Vec<Target> {
        Target::ALL
            .into_iter()
            .filter(|t| archs.contains(&t.arch))
            .collect()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.arch, self.platform)
    }
}

/// Parses a comma-separated architecture list such as `armv7,arm64`.
pub fn parse_arch_list(list: &str) -> Result<Vec<Arch>, BuildError> {
    let archs = list
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(Arch::from_str)
        .collect::<Result<Vec<_>, _>>()?;
    if archs.is_empty() {
        return Err(BuildError::Config(
            "architecture list is empty".to_string(),
        ));
    }
    Ok(archs)
}

/// Settings forwarded to cmake and xcodebuild for every target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainSettings {
    /// Directory holding `Toolchain-<Platform>_Xcode.cmake`, relative to the source root.
    pub toolchain_dir: PathBuf,
    /// Value for `IPHONEOS_DEPLOYMENT_TARGET`.
    pub deployment_target: String,
    /// Job count passed to `xcodebuild -jobs`.
    pub jobs: u32,
    /// Value for `CMAKE_C_FLAGS`.
    pub c_flags: String,
}

impl Default for ToolchainSettings {
    fn default() -> Self {
        Self {
            toolchain_dir: PathBuf::from("platforms/ios/cmake/Toolchains"),
            deployment_target: "6.0".to_string(),
            jobs: 8,
            c_flags: "-Wno-implicit-function-declaration".to_string(),
        }
    }
}

/// Names that shape the bundle layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkLayout {
    /// Bundle name without the `.framework` suffix. Also the header
    /// directory name and the universal library file name.
    pub name: String,
    /// File name of the merged library in each build directory's `lib/Release`.
    pub merged_library: String,
}

impl Default for FrameworkLayout {
    fn default() -> Self {
        Self {
            name: "opencv2".to_string(),
            merged_library: "libopencv_merged".to_string(),
        }
    }
}

impl FrameworkLayout {
    /// Directory name of the bundle, e.g. `opencv2.framework`.
    pub fn bundle_dir_name(&self) -> String {
        format!("{}.framework", self.name)
    }
}

/// Result of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct FrameworkResult {
    /// Path to the `.framework` directory.
    pub framework_path: PathBuf,
    /// Path to the universal static library inside the versioned directory.
    pub universal_library: PathBuf,
    /// Targets built during this run.
    pub targets: Vec<Target>,
}
