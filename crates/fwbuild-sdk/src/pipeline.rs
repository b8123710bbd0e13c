//! End-to-end framework build.
//!
//! [`FrameworkBuild`] strings the builders together in a fixed order:
//!
//! ```text
//! ResolveArgs -> BuildTargets -> MergeLibraries -> AssembleFramework -> Done
//! ```
//!
//! Any error ends the run in the stage where it happened. Nothing is rolled
//! back: build directories stay reusable, and a half-assembled bundle is
//! erased by the next successful assembly.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::builders::{
    Executor, FrameworkAssembler, LibraryMerger, TargetBuilder, module_exclusion_flags,
};
use crate::types::{
    BuildError, FrameworkLayout, FrameworkResult, Platform, Target, ToolchainSettings,
};

/// Name of the build root under the output directory
pub const BUILD_DIR_NAME: &str = "build";

/// Default prefix for module exclusion flags (`-DBUILD_opencv_<module>=OFF`)
pub const DEFAULT_MODULE_FLAG_PREFIX: &str = "BUILD_opencv_";

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolveArgs,
    BuildTargets,
    MergeLibraries,
    AssembleFramework,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::ResolveArgs => "resolving arguments",
            Stage::BuildTargets => "building targets",
            Stage::MergeLibraries => "merging libraries",
            Stage::AssembleFramework => "assembling framework",
            Stage::Done => "done",
        })
    }
}

/// A [`BuildError`] tagged with the stage it ended.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: BuildError,
}

trait InStage<T> {
    fn in_stage(self, stage: Stage) -> Result<T, PipelineError>;
}

impl<T> InStage<T> for Result<T, BuildError> {
    fn in_stage(self, stage: Stage) -> Result<T, PipelineError> {
        self.map_err(|source| PipelineError { stage, source })
    }
}

/// Configuration for one complete framework build.
///
/// # Example
///
/// ```ignore
/// use fwbuild_sdk::{FrameworkBuild, Target};
/// use fwbuild_sdk::builders::SystemExecutor;
///
/// let result = FrameworkBuild::new("/src/opencv", "/out")
///     .targets(Target::ALL.to_vec())
///     .excluded_modules(vec!["world".to_string()])
///     .run(&SystemExecutor::new())?;
/// println!("Framework: {:?}", result.framework_path);
/// ```
#[derive(Debug, Clone)]
pub struct FrameworkBuild {
    source_root: PathBuf,
    output_dir: PathBuf,
    targets: Vec<Target>,
    excluded_modules: Vec<String>,
    module_flag_prefix: String,
    settings: ToolchainSettings,
    layout: FrameworkLayout,
    reference_platform: Option<Platform>,
}

impl FrameworkBuild {
    /// Creates a build of every supported target with default settings
    pub fn new(source_root: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            output_dir: output_dir.into(),
            targets: Target::ALL.to_vec(),
            excluded_modules: Vec::new(),
            module_flag_prefix: DEFAULT_MODULE_FLAG_PREFIX.to_string(),
            settings: ToolchainSettings::default(),
            layout: FrameworkLayout::default(),
            reference_platform: None,
        }
    }

    pub fn targets(mut self, targets: Vec<Target>) -> Self {
        self.targets = targets;
        self
    }

    pub fn excluded_modules(mut self, modules: Vec<String>) -> Self {
        self.excluded_modules = modules;
        self
    }

    pub fn module_flag_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.module_flag_prefix = prefix.into();
        self
    }

    pub fn settings(mut self, settings: ToolchainSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn layout(mut self, layout: FrameworkLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Names the platform whose headers and Info.plist go into the bundle
    pub fn reference_platform(mut self, platform: Option<Platform>) -> Self {
        self.reference_platform = platform;
        self
    }

    /// `<output_dir>/build`
    pub fn build_root(&self) -> PathBuf {
        self.output_dir.join(BUILD_DIR_NAME)
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Extra cmake flags derived from the excluded modules
    pub fn extra_cmake_flags(&self) -> Vec<String> {
        module_exclusion_flags(&self.module_flag_prefix, &self.excluded_modules)
    }

    /// The explicit reference platform, or the platform of the first requested target
    pub fn resolved_reference_platform(&self) -> Result<Platform, BuildError> {
        self.reference_platform
            .or_else(|| self.targets.first().map(|t| t.platform))
            .ok_or_else(|| BuildError::Config("no targets selected".to_string()))
    }

    fn resolve(&self) -> Result<(Platform, Vec<String>), BuildError> {
        if self.targets.is_empty() {
            return Err(BuildError::Config("no targets selected".to_string()));
        }
        if !self.source_root.is_dir() {
            return Err(BuildError::Config(format!(
                "source root {} is not a directory",
                self.source_root.display()
            )));
        }
        Ok((self.resolved_reference_platform()?, self.extra_cmake_flags()))
    }

    /// Runs every stage in order
    ///
    /// # Returns
    ///
    /// * `Ok(FrameworkResult)` - paths of the assembled bundle
    /// * `Err(PipelineError)` - the failing stage and its cause
    pub fn run(&self, executor: &dyn Executor) -> Result<FrameworkResult, PipelineError> {
        tracing::info!("Stage: {}", Stage::ResolveArgs);
        let (reference, extra_flags) = self.resolve().in_stage(Stage::ResolveArgs)?;
        let build_root = self.build_root();
        tracing::debug!(
            source_root = %self.source_root.display(),
            build_root = %build_root.display(),
            reference = %reference,
            "resolved paths"
        );

        tracing::info!("Stage: {}", Stage::BuildTargets);
        for target in &self.targets {
            tracing::info!("Building target {}", target);
            TargetBuilder::new(&self.source_root, &build_root, *target)
                .extra_flags(extra_flags.iter().cloned())
                .settings(self.settings.clone())
                .build(executor)
                .in_stage(Stage::BuildTargets)?;
        }

        let assembler = FrameworkAssembler::new(&build_root, &self.output_dir, reference)
            .layout(self.layout.clone());

        if executor.is_dry_run() {
            tracing::info!(
                "[dry-run] Would merge libraries under {} and assemble {}",
                build_root.display(),
                assembler.framework_path().display()
            );
        } else {
            tracing::info!("Stage: {}", Stage::MergeLibraries);
            LibraryMerger::new(&build_root, &self.layout.merged_library)
                .merge_all(executor)
                .in_stage(Stage::MergeLibraries)?;

            tracing::info!("Stage: {}", Stage::AssembleFramework);
            assembler
                .assemble(executor)
                .in_stage(Stage::AssembleFramework)?;
        }

        tracing::info!("Stage: {}", Stage::Done);
        Ok(FrameworkResult {
            framework_path: assembler.framework_path(),
            universal_library: assembler.universal_library_path(),
            targets: self.targets.clone(),
        })
    }
}
