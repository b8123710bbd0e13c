//! # fwbuild
//!
//! Command-line tool that builds a universal static `.framework` for iOS
//! from a CMake project.
//!
//! ## Overview
//!
//! `fwbuild` is the CLI front end of [`fwbuild_sdk`]. For every requested
//! architecture it configures and builds the project with cmake and
//! xcodebuild, merges the per-module static libraries with `libtool`, and
//! combines all architectures with `lipo` into a versioned framework bundle.
//!
//! ## Quick Start
//!
//! ```bash
//! # Build every supported architecture into ./ios
//! fwbuild ios --source-root ../opencv
//!
//! # Device arm64 and simulator x86_64 only, without two modules
//! fwbuild ios --archs arm64,x86_64 --excluded_modules videoio,highgui
//!
//! # Show the commands without running anything
//! fwbuild ios --dry-run
//! ```
//!
//! ## Output Directory
//!
//! ```text
//! <OUTDIR>/
//! ├── build/               # one reusable cmake build tree per target
//! └── opencv2.framework/   # recreated on every run
//! ```
//!
//! ## CLI Flags
//!
//! Global flags:
//!
//! - **`--dry-run`** - Print the commands that would run without running them
//! - **`--verbose` / `-v`** - Enable debug logging (`RUST_LOG` overrides it)
//!
//! ## Modules
//!
//! - [`config`] - Configuration file support for `fwbuild.toml`

#![cfg_attr(docsrs, feature(doc_cfg))]

use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use fwbuild_sdk::builders::SystemExecutor;
use fwbuild_sdk::{Arch, FrameworkBuild, Platform, Target, parse_arch_list};

pub mod config;

use config::ConfigResolver;

/// Width of the banner framing a fatal error.
const BANNER_WIDTH: usize = 60;

/// Builds a universal iOS framework from a CMake project.
#[derive(Parser, Debug)]
#[command(name = "fwbuild", author, version, about = "Builds a universal static framework for iOS", long_about = None)]
struct Cli {
    /// Print what would be done without actually doing it
    #[arg(long, global = true)]
    dry_run: bool,

    /// Print verbose output including all commands
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Folder to put the built framework in
    #[arg(value_name = "OUTDIR")]
    out: PathBuf,

    #[arg(
        long,
        value_name = "ARCHS",
        help = "Comma-separated architectures (default is all \"armv7,armv7s,arm64,i386,x86_64\")"
    )]
    archs: Option<String>,

    #[arg(
        long = "excluded_modules",
        alias = "excluded-modules",
        value_name = "MODULES",
        help = "Comma-separated modules to leave out of the build"
    )]
    excluded_modules: Option<String>,

    #[arg(long, help = "Root of the CMake project (default: config, then current directory)")]
    source_root: Option<PathBuf>,

    #[arg(
        long,
        value_parser = parse_platform,
        help = "Platform supplying headers and Info.plist (iPhoneOS or iPhoneSimulator)"
    )]
    reference_platform: Option<Platform>,

    #[arg(long, help = "Optional path to config file (default: discover fwbuild.toml)")]
    config: Option<PathBuf>,
}

fn parse_platform(value: &str) -> std::result::Result<Platform, String> {
    value.parse().map_err(|e: fwbuild_sdk::BuildError| e.to_string())
}

/// Parses the command line, builds the framework and prints a summary.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cwd = env::current_dir().context("Failed to get current directory")?;
    let resolver = match &cli.config {
        Some(path) => ConfigResolver::from_file(&absolutize(&cwd, path))?,
        None => ConfigResolver::discover_from(&cwd)?,
    };
    if let Some(path) = &resolver.config_path {
        tracing::info!("Using config file {}", path.display());
    }

    let archs = requested_archs(cli.archs.as_deref())?;
    let excluded = excluded_modules(cli.excluded_modules.as_deref());
    println!(
        "Building only for [{}]...",
        archs.iter().map(Arch::as_str).collect::<Vec<_>>().join(", ")
    );
    if let Some(modules) = &excluded {
        println!("Excluding the modules [{}]", modules.join(", "));
    }

    let build = framework_build(&cli, &cwd, &resolver, &archs, excluded.unwrap_or_default())?;
    let executor = SystemExecutor::new()
        .dry_run(cli.dry_run)
        .verbose(cli.verbose);
    let result = build.run(&executor)?;

    if cli.dry_run {
        println!(
            "[dry-run] Framework would be written to {}",
            result.framework_path.display()
        );
    } else {
        println!("Framework written to {}", result.framework_path.display());
        println!(
            "  Universal library: {}",
            result.universal_library.display()
        );
    }
    println!(
        "  Targets: {}",
        result
            .targets
            .iter()
            .map(Target::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(())
}

/// Turns on backtrace capture for errors unless the user configured it.
///
/// Must run before any other thread is started.
pub fn capture_error_backtraces() {
    if env::var_os("RUST_LIB_BACKTRACE").is_none() && env::var_os("RUST_BACKTRACE").is_none() {
        // SAFETY: called first thing in `main`, while the process is single-threaded.
        unsafe { env::set_var("RUST_LIB_BACKTRACE", "1") };
    }
}

/// Prints a fatal error framed by a banner, followed by its cause chain and
/// the backtrace captured where it was raised.
pub fn report_error(err: &anyhow::Error) {
    let banner = "=".repeat(BANNER_WIDTH);
    eprintln!("{banner}");
    eprintln!("ERROR: {err:#}");
    eprintln!("{banner}");
    eprintln!("{err:?}");
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A subscriber may already be installed when embedded in another binary.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn requested_archs(list: Option<&str>) -> Result<Vec<Arch>> {
    match list {
        Some(list) => parse_arch_list(list).context("Invalid --archs"),
        None => Ok(Arch::ALL.to_vec()),
    }
}

fn excluded_modules(list: Option<&str>) -> Option<Vec<String>> {
    list.map(|list| {
        list.split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect()
    })
}

fn framework_build(
    cli: &Cli,
    cwd: &Path,
    resolver: &ConfigResolver,
    archs: &[Arch],
    excluded: Vec<String>,
) -> Result<FrameworkBuild> {
    let source_root = cli
        .source_root
        .as_deref()
        .map(|p| absolutize(cwd, p))
        .or_else(|| resolver.source_root().map(|p| absolutize(cwd, &p)))
        .unwrap_or_else(|| cwd.to_path_buf());
    let reference_platform = match cli.reference_platform {
        Some(platform) => Some(platform),
        None => resolver.reference_platform()?,
    };

    tracing::debug!(
        source_root = %source_root.display(),
        reference_platform = ?reference_platform,
        "Resolved build settings"
    );

    Ok(
        FrameworkBuild::new(source_root, absolutize(cwd, &cli.out))
            .targets(Target::select(archs))
            .excluded_modules(excluded)
            .module_flag_prefix(resolver.module_flag_prefix())
            .settings(resolver.toolchain())
            .layout(resolver.layout())
            .reference_platform(reference_platform),
    )
}
