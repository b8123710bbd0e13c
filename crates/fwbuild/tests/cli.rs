//! End-to-end tests for the fwbuild binary.
//!
//! Fake `cmake`, `xcodebuild`, `libtool` and `lipo` scripts are placed first
//! on PATH. They log their arguments and create the files the real tools
//! would, so a whole framework build runs on any Unix host.

#![cfg(unix)]

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const FAKE_CMAKE: &str = r#"#!/bin/sh
echo "cmake $*" >> "$FWBUILD_TEST_LOG"
for arg in "$@"; do printf 'cmake-arg [%s]\n' "$arg" >> "$FWBUILD_TEST_LOG"; done
touch CMakeCache.txt
"#;

const FAILING_CMAKE: &str = r#"#!/bin/sh
echo "CMake Error: toolchain exploded" >&2
exit 1
"#;

const FAKE_XCODEBUILD: &str = r#"#!/bin/sh
echo "xcodebuild $*" >> "$FWBUILD_TEST_LOG"
last=""
for arg in "$@"; do last="$arg"; done
if [ "$last" = "install" ]; then
    mkdir -p install/include/opencv2 ios lib/Release
    echo "// header" > install/include/opencv2/opencv.hpp
    echo "<plist/>" > ios/Info.plist
    echo "core" > lib/Release/libopencv_core.a
    echo "imgproc" > lib/Release/libopencv_imgproc.a
fi
"#;

/// Shared by libtool and lipo: log, then write whatever follows `-o`.
const FAKE_OUTPUT_TOOL: &str = r#"#!/bin/sh
echo "$(basename "$0") $*" >> "$FWBUILD_TEST_LOG"
out=""
while [ $# -gt 0 ]; do
    if [ "$1" = "-o" ]; then out="$2"; fi
    shift
done
echo "fat" > "$out"
"#;

/// A scratch workspace: fake tools, a source tree and an output directory.
struct Workspace {
    temp: TempDir,
}

impl Workspace {
    fn new(cmake: &str) -> Self {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        write_script(&bin.join("cmake"), cmake);
        write_script(&bin.join("xcodebuild"), FAKE_XCODEBUILD);
        write_script(&bin.join("libtool"), FAKE_OUTPUT_TOOL);
        write_script(&bin.join("lipo"), FAKE_OUTPUT_TOOL);

        let toolchains = temp.path().join("src/platforms/ios/cmake/Toolchains");
        fs::create_dir_all(&toolchains).unwrap();
        for platform in ["iPhoneOS", "iPhoneSimulator"] {
            fs::write(
                toolchains.join(format!("Toolchain-{platform}_Xcode.cmake")),
                "",
            )
            .unwrap();
        }

        Self { temp }
    }

    fn root(&self) -> &Path {
        self.temp.path()
    }

    fn out(&self) -> PathBuf {
        self.root().join("out")
    }

    fn log(&self) -> String {
        fs::read_to_string(self.root().join("tools.log")).unwrap_or_default()
    }

    /// The fwbuild command, run from the workspace with fake tools on PATH.
    fn fwbuild(&self) -> Command {
        let mut paths = vec![self.root().join("bin")];
        if let Some(existing) = std::env::var_os("PATH") {
            paths.extend(std::env::split_paths(&existing));
        }

        let mut cmd = cargo_bin_cmd!("fwbuild");
        cmd.current_dir(self.root())
            .env("PATH", std::env::join_paths(paths).unwrap())
            .env("FWBUILD_TEST_LOG", self.root().join("tools.log"))
            .env_remove("RUST_LOG")
            .env_remove("RUST_BACKTRACE")
            .env_remove("RUST_LIB_BACKTRACE")
            .arg("out")
            .arg("--source-root")
            .arg("src");
        cmd
    }
}

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

// =============================================================================
// Help & Usage
// =============================================================================

#[test]
fn help_lists_flags() {
    cargo_bin_cmd!("fwbuild")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--archs"))
        .stdout(predicate::str::contains("--excluded_modules"));
}

#[test]
fn missing_outdir_is_a_usage_error() {
    cargo_bin_cmd!("fwbuild").assert().failure();
}

#[test]
fn unknown_arch_fails_with_banner() {
    let ws = Workspace::new(FAKE_CMAKE);
    ws.fwbuild()
        .args(["--archs", "arm64,mips"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("=".repeat(60)))
        .stderr(predicate::str::contains("ERROR:"))
        .stderr(predicate::str::contains("unknown architecture 'mips'"));
    assert!(ws.log().is_empty());
}

// =============================================================================
// Full builds
// =============================================================================

#[test]
fn builds_universal_framework() {
    let ws = Workspace::new(FAKE_CMAKE);
    ws.fwbuild()
        .args(["--archs", "x86_64,arm64", "--excluded_modules", "videoio,highgui"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Building only for [x86_64, arm64]..."))
        .stdout(predicate::str::contains(
            "Excluding the modules [videoio, highgui]",
        ))
        .stdout(predicate::str::contains("Framework written to"));

    let framework = ws.out().join("opencv2.framework");
    assert_eq!(
        fs::read_link(framework.join("Versions/Current")).unwrap(),
        PathBuf::from("A")
    );
    for (link, target) in [
        ("Headers", "Versions/Current/Headers"),
        ("Resources", "Versions/Current/Resources"),
        ("opencv2", "Versions/Current/opencv2"),
    ] {
        assert_eq!(
            fs::read_link(framework.join(link)).unwrap(),
            PathBuf::from(target)
        );
    }
    assert!(framework.join("Headers/opencv.hpp").is_file());
    assert_eq!(
        fs::read_to_string(framework.join("Resources/Info.plist")).unwrap(),
        "<plist/>\n"
    );
    assert!(framework.join("opencv2").is_file());

    let log = ws.log();
    let cmake_lines: Vec<_> = log.lines().filter(|l| l.starts_with("cmake ")).collect();
    assert_eq!(cmake_lines.len(), 2);
    assert!(cmake_lines[0].contains("-DBUILD_opencv_videoio=OFF -DBUILD_opencv_highgui=OFF"));
    assert!(cmake_lines.iter().all(|l| !l.contains("-DENABLE_NEON=ON")));
    assert_eq!(log.lines().filter(|l| l.starts_with("libtool ")).count(), 2);

    let lipo = log.lines().find(|l| l.starts_with("lipo ")).unwrap();
    assert!(lipo.contains("iPhoneOS-arm64/lib/Release/libopencv_merged"));
    assert!(lipo.contains("iPhoneSimulator-x86_64/lib/Release/libopencv_merged"));
    assert!(lipo.ends_with("-o Versions/A/opencv2"));
}

#[test]
fn second_run_reuses_cmake_cache() {
    let ws = Workspace::new(FAKE_CMAKE);
    ws.fwbuild().args(["--archs", "armv7"]).assert().success();
    fs::write(
        ws.out().join("opencv2.framework/Versions/A/stale.txt"),
        "left over",
    )
    .unwrap();
    ws.fwbuild().args(["--archs", "armv7"]).assert().success();

    let log = ws.log();
    let cmake_lines: Vec<_> = log.lines().filter(|l| l.starts_with("cmake ")).collect();
    assert_eq!(cmake_lines.len(), 2);
    assert!(cmake_lines[0].contains("-DENABLE_NEON=ON"));
    assert!(!cmake_lines[0].ends_with(" ."));
    assert!(cmake_lines[1].ends_with(" ."));
    assert!(!ws.out().join("opencv2.framework/Versions/A/stale.txt").exists());
}

#[test]
fn dry_run_touches_nothing() {
    let ws = Workspace::new(FAKE_CMAKE);
    ws.fwbuild()
        .args(["--archs", "arm64", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[dry-run]"));

    assert!(ws.log().is_empty());
    assert!(!ws.out().exists());
}

#[test]
fn failing_tool_exits_with_status_one() {
    let ws = Workspace::new(FAILING_CMAKE);
    ws.fwbuild()
        .args(["--archs", "arm64"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ERROR: building targets failed"))
        .stderr(predicate::str::contains("returned exit status 1"))
        .stderr(predicate::str::contains("CMake Error: toolchain exploded"))
        .stderr(predicate::str::contains("Stack backtrace:"));

    assert!(!ws.out().join("opencv2.framework").exists());
}

#[test]
fn excluded_module_names_stay_single_arguments() {
    let ws = Workspace::new(FAKE_CMAKE);
    ws.fwbuild()
        .args(["--archs", "arm64", "--excluded_modules", "foo bar;touch INJECTED,videoio"])
        .assert()
        .success();

    let log = ws.log();
    assert!(log.contains("cmake-arg [-DBUILD_opencv_foo bar;touch INJECTED=OFF]\n"));
    assert!(log.contains("cmake-arg [-DBUILD_opencv_videoio=OFF]\n"));
    assert!(!ws.out().join("build/iPhoneOS-arm64/INJECTED=OFF").exists());
}

#[test]
fn config_file_supplies_defaults() {
    let ws = Workspace::new(FAKE_CMAKE);
    fs::write(
        ws.root().join("fwbuild.toml"),
        "[project]\nframework_name = \"opencv2\"\n\n[toolchain]\ndeployment_target = \"11.0\"\njobs = 3\n",
    )
    .unwrap();

    ws.fwbuild().args(["--archs", "i386"]).assert().success();

    let log = ws.log();
    let build = log
        .lines()
        .find(|l| l.contains("-target ALL_BUILD"))
        .unwrap();
    assert!(build.contains("IPHONEOS_DEPLOYMENT_TARGET=11.0"));
    assert!(build.contains("-jobs 3"));
    assert!(build.contains("-sdk iphonesimulator"));
}
