//! Common utilities shared by the target builder, merger and assembler.
//!
//! ## Features
//!
//! - **Explicit working directories** - Every [`Invocation`] carries the
//!   directory it runs in; the process-wide current directory is never touched
//! - **Pluggable execution** - Builders talk to an [`Executor`], so a run can
//!   be previewed with [`SystemExecutor::dry_run`] or recorded in tests
//! - **Consistent error handling** - Exit codes, signals, spawn failures and
//!   filesystem errors all map onto [`BuildError`] with the command and
//!   directory attached

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use crate::types::BuildError;

/// The command part of an [`Invocation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// A line handed to `sh -c` verbatim.
    Shell(String),
    /// A program followed by its arguments, no shell involved.
    Argv(Vec<OsString>),
}

/// One external command together with the directory it runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: CommandLine,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    /// Creates an invocation that runs `line` through the shell.
    pub fn shell(line: impl Into<String>) -> Self {
        Self {
            command: CommandLine::Shell(line.into()),
            cwd: None,
        }
    }

    /// Creates an invocation that runs `program` directly with `args`.
    pub fn argv<I, S>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut argv = vec![program.into()];
        argv.extend(args.into_iter().map(Into::into));
        Self {
            command: CommandLine::Argv(argv),
            cwd: None,
        }
    }

    /// Sets the working directory for the command.
    pub fn in_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Returns the argument vector, or `None` for shell lines.
    pub fn args(&self) -> Option<&[OsString]> {
        match &self.command {
            CommandLine::Argv(argv) => Some(argv),
            CommandLine::Shell(_) => None,
        }
    }

    /// Returns the working directory as shown in logs and errors.
    pub fn cwd_display(&self) -> String {
        match &self.cwd {
            Some(dir) => dir.display().to_string(),
            None => "the current directory".to_string(),
        }
    }

    fn to_command(&self) -> Command {
        let mut cmd = match &self.command {
            CommandLine::Shell(line) => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(line);
                cmd
            }
            CommandLine::Argv(argv) => {
                let mut cmd = Command::new(&argv[0]);
                cmd.args(&argv[1..]);
                cmd
            }
        };
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.command {
            CommandLine::Shell(line) => f.write_str(line),
            CommandLine::Argv(argv) => {
                let rendered: Vec<String> = argv
                    .iter()
                    .map(|a| shell_quote(&a.to_string_lossy()))
                    .collect();
                f.write_str(&rendered.join(" "))
            }
        }
    }
}

/// Runs [`Invocation`]s on behalf of the builders.
pub trait Executor {
    /// Runs one command to completion.
    ///
    /// Returns `Ok(())` only when the command exits with status zero.
    fn run(&self, invocation: &Invocation) -> Result<(), BuildError>;

    /// Whether commands are only being previewed.
    ///
    /// Stages that touch the filesystem directly skip that work when this is set.
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Executes commands as child processes of the current process.
#[derive(Debug, Clone, Default)]
pub struct SystemExecutor {
    dry_run: bool,
    verbose: bool,
}

impl SystemExecutor {
    /// Creates an executor that really runs commands.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log commands without running them.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Log argument vectors in addition to the rendered command line.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl Executor for SystemExecutor {
    fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn run(&self, invocation: &Invocation) -> Result<(), BuildError> {
        if self.dry_run {
            tracing::info!(
                "[dry-run] Would execute: {} in {}",
                invocation,
                invocation.cwd_display()
            );
            return Ok(());
        }

        tracing::info!("Executing: {} in {}", invocation, invocation.cwd_display());
        if self.verbose
            && let Some(argv) = invocation.args()
        {
            tracing::debug!(?argv, "argument vector");
        }

        let status = invocation
            .to_command()
            .status()
            .map_err(|source| BuildError::Spawn {
                command: invocation.to_string(),
                cwd: invocation.cwd_display(),
                source,
            })?;

        check_status(invocation, status)
    }
}

fn check_status(invocation: &Invocation, status: ExitStatus) -> Result<(), BuildError> {
    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => Err(BuildError::CommandExit {
            command: invocation.to_string(),
            cwd: invocation.cwd_display(),
            code,
        }),
        None => Err(BuildError::CommandSignal {
            command: invocation.to_string(),
            cwd: invocation.cwd_display(),
            signal: exit_signal(status),
        }),
    }
}

#[cfg(unix)]
fn exit_signal(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_signal(_status: ExitStatus) -> i32 {
    -1
}

/// Quotes a word for display or for splicing into a shell line.
///
/// Words made only of safe characters are returned unchanged.
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Escapes the characters that stay special inside a double-quoted shell word.
pub fn double_quote_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Lists the entries matching a glob pattern rooted at `dir`, sorted by path.
pub fn sorted_glob(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, BuildError> {
    let full = escaped_pattern(dir, pattern);
    let entries = glob::glob(&full)
        .map_err(|e| BuildError::Config(format!("invalid glob pattern {}: {}", full, e)))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            BuildError::fs("read", path, e.into_error())
        })?;
        paths.push(path);
    }
    paths.sort();
    Ok(paths)
}

fn escaped_pattern(dir: &Path, pattern: &str) -> String {
    let base = glob::Pattern::escape(&dir.to_string_lossy());
    format!("{}/{}", base.trim_end_matches('/'), pattern)
}

/// Removes `path` and everything below it; a missing path is not an error.
pub fn remove_dir_if_exists(path: &Path) -> Result<(), BuildError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BuildError::fs("remove", path, e)),
    }
}

/// Creates `path` and any missing parents.
pub fn create_dir_all(path: &Path) -> Result<(), BuildError> {
    fs::create_dir_all(path).map_err(|e| BuildError::fs("create directory", path, e))
}

/// Copies a single file, overwriting the destination.
pub fn copy_file(src: &Path, dest: &Path) -> Result<(), BuildError> {
    fs::copy(src, dest)
        .map(|_| ())
        .map_err(|e| BuildError::fs("copy", src, e))
}

/// Recursively copies a directory tree.
pub fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<(), BuildError> {
    create_dir_all(dest)?;

    for entry in fs::read_dir(src).map_err(|e| BuildError::fs("read directory", src, e))? {
        let entry = entry.map_err(|e| BuildError::fs("read directory", src, e))?;
        let path = entry.path();
        let dest_path = dest.join(entry.file_name());

        // Follows symlinks, so a linked header directory is copied as a tree
        if path.is_dir() {
            copy_dir_recursive(&path, &dest_path)?;
        } else {
            copy_file(&path, &dest_path)?;
        }
    }

    Ok(())
}

/// Creates a relative symbolic link at `link` pointing to `target`.
#[cfg(unix)]
pub fn symlink(target: &Path, link: &Path) -> Result<(), BuildError> {
    std::os::unix::fs::symlink(target, link).map_err(|e| BuildError::fs("create symlink", link, e))
}

/// Creates a relative symbolic link at `link` pointing to `target`.
#[cfg(windows)]
pub fn symlink(target: &Path, link: &Path) -> Result<(), BuildError> {
    std::os::windows::fs::symlink_dir(target, link)
        .map_err(|e| BuildError::fs("create symlink", link, e))
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("-DCMAKE_INSTALL_PREFIX=install"), "-DCMAKE_INSTALL_PREFIX=install");
        assert_eq!(shell_quote("/tmp/my dir"), "'/tmp/my dir'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_double_quote_escape() {
        assert_eq!(double_quote_escape("-Wall -g"), "-Wall -g");
        assert_eq!(
            double_quote_escape(r#"-D"X"=$Y `z` \w"#),
            r#"-D\"X\"=\$Y \`z\` \\w"#
        );
    }

    #[test]
    fn test_invocation_display() {
        let inv = Invocation::argv("lipo", ["-create", "a b", "-o", "out"]).in_dir("/tmp");
        assert_eq!(inv.to_string(), "lipo -create 'a b' -o out");
        assert_eq!(inv.cwd_display(), "/tmp");

        let inv = Invocation::shell("cmake -GXcode .");
        assert_eq!(inv.to_string(), "cmake -GXcode .");
        assert_eq!(inv.cwd_display(), "the current directory");
        assert!(inv.args().is_none());
    }

    #[test]
    fn test_run_command_not_found() {
        let inv = Invocation::argv("nonexistent-command-12345", Vec::<String>::new());
        let err = SystemExecutor::new().run(&inv).unwrap_err();
        assert!(matches!(err, BuildError::Spawn { .. }));
        assert!(err.to_string().contains("failed to start"));
    }

    #[test]
    fn test_dry_run_skips_execution() {
        let inv = Invocation::argv("nonexistent-command-12345", Vec::<String>::new());
        let executor = SystemExecutor::new().dry_run(true);
        assert!(executor.is_dry_run());
        assert!(executor.run(&inv).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_reported() {
        let inv = Invocation::shell("exit 3");
        let err = SystemExecutor::new().run(&inv).unwrap_err();
        match err {
            BuildError::CommandExit { code, command, .. } => {
                assert_eq!(code, 3);
                assert_eq!(command, "exit 3");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_signal_is_reported() {
        let inv = Invocation::shell("kill -9 $$");
        let err = SystemExecutor::new().run(&inv).unwrap_err();
        assert!(matches!(err, BuildError::CommandSignal { signal: 9, .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_runs_in_given_directory() {
        let temp = TempDir::new().unwrap();
        let before = std::env::current_dir().unwrap();
        let inv = Invocation::shell("touch marker").in_dir(temp.path());
        SystemExecutor::new().run(&inv).unwrap();
        assert!(temp.path().join("marker").exists());
        assert_eq!(std::env::current_dir().unwrap(), before);
    }

    #[test]
    fn test_sorted_glob() {
        let temp = TempDir::new().unwrap();
        for name in ["libz.a", "liba.a", "libm.a", "notes.txt"] {
            fs::write(temp.path().join(name), b"").unwrap();
        }
        let libs = sorted_glob(temp.path(), "*.a").unwrap();
        let names: Vec<_> = libs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["liba.a", "libm.a", "libz.a"]);
    }

    #[test]
    fn test_sorted_glob_missing_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        let libs = sorted_glob(&temp.path().join("missing"), "*.a").unwrap();
        assert!(libs.is_empty());
    }

    #[test]
    fn test_copy_dir_recursive() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("core")).unwrap();
        fs::write(src.join("top.hpp"), b"top").unwrap();
        fs::write(src.join("core/mat.hpp"), b"mat").unwrap();

        let dest = temp.path().join("dest");
        copy_dir_recursive(&src, &dest).unwrap();

        assert_eq!(fs::read(dest.join("top.hpp")).unwrap(), b"top");
        assert_eq!(fs::read(dest.join("core/mat.hpp")).unwrap(), b"mat");
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_dir_recursive_follows_linked_dirs() {
        let temp = TempDir::new().unwrap();
        let real = temp.path().join("real/core");
        fs::create_dir_all(&real).unwrap();
        fs::write(real.join("mat.hpp"), b"mat").unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        std::os::unix::fs::symlink(&real, src.join("core")).unwrap();

        let dest = temp.path().join("dest");
        copy_dir_recursive(&src, &dest).unwrap();

        assert!(fs::symlink_metadata(dest.join("core")).unwrap().is_dir());
        assert_eq!(fs::read(dest.join("core/mat.hpp")).unwrap(), b"mat");
    }

    #[test]
    fn test_remove_dir_if_exists_rejects_files() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("opencv2.framework");
        fs::write(&file, b"not a bundle").unwrap();

        let err = remove_dir_if_exists(&file).unwrap_err();
        assert!(matches!(err, BuildError::Filesystem { action: "remove", .. }));
        assert!(file.is_file());
    }

    #[test]
    fn test_remove_dir_if_exists_tolerates_missing() {
        let temp = TempDir::new().unwrap();
        assert!(remove_dir_if_exists(&temp.path().join("nope")).is_ok());
    }
}
