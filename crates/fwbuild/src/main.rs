use std::process::ExitCode;

fn main() -> ExitCode {
    fwbuild::capture_error_backtraces();
    match fwbuild::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            fwbuild::report_error(&err);
            ExitCode::from(1)
        }
    }
}
