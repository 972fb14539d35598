use std::process::ExitCode;

fn main() -> ExitCode {
    adpilot_cli::run()
}
