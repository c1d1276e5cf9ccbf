use std::process::ExitCode;

fn main() -> ExitCode {
    taskbot_cli::run()
}
