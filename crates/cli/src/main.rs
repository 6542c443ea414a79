use std::process::ExitCode;

fn main() -> ExitCode {
    mobicare_cli::run()
}
