use std::process::ExitCode;

fn main() -> ExitCode {
    hoops_cli::run()
}
