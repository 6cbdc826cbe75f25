use std::process::ExitCode;

fn main() -> ExitCode {
    bundlerun::cli::main()
}
