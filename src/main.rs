//! bake - Command-line asset builder for bakery projects

use std::process::ExitCode;

use bakery::cli;

fn main() -> ExitCode {
    cli::run()
}
