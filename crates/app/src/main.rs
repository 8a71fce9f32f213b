use beanport::cli::{init_logging, run, Cli};
use clap::Parser;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging();
    run(cli)
}
