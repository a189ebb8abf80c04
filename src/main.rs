use clap::Parser;
use samalert::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    samalert::logging::init();
    run(Cli::parse())
}
