use clap::Parser;
use votegate_lib::cli::Cli;

fn main() {
    if let Err(err) = votegate_lib::run(Cli::parse()) {
        log::error!("{err:?}");
        eprintln!("votegate: {err:#}");
        std::process::exit(1);
    }
}
