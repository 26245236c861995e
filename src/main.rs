use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod core;
mod knowledge;
mod matching;
mod utils;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("phyto_match=debug,info")
    } else {
        EnvFilter::new("phyto_match=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        cli::Commands::Diagnose(args) => {
            cli::diagnose::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Kb(args) => {
            cli::kb::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Fuzzy(args) => {
            cli::fuzzy::run(args, cli.format, cli.verbose)?;
        }
    }

    Ok(())
}
