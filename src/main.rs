mod cli;
mod commands;
mod formatting;
mod settings;

use std::process::ExitCode;

use cli::Commands;
use commands::{run_compare, run_diff, run_serve};
use parity_gateway::logging::{self, LogOptions};

#[tokio::main]
async fn main() -> ExitCode {
    run().await
}

async fn run() -> ExitCode {
    let args = cli::parse();
    logging::init(LogOptions {
        verbose: args.verbose,
        json: args.log_json,
    });

    match args.command {
        Commands::Serve(serve) => run_serve(args.config, serve).await,
        Commands::Compare(compare) => run_compare(args.config, compare).await,
        Commands::Diff(diff) => run_diff(args.config, diff).await,
    }
}
