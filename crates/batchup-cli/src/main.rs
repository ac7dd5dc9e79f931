use batchup_core::logging;
use clap::Parser;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging as early as possible; an unwritable state dir falls back to stderr.
    if let Err(err) = logging::init_logging(cli.verbose) {
        logging::init_logging_stderr(cli.verbose);
        tracing::warn!("file logging unavailable ({:#}), logging to stderr", err);
    }

    if let Err(err) = cli.run().await {
        eprintln!("batchup error: {:#}", err);
        std::process::exit(1);
    }
}
