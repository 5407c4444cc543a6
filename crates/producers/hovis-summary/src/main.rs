use clap::Parser;
use log::{error, info};

use hovis_output::logger::initiate_stderr_logger;

use crate::produce::summary::{CliArgs, Summariser};

mod produce {
    pub mod summary;
}

fn main() {
    let args = CliArgs::parse();
    initiate_stderr_logger("info");
    let start = std::time::Instant::now();
    match Summariser::new(&args).summarise() {
        Ok(counts) => info!(
            "Summarised {} cells and {} serving periods in {} ms.",
            counts.cells,
            counts.intervals,
            start.elapsed().as_millis()
        ),
        Err(e) => {
            error!("Failed to summarise {}: {}", args.input, e);
            std::process::exit(1);
        }
    }
}
