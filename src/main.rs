//! # S3 Benchmark - Main Entry Point
//!
//! The main function performs these steps:
//! 1. **Parse arguments**: Command-line configuration via clap
//! 2. **Initialize logging**: Console output plus an optional log file
//! 3. **Create benchmark config**: Validate and convert the arguments
//! 4. **Build the store**: S3 adapter or the in-memory store
//! 5. **Run the benchmark**: One operation kind with its worker units
//! 6. **Report**: Post metrics to KairosDB when configured
//! 7. **Generate results**: Print the summary and write the optional JSON file
//!
//! ## Error Handling
//!
//! Invalid arguments, a store that cannot be built and a run without a
//! single sample end the process with an error. Failing to deliver metrics
//! is only logged.

use anyhow::Result;
use clap::Parser;
use s3_benchmark::{
    benchmark::{BenchmarkConfig, BenchmarkRunner},
    cli::Args,
    logging,
    reporting::{self, KairosDbSink},
    results::ResultsManager,
    storage::StoreFactory,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Held until exit so the non-blocking file writer flushes
    let _log_guard = logging::init_logging(args.verbose, args.quiet, args.log_file.as_deref())?;

    info!("Starting S3 Benchmark {}", s3_benchmark::VERSION);

    let config = BenchmarkConfig::from_args(&args)?;
    let store = StoreFactory::create(config.storage, &config.store)?;

    let runner = BenchmarkRunner::new(config.clone(), store);
    let results = runner.run().await?;

    match &config.kairosdb_url {
        Some(url) => {
            if !reporting::report(&results, &config, KairosDbSink::new(url)).await {
                warn!("Some metrics could not be delivered to {}", url);
            }
        }
        None => info!("No KairosDB URL configured, skipping metrics reporting"),
    }

    ResultsManager::new(args.output_file.as_deref()).finalize(&results)?;

    info!("S3 Benchmark completed");
    Ok(())
}
