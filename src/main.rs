use std::process;

use anyhow::Context;
use clap::Parser;

use aio_write_verify::cli::Cli;
use aio_write_verify::{logging, run_iterations_with};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init_logging(cli.verbose);

    match run(&cli).await {
        Ok(true) => println!("All tests passed"),
        Ok(false) => process::exit(1),
        Err(err) => {
            eprintln!("aio-write-verify error: {:#}", err);
            process::exit(1);
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<bool> {
    let config = cli.run_config();

    let report = run_iterations_with(&config, |iteration| println!("Iteration {}", iteration))
        .await
        .with_context(|| format!("checking {}", config.dir.display()))?;

    if let Some((iteration, failure)) = report.first_failure() {
        println!("Iteration {}: {}", iteration, failure);
        if report.failures() > 1 {
            println!("{} of {} iterations failed", report.failures(), report.results.len());
        }
        return Ok(false);
    }

    Ok(true)
}
