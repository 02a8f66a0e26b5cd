use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use tile_assembler::config::{CliArgs, PipelineConfig};
use tile_assembler::pipeline::Pipeline;

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // Init tracing
    let filter = if args.verbose {
        EnvFilter::new("tile_assembler=debug")
    } else {
        EnvFilter::new("tile_assembler=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config: PipelineConfig = args.into();

    // Configure rayon thread pool
    if let Some(threads) = config.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure rayon thread pool")?;
    }

    match Pipeline::run(&config) {
        Ok(result) if config.dry_run => {
            println!("Dry run finished in {:.2}s", result.duration.as_secs_f64());
            Ok(())
        }
        Ok(result) => {
            println!(
                "Done: {} features, {} bytes written in {:.2}s",
                result.batch_length,
                result.tile_bytes,
                result.duration.as_secs_f64()
            );
            Ok(())
        }
        Err(e) => {
            error!(%e, "Pipeline failed");
            Err(anyhow::anyhow!(e)).context("tile-assembler pipeline failed")
        }
    }
}
