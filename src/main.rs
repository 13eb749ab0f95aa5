use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tp10_vector_ops::{HarnessError, HostDevice, HostImage};
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "tp10-vector-ops",
    about = "Validate vector image reads/writes against the 1x1 conversion on a TP10 image"
)]
struct Cli {
    /// Source TP10 image
    image: PathBuf,

    /// Worker threads evaluating kernels, defaults to one per CPU
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");

            let code = err
                .downcast_ref::<HarnessError>()
                .map_or(1, HarnessError::exit_code);

            // Device status codes are negative, the process reports them as their low byte
            ExitCode::from(code as u8)
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    #[cfg(feature = "multi-thread")]
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure the worker threads")?;
    }

    let image = HostImage::load(&cli.image)
        .with_context(|| format!("failed to load {}", cli.image.display()))?;

    info!("Source: {}x{}", image.width(), image.height());

    let mut device = HostDevice::new();
    let report = tp10_vector_ops::run(&mut device, &image)?;

    for variant in &report.variants {
        info!(
            "  {}: {} rows x {} bytes, grid {}x{}",
            variant.name, variant.rows, variant.bytes_per_row, variant.work_size.x, variant.work_size.y
        );
    }

    info!("PASSED");

    Ok(())
}
