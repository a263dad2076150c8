use clap::Parser;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;

/// Converts CS2 demos into one row per player and second.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Directory containing the demos
    #[arg(short, long)]
    input_dir: std::path::PathBuf,

    /// Directory the CSV files are written to
    #[arg(short, long, default_value = "Outputs")]
    output_dir: std::path::PathBuf,

    /// Extension of the files to process, `jsonl` files are read as
    /// recordings
    #[arg(short, long, default_value = "dem")]
    extension: String,

    /// Number of files processed at the same time, defaults to the available
    /// parallelism
    #[arg(short, long)]
    workers: Option<usize>,

    /// Length of a round in seconds, used for the ClockTime column
    #[arg(long, default_value_t = 115.0)]
    round_duration: f64,

    /// Tick rate the demos were recorded at
    #[arg(long, default_value_t = 64.0)]
    tick_rate: f64,

    /// Log more, can be repeated
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn config(&self) -> exporter::Config {
        let workers = self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });

        exporter::Config {
            input_dir: self.input_dir.clone(),
            output_dir: self.output_dir.clone(),
            extension: self.extension.trim_start_matches('.').to_owned(),
            workers,
            timeline: analysis::timeline::Config {
                round_duration: self.round_duration,
            },
            demo: analysis::demo::Config {
                tick_rate: self.tick_rate,
            },
        }
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let registry = tracing_subscriber::Registry::default()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::filter_fn(move |meta| {
            (meta.target().starts_with("exporter") || meta.target().starts_with("analysis"))
                && *meta.level() <= level
        }));
    if let Err(e) = tracing::subscriber::set_global_default(registry) {
        eprintln!("Setting up logging: {}", e);
        return std::process::ExitCode::FAILURE;
    }

    let config = std::sync::Arc::new(cli.config());
    tracing::debug!(?config, "Starting...");

    let report = match exporter::run_batch(config).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("{}", e);
            return std::process::ExitCode::FAILURE;
        }
    };

    let failed: Vec<_> = report.failed().collect();
    tracing::info!(
        succeeded = report.succeeded(),
        failed = failed.len(),
        "Completed export"
    );
    for outcome in failed.iter() {
        if let Err(e) = &outcome.result {
            tracing::error!("Failed {:?}: {}", outcome.input, e);
        }
    }

    if failed.is_empty() {
        std::process::ExitCode::SUCCESS
    } else {
        std::process::ExitCode::FAILURE
    }
}
