use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use riverflow_service::config::{self, DEFAULT_CONFIG_FILE};
use riverflow_service::ingest::RawTableFetcher;
use riverflow_service::ingest::replay::ReplayFetcher;
use riverflow_service::ingest::wapda::HttpTableFetcher;
use riverflow_service::logging::{Logger, Source};
use riverflow_service::model::{Result, RiverflowError};
use riverflow_service::pipeline;

/// Merge the latest WAPDA river-flow days into the historical CSV.
#[derive(Debug, Parser)]
#[command(name = "riverflow", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Historical series CSV (overrides config)
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Days re-spliced on every run (overrides config)
    #[arg(long)]
    threshold_days: Option<usize>,

    /// Read saved `<year>.html` pages from this directory instead of the live site
    #[arg(long)]
    replay_dir: Option<PathBuf>,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = config::load(&cli.config)?;
    if let Some(csv) = cli.csv {
        config.csv_path = csv;
    }
    if let Some(days) = cli.threshold_days {
        config.threshold_days = days;
    }
    config.validate()?;

    let logger = Logger::console(
        config.min_log_level()?,
        config.log_file.as_deref(),
        config.console_timestamps,
    );

    let fetcher: Box<dyn RawTableFetcher> = match &cli.replay_dir {
        Some(dir) => {
            let years = ReplayFetcher::available_years(dir)?;
            logger.info(
                Source::System,
                Some(&dir.display().to_string()),
                &format!("Replay mode, saved years: {:?}", years),
            );
            Box::new(ReplayFetcher::new(dir))
        }
        None => Box::new(
            HttpTableFetcher::new(Duration::from_secs(config.fetch_timeout_secs))
                .map_err(|e| RiverflowError::Fetch(e.to_string()))?,
        ),
    };

    let output = pipeline::run(&config, fetcher.as_ref(), &logger).inspect_err(|e| {
        logger.error(Source::System, None, &format!("Run aborted, nothing saved: {}", e));
    })?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output.report)
            .map_err(|e| RiverflowError::Io(e.to_string()))?;
        println!("{}", json);
    }
    Ok(())
}
