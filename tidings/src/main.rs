/// Entry point for the tidings reporter
///
/// Replays a recorded run through the configured reporters. Scheduling jobs
/// and fetching their content happen elsewhere; this binary only reports.
use anyhow::{Context, Result};
use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use tidings::{
    config::Config,
    delivery::{AppriseCli, DeliveryBackend},
    logger,
    report::Report,
    reporters::{ReporterRegistry, Services},
    run::RunRecord,
};

/// Define command line arguments using clap
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE", env = "TIDINGS_CONFIG")]
    config: PathBuf,

    /// Path to the recorded run (JSON)
    #[arg(short, long, value_name = "FILE", env = "TIDINGS_RUN")]
    run: PathBuf,
}

async fn run(cli: Cli) -> Result<usize> {
    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration: {}", cli.config.display()))?;
    let record = RunRecord::load(&cli.run)?;
    let duration = record.duration;

    let apprise = AppriseCli::detect(config.report.apprise.program.as_deref())
        .map(|backend| Arc::new(backend) as Arc<dyn DeliveryBackend>);
    if apprise.is_none() && config.report.apprise.enabled {
        tracing::warn!("apprise executable not found");
    }
    let registry = ReporterRegistry::builtin(Services {
        apprise,
        http: reqwest::Client::new(),
    });

    let mut report = Report::new(Arc::new(config));
    for state in record.into_job_states()? {
        report.record(state);
    }

    let submissions = report.finish(&registry, duration).await;
    Ok(submissions.iter().filter(|s| s.outcome.is_err()).count())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let _logger = logger::init();

    let cli = Cli::parse();
    tracing::debug!("Config path: {:?}, run path: {:?}", cli.config, cli.run);

    match run(cli).await {
        Ok(0) => {}
        Ok(failed) => {
            tracing::error!("{} reporter submissions failed", failed);
            std::process::exit(2);
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
