use std::sync::Arc;

use clap::{CommandFactory, Parser};
use dnsstress::{
    StressRun,
    cli::Args,
    error::ConfigError,
    metrics::PrometheusReporter,
    stats::{LineReporter, StatsReporter},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    println!("dnsstress - dns stress tool");

    let config = match args.into_config() {
        Ok(config) => Arc::new(config),
        Err(ConfigError::NoDomains) => {
            eprintln!("{}", Args::command().render_help());
            std::process::exit(1);
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    println!("Queried domains: {:?}.", config.domains);
    if config.flood {
        println!("Flooding mode, replies will not be read.");
    }

    let prometheus = if config.export_metrics {
        Some(PrometheusReporter::new(!config.flood)?)
    } else {
        None
    };
    let (stdout, printer) = LineReporter::spawn(tokio::io::stdout());
    let mut reporters: Vec<Box<dyn StatsReporter>> = vec![Box::new(stdout)];
    if let Some(prometheus) = &prometheus {
        reporters.push(Box::new(prometheus.clone()));
    }

    let run = StressRun::start(Arc::clone(&config), reporters);
    println!("Started {} workers against {}.", run.workers(), config.resolver);
    println!("Press ENTER to quit");

    wait_for_quit().await;

    let summary = run.finish().await;
    debug!(?summary, "Run finished");
    if let Err(e) = printer.await {
        error!("Report writer failed: {}", e);
    }

    if let Some(prometheus) = prometheus {
        print!("{}", prometheus.encode()?);
    }

    Ok(())
}

/// ENTER on stdin or Ctrl-C. A closed stdin leaves Ctrl-C as the only way out.
async fn wait_for_quit() {
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut line = String::new();
    tokio::select! {
        read = stdin.read_line(&mut line) => {
            if matches!(read, Ok(0) | Err(_)) {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
        _ = tokio::signal::ctrl_c() => {}
    }
}
