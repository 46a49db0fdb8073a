use std::time::Duration;

use clap::Parser;

use crate::config::StressConfig;
use crate::error::ConfigError;

/// Send DNS requests as fast as possible to a given server and display the rate.
#[derive(Parser, Debug, Clone)]
#[command(name = "dnsstress", author, version, about, long_about = None)]
pub struct Args {
    /// Number of concurrent workers (one UDP socket each)
    #[arg(short, long, default_value = "50")]
    pub concurrency: usize,

    /// Resolver to test against
    #[arg(short, long, default_value = "127.0.0.1:53")]
    pub resolver: String,

    /// Update interval of the stats (in ms)
    #[arg(short = 'd', long, default_value = "1000")]
    pub display_interval: u64,

    /// Read deadline of a single query when waiting for replies (in ms)
    #[arg(long, default_value = "2000")]
    pub timeout_ms: u64,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Do an iterative query instead of recursive (to stress authoritative nameservers)
    #[arg(short, long)]
    pub iterative: bool,

    /// Use random Request Identifiers for each query
    #[arg(long)]
    pub random: bool,

    /// Don't wait for an answer before sending another
    #[arg(short, long)]
    pub flood: bool,

    /// Print the run counters in Prometheus text format on exit
    #[arg(long)]
    pub metrics: bool,

    /// Domains to query, spread round-robin over the workers
    #[arg(value_name = "TARGETDOMAIN")]
    pub domains: Vec<String>,
}

impl Args {
    pub fn into_config(self) -> Result<StressConfig, ConfigError> {
        StressConfig {
            resolver: self.resolver,
            domains: self.domains,
            concurrency: self.concurrency,
            flush_interval: Duration::from_millis(self.display_interval),
            read_timeout: Duration::from_millis(self.timeout_ms),
            verbose: self.verbose,
            iterative: self.iterative,
            random_ids: self.random,
            flood: self.flood,
            export_metrics: self.metrics,
            ..Default::default()
        }
        .normalized()
    }
}
