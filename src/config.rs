use std::time::Duration;

use crate::address::normalize_resolver;
use crate::error::ConfigError;
use crate::query::fqdn;

/// Everything a run needs, built once and shared read-only by every task.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Resolver under test, canonical `host:port`
    pub resolver: String,

    /// Fully qualified target domains, handed out round-robin to workers
    pub domains: Vec<String>,

    /// Number of workers (one UDP socket each)
    pub concurrency: usize,

    /// How often the aggregator prints a window report
    pub flush_interval: Duration,

    /// Read deadline for a single exchange in wait mode
    pub read_timeout: Duration,

    /// Exchanges a worker performs between two delta reports
    pub display_step: usize,

    /// Log every failed exchange
    pub verbose: bool,

    /// Clear the RD flag (stress authoritative servers)
    pub iterative: bool,

    /// Draw a new transaction ID before every send
    pub random_ids: bool,

    /// Send without waiting for replies
    pub flood: bool,

    /// Print the Prometheus exposition of the run counters at shutdown
    pub export_metrics: bool,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            resolver: "127.0.0.1:53".to_string(),
            domains: Vec::new(),
            concurrency: 50,
            flush_interval: Duration::from_millis(1000),
            read_timeout: Duration::from_millis(2000),
            display_step: 5,
            verbose: false,
            iterative: false,
            random_ids: false,
            flood: false,
            export_metrics: false,
        }
    }
}

impl StressConfig {
    /// Canonicalise resolver and domains, then check the result.
    pub fn normalized(mut self) -> Result<Self, ConfigError> {
        self.resolver = normalize_resolver(&self.resolver)
            .map_err(|_| ConfigError::InvalidAddress(self.resolver.clone()))?;
        self.domains = self.domains.iter().map(|d| fqdn(d.trim())).collect();
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domains.is_empty() {
            return Err(ConfigError::NoDomains);
        }
        if let Some(bad) = self
            .domains
            .iter()
            .find(|d| {
                d.len() > 254
                    || d.starts_with('.')
                    || d.contains("..")
                    || d.split('.').any(|label| label.len() > 63)
            })
        {
            return Err(ConfigError::InvalidDomain(bad.clone()));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(self.concurrency));
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::InvalidInterval(
                "flush interval must be positive".to_string(),
            ));
        }
        if !self.flood && self.read_timeout.is_zero() {
            return Err(ConfigError::InvalidInterval(
                "read timeout must be positive".to_string(),
            ));
        }
        if self.display_step == 0 {
            return Err(ConfigError::InvalidDisplayStep(self.display_step));
        }
        Ok(())
    }

    /// Capacity of the worker to aggregator channel. At least one slot per worker so a
    /// worker only blocks when the aggregator is genuinely behind.
    pub fn channel_capacity(&self) -> usize {
        self.concurrency.max(1)
    }

    /// Target domain of worker `index`.
    pub fn domain_for(&self, index: usize) -> &str {
        &self.domains[index % self.domains.len()]
    }
}
