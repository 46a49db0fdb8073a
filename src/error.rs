use thiserror::Error;

use crate::dns::ParseError;

/// Failures of a single worker or of the address normaliser.
#[derive(Error, Debug)]
pub enum StressError {
    #[error("Invalid resolver address: {0}")]
    InvalidAddress(String),

    /// The worker could not open its socket; fatal for that worker.
    #[error("Setup error: {0}")]
    Setup(#[source] std::io::Error),

    /// Writing the query failed; the socket is kept.
    #[error("Transmit error: {0}")]
    Transmit(#[source] std::io::Error),

    /// Reading the reply failed or no reply arrived in time.
    #[error("Response error: {0}")]
    Response(#[source] std::io::Error),

    #[error("No reply within {0:?}")]
    Timeout(std::time::Duration),

    #[error("Garbled response: {0}")]
    Garbled(String),

    #[error("Query encoding error: {0}")]
    Encode(String),
}

impl From<ParseError> for StressError {
    fn from(err: ParseError) -> Self {
        StressError::Encode(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("At least one target domain is required")]
    NoDomains,

    #[error("Invalid target domain: {0:?}")]
    InvalidDomain(String),

    #[error("Invalid concurrency: {0} (must be at least 1)")]
    InvalidConcurrency(usize),

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    #[error("Invalid display step: {0} (must be at least 1)")]
    InvalidDisplayStep(usize),

    #[error("Invalid resolver address: {0}")]
    InvalidAddress(String),
}

pub type Result<T> = std::result::Result<T, StressError>;
