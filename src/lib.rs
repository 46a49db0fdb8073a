pub mod address;
pub mod cli;
pub mod config;
pub mod dns;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod query;
pub mod runner;
pub mod stats;
pub mod ticker;
pub mod worker;

pub use config::StressConfig;
pub use runner::StressRun;
