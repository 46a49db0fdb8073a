//! Wiring of pool, ticker and aggregator for one run, and the ordered teardown.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::StressConfig;
use crate::pool::{PoolSummary, WorkerPool};
use crate::stats::{AggregateState, Aggregator, ControlSignal, StatsReporter};
use crate::ticker::Ticker;

/// Outcome of a finished run.
#[derive(Debug)]
pub struct RunSummary {
    pub pool: PoolSummary,
    pub aggregate: Option<AggregateState>,
    pub ticks: u64,
}

/// A running load test.
pub struct StressRun {
    pool: WorkerPool,
    control_tx: mpsc::Sender<ControlSignal>,
    aggregator: JoinHandle<AggregateState>,
    ticker: JoinHandle<u64>,
}

impl StressRun {
    /// Spawn the aggregator with `reporters`, then the ticker and the workers.
    pub fn start(config: Arc<StressConfig>, reporters: Vec<Box<dyn StatsReporter>>) -> Self {
        let (data_tx, data_rx) = mpsc::channel(config.channel_capacity());
        let (control_tx, control_rx) = mpsc::channel(1);

        let aggregator = reporters
            .into_iter()
            .fold(Aggregator::new(data_rx, control_rx, !config.flood), |agg, r| {
                agg.with_reporter(r)
            })
            .spawn();

        let pool = WorkerPool::spawn(Arc::clone(&config), data_tx);
        let ticker = Ticker::new(config.flush_interval, control_tx.clone(), pool.subscribe()).spawn();

        Self {
            pool,
            control_tx,
            aggregator,
            ticker,
        }
    }

    pub fn workers(&self) -> usize {
        self.pool.len()
    }

    /// Stop the workers, then ask for the totals and close the aggregator. Every delta
    /// a worker managed to send is part of the totals.
    pub async fn finish(self) -> RunSummary {
        info!("Shutting down");
        let pool = self.pool.shutdown().await;

        let ticks = self.ticker.await.unwrap_or_else(|e| {
            warn!("Ticker task failed: {}", e);
            0
        });

        for signal in [ControlSignal::Total, ControlSignal::Close] {
            if self.control_tx.send(signal).await.is_err() {
                warn!(?signal, "Aggregator already stopped");
                break;
            }
        }

        let aggregate = match self.aggregator.await {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("Aggregator task failed: {}", e);
                None
            }
        };

        RunSummary {
            pool,
            aggregate,
            ticks,
        }
    }
}
