use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::StressConfig;
use crate::stats::StatsDelta;
use crate::worker::{Worker, WorkerExit};

/// How the workers ended once the pool was shut down.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolSummary {
    pub stopped: usize,
    pub setup_failures: usize,
    pub aggregator_gone: usize,
    pub panicked: usize,
}

/// Spawns the workers and owns the shutdown signal they all watch.
pub struct WorkerPool {
    workers: Vec<JoinHandle<WorkerExit>>,
    shutdown_tx: watch::Sender<bool>,
}

impl WorkerPool {
    /// Start `config.concurrency` workers. Worker `i` queries `domains[i % domains.len()]`.
    pub fn spawn(config: Arc<StressConfig>, reports: mpsc::Sender<StatsDelta>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let workers = (0..config.concurrency)
            .map(|id| {
                let worker = Worker::new(
                    id,
                    Arc::clone(&config),
                    reports.clone(),
                    shutdown_rx.clone(),
                );
                tokio::spawn(worker.run())
            })
            .collect::<Vec<_>>();
        info!(
            workers = workers.len(),
            resolver = %config.resolver,
            "Started {} workers",
            workers.len()
        );
        Self {
            workers,
            shutdown_tx,
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// A receiver of the shutdown signal, for tasks that live as long as the workers.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Signal every worker and wait for all of them. Consumes the pool, so the signal
    /// can only ever be sent once.
    pub async fn shutdown(self) -> PoolSummary {
        self.shutdown_tx.send_replace(true);

        let mut summary = PoolSummary::default();
        for result in join_all(self.workers).await {
            match result {
                Ok(WorkerExit::Shutdown) => summary.stopped += 1,
                Ok(WorkerExit::SetupFailed) => summary.setup_failures += 1,
                Ok(WorkerExit::AggregatorGone) => summary.aggregator_gone += 1,
                Err(e) => {
                    error!("Worker task failed: {}", e);
                    summary.panicked += 1;
                }
            }
        }
        info!(
            stopped = summary.stopped,
            setup_failures = summary.setup_failures,
            "Worker pool shut down"
        );
        summary
    }
}
