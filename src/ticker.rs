use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::stats::ControlSignal;

/// Periodically asks the aggregator for a window report.
///
/// The timer is re-armed only after the previous `Flush` was handed to the control
/// channel, so ticks never pile up behind a slow aggregator. Drift is not corrected.
pub struct Ticker {
    interval: Duration,
    control: mpsc::Sender<ControlSignal>,
    shutdown: watch::Receiver<bool>,
}

impl Ticker {
    pub fn new(
        interval: Duration,
        control: mpsc::Sender<ControlSignal>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            interval,
            control,
            shutdown,
        }
    }

    pub fn spawn(self) -> JoinHandle<u64> {
        tokio::spawn(self.run())
    }

    /// Returns the number of flushes delivered.
    pub async fn run(mut self) -> u64 {
        let mut ticks = 0;
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = self.shutdown.changed() => {
                    // sender gone counts as shutdown too
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }
            if self.control.send(ControlSignal::Flush).await.is_err() {
                debug!("Aggregator gone, stopping ticker");
                break;
            }
            ticks += 1;
        }
        debug!(ticks, "Ticker stopped");
        ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ticker_fires_until_shutdown() {
        let (control_tx, mut control_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = Ticker::new(Duration::from_millis(10), control_tx, shutdown_rx).spawn();

        for _ in 0..3 {
            assert_eq!(control_rx.recv().await, Some(ControlSignal::Flush));
        }
        shutdown_tx.send(true).unwrap();
        drop(control_rx);
        let ticks = handle.await.unwrap();
        assert!(ticks >= 3);
    }

    #[tokio::test]
    async fn test_ticker_stops_when_aggregator_gone() {
        let (control_tx, control_rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        drop(control_rx);
        let ticks = Ticker::new(Duration::from_millis(1), control_tx, shutdown_rx)
            .run()
            .await;
        assert_eq!(ticks, 0);
    }
}
