//! Aggregation of per-worker delta reports into periodic rate reports.
//!
//! Workers never share counters. Each one sends [`StatsDelta`] messages over a
//! bounded channel and the [`Aggregator`] task is the only owner of the running
//! totals, so no locks or atomics are involved.

use std::fmt;
use std::time::{Duration, Instant};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Counts a worker accumulated since its previous report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsDelta {
    pub sent: u64,
    pub errors: u64,
    pub bytes_sent: u64,
    /// Sum of the latencies of every exchange waited on
    pub elapsed: Duration,
    pub max_latency: Duration,
    /// Asks the aggregator to flush once this delta is accounted for
    pub is_flush_trigger: bool,
}

impl StatsDelta {
    /// A timer tick travelling on the data path: no traffic, flush requested.
    pub fn flush_trigger() -> Self {
        Self {
            is_flush_trigger: true,
            ..Default::default()
        }
    }

    /// Reported once by a worker that could not open its socket.
    pub fn setup_failure() -> Self {
        Self {
            errors: 1,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sent == 0 && self.errors == 0 && self.bytes_sent == 0
    }
}

/// Lifecycle instructions for the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Print the current window and start a new one
    Flush,
    /// Print the totals since start without touching the window
    Total,
    /// Stop the aggregator
    Close,
}

/// Round half away from zero: `round_half_away(2.5) == 3`, `round_half_away(-2.5) == -3`.
pub fn round_half_away(value: f64) -> i64 {
    if value < 0.0 {
        (value - 0.5).ceil() as i64
    } else {
        (value + 0.5).floor() as i64
    }
}

/// Events per second, rounded. A zero-length interval yields 0.
pub fn rate(count: u64, elapsed: Duration) -> i64 {
    let seconds = elapsed.as_secs_f64();
    if seconds <= 0.0 {
        return 0;
    }
    round_half_away(count as f64 / seconds)
}

/// Integer percentage of failed exchanges, `None` when nothing was sent.
///
/// Not clamped: a window holding setup failures next to a little traffic can exceed
/// 100 since those failures carry no sent count.
pub fn error_percent(sent: u64, errors: u64) -> Option<u64> {
    if sent == 0 {
        None
    } else {
        Some(errors.saturating_mul(100) / sent)
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Statistics of one flush window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowReport {
    pub sent: u64,
    pub errors: u64,
    pub bytes_sent: u64,
    pub window: Duration,
    pub sent_rate: i64,
    pub reply_rate: i64,
    pub mean_latency: Duration,
    pub max_latency: Duration,
    pub error_percent: Option<u64>,
    /// False in flood mode, where replies and latency are not observed
    pub replies_tracked: bool,
}

impl fmt::Display for WindowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sent == 0 {
            write!(f, "No requests were sent.")?;
            if self.errors > 0 {
                write!(f, "  Errors: {}", self.errors)?;
            }
            return Ok(());
        }

        write!(f, "Requests sent: {:6}r/s", self.sent_rate)?;
        if !self.replies_tracked {
            return write!(f, " (flood mode, replies not tracked)");
        }
        write!(
            f,
            "  Replies received: {:6}r/s (mean={:.0}ms / max={:.0}ms)",
            self.reply_rate,
            millis(self.mean_latency),
            millis(self.max_latency),
        )?;
        if self.errors > 0 {
            write!(
                f,
                "  Errors: {} ({}%)",
                self.errors,
                self.error_percent.unwrap_or(0)
            )?;
        }
        Ok(())
    }
}

/// Point in time summary since the aggregator started.
#[derive(Debug, Clone, PartialEq)]
pub struct TotalReport {
    pub sent: u64,
    pub errors: u64,
    pub bytes_sent: u64,
    pub elapsed: Duration,
    pub rate: i64,
}

impl fmt::Display for TotalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total requests sent: {} in {:.1}s ({}r/s, {} bytes)",
            self.sent,
            self.elapsed.as_secs_f64(),
            self.rate,
            self.bytes_sent
        )?;
        if self.errors > 0 {
            write!(f, "  Errors: {}", self.errors)?;
        }
        Ok(())
    }
}

/// Counters owned by the aggregator task.
#[derive(Debug, Clone)]
pub struct AggregateState {
    pub window_sent: u64,
    pub window_errors: u64,
    pub window_bytes: u64,
    pub window_elapsed: Duration,
    pub window_max_latency: Duration,
    pub window_start: Instant,
    pub grand_total_sent: u64,
    pub grand_total_errors: u64,
    pub grand_total_bytes: u64,
    pub deltas_received: u64,
    pub started: Instant,
}

impl AggregateState {
    pub fn new(now: Instant) -> Self {
        Self {
            window_sent: 0,
            window_errors: 0,
            window_bytes: 0,
            window_elapsed: Duration::ZERO,
            window_max_latency: Duration::ZERO,
            window_start: now,
            grand_total_sent: 0,
            grand_total_errors: 0,
            grand_total_bytes: 0,
            deltas_received: 0,
            started: now,
        }
    }

    pub fn accumulate(&mut self, delta: &StatsDelta) {
        self.window_sent += delta.sent;
        self.window_errors += delta.errors;
        self.window_bytes += delta.bytes_sent;
        self.window_elapsed += delta.elapsed;
        self.window_max_latency = self.window_max_latency.max(delta.max_latency);
        self.grand_total_sent += delta.sent;
        self.grand_total_errors += delta.errors;
        self.grand_total_bytes += delta.bytes_sent;
        self.deltas_received += 1;
    }

    /// Close the current window at `now` and open the next one.
    pub fn flush(&mut self, now: Instant, replies_tracked: bool) -> WindowReport {
        let window = now.saturating_duration_since(self.window_start);
        let sent = self.window_sent;
        let errors = self.window_errors;
        let mean_latency = if sent > 0 {
            self.window_elapsed.div_f64(sent as f64)
        } else {
            Duration::ZERO
        };

        let report = WindowReport {
            sent,
            errors,
            bytes_sent: self.window_bytes,
            window,
            sent_rate: rate(sent, window),
            reply_rate: rate(sent.saturating_sub(errors), window),
            mean_latency,
            max_latency: self.window_max_latency,
            error_percent: error_percent(sent, errors),
            replies_tracked,
        };

        self.window_sent = 0;
        self.window_errors = 0;
        self.window_bytes = 0;
        self.window_elapsed = Duration::ZERO;
        self.window_max_latency = Duration::ZERO;
        self.window_start = now;
        report
    }

    pub fn total(&self, now: Instant) -> TotalReport {
        let elapsed = now.saturating_duration_since(self.started);
        TotalReport {
            sent: self.grand_total_sent,
            errors: self.grand_total_errors,
            bytes_sent: self.grand_total_bytes,
            elapsed,
            rate: rate(self.grand_total_sent, elapsed),
        }
    }
}

/// Destination of the aggregator's reports.
pub trait StatsReporter: Send {
    /// Called for every delta as it is accounted for.
    fn delta(&mut self, _delta: &StatsDelta) {}

    fn window(&mut self, report: &WindowReport);

    fn total(&mut self, report: &TotalReport);
}

/// Writes one line per report. Lines are formatted in the aggregator and handed to a
/// writer task, so the aggregator never waits on the output stream.
#[derive(Debug)]
pub struct LineReporter {
    lines: mpsc::UnboundedSender<String>,
}

impl LineReporter {
    /// Spawn the writer task. It hands `writer` back once every reporter handle is
    /// dropped and the queued lines are written.
    pub fn spawn<W>(mut writer: W) -> (Self, JoinHandle<W>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (lines, mut rx) = mpsc::unbounded_channel::<String>();
        let handle = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                if let Err(e) = write_line(&mut writer, &line).await {
                    warn!("Failed to write report: {}", e);
                    break;
                }
            }
            writer
        });
        (Self { lines }, handle)
    }

    fn push(&self, line: String) {
        // writer gone after an output error, nothing left to do
        let _ = self.lines.send(line);
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

impl StatsReporter for LineReporter {
    fn window(&mut self, report: &WindowReport) {
        self.push(report.to_string());
    }

    fn total(&mut self, report: &TotalReport) {
        self.push(report.to_string());
    }
}

pub struct Aggregator {
    state: AggregateState,
    data_rx: mpsc::Receiver<StatsDelta>,
    control_rx: mpsc::Receiver<ControlSignal>,
    reporters: Vec<Box<dyn StatsReporter>>,
    replies_tracked: bool,
}

impl Aggregator {
    pub fn new(
        data_rx: mpsc::Receiver<StatsDelta>,
        control_rx: mpsc::Receiver<ControlSignal>,
        replies_tracked: bool,
    ) -> Self {
        Self {
            state: AggregateState::new(Instant::now()),
            data_rx,
            control_rx,
            reporters: Vec::new(),
            replies_tracked,
        }
    }

    pub fn with_reporter(mut self, reporter: Box<dyn StatsReporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    pub fn spawn(self) -> JoinHandle<AggregateState> {
        tokio::spawn(self.run())
    }

    /// Serve both inputs until `Close` arrives or the control side goes away.
    ///
    /// Neither input has priority; `select!` picks randomly among ready branches so a
    /// busy data channel cannot starve control signals.
    pub async fn run(mut self) -> AggregateState {
        let mut data_open = true;
        loop {
            tokio::select! {
                signal = self.control_rx.recv() => match signal {
                    Some(ControlSignal::Flush) => self.flush(),
                    Some(ControlSignal::Total) => {
                        self.drain();
                        self.total();
                    }
                    Some(ControlSignal::Close) | None => {
                        self.drain();
                        break;
                    }
                },
                delta = self.data_rx.recv(), if data_open => match delta {
                    Some(delta) => self.handle(delta),
                    None => {
                        debug!("All workers gone, data channel closed");
                        data_open = false;
                    }
                },
            }
        }
        info!(
            sent = self.state.grand_total_sent,
            errors = self.state.grand_total_errors,
            deltas = self.state.deltas_received,
            "Aggregator closed"
        );
        self.state
    }

    fn handle(&mut self, delta: StatsDelta) {
        self.state.accumulate(&delta);
        for reporter in self.reporters.iter_mut() {
            reporter.delta(&delta);
        }
        if delta.is_flush_trigger {
            self.flush();
        }
    }

    /// Account for every delta already queued.
    fn drain(&mut self) {
        while let Ok(delta) = self.data_rx.try_recv() {
            self.handle(delta);
        }
    }

    fn flush(&mut self) {
        let report = self.state.flush(Instant::now(), self.replies_tracked);
        for reporter in self.reporters.iter_mut() {
            reporter.window(&report);
        }
    }

    fn total(&mut self) {
        let report = self.state.total(Instant::now());
        for reporter in self.reporters.iter_mut() {
            reporter.total(&report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default, Clone)]
    struct Collected {
        deltas: Arc<Mutex<Vec<StatsDelta>>>,
        windows: Arc<Mutex<Vec<WindowReport>>>,
        totals: Arc<Mutex<Vec<TotalReport>>>,
    }

    impl StatsReporter for Collected {
        fn delta(&mut self, delta: &StatsDelta) {
            self.deltas.lock().push(*delta);
        }

        fn window(&mut self, report: &WindowReport) {
            self.windows.lock().push(report.clone());
        }

        fn total(&mut self, report: &TotalReport) {
            self.totals.lock().push(report.clone());
        }
    }

    fn delta(sent: u64, errors: u64, latency_ms: u64) -> StatsDelta {
        StatsDelta {
            sent,
            errors,
            bytes_sent: sent * 29,
            elapsed: Duration::from_millis(latency_ms * sent),
            max_latency: Duration::from_millis(latency_ms),
            is_flush_trigger: false,
        }
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round_half_away(2.5), 3);
        assert_eq!(round_half_away(2.4), 2);
        assert_eq!(round_half_away(-2.5), -3);
        assert_eq!(round_half_away(-2.4), -2);
        assert_eq!(round_half_away(0.0), 0);
        assert_eq!(round_half_away(0.49), 0);
    }

    #[test]
    fn test_rate() {
        assert_eq!(rate(10, Duration::from_secs(4)), 3);
        assert_eq!(rate(1000, Duration::from_millis(500)), 2000);
        assert_eq!(rate(10, Duration::ZERO), 0);
        assert_eq!(rate(0, Duration::from_secs(1)), 0);
    }

    #[test]
    fn test_error_percent_guards_empty_window() {
        assert_eq!(error_percent(0, 0), None);
        assert_eq!(error_percent(0, 3), None);
        assert_eq!(error_percent(10, 0), Some(0));
        assert_eq!(error_percent(3, 1), Some(33));
        assert_eq!(error_percent(10, 10), Some(100));
        // setup failures carry errors without sent queries
        assert_eq!(error_percent(4, 5), Some(125));
    }

    #[test]
    fn test_flush_computes_window_rates() {
        let start = Instant::now();
        let mut state = AggregateState::new(start);
        state.accumulate(&delta(10, 0, 2));
        state.accumulate(&delta(10, 4, 8));

        let report = state.flush(start + Duration::from_secs(2), true);
        assert_eq!(report.sent, 20);
        assert_eq!(report.errors, 4);
        assert_eq!(report.sent_rate, 10);
        assert_eq!(report.reply_rate, 8);
        assert_eq!(report.mean_latency, Duration::from_millis(5));
        assert_eq!(report.max_latency, Duration::from_millis(8));
        assert_eq!(report.error_percent, Some(20));
        assert_eq!(report.bytes_sent, 20 * 29);

        // window reset, grand total kept
        assert_eq!(state.window_sent, 0);
        assert_eq!(state.window_max_latency, Duration::ZERO);
        assert_eq!(state.window_start, start + Duration::from_secs(2));
        assert_eq!(state.grand_total_sent, 20);
    }

    #[test]
    fn test_reply_rate_never_negative() {
        let start = Instant::now();
        let mut state = AggregateState::new(start);
        state.accumulate(&delta(1, 1, 0));
        state.accumulate(&StatsDelta::setup_failure());
        let report = state.flush(start + Duration::from_secs(1), true);
        assert_eq!(report.reply_rate, 0);
        assert_eq!(report.error_percent, Some(200));
    }

    #[test]
    fn test_total_does_not_reset_window() {
        let start = Instant::now();
        let mut state = AggregateState::new(start);
        state.accumulate(&delta(30, 0, 1));
        state.flush(start + Duration::from_secs(1), true);
        state.accumulate(&delta(10, 2, 1));

        let total = state.total(start + Duration::from_secs(4));
        assert_eq!(total.sent, 40);
        assert_eq!(total.errors, 2);
        assert_eq!(total.rate, 10);
        assert_eq!(state.window_sent, 10);
    }

    #[test]
    fn test_window_line_format() {
        let start = Instant::now();
        let mut state = AggregateState::new(start);
        state.accumulate(&delta(100, 0, 3));
        let line = state.flush(start + Duration::from_secs(1), true).to_string();
        assert_eq!(
            line,
            "Requests sent:    100r/s  Replies received:    100r/s (mean=3ms / max=3ms)"
        );

        state.accumulate(&delta(100, 25, 3));
        let line = state.flush(start + Duration::from_secs(2), true).to_string();
        assert!(line.ends_with("  Errors: 25 (25%)"), "{}", line);
    }

    #[test]
    fn test_empty_window_line() {
        let start = Instant::now();
        let mut state = AggregateState::new(start);
        let report = state.flush(start + Duration::from_secs(1), true);
        assert_eq!(report.to_string(), "No requests were sent.");

        state.accumulate(&StatsDelta::setup_failure());
        let report = state.flush(start + Duration::from_secs(2), true);
        assert_eq!(report.error_percent, None);
        assert_eq!(report.to_string(), "No requests were sent.  Errors: 1");
    }

    #[test]
    fn test_flood_window_line() {
        let start = Instant::now();
        let mut state = AggregateState::new(start);
        state.accumulate(&StatsDelta {
            sent: 500,
            bytes_sent: 500 * 29,
            ..Default::default()
        });
        let line = state.flush(start + Duration::from_secs(1), false).to_string();
        assert_eq!(line, "Requests sent:    500r/s (flood mode, replies not tracked)");
    }

    #[tokio::test]
    async fn test_aggregator_reports_and_closes() {
        let (data_tx, data_rx) = mpsc::channel(8);
        let (control_tx, control_rx) = mpsc::channel(1);
        let collected = Collected::default();
        let handle = Aggregator::new(data_rx, control_rx, true)
            .with_reporter(Box::new(collected.clone()))
            .spawn();

        data_tx.send(delta(5, 1, 2)).await.unwrap();
        data_tx.send(delta(5, 0, 2)).await.unwrap();
        data_tx.send(StatsDelta::flush_trigger()).await.unwrap();
        data_tx.send(delta(5, 0, 2)).await.unwrap();
        control_tx.send(ControlSignal::Total).await.unwrap();
        control_tx.send(ControlSignal::Close).await.unwrap();

        let state = handle.await.unwrap();
        assert_eq!(state.grand_total_sent, 15);
        assert_eq!(state.grand_total_errors, 1);
        assert_eq!(state.deltas_received, 4);

        let windows = collected.windows.lock();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].sent, 10);
        assert_eq!(windows[0].errors, 1);

        let totals = collected.totals.lock();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].sent, 15);
        assert_eq!(collected.deltas.lock().len(), 4);
    }

    #[tokio::test]
    async fn test_total_drains_queued_deltas() {
        let (data_tx, data_rx) = mpsc::channel(64);
        let (control_tx, control_rx) = mpsc::channel(4);

        // everything is queued before the aggregator runs at all
        for _ in 0..50 {
            data_tx.send(delta(5, 0, 1)).await.unwrap();
        }
        control_tx.send(ControlSignal::Total).await.unwrap();
        control_tx.send(ControlSignal::Close).await.unwrap();

        let collected = Collected::default();
        let state = Aggregator::new(data_rx, control_rx, true)
            .with_reporter(Box::new(collected.clone()))
            .run()
            .await;

        assert_eq!(state.grand_total_sent, 250);
        assert_eq!(collected.totals.lock()[0].sent, 250);
    }

    #[tokio::test]
    async fn test_line_reporter_writes_every_report() {
        let (data_tx, data_rx) = mpsc::channel(8);
        let (control_tx, control_rx) = mpsc::channel(4);
        let (reporter, writer) = LineReporter::spawn(Vec::new());
        let aggregator = Aggregator::new(data_rx, control_rx, true)
            .with_reporter(Box::new(reporter))
            .spawn();

        data_tx.send(delta(4, 1, 2)).await.unwrap();
        data_tx.send(StatsDelta::flush_trigger()).await.unwrap();
        data_tx.send(delta(6, 0, 2)).await.unwrap();
        control_tx.send(ControlSignal::Total).await.unwrap();
        control_tx.send(ControlSignal::Close).await.unwrap();
        aggregator.await.unwrap();

        // the writer task finishes once the aggregator drops the reporter
        let output = String::from_utf8(writer.await.unwrap()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2, "{}", output);
        assert!(lines[0].starts_with("Requests sent:"), "{}", lines[0]);
        assert!(lines[0].ends_with("  Errors: 1 (25%)"), "{}", lines[0]);
        assert!(lines[1].starts_with("Total requests sent: 10 "), "{}", lines[1]);
        assert!(output.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_aggregator_stops_when_control_dropped() {
        let (_data_tx, data_rx) = mpsc::channel::<StatsDelta>(1);
        let (control_tx, control_rx) = mpsc::channel(1);
        drop(control_tx);
        let state = Aggregator::new(data_rx, control_rx, true).run().await;
        assert_eq!(state.deltas_received, 0);
    }
}
