use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::net::{UdpSocket, lookup_host};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, error, trace, warn};

use crate::config::StressConfig;
use crate::dns::DNSPacket;
use crate::error::{Result, StressError};
use crate::query::QueryTemplate;
use crate::stats::StatsDelta;

/// Large enough for any UDP reply a resolver sends without EDNS games.
const RECV_BUFFER_SIZE: usize = 4096;

/// Counters of one worker since its last report. Never shared.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerState {
    pub sent: u64,
    pub errors: u64,
    pub bytes_sent: u64,
    pub elapsed: Duration,
    pub max_latency: Duration,
}

impl WorkerState {
    pub fn record_latency(&mut self, latency: Duration) {
        self.elapsed += latency;
        self.max_latency = self.max_latency.max(latency);
    }

    pub fn is_empty(&self) -> bool {
        self.sent == 0 && self.errors == 0
    }

    /// Hand the counters over as a delta and start from zero.
    pub fn take(&mut self) -> StatsDelta {
        let state = std::mem::take(self);
        StatsDelta {
            sent: state.sent,
            errors: state.errors,
            bytes_sent: state.bytes_sent,
            elapsed: state.elapsed,
            max_latency: state.max_latency,
            is_flush_trigger: false,
        }
    }
}

/// Why a worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    Shutdown,
    SetupFailed,
    AggregatorGone,
}

enum Exchange {
    Done,
    Interrupted,
}

/// Drives queries for one target domain over one UDP socket.
pub struct Worker {
    id: usize,
    domain: String,
    config: Arc<StressConfig>,
    reports: mpsc::Sender<StatsDelta>,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    pub fn new(
        id: usize,
        config: Arc<StressConfig>,
        reports: mpsc::Sender<StatsDelta>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let domain = config.domain_for(id).to_string();
        Self {
            id,
            domain,
            config,
            reports,
            shutdown,
        }
    }

    /// Run until the shutdown signal is observed.
    pub async fn run(mut self) -> WorkerExit {
        debug!(worker = self.id, domain = %self.domain, "Starting worker");

        let mut rng = StdRng::from_os_rng();
        let setup = match self.open_socket().await {
            Ok(socket) => QueryTemplate::new(&self.domain, !self.config.iterative, rng.random())
                .map(|template| (socket, template)),
            Err(e) => Err(e),
        };
        let (socket, mut template) = match setup {
            Ok(setup) => setup,
            Err(e) => {
                error!(
                    worker = self.id,
                    domain = %self.domain,
                    resolver = %self.config.resolver,
                    "{}", e
                );
                let _ = self.reports.send(StatsDelta::setup_failure()).await;
                return WorkerExit::SetupFailed;
            }
        };

        let mut state = WorkerState::default();
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        let exit = 'run: loop {
            for _ in 0..self.config.display_step {
                if self.stopping() {
                    break 'run WorkerExit::Shutdown;
                }
                if self.config.random_ids {
                    template.randomize_id(&mut rng);
                }
                if self.config.flood {
                    self.fire(&socket, &template, &mut state).await;
                } else if let Exchange::Interrupted =
                    self.exchange(&socket, &template, &mut buf, &mut state).await
                {
                    break 'run WorkerExit::Shutdown;
                }
            }
            if self.reports.send(state.take()).await.is_err() {
                break WorkerExit::AggregatorGone;
            }
        };

        if exit == WorkerExit::Shutdown && !state.is_empty() {
            let _ = self.reports.send(state.take()).await;
        }
        debug!(worker = self.id, ?exit, "Worker stopped");
        exit
    }

    fn stopping(&self) -> bool {
        *self.shutdown.borrow() || self.shutdown.has_changed().is_err()
    }

    /// One socket for the worker's whole life; dialing per query runs out of
    /// ephemeral ports at high concurrency.
    async fn open_socket(&self) -> Result<UdpSocket> {
        let target = lookup_host(self.config.resolver.as_str())
            .await
            .map_err(StressError::Setup)?
            .next()
            .ok_or_else(|| {
                StressError::Setup(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} did not resolve to an address", self.config.resolver),
                ))
            })?;
        let local: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).await.map_err(StressError::Setup)?;
        socket.connect(target).await.map_err(StressError::Setup)?;
        Ok(socket)
    }

    /// Flood mode: transmit and move on. Nothing is read, so neither errors nor
    /// latency are recorded.
    async fn fire(&self, socket: &UdpSocket, template: &QueryTemplate, state: &mut WorkerState) {
        state.sent += 1;
        match socket.send(template.payload()).await {
            Ok(len) => state.bytes_sent += len as u64,
            Err(e) => trace!(worker = self.id, "flood send failed: {}", e),
        }
    }

    /// Wait mode: send, then wait for the matching reply or the read deadline.
    async fn exchange(
        &mut self,
        socket: &UdpSocket,
        template: &QueryTemplate,
        buf: &mut [u8],
        state: &mut WorkerState,
    ) -> Exchange {
        let start = Instant::now();
        state.sent += 1;

        match socket.send(template.payload()).await {
            Ok(len) => state.bytes_sent += len as u64,
            Err(e) => {
                state.errors += 1;
                self.report_error(&StressError::Transmit(e));
                return Exchange::Done;
            }
        }

        let read_timeout = self.config.read_timeout;
        let outcome = tokio::select! {
            result = timeout(read_timeout, await_reply(socket, template, buf)) => {
                result.unwrap_or(Err(StressError::Timeout(read_timeout)))
            }
            _ = self.shutdown.changed() => return Exchange::Interrupted,
        };

        state.record_latency(start.elapsed());
        if let Err(e) = outcome {
            state.errors += 1;
            self.report_error(&e);
        }
        Exchange::Done
    }

    fn report_error(&self, e: &StressError) {
        if self.config.verbose {
            warn!(
                domain = %self.domain,
                resolver = %self.config.resolver,
                "{} error: {}", self.domain, e
            );
        }
    }
}

/// Read until the reply to the in-flight query shows up. Replies to earlier queries
/// that timed out are skipped.
async fn await_reply(socket: &UdpSocket, template: &QueryTemplate, buf: &mut [u8]) -> Result<()> {
    loop {
        let len = socket.recv(buf).await.map_err(StressError::Response)?;
        let header = DNSPacket::parse_header(&buf[..len])
            .map_err(|e| StressError::Garbled(e.to_string()))?;
        if template.matches(&header) {
            return Ok(());
        }
        if !header.qr {
            return Err(StressError::Garbled(format!(
                "message {} is not a response",
                header.id
            )));
        }
        trace!(expected = template.id(), got = header.id, "Discarding stale reply");
    }
}
