//! Mock resolvers and a collecting reporter shared by the end-to-end tests.

#![allow(dead_code)] // Not every test file uses every helper

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dnsstress::StressConfig;
use dnsstress::stats::{StatsDelta, StatsReporter, TotalReport, WindowReport};
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// Everything the aggregator reported during a run.
#[derive(Default, Clone)]
pub struct Collected {
    pub deltas: Arc<Mutex<Vec<StatsDelta>>>,
    pub windows: Arc<Mutex<Vec<WindowReport>>>,
    pub totals: Arc<Mutex<Vec<TotalReport>>>,
}

impl Collected {
    pub fn delta_sent(&self) -> u64 {
        self.deltas.lock().iter().map(|d| d.sent).sum()
    }

    pub fn windows_so_far(&self) -> Vec<WindowReport> {
        self.windows.lock().clone()
    }
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

/// A resolver that answers every query by echoing it back with QR set.
pub async fn spawn_echo_resolver() -> (SocketAddr, JoinHandle<()>) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind mock resolver");
    let addr = socket.local_addr().expect("mock resolver address");
    let handle = tokio::spawn(async move {
        let mut buf = vec![0u8; 512];
        loop {
            let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                continue;
            };
            if len < 12 {
                continue;
            }
            buf[2] |= 0x80;
            let _ = socket.send_to(&buf[..len], peer).await;
        }
    });
    (addr, handle)
}

/// A resolver that reads queries and never replies.
pub async fn spawn_silent_resolver() -> (SocketAddr, JoinHandle<()>) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind mock resolver");
    let addr = socket.local_addr().expect("mock resolver address");
    let handle = tokio::spawn(async move {
        let mut buf = vec![0u8; 512];
        loop {
            let _ = socket.recv_from(&mut buf).await;
        }
    });
    (addr, handle)
}

pub fn test_config(resolver: SocketAddr, concurrency: usize) -> StressConfig {
    StressConfig {
        resolver: resolver.to_string(),
        domains: vec!["example.com.".to_string()],
        concurrency,
        flush_interval: Duration::from_millis(200),
        read_timeout: Duration::from_millis(100),
        display_step: 5,
        ..Default::default()
    }
    .normalized()
    .expect("valid test config")
}
