//! Lock-free network metrics (design doc §6, Metrics: `RuntimeMetrics`).
//!
//! Mirrors the teacher's atomic-counters-behind-a-facade pattern: hot-path
//! increments never take a lock, and the sliding requests-per-minute window
//! is the one place that needs a mutex, scoped to a single small `VecDeque`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;

use vessel_shared::constants::network::RPM_WINDOW_SECS;

#[derive(Default)]
pub struct NetworkMetrics {
    pub servers_opened: AtomicU64,
    pub servers_closed: AtomicU64,
    pub connections_opened: AtomicU64,
    pub connections_closed: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub bytes_received: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
    request_timestamps: Mutex<VecDeque<i64>>,
}

impl NetworkMetrics {
    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now().timestamp();
        let mut window = self.request_timestamps.lock();
        window.push_back(now);
        let cutoff = now - RPM_WINDOW_SECS as i64;
        while matches!(window.front(), Some(ts) if *ts < cutoff) {
            window.pop_front();
        }
    }

    pub fn requests_per_minute(&self) -> usize {
        let now = Utc::now().timestamp();
        let cutoff = now - RPM_WINDOW_SECS as i64;
        self.request_timestamps.lock().iter().filter(|ts| **ts >= cutoff).count()
    }

    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes_sent(&self, n: u64) {
        self.bytes_sent.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_bytes_received(&self, n: u64) {
        self.bytes_received.fetch_add(n, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_request_counts_within_window() {
        let metrics = NetworkMetrics::default();
        metrics.record_request();
        metrics.record_request();
        assert_eq!(metrics.requests_per_minute(), 2);
        assert_eq!(metrics.requests_total.load(Ordering::Relaxed), 2);
    }
}
