//! Observability and Metrics
//!
//! Counters describing pump activity across the process.
//!
//! Uses atomic counters for thread-safe metrics collection. Every pump
//! records into the global instance returned by [`global_metrics`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector for pump operations
#[derive(Debug)]
pub struct Metrics {
    /// Total pumps started
    pub pumps_total: AtomicU64,
    /// Pumps with at least one loop still running
    pub pumps_active: AtomicU64,
    /// Total messages written to a connection
    pub messages_sent: AtomicU64,
    /// Total messages decoded from a connection
    pub messages_received: AtomicU64,
    /// Total bytes written
    pub bytes_sent: AtomicU64,
    /// Total bytes read
    pub bytes_received: AtomicU64,
    /// Transport failures while reading, clean closure included
    pub read_errors: AtomicU64,
    /// Transport failures while writing
    pub write_errors: AtomicU64,
    /// Framing violations seen by either loop
    pub framing_errors: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            pumps_total: AtomicU64::new(0),
            pumps_active: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            read_errors: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            framing_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn pump_started(&self) {
        self.pumps_total.fetch_add(1, Ordering::Relaxed);
        self.pumps_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pump_stopped(&self) {
        self.pumps_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a message written to the wire
    pub fn message_sent(&self, byte_count: u64) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a message decoded from the wire
    pub fn message_received(&self, byte_count: u64) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn framing_error(&self) {
        self.framing_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pumps_total: self.pumps_total.load(Ordering::Relaxed),
            pumps_active: self.pumps_active.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            framing_errors: self.framing_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            pumps_total = snapshot.pumps_total,
            pumps_active = snapshot.pumps_active,
            messages_sent = snapshot.messages_sent,
            messages_received = snapshot.messages_received,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            read_errors = snapshot.read_errors,
            write_errors = snapshot.write_errors,
            framing_errors = snapshot.framing_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Pump metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub pumps_total: u64,
    pub pumps_active: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub read_errors: u64,
    pub write_errors: u64,
    pub framing_errors: u64,
    pub uptime_seconds: u64,
}

static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = Metrics::new();
        metrics.pump_started();
        metrics.message_sent(7);
        metrics.message_sent(2);
        metrics.message_received(17);
        metrics.framing_error();
        metrics.pump_stopped();

        let snap = metrics.snapshot();
        assert_eq!(snap.pumps_total, 1);
        assert_eq!(snap.pumps_active, 0);
        assert_eq!(snap.messages_sent, 2);
        assert_eq!(snap.bytes_sent, 9);
        assert_eq!(snap.messages_received, 1);
        assert_eq!(snap.bytes_received, 17);
        assert_eq!(snap.framing_errors, 1);
        assert_eq!(snap.read_errors, 0);
    }
}
