//! Relay statistics
//!
//! The worker increments plain atomic counters on the hot path; readers take
//! a [`Statistics`] snapshot at any time from any thread. A fresh counter
//! block is installed on every start, which is how statistics reset.

use chrono::{DateTime, Utc};
use condor_core::{CategoryCounts, ConversionReport};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A packet within this window counts as live data
pub const DATA_ACTIVE_WINDOW: Duration = Duration::from_secs(5);

/// Point-in-time copy of the relay counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// When the counters were last reset
    pub started_at: DateTime<Utc>,

    pub packets_received: u64,
    pub packets_forwarded: u64,
    /// Truncated, unparseable and unsendable packets
    pub packets_dropped: u64,
    /// Forwarded packets with at least one converted field
    pub packets_converted: u64,

    /// Larger than the receive buffer
    pub packets_truncated: u64,
    pub parse_errors: u64,
    pub send_errors: u64,
    pub receive_errors: u64,

    pub bytes_received: u64,
    pub bytes_forwarded: u64,

    pub fields_examined: u64,
    pub fields_converted: u64,
    pub fields_skipped: u64,
    pub per_category: CategoryCounts,

    pub uptime_secs: f64,
    /// Cumulative since the last reset
    pub packets_per_sec: f64,
    /// Cumulative since the last reset
    pub bytes_per_sec: f64,
    /// Seconds since the last datagram arrived
    pub last_packet_age_secs: Option<f64>,
    /// A datagram arrived within the last five seconds
    pub data_active: bool,
}

/// Lock-free counters shared between the worker and readers
#[derive(Debug)]
pub struct RelayCounters {
    started: Instant,
    started_at: DateTime<Utc>,

    packets_received: AtomicU64,
    packets_forwarded: AtomicU64,
    packets_dropped: AtomicU64,
    packets_converted: AtomicU64,
    packets_truncated: AtomicU64,
    parse_errors: AtomicU64,
    send_errors: AtomicU64,
    receive_errors: AtomicU64,
    bytes_received: AtomicU64,
    bytes_forwarded: AtomicU64,
    fields_examined: AtomicU64,
    fields_converted: AtomicU64,
    fields_skipped: AtomicU64,
    altitude: AtomicU64,
    speed: AtomicU64,
    vario: AtomicU64,
    acceleration: AtomicU64,

    // Microseconds since `started`, plus one; zero until the first packet.
    last_packet: AtomicU64,
}

impl Default for RelayCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayCounters {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            packets_received: AtomicU64::new(0),
            packets_forwarded: AtomicU64::new(0),
            packets_dropped: AtomicU64::new(0),
            packets_converted: AtomicU64::new(0),
            packets_truncated: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            send_errors: AtomicU64::new(0),
            receive_errors: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_forwarded: AtomicU64::new(0),
            fields_examined: AtomicU64::new(0),
            fields_converted: AtomicU64::new(0),
            fields_skipped: AtomicU64::new(0),
            altitude: AtomicU64::new(0),
            speed: AtomicU64::new(0),
            vario: AtomicU64::new(0),
            acceleration: AtomicU64::new(0),
            last_packet: AtomicU64::new(0),
        }
    }

    pub fn record_received(&self, bytes: usize) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        let since_start = self.started.elapsed().as_micros() as u64;
        self.last_packet.store(since_start + 1, Ordering::Relaxed);
    }

    pub fn record_truncated(&self) {
        self.packets_truncated.fetch_add(1, Ordering::Relaxed);
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_receive_error(&self) {
        self.receive_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a forwarded datagram and fold its conversion report in
    pub fn record_forwarded(&self, bytes: usize, report: &ConversionReport) {
        self.packets_forwarded.fetch_add(1, Ordering::Relaxed);
        self.bytes_forwarded.fetch_add(bytes as u64, Ordering::Relaxed);
        if report.converted > 0 {
            self.packets_converted.fetch_add(1, Ordering::Relaxed);
        }
        self.fields_examined.fetch_add(report.examined, Ordering::Relaxed);
        self.fields_converted.fetch_add(report.converted, Ordering::Relaxed);
        self.fields_skipped.fetch_add(report.skipped, Ordering::Relaxed);

        let per = &report.per_category;
        self.altitude.fetch_add(per.altitude, Ordering::Relaxed);
        self.speed.fetch_add(per.speed, Ordering::Relaxed);
        self.vario.fetch_add(per.vario, Ordering::Relaxed);
        self.acceleration.fetch_add(per.acceleration, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Statistics {
        let uptime = self.started.elapsed();
        let uptime_secs = uptime.as_secs_f64();
        let packets_received = self.packets_received.load(Ordering::Relaxed);
        let bytes_received = self.bytes_received.load(Ordering::Relaxed);

        let last_packet_age = match self.last_packet.load(Ordering::Relaxed) {
            0 => None,
            mark => Some(uptime.saturating_sub(Duration::from_micros(mark - 1))),
        };

        let rate = |count: u64| {
            if uptime_secs > 0.0 {
                count as f64 / uptime_secs
            } else {
                0.0
            }
        };

        Statistics {
            started_at: self.started_at,
            packets_received,
            packets_forwarded: self.packets_forwarded.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            packets_converted: self.packets_converted.load(Ordering::Relaxed),
            packets_truncated: self.packets_truncated.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
            bytes_received,
            bytes_forwarded: self.bytes_forwarded.load(Ordering::Relaxed),
            fields_examined: self.fields_examined.load(Ordering::Relaxed),
            fields_converted: self.fields_converted.load(Ordering::Relaxed),
            fields_skipped: self.fields_skipped.load(Ordering::Relaxed),
            per_category: CategoryCounts {
                altitude: self.altitude.load(Ordering::Relaxed),
                speed: self.speed.load(Ordering::Relaxed),
                vario: self.vario.load(Ordering::Relaxed),
                acceleration: self.acceleration.load(Ordering::Relaxed),
            },
            uptime_secs,
            packets_per_sec: rate(packets_received),
            bytes_per_sec: rate(bytes_received),
            last_packet_age_secs: last_packet_age.map(|age| age.as_secs_f64()),
            data_active: last_packet_age.is_some_and(|age| age < DATA_ACTIVE_WINDOW),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_counters_are_zero() {
        let stats = RelayCounters::new().snapshot();
        assert_eq!(stats.packets_received, 0);
        assert_eq!(stats.packets_dropped, 0);
        assert_eq!(stats.per_category.total(), 0);
        assert!(stats.last_packet_age_secs.is_none());
        assert!(!stats.data_active);
    }

    #[test]
    fn test_drops_are_split_by_cause() {
        let counters = RelayCounters::new();
        counters.record_received(10);
        counters.record_parse_error();
        counters.record_received(10);
        counters.record_send_error();
        counters.record_receive_error();
        counters.record_received(8);
        counters.record_truncated();

        let stats = counters.snapshot();
        assert_eq!(stats.packets_received, 3);
        assert_eq!(stats.packets_dropped, 3);
        assert_eq!(stats.packets_truncated, 1);
        assert_eq!(stats.parse_errors, 1);
        assert_eq!(stats.send_errors, 1);
        assert_eq!(stats.receive_errors, 1);
        assert_eq!(stats.bytes_received, 28);
        assert!(stats.data_active);
    }

    #[test]
    fn test_forwarded_folds_report() {
        let counters = RelayCounters::new();
        let report = ConversionReport {
            examined: 5,
            converted: 3,
            skipped: 1,
            per_category: CategoryCounts {
                altitude: 2,
                speed: 1,
                vario: 0,
                acceleration: 0,
            },
        };
        counters.record_received(40);
        counters.record_forwarded(42, &report);
        counters.record_received(40);
        counters.record_forwarded(40, &ConversionReport::default());

        let stats = counters.snapshot();
        assert_eq!(stats.packets_forwarded, 2);
        assert_eq!(stats.packets_converted, 1);
        assert_eq!(stats.bytes_forwarded, 82);
        assert_eq!(stats.fields_examined, 5);
        assert_eq!(stats.fields_converted, 3);
        assert_eq!(stats.fields_skipped, 1);
        assert_eq!(stats.per_category.altitude, 2);
        assert_eq!(stats.per_category.speed, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(RelayCounters::new().snapshot()).unwrap();
        assert_eq!(json["packets_received"], 0);
        assert!(json["per_category"].is_object());
        assert!(json["last_packet_age_secs"].is_null());
    }
}
