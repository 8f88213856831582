//! Per-entity performance tracking
//!
//! One `EntityTracker` belongs to exactly one message-delivery context
//! (a publisher, subscriber, service, or client). Updates are plain `&mut`
//! mutations with no locks and no allocation on the per-message path, so
//! the measurement overhead stays far below the measured latencies.

use serde::{Deserialize, Serialize};

use crate::stats::accumulator::{StatAccumulator, StatSnapshot};
use crate::stats::classification::{classify, SampleVerdict, TrackingOptions};
use crate::timing;
use crate::Result;

/// Read-only copy of a tracker's state
///
/// Reporting only ever sees these value copies, never the live tracker, so
/// the delivery context and the reporter cannot race.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub node: String,
    pub entity: String,
    pub size_bytes: u64,
    pub received: u64,
    pub late: u64,
    pub too_late: u64,
    pub lost: u64,
    pub stat: StatSnapshot,
    pub frequency_hz: f64,
    pub throughput_bps: f64,
}

/// Latency and loss accounting for one communicating endpoint
pub struct EntityTracker {
    node: String,
    entity: String,
    size_bytes: u64,
    period_us: u64,
    options: TrackingOptions,
    stat: StatAccumulator,
    received: u64,
    late: u64,
    too_late: u64,
    lost: u64,
    start_ns: u64,
    end_ns: Option<u64>,
    last_receive_ns: u64,
}

impl EntityTracker {
    /// Create a tracker for one entity.
    ///
    /// `period_us` may be zero for event-driven entities. Thresholds are
    /// validated here, once, not on every sample.
    pub fn new(
        node: impl Into<String>,
        entity: impl Into<String>,
        size_bytes: u64,
        period_us: u64,
        options: TrackingOptions,
    ) -> Result<Self> {
        options.validate()?;
        let start_ns = timing::time_ns();
        Ok(Self {
            node: node.into(),
            entity: entity.into(),
            size_bytes,
            period_us,
            options,
            stat: StatAccumulator::new(),
            received: 0,
            late: 0,
            too_late: 0,
            lost: 0,
            start_ns,
            end_ns: None,
            last_receive_ns: start_ns,
        })
    }

    /// Account one received message.
    ///
    /// Too-late samples are presumed to have missed their useful window:
    /// they count as lost and stay out of the latency moments, so a handful
    /// of degenerate outliers cannot skew the mean.
    pub fn record(&mut self, latency_us: u64, receive_time_ns: u64) {
        self.received += 1;
        if receive_time_ns > self.last_receive_ns {
            self.last_receive_ns = receive_time_ns;
        }
        match classify(latency_us, self.period_us, &self.options) {
            SampleVerdict::OnTime => self.stat.update(latency_us as f64),
            SampleVerdict::Late => {
                self.late += 1;
                self.stat.update(latency_us as f64);
            }
            SampleVerdict::TooLate => {
                self.too_late += 1;
                self.lost += 1;
            }
        }
    }

    /// Pin the end timestamp once the run stops. Idempotent: the first call
    /// wins, later calls keep the tracker frozen where it was.
    pub fn freeze(&mut self) {
        if self.end_ns.is_none() {
            self.end_ns = Some(timing::time_ns());
        }
    }

    fn elapsed_secs(&self) -> f64 {
        let end_ns = self.end_ns.unwrap_or_else(timing::time_ns);
        timing::ns_to_secs(end_ns.saturating_sub(self.start_ns))
    }

    /// Received messages per second over the tracker's lifetime
    pub fn frequency(&self) -> f64 {
        let elapsed = self.elapsed_secs();
        if elapsed > 0.0 {
            self.received as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Received bytes per second over the tracker's lifetime
    pub fn throughput(&self) -> f64 {
        let elapsed = self.elapsed_secs();
        if elapsed > 0.0 {
            (self.received * self.size_bytes) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn late(&self) -> u64 {
        self.late
    }

    pub fn too_late(&self) -> u64 {
        self.too_late
    }

    pub fn lost(&self) -> u64 {
        self.lost
    }

    pub fn stat(&self) -> &StatAccumulator {
        &self.stat
    }

    /// Timestamp of the most recent receive, for activity logging
    pub fn last_receive_ns(&self) -> u64 {
        self.last_receive_ns
    }

    /// Take an immutable snapshot of counters, moments, and derived rates.
    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            node: self.node.clone(),
            entity: self.entity.clone(),
            size_bytes: self.size_bytes,
            received: self.received,
            late: self.late,
            too_late: self.too_late,
            lost: self.lost,
            stat: self.stat.snapshot(),
            frequency_hz: self.frequency(),
            throughput_bps: self.throughput(),
        }
    }
}
