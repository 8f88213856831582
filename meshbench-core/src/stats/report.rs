//! System-wide aggregation and delimited-text reports
//!
//! Output layout follows the harness' historical result files: semicolon
//! separated columns, header row first, one row per entity, and a blank
//! line plus a titled header before each table. Fields are numeric or plain
//! identifiers, so no CSV escaping is needed.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::stats::tracker::TrackerSnapshot;
use crate::Result;

/// Format a float with `digits` significant digits, trailing zeros trimmed
/// (the layout C-family streams produce under `setprecision`).
fn fmt_sig(value: f64, digits: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let exponent = value.abs().log10().floor() as i32;
    if exponent < -4 || exponent >= digits as i32 {
        return format!("{:.*e}", digits.saturating_sub(1), value);
    }

    let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
    let fixed = format!("{:.*}", decimals, value);
    if fixed.contains('.') {
        fixed.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        fixed
    }
}

/// Round a latency moment to the nearest integer microsecond for display.
fn fmt_rounded(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{}", value.round())
    }
}

/// System-wide totals, recomputed on demand from tracker snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemTotals {
    pub received: u64,
    pub late: u64,
    pub too_late: u64,
    pub lost: u64,
    /// Received-weighted mean latency across entities, rounded to the
    /// nearest microsecond; NaN when nothing was received.
    pub average_latency_us: f64,
}

impl SystemTotals {
    /// Aggregate a set of snapshots. A pure function of its inputs: the
    /// latency average weights each entity by its received count, so
    /// entities with more traffic dominate.
    pub fn from_snapshots(snapshots: &[TrackerSnapshot]) -> Self {
        let mut received = 0u64;
        let mut late = 0u64;
        let mut too_late = 0u64;
        let mut lost = 0u64;
        let mut weighted_latency = 0.0f64;

        for snapshot in snapshots {
            received += snapshot.received;
            late += snapshot.late;
            too_late += snapshot.too_late;
            lost += snapshot.lost;
            if snapshot.stat.count > 0 {
                weighted_latency += snapshot.received as f64 * snapshot.stat.mean;
            }
        }

        // 0/0 is the defined NaN sentinel for an idle system
        let average_latency_us = (weighted_latency / received as f64).round();

        Self { received, late, too_late, lost, average_latency_us }
    }

    /// Share of traffic that was lost, out of everything sent
    pub fn lost_percentage(&self) -> f64 {
        self.lost as f64 / (self.received + self.lost) as f64 * 100.0
    }

    /// Share of received messages that arrived late
    pub fn late_percentage(&self) -> f64 {
        self.late as f64 / self.received as f64 * 100.0
    }

    /// Share of received messages that arrived past their useful window
    pub fn too_late_percentage(&self) -> f64 {
        self.too_late as f64 / self.received as f64 * 100.0
    }
}

/// Write the per-entity table. Emits nothing at all for an empty set.
pub fn write_trackers_stats<W: Write>(
    w: &mut W,
    snapshots: &[TrackerSnapshot],
    title: &str,
) -> Result<()> {
    if snapshots.is_empty() {
        return Ok(());
    }

    writeln!(w)?;
    writeln!(w, "{title}")?;
    writeln!(
        w,
        "node;topic;size[b];received[#];late[#];too_late[#];lost[#];\
         mean[us];sd[us];min[us];max[us];freq[hz];throughput[Kb/s]"
    )?;

    for s in snapshots {
        writeln!(
            w,
            "{};{};{};{};{};{};{};{};{};{};{};{};{}",
            s.node,
            s.entity,
            s.size_bytes,
            s.received,
            s.late,
            s.too_late,
            s.lost,
            fmt_rounded(s.stat.mean),
            fmt_rounded(s.stat.stddev),
            fmt_rounded(s.stat.min),
            fmt_rounded(s.stat.max),
            fmt_sig(s.frequency_hz, 6),
            fmt_sig(s.throughput_bps / 1024.0, 6),
        )?;
    }

    Ok(())
}

/// Write the single total line with its header.
pub fn write_total_stats<W: Write>(w: &mut W, totals: &SystemTotals) -> Result<()> {
    writeln!(w, "received[#];mean[us];late[#];late[%];too_late[#];too_late[%];lost[#];lost[%]")?;
    writeln!(
        w,
        "{};{};{};{};{};{};{};{}",
        totals.received,
        fmt_rounded(totals.average_latency_us),
        totals.late,
        fmt_sig(totals.late_percentage(), 4),
        totals.too_late,
        fmt_sig(totals.too_late_percentage(), 4),
        totals.lost,
        fmt_sig(totals.lost_percentage(), 4),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::accumulator::StatSnapshot;

    fn snapshot(node: &str, entity: &str, received: u64, lost: u64, mean: f64) -> TrackerSnapshot {
        let count = received - lost;
        TrackerSnapshot {
            node: node.to_string(),
            entity: entity.to_string(),
            size_bytes: 10,
            received,
            late: 0,
            too_late: lost,
            lost,
            stat: StatSnapshot {
                count,
                mean: if count > 0 { mean } else { f64::NAN },
                stddev: if count > 0 { 0.0 } else { f64::NAN },
                min: mean,
                max: mean,
            },
            frequency_hz: 10.0,
            throughput_bps: 1024.0,
        }
    }

    fn render_table(snapshots: &[TrackerSnapshot]) -> String {
        let mut buffer = Vec::new();
        write_trackers_stats(&mut buffer, snapshots, "Subscriptions stats:").unwrap();
        String::from_utf8(buffer).unwrap()
    }

    fn render_total(snapshots: &[TrackerSnapshot]) -> String {
        let totals = SystemTotals::from_snapshots(snapshots);
        let mut buffer = Vec::new();
        write_total_stats(&mut buffer, &totals).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_fmt_sig() {
        assert_eq!(fmt_sig(4.761904, 4), "4.762");
        assert_eq!(fmt_sig(33.3333, 4), "33.33");
        assert_eq!(fmt_sig(100.0, 4), "100");
        assert_eq!(fmt_sig(0.16, 4), "0.16");
        assert_eq!(fmt_sig(0.0, 4), "0");
        assert_eq!(fmt_sig(f64::NAN, 4), "nan");
        assert_eq!(fmt_sig(12345.6, 4), "1.235e4");
    }

    #[test]
    fn test_fmt_rounded() {
        assert_eq!(fmt_rounded(150.4), "150");
        assert_eq!(fmt_rounded(12.6), "13");
        assert_eq!(fmt_rounded(f64::NAN), "nan");
    }

    #[test]
    fn test_empty_tracker_set_produces_no_output() {
        assert_eq!(render_table(&[]), "");
    }

    #[test]
    fn test_table_layout() {
        let output = render_table(&[snapshot("sub_0", "topic_0", 100, 0, 150.0)]);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "");
        assert_eq!(lines[1], "Subscriptions stats:");
        assert_eq!(
            lines[2],
            "node;topic;size[b];received[#];late[#];too_late[#];lost[#];\
             mean[us];sd[us];min[us];max[us];freq[hz];throughput[Kb/s]"
        );
        assert_eq!(lines[3], "sub_0;topic_0;10;100;0;0;0;150;0;150;150;10;1");
    }

    #[test]
    fn test_average_latency_is_received_weighted() {
        let snapshots =
            [snapshot("a", "t", 10, 0, 100.0), snapshot("b", "t", 30, 0, 200.0)];
        let totals = SystemTotals::from_snapshots(&snapshots);

        assert_eq!(totals.received, 40);
        // (10*100 + 30*200) / 40, not the naive (100+200)/2
        assert_eq!(totals.average_latency_us, 175.0);
    }

    #[test]
    fn test_lost_percentage_counts_lost_in_denominator() {
        let totals = SystemTotals::from_snapshots(&[snapshot("a", "t", 100, 5, 100.0)]);

        assert!((totals.lost_percentage() - 4.761904).abs() < 1e-4);
        let output = render_total(&[snapshot("a", "t", 100, 5, 100.0)]);
        assert!(output.lines().nth(1).unwrap().ends_with(";5;4.762"));
    }

    #[test]
    fn test_zero_received_renders_nan_sentinels() {
        let totals = SystemTotals::from_snapshots(&[]);

        assert_eq!(totals.received, 0);
        assert!(totals.average_latency_us.is_nan());
        assert!(totals.late_percentage().is_nan());

        let output = render_total(&[]);
        assert_eq!(output.lines().nth(1).unwrap(), "0;nan;0;nan;0;nan;0;nan");
    }

    #[test]
    fn test_entities_with_only_lost_traffic_do_not_poison_average() {
        // All of b's messages were too late: its mean is NaN but must not
        // drag the system average to NaN
        let snapshots =
            [snapshot("a", "t", 10, 0, 100.0), snapshot("b", "t", 5, 5, f64::NAN)];
        let totals = SystemTotals::from_snapshots(&snapshots);

        assert_eq!(totals.received, 15);
        assert!(!totals.average_latency_us.is_nan());
        assert_eq!(totals.average_latency_us, (10.0 * 100.0 / 15.0f64).round());
    }
}
