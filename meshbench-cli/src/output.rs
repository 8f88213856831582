//! Results output
//!
//! Saves the rendered tables to their result files and optionally a
//! machine-readable JSON copy of the same data.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use meshbench_core::stats::{write_total_stats, write_trackers_stats, SystemTotals, TrackerSnapshot};

/// Machine-readable experiment results
#[derive(Debug, Serialize)]
pub struct ExperimentResults {
    pub experiment: String,
    pub duration_secs: f64,
    pub totals: SystemTotals,
    pub subscriptions: Vec<TrackerSnapshot>,
}

impl ExperimentResults {
    /// Write results to a pretty-printed JSON file
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file =
            File::create(path).with_context(|| format!("creating {}", path.display()))?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

/// Save the per-entity table to a file.
pub fn save_trackers_stats(
    path: &Path,
    snapshots: &[TrackerSnapshot],
    title: &str,
) -> Result<()> {
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_trackers_stats(&mut file, snapshots, title)?;
    Ok(())
}

/// Save the total-line summary to a file.
pub fn save_total_stats(path: &Path, totals: &SystemTotals) -> Result<()> {
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_total_stats(&mut file, totals)?;
    Ok(())
}
