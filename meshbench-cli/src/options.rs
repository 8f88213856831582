//! Command-line options
//!
//! The recognized knobs mirror the experiment runner this harness replaces:
//! topology size, publish rate, classification thresholds, resource
//! sampling, and output placement.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use meshbench_core::stats::TrackingOptions;

#[derive(Parser, Debug)]
#[command(name = "meshbench")]
#[command(version, about = "Benchmark harness for message-passing topologies")]
pub struct Options {
    /// Duration in seconds
    #[arg(short = 't', long, default_value_t = 5)]
    pub duration: u64,

    /// Number of publisher entities
    #[arg(long, default_value_t = 1)]
    pub pubs: usize,

    /// Number of subscriber entities
    #[arg(long, default_value_t = 2)]
    pub subs: usize,

    /// Publish frequency in Hz
    #[arg(short = 'f', long, default_value_t = 10.0)]
    pub frequency: f64,

    /// Message payload size in bytes
    #[arg(long, default_value_t = 10)]
    pub msg_size: usize,

    /// Resource sampling period in milliseconds
    #[arg(long, default_value_t = 500)]
    pub sampling: u64,

    /// Disable the background resource sampler
    #[arg(long)]
    pub no_monitor: bool,

    /// A message with greater latency than this percentage of the period is
    /// considered late
    #[arg(long = "late-percentage", default_value_t = 20.0)]
    pub late_percentage: f64,

    /// A message with greater latency than this is considered late (usec)
    #[arg(long = "late-absolute", default_value_t = 5_000)]
    pub late_absolute_us: i64,

    /// A message with greater latency than this percentage of the period is
    /// considered lost
    #[arg(long = "too-late-percentage", default_value_t = 100.0)]
    pub too_late_percentage: f64,

    /// A message with greater latency than this is considered lost (usec)
    #[arg(long = "too-late-absolute", default_value_t = 50_000)]
    pub too_late_absolute_us: i64,

    /// Directory for result files
    #[arg(long, default_value = "results")]
    pub experiment_path: PathBuf,

    /// Optional experiment name appended to result file names
    #[arg(long)]
    pub experiment_name: Option<String>,

    /// Also write a machine-readable copy of the results to this JSON file
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    pub log_level: String,
}

impl Options {
    pub fn tracking(&self) -> TrackingOptions {
        TrackingOptions {
            late_percentage: self.late_percentage,
            late_absolute_us: self.late_absolute_us,
            too_late_percentage: self.too_late_percentage,
            too_late_absolute_us: self.too_late_absolute_us,
        }
    }

    pub fn run_duration(&self) -> Duration {
        Duration::from_secs(self.duration)
    }

    pub fn sampling_period(&self) -> Duration {
        Duration::from_millis(self.sampling)
    }

    /// File-name tail shared by every result file of one run
    pub fn file_tail(&self) -> String {
        match &self.experiment_name {
            Some(name) => format!("_{}s_{}", self.duration, name),
            None => format!("_{}s", self.duration),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::try_parse_from(["meshbench"]).unwrap();

        assert_eq!(options.duration, 5);
        assert_eq!(options.pubs, 1);
        assert_eq!(options.subs, 2);
        assert_eq!(options.sampling, 500);
        assert!(!options.no_monitor);
        assert_eq!(options.tracking(), TrackingOptions::default());
    }

    #[test]
    fn test_threshold_flags_map_to_tracking_options() {
        let options = Options::try_parse_from([
            "meshbench",
            "--late-percentage",
            "10",
            "--late-absolute",
            "2000",
            "--too-late-percentage",
            "50",
            "--too-late-absolute",
            "20000",
        ])
        .unwrap();

        let tracking = options.tracking();
        assert_eq!(tracking.late_percentage, 10.0);
        assert_eq!(tracking.late_absolute_us, 2_000);
        assert_eq!(tracking.too_late_percentage, 50.0);
        assert_eq!(tracking.too_late_absolute_us, 20_000);
    }

    #[test]
    fn test_file_tail() {
        let options = Options::try_parse_from(["meshbench", "-t", "30"]).unwrap();
        assert_eq!(options.file_tail(), "_30s");

        let options =
            Options::try_parse_from(["meshbench", "-t", "30", "--experiment-name", "smoke"])
                .unwrap();
        assert_eq!(options.file_tail(), "_30s_smoke");
    }
}
