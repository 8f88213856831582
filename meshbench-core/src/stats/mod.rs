//! Statistics tracking and reporting

pub mod accumulator;
pub mod classification;
pub mod report;
pub mod tracker;

// Re-export main types
pub use accumulator::{StatAccumulator, StatSnapshot};
pub use classification::{classify, SampleVerdict, TrackingOptions};
pub use report::{write_total_stats, write_trackers_stats, SystemTotals};
pub use tracker::{EntityTracker, TrackerSnapshot};
