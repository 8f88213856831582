//! meshbench: benchmark harness for message-passing topologies
//!
//! Spins an in-process pub/sub topology for a fixed duration while a
//! background sampler records host resource usage, then reports per-entity
//! and system-wide latency statistics.

use std::fs;
use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meshbench_core::monitor::ResourceSampler;
use meshbench_core::stats::{write_total_stats, write_trackers_stats, SystemTotals};

mod options;
mod output;
mod runner;

use options::Options;
use output::ExperimentResults;
use runner::TopologyConfig;

const SUBSCRIPTIONS_TITLE: &str = "Subscriptions stats:";

fn main() -> Result<()> {
    let options = Options::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| options.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    options.tracking().validate().context("invalid classification thresholds")?;
    anyhow::ensure!(options.frequency > 0.0, "publish frequency must be positive");

    tracing::info!(
        "Topology: {} publishers, {} subscribers at {} Hz, {} byte messages",
        options.pubs,
        options.subs,
        options.frequency,
        options.msg_size
    );
    tracing::info!("Run test for: {} seconds", options.duration);
    if !options.no_monitor {
        tracing::info!("Sampling resources every {}ms", options.sampling);
    }

    fs::create_dir_all(&options.experiment_path)
        .with_context(|| format!("creating {}", options.experiment_path.display()))?;
    let tail = options.file_tail();
    let resources_path = options.experiment_path.join(format!("resources{tail}.txt"));
    let latency_all_path = options.experiment_path.join(format!("latency_all{tail}.txt"));
    let latency_total_path = options.experiment_path.join(format!("latency_total{tail}.txt"));

    let mut sampler = ResourceSampler::new(&resources_path);
    if !options.no_monitor {
        sampler.start(options.sampling_period()).context("starting resource sampler")?;
    }

    let config = TopologyConfig {
        publishers: options.pubs,
        subscribers: options.subs,
        frequency_hz: options.frequency,
        msg_size: options.msg_size,
        duration: options.run_duration(),
        tracking: options.tracking(),
    };
    let snapshots = runner::run(&config)?;

    if !options.no_monitor {
        sampler.stop().context("stopping resource sampler")?;
        tracing::info!(
            "Collected {} resource samples into {}",
            sampler.samples().len(),
            resources_path.display()
        );
    }

    let totals = SystemTotals::from_snapshots(&snapshots);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_trackers_stats(&mut out, &snapshots, SUBSCRIPTIONS_TITLE)?;
    writeln!(out)?;
    writeln!(out, "System total:")?;
    write_total_stats(&mut out, &totals)?;

    output::save_trackers_stats(&latency_all_path, &snapshots, SUBSCRIPTIONS_TITLE)?;
    output::save_total_stats(&latency_total_path, &totals)?;
    tracing::info!(
        "Latency stats saved to {} and {}",
        latency_all_path.display(),
        latency_total_path.display()
    );

    if let Some(json_path) = &options.json {
        let results = ExperimentResults {
            experiment: options
                .experiment_name
                .clone()
                .unwrap_or_else(|| "meshbench".to_string()),
            duration_secs: options.run_duration().as_secs_f64(),
            totals,
            subscriptions: snapshots,
        };
        results.write_json(json_path)?;
        tracing::info!("Results written to {}", json_path.display());
    }

    Ok(())
}
