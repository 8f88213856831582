//! In-process pub/sub topology
//!
//! Drives the tracking engine without a real middleware underneath: each
//! publisher owns a thread and a topic, each subscriber owns a thread, an
//! inbox, and one tracker per topic. Latency is measured from the publish
//! timestamp embedded in every message. Delivery is plain channels; there
//! are no retries and no delivery guarantees, the trackers account for
//! whatever arrives.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use meshbench_core::stats::{EntityTracker, TrackerSnapshot, TrackingOptions};
use meshbench_core::timing;

pub struct TopologyConfig {
    pub publishers: usize,
    pub subscribers: usize,
    pub frequency_hz: f64,
    pub msg_size: usize,
    pub duration: Duration,
    pub tracking: TrackingOptions,
}

struct Message {
    topic: usize,
    sent_ns: u64,
    payload: Vec<u8>,
}

/// Run the topology for the configured duration and return one frozen
/// snapshot per (subscriber, topic) subscription, ordered by identity.
pub fn run(config: &TopologyConfig) -> Result<Vec<TrackerSnapshot>> {
    anyhow::ensure!(config.publishers > 0, "topology needs at least one publisher");
    anyhow::ensure!(config.subscribers > 0, "topology needs at least one subscriber");
    anyhow::ensure!(config.frequency_hz > 0.0, "publish frequency must be positive");

    let period = Duration::from_secs_f64(1.0 / config.frequency_hz);
    let period_us = period.as_micros() as u64;
    let deadline_ns = timing::time_ns() + config.duration.as_nanos() as u64;

    // One inbox per subscriber; publishers fan out to all of them
    let mut senders: Vec<Sender<Message>> = Vec::with_capacity(config.subscribers);
    let mut inboxes: Vec<Receiver<Message>> = Vec::with_capacity(config.subscribers);
    for _ in 0..config.subscribers {
        let (tx, rx) = mpsc::channel();
        senders.push(tx);
        inboxes.push(rx);
    }

    let mut sub_handles = Vec::with_capacity(config.subscribers);
    for (sub_idx, inbox) in inboxes.into_iter().enumerate() {
        let mut trackers = Vec::with_capacity(config.publishers);
        for topic in 0..config.publishers {
            trackers.push(
                EntityTracker::new(
                    format!("sub_{sub_idx}"),
                    format!("topic_{topic}"),
                    config.msg_size as u64,
                    period_us,
                    config.tracking,
                )
                .context("invalid tracking options")?,
            );
        }
        let msg_size = config.msg_size;
        sub_handles.push(
            thread::Builder::new()
                .name(format!("sub_{sub_idx}"))
                .spawn(move || subscriber_loop(inbox, trackers, msg_size))?,
        );
    }

    let mut pub_handles = Vec::with_capacity(config.publishers);
    for topic in 0..config.publishers {
        let outputs = senders.clone();
        let msg_size = config.msg_size;
        pub_handles.push(
            thread::Builder::new()
                .name(format!("pub_{topic}"))
                .spawn(move || publisher_loop(topic, outputs, msg_size, period, deadline_ns))?,
        );
    }
    // Subscribers run until every publisher has hung up
    drop(senders);

    for handle in pub_handles {
        handle.join().map_err(|_| anyhow::anyhow!("publisher thread panicked"))?;
    }

    let mut snapshots = Vec::new();
    for handle in sub_handles {
        let trackers =
            handle.join().map_err(|_| anyhow::anyhow!("subscriber thread panicked"))?;
        snapshots.extend(trackers.iter().map(EntityTracker::snapshot));
        for tracker in &trackers {
            tracing::debug!(
                "{}/{}: {} received, last activity at {}ms",
                tracker.node(),
                tracker.entity(),
                tracker.received(),
                tracker.last_receive_ns() / 1_000_000
            );
        }
    }
    snapshots.sort_by(|a, b| (&a.node, &a.entity).cmp(&(&b.node, &b.entity)));
    Ok(snapshots)
}

fn publisher_loop(
    topic: usize,
    outputs: Vec<Sender<Message>>,
    msg_size: usize,
    period: Duration,
    deadline_ns: u64,
) {
    let period_ns = period.as_nanos() as u64;
    let mut next_ns = timing::time_ns();

    while timing::time_ns() < deadline_ns {
        for output in &outputs {
            let message =
                Message { topic, sent_ns: timing::time_ns(), payload: vec![0u8; msg_size] };
            // A subscriber that already hung up just stops hearing this topic
            let _ = output.send(message);
        }

        next_ns += period_ns;
        let now_ns = timing::time_ns();
        if next_ns > now_ns {
            thread::sleep(Duration::from_nanos(next_ns - now_ns));
        }
    }
}

fn subscriber_loop(
    inbox: Receiver<Message>,
    mut trackers: Vec<EntityTracker>,
    msg_size: usize,
) -> Vec<EntityTracker> {
    loop {
        match inbox.recv_timeout(Duration::from_millis(100)) {
            Ok(message) => {
                let receive_ns = timing::time_ns();
                if message.payload.len() != msg_size {
                    tracing::warn!(
                        "dropping malformed message on topic_{}: {} bytes",
                        message.topic,
                        message.payload.len()
                    );
                    continue;
                }
                let latency_us = receive_ns.saturating_sub(message.sent_ns) / 1_000;
                if let Some(tracker) = trackers.get_mut(message.topic) {
                    tracker.record(latency_us, receive_ns);
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    for tracker in &mut trackers {
        tracker.freeze();
    }
    trackers
}
