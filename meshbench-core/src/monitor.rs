//! Background host-resource sampling
//!
//! A sampler thread wakes on its own cadence, reads process CPU and memory
//! counters, and appends one line per tick to its sink. It shares nothing
//! with the entity trackers, so it cannot perturb the message path beyond
//! the resources it measures.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nix::sys::resource::{getrusage, UsageWho};
use nix::unistd::{sysconf, SysconfVar};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::timing;

/// One reading of the process resource counters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceSample {
    pub time_ms: u64,
    pub cpu_percent: f64,
    pub rss_kb: u64,
    pub vsz_kb: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SamplerState {
    Idle,
    Running,
    Stopped,
}

struct Shared {
    running: Mutex<bool>,
    wakeup: Condvar,
    samples: Mutex<Vec<ResourceSample>>,
}

/// Periodic sampler of process CPU and memory usage
///
/// Lifecycle is Idle -> Running -> Stopped. `start` and `stop` out of order
/// are usage errors reported to the caller, and no tick fires once `stop`
/// has returned.
pub struct ResourceSampler {
    path: PathBuf,
    state: SamplerState,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl ResourceSampler {
    /// Create a sampler writing to the given file. Nothing happens until
    /// `start` is called.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: SamplerState::Idle,
            shared: Arc::new(Shared {
                running: Mutex::new(false),
                wakeup: Condvar::new(),
                samples: Mutex::new(Vec::new()),
            }),
            handle: None,
        }
    }

    /// Spawn the sampling thread, ticking every `period`.
    pub fn start(&mut self, period: Duration) -> Result<()> {
        match self.state {
            SamplerState::Running => {
                return Err(Error::Sampler("sampler is already running".to_string()))
            }
            SamplerState::Stopped => {
                return Err(Error::Sampler("sampler cannot be restarted".to_string()))
            }
            SamplerState::Idle => {}
        }
        if period.is_zero() {
            return Err(Error::Config("sampling period must be non-zero".to_string()));
        }

        let file = File::create(&self.path)?;
        *self.shared.running.lock().unwrap() = true;

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("resource-sampler".to_string())
            .spawn(move || sample_loop(shared, file, period))?;

        self.handle = Some(handle);
        self.state = SamplerState::Running;
        Ok(())
    }

    /// Stop sampling and join the sampler thread.
    ///
    /// Once this returns no further sample is taken and the sink has been
    /// flushed. Stopping before the first tick elapses is fine and leaves
    /// zero accumulated samples.
    pub fn stop(&mut self) -> Result<()> {
        if self.state != SamplerState::Running {
            return Err(Error::Sampler("sampler is not running".to_string()));
        }

        {
            let mut running = self.shared.running.lock().unwrap();
            *running = false;
            self.shared.wakeup.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                self.state = SamplerState::Stopped;
                return Err(Error::Sampler("sampler thread panicked".to_string()));
            }
        }

        self.state = SamplerState::Stopped;
        Ok(())
    }

    /// Samples accumulated so far (all of them, once stopped)
    pub fn samples(&self) -> Vec<ResourceSample> {
        self.shared.samples.lock().unwrap().clone()
    }

    pub fn is_running(&self) -> bool {
        self.state == SamplerState::Running
    }
}

fn sample_loop(shared: Arc<Shared>, file: File, period: Duration) {
    let mut out = BufWriter::new(file);
    if let Err(e) = writeln!(out, "{:>10} {:>8} {:>10} {:>10}", "time[ms]", "cpu[%]", "rss[KB]", "vsz[KB]")
    {
        tracing::warn!("resource sampler could not write header: {e}");
    }

    let mut prev_cpu_us = process_cpu_us().unwrap_or(0);
    let mut prev_wall_ns = timing::time_ns();

    let mut running = shared.running.lock().unwrap();
    loop {
        if !*running {
            break;
        }
        let (guard, timeout) =
            shared.wakeup.wait_timeout_while(running, period, |still_running| *still_running).unwrap();
        running = guard;
        if !timeout.timed_out() {
            // Stop was requested while waiting
            break;
        }
        drop(running);

        match read_sample(&mut prev_cpu_us, &mut prev_wall_ns) {
            Ok(sample) => {
                if let Err(e) = writeln!(
                    out,
                    "{:>10} {:>8.2} {:>10} {:>10}",
                    sample.time_ms, sample.cpu_percent, sample.rss_kb, sample.vsz_kb
                ) {
                    tracing::warn!("resource sampler could not write sample: {e}");
                }
                shared.samples.lock().unwrap().push(sample);
            }
            // An unreadable counter fails this one sample, not the run
            Err(e) => tracing::warn!("skipping resource sample: {e}"),
        }

        running = shared.running.lock().unwrap();
    }
    drop(running);

    if let Err(e) = out.flush() {
        tracing::warn!("resource sampler could not flush output: {e}");
    }
}

fn read_sample(prev_cpu_us: &mut u64, prev_wall_ns: &mut u64) -> Result<ResourceSample> {
    let now_ns = timing::time_ns();
    let cpu_us = process_cpu_us()?;

    let wall_us = now_ns.saturating_sub(*prev_wall_ns) / 1_000;
    let cpu_percent = if wall_us > 0 {
        cpu_us.saturating_sub(*prev_cpu_us) as f64 / wall_us as f64 * 100.0
    } else {
        0.0
    };
    *prev_cpu_us = cpu_us;
    *prev_wall_ns = now_ns;

    let (rss_kb, vsz_kb) = memory_kb()?;
    Ok(ResourceSample { time_ms: now_ns / 1_000_000, cpu_percent, rss_kb, vsz_kb })
}

/// Total process CPU time (user + system) in microseconds
fn process_cpu_us() -> Result<u64> {
    let usage = getrusage(UsageWho::RUSAGE_SELF)
        .map_err(|e| Error::Sampler(format!("getrusage failed: {e}")))?;
    let user = usage.user_time();
    let system = usage.system_time();
    let seconds = (user.tv_sec() + system.tv_sec()) as u64;
    let micros = (user.tv_usec() + system.tv_usec()) as u64;
    Ok(seconds * 1_000_000 + micros)
}

/// Resident and virtual set sizes in KB, from /proc/self/statm
fn memory_kb() -> Result<(u64, u64)> {
    let statm = std::fs::read_to_string("/proc/self/statm")?;
    let mut fields = statm.split_whitespace();
    let vsz_pages: u64 = fields
        .next()
        .and_then(|field| field.parse().ok())
        .ok_or_else(|| Error::Sampler("malformed /proc/self/statm".to_string()))?;
    let rss_pages: u64 = fields
        .next()
        .and_then(|field| field.parse().ok())
        .ok_or_else(|| Error::Sampler("malformed /proc/self/statm".to_string()))?;

    let page_kb = page_size_kb()?;
    Ok((rss_pages * page_kb, vsz_pages * page_kb))
}

fn page_size_kb() -> Result<u64> {
    let page = sysconf(SysconfVar::PAGE_SIZE)
        .map_err(|e| Error::Sampler(format!("sysconf failed: {e}")))?
        .ok_or_else(|| Error::Sampler("page size unavailable".to_string()))?;
    Ok(page as u64 / 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler_in(dir: &tempfile::TempDir, name: &str) -> ResourceSampler {
        ResourceSampler::new(dir.path().join(name))
    }

    #[test]
    fn test_start_twice_is_a_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut sampler = sampler_in(&dir, "resources.txt");

        sampler.start(Duration::from_millis(50)).unwrap();
        let err = sampler.start(Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, Error::Sampler(_)));

        sampler.stop().unwrap();
    }

    #[test]
    fn test_stop_before_start_is_a_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut sampler = sampler_in(&dir, "resources.txt");

        assert!(matches!(sampler.stop(), Err(Error::Sampler(_))));
    }

    #[test]
    fn test_zero_period_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut sampler = sampler_in(&dir, "resources.txt");

        assert!(matches!(sampler.start(Duration::ZERO), Err(Error::Config(_))));
    }

    #[test]
    fn test_stop_before_first_tick_leaves_zero_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resources.txt");
        let mut sampler = ResourceSampler::new(&path);

        sampler.start(Duration::from_secs(3600)).unwrap();
        assert!(sampler.is_running());
        sampler.stop().unwrap();

        assert!(!sampler.is_running());
        assert!(sampler.samples().is_empty());

        // Header only, no sample lines
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("time[ms]"));
    }

    #[test]
    fn test_restart_after_stop_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut sampler = sampler_in(&dir, "resources.txt");

        sampler.start(Duration::from_millis(50)).unwrap();
        sampler.stop().unwrap();
        assert!(matches!(sampler.start(Duration::from_millis(50)), Err(Error::Sampler(_))));
    }

    #[test]
    fn test_ticks_accumulate_samples_and_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resources.txt");
        let mut sampler = ResourceSampler::new(&path);

        sampler.start(Duration::from_millis(20)).unwrap();
        thread::sleep(Duration::from_millis(150));
        sampler.stop().unwrap();

        let samples = sampler.samples();
        assert!(!samples.is_empty(), "expected at least one tick in 150ms");
        for sample in &samples {
            assert!(sample.rss_kb > 0);
            assert!(sample.vsz_kb >= sample.rss_kb);
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), samples.len() + 1);
    }

    #[test]
    fn test_no_sample_after_stop_returns() {
        let dir = tempfile::tempdir().unwrap();
        let mut sampler = sampler_in(&dir, "resources.txt");

        sampler.start(Duration::from_millis(10)).unwrap();
        thread::sleep(Duration::from_millis(50));
        sampler.stop().unwrap();

        let count = sampler.samples().len();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(sampler.samples().len(), count);
    }
}
