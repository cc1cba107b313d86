//! Bounded keep-alive output for slow lookups.
//!
//! CI runners kill jobs that stay silent for too long, and an `sbt` cold start
//! can easily exceed that. A [`Heartbeat`] prints a tick to stderr every
//! interval, at most [`TICKS`] times, from a detached thread. It is never
//! joined; dropping the handle asks the thread to stop at its next wake-up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Maximum ticks printed by one heartbeat.
pub const TICKS: u32 = 10;

/// Gap between ticks.
pub const INTERVAL: Duration = Duration::from_secs(40);

/// Upper bound on how long the thread sleeps before re-checking the stop flag.
const POLL: Duration = Duration::from_millis(50);

/// Handle to a running heartbeat. Stops the ticker on drop.
#[derive(Debug)]
pub struct Heartbeat {
    stop: Arc<AtomicBool>,
    ticks: Arc<AtomicU32>,
}

impl Heartbeat {
    /// Start the standard heartbeat.
    pub fn start(label: &str) -> Self {
        Self::start_with(label, TICKS, INTERVAL)
    }

    pub fn start_with(label: &str, ticks: u32, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let emitted = Arc::new(AtomicU32::new(0));

        let thread_stop = Arc::clone(&stop);
        let thread_ticks = Arc::clone(&emitted);
        let label = label.to_string();

        eprintln!("[info] {label}: heartbeat started");
        thread::spawn(move || {
            for tick in 0..ticks {
                if thread_stop.load(Ordering::Relaxed) {
                    return;
                }
                eprintln!(
                    "[info] {label}: tick {tick}, {}s elapsed",
                    interval.as_secs() * u64::from(tick)
                );
                thread_ticks.fetch_add(1, Ordering::Relaxed);

                let deadline = Instant::now() + interval;
                while Instant::now() < deadline {
                    if thread_stop.load(Ordering::Relaxed) {
                        return;
                    }
                    thread::sleep(POLL.min(deadline.saturating_duration_since(Instant::now())));
                }
            }
        });

        Self {
            stop,
            ticks: emitted,
        }
    }

    /// Number of ticks printed so far.
    pub fn ticks(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}
