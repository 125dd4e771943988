//! Elapsed-time sources used to timestamp pooled objects

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam::atomic::AtomicCell;
use parking_lot::Mutex;

/// Number of ticks in one second (one tick is 100 nanoseconds)
pub const TICKS_PER_SECOND: u64 = 10_000_000;

const NANOS_PER_TICK: u128 = 100;

/// Monotonic elapsed-time source
///
/// The pool only ever calls [`Clock::elapsed`]; the lifecycle controls exist so
/// callers can pause or rewind time in tests.
pub trait Clock: Send + Sync {
    /// Time accumulated while running since the last reset
    fn elapsed(&self) -> Duration;

    /// Start or resume measuring
    fn start(&self);

    /// Stop measuring, keeping the accumulated time
    fn stop(&self);

    /// Stop and zero the accumulated time
    fn reset(&self);

    /// Whether the clock is currently measuring
    fn is_running(&self) -> bool;

    /// Zero the accumulated time and start measuring again
    fn restart(&self) {
        self.reset();
        self.start();
    }

    /// [`Clock::elapsed`] expressed in 100-nanosecond ticks
    fn elapsed_ticks(&self) -> u64 {
        let ticks = self.elapsed().as_nanos() / NANOS_PER_TICK;
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }

    /// [`Clock::elapsed`] expressed in whole milliseconds
    fn elapsed_milliseconds(&self) -> u128 {
        self.elapsed().as_millis()
    }
}

#[derive(Debug, Default)]
struct StopwatchState {
    accumulated: Duration,
    started_at: Option<Instant>,
}

/// Clock backed by [`Instant`]
///
/// # Examples
///
/// ```
/// use esox_resizable_pool::{Clock, Stopwatch};
///
/// let watch = Stopwatch::start_new();
/// assert!(watch.is_running());
///
/// watch.stop();
/// let frozen = watch.elapsed();
/// assert_eq!(watch.elapsed(), frozen);
/// ```
#[derive(Debug, Default)]
pub struct Stopwatch {
    state: Mutex<StopwatchState>,
}

impl Stopwatch {
    /// Create a stopped stopwatch
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stopwatch that is already running
    pub fn start_new() -> Self {
        let watch = Self::new();
        watch.start();
        watch
    }
}

impl Clock for Stopwatch {
    fn elapsed(&self) -> Duration {
        let state = self.state.lock();
        match state.started_at {
            Some(started) => state.accumulated + started.elapsed(),
            None => state.accumulated,
        }
    }

    fn start(&self) {
        let mut state = self.state.lock();
        if state.started_at.is_none() {
            state.started_at = Some(Instant::now());
        }
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        if let Some(started) = state.started_at.take() {
            state.accumulated += started.elapsed();
        }
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.accumulated = Duration::ZERO;
        state.started_at = None;
    }

    fn is_running(&self) -> bool {
        self.state.lock().started_at.is_some()
    }
}

/// Clock that only moves when told to
///
/// Time advances through [`ManualClock::advance`] and only while the clock is
/// running. New clocks start running at zero.
///
/// # Examples
///
/// ```
/// use esox_resizable_pool::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// clock.advance(Duration::from_secs(5));
/// assert_eq!(clock.elapsed_milliseconds(), 5_000);
///
/// clock.stop();
/// clock.advance(Duration::from_secs(5));
/// assert_eq!(clock.elapsed(), Duration::from_secs(5));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    elapsed: AtomicCell<Duration>,
    running: AtomicBool,
}

impl ManualClock {
    /// Create a running clock at zero
    pub fn new() -> Self {
        Self {
            elapsed: AtomicCell::new(Duration::ZERO),
            running: AtomicBool::new(true),
        }
    }

    /// Move time forward by `by` if the clock is running
    pub fn advance(&self, by: Duration) {
        if !self.is_running() {
            return;
        }

        let mut current = self.elapsed.load();
        loop {
            let next = current.saturating_add(by);
            match self.elapsed.compare_exchange(current, next) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Jump to an absolute elapsed value regardless of running state
    pub fn set_elapsed(&self, elapsed: Duration) {
        self.elapsed.store(elapsed);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        self.elapsed.load()
    }

    fn start(&self) {
        self.running.store(true, Ordering::Release);
    }

    fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn reset(&self) {
        self.running.store(false, Ordering::Release);
        self.elapsed.store(Duration::ZERO);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}
