//! Change detection strategies for loaded blocks.
//!
//! A host that can report form mutations directly uses [`MutationObserver`]; anything else
//! falls back to [`IntervalPoll`], which is driven by the host calling `tick`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300);

static NEXT_INTERVAL: AtomicU64 = AtomicU64::new(1);

/// What the host environment can do for change detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapabilities {
    pub mutation_observer: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchStrategy {
    #[default]
    Observe,
    Poll { interval: Duration },
}

impl WatchStrategy {
    /// Observe when the host supports it, otherwise poll every `interval`
    pub fn for_host(capabilities: HostCapabilities, interval: Duration) -> Self {
        if capabilities.mutation_observer {
            WatchStrategy::Observe
        } else {
            WatchStrategy::Poll { interval }
        }
    }

    pub fn watcher(&self) -> Box<dyn ChangeWatcher> {
        match *self {
            WatchStrategy::Observe => Box::new(MutationObserver::default()),
            WatchStrategy::Poll { interval } => Box::new(IntervalPoll::new(interval)),
        }
    }
}

/// Decides when a block should compare its state against its initial snapshot
pub trait ChangeWatcher: fmt::Debug {
    fn start(&mut self);

    /// The host reported a mutation inside the block. Returns true if a comparison is due.
    fn on_mutation(&mut self) -> bool;

    /// Time advanced to `now`. Returns true if a comparison is due.
    fn on_tick(&mut self, now: Instant) -> bool;

    fn stop(&mut self);

    fn is_active(&self) -> bool;
}

#[derive(Debug, Default)]
pub struct MutationObserver {
    observing: bool,
}

impl ChangeWatcher for MutationObserver {
    fn start(&mut self) {
        self.observing = true;
    }

    fn on_mutation(&mut self) -> bool {
        self.observing
    }

    fn on_tick(&mut self, _now: Instant) -> bool {
        false
    }

    fn stop(&mut self) {
        self.observing = false;
    }

    fn is_active(&self) -> bool {
        self.observing
    }
}

/// Identifies a running poll interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntervalHandle(u64);

#[derive(Debug)]
pub struct IntervalPoll {
    interval: Duration,
    handle: Option<IntervalHandle>,
    next_due: Option<Instant>,
}

impl IntervalPoll {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            handle: None,
            next_due: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The running interval, if any
    pub fn handle(&self) -> Option<IntervalHandle> {
        self.handle
    }
}

impl ChangeWatcher for IntervalPoll {
    fn start(&mut self) {
        if self.handle.is_none() {
            self.handle = Some(IntervalHandle(NEXT_INTERVAL.fetch_add(1, Ordering::Relaxed)));
            self.next_due = None;
        }
    }

    fn on_mutation(&mut self) -> bool {
        false
    }

    fn on_tick(&mut self, now: Instant) -> bool {
        if self.handle.is_none() {
            return false;
        }

        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(now + self.interval);
                true
            }
            Some(_) => false,
            None => {
                // First tick arms the interval
                self.next_due = Some(now + self.interval);
                false
            }
        }
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            log::trace!("cleared poll interval {handle:?}");
        }
        self.next_due = None;
    }

    fn is_active(&self) -> bool {
        self.handle.is_some()
    }
}
