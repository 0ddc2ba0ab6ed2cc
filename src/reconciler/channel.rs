//! Per-channel in-flight tracking.
//!
//! A channel is one independent refresh stream (job list, statistics,
//! notification badge). Every fetch on a channel takes a numbered
//! [`Dispatch`]; the number decides which response wins, so ordering is by
//! dispatch rather than by arrival.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Jobs,
    Statistics,
    Notifications,
}

impl Channel {
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Jobs => "jobs",
            Channel::Statistics => "statistics",
            Channel::Notifications => "notifications",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct ChannelGuard {
    name: &'static str,
    in_flight: AtomicUsize,
    dispatched: AtomicU64,
}

impl ChannelGuard {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            in_flight: AtomicUsize::new(0),
            dispatched: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) > 0
    }

    /// Sequence number of the most recent dispatch (0 before the first).
    pub fn latest(&self) -> u64 {
        self.dispatched.load(Ordering::Acquire)
    }

    /// Start a fetch only if nothing is in flight. Returns `None` when busy;
    /// the caller drops its attempt rather than queueing it.
    pub fn try_begin(&self) -> Option<Dispatch<'_>> {
        self.in_flight
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(self.next_dispatch())
    }

    /// Start a fetch unconditionally. Anything already in flight on this
    /// channel becomes stale.
    pub fn begin_superseding(&self) -> Dispatch<'_> {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        self.next_dispatch()
    }

    fn next_dispatch(&self) -> Dispatch<'_> {
        let sequence = self.dispatched.fetch_add(1, Ordering::AcqRel) + 1;
        Dispatch {
            guard: self,
            sequence,
        }
    }
}

/// One in-flight fetch. Dropping it releases the channel.
pub struct Dispatch<'a> {
    guard: &'a ChannelGuard,
    sequence: u64,
}

impl Dispatch<'_> {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn channel(&self) -> &'static str {
        self.guard.name
    }

    /// True while no later dispatch has been issued on the channel.
    pub fn is_current(&self) -> bool {
        self.guard.latest() == self.sequence
    }
}

impl Drop for Dispatch<'_> {
    fn drop(&mut self) {
        self.guard.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
