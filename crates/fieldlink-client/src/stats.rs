//! Lock-free client counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ClientStats {
    pub(crate) connect_attempts: AtomicU64,
    pub(crate) connections_opened: AtomicU64,
    pub(crate) reconnects_scheduled: AtomicU64,
    pub(crate) frames_in: AtomicU64,
    pub(crate) frames_out: AtomicU64,
    pub(crate) malformed_frames: AtomicU64,
    pub(crate) dropped_sends: AtomicU64,
    pub(crate) handler_failures: AtomicU64,
}

/// Point-in-time copy of `ClientStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub connect_attempts: u64,
    pub connections_opened: u64,
    pub reconnects_scheduled: u64,
    pub frames_in: u64,
    pub frames_out: u64,
    pub malformed_frames: u64,
    pub dropped_sends: u64,
    pub handler_failures: u64,
}

impl ClientStats {
    pub(crate) fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            reconnects_scheduled: self.reconnects_scheduled.load(Ordering::Relaxed),
            frames_in: self.frames_in.load(Ordering::Relaxed),
            frames_out: self.frames_out.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            dropped_sends: self.dropped_sends.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
        }
    }
}
