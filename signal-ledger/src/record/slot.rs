/// A single signal's delivery bookkeeping
use chrono::{DateTime, Local, TimeZone};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, AtomicU64, Ordering};

/// Sender id recorded when the kernel did not say who sent the signal.
pub const UNKNOWN_SENDER: i32 = -1;

const NEVER_OBSERVED: i64 = i64::MIN;

/// Delivery state of one signal number.
///
/// The handler writes `count` and the sender first and raises `pending`
/// last; the deferred processor only reads the other fields of a slot whose
/// `pending` it has just taken, so it never sees a half-written delivery.
#[derive(Debug)]
pub struct SignalSlot {
    count: AtomicU64,
    pending: AtomicBool,
    last_sender: AtomicI32,
    last_observed_ms: AtomicI64,
}

impl SignalSlot {
    pub const fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            pending: AtomicBool::new(false),
            last_sender: AtomicI32::new(UNKNOWN_SENDER),
            last_observed_ms: AtomicI64::new(NEVER_OBSERVED),
        }
    }

    /// Handler side of the protocol. Returns the new delivery count.
    pub(crate) fn mark_delivered(&self, sender: i32) -> u64 {
        let count = self.count.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        self.last_sender.store(sender, Ordering::Relaxed);
        self.pending.store(true, Ordering::Release);
        count
    }

    /// Clear `pending`, reporting whether it was set.
    pub(crate) fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn mark_observed(&self, at: DateTime<Local>) {
        self.last_observed_ms
            .store(at.timestamp_millis(), Ordering::Release);
    }

    pub(crate) fn clear(&self) {
        self.pending.store(false, Ordering::Release);
        self.count.store(0, Ordering::Relaxed);
        self.last_sender.store(UNKNOWN_SENDER, Ordering::Relaxed);
        self.last_observed_ms.store(NEVER_OBSERVED, Ordering::Relaxed);
    }

    /// Total deliveries since process start.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Sender of the most recent delivery. A burst may have overwritten
    /// earlier senders before anyone looked.
    pub fn last_sender(&self) -> Option<i32> {
        match self.last_sender.load(Ordering::Acquire) {
            UNKNOWN_SENDER => None,
            pid => Some(pid),
        }
    }

    /// When the deferred processor last drained this slot.
    pub fn last_observed(&self) -> Option<DateTime<Local>> {
        match self.last_observed_ms.load(Ordering::Acquire) {
            NEVER_OBSERVED => None,
            ms => Local.timestamp_millis_opt(ms).single(),
        }
    }
}

impl Default for SignalSlot {
    fn default() -> Self {
        Self::new()
    }
}
