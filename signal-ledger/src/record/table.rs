/// Fixed-size table of signal slots
use crate::record::slot::SignalSlot;
use std::os::raw::c_int;
use std::sync::atomic::{AtomicBool, Ordering};

/// One slot per signal number; Linux numbers signals 1..=64.
pub const SIGNAL_SLOTS: usize = 65;

/// The record table a process shares between its handler and its main line.
///
/// Lives for the whole process: create it once (usually through
/// [`SignalRecordTable::leak`]) and hand the same reference to the
/// [`SignalHandler`](crate::handler::SignalHandler) and to the
/// [`DeferredProcessor`](crate::processor::DeferredProcessor). After `fork`
/// each child owns an independent copy.
#[derive(Debug)]
pub struct SignalRecordTable {
    slots: [SignalSlot; SIGNAL_SLOTS],
    has_pending_work: AtomicBool,
}

impl SignalRecordTable {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| SignalSlot::new()),
            has_pending_work: AtomicBool::new(false),
        }
    }

    /// Allocate a table that is never freed, for the process lifetime.
    pub fn leak() -> &'static Self {
        Box::leak(Box::new(Self::new()))
    }

    /// Slot for a signal number, `None` for 0, negatives and anything past
    /// the table.
    pub fn slot(&self, signal: c_int) -> Option<&SignalSlot> {
        if signal < 1 {
            return None;
        }
        usize::try_from(signal)
            .ok()
            .and_then(|index| self.slots.get(index))
    }

    /// Record one delivery. This is the handler's whole job.
    ///
    /// Out-of-range numbers are a silent no-op returning `None`.
    pub fn record(&self, signal: c_int, sender: i32) -> Option<u64> {
        let count = self.slot(signal)?.mark_delivered(sender);
        self.has_pending_work.store(true, Ordering::Release);
        Some(count)
    }

    /// Cheap test for whether a drain could find anything.
    pub fn has_pending_work(&self) -> bool {
        self.has_pending_work.load(Ordering::Acquire)
    }

    /// Total deliveries of `signal`, 0 when out of range.
    pub fn count(&self, signal: c_int) -> u64 {
        self.slot(signal).map_or(0, SignalSlot::count)
    }

    /// Slots in ascending signal order, skipping the unused slot 0.
    pub fn iter(&self) -> impl Iterator<Item = (c_int, &SignalSlot)> {
        (1..).zip(self.slots.iter().skip(1))
    }

    /// Close a drain pass.
    ///
    /// The flag is cleared first and then raised again if any slot went
    /// pending after the pass looked at it.
    pub(crate) fn finish_drain(&self) {
        self.has_pending_work.store(false, Ordering::Release);
        if self.iter().any(|(_, slot)| slot.is_pending()) {
            self.has_pending_work.store(true, Ordering::Release);
        }
    }

    /// Forget everything. Only for process start, e.g. right after `fork`.
    pub fn reset(&self) {
        self.has_pending_work.store(false, Ordering::Release);
        for slot in &self.slots {
            slot.clear();
        }
    }
}

impl Default for SignalRecordTable {
    fn default() -> Self {
        Self::new()
    }
}
