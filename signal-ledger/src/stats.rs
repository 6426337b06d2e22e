//! Final statistics and OS-level pending-set inspection.

use crate::error::SignalError;
use crate::processor::TIMESTAMP_FORMAT;
use crate::record::{SignalRecordTable, SIGNAL_SLOTS};
use crate::util::signal_name;
use chrono::{DateTime, Local};
use nix::errno::Errno;
use nix::unistd::Pid;
use std::fmt;
use std::mem::MaybeUninit;
use std::os::raw::c_int;

/// Snapshot of one signal with delivery history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSummary {
    pub signal: c_int,
    pub count: u64,
    pub last_sender: Option<i32>,
    pub last_observed: Option<DateTime<Local>>,
}

/// Every signal that was delivered at least once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalStats {
    entries: Vec<SlotSummary>,
}

impl SignalStats {
    pub fn collect(table: &SignalRecordTable) -> Self {
        let entries = table
            .iter()
            .filter(|(_, slot)| slot.count() > 0)
            .map(|(signal, slot)| SlotSummary {
                signal,
                count: slot.count(),
                last_sender: slot.last_sender(),
                last_observed: slot.last_observed(),
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[SlotSummary] {
        &self.entries
    }

    pub fn count(&self, signal: c_int) -> u64 {
        self.entries
            .iter()
            .find(|entry| entry.signal == signal)
            .map_or(0, |entry| entry.count)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for SignalStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Signal Reception Statistics ---")?;
        if self.entries.is_empty() {
            writeln!(f, "no signals received")?;
        }
        for entry in &self.entries {
            write!(
                f,
                "Signal {} ({}): received {} times",
                entry.signal,
                signal_name(entry.signal),
                entry.count
            )?;
            if let Some(sender) = entry.last_sender {
                write!(f, ", last from pid {sender}")?;
            }
            match entry.last_observed {
                Some(at) => writeln!(f, ", last observed {}", at.format(TIMESTAMP_FORMAT))?,
                None => writeln!(f, ", not drained yet")?,
            }
        }
        write!(f, "-----------------------------------")
    }
}

/// Signals blocked in the calling thread and waiting for delivery.
pub fn pending_signals() -> Result<Vec<c_int>, SignalError> {
    let mut set = MaybeUninit::<libc::sigset_t>::uninit();
    // SAFETY: sigemptyset initialises the set, sigpending fills it; both
    // only write through the pointer we own.
    let rc = unsafe {
        libc::sigemptyset(set.as_mut_ptr());
        libc::sigpending(set.as_mut_ptr())
    };
    if rc != 0 {
        return Err(SignalError::setup("read the pending signal set", Errno::last()));
    }
    // SAFETY: initialised by sigemptyset above.
    let set = unsafe { set.assume_init() };

    Ok((1..SIGNAL_SLOTS as c_int)
        // SAFETY: `set` is a valid, initialised sigset_t.
        .filter(|signal| unsafe { libc::sigismember(&set, *signal) } == 1)
        .collect())
}

/// `>> <tag> (pid=<pid>) pending: 2 3`
pub fn format_pending(tag: &str, pid: Pid, pending: &[c_int]) -> String {
    let mut line = format!(">> {tag} (pid={pid}) pending:");
    if pending.is_empty() {
        line.push_str(" none");
    }
    for signal in pending {
        line.push_str(&format!(" {signal}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_skips_untouched_slots() {
        let table = SignalRecordTable::new();
        table.record(libc::SIGINT, 100);
        table.record(libc::SIGINT, 101);
        table.record(libc::SIGHUP, 102);

        let stats = SignalStats::collect(&table);
        assert_eq!(stats.entries().len(), 2);
        assert_eq!(stats.count(libc::SIGINT), 2);
        assert_eq!(stats.count(libc::SIGHUP), 1);
        assert_eq!(stats.count(libc::SIGTERM), 0);
        assert_eq!(stats.entries()[0].signal, libc::SIGHUP);
    }

    #[test]
    fn test_display() {
        let table = SignalRecordTable::new();
        table.record(libc::SIGABRT, 55);

        let rendered = SignalStats::collect(&table).to_string();
        assert!(rendered.starts_with("--- Signal Reception Statistics ---\n"));
        assert!(rendered.contains(&format!(
            "Signal {} (SIGABRT): received 1 times, last from pid 55, not drained yet",
            libc::SIGABRT
        )));
        assert!(rendered.ends_with("-----------------------------------"));
    }

    #[test]
    fn test_display_empty() {
        let stats = SignalStats::collect(&SignalRecordTable::new());
        assert!(stats.is_empty());
        assert!(stats.to_string().contains("no signals received"));
    }

    #[test]
    fn test_format_pending() {
        let pid = Pid::from_raw(99);
        assert_eq!(format_pending("child", pid, &[]), ">> child (pid=99) pending: none");
        assert_eq!(
            format_pending("parent after children", pid, &[2, 3, 20]),
            ">> parent after children (pid=99) pending: 2 3 20"
        );
    }

    #[test]
    fn test_pending_signals_reads_without_error() {
        assert!(pending_signals().is_ok());
    }
}
