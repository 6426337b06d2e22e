//! Deferred processing of recorded deliveries.
//!
//! All the work a handler is not allowed to do (formatting, timestamps,
//! buffered I/O, logging) happens here, on the normal execution path.

use crate::error::SignalError;
use crate::policy::ProcessRole;
use crate::record::SignalRecordTable;
use crate::util::signal_name;
use chrono::{DateTime, Local};
use nix::unistd::Pid;
use std::fmt;
use std::io::{self, Write};
use std::os::raw::c_int;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// One drained slot, as reported to the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalRecord {
    pub role: ProcessRole,
    pub pid: Pid,
    pub signal: c_int,
    pub sender: Option<i32>,
    /// Cumulative deliveries at the time of the drain.
    pub count: u64,
    pub observed_at: DateTime<Local>,
}

impl SignalRecord {
    pub fn name(&self) -> &'static str {
        signal_name(self.signal)
    }
}

impl fmt::Display for SignalRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} pid={}] {} ({}) from pid ",
            self.role,
            self.pid,
            self.name(),
            self.signal
        )?;
        match self.sender {
            Some(sender) => write!(f, "{sender}")?,
            None => write!(f, "unknown")?,
        }
        write!(
            f,
            ", count={}, observed {}",
            self.count,
            self.observed_at.format(TIMESTAMP_FORMAT)
        )
    }
}

/// Drains the record table from ordinary execution context.
///
/// Never call [`drain`](DeferredProcessor::drain) from a signal handler.
pub struct DeferredProcessor<'t, W: Write = io::Stdout> {
    table: &'t SignalRecordTable,
    sink: W,
    role: ProcessRole,
    pid: Pid,
    /// Records taken from the table whose line has not reached the sink.
    unwritten: Vec<SignalRecord>,
}

impl<'t> DeferredProcessor<'t, io::Stdout> {
    pub fn stdout(table: &'t SignalRecordTable, role: ProcessRole, pid: Pid) -> Self {
        Self::new(table, io::stdout(), role, pid)
    }
}

impl<'t, W: Write> DeferredProcessor<'t, W> {
    pub fn new(table: &'t SignalRecordTable, sink: W, role: ProcessRole, pid: Pid) -> Self {
        Self {
            table,
            sink,
            role,
            pid,
            unwritten: Vec::new(),
        }
    }

    /// Process every pending slot once, in ascending signal order.
    ///
    /// Returns immediately when nothing was recorded since the last pass.
    /// Repeated deliveries of one signal between two passes produce a
    /// single record carrying the cumulative count. A delivery that lands
    /// while the pass runs is left pending for the next call.
    ///
    /// If the sink fails, the records whose line was not written are kept
    /// and go out first on the next call, which also returns them.
    pub fn drain(&mut self) -> Result<Vec<SignalRecord>, SignalError> {
        if self.unwritten.is_empty() && !self.table.has_pending_work() {
            return Ok(Vec::new());
        }

        let mut records = std::mem::take(&mut self.unwritten);
        for (signal, slot) in self.table.iter() {
            // Take the flag before reading: a delivery arriving after this
            // point sets it again instead of being cleared unseen.
            if !slot.take_pending() {
                continue;
            }
            let observed_at = Local::now();
            slot.mark_observed(observed_at);
            records.push(SignalRecord {
                role: self.role,
                pid: self.pid,
                signal,
                sender: slot.last_sender(),
                count: slot.count(),
                observed_at,
            });
        }
        self.table.finish_drain();

        let mut written = 0;
        while let Some(record) = records.get(written) {
            if let Err(err) = writeln!(self.sink, "{record}") {
                self.unwritten = records.split_off(written);
                return Err(err.into());
            }
            log::debug!("drained {record}");
            written += 1;
        }
        self.sink.flush()?;
        Ok(records)
    }

    /// Records held back by a failed write.
    pub fn unwritten(&self) -> &[SignalRecord] {
        &self.unwritten
    }

    pub fn table(&self) -> &'t SignalRecordTable {
        self.table
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn into_sink(self) -> W {
        self.sink
    }
}
