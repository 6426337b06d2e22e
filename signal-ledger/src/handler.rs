//! The async-signal-safe handler.
//!
//! Everything reachable from [`on_signal`] is restricted to atomics on the
//! record table, a copy into a stack buffer and a single `write(2)`. No
//! allocation, no locks, no formatting machinery.

use crate::error::SignalError;
use crate::record::{SignalRecordTable, UNKNOWN_SENDER};
use crate::util::{signal_name, SetupContext};
use nix::errno::Errno;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::os::fd::RawFd;
use std::os::raw::{c_int, c_void};
use std::ptr;
use std::sync::atomic::{AtomicI32, AtomicPtr, Ordering};

// The trampoline's view of the installed handler. Only `'static` tables are
// ever stored here.
static ACTIVE_TABLE: AtomicPtr<SignalRecordTable> = AtomicPtr::new(ptr::null_mut());
static OUTPUT_FD: AtomicI32 = AtomicI32::new(-1);

const RAW_PREFIX: &[u8] = b"  [handler] caught ";
const RAW_LINE_CAPACITY: usize = 64;

/// Where the handler writes its one raw line per delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerOutput {
    /// No raw output, only the record table is updated.
    #[default]
    Silent,
    /// An already open descriptor. It must stay open while handlers are
    /// installed.
    Fd(RawFd),
}

impl HandlerOutput {
    pub fn stdout() -> Self {
        HandlerOutput::Fd(libc::STDOUT_FILENO)
    }

    fn raw_fd(self) -> RawFd {
        match self {
            HandlerOutput::Silent => -1,
            HandlerOutput::Fd(fd) => fd,
        }
    }
}

/// The handler registered with the OS for every handled signal.
///
/// Owns nothing but a reference to the process-wide record table and the
/// raw output choice; installing it publishes both to the trampoline.
#[derive(Debug, Clone, Copy)]
pub struct SignalHandler {
    table: &'static SignalRecordTable,
    output: HandlerOutput,
}

impl SignalHandler {
    pub fn new(table: &'static SignalRecordTable, output: HandlerOutput) -> Self {
        Self { table, output }
    }

    pub fn table(&self) -> &'static SignalRecordTable {
        self.table
    }

    pub fn output(&self) -> HandlerOutput {
        self.output
    }

    /// Install the handler for `signal`.
    ///
    /// `handler_mask` is blocked, on top of `signal` itself, for as long as
    /// the handler runs.
    pub fn install(&self, signal: Signal, handler_mask: &SigSet) -> Result<(), SignalError> {
        self.publish();

        let action = SigAction::new(
            SigHandler::SigAction(on_signal),
            SaFlags::SA_SIGINFO | SaFlags::SA_RESTART,
            *handler_mask,
        );
        // SAFETY: `on_signal` only performs async-signal-safe operations:
        // atomic loads/stores on a 'static table and write(2).
        unsafe { sigaction(signal, &action) }
            .map(drop)
            .setup_context(|| format!("install handler for {signal}"))
    }

    fn publish(&self) {
        OUTPUT_FD.store(self.output.raw_fd(), Ordering::Release);
        ACTIVE_TABLE.store(ptr::from_ref(self.table).cast_mut(), Ordering::Release);
    }
}

extern "C" fn on_signal(signal: c_int, info: *mut libc::siginfo_t, _context: *mut c_void) {
    let saved_errno = Errno::last_raw();

    let table = ACTIVE_TABLE.load(Ordering::Acquire);
    // SAFETY: the pointer is either null or was published from a
    // `&'static SignalRecordTable`, which is never freed.
    if let Some(table) = unsafe { table.as_ref() } {
        if table.record(signal, sender_of(info)).is_some() {
            emit_raw(signal);
        }
    }

    Errno::set_raw(saved_errno);
}

fn sender_of(info: *const libc::siginfo_t) -> i32 {
    // SAFETY: with SA_SIGINFO the kernel hands us a valid siginfo_t (or
    // null, which `as_ref` handles).
    let Some(info) = (unsafe { info.as_ref() }) else {
        return UNKNOWN_SENDER;
    };
    // si_pid is only meaningful for kill/sigqueue-style sources and SIGCHLD.
    if info.si_code > 0 && info.si_signo != libc::SIGCHLD {
        return UNKNOWN_SENDER;
    }
    // SAFETY: the union member was checked against si_code above.
    unsafe { info.si_pid() }
}

fn emit_raw(signal: c_int) {
    let fd = OUTPUT_FD.load(Ordering::Acquire);
    if fd < 0 {
        return;
    }
    let line = RawLine::for_signal(signal);
    let bytes = line.as_bytes();
    // SAFETY: write(2) is async-signal-safe and `bytes` is valid for its
    // whole length. A short or failed write is deliberately ignored.
    let _ = unsafe { libc::write(fd, bytes.as_ptr().cast(), bytes.len()) };
}

/// The fixed-format line the handler writes, built on the stack.
#[derive(Clone, Copy)]
pub struct RawLine {
    buf: [u8; RAW_LINE_CAPACITY],
    len: usize,
}

impl RawLine {
    /// `  [handler] caught SIGINT (2)\n`
    pub fn for_signal(signal: c_int) -> Self {
        let mut line = RawLine {
            buf: [0; RAW_LINE_CAPACITY],
            len: 0,
        };
        line.push(RAW_PREFIX);
        line.push(signal_name(signal).as_bytes());
        line.push(b" (");
        line.push_number(signal);
        line.push(b")\n");
        line
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buf.get(..self.len).unwrap_or(&self.buf)
    }

    fn push(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            let Some(cell) = self.buf.get_mut(self.len) else {
                return;
            };
            *cell = byte;
            self.len += 1;
        }
    }

    fn push_number(&mut self, number: c_int) {
        if number < 0 {
            self.push(b"-");
        }
        let mut digits = [0u8; 10];
        let mut used = 0;
        let mut value = number.unsigned_abs();
        loop {
            if let Some(digit) = digits.get_mut(used) {
                *digit = b'0' + (value % 10) as u8;
                used += 1;
            }
            value /= 10;
            if value == 0 {
                break;
            }
        }
        for &digit in digits.iter().take(used).rev() {
            self.push(&[digit]);
        }
    }
}
