//! Firmware console logging.
//!
//! Provides [`fwprint!`] / [`fwprintln!`] for raw console output and
//! [`fwlog!`] plus the leveled convenience macros (`fwinfo!`, `fwwarn!`, ...).
//! The platform registers its console with [`set_print_fn`] and
//! [`set_log_fn`] during early boot; until then all output is discarded, so
//! drivers may log unconditionally. Messages less severe than
//! [`max_level`] are dropped before they reach the sink.

use core::fmt;
use core::sync::atomic::{AtomicPtr, AtomicU8, Ordering};

// ---------------------------------------------------------------------------
// Log levels
// ---------------------------------------------------------------------------

/// Log severity level, lower is more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    /// The firmware cannot continue.
    Fatal = 0,
    /// An operation failed.
    Error = 1,
    /// Unexpected condition, handled.
    Warn = 2,
    /// Boot progress.
    Info = 3,
    /// Driver diagnostics.
    Debug = 4,
    /// Register-level tracing.
    Trace = 5,
}

impl LogLevel {
    /// Returns the fixed-width level tag.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fatal => "FATAL",
            Self::Error => "ERROR",
            Self::Warn => "WARN ",
            Self::Info => "INFO ",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Fatal,
            1 => Self::Error,
            2 => Self::Warn,
            3 => Self::Info,
            4 => Self::Debug,
            _ => Self::Trace,
        }
    }
}

static MAX_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Sets the least severe level that still reaches the log sink.
pub fn set_max_level(level: LogLevel) {
    MAX_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Returns the least severe level that still reaches the log sink.
pub fn max_level() -> LogLevel {
    LogLevel::from_u8(MAX_LEVEL.load(Ordering::Relaxed))
}

/// Returns `true` if messages at `level` are currently logged.
#[inline]
pub fn enabled(level: LogLevel) -> bool {
    level <= max_level()
}

// ---------------------------------------------------------------------------
// Raw print sink
// ---------------------------------------------------------------------------

/// Signature of the console print function.
pub type PrintFn = fn(fmt::Arguments<'_>);

fn null_print(_args: fmt::Arguments<'_>) {}

static PRINT_FN: AtomicPtr<()> = AtomicPtr::new(null_print as *mut ());

/// Registers the console print function.
///
/// # Safety
///
/// `f` must be callable from any firmware context, including trap handlers.
pub unsafe fn set_print_fn(f: PrintFn) {
    PRINT_FN.store(f as *mut (), Ordering::Release);
}

#[inline]
fn load_print_fn() -> PrintFn {
    let ptr = PRINT_FN.load(Ordering::Acquire);
    // SAFETY: only `PrintFn` pointers are ever stored into PRINT_FN.
    unsafe { core::mem::transmute::<*mut (), PrintFn>(ptr) }
}

/// Implementation detail of [`fwprint!`]. Not public API.
#[doc(hidden)]
pub fn _print(args: fmt::Arguments<'_>) {
    load_print_fn()(args);
}

/// Prints to the firmware console.
#[macro_export]
macro_rules! fwprint {
    ($($arg:tt)*) => { $crate::log::_print(format_args!($($arg)*)) };
}

/// Prints to the firmware console with a trailing newline.
#[macro_export]
macro_rules! fwprintln {
    () => { $crate::fwprint!("\n") };
    ($($arg:tt)*) => { $crate::fwprint!("{}\n", format_args!($($arg)*)) };
}

// ---------------------------------------------------------------------------
// Leveled log sink
// ---------------------------------------------------------------------------

/// Signature of the leveled log function.
pub type LogFn = fn(LogLevel, fmt::Arguments<'_>);

fn null_log(_level: LogLevel, _args: fmt::Arguments<'_>) {}

static LOG_FN: AtomicPtr<()> = AtomicPtr::new(null_log as *mut ());

/// Registers the leveled log function.
///
/// # Safety
///
/// Same requirements as [`set_print_fn`].
pub unsafe fn set_log_fn(f: LogFn) {
    LOG_FN.store(f as *mut (), Ordering::Release);
}

#[inline]
fn load_log_fn() -> LogFn {
    let ptr = LOG_FN.load(Ordering::Acquire);
    // SAFETY: only `LogFn` pointers are ever stored into LOG_FN.
    unsafe { core::mem::transmute::<*mut (), LogFn>(ptr) }
}

/// Implementation detail of [`fwlog!`]. Not public API.
#[doc(hidden)]
pub fn _log(level: LogLevel, args: fmt::Arguments<'_>) {
    if enabled(level) {
        load_log_fn()(level, args);
    }
}

/// Logs a message at the given level.
#[macro_export]
macro_rules! fwlog {
    ($level:expr, $($arg:tt)*) => {
        $crate::log::_log($level, format_args!($($arg)*))
    };
}

/// Logs a fatal-level message.
#[macro_export]
macro_rules! fwfatal {
    ($($arg:tt)*) => { $crate::fwlog!($crate::log::LogLevel::Fatal, $($arg)*) };
}

/// Logs an error-level message.
#[macro_export]
macro_rules! fwerr {
    ($($arg:tt)*) => { $crate::fwlog!($crate::log::LogLevel::Error, $($arg)*) };
}

/// Logs a warning-level message.
#[macro_export]
macro_rules! fwwarn {
    ($($arg:tt)*) => { $crate::fwlog!($crate::log::LogLevel::Warn, $($arg)*) };
}

/// Logs an info-level message.
#[macro_export]
macro_rules! fwinfo {
    ($($arg:tt)*) => { $crate::fwlog!($crate::log::LogLevel::Info, $($arg)*) };
}

/// Logs a debug-level message.
#[macro_export]
macro_rules! fwdebug {
    ($($arg:tt)*) => { $crate::fwlog!($crate::log::LogLevel::Debug, $($arg)*) };
}

/// Logs a trace-level message.
#[macro_export]
macro_rules! fwtrace {
    ($($arg:tt)*) => { $crate::fwlog!($crate::log::LogLevel::Trace, $($arg)*) };
}
