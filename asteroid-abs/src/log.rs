/*!

A thin facade over `tracing` so that the interpreter crates never name the backing logging crate
directly. Every macro here takes a numeric verbosity level as its first argument; the event is
only actually emitted if the level is at or below the current global threshold (lower numbers are
more important, `0` always fires). This mirrors how verbosity is dialed up/down for debugging a
single subsystem of the walker without drowning in noise from everywhere else.

*/

use std::sync::atomic::{AtomicU8, Ordering};

static LOG_THRESHOLD: AtomicU8 = AtomicU8::new(1);

/// Set the global verbosity threshold. Calls to `debug!`/`trace!`/etc. with a level greater than
/// this threshold are suppressed before ever reaching `tracing`.
pub fn set_global_logging_threshold(level: u8) {
  LOG_THRESHOLD.store(level, Ordering::Relaxed);
}

pub fn get_global_logging_threshold() -> u8 {
  LOG_THRESHOLD.load(Ordering::Relaxed)
}

#[macro_export]
macro_rules! critical {
  ($($arg:tt)*) => {
    $crate::tracing::error!(target: "critical", $($arg)*);
  };
}

#[macro_export]
macro_rules! error {
  ($level:expr, $($arg:tt)*) => {
    if $level <= $crate::log::get_global_logging_threshold() {
      $crate::tracing::error!($($arg)*);
    }
  };
}

#[macro_export]
macro_rules! warning {
  ($level:expr, $($arg:tt)*) => {
    if $level <= $crate::log::get_global_logging_threshold() {
      $crate::tracing::warn!($($arg)*);
    }
  };
}

#[macro_export]
macro_rules! info {
  ($level:expr, $($arg:tt)*) => {
    if $level <= $crate::log::get_global_logging_threshold() {
      $crate::tracing::info!($($arg)*);
    }
  };
}

#[macro_export]
macro_rules! debug {
  ($level:expr, $($arg:tt)*) => {
    if $level <= $crate::log::get_global_logging_threshold() {
      $crate::tracing::debug!($($arg)*);
    }
  };
}

#[macro_export]
macro_rules! trace {
  ($level:expr, $($arg:tt)*) => {
    if $level <= $crate::log::get_global_logging_threshold() {
      $crate::tracing::trace!($($arg)*);
    }
  };
}

pub use crate::{critical, debug, error, info, trace, warning};
