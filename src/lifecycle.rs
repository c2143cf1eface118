//! Per-source retry lifecycle.
//!
//! The tuple `(auto_update, is_failed, status, retries)` on a [`Source`] is the
//! whole state. A success always returns the source to healthy. A retryable
//! failure spends one retry while any remain, and disables the source once
//! [`MAX_RETRIES`] is exhausted. A non-retryable failure disables it at once.
//! Only [`reset`] brings a disabled source back.

use crate::model::Source;
use crate::source::FetchError;

/// Consecutive retryable failures tolerated before auto-update is switched off.
pub const MAX_RETRIES: u32 = 3;

/// Status text recorded after a successful refresh.
pub const STATUS_OK: &str = "ok";

/// The result of one refresh attempt.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success,
    Failure(FetchError),
}

/// Coarse view of a source's lifecycle, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Healthy,
    Retrying { retries: u32 },
    Disabled,
}

impl Phase {
    pub fn of(source: &Source) -> Self {
        match (source.auto_update, source.is_failed) {
            (false, _) => Phase::Disabled,
            (true, false) => Phase::Healthy,
            (true, true) => Phase::Retrying {
                retries: source.retries,
            },
        }
    }
}

/// Record `outcome` on `source`.
pub fn apply(source: &mut Source, outcome: &Outcome) {
    match outcome {
        Outcome::Success => {
            source.auto_update = true;
            source.is_failed = false;
            source.retries = 0;
            source.status = STATUS_OK.to_string();
        }
        Outcome::Failure(err) => {
            source.is_failed = true;
            source.status = err.message.clone();

            if !err.is_retryable() {
                source.auto_update = false;
            } else if source.auto_update && source.retries < MAX_RETRIES {
                source.retries += 1;
            } else {
                // Exhausted, or already disabled: retries stay frozen.
                source.auto_update = false;
            }
        }
    }
}

/// Clear all failure state ahead of a manual refresh.
pub fn reset(source: &mut Source) {
    source.auto_update = true;
    source.is_failed = false;
    source.retries = 0;
    source.status.clear();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
