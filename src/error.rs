// SPDX-License-Identifier: GPL-3.0-or-later

//! Stable error currency for the whole crate.
//!
//! The numeric codes mirror the C HAL this scheduler is modeled on
//! (`Success = 0`, `InvalidParam = -1`, ... `LaneOffline = -7`) so that an
//! external collaborator speaking the C-compatible ABI can still recover a
//! familiar integer from [`HalError::code`].

use thiserror::Error;

/// Every fallible operation in this crate returns this error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HalError {
    /// A caller-supplied argument was malformed or out of range, or an
    /// unknown job id was used. No slot is consumed and no counter moves.
    #[error("invalid parameter")]
    InvalidParam,
    /// Allocation failure in a context that cannot recover from it.
    #[error("out of memory")]
    NoMemory,
    /// A `wait` call exceeded its wall-clock deadline, or a worker exceeded
    /// its job's `wcet_us` budget.
    #[error("operation timed out")]
    Timeout,
    /// The simulated substrate reported a fault while executing a job.
    #[error("hardware fault")]
    Hardware,
    /// The lane's slot table is full; retry or reduce concurrency.
    #[error("lane is busy")]
    Busy,
    /// The requested operation is not available on this lane in its
    /// current state (e.g. FPGA submission before a bitstream is loaded).
    #[error("operation not supported")]
    NotSupported,
    /// The lane has not been initialized, or was shut down.
    #[error("lane is offline")]
    LaneOffline,
}

impl HalError {
    /// The stable numeric code for this error, matching the C HAL's
    /// `hal_error_t` values.
    pub const fn code(self) -> i32 {
        match self {
            HalError::InvalidParam => -1,
            HalError::NoMemory => -2,
            HalError::Timeout => -3,
            HalError::Hardware => -4,
            HalError::Busy => -5,
            HalError::NotSupported => -6,
            HalError::LaneOffline => -7,
        }
    }
}

/// Success sentinel matching the C HAL's `HAL_SUCCESS = 0`, exposed for
/// collaborators that want the full set of stable values rather than just
/// the error ones.
pub const SUCCESS_CODE: i32 = 0;

/// A specialized `Result` bound to [`HalError`].
pub type HalResult<T> = std::result::Result<T, HalError>;
