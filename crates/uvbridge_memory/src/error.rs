//! # Memory Error Types
//!
//! All faults the view manager can report.

use crate::address::Address;
use thiserror::Error;

/// Errors raised by linear memory accesses.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// The access would read or write past the current end of the buffer.
    #[error("access of {len} bytes at {address} is outside the {size}-byte buffer")]
    OutOfRange {
        /// Start of the access.
        address: Address,
        /// Length of the access in bytes.
        len: usize,
        /// Current buffer size in bytes.
        size: usize,
    },

    /// The address is not aligned for the requested element width.
    #[error("address {address} is not {align}-byte aligned")]
    Misaligned {
        /// Offending address.
        address: Address,
        /// Required alignment in bytes.
        align: usize,
    },

    /// The buffer refused to grow.
    #[error("cannot grow by {requested_pages} pages: {current_pages} of {max_pages} in use")]
    GrowFailed {
        /// Pages requested.
        requested_pages: u32,
        /// Pages currently committed.
        current_pages: u32,
        /// Hard page ceiling.
        max_pages: u32,
    },

    /// Page limits passed at construction are inconsistent.
    #[error("initial page count {initial} exceeds maximum {max}")]
    InvalidPageLimits {
        /// Requested initial pages.
        initial: u32,
        /// Requested ceiling.
        max: u32,
    },

    /// A C string ran to the end of memory without a NUL byte.
    #[error("string at {0} has no terminating NUL")]
    Unterminated(Address),
}

/// Result type for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
