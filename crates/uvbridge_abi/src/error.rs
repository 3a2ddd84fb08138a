//! # ABI Error Types

use thiserror::Error;
use uvbridge_memory::{Address, MemoryError};

/// Errors raised while decoding or encoding engine structs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    /// A struct or array was requested at the null address.
    #[error("absent data: {kind} at null address")]
    AbsentData {
        /// Struct or array kind.
        kind: &'static str,
    },

    /// A struct does not start on a 4-byte boundary.
    #[error("{kind} at {address} is not 4-byte aligned")]
    Misaligned {
        /// Struct kind.
        kind: &'static str,
        /// Offending address.
        address: Address,
    },

    /// An enumeration field holds a value the engine never writes.
    #[error("invalid {kind} value {value}")]
    InvalidEnum {
        /// Enumeration name.
        kind: &'static str,
        /// Raw value found in memory.
        value: u32,
    },

    /// An index does not fit the 16-bit index format.
    #[error("index {value} does not fit a 16-bit index buffer")]
    IndexOverflow {
        /// Offending index.
        value: u32,
    },

    /// The underlying memory access failed.
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Result type for codec operations.
pub type AbiResult<T> = Result<T, AbiError>;
