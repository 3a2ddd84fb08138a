//! # Engine Error Types
//!
//! Internal failures of the software engine. None of these cross the export
//! surface: exported calls translate them into null addresses, error codes or
//! an unchanged atlas, the way a compiled engine would.

use thiserror::Error;
use uvbridge_abi::{AbiError, AddMeshError};
use uvbridge_memory::{Address, MemoryError};

/// Errors raised inside the software engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The allocator could not satisfy a request, even after growing memory.
    #[error("out of engine memory: {requested} bytes requested")]
    OutOfMemory {
        /// Bytes requested.
        requested: u32,
    },

    /// The handle is not a live atlas.
    #[error("unknown atlas handle {0}")]
    UnknownAtlas(Address),

    /// A mesh declaration was rejected.
    #[error("mesh rejected: {0}")]
    Rejected(AddMeshError),

    /// A record or array could not be decoded.
    #[error(transparent)]
    Abi(#[from] AbiError),

    /// A raw memory access failed.
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

impl EngineError {
    /// The add-mesh code this failure maps to.
    #[must_use]
    pub const fn add_mesh_code(&self) -> AddMeshError {
        match self {
            Self::Rejected(code) => *code,
            _ => AddMeshError::Error,
        }
    }
}

/// Result type for engine internals.
pub type EngineResult<T> = Result<T, EngineError>;
