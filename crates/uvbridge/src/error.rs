//! # Binding Error Types
//!
//! All errors the typed entry points can report. Declared add-mesh failures
//! are not errors: they come back as [`AddMeshError`](uvbridge_abi::AddMeshError)
//! values.

use thiserror::Error;
use uvbridge_abi::AbiError;
use uvbridge_engine::EngineError;
use uvbridge_memory::MemoryError;

/// Errors raised by the binding.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindingError {
    /// The engine's allocator returned null.
    #[error("engine out of memory: {requested} bytes requested")]
    OutOfMemory {
        /// Bytes requested.
        requested: u32,
    },

    /// Packing finished without output meshes; the engine ran out of memory
    /// building them.
    #[error("engine out of memory: no output built for {meshes} meshes")]
    OutputMissing {
        /// Meshes in the atlas.
        meshes: u32,
    },

    /// Charts were packed before any chart computation.
    #[error("pack requested before charts were computed")]
    ChartsNotComputed,

    /// A mesh index past the atlas's mesh count.
    #[error("mesh {index} out of range: atlas has {count} meshes")]
    MeshOutOfRange {
        /// Requested mesh.
        index: u32,
        /// Meshes in the atlas.
        count: u32,
    },

    /// A host array does not match the vertex or face count it belongs to.
    #[error("{what} has {actual} entries, expected {expected}")]
    LengthMismatch {
        /// Which array.
        what: &'static str,
        /// Entries expected.
        expected: usize,
        /// Entries supplied.
        actual: usize,
    },

    /// Invalid configuration file or value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A struct or array could not be decoded or encoded.
    #[error(transparent)]
    Abi(#[from] AbiError),

    /// A raw memory access failed.
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// The software engine could not be constructed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Result type for binding operations.
pub type BindingResult<T> = Result<T, BindingError>;
