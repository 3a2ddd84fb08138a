//! # UVBRIDGE Memory
//!
//! Typed views over the single linear memory shared with the atlas engine.
//!
//! ## Architecture Rules
//!
//! 1. **One buffer, one view cache** - every accessor is keyed to the buffer identity
//! 2. **No stale views** - a grow bumps the identity and views are re-derived on next access
//! 3. **Checked alignment** - `u16` needs 2-byte, `u32`/`f32` need 4-byte aligned addresses
//!
//! ## Example
//!
//! ```rust,ignore
//! use uvbridge_memory::{Address, HeapBuffer, MemoryViews};
//!
//! let mut memory = MemoryViews::new(HeapBuffer::new(1, 16)?);
//! memory.write_f32(Address::new(64), &[0.0, 1.0, 2.0])?;
//! let floats = memory.read_f32(Address::new(64), 3)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

// Typed windows are zero-copy casts of the raw bytes.
#[cfg(target_endian = "big")]
compile_error!("uvbridge_memory requires a little-endian host");

pub mod address;
pub mod buffer;
pub mod error;
pub mod views;

pub use address::Address;
pub use buffer::{BufferIdentity, HeapBuffer, LinearBuffer, PAGE_SIZE};
pub use error::{MemoryError, MemoryResult};
pub use views::{MemoryViews, ViewLayout};
