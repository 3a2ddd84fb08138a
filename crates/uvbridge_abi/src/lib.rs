//! # UVBRIDGE ABI
//!
//! Binary struct codecs for the atlas engine's C interface.
//!
//! ## Layout Rules
//!
//! 1. **Fixed offsets** - every field lives at a hard-coded byte offset
//! 2. **Little-endian, natural alignment** - structs start on 4-byte boundaries
//! 3. **Booleans are tail bytes** - read as `!= 0`, written as `0` or `1`
//! 4. **Addresses stay raw** - arrays are decoded separately, never followed eagerly
//! 5. **Full initialization** - encoding zeroes the whole struct before writing fields
//!
//! ## Example
//!
//! ```rust,ignore
//! use uvbridge_abi::{PackOptions, StructCodec};
//!
//! let options = PackOptions { resolution: 1024, ..PackOptions::default() };
//! options.encode(&mut memory, scratch)?;
//! let back = PackOptions::decode(&memory, scratch)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod arrays;
pub mod codec;
pub mod enums;
pub mod error;
pub mod records;

pub use arrays::{
    read_f32_array, read_flags, read_index_array, read_u32_array, read_u8_array, write_index_array,
};
pub use codec::{decode_array, encode_array, FieldReader, FieldWriter, StructCodec};
pub use enums::{AddMeshError, ChartType, IndexFormat, ProgressCategory};
pub use error::{AbiError, AbiResult};
pub use records::{
    AtlasHeader, Chart, ChartOptions, Mesh, MeshDecl, PackOptions, UvMeshDecl, Vertex,
};

pub use uvbridge_memory::Address;
