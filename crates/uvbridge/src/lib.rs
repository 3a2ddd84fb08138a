//! # UVBRIDGE
//!
//! Typed entry points for a mesh atlasing engine that lives in linear
//! memory.
//!
//! ## Layers
//!
//! ```text
//! Atlas (session)          host slices in, host records out, scratch freed on every path
//!     │
//! AtlasExports (raw)       one call per engine export, addresses and codes only
//!     │
//! uvbridge_abi             fixed-layout struct codecs
//!     │
//! uvbridge_memory          typed views, reloaded when the buffer grows
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use uvbridge::{Atlas, BindingConfig, MeshInput};
//!
//! let mut engine = BindingConfig::default().build_engine()?;
//! let mut atlas = Atlas::new(&mut engine)?;
//! let code = atlas.add_mesh(&MeshInput { positions: &positions, ..Default::default() }, 1)?;
//! atlas.generate(None, None)?;
//! let uv = atlas.copy_uv(0)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod exports;
pub mod session;

pub use config::{BindingConfig, ChartOverrides, MemoryConfig, PackOverrides};
pub use error::{BindingError, BindingResult};
pub use exports::{add_mesh_error_name, progress_category_name, AtlasExports};
pub use session::{Atlas, AtlasStage, IndexData, MeshInput, UvCopy, UvMeshInput};

pub use uvbridge_abi::{
    AddMeshError, AtlasHeader, Chart, ChartOptions, ChartType, IndexFormat, Mesh, PackOptions,
    ProgressCategory, Vertex,
};
pub use uvbridge_engine::SoftEngine;
pub use uvbridge_memory::{Address, HeapBuffer, LinearBuffer, MemoryViews};
