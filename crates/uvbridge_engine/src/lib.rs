//! # UVBRIDGE Engine
//!
//! A software atlas engine that speaks the compiled module's export surface
//! over a [`LinearBuffer`](uvbridge_memory::LinearBuffer).
//!
//! ## Pipeline
//!
//! ```text
//! add_mesh ──► SourceMesh ──► compute_charts ──► ChartPlan ──► pack ──► PackLayout ──► output::build
//!   (decl)      (copied)        (flood fill)       (2D)        (shelves)                (Mesh/Chart/Vertex)
//! ```
//!
//! The algorithms are deliberately plain: charts are connected faces that
//! share a material and a dominant normal axis, flattened by axis projection,
//! and packed row by row. What matters is that every record, array and
//! handle it produces follows the binary layout of the real engine.
//!
//! ## Example
//!
//! ```rust,ignore
//! use uvbridge_engine::SoftEngine;
//!
//! let mut engine = SoftEngine::with_pages(16, 1024)?;
//! let atlas = engine.create();
//! engine.add_mesh(atlas, decl, 1);
//! engine.generate(atlas, Address::NULL, Address::NULL);
//! engine.destroy(atlas);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod charts;
pub mod engine;
pub mod error;
pub mod heap;
pub mod output;
pub mod packer;
pub mod source;

pub use charts::{compute_charts, ChartPlan};
pub use engine::{ProgressFn, SoftEngine};
pub use error::{EngineError, EngineResult};
pub use heap::{EngineHeap, BLOCK_ALIGN, HEAP_BASE};
pub use packer::{pack, PackLayout, Placement};
pub use source::{Face, MeshKind, SourceMesh};
