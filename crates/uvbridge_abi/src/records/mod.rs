//! # Engine Records
//!
//! Host-side mirrors of every struct that crosses the boundary.
//!
//! ```text
//! ┌────────────────┬──────┬──────────────────────────────────────┐
//! │ Struct         │ Size │ Direction                            │
//! ├────────────────┼──────┼──────────────────────────────────────┤
//! │ MeshDecl       │  64  │ host -> engine (copied on add)       │
//! │ UvMeshDecl     │  32  │ host -> engine (copied on add)       │
//! │ ChartOptions   │  44  │ host -> engine                       │
//! │ PackOptions    │  24  │ host -> engine                       │
//! │ Chart          │  20  │ engine -> host                       │
//! │ Vertex         │  20  │ engine -> host                       │
//! │ Mesh           │  24  │ engine -> host                       │
//! │ AtlasHeader    │  36  │ engine -> host (prefix of a larger)  │
//! └────────────────┴──────┴──────────────────────────────────────┘
//! ```

mod declarations;
mod options;
mod output;

pub use declarations::{MeshDecl, UvMeshDecl};
pub use options::{ChartOptions, PackOptions};
pub use output::{AtlasHeader, Chart, Mesh, Vertex};
