//! # Engine Enumerations
//!
//! All enums are stored as `u32` in engine memory.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Parameterization used for a chart.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartType {
    /// Planar projection.
    #[default]
    Planar = 0,
    /// Orthogonal projection.
    Ortho = 1,
    /// Least squares conformal map.
    Lscm = 2,
    /// Piecewise parameterization.
    Piecewise = 3,
    /// Chart could not be parameterized.
    Invalid = 4,
}

impl ChartType {
    /// Converts from the raw ABI value.
    #[must_use]
    pub const fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Planar),
            1 => Some(Self::Ortho),
            2 => Some(Self::Lscm),
            3 => Some(Self::Piecewise),
            4 => Some(Self::Invalid),
            _ => None,
        }
    }

    /// Returns the raw ABI value.
    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self as u32
    }
}

/// Width of the entries in an index buffer.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexFormat {
    /// 16-bit indices.
    #[default]
    UInt16 = 0,
    /// 32-bit indices.
    UInt32 = 1,
}

impl IndexFormat {
    /// Converts from the raw ABI value.
    #[must_use]
    pub const fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::UInt16),
            1 => Some(Self::UInt32),
            _ => None,
        }
    }

    /// Returns the raw ABI value.
    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self as u32
    }

    /// Size of one index in bytes.
    #[inline]
    #[must_use]
    pub const fn index_size(self) -> u32 {
        match self {
            Self::UInt16 => 2,
            Self::UInt32 => 4,
        }
    }
}

/// Result of an add-mesh or add-UV-mesh call.
///
/// Anything but [`AddMeshError::Success`] means the mesh was not added and
/// the atlas is unchanged.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddMeshError {
    /// The mesh was added.
    Success = 0,
    /// Unspecified failure.
    Error = 1,
    /// An index is >= the declared vertex count.
    IndexOutOfRange = 2,
    /// A face has fewer than 3 vertices.
    InvalidFaceVertexCount = 3,
    /// Index count not divisible by 3 and no per-face vertex counts given.
    InvalidIndexCount = 4,
}

impl AddMeshError {
    /// Converts from the raw ABI value.
    ///
    /// Unknown codes collapse to [`AddMeshError::Error`].
    #[must_use]
    pub const fn from_raw(value: u32) -> Self {
        match value {
            0 => Self::Success,
            2 => Self::IndexOutOfRange,
            3 => Self::InvalidFaceVertexCount,
            4 => Self::InvalidIndexCount,
            _ => Self::Error,
        }
    }

    /// Returns the raw ABI value.
    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self as u32
    }

    /// Returns true for [`AddMeshError::Success`].
    #[inline]
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// The engine's debug string for this code.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Error => "Error",
            Self::IndexOutOfRange => "IndexOutOfRange",
            Self::InvalidFaceVertexCount => "InvalidFaceVertexCount",
            Self::InvalidIndexCount => "InvalidIndexCount",
        }
    }
}

impl fmt::Display for AddMeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stage reported through the engine's progress hooks.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgressCategory {
    /// Mesh ingestion.
    AddMesh = 0,
    /// Chart computation.
    ComputeCharts = 1,
    /// Chart packing.
    PackCharts = 2,
    /// Output mesh construction.
    BuildOutputMeshes = 3,
}

impl ProgressCategory {
    /// All categories in pipeline order.
    pub const ALL: [Self; 4] = [
        Self::AddMesh,
        Self::ComputeCharts,
        Self::PackCharts,
        Self::BuildOutputMeshes,
    ];

    /// Converts from the raw ABI value.
    #[must_use]
    pub const fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::AddMesh),
            1 => Some(Self::ComputeCharts),
            2 => Some(Self::PackCharts),
            3 => Some(Self::BuildOutputMeshes),
            _ => None,
        }
    }

    /// Returns the raw ABI value.
    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self as u32
    }

    /// The engine's debug string for this category.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AddMesh => "AddMesh",
            Self::ComputeCharts => "ComputeCharts",
            Self::PackCharts => "PackCharts",
            Self::BuildOutputMeshes => "BuildOutputMeshes",
        }
    }
}

impl fmt::Display for ProgressCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_values_match_abi() {
        assert_eq!(ChartType::Piecewise.as_raw(), 3);
        assert_eq!(ChartType::from_raw(4), Some(ChartType::Invalid));
        assert_eq!(ChartType::from_raw(5), None);
        assert_eq!(IndexFormat::UInt32.as_raw(), 1);
        assert_eq!(IndexFormat::UInt16.index_size(), 2);
        assert_eq!(ProgressCategory::BuildOutputMeshes.as_raw(), 3);
    }

    #[test]
    fn test_add_mesh_error_codes() {
        for code in 0..5 {
            assert_eq!(AddMeshError::from_raw(code).as_raw(), code);
        }
        assert_eq!(AddMeshError::from_raw(99), AddMeshError::Error);
        assert!(AddMeshError::Success.is_success());
        assert!(!AddMeshError::InvalidIndexCount.is_success());
    }

    #[test]
    fn test_debug_strings() {
        assert_eq!(AddMeshError::IndexOutOfRange.to_string(), "IndexOutOfRange");
        assert_eq!(ProgressCategory::PackCharts.to_string(), "PackCharts");
    }
}
