//! # Binding Configuration
//!
//! Optional TOML file that sizes the software engine's memory and overrides
//! chart and pack options on top of the engine's own defaults.
//!
//! ```toml
//! [memory]
//! initial_pages = 16
//! max_pages = 16384
//!
//! [chart]
//! max_chart_area = 4.0
//!
//! [pack]
//! resolution = 1024
//! padding = 2
//! ```
//!
//! Fields left out keep whatever the engine's initializer wrote.

use crate::error::{BindingError, BindingResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uvbridge_abi::{ChartOptions, PackOptions};
use uvbridge_engine::SoftEngine;

/// Linear memory sizing for the software engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    /// Pages mapped at startup.
    pub initial_pages: u32,
    /// Page ceiling; allocations past it fail.
    pub max_pages: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            initial_pages: 16,
            max_pages: 16_384,
        }
    }
}

/// Chart option overrides.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[allow(missing_docs)]
pub struct ChartOverrides {
    pub max_chart_area: Option<f32>,
    pub max_boundary_length: Option<f32>,
    pub normal_deviation_weight: Option<f32>,
    pub roundness_weight: Option<f32>,
    pub straightness_weight: Option<f32>,
    pub normal_seam_weight: Option<f32>,
    pub texture_seam_weight: Option<f32>,
    pub max_cost: Option<f32>,
    pub max_iterations: Option<u32>,
    pub use_input_mesh_uvs: Option<bool>,
    pub fix_winding: Option<bool>,
}

impl ChartOverrides {
    /// Writes every present override into `options`.
    pub fn apply(&self, options: &mut ChartOptions) {
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(value) = self.$field {
                    options.$field = value;
                })*
            };
        }
        set!(
            max_chart_area,
            max_boundary_length,
            normal_deviation_weight,
            roundness_weight,
            straightness_weight,
            normal_seam_weight,
            texture_seam_weight,
            max_cost,
            max_iterations,
            use_input_mesh_uvs,
            fix_winding
        );
    }
}

/// Pack option overrides.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[allow(missing_docs)]
pub struct PackOverrides {
    pub max_chart_size: Option<u32>,
    pub padding: Option<u32>,
    pub texels_per_unit: Option<f32>,
    pub resolution: Option<u32>,
    pub bilinear: Option<bool>,
    pub block_align: Option<bool>,
    pub brute_force: Option<bool>,
    pub create_image: Option<bool>,
    pub rotate_charts_to_axis: Option<bool>,
    pub rotate_charts: Option<bool>,
}

impl PackOverrides {
    /// Writes every present override into `options`.
    pub fn apply(&self, options: &mut PackOptions) {
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(value) = self.$field {
                    options.$field = value;
                })*
            };
        }
        set!(
            max_chart_size,
            padding,
            texels_per_unit,
            resolution,
            bilinear,
            block_align,
            brute_force,
            create_image,
            rotate_charts_to_axis,
            rotate_charts
        );
    }
}

/// Complete binding configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BindingConfig {
    /// `[memory]` section.
    pub memory: MemoryConfig,
    /// `[chart]` section.
    pub chart: ChartOverrides,
    /// `[pack]` section.
    pub pack: PackOverrides,
}

impl BindingConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::InvalidConfig`] on a parse error or an
    /// inconsistent value.
    pub fn from_toml_str(source: &str) -> BindingResult<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| BindingError::InvalidConfig(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::InvalidConfig`] if the file cannot be read or
    /// does not parse.
    pub fn from_path(path: impl AsRef<Path>) -> BindingResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            BindingError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!("loaded binding config from {}", path.display());
        Ok(config)
    }

    /// Serializes the configuration back to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::InvalidConfig`] if serialization fails.
    pub fn to_toml_string(&self) -> BindingResult<String> {
        toml::to_string(self)
            .map_err(|e| BindingError::InvalidConfig(format!("failed to serialize config: {e}")))
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::InvalidConfig`] describing the first violation.
    pub fn validate(&self) -> BindingResult<()> {
        let MemoryConfig { initial_pages, max_pages } = self.memory;
        if initial_pages == 0 || initial_pages > max_pages {
            return Err(BindingError::InvalidConfig(format!(
                "memory pages must satisfy 0 < initial_pages <= max_pages, got {initial_pages} / {max_pages}"
            )));
        }
        if max_pages > 65_536 {
            return Err(BindingError::InvalidConfig(format!(
                "max_pages {max_pages} exceeds the 4 GiB address space"
            )));
        }
        if let Some(tpu) = self.pack.texels_per_unit {
            if !tpu.is_finite() || tpu < 0.0 {
                return Err(BindingError::InvalidConfig(format!(
                    "texels_per_unit must be finite and non-negative, got {tpu}"
                )));
            }
        }
        if let Some(area) = self.chart.max_chart_area {
            if !area.is_finite() || area < 0.0 {
                return Err(BindingError::InvalidConfig(format!(
                    "max_chart_area must be finite and non-negative, got {area}"
                )));
            }
        }
        Ok(())
    }

    /// Builds a software engine sized by the `[memory]` section.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::Engine`] if the engine cannot start.
    pub fn build_engine(&self) -> BindingResult<SoftEngine> {
        Ok(SoftEngine::with_pages(
            self.memory.initial_pages,
            self.memory.max_pages,
        )?)
    }
}
