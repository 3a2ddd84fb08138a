//! # Shelf Packer
//!
//! Places chart rectangles into one growing atlas, or into as many
//! fixed-size sub-atlases as needed when a resolution is given.
//!
//! ## Rules
//!
//! - Texel density comes from `texels_per_unit`, or is estimated so the charts
//!   roughly fill the resolution (1024 when no resolution is set)
//! - Rectangles carry `padding` texels on every side; bilinear packing needs
//!   at least one
//! - `block_align` rounds rectangles up to 4x4 texel blocks
//! - `max_chart_size` and the fixed resolution scale oversized charts down
//! - `rotate_charts` lays tall charts on their side
//! - `brute_force` tries several shelf widths and keeps the smallest atlas

use crate::charts::ChartPlan;
use uvbridge_abi::PackOptions;

/// Edge length used to estimate texel density when no resolution is set.
pub const DEFAULT_ESTIMATE_RESOLUTION: u32 = 1024;

/// Share of the atlas the density estimate aims to cover.
const TARGET_FILL: f32 = 0.6;

/// Largest chart edge, and largest padding, in texels.
pub const MAX_CHART_TEXELS: u32 = 1 << 16;

/// Where one chart landed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Sub-atlas index.
    pub atlas: u32,
    /// Left edge of the chart, inside the padding.
    pub x: u32,
    /// Top edge of the chart, inside the padding.
    pub y: u32,
    /// Chart width in texels.
    pub width: u32,
    /// Chart height in texels.
    pub height: u32,
    /// Texels per world unit for this chart.
    pub texel_scale: f32,
    /// The chart was turned a quarter turn.
    pub rotated: bool,
}

impl Placement {
    /// Maps a chart-local coordinate (world units, relative to the chart's
    /// lower corner) to atlas texels.
    #[must_use]
    pub fn to_texels(&self, local: [f32; 2], extent: [f32; 2]) -> [f32; 2] {
        let [u, v] = [local[0] * self.texel_scale, local[1] * self.texel_scale];
        let [u, v] = if self.rotated {
            [v, extent[0] * self.texel_scale - u]
        } else {
            [u, v]
        };
        #[allow(clippy::cast_precision_loss)]
        let origin = [self.x as f32, self.y as f32];
        [origin[0] + u, origin[1] + v]
    }
}

/// Outcome of one pack.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PackLayout {
    /// Atlas width in texels.
    pub width: u32,
    /// Atlas height in texels.
    pub height: u32,
    /// Number of sub-atlases; 0 unless the resolution was fixed.
    pub atlas_count: u32,
    /// Density the charts were packed with.
    pub texels_per_unit: f32,
    /// One placement per chart, in chart order.
    pub placements: Vec<Placement>,
    /// Used area per sub-atlas, normalized.
    pub utilization: Vec<f32>,
}

impl PackLayout {
    /// Number of image layers, at least one.
    #[inline]
    #[must_use]
    pub fn layers(&self) -> u32 {
        self.atlas_count.max(1)
    }
}

/// One rectangle awaiting placement.
#[derive(Clone, Copy, Debug)]
struct Rect {
    chart: usize,
    width: u32,
    height: u32,
    outer_width: u32,
    outer_height: u32,
    texel_scale: f32,
    rotated: bool,
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn texels(length: f32, scale: f32) -> u32 {
    (length * scale).ceil().max(1.0) as u32
}

/// Estimates a texel density that fills about `TARGET_FILL` of the atlas.
#[must_use]
pub fn estimate_texels_per_unit(charts: &[ChartPlan], resolution: u32) -> f32 {
    let target = if resolution > 0 { resolution } else { DEFAULT_ESTIMATE_RESOLUTION };
    let area: f32 = charts.iter().map(ChartPlan::bounds_area).sum();
    if area <= 0.0 {
        return 1.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let target = target as f32;
    target * (TARGET_FILL / area).sqrt()
}

fn measure(charts: &[ChartPlan], options: &PackOptions, texels_per_unit: f32, pad: u32) -> Vec<Rect> {
    charts
        .iter()
        .enumerate()
        .map(|(chart, plan)| {
            let [ew, eh] = plan.extent();
            let mut scale = texels_per_unit;
            let mut limit = MAX_CHART_TEXELS;
            if options.max_chart_size > 0 {
                limit = limit.min(options.max_chart_size);
            }
            if options.resolution > 0 {
                limit = limit.min(options.resolution.saturating_sub(pad.saturating_mul(2)).max(1));
            }
            let longest = ew.max(eh);
            if texels(longest, scale) > limit {
                #[allow(clippy::cast_precision_loss)]
                let fit = limit as f32;
                scale = fit / longest;
            }

            let (mut width, mut height) = (texels(ew, scale).min(limit), texels(eh, scale).min(limit));
            let rotated = options.rotate_charts && height > width;
            if rotated {
                std::mem::swap(&mut width, &mut height);
            }

            let mut outer_width = width + 2 * pad;
            let mut outer_height = height + 2 * pad;
            if options.block_align {
                outer_width = outer_width.next_multiple_of(4);
                outer_height = outer_height.next_multiple_of(4);
            }
            Rect { chart, width, height, outer_width, outer_height, texel_scale: scale, rotated }
        })
        .collect()
}

/// Shelf-packs `rects` into bins `bin_width` wide; bins are `bin_height` tall
/// or unbounded. Returns placements and the used width/height per bin.
fn shelf_pack(
    rects: &[Rect],
    pad: u32,
    bin_width: u32,
    bin_height: Option<u32>,
) -> (Vec<Placement>, Vec<(u32, u32)>) {
    let mut order: Vec<usize> = (0..rects.len()).collect();
    order.sort_by(|&a, &b| {
        rects[b]
            .outer_height
            .cmp(&rects[a].outer_height)
            .then(rects[b].outer_width.cmp(&rects[a].outer_width))
            .then(a.cmp(&b))
    });

    let mut placements = vec![None; rects.len()];
    let mut bins: Vec<(u32, u32)> = vec![(0, 0)];
    let (mut x, mut y, mut shelf) = (0u32, 0u32, 0u32);

    for i in order {
        let rect = rects[i];
        if x > 0 && x.saturating_add(rect.outer_width) > bin_width {
            x = 0;
            y = y.saturating_add(shelf);
            shelf = 0;
        }
        if let Some(limit) = bin_height {
            if y > 0 && y.saturating_add(rect.outer_height) > limit {
                bins.push((0, 0));
                x = 0;
                y = 0;
                shelf = 0;
            }
        }

        let bin = bins.len() - 1;
        placements[rect.chart] = Some(Placement {
            atlas: u32::try_from(bin).unwrap_or(u32::MAX),
            x: x.saturating_add(pad),
            y: y.saturating_add(pad),
            width: rect.width,
            height: rect.height,
            texel_scale: rect.texel_scale,
            rotated: rect.rotated,
        });
        x = x.saturating_add(rect.outer_width);
        shelf = shelf.max(rect.outer_height);
        let used = &mut bins[bin];
        used.0 = used.0.max(x);
        used.1 = used.1.max(y.saturating_add(shelf));
    }

    (placements.into_iter().flatten().collect(), bins)
}

#[allow(clippy::cast_precision_loss)]
fn utilization(rects: &[Rect], placements: &[Placement], layers: u32, width: u32, height: u32) -> Vec<f32> {
    let mut used = vec![0u64; layers as usize];
    for (rect, placement) in rects.iter().zip(placements) {
        used[placement.atlas as usize] += u64::from(rect.width) * u64::from(rect.height);
    }
    let total = u64::from(width) * u64::from(height);
    used.into_iter()
        .map(|u| if total == 0 { 0.0 } else { u as f32 / total as f32 })
        .collect()
}

/// Packs `charts` with `options`.
#[must_use]
pub fn pack(charts: &[ChartPlan], options: &PackOptions) -> PackLayout {
    let texels_per_unit = if options.texels_per_unit > 0.0 {
        options.texels_per_unit
    } else {
        estimate_texels_per_unit(charts, options.resolution)
    };
    let pad = options.padding.max(u32::from(options.bilinear)).min(MAX_CHART_TEXELS);
    let rects = measure(charts, options, texels_per_unit, pad);

    if options.resolution > 0 {
        let resolution = options.resolution;
        let (placements, bins) = shelf_pack(&rects, pad, resolution, Some(resolution));
        let atlas_count = u32::try_from(bins.len()).unwrap_or(u32::MAX);
        let utilization = utilization(&rects, &placements, atlas_count, resolution, resolution);
        return PackLayout {
            width: resolution,
            height: resolution,
            atlas_count,
            texels_per_unit,
            placements,
            utilization,
        };
    }

    if rects.is_empty() {
        return PackLayout { texels_per_unit, utilization: vec![0.0], ..PackLayout::default() };
    }

    let area: u64 = rects
        .iter()
        .map(|r| u64::from(r.outer_width) * u64::from(r.outer_height))
        .sum();
    let widest = rects.iter().map(|r| r.outer_width).max().unwrap_or(1);
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let side = (area as f64).sqrt().ceil() as u32;
    let candidates: Vec<u32> = if options.brute_force {
        [100u32, 125, 150, 200]
            .iter()
            .map(|p| (side.saturating_mul(*p) / 100).max(widest))
            .collect()
    } else {
        vec![side.max(widest)]
    };

    let (placements, bins) = candidates
        .into_iter()
        .map(|width| shelf_pack(&rects, pad, width, None))
        .min_by_key(|(_, bins)| {
            let (w, h) = bins[0];
            (u64::from(w) * u64::from(h), w.abs_diff(h))
        })
        .unwrap_or_default();
    let (width, height) = bins.first().copied().unwrap_or((0, 0));
    let utilization = utilization(&rects, &placements, 1, width, height);

    PackLayout {
        width,
        height,
        atlas_count: 0,
        texels_per_unit,
        placements,
        utilization,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uvbridge_abi::ChartType;

    fn square(size: f32) -> ChartPlan {
        ChartPlan {
            mesh: 0,
            faces: vec![0],
            material: 0,
            chart_type: ChartType::Planar,
            vertices: vec![0, 1, 2],
            coords: vec![[0.0, 0.0], [size, 0.0], [0.0, size]],
            min: [0.0, 0.0],
            max: [size, size],
        }
    }

    fn exact(texels_per_unit: f32) -> PackOptions {
        PackOptions {
            texels_per_unit,
            bilinear: false,
            rotate_charts: false,
            ..PackOptions::default()
        }
    }

    #[test]
    fn test_single_chart_fills_atlas() {
        let layout = pack(&[square(1.0)], &exact(16.0));
        assert_eq!((layout.width, layout.height), (16, 16));
        assert_eq!(layout.atlas_count, 0);
        assert_eq!(layout.placements[0].x, 0);
        assert!((layout.utilization[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_padding_surrounds_charts() {
        let options = PackOptions { padding: 2, ..exact(16.0) };
        let layout = pack(&[square(1.0)], &options);
        assert_eq!((layout.width, layout.height), (20, 20));
        assert_eq!((layout.placements[0].x, layout.placements[0].y), (2, 2));
    }

    #[test]
    fn test_fixed_resolution_spills_into_sub_atlases() {
        let options = PackOptions { resolution: 16, ..exact(10.0) };
        let layout = pack(&[square(1.0), square(1.0), square(1.0)], &options);
        assert_eq!((layout.width, layout.height), (16, 16));
        assert_eq!(layout.atlas_count, 3);
        assert_eq!(layout.utilization.len(), 3);
        assert_eq!(layout.placements[2].atlas, 2);
    }

    #[test]
    fn test_oversized_chart_is_scaled_to_fit() {
        let options = PackOptions { max_chart_size: 8, ..exact(100.0) };
        let layout = pack(&[square(1.0)], &options);
        assert_eq!(layout.placements[0].width, 8);
        assert!((layout.placements[0].texel_scale - 8.0).abs() < 1e-4);
    }

    #[test]
    fn test_block_align_rounds_rectangles() {
        let options = PackOptions { block_align: true, ..exact(5.0) };
        let layout = pack(&[square(1.0)], &options);
        assert_eq!((layout.width, layout.height), (8, 8));
    }

    #[test]
    fn test_rotation_lays_tall_charts_down() {
        let mut tall = square(1.0);
        tall.max = [1.0, 3.0];
        let options = PackOptions { rotate_charts: true, ..exact(4.0) };
        let layout = pack(&[tall.clone()], &options);
        let placement = layout.placements[0];
        assert!(placement.rotated);
        assert_eq!((placement.width, placement.height), (12, 4));
        assert_eq!(placement.to_texels([1.0, 3.0], tall.extent()), [12.0, 0.0]);
    }

    #[test]
    fn test_huge_density_is_clamped() {
        let options = PackOptions { brute_force: true, ..exact(1.0e10) };
        let layout = pack(&[square(1.0), square(1.0)], &options);
        for placement in &layout.placements {
            assert_eq!((placement.width, placement.height), (MAX_CHART_TEXELS, MAX_CHART_TEXELS));
            assert!(placement.texel_scale.is_finite());
        }
        let side = u64::from(MAX_CHART_TEXELS);
        assert_eq!(u64::from(layout.width) * u64::from(layout.height), 2 * side * side);
    }

    #[test]
    fn test_sliver_next_to_degenerate_chart() {
        let mut sliver = square(1.0);
        sliver.max = [1000.0, 1.0e-30];
        let mut point = square(1.0);
        point.max = [0.0, 0.0];

        let options = PackOptions { brute_force: true, ..exact(0.0) };
        let layout = pack(&[sliver, point], &options);
        assert!(layout.texels_per_unit > 1.0e9);
        assert_eq!(layout.placements[0].width, MAX_CHART_TEXELS);
        assert_eq!(layout.placements[1].width, 1);
    }

    #[test]
    fn test_huge_padding_is_clamped() {
        let options = PackOptions { padding: u32::MAX, resolution: 64, ..exact(8.0) };
        let layout = pack(&[square(1.0), square(1.0)], &options);
        assert_eq!(layout.placements.len(), 2);
        assert_eq!(layout.placements[0].width, 1);
        assert_eq!(layout.atlas_count, 2);
    }

    #[test]
    fn test_estimated_density_targets_resolution() {
        let tpu = estimate_texels_per_unit(&[square(2.0)], 512);
        assert!((tpu - 512.0 * (0.6f32 / 4.0).sqrt()).abs() < 1e-3);
        assert!((estimate_texels_per_unit(&[], 0) - 1.0).abs() < f32::EPSILON);
    }
}
