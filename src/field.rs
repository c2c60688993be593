//! Metaball field sampling: per-cell influence of every visible blob,
//! dominant-blob selection, and the double power-curve shaping that turns
//! raw influence into a soft-edged silhouette.

use std::f32::consts::PI;

use crate::blob::Blob;
use crate::noise::NoiseField;

/// Terminal cells are roughly twice as tall as wide; one grid cell spans
/// `cell_px` horizontally and `cell_px * CELL_ASPECT` vertically.
pub(crate) const CELL_ASPECT: f32 = 2.0;

/// Coarse reject on raw influence: clearly-outside cells skip shaping.
pub(crate) const COARSE_THRESHOLD: f32 = 0.05;
/// Fine reject on the shaped value: below this, nothing renders.
pub(crate) const FINE_THRESHOLD: f32 = 0.08;

const EPSILON: f32 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct FieldCell {
    pub(crate) raw: f32,
    pub(crate) shaped: f32,
    pub(crate) dominant: Option<usize>,
}

impl FieldCell {
    fn empty() -> Self {
        Self {
            raw: 0.0,
            shaped: 0.0,
            dominant: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct FieldGrid {
    pub(crate) cols: usize,
    pub(crate) rows: usize,
    pub(crate) cells: Vec<FieldCell>,
}

impl FieldGrid {
    pub(crate) fn at(&self, x: usize, y: usize) -> &FieldCell {
        &self.cells[y * self.cols + x]
    }
}

/// Raw influence of one blob at a point, including the angular noise
/// distortion that breaks the circular silhouette.
pub(crate) fn influence_at(blob: &Blob, px: f32, py: f32, t: f32, noise: &NoiseField) -> f32 {
    let dx = px - blob.pos.x;
    let dy = py - blob.pos.y;
    let d2 = (dx * dx + dy * dy).max(1.0);
    let p = &blob.params;

    let angle = dy.atan2(dx);
    let n1 = noise.sample(
        blob.pos.x * 0.01 + angle.cos() * 0.8,
        blob.pos.y * 0.01 + angle.sin() * 0.8,
        t * 0.3 + blob.phase,
    );
    let n2 = noise.sample(
        blob.pos.x * 0.01 + angle.cos() * 1.7,
        blob.pos.y * 0.01 + angle.sin() * 1.7,
        t * 0.21 + blob.phase * 0.5,
    );
    let distortion = (n1 * PI).sin() * (n2 * PI).cos();

    let numerator = blob.cached_strength.max(0.0)
        * blob.params.size_scale.max(0.05)
        * (1.0 + p.blobbiness.max(0.0) * 0.3 * distortion)
        * p.density.max(0.0);

    numerator / (d2 * p.spread.max(0.05) + EPSILON)
}

/// Double power curve: sharpens influence into a near-binary boundary while
/// keeping the edge soft. Monotone, with shape(0)=0 and shape(1)=1.
pub(crate) fn shape(influence: f32, gamma: f32) -> f32 {
    let i = influence.clamp(0.0, 1.0);
    let g = gamma.max(0.1);
    1.0 - (1.0 - i.powf(g)).powf(g)
}

/// Evaluate the whole grid against all visible blobs. `t` is the simulation
/// clock (frozen while paused, so paused frames are identical).
pub(crate) fn sample_grid(
    blobs: &[Blob],
    cols: usize,
    rows: usize,
    cell_px: f32,
    t: f32,
    noise: &NoiseField,
) -> FieldGrid {
    let mut cells = vec![FieldCell::empty(); cols * rows];

    for y in 0..rows {
        let py = (y as f32 + 0.5) * cell_px * CELL_ASPECT;
        for x in 0..cols {
            let px = (x as f32 + 0.5) * cell_px;

            let mut best = 0.0f32;
            let mut owner: Option<usize> = None;
            for (i, blob) in blobs.iter().enumerate() {
                if !blob.params.visible {
                    continue;
                }
                let v = influence_at(blob, px, py, t, noise);
                if v > best {
                    best = v;
                    owner = Some(i);
                }
            }

            if best <= COARSE_THRESHOLD {
                continue;
            }
            let Some(idx) = owner else { continue };
            let shaped = shape(best, blobs[idx].params.gradient_strength);
            if shaped <= FINE_THRESHOLD {
                continue;
            }
            cells[y * cols + x] = FieldCell {
                raw: best,
                shaped,
                dominant: Some(idx),
            };
        }
    }

    FieldGrid { cols, rows, cells }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::Vec2;
    use crate::config::VisualParams;

    fn test_blob() -> Blob {
        let mut b = Blob::new(0, "center", &VisualParams::default());
        b.pos = Vec2::new(200.0, 200.0);
        b.cached_strength = b.params.blob_strength;
        // No silhouette distortion so distance is the only variable.
        b.params.blobbiness = 0.0;
        b
    }

    #[test]
    fn influence_decreases_with_distance() {
        let b = test_blob();
        let noise = NoiseField::new(1);
        let mut prev = f32::INFINITY;
        for d in [2.0f32, 5.0, 10.0, 30.0, 80.0, 200.0] {
            let v = influence_at(&b, 200.0 + d, 200.0, 0.0, &noise);
            assert!(v < prev, "influence not decreasing at d={d}");
            prev = v;
        }
    }

    #[test]
    fn influence_survives_zero_distance() {
        let b = test_blob();
        let noise = NoiseField::new(1);
        let v = influence_at(&b, 200.0, 200.0, 0.0, &noise);
        assert!(v.is_finite() && v > 0.0);
    }

    #[test]
    fn shape_endpoints_and_monotonicity() {
        for gamma in [0.5f32, 1.0, 2.2, 4.0] {
            assert_eq!(shape(0.0, gamma), 0.0);
            assert!((shape(1.0, gamma) - 1.0).abs() < 1e-6);
            let mut prev = -1.0f32;
            for i in 0..=50 {
                let v = shape(i as f32 / 50.0, gamma);
                assert!(v >= prev, "shape not monotone at gamma={gamma}");
                prev = v;
            }
        }
    }

    #[test]
    fn shape_clamps_overdriven_influence() {
        assert!((shape(25.0, 2.2) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn grid_marks_dominant_blob() {
        let mut a = test_blob();
        a.pos = Vec2::new(100.0, 100.0);
        let mut b = test_blob();
        b.id = 1;
        b.pos = Vec2::new(700.0, 100.0);
        let noise = NoiseField::new(1);

        let grid = sample_grid(&[a, b], 100, 25, 8.0, 0.0, &noise);
        // Cell under blob a's center: x = 100/8 = 12, y = 100/16 = 6.
        assert_eq!(grid.at(12, 6).dominant, Some(0));
        // Cell under blob b's center.
        assert_eq!(grid.at(87, 6).dominant, Some(1));
    }

    #[test]
    fn invisible_blobs_contribute_nothing() {
        let mut a = test_blob();
        a.params.visible = false;
        let noise = NoiseField::new(1);
        let grid = sample_grid(&[a], 50, 25, 8.0, 0.0, &noise);
        assert!(grid.cells.iter().all(|c| c.dominant.is_none()));
    }

    #[test]
    fn far_cells_are_empty() {
        let a = test_blob(); // at (200, 200)
        let noise = NoiseField::new(1);
        let grid = sample_grid(&[a], 100, 25, 8.0, 0.0, &noise);
        assert_eq!(grid.at(99, 24).dominant, None);
    }
}
