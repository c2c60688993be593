//! Highlight placement: once per speaking turn, scatter colored-glyph
//! positions inside a blob's influence region so that every active emotion
//! is represented. Candidates mix polar sampling, a coarse grid sweep, and
//! uniform random fallback; acceptance uses a relaxed field threshold and a
//! minimum spacing that scales with grid density.

use std::collections::BTreeMap;

use rand::{rngs::StdRng, Rng};

use crate::blob::Blob;
use crate::field::{self, CELL_ASPECT, FINE_THRESHOLD};
use crate::noise::NoiseField;

/// Highlight acceptance threshold is 30% of the normal final threshold so
/// points can reach toward the blob's true edge.
pub(crate) const RELAXED_FACTOR: f32 = 0.3;

const ATTEMPTS_PER_POINT: usize = 40;

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct HighlightPoint {
    pub(crate) cell: (usize, usize),
    pub(crate) emotion_index: usize,
    /// Seed for animated per-point variation in the compositor.
    pub(crate) noise_offset: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Placement {
    pub(crate) points: Vec<HighlightPoint>,
    /// Points accepted via the best-influence fallback (spacing waived).
    pub(crate) fallback_count: usize,
    /// Spacing constraint the non-fallback points satisfy, in cells.
    pub(crate) min_distance: f32,
}

/// Total highlight count: base count scaled by the 0..200% character
/// amount, clamped so low-resolution grids stay visible and dense grids do
/// not flood.
pub(crate) fn target_count(
    circles_per_emotion: usize,
    emotion_char_amount: f32,
    cols: usize,
    rows: usize,
) -> usize {
    let cells = cols * rows;
    let lo = (cells / 1000).max(1);
    let hi = (cells / 40).max(4);
    let n = (circles_per_emotion as f32 * emotion_char_amount.clamp(0.0, 2.0)).round() as usize;
    n.clamp(lo, hi)
}

/// Convert a percentage distribution into integer per-emotion counts using
/// largest-remainder rounding. Returns `None` (round-robin fallback) when
/// the distribution references unknown labels (case-sensitive) or does not
/// sum to ~100.
pub(crate) fn emotion_counts(
    emotions: &[String],
    distribution: Option<&BTreeMap<String, f32>>,
    total: usize,
) -> Option<Vec<usize>> {
    let dist = distribution?;
    if emotions.is_empty() {
        return None;
    }
    if dist.keys().any(|k| !emotions.iter().any(|e| e == k)) {
        return None;
    }
    // Every entry must be a sane percentage; a negative value could cancel
    // out in the sum while inflating another emotion's count past `total`.
    if dist.values().any(|v| !v.is_finite() || *v < 0.0) {
        return None;
    }
    let sum: f32 = dist.values().sum();
    if !(99.0..=101.0).contains(&sum) {
        return None;
    }

    let mut counts = vec![0usize; emotions.len()];
    let mut remainders: Vec<(usize, f32)> = Vec::with_capacity(emotions.len());
    let mut assigned = 0usize;
    for (i, e) in emotions.iter().enumerate() {
        let pct = dist.get(e).copied().unwrap_or(0.0);
        let exact = total as f32 * pct / 100.0;
        counts[i] = exact.floor() as usize;
        assigned += counts[i];
        remainders.push((i, exact - exact.floor()));
    }
    // Leftovers go to the largest fractional remainders; ties resolve by
    // emotion order so the result is deterministic.
    remainders.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let mut leftover = total.saturating_sub(assigned);
    for (i, _) in remainders {
        if leftover == 0 {
            break;
        }
        counts[i] += 1;
        leftover -= 1;
    }
    Some(counts)
}

fn cell_dist(a: (usize, usize), b: (usize, usize)) -> f32 {
    let dx = a.0 as f32 - b.0 as f32;
    let dy = a.1 as f32 - b.1 as f32;
    (dx * dx + dy * dy).sqrt()
}

/// Place highlights for one blob. Never returns an empty set when
/// `emotions` is non-empty and the target count is positive: exhausted
/// attempt budgets fall back to the best-influence candidate seen.
#[allow(clippy::too_many_arguments)]
pub(crate) fn place(
    blob: &Blob,
    cols: usize,
    rows: usize,
    cell_px: f32,
    t: f32,
    noise: &NoiseField,
    emotions: &[String],
    distribution: Option<&BTreeMap<String, f32>>,
    circles_per_emotion: usize,
    emotion_char_amount: f32,
    rng: &mut StdRng,
) -> Placement {
    if emotions.is_empty() || circles_per_emotion == 0 || cols == 0 || rows == 0 {
        return Placement::default();
    }

    let total = target_count(circles_per_emotion, emotion_char_amount, cols, rows);
    let counts = emotion_counts(emotions, distribution, total);

    // Emotion assignment order is fixed up front: contiguous blocks for a
    // valid distribution, round-robin otherwise.
    let assignment: Vec<usize> = match &counts {
        Some(counts) => {
            let mut v = Vec::with_capacity(total);
            for (i, &c) in counts.iter().enumerate() {
                v.extend(std::iter::repeat(i).take(c));
            }
            v
        }
        None => (0..total).map(|i| i % emotions.len()).collect(),
    };

    // Spacing relaxes as point density rises so sparse grids are not
    // over-constrained.
    let area_per_point = (cols * rows) as f32 / total.max(1) as f32;
    let min_distance = (area_per_point.sqrt() * 0.35).clamp(1.0, 8.0);

    let relaxed = FINE_THRESHOLD * RELAXED_FACTOR;
    let center = (
        blob.pos.x / cell_px,
        blob.pos.y / (cell_px * CELL_ASPECT),
    );
    let reach = (blob.home_radius / cell_px).max(3.0);

    let shaped_at = |cell: (usize, usize)| -> f32 {
        let px = (cell.0 as f32 + 0.5) * cell_px;
        let py = (cell.1 as f32 + 0.5) * cell_px * CELL_ASPECT;
        let raw = field::influence_at(blob, px, py, t, noise);
        field::shape(raw, blob.params.gradient_strength)
    };

    let mut points: Vec<HighlightPoint> = Vec::with_capacity(assignment.len());
    let mut fallback_count = 0usize;
    let sweep_step = (cols.max(rows) / 8).max(1);

    for (i, &emotion_index) in assignment.iter().enumerate() {
        let mut chosen: Option<(usize, usize)> = None;
        let mut best: Option<((usize, usize), f32)> = None;

        for attempt in 0..ATTEMPTS_PER_POINT {
            let frac = attempt as f32 / ATTEMPTS_PER_POINT as f32;
            let cand = if frac < 0.7 {
                // Polar around the blob center, radius growing near -> far.
                let radius = reach * (0.15 + 0.85 * (frac / 0.7));
                let angle = rng.gen_range(0.0..std::f32::consts::TAU);
                let cx = center.0 + angle.cos() * radius;
                let cy = center.1 + angle.sin() * radius * 0.5;
                (
                    cx.round().clamp(0.0, cols as f32 - 1.0) as usize,
                    cy.round().clamp(0.0, rows as f32 - 1.0) as usize,
                )
            } else if frac < 0.9 {
                // Coarse systematic sweep over the grid.
                let k = i * ATTEMPTS_PER_POINT + attempt;
                (
                    (k * sweep_step * 7 + 3) % cols,
                    (k * sweep_step * 3 + 1) % rows,
                )
            } else {
                (rng.gen_range(0..cols), rng.gen_range(0..rows))
            };

            let v = shaped_at(cand);
            if best.map(|(_, bv)| v > bv).unwrap_or(true) {
                best = Some((cand, v));
            }
            if v > relaxed
                && points.iter().all(|p| cell_dist(p.cell, cand) >= min_distance)
            {
                chosen = Some(cand);
                break;
            }
        }

        let cell = match chosen {
            Some(c) => c,
            None => {
                // Placement must never come up empty: take the strongest
                // candidate even if it violates spacing.
                fallback_count += 1;
                best.map(|(c, _)| c).unwrap_or((
                    center.0.round().clamp(0.0, cols as f32 - 1.0) as usize,
                    center.1.round().clamp(0.0, rows as f32 - 1.0) as usize,
                ))
            }
        };

        points.push(HighlightPoint {
            cell,
            emotion_index,
            noise_offset: rng.gen_range(0.0..100.0),
        });
    }

    Placement {
        points,
        fallback_count,
        min_distance,
    }
}
