//! Glyph and color selection for every thresholded cell: colored emotion
//! highlights with activity-driven liveliness, plain density glyphs for the
//! rest, plus the connection line and debug overlay.

use std::collections::HashMap;
use std::f32::consts::{PI, TAU};

use crate::blob::Blob;
use crate::config::{GlyphSets, VisualConfig};
use crate::engine::SimContext;
use crate::field::{FieldGrid, CELL_ASPECT};
use crate::highlight::Placement;
use crate::noise::NoiseField;
use crate::render::{Cell, Diff, Rgb, NEUTRAL_GRAY};

const WHITE: Rgb = Rgb { r: 255, g: 255, b: 255 };

/// Overall liveliness of a blob right now: normalized field strength plus
/// smoothed audio plus a coherent motion wobble.
fn activity(blob: &Blob, noise: &NoiseField, t: f32) -> f32 {
    let strength_norm = ((blob.cached_strength / blob.params.blob_strength.max(1e-3)) - 0.9)
        .clamp(0.0, 1.0);
    let wobble = noise.sample(blob.pos.x * 0.02, blob.pos.y * 0.02, t * 0.5);
    ((strength_norm + blob.smoothed_audio + wobble) / 3.0 * 1.5).clamp(0.0, 1.0)
}

/// Per-frame highlight lookup. Static placements get activity-tiered drift
/// (organic noise offset at medium activity, pull toward a virtual moving
/// center at high activity) and humor jitter, all noise-driven so a frozen
/// clock yields a frozen layout.
fn highlight_map(
    blobs: &[Blob],
    placements: &[Placement],
    noise: &NoiseField,
    t: f32,
    cols: usize,
    rows: usize,
    cell_px: f32,
) -> HashMap<(usize, usize), (usize, usize)> {
    let mut map = HashMap::new();
    for (bi, placement) in placements.iter().enumerate() {
        let Some(blob) = blobs.get(bi) else { continue };
        if !blob.params.visible {
            continue;
        }
        let a = activity(blob, noise, t);
        let bcx = blob.pos.x / cell_px;
        let bcy = blob.pos.y / (cell_px * CELL_ASPECT);

        for (pi, point) in placement.points.iter().enumerate() {
            let mut cx = point.cell.0 as f32;
            let mut cy = point.cell.1 as f32;

            if a >= 0.7 {
                // Virtual moving center inside the blob drags points along.
                let vx = bcx + (t * 1.7 + point.noise_offset).cos() * 3.0;
                let vy = bcy + (t * 1.3 + point.noise_offset).sin() * 1.5;
                cx += (vx - cx) * 0.3;
                cy += (vy - cy) * 0.3;
            } else if a >= 0.35 {
                cx += noise.sample_signed(point.noise_offset, t * 0.6, 1.3) * 1.2;
                cy += noise.sample_signed(t * 0.6, point.noise_offset, 4.9) * 0.8;
            }

            let humor = blob.params.humor.max(0.0);
            if humor > 0.0 {
                cx += noise.sample_signed(point.noise_offset * 2.1, t * 1.1, 6.2) * humor * 0.4;
                cy += noise.sample_signed(t * 1.1, point.noise_offset * 2.1, 8.4) * humor * 0.3;
                if humor > 3.0 {
                    cx += noise.sample_signed(point.noise_offset, t * 2.3, 2.7) * humor * 0.3;
                }
            }

            let cell = (
                cx.round().clamp(0.0, cols as f32 - 1.0) as usize,
                cy.round().clamp(0.0, rows as f32 - 1.0) as usize,
            );
            map.entry(cell).or_insert((bi, pi));
        }
    }
    map
}

/// Mixed spatial-distribution scheme: which of the blob's active emotions
/// shows at this cell. Varies by position so emotions co-occur across the
/// blob instead of clustering.
fn emotion_index_for_cell(
    cell: (usize, usize),
    blob: &Blob,
    noise_offset: f32,
    t: f32,
    cell_px: f32,
) -> usize {
    let n = blob.emotions.len().max(1);
    let bcx = blob.pos.x / cell_px;
    let bcy = blob.pos.y / (cell_px * CELL_ASPECT);
    let dx = cell.0 as f32 - bcx;
    let dy = cell.1 as f32 - bcy;
    match (cell.0 + cell.1) % 4 {
        0 => {
            let angle = dy.atan2(dx);
            (((angle + PI) / TAU * n as f32) as usize) % n
        }
        1 => {
            let reach = (blob.home_radius / cell_px).max(1.0);
            let dist = (dx * dx + dy * dy).sqrt();
            ((dist / reach * n as f32) as usize) % n
        }
        2 => ((cell.0 / 3) + (cell.1 / 2)) % n,
        _ => ((t * 0.8 + noise_offset) as usize) % n,
    }
}

fn apply_blur(color: Rgb, blur: f32, bg: Rgb) -> Rgb {
    let opacity = (1.0 - blur * 0.15).clamp(0.2, 1.0);
    Rgb::lerp(bg, color, opacity)
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn compose(
    diff: &mut Diff,
    grid: &FieldGrid,
    blobs: &[Blob],
    placements: &[Placement],
    ctx: &SimContext,
    cfg: &VisualConfig,
    glyphs: &GlyphSets,
    noise: &NoiseField,
    cell_px: f32,
    origin: (u16, u16),
) {
    let t = ctx.time;
    let bg = cfg.background;
    let highlights = highlight_map(blobs, placements, noise, t, grid.cols, grid.rows, cell_px);
    let flash_on = ctx.flash && (t * 2.0).fract() < 0.2;

    for y in 0..grid.rows {
        for x in 0..grid.cols {
            let sample = grid.at(x, y);
            let Some(bi) = sample.dominant else { continue };
            let blob = &blobs[bi];

            let highlight = highlights
                .get(&(x, y))
                .filter(|(hb, _)| *hb == bi)
                .copied();

            let cell = match highlight {
                Some((_, pi)) if !blob.emotions.is_empty() => {
                    let point = &placements[bi].points[pi];
                    colored_cell(sample.shaped, (x, y), blob, point.noise_offset, ctx, glyphs, t, bg, cell_px, flash_on)
                }
                _ => plain_cell(sample.shaped, blob, glyphs, t, bg),
            };

            diff.set_next(origin.0 + x as u16, origin.1 + y as u16, cell);
        }
    }

    if cfg.connection_line {
        draw_connection_line(diff, grid, blobs, bg, cell_px, origin);
    }
    if ctx.debug {
        draw_debug_overlay(diff, blobs, cell_px, bg, origin, grid.cols, grid.rows);
    }
}

#[allow(clippy::too_many_arguments)]
fn colored_cell(
    shaped: f32,
    cell: (usize, usize),
    blob: &Blob,
    noise_offset: f32,
    ctx: &SimContext,
    glyphs: &GlyphSets,
    t: f32,
    bg: Rgb,
    cell_px: f32,
    flash_on: bool,
) -> Cell {
    let idx = emotion_index_for_cell(cell, blob, noise_offset, t, cell_px);
    let emotion_color = blob
        .emotions
        .get(idx)
        .and_then(|label| ctx.emotion_colors.get(label).copied())
        .or_else(|| blob.colors.get(idx).copied())
        .unwrap_or(NEUTRAL_GRAY);

    let a = {
        // Same activity score the drift uses, recomputed cheaply here from
        // cached state.
        let strength_norm = ((blob.cached_strength / blob.params.blob_strength.max(1e-3)) - 0.9)
            .clamp(0.0, 1.0);
        ((strength_norm + blob.smoothed_audio + shaped) / 3.0 * 1.5).clamp(0.0, 1.0)
    };

    let weight = 0.45 + 0.5 * a;
    let mut color = Rgb::lerp(blob.base_color(), emotion_color, weight);

    // Activity-tiered glyph pool: calm blobs reuse a couple of glyphs, lively
    // ones draw from the whole set.
    let pool = glyphs.colored.len().max(1);
    let avail = ((pool as f32 * (0.3 + 0.7 * a) * blob.params.colored_glyph_size.max(0.1))
        .round() as usize)
        .clamp(1, pool);
    let gi = ((noise_offset * 7.3 + t * (0.5 + a * 2.0)) as usize) % avail;
    let ch = glyphs.colored.get(gi).copied().unwrap_or('●');

    color = apply_blur(color, blob.params.blur, bg);
    if flash_on {
        color = WHITE;
    }

    Cell { ch, fg: color, bg }
}

fn plain_cell(shaped: f32, blob: &Blob, glyphs: &GlyphSets, t: f32, bg: Rgb) -> Cell {
    let ramp = &glyphs.plain;
    let level = (shaped * blob.params.glyph_size.max(0.1)).clamp(0.0, 1.0);
    let last = ramp.len().saturating_sub(1);
    let gi = ((level * last as f32).round() as usize).min(last);
    let ch = ramp.get(gi).copied().unwrap_or('·');

    let mut color = blob.base_color().scale(0.35 + 0.65 * shaped);

    let shine = blob.params.shine.max(0.0);
    if shine > 0.0 {
        color = color.scale(1.0 + shine * 0.12);
        if shine > 2.0 {
            color = Rgb::lerp(color, WHITE, (0.05 * shine).min(0.4));
        }
        if shine > 4.0 {
            color = color.scale(0.85 + 0.15 * (t * 6.0).sin().abs());
        }
    }

    color = apply_blur(color, blob.params.blur, bg);
    Cell { ch, fg: color, bg }
}

/// Faint dotted line between the two speakers, drawn only over cells the
/// field left empty.
fn draw_connection_line(
    diff: &mut Diff,
    grid: &FieldGrid,
    blobs: &[Blob],
    bg: Rgb,
    cell_px: f32,
    origin: (u16, u16),
) {
    let (Some(a), Some(b)) = (blobs.first(), blobs.get(1)) else {
        return;
    };
    if !a.params.visible || !b.params.visible {
        return;
    }
    let steps = 24;
    for s in 1..steps {
        let f = s as f32 / steps as f32;
        let px = a.pos.x + (b.pos.x - a.pos.x) * f;
        let py = a.pos.y + (b.pos.y - a.pos.y) * f;
        let x = (px / cell_px) as usize;
        let y = (py / (cell_px * CELL_ASPECT)) as usize;
        if x >= grid.cols || y >= grid.rows || grid.at(x, y).dominant.is_some() {
            continue;
        }
        let color = Rgb::lerp(a.base_color(), b.base_color(), f).scale(0.35);
        diff.set_next(
            origin.0 + x as u16,
            origin.1 + y as u16,
            Cell { ch: '·', fg: color, bg },
        );
    }
}

fn draw_debug_overlay(
    diff: &mut Diff,
    blobs: &[Blob],
    cell_px: f32,
    bg: Rgb,
    origin: (u16, u16),
    cols: usize,
    rows: usize,
) {
    for blob in blobs {
        let color = Rgb::new(120, 130, 150);
        for k in 0..48 {
            let ang = k as f32 / 48.0 * TAU;
            let px = blob.home.x + ang.cos() * blob.home_radius;
            let py = blob.home.y + ang.sin() * blob.home_radius;
            let x = (px / cell_px).round();
            let y = (py / (cell_px * CELL_ASPECT)).round();
            if x < 0.0 || y < 0.0 || x as usize >= cols || y as usize >= rows {
                continue;
            }
            diff.set_next(
                origin.0 + x as u16,
                origin.1 + y as u16,
                Cell { ch: '◦', fg: color, bg },
            );
        }
        let hx = (blob.home.x / cell_px).round();
        let hy = (blob.home.y / (cell_px * CELL_ASPECT)).round();
        if hx >= 0.0 && hy >= 0.0 && (hx as usize) < cols && (hy as usize) < rows {
            let ch = char::from_digit(blob.id as u32 % 10, 10).unwrap_or('?');
            diff.set_next(
                origin.0 + hx as u16,
                origin.1 + hy as u16,
                Cell { ch, fg: WHITE, bg },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::Vec2;
    use crate::config::VisualParams;

    fn speaking_blob() -> Blob {
        let mut b = Blob::new(0, "center", &VisualParams::default());
        b.pos = Vec2::new(200.0, 160.0);
        b.home = b.pos;
        b.cached_strength = b.params.blob_strength;
        b.emotions = vec!["joy".to_string(), "anger".to_string()];
        b.colors = vec![Rgb::new(255, 200, 60), Rgb::new(230, 60, 50)];
        b
    }

    #[test]
    fn plain_glyph_ramp_is_monotone() {
        let blob = speaking_blob();
        let glyphs = GlyphSets::default();
        let bg = Rgb::new(0, 0, 0);
        let lo = plain_cell(0.1, &blob, &glyphs, 0.0, bg);
        let hi = plain_cell(1.0, &blob, &glyphs, 0.0, bg);
        let pos = |c: char| glyphs.plain.iter().position(|&g| g == c).unwrap();
        assert!(pos(hi.ch) > pos(lo.ch));
    }

    #[test]
    fn blur_attenuates_toward_background() {
        let mut blob = speaking_blob();
        let glyphs = GlyphSets::default();
        let bg = Rgb::new(0, 0, 0);
        let clear = plain_cell(0.9, &blob, &glyphs, 0.0, bg);
        blob.params.blur = 4.0;
        let blurred = plain_cell(0.9, &blob, &glyphs, 0.0, bg);
        assert!(u32::from(blurred.fg.r) < u32::from(clear.fg.r));
    }

    #[test]
    fn emotion_index_is_always_in_range() {
        let blob = speaking_blob();
        for x in 0..40 {
            for y in 0..20 {
                let idx = emotion_index_for_cell((x, y), &blob, 12.5, 3.7, 8.0);
                assert!(idx < blob.emotions.len());
            }
        }
    }

    #[test]
    fn activity_is_bounded() {
        let mut blob = speaking_blob();
        let noise = NoiseField::new(1);
        for _ in 0..40 {
            blob.set_audio(1.0);
        }
        blob.cached_strength = blob.params.blob_strength * 2.0;
        let a = activity(&blob, &noise, 5.0);
        assert!((0.0..=1.0).contains(&a));
    }
}
