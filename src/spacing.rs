//! Spacing resolution: converts a named or numeric spacing preference into
//! a pixel distance, a per-blob home anchor, and a movement-freedom radius.

use std::collections::BTreeMap;

use crate::blob::{Blob, Vec2};
use crate::config::Spacing;

pub(crate) const DEFAULT_SPACING_PX: f32 = 300.0;

/// Anchor moves beyond this trigger a one-shot transition target instead of
/// a teleport.
const ANCHOR_MOVE_THRESHOLD: f32 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SpacingTier {
    Together,
    Close,
    Far,
}

pub(crate) fn resolve_distance(pref: &Spacing, presets: &BTreeMap<String, f32>) -> f32 {
    match pref {
        Spacing::Preset(name) => presets
            .get(name)
            .copied()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(DEFAULT_SPACING_PX),
        Spacing::Px(v) => {
            if v.is_finite() && *v >= 0.0 {
                *v
            } else {
                DEFAULT_SPACING_PX
            }
        }
    }
}

pub(crate) fn tier_for(distance: f32) -> SpacingTier {
    if distance < 120.0 {
        SpacingTier::Together
    } else if distance < 450.0 {
        SpacingTier::Close
    } else {
        SpacingTier::Far
    }
}

/// Screen coordinate for a symbolic home-region tag. Unknown tags resolve
/// to center.
pub(crate) fn region_center(tag: &str, surface: (f32, f32)) -> Vec2 {
    let (w, h) = surface;
    let (fx, fy) = match tag {
        "center" => (0.5, 0.5),
        "center-left" => (0.3, 0.5),
        "center-right" => (0.7, 0.5),
        "top-left" => (0.25, 0.3),
        "top-right" => (0.75, 0.3),
        "bottom-left" => (0.25, 0.7),
        "bottom-right" => (0.75, 0.7),
        "top" => (0.5, 0.3),
        "bottom" => (0.5, 0.7),
        _ => (0.5, 0.5),
    };
    Vec2::new(w * fx, h * fy)
}

/// Dynamic anchor: primary speaker left-of-center by half the spacing,
/// secondary right by the same amount; vertical placement keeps the
/// region's row.
pub(crate) fn home_anchor(distance: f32, blob_id: usize, region_y: f32, surface: (f32, f32)) -> Vec2 {
    let cx = surface.0 * 0.5;
    let half = distance * 0.5;
    let x = match blob_id {
        0 => cx - half,
        1 => cx + half,
        _ => cx,
    };
    Vec2::new(x, region_y)
}

pub(crate) fn freedom_radius(distance: f32, surface_w: f32) -> f32 {
    match tier_for(distance) {
        SpacingTier::Together => 40.0,
        SpacingTier::Close => distance * 0.5,
        SpacingTier::Far => (distance * 0.6).min(surface_w * 0.3),
    }
}

/// Re-resolve a blob's anchor from its current spacing preference. Sets a
/// transition target when the anchor jumps.
pub(crate) fn apply(blob: &mut Blob, presets: &BTreeMap<String, f32>, surface: (f32, f32)) {
    let distance = resolve_distance(blob.spacing_pref(), presets);
    let region_y = region_center(&blob.home_region, surface).y;
    let anchor = home_anchor(distance, blob.id, region_y, surface);

    if anchor.sub(blob.home).len() > ANCHOR_MOVE_THRESHOLD {
        blob.target_pos = Some(anchor);
    }
    blob.home = anchor;
    blob.home_radius = freedom_radius(distance, surface.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{VisualConfig, VisualParams};

    fn presets() -> BTreeMap<String, f32> {
        VisualConfig::default().spacing_presets
    }

    #[test]
    fn close_preset_on_1000x800_surface() {
        // Spacing "close" (300 px): blob 0 at center-150, blob 1 at center+150.
        let surface = (1000.0, 800.0);
        let d = resolve_distance(&Spacing::preset("close"), &presets());
        assert_eq!(d, 300.0);
        let a0 = home_anchor(d, 0, 400.0, surface);
        let a1 = home_anchor(d, 1, 400.0, surface);
        assert_eq!(a0, Vec2::new(350.0, 400.0));
        assert_eq!(a1, Vec2::new(650.0, 400.0));
    }

    #[test]
    fn resolution_is_idempotent() {
        let surface = (1000.0, 800.0);
        let p = presets();
        let d1 = resolve_distance(&Spacing::preset("far away"), &p);
        let d2 = resolve_distance(&Spacing::preset("far away"), &p);
        assert_eq!(d1, d2);
        assert_eq!(home_anchor(d1, 0, 400.0, surface), home_anchor(d2, 0, 400.0, surface));
    }

    #[test]
    fn unknown_or_invalid_spacing_falls_back() {
        let p = presets();
        assert_eq!(
            resolve_distance(&Spacing::preset("sideways"), &p),
            DEFAULT_SPACING_PX
        );
        assert_eq!(resolve_distance(&Spacing::Px(f32::NAN), &p), DEFAULT_SPACING_PX);
        assert_eq!(resolve_distance(&Spacing::Px(-3.0), &p), DEFAULT_SPACING_PX);
    }

    #[test]
    fn tiers_follow_distance() {
        assert_eq!(tier_for(80.0), SpacingTier::Together);
        assert_eq!(tier_for(300.0), SpacingTier::Close);
        assert_eq!(tier_for(600.0), SpacingTier::Far);
    }

    #[test]
    fn far_radius_is_capped_by_surface_width() {
        let r = freedom_radius(600.0, 500.0);
        assert_eq!(r, 150.0); // 30% of width, below 0.6 * 600
    }

    #[test]
    fn anchor_jump_sets_transition_target() {
        let mut b = Blob::new(0, "center-left", &VisualParams::default());
        let surface = (1000.0, 800.0);
        apply(&mut b, &presets(), surface);
        assert!(b.target_pos.is_some());

        // Re-applying with no change keeps home stable and sets no new target.
        b.target_pos = None;
        let home = b.home;
        apply(&mut b, &presets(), surface);
        assert_eq!(b.home, home);
        assert!(b.target_pos.is_none());
    }
}
