use crate::config::{Spacing, VisualParams};
use crate::render::{Rgb, NEUTRAL_GRAY};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Vec2 {
    pub(crate) x: f32,
    pub(crate) y: f32,
}

impl Vec2 {
    pub(crate) fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
    pub(crate) fn add(self, o: Vec2) -> Self {
        Self::new(self.x + o.x, self.y + o.y)
    }
    pub(crate) fn sub(self, o: Vec2) -> Self {
        Self::new(self.x - o.x, self.y - o.y)
    }
    pub(crate) fn mul(self, k: f32) -> Self {
        Self::new(self.x * k, self.y * k)
    }
    pub(crate) fn len2(self) -> f32 {
        self.x * self.x + self.y * self.y
    }
    pub(crate) fn len(self) -> f32 {
        self.len2().sqrt()
    }
    pub(crate) fn norm(self) -> Self {
        let l = self.len();
        if l <= 1e-6 {
            Self::new(0.0, 0.0)
        } else {
            self.mul(1.0 / l)
        }
    }
    pub(crate) fn limit(self, max: f32) -> Self {
        let l = self.len();
        if l > max && l > 1e-6 {
            self.mul(max / l)
        } else {
            self
        }
    }
    pub(crate) fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

const AUDIO_HISTORY: usize = 8;
const MIN_SIZE_SCALE: f32 = 0.05;

/// One speaker's soft entity. Position and velocity are owned here and
/// mutated only by the motion simulator.
pub(crate) struct Blob {
    pub(crate) id: usize,
    pub(crate) pos: Vec2,
    pub(crate) vel: Vec2,
    pub(crate) home: Vec2,
    pub(crate) home_radius: f32,
    pub(crate) home_region: String,
    /// One-shot steering destination set on spacing/region changes.
    pub(crate) target_pos: Option<Vec2>,
    pub(crate) params: VisualParams,
    pub(crate) target: VisualParams,
    pub(crate) emotions: Vec<String>,
    pub(crate) colors: Vec<Rgb>,
    pub(crate) audio_level: f32,
    pub(crate) smoothed_audio: f32,
    audio_history: [f32; AUDIO_HISTORY],
    audio_cursor: usize,
    /// blob_strength x audio response x breathing pulse, refreshed each tick.
    pub(crate) cached_strength: f32,
    /// Per-blob phase offset so motion patterns and silhouettes decorrelate.
    pub(crate) phase: f32,
}

impl Blob {
    pub(crate) fn new(id: usize, home_region: &str, defaults: &VisualParams) -> Self {
        let params = defaults.clone();
        Self {
            id,
            pos: Vec2::default(),
            vel: Vec2::default(),
            home: Vec2::default(),
            home_radius: 100.0,
            home_region: home_region.to_string(),
            target_pos: None,
            target: params.clone(),
            cached_strength: params.blob_strength,
            params,
            emotions: Vec::new(),
            colors: Vec::new(),
            audio_level: 0.0,
            smoothed_audio: 0.0,
            audio_history: [0.0; AUDIO_HISTORY],
            audio_cursor: 0,
            phase: id as f32 * 17.31,
        }
    }

    /// Record one raw audio sample; smoothing is a moving average over a
    /// short history, then an exponential follow.
    pub(crate) fn set_audio(&mut self, level: f32) {
        let level = if level.is_finite() {
            level.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.audio_level = level;
        self.audio_history[self.audio_cursor] = level;
        self.audio_cursor = (self.audio_cursor + 1) % AUDIO_HISTORY;
        let avg: f32 = self.audio_history.iter().sum::<f32>() / AUDIO_HISTORY as f32;
        self.smoothed_audio = self.smoothed_audio * 0.7 + avg * 0.3;
    }

    /// Chase target params. Scalar fields ease exponentially; visibility,
    /// blur/humor/shine, growth pattern and spacing preference snap.
    pub(crate) fn interpolate_params(&mut self) {
        let ease = self.target.movement_ease.clamp(0.01, 1.0);
        let step = |cur: &mut f32, tgt: f32| {
            if tgt.is_finite() {
                *cur += (tgt - *cur) * ease;
            }
        };
        step(&mut self.params.size_scale, self.target.size_scale);
        step(&mut self.params.blob_strength, self.target.blob_strength);
        step(
            &mut self.params.audio_volume_impact,
            self.target.audio_volume_impact,
        );
        step(&mut self.params.spread, self.target.spread);
        step(&mut self.params.breathing_speed, self.target.breathing_speed);
        step(
            &mut self.params.gradient_strength,
            self.target.gradient_strength,
        );
        step(&mut self.params.blobbiness, self.target.blobbiness);
        step(&mut self.params.glyph_size, self.target.glyph_size);
        step(
            &mut self.params.colored_glyph_size,
            self.target.colored_glyph_size,
        );
        step(&mut self.params.density, self.target.density);
        step(&mut self.params.movement_ease, self.target.movement_ease);

        self.params.growth_pattern = self.target.growth_pattern;
        self.params.blur = self.target.blur;
        self.params.humor = self.target.humor;
        self.params.shine = self.target.shine;
        self.params.min_blob_spacing = self.target.min_blob_spacing.clone();
        self.params.visible = self.target.visible;

        self.params.size_scale = self.params.size_scale.max(MIN_SIZE_SCALE);
    }

    pub(crate) fn base_color(&self) -> Rgb {
        self.colors.first().copied().unwrap_or(NEUTRAL_GRAY)
    }

    pub(crate) fn spacing_pref(&self) -> &Spacing {
        &self.params.min_blob_spacing
    }

    /// Last-resort guard: a degenerate position/velocity is snapped back to
    /// home so a single bad tick cannot poison the field forever.
    pub(crate) fn sanitize(&mut self) {
        if !self.pos.is_finite() {
            self.pos = self.home;
        }
        if !self.vel.is_finite() {
            self.vel = Vec2::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GrowthPattern;

    fn test_blob() -> Blob {
        Blob::new(0, "center-left", &VisualParams::default())
    }

    #[test]
    fn scalar_params_ease_toward_target() {
        let mut b = test_blob();
        b.target.size_scale = 2.0;
        let before = b.params.size_scale;
        b.interpolate_params();
        assert!(b.params.size_scale > before);
        assert!(b.params.size_scale < 2.0);
    }

    #[test]
    fn snap_fields_apply_immediately() {
        let mut b = test_blob();
        b.target.blur = 4.0;
        b.target.visible = false;
        b.target.growth_pattern = GrowthPattern::Sine;
        b.interpolate_params();
        assert_eq!(b.params.blur, 4.0);
        assert!(!b.params.visible);
        assert_eq!(b.params.growth_pattern, GrowthPattern::Sine);
    }

    #[test]
    fn size_scale_never_reaches_zero() {
        let mut b = test_blob();
        b.target.size_scale = 0.0;
        for _ in 0..500 {
            b.interpolate_params();
        }
        assert!(b.params.size_scale >= 0.05);
    }

    #[test]
    fn audio_smoothing_stays_bounded() {
        let mut b = test_blob();
        for _ in 0..50 {
            b.set_audio(1.0);
        }
        assert!(b.smoothed_audio > 0.5 && b.smoothed_audio <= 1.0);
        b.set_audio(f32::NAN);
        assert_eq!(b.audio_level, 0.0);
    }

    #[test]
    fn sanitize_recovers_from_nan() {
        let mut b = test_blob();
        b.home = Vec2::new(100.0, 100.0);
        b.pos = Vec2::new(f32::NAN, 5.0);
        b.vel = Vec2::new(f32::INFINITY, 0.0);
        b.sanitize();
        assert_eq!(b.pos, b.home);
        assert_eq!(b.vel, Vec2::default());
    }
}
