use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::render::Rgb;

/// Transfer curve applied to the smoothed audio level when a blob grows
/// with speech.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum GrowthPattern {
    Linear,
    Exponential,
    Logarithmic,
    Sine,
}

/// Spacing preference: either a named preset ("together", "close",
/// "far away") or an explicit pixel distance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum Spacing {
    Px(f32),
    Preset(String),
}

impl Spacing {
    pub(crate) fn preset(name: &str) -> Self {
        Spacing::Preset(name.to_string())
    }
}

/// The full per-blob visual parameter set. Current values chase target
/// values each tick; see `Blob::interpolate_params` for which fields
/// smooth and which snap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct VisualParams {
    pub(crate) size_scale: f32,
    /// Field strength in px^2 units: influence ~ strength / distance^2.
    pub(crate) blob_strength: f32,
    pub(crate) audio_volume_impact: f32,
    pub(crate) spread: f32,
    pub(crate) breathing_speed: f32,
    /// Gradient shaping exponent (gamma of the double power curve).
    pub(crate) gradient_strength: f32,
    /// Noise distortion amount for the blob silhouette.
    pub(crate) blobbiness: f32,
    pub(crate) glyph_size: f32,
    pub(crate) colored_glyph_size: f32,
    pub(crate) density: f32,
    pub(crate) movement_ease: f32,
    pub(crate) growth_pattern: GrowthPattern,
    pub(crate) blur: f32,
    pub(crate) humor: f32,
    pub(crate) shine: f32,
    pub(crate) min_blob_spacing: Spacing,
    pub(crate) visible: bool,
}

impl Default for VisualParams {
    fn default() -> Self {
        Self {
            size_scale: 1.0,
            blob_strength: 5000.0,
            audio_volume_impact: 0.6,
            spread: 1.0,
            breathing_speed: 1.0,
            gradient_strength: 2.2,
            blobbiness: 0.5,
            glyph_size: 1.0,
            colored_glyph_size: 1.0,
            density: 1.0,
            movement_ease: 0.08,
            growth_pattern: GrowthPattern::Linear,
            blur: 0.0,
            humor: 0.0,
            shine: 0.0,
            min_blob_spacing: Spacing::Preset("close".to_string()),
            visible: true,
        }
    }
}

/// A partial update over `VisualParams`. Only the enumerated fields are
/// recognized; anything else in the source JSON lands in `unknown` and is
/// reported as a diagnostic instead of being silently merged.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ParamPatch {
    pub(crate) size_scale: Option<f32>,
    pub(crate) blob_strength: Option<f32>,
    pub(crate) audio_volume_impact: Option<f32>,
    pub(crate) spread: Option<f32>,
    pub(crate) breathing_speed: Option<f32>,
    pub(crate) gradient_strength: Option<f32>,
    pub(crate) blobbiness: Option<f32>,
    pub(crate) glyph_size: Option<f32>,
    pub(crate) colored_glyph_size: Option<f32>,
    pub(crate) density: Option<f32>,
    pub(crate) movement_ease: Option<f32>,
    pub(crate) growth_pattern: Option<GrowthPattern>,
    pub(crate) blur: Option<f32>,
    pub(crate) humor: Option<f32>,
    pub(crate) shine: Option<f32>,
    pub(crate) min_blob_spacing: Option<Spacing>,
    pub(crate) visible: Option<bool>,
    #[serde(flatten)]
    pub(crate) unknown: BTreeMap<String, serde_json::Value>,
}

impl ParamPatch {
    /// Merge into `params`, ignoring non-finite numbers. Unknown keys are
    /// reported into `diags`.
    pub(crate) fn apply(&self, params: &mut VisualParams, diags: &mut Vec<String>) {
        let mut set = |dst: &mut f32, src: &Option<f32>| {
            if let Some(v) = src {
                if v.is_finite() {
                    *dst = *v;
                }
            }
        };
        set(&mut params.size_scale, &self.size_scale);
        set(&mut params.blob_strength, &self.blob_strength);
        set(&mut params.audio_volume_impact, &self.audio_volume_impact);
        set(&mut params.spread, &self.spread);
        set(&mut params.breathing_speed, &self.breathing_speed);
        set(&mut params.gradient_strength, &self.gradient_strength);
        set(&mut params.blobbiness, &self.blobbiness);
        set(&mut params.glyph_size, &self.glyph_size);
        set(&mut params.colored_glyph_size, &self.colored_glyph_size);
        set(&mut params.density, &self.density);
        set(&mut params.movement_ease, &self.movement_ease);
        set(&mut params.blur, &self.blur);
        set(&mut params.humor, &self.humor);
        set(&mut params.shine, &self.shine);
        if let Some(g) = self.growth_pattern {
            params.growth_pattern = g;
        }
        if let Some(ref s) = self.min_blob_spacing {
            params.min_blob_spacing = s.clone();
        }
        if let Some(v) = self.visible {
            params.visible = v;
        }
        for key in self.unknown.keys() {
            diags.push(format!("ignoring unknown visual parameter '{key}'"));
        }
        params.size_scale = params.size_scale.max(0.05);
    }
}

/// Glyph sets used by the compositor. `plain` is ordered from sparse to
/// dense; `colored` is the pool for emotion highlight cells.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct GlyphSets {
    pub(crate) plain: Vec<char>,
    pub(crate) colored: Vec<char>,
}

impl Default for GlyphSets {
    fn default() -> Self {
        Self {
            plain: vec!['·', ':', '-', '=', '+', '*', '#', '%', '@'],
            colored: vec!['●', '◆', '■', '▲', '★', '✦', '◉', '❖'],
        }
    }
}

/// One speaking turn: who talks, with what emotional content, plus any
/// visual overrides that apply for the duration of the turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct SegmentMeta {
    pub(crate) speaker: usize,
    pub(crate) emotions: Vec<String>,
    /// label -> percentage; must sum to ~100 over known labels or it is
    /// ignored in favor of round-robin assignment.
    pub(crate) emotion_distribution: Option<BTreeMap<String, f32>>,
    pub(crate) params: ParamPatch,
    pub(crate) blobs_visible: Option<Vec<bool>>,
    pub(crate) flash: bool,
    pub(crate) grid_resolution: Option<f32>,
    pub(crate) circles_per_emotion: Option<usize>,
    pub(crate) emotion_char_amount: Option<f32>,
    pub(crate) glyphs: Option<GlyphSets>,
    /// Demo-script timing; how long the host plays this turn.
    pub(crate) duration_secs: f32,
    pub(crate) caption: Option<String>,
}

impl Default for SegmentMeta {
    fn default() -> Self {
        Self {
            speaker: 0,
            emotions: Vec::new(),
            emotion_distribution: None,
            params: ParamPatch::default(),
            blobs_visible: None,
            flash: false,
            grid_resolution: None,
            circles_per_emotion: None,
            emotion_char_amount: None,
            glyphs: None,
            duration_secs: 6.0,
            caption: None,
        }
    }
}

/// Startup configuration. Every field has a hard-coded default so a missing
/// or malformed config file is never fatal.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct VisualConfig {
    pub(crate) background: Rgb,
    /// Pixels per grid cell (horizontal); vertical cells span twice this.
    pub(crate) grid_resolution: f32,
    pub(crate) blob_count: usize,
    pub(crate) home_regions: Vec<String>,
    pub(crate) spacing_presets: BTreeMap<String, f32>,
    pub(crate) defaults: VisualParams,
    pub(crate) connection_line: bool,
    pub(crate) emotion_colors: BTreeMap<String, Rgb>,
    pub(crate) glyphs: GlyphSets,
    pub(crate) circles_per_emotion: usize,
    pub(crate) emotion_char_amount: f32,
}

impl Default for VisualConfig {
    fn default() -> Self {
        let mut spacing_presets = BTreeMap::new();
        spacing_presets.insert("together".to_string(), 80.0);
        spacing_presets.insert("close".to_string(), 300.0);
        spacing_presets.insert("far away".to_string(), 600.0);

        let mut emotion_colors = BTreeMap::new();
        emotion_colors.insert("joy".to_string(), Rgb::new(255, 200, 60));
        emotion_colors.insert("anger".to_string(), Rgb::new(230, 60, 50));
        emotion_colors.insert("sadness".to_string(), Rgb::new(80, 120, 230));
        emotion_colors.insert("fear".to_string(), Rgb::new(160, 90, 220));
        emotion_colors.insert("surprise".to_string(), Rgb::new(255, 140, 40));
        emotion_colors.insert("disgust".to_string(), Rgb::new(110, 180, 70));
        emotion_colors.insert("calm".to_string(), Rgb::new(90, 200, 190));
        emotion_colors.insert("love".to_string(), Rgb::new(240, 110, 170));

        Self {
            background: Rgb::new(8, 10, 16),
            grid_resolution: 8.0,
            blob_count: 2,
            home_regions: vec!["center-left".to_string(), "center-right".to_string()],
            spacing_presets,
            defaults: VisualParams::default(),
            connection_line: true,
            emotion_colors,
            glyphs: GlyphSets::default(),
            circles_per_emotion: 12,
            emotion_char_amount: 1.0,
        }
    }
}

/// Load config from JSON; any failure degrades to defaults with a
/// diagnostic, never an error.
pub(crate) fn load_config(path: Option<&Path>) -> (VisualConfig, Vec<String>) {
    let mut diags = Vec::new();
    let Some(path) = path else {
        return (VisualConfig::default(), diags);
    };
    match fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str::<VisualConfig>(&text) {
            Ok(cfg) => (cfg, diags),
            Err(e) => {
                diags.push(format!("config parse failed ({e}); using defaults"));
                (VisualConfig::default(), diags)
            }
        },
        Err(e) => {
            diags.push(format!("config read failed ({e}); using defaults"));
            (VisualConfig::default(), diags)
        }
    }
}

/// Load a demo script (list of segments) from JSON, same degrade-to-default
/// policy as `load_config`.
pub(crate) fn load_script(path: &Path) -> (Option<Vec<SegmentMeta>>, Vec<String>) {
    let mut diags = Vec::new();
    match fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str::<Vec<SegmentMeta>>(&text) {
            Ok(script) if !script.is_empty() => (Some(script), diags),
            Ok(_) => {
                diags.push("script file is empty; using built-in script".to_string());
                (None, diags)
            }
            Err(e) => {
                diags.push(format!("script parse failed ({e}); using built-in script"));
                (None, diags)
            }
        },
        Err(e) => {
            diags.push(format!("script read failed ({e}); using built-in script"));
            (None, diags)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_merges_recognized_fields() {
        let mut p = VisualParams::default();
        let patch = ParamPatch {
            size_scale: Some(1.6),
            blur: Some(3.0),
            ..Default::default()
        };
        let mut diags = Vec::new();
        patch.apply(&mut p, &mut diags);
        assert_eq!(p.size_scale, 1.6);
        assert_eq!(p.blur, 3.0);
        assert!(diags.is_empty());
    }

    #[test]
    fn patch_reports_unknown_keys() {
        let json = r#"{ "size_scale": 2.0, "wobble_factor": 9 }"#;
        let patch: ParamPatch = serde_json::from_str(json).unwrap();
        let mut p = VisualParams::default();
        let mut diags = Vec::new();
        patch.apply(&mut p, &mut diags);
        assert_eq!(p.size_scale, 2.0);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].contains("wobble_factor"));
    }

    #[test]
    fn patch_ignores_non_finite() {
        let mut p = VisualParams::default();
        let patch = ParamPatch {
            spread: Some(f32::NAN),
            ..Default::default()
        };
        patch.apply(&mut p, &mut Vec::new());
        assert_eq!(p.spread, 1.0);
    }

    #[test]
    fn patch_clamps_size_scale_positive() {
        let mut p = VisualParams::default();
        let patch = ParamPatch {
            size_scale: Some(-4.0),
            ..Default::default()
        };
        patch.apply(&mut p, &mut Vec::new());
        assert!(p.size_scale >= 0.05);
    }

    #[test]
    fn spacing_deserializes_both_forms() {
        let a: Spacing = serde_json::from_str("\"close\"").unwrap();
        let b: Spacing = serde_json::from_str("240.0").unwrap();
        assert_eq!(a, Spacing::preset("close"));
        assert_eq!(b, Spacing::Px(240.0));
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let (cfg, diags) = load_config(Some(Path::new("/nonexistent/blobtalk.json")));
        assert_eq!(cfg.blob_count, 2);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn spacing_presets_are_monotonic() {
        let cfg = VisualConfig::default();
        let together = cfg.spacing_presets["together"];
        let close = cfg.spacing_presets["close"];
        let far = cfg.spacing_presets["far away"];
        assert!(together < close && close < far);
    }
}
