//! Ties the pipeline together: explicit simulation context (no ambient
//! globals), a typed command ingress, segment lifecycle, and the per-tick
//! simulate/sample/compose sequence.

use std::collections::BTreeMap;

use rand::{rngs::StdRng, SeedableRng};

use crate::blob::Blob;
use crate::compositor;
use crate::config::{GlyphSets, SegmentMeta, VisualConfig};
use crate::field::{self, FieldGrid, CELL_ASPECT};
use crate::highlight::{self, Placement};
use crate::motion;
use crate::noise::NoiseField;
use crate::render::{Diff, Rgb, NEUTRAL_GRAY};
use crate::spacing;

/// Explicit shared state threaded through the simulator, sampler and
/// compositor. While paused, `time` freezes so noise-driven shaping holds
/// still.
pub(crate) struct SimContext {
    pub(crate) time: f32,
    pub(crate) frame: u64,
    pub(crate) paused: bool,
    pub(crate) loop_segment: bool,
    pub(crate) debug: bool,
    pub(crate) flash: bool,
    pub(crate) frame_skip: u8,
    pub(crate) emotion_colors: BTreeMap<String, Rgb>,
    pub(crate) diagnostics: Vec<String>,
}

impl SimContext {
    fn new(emotion_colors: BTreeMap<String, Rgb>) -> Self {
        Self {
            time: 0.0,
            frame: 0,
            paused: false,
            loop_segment: false,
            debug: false,
            flash: false,
            frame_skip: 0,
            emotion_colors,
            diagnostics: Vec::new(),
        }
    }
}

/// Named layout performance profiles: pixels per grid cell and how many
/// frames to skip between renders.
fn layout_profile(tag: &str) -> Option<(f32, u8)> {
    match tag {
        "full" => Some((8.0, 0)),
        "compact" => Some((12.0, 1)),
        "mini" => Some((16.0, 2)),
        _ => None,
    }
}

/// Typed control surface. All host control flows through `Engine::apply`,
/// decoupled from any transport.
#[derive(Clone, Debug)]
pub(crate) enum Command {
    SetSegment(SegmentMeta),
    SegmentEnded,
    SetLoop(bool),
    SetPaused(bool),
    SetLayout(String),
    SetEmotionColors(BTreeMap<String, Rgb>),
    ToggleDebug,
}

pub(crate) struct Engine {
    pub(crate) cfg: VisualConfig,
    pub(crate) ctx: SimContext,
    pub(crate) blobs: Vec<Blob>,
    pub(crate) glyphs: GlyphSets,
    pub(crate) placements: Vec<Placement>,
    pub(crate) segment: SegmentMeta,
    pub(crate) grid_res: f32,
    /// Resolution from the config/layout profile; per-segment overrides are
    /// turn-scoped and revert to this.
    base_grid_res: f32,
    cols: usize,
    rows: usize,
    script: Vec<SegmentMeta>,
    script_idx: usize,
    rng: StdRng,
    noise: NoiseField,
    circles_per_emotion: usize,
    emotion_char_amount: f32,
}

impl Engine {
    pub(crate) fn new(cfg: VisualConfig, seed: u64, cols: usize, rows: usize) -> Self {
        let blob_count = cfg.blob_count.max(1);
        let blobs: Vec<Blob> = (0..blob_count)
            .map(|i| {
                let region = cfg
                    .home_regions
                    .get(i)
                    .map(String::as_str)
                    .unwrap_or("center");
                Blob::new(i, region, &cfg.defaults)
            })
            .collect();

        let mut engine = Self {
            ctx: SimContext::new(cfg.emotion_colors.clone()),
            glyphs: cfg.glyphs.clone(),
            placements: vec![Placement::default(); blob_count],
            segment: SegmentMeta::default(),
            grid_res: cfg.grid_resolution.max(1.0),
            base_grid_res: cfg.grid_resolution.max(1.0),
            cols: cols.max(1),
            rows: rows.max(1),
            script: Vec::new(),
            script_idx: 0,
            rng: StdRng::seed_from_u64(seed),
            noise: NoiseField::new(seed as u32),
            circles_per_emotion: cfg.circles_per_emotion,
            emotion_char_amount: cfg.emotion_char_amount,
            blobs,
            cfg,
        };
        engine.resettle_blobs();
        engine
    }

    pub(crate) fn surface(&self) -> (f32, f32) {
        (
            self.cols as f32 * self.grid_res,
            self.rows as f32 * self.grid_res * CELL_ASPECT,
        )
    }

    fn resettle_blobs(&mut self) {
        let surface = self.surface();
        for blob in &mut self.blobs {
            spacing::apply(blob, &self.cfg.spacing_presets, surface);
            // Initial placement lands on the anchor, no transition flight.
            if blob.pos == crate::blob::Vec2::default() {
                blob.pos = blob.home;
                blob.target_pos = None;
            }
        }
    }

    /// Region centers are cached in each blob's home anchor; a resize
    /// invalidates them, so recompute anchors and placements.
    pub(crate) fn resize(&mut self, cols: usize, rows: usize) {
        if cols == self.cols && rows == self.rows {
            return;
        }
        self.cols = cols.max(1);
        self.rows = rows.max(1);
        self.resettle_blobs();
        self.replace_highlights();
    }

    pub(crate) fn set_script(&mut self, script: Vec<SegmentMeta>) {
        self.script = script;
        self.script_idx = 0;
        if let Some(seg) = self.script.first().cloned() {
            self.set_segment(seg);
        }
    }

    pub(crate) fn script_position(&self) -> (usize, usize) {
        (self.script_idx, self.script.len())
    }

    pub(crate) fn apply(&mut self, cmd: Command) {
        match cmd {
            Command::SetSegment(meta) => self.set_segment(meta),
            Command::SegmentEnded => self.advance_script(),
            Command::SetLoop(on) => self.ctx.loop_segment = on,
            Command::SetPaused(on) => self.ctx.paused = on,
            Command::SetLayout(tag) => match layout_profile(&tag) {
                Some((res, skip)) => {
                    self.grid_res = res;
                    self.base_grid_res = res;
                    self.ctx.frame_skip = skip;
                    self.resettle_blobs();
                    self.replace_highlights();
                }
                None => self
                    .ctx
                    .diagnostics
                    .push(format!("unknown layout profile '{tag}'")),
            },
            Command::SetEmotionColors(map) => {
                self.ctx.emotion_colors = map;
                self.refresh_blob_colors();
            }
            Command::ToggleDebug => self.ctx.debug = !self.ctx.debug,
        }
    }

    fn advance_script(&mut self) {
        if self.script.is_empty() {
            return;
        }
        if !self.ctx.loop_segment {
            self.script_idx = (self.script_idx + 1) % self.script.len();
        }
        let seg = self.script[self.script_idx].clone();
        self.set_segment(seg);
    }

    pub(crate) fn jump_to(&mut self, idx: usize) {
        if self.script.is_empty() {
            return;
        }
        self.script_idx = idx % self.script.len();
        let seg = self.script[self.script_idx].clone();
        self.set_segment(seg);
    }

    fn refresh_blob_colors(&mut self) {
        for blob in &mut self.blobs {
            blob.colors = blob
                .emotions
                .iter()
                .map(|e| {
                    self.ctx
                        .emotion_colors
                        .get(e)
                        .copied()
                        .unwrap_or(NEUTRAL_GRAY)
                })
                .collect();
        }
    }

    /// Replace the active segment: apply overrides to the speaking blob,
    /// resolve emotion colors, re-anchor spacing, and recompute highlights.
    pub(crate) fn set_segment(&mut self, meta: SegmentMeta) {
        let speaker = meta.speaker.min(self.blobs.len().saturating_sub(1));
        if meta.speaker >= self.blobs.len() {
            self.ctx.diagnostics.push(format!(
                "segment speaker {} out of range; using blob {speaker}",
                meta.speaker
            ));
        }

        match meta.grid_resolution {
            Some(res) if res.is_finite() && res >= 1.0 => self.grid_res = res,
            Some(res) => {
                self.ctx
                    .diagnostics
                    .push(format!("ignoring bad grid_resolution {res}"));
                self.grid_res = self.base_grid_res;
            }
            None => self.grid_res = self.base_grid_res,
        }
        if let Some(n) = meta.circles_per_emotion {
            self.circles_per_emotion = n;
        } else {
            self.circles_per_emotion = self.cfg.circles_per_emotion;
        }
        if let Some(a) = meta.emotion_char_amount {
            if a.is_finite() {
                self.emotion_char_amount = a.clamp(0.0, 2.0);
            }
        } else {
            self.emotion_char_amount = self.cfg.emotion_char_amount;
        }
        if let Some(ref g) = meta.glyphs {
            self.glyphs = g.clone();
        } else {
            self.glyphs = self.cfg.glyphs.clone();
        }
        self.ctx.flash = meta.flash;

        {
            let blob = &mut self.blobs[speaker];
            meta.params.apply(&mut blob.target, &mut self.ctx.diagnostics);
            blob.emotions = meta.emotions.clone();
        }
        self.refresh_blob_colors();

        if let Some(ref vis) = meta.blobs_visible {
            for (i, blob) in self.blobs.iter_mut().enumerate() {
                if let Some(&v) = vis.get(i) {
                    blob.target.visible = v;
                }
            }
        }

        // Spacing preference may have changed; re-anchor everyone against
        // the speaker's preference so both sides agree on the distance.
        let pref = self.blobs[speaker].target.min_blob_spacing.clone();
        let surface = self.surface();
        for blob in &mut self.blobs {
            blob.target.min_blob_spacing = pref.clone();
            blob.params.min_blob_spacing = pref.clone();
            spacing::apply(blob, &self.cfg.spacing_presets, surface);
        }

        // Warn once here if the distribution will be ignored downstream.
        if let Some(ref dist) = meta.emotion_distribution {
            if highlight::emotion_counts(&meta.emotions, Some(dist), 100).is_none() {
                self.ctx.diagnostics.push(
                    "emotion distribution invalid; falling back to round-robin".to_string(),
                );
            }
        }

        self.segment = meta;
        self.replace_highlights();
    }

    /// Recompute highlight placements. Each blob's set is replaced
    /// atomically between frames; the compositor never sees a partial set.
    fn replace_highlights(&mut self) {
        let speaker = self
            .segment
            .speaker
            .min(self.blobs.len().saturating_sub(1));
        for (i, blob) in self.blobs.iter().enumerate() {
            self.placements[i] = if i == speaker && !blob.emotions.is_empty() {
                highlight::place(
                    blob,
                    self.cols,
                    self.rows,
                    self.grid_res,
                    self.ctx.time,
                    &self.noise,
                    &blob.emotions,
                    self.segment.emotion_distribution.as_ref(),
                    self.circles_per_emotion,
                    self.emotion_char_amount,
                    &mut self.rng,
                )
            } else {
                Placement::default()
            };
        }
    }

    /// One fixed simulation step. `audio` carries this frame's raw level per
    /// blob; missing entries read as silence. While paused everything
    /// freezes, including the clock.
    pub(crate) fn tick(&mut self, dt: f32, audio: &[f32]) {
        if self.ctx.paused {
            return;
        }
        self.ctx.time += dt;
        self.ctx.frame += 1;

        for (i, blob) in self.blobs.iter_mut().enumerate() {
            blob.set_audio(audio.get(i).copied().unwrap_or(0.0));
            blob.interpolate_params();
        }

        let surface = self.surface();
        motion::step_all(
            &mut self.blobs,
            &self.cfg.spacing_presets,
            surface,
            &self.noise,
            &mut self.rng,
            self.ctx.time,
        );
    }

    pub(crate) fn sample(&self) -> FieldGrid {
        field::sample_grid(
            &self.blobs,
            self.cols,
            self.rows,
            self.grid_res,
            self.ctx.time,
            &self.noise,
        )
    }

    /// Render one frame into the diff buffer at `origin`. Runs against
    /// frozen state while paused.
    pub(crate) fn render(&self, diff: &mut Diff, origin: (u16, u16)) {
        let grid = self.sample();
        compositor::compose(
            diff,
            &grid,
            &self.blobs,
            &self.placements,
            &self.ctx,
            &self.cfg,
            &self.glyphs,
            &self.noise,
            self.grid_res,
            origin,
        );
    }

    pub(crate) fn drain_diagnostics(&mut self) -> Vec<String> {
        std::mem::take(&mut self.ctx.diagnostics)
    }
}
