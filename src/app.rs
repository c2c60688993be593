//! Host side: terminal lifecycle, input, frame pacing, the scripted demo
//! conversation and its synthetic audio envelope. Everything the engine
//! treats as an external collaborator lives here.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind},
    execute, queue,
    style::ResetColor,
    terminal::{
        self, BeginSynchronizedUpdate, DisableLineWrap, EnableLineWrap, EndSynchronizedUpdate,
        EnterAlternateScreen, LeaveAlternateScreen,
    },
};

use crate::cli::Cli;
use crate::config::{self, ParamPatch, SegmentMeta, Spacing};
use crate::engine::{Command, Engine};
use crate::noise::NoiseField;
use crate::render::{draw_text, Diff, Rgb};

/// Rows reserved for the HUD above the field.
const HUD_ROWS: u16 = 2;

/// Built-in conversation played when no script file is given.
fn built_in_script() -> Vec<SegmentMeta> {
    let seg = |speaker: usize, emotions: &[&str], secs: f32, caption: &str| SegmentMeta {
        speaker,
        emotions: emotions.iter().map(|s| s.to_string()).collect(),
        duration_secs: secs,
        caption: Some(caption.to_string()),
        ..Default::default()
    };

    let mut script = vec![
        seg(0, &["calm"], 6.0, "So, how was the trip?"),
        seg(1, &["joy", "surprise"], 7.0, "Honestly? Incredible."),
        seg(0, &["joy"], 5.0, "I knew you'd love it."),
    ];

    // A turn with an explicit emotion distribution.
    let mut weighted = seg(1, &["joy", "sadness"], 8.0, "Mostly. The last day was hard.");
    let mut dist = std::collections::BTreeMap::new();
    dist.insert("joy".to_string(), 30.0);
    dist.insert("sadness".to_string(), 70.0);
    weighted.emotion_distribution = Some(dist);
    script.push(weighted);

    // Heated moment: blobs pull apart and jitter.
    let mut heated = seg(0, &["anger", "fear"], 7.0, "You should have called me!");
    heated.params = ParamPatch {
        min_blob_spacing: Some(Spacing::preset("far away")),
        humor: Some(0.0),
        size_scale: Some(1.3),
        blobbiness: Some(0.8),
        ..Default::default()
    };
    heated.flash = true;
    script.push(heated);

    // Reconciliation: close together, soft and shiny.
    let mut warm = seg(1, &["love", "calm"], 9.0, "I'm here now. We're fine.");
    warm.params = ParamPatch {
        min_blob_spacing: Some(Spacing::preset("together")),
        shine: Some(3.0),
        humor: Some(2.0),
        breathing_speed: Some(1.4),
        ..Default::default()
    };
    warm.emotion_char_amount = Some(1.6);
    script.push(warm);

    script
}

/// Synthetic speech amplitude for the active speaker: syllable pulses over
/// a slow loudness drift, clamped to 0..1. Stands in for the real audio
/// collaborator.
fn speech_envelope(noise: &NoiseField, t: f32, speaker: usize) -> f32 {
    let phase = speaker as f32 * 41.7;
    let drift = noise.sample(t * 0.45, phase, 12.3);
    let syllables = 0.5 + 0.5 * (t * 6.3 + phase).sin() * (t * 2.1 + phase).cos();
    let pauses = noise.sample(t * 0.9, phase + 7.0, 3.1);
    if pauses < 0.25 {
        // Between words.
        return 0.05;
    }
    (0.25 + 0.75 * drift * syllables).clamp(0.0, 1.0)
}

struct App {
    engine: Engine,
    diff: Diff,
    audio_noise: NoiseField,
    fps_cap: u32,
    seg_elapsed: f32,
    notices: Vec<String>,
    should_quit: bool,
}

impl App {
    fn init() -> Result<Self> {
        let cli = Cli::parse();
        let (cfg, mut notices) = config::load_config(cli.config.as_deref());

        let script = match cli.script.as_deref() {
            Some(path) => {
                let (script, diags) = config::load_script(path);
                notices.extend(diags);
                script.unwrap_or_else(built_in_script)
            }
            None => built_in_script(),
        };

        let (cols, rows) = terminal::size()?;
        let grid_rows = rows.saturating_sub(HUD_ROWS).max(1);
        let mut engine = Engine::new(cfg, cli.seed, cols as usize, grid_rows as usize);
        if let Some(tag) = cli.layout {
            engine.apply(Command::SetLayout(tag));
        }
        engine.set_script(script);

        Ok(Self {
            engine,
            diff: Diff::new(cols, rows),
            audio_noise: NoiseField::new(cli.seed.wrapping_add(1) as u32),
            fps_cap: cli.fps.clamp(10, 240),
            seg_elapsed: 0.0,
            notices,
            should_quit: false,
        })
    }

    fn handle_input(&mut self) -> Result<()> {
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(k) if k.kind == KeyEventKind::Press => match k.code {
                    KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                    KeyCode::Char(' ') => {
                        let paused = self.engine.ctx.paused;
                        self.engine.apply(Command::SetPaused(!paused));
                    }
                    KeyCode::Char('l') => {
                        let looping = self.engine.ctx.loop_segment;
                        self.engine.apply(Command::SetLoop(!looping));
                    }
                    KeyCode::Char('d') => self.engine.apply(Command::ToggleDebug),
                    KeyCode::Char('n') => {
                        self.engine.apply(Command::SegmentEnded);
                        self.seg_elapsed = 0.0;
                    }
                    KeyCode::Char('f') => self.engine.apply(Command::SetLayout("full".into())),
                    KeyCode::Char('c') => self.engine.apply(Command::SetLayout("compact".into())),
                    KeyCode::Char('m') => self.engine.apply(Command::SetLayout("mini".into())),
                    KeyCode::Char(ch) if ch.is_ascii_digit() => {
                        let idx = ch.to_digit(10).unwrap_or(0) as usize;
                        self.engine.jump_to(idx);
                        self.seg_elapsed = 0.0;
                    }
                    _ => {}
                },
                Event::Resize(w, h) => {
                    self.diff.resize(w, h);
                    let grid_rows = h.saturating_sub(HUD_ROWS).max(1);
                    self.engine.resize(w as usize, grid_rows as usize);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn advance(&mut self, dt: f32) {
        if self.engine.ctx.paused {
            return;
        }

        // Segment clock: hand the "segment ended" event to the engine the
        // way an audio-playback collaborator would.
        self.seg_elapsed += dt;
        if self.seg_elapsed >= self.engine.segment.duration_secs.max(1.0) {
            self.seg_elapsed = 0.0;
            self.engine.apply(Command::SegmentEnded);
        }

        let speaker = self.engine.segment.speaker;
        let t = self.engine.ctx.time;
        let levels: Vec<f32> = (0..self.engine.blobs.len())
            .map(|i| {
                if i == speaker {
                    speech_envelope(&self.audio_noise, t, i)
                } else {
                    // Listener murmur.
                    0.04
                }
            })
            .collect();
        self.engine.tick(dt, &levels);
    }

    fn draw(&mut self, fps: f32) {
        let bg = self.engine.cfg.background;
        self.diff.clear_next(bg);
        self.engine.render(&mut self.diff, (0, HUD_ROWS));
        self.draw_hud(fps);
    }

    fn draw_hud(&mut self, fps: f32) {
        let (w, _) = self.diff.size();
        let hud_bg = Rgb::new(0, 0, 0);
        let hud_fg = Rgb::new(210, 220, 245);
        let hud_dim = Rgb::new(150, 160, 185);

        let (idx, total) = self.engine.script_position();
        let seg = &self.engine.segment;
        let emotions = if seg.emotions.is_empty() {
            "-".to_string()
        } else {
            seg.emotions.join("+")
        };
        let caption = seg.caption.as_deref().unwrap_or("");
        let flags = format!(
            "{}{}{}",
            if self.engine.ctx.paused { " [PAUSED]" } else { "" },
            if self.engine.ctx.loop_segment { " [LOOP]" } else { "" },
            if self.engine.ctx.debug { " [DEBUG]" } else { "" },
        );
        let line1 = format!(
            "blobtalk  seg {}/{}  spk:{}  {}  {:>4.0} fps{}  {}",
            idx + 1,
            total.max(1),
            seg.speaker,
            emotions,
            fps,
            flags,
            caption
        );
        let line2 = if let Some(notice) = self.notices.last() {
            format!("! {notice}")
        } else {
            "Keys: Space pause  L loop  N next  0-9 jump  F/C/M layout  D debug  Q quit"
                .to_string()
        };

        let pad = |s: &str| -> String {
            let mut s = s.chars().take(w as usize).collect::<String>();
            while s.chars().count() < w as usize {
                s.push(' ');
            }
            s
        };
        draw_text(&mut self.diff, 0, 0, &pad(&line1), hud_fg, hud_bg);
        draw_text(&mut self.diff, 0, 1, &pad(&line2), hud_dim, hud_bg);
    }

    fn run(&mut self) -> Result<()> {
        let mut out = io::stdout();
        execute!(out, EnterAlternateScreen, DisableLineWrap, cursor::Hide)?;
        terminal::enable_raw_mode()?;

        let result = self.main_loop(&mut out);

        terminal::disable_raw_mode()?;
        execute!(
            out,
            ResetColor,
            cursor::Show,
            EnableLineWrap,
            LeaveAlternateScreen
        )?;
        result
    }

    fn main_loop<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let frame_dt = Duration::from_secs_f32(1.0 / self.fps_cap as f32);
        let mut last = Instant::now();
        let mut fps_smoothed = self.fps_cap as f32;

        while !self.should_quit {
            self.handle_input()?;

            let now = Instant::now();
            let dt = (now - last).as_secs_f32().min(0.05);
            last = now;
            if dt > 1e-6 {
                fps_smoothed = fps_smoothed * 0.9 + (1.0 / dt) * 0.1;
            }

            self.advance(dt);
            self.notices.extend(self.engine.drain_diagnostics());

            // Frame-skip tier from the active layout profile.
            let skip = self.engine.ctx.frame_skip as u64 + 1;
            if self.engine.ctx.frame % skip == 0 || self.engine.ctx.paused {
                self.draw(fps_smoothed);
                queue!(out, BeginSynchronizedUpdate)?;
                self.diff.flush(out)?;
                queue!(out, ResetColor, EndSynchronizedUpdate)?;
                out.flush()?;
            }

            let elapsed = Instant::now() - now;
            if elapsed < frame_dt {
                std::thread::sleep(frame_dt - elapsed);
            }
        }
        Ok(())
    }
}

pub(crate) fn run() -> Result<()> {
    let mut app = App::init()?;
    app.run()
}
