//! Per-tick blob motion: personality patterns, audio reactivity,
//! spacing-aware damping, boundary containment and home tethering.

use std::collections::BTreeMap;

use rand::{rngs::StdRng, Rng};

use crate::blob::{Blob, Vec2};
use crate::config::GrowthPattern;
use crate::noise::NoiseField;
use crate::spacing::{self, SpacingTier};

/// Soft containment margin at the surface edges, px.
const EDGE_MARGIN: f32 = 8.0;
/// Transition targets count as reached inside this radius, px.
const ARRIVE_RADIUS: f32 = 5.0;
/// Steering impulse toward a one-shot transition target, px/tick.
const TRANSITION_PULL: f32 = 0.25;
/// Base per-tick speed cap before audio influence, px/tick.
const BASE_MAX_SPEED: f32 = 1.8;

/// Transfer curve from smoothed audio level to a strength multiplier.
pub(crate) fn audio_response(pattern: GrowthPattern, level: f32, impact: f32) -> f32 {
    let level = level.clamp(0.0, 1.0);
    let gain = match pattern {
        GrowthPattern::Linear => level,
        GrowthPattern::Exponential => level * level,
        GrowthPattern::Logarithmic => (1.0 + 9.0 * level).ln() / 10f32.ln(),
        GrowthPattern::Sine => (level * std::f32::consts::FRAC_PI_2).sin(),
    };
    1.0 + impact.max(0.0) * gain
}

/// Slow sinusoidal size pulse, always positive.
pub(crate) fn breathing_pulse(t: f32, speed: f32, phase: f32) -> f32 {
    1.0 + 0.08 * (t * 0.8 * speed.max(0.0) + phase).sin()
}

fn pattern_target(blob: &Blob, t: f32, noise: &NoiseField) -> Vec2 {
    let r = blob.home_radius.max(10.0);
    let audio = blob.smoothed_audio;
    let ph = blob.phase;
    match blob.id % 4 {
        // Orbit around home; radius and angular speed grow with audio.
        0 => {
            let orbit_r = r * 0.55 * (1.0 + 0.5 * audio);
            let w = 0.55 + 0.7 * audio;
            blob.home
                .add(Vec2::new((t * w + ph).cos(), (t * w + ph).sin()).mul(orbit_r))
        }
        // Two-frequency Lissajous figure-eight.
        1 => {
            let a = t * 0.8 + ph;
            blob.home.add(Vec2::new(
                a.sin() * r * 0.6,
                (a * 2.0).sin() * (a).cos() * r * 0.35,
            ))
        }
        // Radial breathing toward/away from home on a slow sine.
        2 => {
            let dir = {
                let d = blob.pos.sub(blob.home);
                if d.len() < 1.0 {
                    Vec2::new(ph.cos(), ph.sin())
                } else {
                    d.norm()
                }
            };
            let reach = r * (0.25 + 0.5 * (0.5 + 0.5 * (t * 0.45 + ph).sin()));
            blob.home.add(dir.mul(reach))
        }
        // Coherent-noise wander inside the home region.
        _ => {
            let nx = noise.sample_signed(t * 0.22, ph, 3.7);
            let ny = noise.sample_signed(ph, t * 0.22, 9.1);
            blob.home.add(Vec2::new(nx, ny).mul(r * 0.7))
        }
    }
}

/// Advance every blob one tick. `t` is the (possibly frozen) simulation
/// clock. Never fails: degenerate inputs are clamped or fall back to
/// defaults.
pub(crate) fn step_all(
    blobs: &mut [Blob],
    presets: &BTreeMap<String, f32>,
    surface: (f32, f32),
    noise: &NoiseField,
    rng: &mut StdRng,
    t: f32,
) {
    let others: Vec<(Vec2, bool)> = blobs.iter().map(|b| (b.pos, b.params.visible)).collect();

    for (i, blob) in blobs.iter_mut().enumerate() {
        let spacing_dist = spacing::resolve_distance(blob.spacing_pref(), presets);
        let tier = spacing::tier_for(spacing_dist);

        let min_dist = others
            .iter()
            .enumerate()
            .filter(|(j, (_, vis))| *j != i && *vis)
            .map(|(_, (p, _))| p.sub(blob.pos).len())
            .fold(f32::INFINITY, f32::min);

        // Crowding: scale movement down as blobs encroach on the spacing
        // distance, floored at 10%. The far tier damps harder.
        let mut intensity = if min_dist < spacing_dist {
            (min_dist / spacing_dist.max(1.0)).max(0.1)
        } else {
            1.0
        };
        if tier == SpacingTier::Far && min_dist < spacing_dist {
            intensity *= 0.6;
        }

        let audio_influence = blob.params.audio_volume_impact.max(0.0) * blob.smoothed_audio;
        let max_speed = (BASE_MAX_SPEED + audio_influence) * intensity;

        let frozen = blob.params.blur >= 5.0;
        if frozen {
            blob.vel = blob.vel.mul(0.5);
            if blob.vel.len() < 0.01 {
                blob.vel = Vec2::default();
            }
        } else {
            // Steer toward the personality pattern's time-varying target.
            let target = pattern_target(blob, t, noise);
            let desired = target.sub(blob.pos).norm().mul(max_speed);
            let steer = desired
                .sub(blob.vel)
                .limit(0.08 * intensity * (1.0 + audio_influence));
            blob.vel = blob.vel.add(steer);

            // Jitter plus a rhythmic dance impulse on loud audio.
            blob.vel = blob.vel.add(Vec2::new(
                rng.gen_range(-0.02..0.02),
                rng.gen_range(-0.02..0.02),
            ));
            if blob.audio_level > 0.5 {
                let dance = (t * 13.0 + blob.phase).sin() * (t * 7.3).sin();
                blob.vel = blob
                    .vel
                    .add(Vec2::new(dance * 0.12, dance * 0.08).mul(blob.audio_level));
            }

            // One-shot transition target from spacing/region changes.
            if let Some(tp) = blob.target_pos {
                let to = tp.sub(blob.pos);
                if to.len() <= ARRIVE_RADIUS {
                    blob.target_pos = None;
                } else {
                    blob.vel = blob.vel.add(to.norm().mul(TRANSITION_PULL));
                }
            }

            // Soft edge containment: reflect the outward component at 10%.
            let (w, h) = surface;
            if blob.pos.x < EDGE_MARGIN && blob.vel.x < 0.0 {
                blob.vel.x = blob.vel.x.abs() * 0.1;
            }
            if blob.pos.x > w - EDGE_MARGIN && blob.vel.x > 0.0 {
                blob.vel.x = -blob.vel.x.abs() * 0.1;
            }
            if blob.pos.y < EDGE_MARGIN && blob.vel.y < 0.0 {
                blob.vel.y = blob.vel.y.abs() * 0.1;
            }
            if blob.pos.y > h - EDGE_MARGIN && blob.vel.y > 0.0 {
                blob.vel.y = -blob.vel.y.abs() * 0.1;
            }

            // Home tether: beyond 1.5x the home radius, pull back with
            // strength ramping up to full at 2.5x.
            let from_home = blob.pos.sub(blob.home);
            let dist_home = from_home.len();
            let tether = blob.home_radius.max(10.0);
            if dist_home > tether * 1.5 {
                let k = ((dist_home / tether - 1.5) / 1.0).clamp(0.0, 1.0);
                blob.vel = blob.vel.add(from_home.norm().mul(-0.18 * k));
            }

            blob.vel = blob.vel.limit(max_speed);

            // Velocity damping, stronger while blurred.
            let damping = (0.94 - blob.params.blur * 0.02).clamp(0.7, 0.99);
            blob.vel = blob.vel.mul(damping);

            blob.pos = blob.pos.add(blob.vel);
            blob.pos.x = blob.pos.x.clamp(1.0, surface.0 - 1.0);
            blob.pos.y = blob.pos.y.clamp(1.0, surface.1 - 1.0);
        }

        blob.sanitize();

        blob.cached_strength = blob.params.blob_strength.max(0.0)
            * audio_response(
                blob.params.growth_pattern,
                blob.smoothed_audio,
                blob.params.audio_volume_impact,
            )
            * breathing_pulse(t, blob.params.breathing_speed, blob.phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{VisualConfig, VisualParams};
    use rand::SeedableRng;

    fn setup(n: usize) -> (Vec<Blob>, BTreeMap<String, f32>, StdRng, NoiseField) {
        let defaults = VisualParams::default();
        let presets = VisualConfig::default().spacing_presets;
        let mut blobs: Vec<Blob> = (0..n)
            .map(|i| Blob::new(i, if i == 0 { "center-left" } else { "center-right" }, &defaults))
            .collect();
        let surface = (1000.0, 800.0);
        for b in &mut blobs {
            spacing::apply(b, &presets, surface);
            b.pos = b.home;
            b.target_pos = None;
        }
        (blobs, presets, StdRng::seed_from_u64(42), NoiseField::new(7))
    }

    #[test]
    fn audio_response_is_identity_at_silence() {
        for p in [
            GrowthPattern::Linear,
            GrowthPattern::Exponential,
            GrowthPattern::Logarithmic,
            GrowthPattern::Sine,
        ] {
            assert!((audio_response(p, 0.0, 0.8) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn audio_response_grows_with_level() {
        for p in [
            GrowthPattern::Linear,
            GrowthPattern::Exponential,
            GrowthPattern::Logarithmic,
            GrowthPattern::Sine,
        ] {
            let lo = audio_response(p, 0.2, 0.8);
            let hi = audio_response(p, 0.9, 0.8);
            assert!(hi > lo, "{p:?} not increasing");
        }
    }

    #[test]
    fn blobs_stay_inside_surface() {
        let (mut blobs, presets, mut rng, noise) = setup(2);
        let surface = (1000.0, 800.0);
        for frame in 0..2000 {
            let t = frame as f32 / 60.0;
            for b in blobs.iter_mut() {
                b.set_audio(0.8);
            }
            step_all(&mut blobs, &presets, surface, &noise, &mut rng, t);
            for b in &blobs {
                assert!(b.pos.x >= 0.0 && b.pos.x <= surface.0, "x out: {}", b.pos.x);
                assert!(b.pos.y >= 0.0 && b.pos.y <= surface.1, "y out: {}", b.pos.y);
            }
        }
    }

    #[test]
    fn velocity_respects_cap() {
        let (mut blobs, presets, mut rng, noise) = setup(2);
        let surface = (1000.0, 800.0);
        for frame in 0..500 {
            let t = frame as f32 / 60.0;
            step_all(&mut blobs, &presets, surface, &noise, &mut rng, t);
            for b in &blobs {
                let cap = BASE_MAX_SPEED
                    + b.params.audio_volume_impact * b.smoothed_audio
                    + 0.01;
                assert!(b.vel.len() <= cap, "speed {} over cap {cap}", b.vel.len());
            }
        }
    }

    #[test]
    fn max_blur_freezes_motion() {
        let (mut blobs, presets, mut rng, noise) = setup(1);
        let surface = (1000.0, 800.0);
        blobs[0].params.blur = 5.0;
        blobs[0].vel = Vec2::new(1.0, 1.0);
        let start = blobs[0].pos;
        for frame in 0..60 {
            step_all(&mut blobs, &presets, surface, &noise, &mut rng, frame as f32 / 60.0);
        }
        assert_eq!(blobs[0].pos, start);
        assert!(blobs[0].vel.len() < 0.01);
    }

    #[test]
    fn transition_target_is_cleared_on_arrival() {
        let (mut blobs, presets, mut rng, noise) = setup(1);
        let surface = (1000.0, 800.0);
        blobs[0].target_pos = Some(blobs[0].pos.add(Vec2::new(40.0, 0.0)));
        blobs[0].home = blobs[0].pos.add(Vec2::new(40.0, 0.0));
        for frame in 0..3000 {
            step_all(&mut blobs, &presets, surface, &noise, &mut rng, frame as f32 / 60.0);
            if blobs[0].target_pos.is_none() {
                return;
            }
        }
        panic!("never arrived at transition target");
    }

    #[test]
    fn cached_strength_tracks_audio() {
        let (mut blobs, presets, mut rng, noise) = setup(1);
        let surface = (1000.0, 800.0);
        step_all(&mut blobs, &presets, surface, &noise, &mut rng, 0.0);
        let quiet = blobs[0].cached_strength;
        for _ in 0..40 {
            blobs[0].set_audio(1.0);
        }
        step_all(&mut blobs, &presets, surface, &noise, &mut rng, 0.0);
        assert!(blobs[0].cached_strength > quiet);
    }
}
