//! Deterministic coherent noise, sampled as `noise(x, y, t) -> [0, 1]`.
//! Trilinear value noise over a hashed integer lattice; the third axis is
//! time, so animated lookups stay smooth frame to frame.

fn hash_u32(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

fn hash3(ix: i32, iy: i32, iz: i32, seed: u32) -> u32 {
    let mut h = seed ^ 0x9e37_79b9;
    h ^= (ix as u32).wrapping_mul(0x85eb_ca6b);
    h = hash_u32(h);
    h ^= (iy as u32).wrapping_mul(0xc2b2_ae35);
    h = hash_u32(h);
    h ^= (iz as u32).wrapping_mul(0x27d4_eb2f);
    hash_u32(h)
}

fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct NoiseField {
    seed: u32,
}

impl NoiseField {
    pub(crate) fn new(seed: u32) -> Self {
        Self { seed }
    }

    pub(crate) fn sample(&self, x: f32, y: f32, t: f32) -> f32 {
        let ix0 = x.floor() as i32;
        let iy0 = y.floor() as i32;
        let iz0 = t.floor() as i32;
        let fx = x - ix0 as f32;
        let fy = y - iy0 as f32;
        let fz = t - iz0 as f32;

        let sx = smoothstep(fx);
        let sy = smoothstep(fy);
        let sz = smoothstep(fz);

        let v = |dx: i32, dy: i32, dz: i32| -> f32 {
            let h = hash3(ix0 + dx, iy0 + dy, iz0 + dz, self.seed);
            (h as f32) / (u32::MAX as f32)
        };

        let x00 = lerp(v(0, 0, 0), v(1, 0, 0), sx);
        let x10 = lerp(v(0, 1, 0), v(1, 1, 0), sx);
        let x01 = lerp(v(0, 0, 1), v(1, 0, 1), sx);
        let x11 = lerp(v(0, 1, 1), v(1, 1, 1), sx);

        let y0 = lerp(x00, x10, sy);
        let y1 = lerp(x01, x11, sy);

        lerp(y0, y1, sz)
    }

    /// Signed variant, `[-1, 1]`.
    pub(crate) fn sample_signed(&self, x: f32, y: f32, t: f32) -> f32 {
        self.sample(x, y, t) * 2.0 - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_is_deterministic() {
        let n = NoiseField::new(7);
        let a = n.sample(1.3, -4.8, 0.25);
        let b = n.sample(1.3, -4.8, 0.25);
        assert_eq!(a, b);
    }

    #[test]
    fn sample_stays_in_unit_range() {
        let n = NoiseField::new(99);
        for i in 0..500 {
            let x = (i as f32) * 0.173 - 40.0;
            let y = (i as f32) * 0.311 - 70.0;
            let t = (i as f32) * 0.057;
            let v = n.sample(x, y, t);
            assert!((0.0..=1.0).contains(&v), "out of range: {v}");
        }
    }

    #[test]
    fn nearby_samples_are_coherent() {
        let n = NoiseField::new(3);
        let a = n.sample(10.0, 10.0, 1.0);
        let b = n.sample(10.01, 10.0, 1.0);
        assert!((a - b).abs() < 0.1);
    }

    #[test]
    fn seeds_decorrelate() {
        let a = NoiseField::new(1).sample(5.5, 2.5, 0.5);
        let b = NoiseField::new(2).sample(5.5, 2.5, 0.5);
        assert!(a != b);
    }
}
