use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::data_structures::{material::hex_rgb, model::PointVertex};

pub const STAR_COLOURS: [u32; 3] = [0xffeebb, 0xffeeff, 0xbbffff];

/// Point cloud of the sky, generated once from a seed.
#[derive(Clone, Debug, PartialEq)]
pub struct StarField {
    pub points: Vec<PointVertex>,
}

impl StarField {
    /// Scatters `count` stars uniformly inside a ball of `radius`.
    pub fn generate(count: usize, radius: f32, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut points = Vec::with_capacity(count);
        while points.len() < count {
            let p: [f32; 3] = [
                rng.random_range(-1.0..=1.0),
                rng.random_range(-1.0..=1.0),
                rng.random_range(-1.0..=1.0),
            ];
            if p[0] * p[0] + p[1] * p[1] + p[2] * p[2] > 1.0 {
                continue;
            }
            let colour = STAR_COLOURS[rng.random_range(0..STAR_COLOURS.len())];
            points.push(PointVertex {
                position: [p[0] * radius, p[1] * radius, p[2] * radius],
                color: hex_rgb(colour),
            });
        }
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
