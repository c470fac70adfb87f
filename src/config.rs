//! Scene tunables.

use instant::Duration;

/// Environment variable that overrides where assets are read from.
pub const ASSETS_ENV: &str = "SNOW_GLOBE_ASSETS";

#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    /// Directory (native) or base URL (web) every asset url is relative to.
    pub asset_root: String,
    /// Duration of both halves of an animation cross-fade.
    pub fade_duration: Duration,
    /// Yaw speed of the globe and the star field, in radians per second.
    pub rotation_speed: f32,
    pub ambient_volume: f32,
    pub positional_volume: f32,
    /// Distance below which the radio plays at full volume.
    pub ref_distance: f32,
    pub rolloff: f32,
    pub pan_range: (f32, f32),
    pub pan_step: f32,
    pub star_count: usize,
    pub star_radius: f32,
    pub star_seed: u64,
    /// How often the frame statistics in the window title refresh.
    pub tick_duration_millis: u64,
    pub clear_colour: wgpu::Color,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            asset_root: "assets".to_string(),
            fade_duration: Duration::from_secs(1),
            // 0.001 rad per frame at 60 Hz
            rotation_speed: 0.06,
            ambient_volume: 0.01,
            positional_volume: 0.1,
            ref_distance: 10.0,
            rolloff: 1.0,
            pan_range: (-4.0, 4.0),
            pan_step: 0.001,
            star_count: 10_000,
            star_radius: 400.0,
            star_seed: 0x5107_6106,
            tick_duration_millis: 500,
            clear_colour: wgpu::Color {
                r: 0.02,
                g: 0.01,
                b: 0.06,
                a: 1.0,
            },
        }
    }
}

impl SceneConfig {
    /// Defaults with the asset root taken from `SNOW_GLOBE_ASSETS` when set,
    /// then from the copy bundled at build time.
    pub fn from_env() -> Self {
        #[allow(unused_mut)]
        let mut config = Self::default();
        #[cfg(not(target_arch = "wasm32"))]
        {
            let root = std::env::var(ASSETS_ENV)
                .ok()
                .filter(|root| !root.is_empty())
                .or_else(|| option_env!("SNOW_GLOBE_BUNDLED_ASSETS").map(str::to_string));
            if let Some(root) = root {
                config.asset_root = root;
            }
        }
        config
    }

    pub fn fade_seconds(&self) -> f32 {
        self.fade_duration.as_secs_f32()
    }

    /// Clamps a pan value into range and snaps it to the slider step. NaN and
    /// infinities have no place on the slider and give `None`.
    pub fn clamp_pan(&self, x: f32) -> Option<f32> {
        if !x.is_finite() {
            return None;
        }
        let (min, max) = self.pan_range;
        let snapped = if self.pan_step > 0.0 {
            (x / self.pan_step).round() * self.pan_step
        } else {
            x
        };
        Some(snapped.clamp(min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pan_is_clamped_and_snapped() {
        let config = SceneConfig::default();
        assert_eq!(config.clamp_pan(7.5), Some(4.0));
        assert_eq!(config.clamp_pan(-9.0), Some(-4.0));
        assert!(config.clamp_pan(1.23449).is_some_and(|x| (x - 1.234).abs() < 1e-6));
    }

    #[test]
    fn non_finite_pans_are_rejected() {
        let config = SceneConfig::default();
        assert_eq!(config.clamp_pan(f32::NAN), None);
        assert_eq!(config.clamp_pan(f32::INFINITY), None);
        assert_eq!(config.clamp_pan(f32::NEG_INFINITY), None);
    }
}
