//! Clip playback with weighted blending.
//!
//! Every clip added to a [`Mixer`] gets an [`Action`] holding its playback time
//! and blend weight. Fades change the weight linearly over a duration. The
//! mixer samples all weighted actions and reduces them to one
//! [`BlendedChannel`] per animated node.

use std::collections::BTreeMap;

use cgmath::{InnerSpace, Quaternion, Vector3, VectorSpace, Zero};

use crate::{
    data_structures::instance::Instance,
    resources::animation::{AnimationClip, Sample},
};

#[derive(Clone, Copy, Debug, PartialEq)]
struct Fade {
    from: f32,
    to: f32,
    elapsed: f32,
    duration: f32,
}

impl Fade {
    fn weight(&self) -> f32 {
        if self.duration <= 0.0 {
            return self.to;
        }
        let t = (self.elapsed / self.duration).clamp(0.0, 1.0);
        self.from + (self.to - self.from) * t
    }

    fn is_done(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// Playback state of one clip.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Action {
    pub time: f32,
    pub weight: f32,
    pub enabled: bool,
    fade: Option<Fade>,
}

impl Action {
    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    fn reset(&mut self) {
        self.time = 0.0;
        self.enabled = true;
        self.fade = None;
    }

    fn advance(&mut self, dt: f32, duration: f32) {
        if !self.enabled {
            return;
        }
        self.time += dt;
        if duration > 0.0 {
            self.time %= duration;
        } else {
            self.time = 0.0;
        }
        if let Some(fade) = &mut self.fade {
            fade.elapsed += dt;
            self.weight = fade.weight();
            if fade.is_done() {
                self.fade = None;
                if self.weight <= 0.0 {
                    self.weight = 0.0;
                    self.enabled = false;
                }
            }
        }
    }
}

/// Weighted mean of the samples of one node; the weights are the summed
/// action weights per property.
#[derive(Clone, Debug, PartialEq)]
pub struct BlendedChannel {
    pub target: String,
    pub translation: Option<(Vector3<f32>, f32)>,
    pub rotation: Option<(Quaternion<f32>, f32)>,
    pub scale: Option<(Vector3<f32>, f32)>,
}

impl BlendedChannel {
    /// The node's local transform. Where the summed weight is below one, the
    /// remainder comes from `bind`.
    pub fn apply(&self, bind: &Instance) -> Instance {
        let mut out = *bind;
        if let Some((t, w)) = self.translation {
            out.position = bind.position.lerp(t, w.min(1.0));
        }
        if let Some((s, w)) = self.scale {
            out.scale = bind.scale.lerp(s, w.min(1.0));
        }
        if let Some((r, w)) = self.rotation {
            let aligned = if bind.rotation.dot(r) < 0.0 { -r } else { r };
            out.rotation = bind.rotation.nlerp(aligned, w.min(1.0));
        }
        out
    }
}

struct Accumulator {
    translation: Vector3<f32>,
    translation_weight: f32,
    rotation: Option<Quaternion<f32>>,
    rotation_weight: f32,
    scale: Vector3<f32>,
    scale_weight: f32,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            translation: Vector3::zero(),
            translation_weight: 0.0,
            rotation: None,
            rotation_weight: 0.0,
            scale: Vector3::zero(),
            scale_weight: 0.0,
        }
    }
}

impl Accumulator {
    fn add(&mut self, sample: Sample, weight: f32) {
        match sample {
            Sample::Translation(t) => {
                self.translation += t * weight;
                self.translation_weight += weight;
            }
            Sample::Scale(s) => {
                self.scale += s * weight;
                self.scale_weight += weight;
            }
            Sample::Rotation(q) => {
                let sum = self.rotation.get_or_insert(Quaternion::zero());
                // keep every quaternion in the hemisphere of the running sum
                let q = if sum.dot(q) < 0.0 { -q } else { q };
                *sum += q * weight;
                self.rotation_weight += weight;
            }
        }
    }

    fn finish(self, target: String) -> BlendedChannel {
        BlendedChannel {
            target,
            translation: (self.translation_weight > 0.0)
                .then(|| (self.translation / self.translation_weight, self.translation_weight)),
            rotation: self
                .rotation
                .filter(|q| q.magnitude2() > f32::EPSILON)
                .map(|q| (q.normalize(), self.rotation_weight)),
            scale: (self.scale_weight > 0.0)
                .then(|| (self.scale / self.scale_weight, self.scale_weight)),
        }
    }
}

#[derive(Debug, Default)]
pub struct Mixer {
    clips: Vec<AnimationClip>,
    actions: Vec<Action>,
}

impl Mixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a clip with a stopped action and returns its index.
    pub fn add_clip(&mut self, clip: AnimationClip) -> usize {
        self.clips.push(clip);
        self.actions.push(Action::default());
        self.clips.len() - 1
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn clip(&self, idx: usize) -> Option<&AnimationClip> {
        self.clips.get(idx)
    }

    pub fn action(&self, idx: usize) -> Option<&Action> {
        self.actions.get(idx)
    }

    pub fn weight(&self, idx: usize) -> f32 {
        self.actions.get(idx).map_or(0.0, |a| a.weight)
    }

    pub fn is_fading(&self) -> bool {
        self.actions.iter().any(Action::is_fading)
    }

    /// Starts a clip from the beginning at full weight.
    pub fn play(&mut self, idx: usize) {
        if let Some(action) = self.actions.get_mut(idx) {
            action.reset();
            action.weight = 1.0;
        }
    }

    /// Restarts a clip and raises its weight from zero to one.
    pub fn fade_in(&mut self, idx: usize, duration: f32) {
        if let Some(action) = self.actions.get_mut(idx) {
            action.reset();
            action.weight = 0.0;
            action.fade = Some(Fade {
                from: 0.0,
                to: 1.0,
                elapsed: 0.0,
                duration,
            });
        }
    }

    /// Lowers a clip's weight to zero; the action stops once it gets there.
    pub fn fade_out(&mut self, idx: usize, duration: f32) {
        if let Some(action) = self.actions.get_mut(idx) {
            if !action.enabled {
                return;
            }
            action.fade = Some(Fade {
                from: action.weight,
                to: 0.0,
                elapsed: 0.0,
                duration,
            });
        }
    }

    pub fn advance(&mut self, dt: f32) {
        for (action, clip) in self.actions.iter_mut().zip(&self.clips) {
            action.advance(dt, clip.duration);
        }
    }

    /// Samples every weighted action and reduces the samples per node.
    pub fn blend(&self) -> Vec<BlendedChannel> {
        let mut channels: BTreeMap<&str, Accumulator> = BTreeMap::new();
        for (action, clip) in self.actions.iter().zip(&self.clips) {
            if !action.enabled || action.weight <= 0.0 {
                continue;
            }
            for track in &clip.tracks {
                if let Some(sample) = track.sample(action.time) {
                    channels
                        .entry(track.target.as_str())
                        .or_default()
                        .add(sample, action.weight);
                }
            }
        }
        channels
            .into_iter()
            .map(|(target, acc)| acc.finish(target.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::animation::{Keyframes, Track};

    fn slide(name: &str, x: f32) -> AnimationClip {
        AnimationClip::new(
            name,
            vec![Track {
                target: "Hips".to_string(),
                timestamps: vec![0.0, 2.0],
                keyframes: Keyframes::Translation(vec![Vector3::new(x, 0.0, 0.0); 2]),
            }],
        )
    }

    #[test]
    fn fades_are_linear_and_stop_the_action() {
        let mut mixer = Mixer::new();
        let a = mixer.add_clip(slide("A", 1.0));
        mixer.play(a);
        mixer.fade_out(a, 1.0);
        mixer.advance(0.25);
        assert!((mixer.weight(a) - 0.75).abs() < 1e-6);
        mixer.advance(0.75);
        assert_eq!(mixer.weight(a), 0.0);
        assert!(!mixer.action(a).is_some_and(|action| action.enabled));
        assert!(!mixer.is_fading());
    }

    #[test]
    fn time_loops_over_the_clip() {
        let mut mixer = Mixer::new();
        let a = mixer.add_clip(slide("A", 1.0));
        mixer.play(a);
        mixer.advance(2.5);
        let time = mixer.action(a).map(|action| action.time);
        assert!(time.is_some_and(|t| (t - 0.5).abs() < 1e-6));
    }

    #[test]
    fn blend_is_weighted_and_falls_back_to_the_bind_pose() {
        let mut mixer = Mixer::new();
        let a = mixer.add_clip(slide("A", 2.0));
        let b = mixer.add_clip(slide("B", 4.0));
        mixer.play(a);
        mixer.fade_out(a, 1.0);
        mixer.fade_in(b, 1.0);
        mixer.advance(0.5);

        let channels = mixer.blend();
        assert_eq!(channels.len(), 1);
        let (mean, weight) = channels[0].translation.expect("translation");
        assert!((weight - 1.0).abs() < 1e-6);
        assert!((mean.x - 3.0).abs() < 1e-5);

        mixer.fade_out(b, 1.0);
        mixer.advance(1.0);
        mixer.play(a);
        mixer.fade_out(a, 2.0);
        mixer.advance(1.0);
        let pose = mixer.blend()[0].apply(&Instance::new());
        assert!((pose.position.x - 1.0).abs() < 1e-5);
    }
}
