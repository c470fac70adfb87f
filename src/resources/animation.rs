//! Keyframed animation clips.
//!
//! A clip is a set of tracks; each track animates one property of one node,
//! identified by the node's name so clips decoded from separate files can
//! drive the same rig.

use cgmath::{InnerSpace, VectorSpace};

#[derive(Clone, Debug, PartialEq)]
pub enum Keyframes {
    Translation(Vec<cgmath::Vector3<f32>>),
    Rotation(Vec<cgmath::Quaternion<f32>>),
    Scale(Vec<cgmath::Vector3<f32>>),
    Other,
}

impl Keyframes {
    pub fn len(&self) -> usize {
        match self {
            Keyframes::Translation(v) | Keyframes::Scale(v) => v.len(),
            Keyframes::Rotation(v) => v.len(),
            Keyframes::Other => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single sampled value of a track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sample {
    Translation(cgmath::Vector3<f32>),
    Rotation(cgmath::Quaternion<f32>),
    Scale(cgmath::Vector3<f32>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    /// Name of the node this track animates.
    pub target: String,
    pub timestamps: Vec<f32>,
    pub keyframes: Keyframes,
}

impl Track {
    /// Samples the track at `time`, holding the first and last keyframe
    /// outside the keyed range.
    pub fn sample(&self, time: f32) -> Option<Sample> {
        let (i0, i1, f) = locate(&self.timestamps, time)?;
        match &self.keyframes {
            Keyframes::Translation(v) => {
                Some(Sample::Translation(v.get(i0)?.lerp(*v.get(i1)?, f)))
            }
            Keyframes::Scale(v) => Some(Sample::Scale(v.get(i0)?.lerp(*v.get(i1)?, f))),
            Keyframes::Rotation(v) => {
                let (q0, q1) = (*v.get(i0)?, *v.get(i1)?);
                let q = if i0 == i1 { q0 } else { q0.slerp(q1, f) };
                Some(Sample::Rotation(q.normalize()))
            }
            Keyframes::Other => None,
        }
    }

    pub fn end_time(&self) -> f32 {
        self.timestamps.last().copied().unwrap_or(0.0)
    }
}

/// Finds the keyframe pair around `time` and the blend factor between them.
fn locate(timestamps: &[f32], time: f32) -> Option<(usize, usize, f32)> {
    let last = timestamps.len().checked_sub(1)?;
    let idx = timestamps.partition_point(|&ts| ts <= time);
    if idx == 0 {
        return Some((0, 0, 0.0));
    }
    if idx > last {
        return Some((last, last, 0.0));
    }
    let (t0, t1) = (timestamps[idx - 1], timestamps[idx]);
    let span = t1 - t0;
    let f = if span > f32::EPSILON {
        (time - t0) / span
    } else {
        0.0
    };
    Some((idx - 1, idx, f.clamp(0.0, 1.0)))
}

/// An animation clip: a named set of tracks and its duration in seconds.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub tracks: Vec<Track>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        let duration = tracks.iter().map(Track::end_time).fold(0.0, f32::max);
        Self {
            name: name.into(),
            duration,
            tracks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Quaternion, Rad, Rotation3, Vector3};

    fn translation_track() -> Track {
        Track {
            target: "Hips".to_string(),
            timestamps: vec![0.0, 1.0, 3.0],
            keyframes: Keyframes::Translation(vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(2.0, 0.0, 0.0),
                Vector3::new(2.0, 4.0, 0.0),
            ]),
        }
    }

    #[test]
    fn translation_is_interpolated_between_keys() {
        let track = translation_track();
        assert_eq!(
            track.sample(0.5),
            Some(Sample::Translation(Vector3::new(1.0, 0.0, 0.0)))
        );
        assert_eq!(
            track.sample(2.0),
            Some(Sample::Translation(Vector3::new(2.0, 2.0, 0.0)))
        );
    }

    #[test]
    fn sampling_outside_the_keys_holds_the_ends() {
        let track = translation_track();
        assert_eq!(
            track.sample(-1.0),
            Some(Sample::Translation(Vector3::new(0.0, 0.0, 0.0)))
        );
        assert_eq!(
            track.sample(10.0),
            Some(Sample::Translation(Vector3::new(2.0, 4.0, 0.0)))
        );
    }

    #[test]
    fn rotation_halfway_is_half_the_angle() {
        let track = Track {
            target: "Spine".to_string(),
            timestamps: vec![0.0, 2.0],
            keyframes: Keyframes::Rotation(vec![
                Quaternion::from_angle_y(Rad(0.0)),
                Quaternion::from_angle_y(Rad(1.0)),
            ]),
        };
        let Some(Sample::Rotation(q)) = track.sample(1.0) else {
            panic!("expected a rotation sample");
        };
        let expected = Quaternion::from_angle_y(Rad(0.5));
        assert!((q.s - expected.s).abs() < 1e-5);
        assert!((q.v.y - expected.v.y).abs() < 1e-5);
    }

    #[test]
    fn clip_duration_is_the_longest_track() {
        let clip = AnimationClip::new("Clap", vec![translation_track()]);
        assert_eq!(clip.duration, 3.0);
        assert!(AnimationClip::new("Empty", vec![]).duration == 0.0);
    }
}
