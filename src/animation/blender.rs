//! Per-avatar animation state machine.
//!
//! An avatar becomes playable only after every one of its clips has arrived,
//! in whatever order the loads complete. Switching clips cross-fades the active
//! clip out while the new one fades in over the same duration. A switch
//! requested while a cross-fade is running waits for it to finish; only the
//! latest waiting request is kept.

use crate::{
    animation::mixer::{BlendedChannel, Mixer},
    error::SceneError,
    resources::animation::AnimationClip,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendState {
    Empty,
    Loading { pending: usize },
    Ready,
    Playing { active: usize },
}

#[derive(Debug)]
pub struct AnimationBlender {
    avatar: usize,
    name: String,
    slots: Vec<Option<AnimationClip>>,
    mixer: Mixer,
    state: BlendState,
    fade: f32,
    /// Seconds left of the running cross-fade.
    transition: Option<f32>,
    deferred: Option<usize>,
}

impl AnimationBlender {
    pub fn new(avatar: usize, name: impl Into<String>, clip_count: usize, fade: f32) -> Self {
        Self {
            avatar,
            name: name.into(),
            slots: vec![None; clip_count],
            mixer: Mixer::new(),
            state: BlendState::Empty,
            fade,
            transition: None,
            deferred: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> BlendState {
        self.state
    }

    pub fn clip_count(&self) -> usize {
        self.slots.len()
    }

    /// The clip currently set active, if any.
    pub fn active(&self) -> Option<usize> {
        match self.state {
            BlendState::Playing { active } => Some(active),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, BlendState::Ready | BlendState::Playing { .. })
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    pub fn deferred(&self) -> Option<usize> {
        self.deferred
    }

    pub fn weight(&self, clip: usize) -> f32 {
        self.mixer.weight(clip)
    }

    /// Stores a loaded clip in its slot. Returns true when this clip completed
    /// the set and the blender became ready.
    pub fn add_clip(&mut self, slot: usize, clip: AnimationClip) -> Result<bool, SceneError> {
        if self.is_ready() {
            log::warn!("{}: clip {} arrived after the blender was ready", self.name, slot);
            return Ok(false);
        }
        let entry = self.slots.get_mut(slot).ok_or(SceneError::UnknownClip {
            avatar: self.avatar,
            clip: slot,
        })?;
        if entry.replace(clip).is_some() {
            log::warn!("{}: clip {} was loaded twice", self.name, slot);
        }

        let pending = self.slots.iter().filter(|s| s.is_none()).count();
        if pending > 0 {
            self.state = BlendState::Loading { pending };
            return Ok(false);
        }

        for clip in self.slots.iter_mut().filter_map(Option::take) {
            self.mixer.add_clip(clip);
        }
        self.state = BlendState::Ready;
        log::info!("{}: all {} clips loaded", self.name, self.mixer.len());
        Ok(true)
    }

    /// Starts `clip` at full weight without a fade.
    pub fn start(&mut self, clip: usize) -> Result<(), SceneError> {
        self.check(clip)?;
        self.mixer.play(clip);
        self.state = BlendState::Playing { active: clip };
        Ok(())
    }

    /// Cross-fades from the active clip to `target`.
    ///
    /// Setting the active clip again is a no-op. While a cross-fade runs the
    /// request is deferred until it completes.
    pub fn set_action(&mut self, target: usize) -> Result<(), SceneError> {
        self.check(target)?;
        match self.state {
            BlendState::Playing { active } if active == target => {
                self.deferred = None;
            }
            BlendState::Playing { .. } if self.transition.is_some() => {
                log::debug!("{}: deferring clip {}", self.name, target);
                self.deferred = Some(target);
            }
            BlendState::Playing { active } => self.cross_fade(Some(active), target),
            _ => self.cross_fade(None, target),
        }
        Ok(())
    }

    fn check(&self, clip: usize) -> Result<(), SceneError> {
        if !self.is_ready() {
            log::warn!("{}: clip {} requested before all clips loaded", self.name, clip);
            return Err(SceneError::missing(format!("animations of {}", self.name)));
        }
        if clip >= self.mixer.len() {
            log::warn!("{}: there is no clip {}", self.name, clip);
            return Err(SceneError::UnknownClip {
                avatar: self.avatar,
                clip,
            });
        }
        Ok(())
    }

    fn cross_fade(&mut self, from: Option<usize>, to: usize) {
        if let Some(from) = from {
            self.mixer.fade_out(from, self.fade);
        }
        self.mixer.fade_in(to, self.fade);
        self.transition = Some(self.fade);
        self.state = BlendState::Playing { active: to };
        log::debug!("{}: fading {:?} -> {}", self.name, from, to);
    }

    /// Advances clip time and blend weights. Does nothing before the blender
    /// is ready.
    pub fn advance(&mut self, dt: f32) {
        if !self.is_ready() {
            return;
        }
        self.mixer.advance(dt);

        let Some(remaining) = self.transition.as_mut() else {
            return;
        };
        *remaining -= dt;
        if *remaining > 0.0 {
            return;
        }
        self.transition = None;
        if let (Some(next), BlendState::Playing { active }) = (self.deferred.take(), self.state) {
            if next != active {
                self.cross_fade(Some(active), next);
            }
        }
    }

    /// The blended pose of every animated node.
    pub fn pose(&self) -> Vec<BlendedChannel> {
        if !self.is_ready() {
            return Vec::new();
        }
        self.mixer.blend()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(name: &str) -> AnimationClip {
        AnimationClip::new(name, Vec::new())
    }

    fn ready_blender() -> AnimationBlender {
        let mut blender = AnimationBlender::new(0, "woman", 3, 1.0);
        for (slot, name) in ["Clap", "Yell", "Cheer"].iter().enumerate() {
            blender.add_clip(slot, clip(name)).expect("slot exists");
        }
        blender
    }

    #[test]
    fn loading_counts_down_in_any_order() {
        let mut blender = AnimationBlender::new(0, "woman", 3, 1.0);
        assert_eq!(blender.state(), BlendState::Empty);
        assert_eq!(blender.add_clip(2, clip("Cheer")), Ok(false));
        assert_eq!(blender.state(), BlendState::Loading { pending: 2 });
        assert!(blender.set_action(2).is_err());
        assert_eq!(blender.add_clip(0, clip("Clap")), Ok(false));
        assert_eq!(blender.add_clip(1, clip("Yell")), Ok(true));
        assert_eq!(blender.state(), BlendState::Ready);
    }

    #[test]
    fn setting_the_active_clip_is_a_no_op() {
        let mut blender = ready_blender();
        blender.start(1).expect("ready");
        blender.set_action(1).expect("ready");
        assert!(!blender.is_transitioning());
        assert_eq!(blender.weight(1), 1.0);
    }

    #[test]
    fn requests_during_a_fade_are_deferred_latest_wins() {
        let mut blender = ready_blender();
        blender.start(0).expect("ready");
        blender.set_action(1).expect("ready");
        blender.set_action(2).expect("ready");
        blender.set_action(0).expect("ready");
        assert_eq!(blender.deferred(), Some(0));
        assert_eq!(blender.active(), Some(1));

        blender.advance(1.0);
        assert_eq!(blender.active(), Some(0));
        assert!(blender.is_transitioning());
        blender.advance(1.0);
        assert_eq!(blender.weight(0), 1.0);
        assert_eq!(blender.weight(1), 0.0);
        assert_eq!(blender.weight(2), 0.0);
    }

    #[test]
    fn out_of_range_clips_are_rejected() {
        let mut blender = ready_blender();
        assert_eq!(
            blender.set_action(7),
            Err(SceneError::UnknownClip { avatar: 0, clip: 7 })
        );
        assert_eq!(blender.state(), BlendState::Ready);
    }
}
