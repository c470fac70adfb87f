//! The control panel: folders of buttons and sliders, each bound to a key.
//!
//! Controls do not touch the scene themselves. Pressing one yields a
//! [`PanelAction`] which the scene applies on its next tick.

use std::fmt::Write as _;

use winit::keyboard::KeyCode;

/// What a control asks the scene to do.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PanelAction {
    SetClip { avatar: usize, clip: usize },
    ToggleRotation,
    MuteAll,
    ToggleAmbient,
    ToggleRadio,
    /// Sets the radio's x offset.
    Pan(f32),
    /// Moves the radio's x offset by a delta.
    NudgePan(f32),
    ToggleImmersive,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Control {
    Button {
        label: String,
        action: PanelAction,
    },
    Slider {
        label: String,
        min: f32,
        max: f32,
        step: f32,
    },
}

impl Control {
    pub fn button(label: impl Into<String>, action: PanelAction) -> Self {
        Self::Button {
            label: label.into(),
            action,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Control::Button { label, .. } | Control::Slider { label, .. } => label,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Folder {
    pub name: String,
    pub controls: Vec<Control>,
    pub folders: Vec<Folder>,
}

impl Folder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    fn describe(&self, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        let _ = writeln!(out, "{indent}[{}]", self.name);
        for control in &self.controls {
            match control {
                Control::Button { label, .. } => {
                    let _ = writeln!(out, "{indent}  {label}");
                }
                Control::Slider {
                    label, min, max, step,
                } => {
                    let _ = writeln!(out, "{indent}  {label} ({min}..{max}, step {step})");
                }
            }
        }
        for folder in &self.folders {
            folder.describe(depth + 1, out);
        }
    }

    fn press(&self, path: &str) -> Option<PanelAction> {
        let rest = path.strip_prefix(self.name.as_str())?.strip_prefix('/')?;
        self.controls
            .iter()
            .find_map(|control| match control {
                Control::Button { label, action } if label == rest => Some(*action),
                _ => None,
            })
            .or_else(|| self.folders.iter().find_map(|folder| folder.press(rest)))
    }
}

/// One avatar's folder: its name and the button label of each clip.
#[derive(Clone, Debug, PartialEq)]
pub struct AvatarControls {
    pub name: String,
    pub clip_labels: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ControlPanel {
    pub folders: Vec<Folder>,
    bindings: Vec<(KeyCode, PanelAction)>,
    immersive: bool,
}

const CLIP_KEYS: [KeyCode; 9] = [
    KeyCode::Digit1,
    KeyCode::Digit2,
    KeyCode::Digit3,
    KeyCode::Digit4,
    KeyCode::Digit5,
    KeyCode::Digit6,
    KeyCode::Digit7,
    KeyCode::Digit8,
    KeyCode::Digit9,
];

/// Pan change per arrow key press.
pub const PAN_NUDGE: f32 = 0.25;

impl ControlPanel {
    pub fn new(avatars: &[AvatarControls], pan_range: (f32, f32), pan_step: f32) -> Self {
        let mut bindings = Vec::new();
        let mut keys = CLIP_KEYS.iter();

        let mut animations = Folder::new("Animations");
        for (avatar, controls) in avatars.iter().enumerate() {
            let mut folder = Folder::new(controls.name.clone());
            for (clip, label) in controls.clip_labels.iter().enumerate() {
                let action = PanelAction::SetClip { avatar, clip };
                folder.controls.push(Control::button(label.clone(), action));
                if let Some(key) = keys.next() {
                    bindings.push((*key, action));
                }
            }
            animations.folders.push(folder);
        }
        let mut scene = Folder::new("Scene");
        scene
            .controls
            .push(Control::button("Rotation On/Off", PanelAction::ToggleRotation));
        animations.folders.push(scene);

        let mut audio = Folder::new("Audio");
        audio
            .controls
            .push(Control::button("Mute All", PanelAction::MuteAll));
        audio.controls.push(Control::button(
            "Ambient Sound On/Off",
            PanelAction::ToggleAmbient,
        ));
        let mut positional = Folder::new("Positional Audio");
        positional
            .controls
            .push(Control::button("Radio On/Off", PanelAction::ToggleRadio));
        positional.controls.push(Control::Slider {
            label: "Pan".to_string(),
            min: pan_range.0,
            max: pan_range.1,
            step: pan_step,
        });
        audio.folders.push(positional);

        let mut vr = Folder::new("VR");
        vr.controls
            .push(Control::button("Enter VR", PanelAction::ToggleImmersive));

        bindings.extend([
            (KeyCode::KeyT, PanelAction::ToggleRotation),
            (KeyCode::KeyM, PanelAction::MuteAll),
            (KeyCode::KeyB, PanelAction::ToggleAmbient),
            (KeyCode::KeyR, PanelAction::ToggleRadio),
            (KeyCode::ArrowLeft, PanelAction::NudgePan(-PAN_NUDGE)),
            (KeyCode::ArrowRight, PanelAction::NudgePan(PAN_NUDGE)),
            (KeyCode::KeyV, PanelAction::ToggleImmersive),
        ]);

        Self {
            folders: vec![animations, audio, vr],
            bindings,
            immersive: false,
        }
    }

    pub fn action_for_key(&self, key: KeyCode) -> Option<PanelAction> {
        self.bindings
            .iter()
            .find(|(bound, _)| *bound == key)
            .map(|(_, action)| *action)
    }

    pub fn key_for(&self, action: PanelAction) -> Option<KeyCode> {
        self.bindings
            .iter()
            .find(|(_, bound)| *bound == action)
            .map(|(key, _)| *key)
    }

    /// Presses the button at a `/`-separated path such as
    /// `"Audio/Positional Audio/Radio On/Off"`. Sliders cannot be pressed.
    pub fn press(&self, path: &str) -> Option<PanelAction> {
        self.folders.iter().find_map(|folder| folder.press(path))
    }

    /// Relabels the immersive button after the mode changed.
    pub fn set_immersive(&mut self, immersive: bool) {
        self.immersive = immersive;
        let label = if immersive { "Exit VR" } else { "Enter VR" };
        for folder in &mut self.folders {
            for control in &mut folder.controls {
                if let Control::Button {
                    label: current,
                    action: PanelAction::ToggleImmersive,
                } = control
                {
                    *current = label.to_string();
                }
            }
        }
    }

    pub fn is_immersive(&self) -> bool {
        self.immersive
    }

    /// The folder tree and the key bindings as text.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for folder in &self.folders {
            folder.describe(0, &mut out);
        }
        let _ = writeln!(out, "keys:");
        for (key, action) in &self.bindings {
            let _ = writeln!(out, "  {key:?}: {action:?}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> ControlPanel {
        let avatars = [
            AvatarControls {
                name: "Sitting Woman".to_string(),
                clip_labels: vec!["Clap".into(), "Yell".into(), "Cheer".into()],
            },
            AvatarControls {
                name: "Dancing Woman".to_string(),
                clip_labels: vec!["Shuffle".into(), "Brooklyn Uprock".into(), "Twerk".into()],
            },
        ];
        ControlPanel::new(&avatars, (-4.0, 4.0), 0.001)
    }

    #[test]
    fn digits_select_clips_in_panel_order() {
        let panel = panel();
        assert_eq!(
            panel.action_for_key(KeyCode::Digit5),
            Some(PanelAction::SetClip { avatar: 1, clip: 1 })
        );
        assert_eq!(panel.action_for_key(KeyCode::Digit7), None);
        assert_eq!(panel.key_for(PanelAction::MuteAll), Some(KeyCode::KeyM));
    }

    #[test]
    fn buttons_are_found_by_path() {
        let panel = panel();
        assert_eq!(
            panel.press("Audio/Positional Audio/Radio On/Off"),
            Some(PanelAction::ToggleRadio)
        );
        assert_eq!(
            panel.press("Animations/Scene/Rotation On/Off"),
            Some(PanelAction::ToggleRotation)
        );
        assert_eq!(
            panel.press("Animations/Dancing Woman/Twerk"),
            Some(PanelAction::SetClip { avatar: 1, clip: 2 })
        );
        assert_eq!(panel.press("Audio/Positional Audio/Pan"), None);
        assert_eq!(panel.press("Audio/Nope"), None);
    }

    #[test]
    fn immersive_button_is_relabelled() {
        let mut panel = panel();
        panel.set_immersive(true);
        assert_eq!(panel.press("VR/Exit VR"), Some(PanelAction::ToggleImmersive));
        assert!(panel.describe().contains("Exit VR"));
    }
}
