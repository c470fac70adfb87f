use snow_globe::{
    SceneConfig, SceneContext, SceneError,
    animation::blender::BlendState,
    audio::AudioCommand,
    data_structures::{
        material::{Shading, TextureSlot},
        scene_graph::Capabilities,
    },
    panel::PanelAction,
    resources::{Completion, Loaded, loading::LoadEvent},
    scene::{
        gpu::frame_batches,
        plan::{AssetTarget, GROUND_TEXTURES, SKY_FACES},
    },
};
use winit::keyboard::KeyCode;

use crate::common::test_utils::*;

mod common;

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}

fn test_scene() -> SceneContext {
    let mut scene = SceneContext::with_avatars(SceneConfig::default(), vec![test_avatar()]);
    scene.start_loading();
    scene
}

fn load_avatar(scene: &mut SceneContext) {
    let rig_url = "tester/a.glb";
    scene.complete(ok(
        rig_url,
        AssetTarget::AvatarRig { avatar: 0 },
        Loaded::Mesh(rig(clip(1.0))),
    ));
    for (slot, x) in [(1, 2.0), (2, 4.0)] {
        scene.complete(ok(
            &format!("tester/{slot}.glb"),
            AssetTarget::AvatarClip { avatar: 0, clip: slot },
            Loaded::Mesh(clip_asset(clip(x))),
        ));
    }
}

/// The three files of the test avatar: the rig with clip 0, then clips 1 and 2.
fn avatar_file(file: usize) -> Completion<AssetTarget> {
    let url = test_avatar().clip_files[file];
    match file {
        0 => ok(
            url,
            AssetTarget::AvatarRig { avatar: 0 },
            Loaded::Mesh(rig(clip(1.0))),
        ),
        clip_slot => ok(
            url,
            AssetTarget::AvatarClip {
                avatar: 0,
                clip: clip_slot,
            },
            Loaded::Mesh(clip_asset(clip(2.0 * clip_slot as f32))),
        ),
    }
}

#[test]
fn clips_arriving_in_any_order_start_the_initial_clip() {
    let orders = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];
    for order in orders {
        let mut scene = test_scene();
        for (arrived, &file) in order.iter().enumerate() {
            assert!(
                !matches!(scene.blenders[0].state(), BlendState::Playing { .. }),
                "{order:?}: playing before file {file} arrived"
            );
            scene.complete(avatar_file(file));
            if arrived < 2 {
                assert_eq!(
                    scene.blenders[0].state(),
                    BlendState::Loading {
                        pending: 2 - arrived
                    },
                    "{order:?}"
                );
            }
        }
        assert_eq!(
            scene.blenders[0].state(),
            BlendState::Playing { active: 1 },
            "{order:?}"
        );
        assert!(close(scene.blenders[0].weight(1), 1.0));

        scene.tick(1.0);
        let hips = scene.avatars[0].bone("Hips").expect("rig is bound");
        assert!(close(scene.graph[hips].local.position.x, 1.0), "{order:?}");
    }
}

#[test]
fn clip_requests_before_loading_are_rejected() {
    let mut scene = test_scene();
    let err = scene
        .apply(PanelAction::SetClip { avatar: 0, clip: 2 })
        .unwrap_err();
    assert!(matches!(err, SceneError::MissingDependency { .. }));
    assert_eq!(scene.blenders[0].state(), BlendState::Empty);
}

#[test]
fn repeating_a_clip_request_fades_once() {
    let mut scene = test_scene();
    load_avatar(&mut scene);

    scene.handle(PanelAction::SetClip { avatar: 0, clip: 2 });
    scene.handle(PanelAction::SetClip { avatar: 0, clip: 2 });
    let blender = &scene.blenders[0];
    assert!(blender.is_transitioning());
    assert_eq!(blender.deferred(), None);

    scene.tick(0.5);
    assert!(close(scene.blenders[0].weight(1), 0.5));
    assert!(close(scene.blenders[0].weight(2), 0.5));

    scene.tick(0.5);
    let blender = &scene.blenders[0];
    assert!(!blender.is_transitioning());
    assert!(close(blender.weight(0), 0.0));
    assert!(close(blender.weight(1), 0.0));
    assert!(close(blender.weight(2), 1.0));
    assert_eq!(blender.active(), Some(2));
}

#[test]
fn a_switch_requested_mid_fade_runs_after_it() {
    let mut scene = test_scene();
    load_avatar(&mut scene);

    scene.handle(PanelAction::SetClip { avatar: 0, clip: 2 });
    scene.tick(0.25);
    scene.handle(PanelAction::SetClip { avatar: 0, clip: 0 });
    assert_eq!(scene.blenders[0].deferred(), Some(0));

    scene.tick(0.75);
    let blender = &scene.blenders[0];
    assert_eq!(blender.active(), Some(0));
    assert!(blender.is_transitioning());
    assert_eq!(blender.deferred(), None);
}

#[test]
fn progress_reaches_100_with_the_last_completion() {
    let mut scene = test_scene();
    let assets: Vec<_> = scene
        .plan()
        .iter()
        .flat_map(|task| task.assets().to_vec())
        .collect();
    assert_eq!(scene.loading.total(), assets.len());

    let (last, rest) = assets.split_last().expect("plan is not empty");
    for asset in rest {
        let events = scene.complete(failed(&asset.url, asset.target));
        assert!(!events.contains(&LoadEvent::Finished));
        assert!(scene.loading.percent() < 100);
        assert!(scene.loading.screen_text().is_some());
    }
    let events = scene.complete(failed(&last.url, last.target));
    assert_eq!(events.last(), Some(&LoadEvent::Finished));
    assert_eq!(scene.loading.percent(), 100);
    assert_eq!(scene.loading.failed(), assets.len());
    assert_eq!(scene.loading.screen_text(), None);
}

#[test]
fn a_failed_texture_leaves_its_slot_empty() {
    let mut scene = test_scene();
    for (url, slot) in GROUND_TEXTURES {
        let target = AssetTarget::GroundTexture(slot);
        if slot == TextureSlot::Map {
            scene.complete(failed(url, target));
        } else {
            scene.complete(ok(url, target, texture(url)));
        }
    }

    let ground = scene
        .assets
        .material(scene.materials.ground)
        .expect("ground material");
    let Shading::Standard(material) = ground.shading() else {
        panic!("ground is a standard material");
    };
    assert_eq!(material.map, None);
    assert!(material.normal_map.is_some());
    assert!(material.roughness_map.is_some());
    assert!(material.ao_map.is_some());
}

#[test]
fn the_sky_needs_all_six_faces() {
    let mut scene = test_scene();
    for (face, url) in SKY_FACES.iter().enumerate().take(5) {
        scene.complete(ok(url, AssetTarget::SkyFace(face), texture(url)));
    }
    assert!(scene.sky_faces().is_none());
    scene.complete(ok(SKY_FACES[5], AssetTarget::SkyFace(5), texture(SKY_FACES[5])));
    assert!(scene.sky_faces().is_some());
}

#[test]
fn immersive_mode_stops_the_globe_but_not_the_stars() {
    let mut scene = test_scene();
    let speed = scene.config.rotation_speed;

    scene.set_immersive(true);
    for _ in 0..10 {
        scene.tick(0.1);
    }
    assert!(close(scene.globe_yaw(), 0.0));
    assert!(close(scene.star_yaw(), -10.0 * 0.1 * speed));

    scene.set_immersive(false);
    for _ in 0..10 {
        scene.tick(0.1);
    }
    assert!(close(scene.globe_yaw(), 10.0 * 0.1 * speed));
    assert!(close(scene.star_yaw(), -20.0 * 0.1 * speed));
}

#[test]
fn rotation_toggle_freezes_both_yaws() {
    let mut scene = test_scene();
    scene.tick(1.0);
    let (globe, stars) = (scene.globe_yaw(), scene.star_yaw());

    scene.handle(PanelAction::ToggleRotation);
    assert_eq!(scene.rotation_speed(), 0.0);
    scene.tick(1.0);
    assert_eq!(scene.globe_yaw(), globe);
    assert_eq!(scene.star_yaw(), stars);
}

#[test]
fn the_immersive_key_relabels_the_panel() {
    let mut scene = test_scene();
    let action = scene.panel.action_for_key(KeyCode::KeyV);
    assert_eq!(action, Some(PanelAction::ToggleImmersive));

    scene.handle(PanelAction::ToggleImmersive);
    assert!(scene.is_immersive());
    assert!(scene.panel.is_immersive());
    assert_eq!(
        scene.panel.press("VR/Exit VR"),
        Some(PanelAction::ToggleImmersive)
    );
}

#[test]
fn muting_twice_restores_the_gain() {
    let mut scene = test_scene();
    let url = "soft-ambient-background-music.mp3";
    scene.complete(ok(url, AssetTarget::AmbientSound, audio(url)));

    let mut output = Recorder::default();
    scene.drain_audio(&mut output);
    assert!(matches!(
        output.0.as_slice(),
        [AudioCommand::Play { looping: true, .. }]
    ));

    scene.handle(PanelAction::MuteAll);
    scene.handle(PanelAction::MuteAll);
    let mut output = Recorder::default();
    scene.drain_audio(&mut output);
    assert_eq!(output.gains(), vec![0.0, scene.config.ambient_volume]);
    assert_eq!(scene.audio.master_gain(), 1.0);
}

#[test]
fn the_radio_needs_its_buffer() {
    let mut scene = test_scene();
    assert!(scene.apply(PanelAction::ToggleRadio).is_err());

    let url = "trendybeatz.mp3";
    scene.complete(ok(url, AssetTarget::RadioSound, audio(url)));
    let radio = scene.radio_source();
    assert!(!scene.audio.source(radio).is_some_and(|s| s.is_playing()));

    scene.apply(PanelAction::ToggleRadio).expect("buffer is loaded");
    assert!(scene.audio.source(radio).is_some_and(|s| s.is_playing()));
}

#[test]
fn pan_is_clamped_and_moves_the_radio() {
    let mut scene = test_scene();
    let radio = scene.groups.radio;

    scene.handle(PanelAction::Pan(10.0));
    assert_eq!(scene.pan(), 4.0);
    assert_eq!(scene.graph[radio].local.position.x, 4.0);

    scene.handle(PanelAction::NudgePan(0.25));
    assert_eq!(scene.pan(), 4.0);

    scene.handle(PanelAction::NudgePan(-0.25));
    assert!(close(scene.pan(), 3.75));
    assert!(close(scene.graph[radio].local.position.x, 3.75));
}

#[test]
fn a_non_finite_pan_keeps_the_radio_in_place() {
    let mut scene = test_scene();
    let radio = scene.groups.radio;
    scene.handle(PanelAction::Pan(2.5));

    for x in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
        let err = scene.apply(PanelAction::Pan(x)).unwrap_err();
        assert!(matches!(err, SceneError::InvalidPan(_)));
        assert_eq!(scene.pan(), 2.5);
        assert_eq!(scene.graph[radio].local.position.x, 2.5);
    }
    scene.handle(PanelAction::NudgePan(f32::NAN));
    assert_eq!(scene.pan(), 2.5);
}

fn url_of(scene: &SceneContext, target: AssetTarget) -> String {
    scene
        .plan()
        .iter()
        .flat_map(|task| task.assets())
        .find(|asset| asset.target == target)
        .map(|asset| asset.url.clone())
        .expect("target is planned")
}

#[test]
fn bench_and_radio_cast_and_receive_shadows() {
    let mut scene = test_scene();
    for target in [AssetTarget::Bench, AssetTarget::Radio] {
        let url = url_of(&scene, target);
        scene.complete(ok(&url, target, Loaded::Mesh(model(&url))));
    }

    let both = Capabilities::CAST_SHADOW | Capabilities::RECEIVE_SHADOW;
    let bench_meshes: Vec<_> = scene
        .graph
        .iter()
        .filter(|(_, node)| node.mesh.is_some() && node.name.starts_with("body#"))
        .collect();
    // the bench, its three copies and the radio
    assert_eq!(bench_meshes.len(), 5);
    for (_, node) in bench_meshes {
        assert!(node.capabilities.contains(both), "{} lacks shadows", node.name);
    }

    // all five share one casting batch whose instances receive shadows
    let frame = frame_batches(&scene);
    let casting: Vec<_> = frame
        .iter()
        .filter(|(key, instances)| key.casts_shadow && instances.len() >= 4)
        .collect();
    assert!(!casting.is_empty());
    for (_, instances) in casting {
        assert!(instances.iter().all(|raw| raw.receives_shadows()));
    }
    // the ground only receives
    assert!(frame.iter().any(|(key, instances)| {
        !key.casts_shadow && instances.iter().all(|raw| raw.receives_shadows())
    }));
}

#[test]
fn skinned_avatars_follow_their_clips() {
    let mut scene = test_scene();
    scene.complete(ok(
        "tester/a.glb",
        AssetTarget::AvatarRig { avatar: 0 },
        Loaded::Mesh(skinned_rig(clip(1.0))),
    ));
    for slot in [1, 2] {
        scene.complete(ok(
            &format!("tester/{slot}.glb"),
            AssetTarget::AvatarClip { avatar: 0, clip: slot },
            Loaded::Mesh(clip_asset(clip(2.0 * slot as f32))),
        ));
    }
    scene.tick(0.0);

    let frame = frame_batches(&scene);
    let (key, instances) = frame
        .iter()
        .find(|(key, _)| key.skin.is_some())
        .expect("the body is drawn skinned");
    assert!(key.casts_shadow);
    assert_eq!(instances.len(), 1);
    let skin = scene
        .assets
        .skin(key.skin.expect("skinned"))
        .cloned()
        .expect("skin exists");
    let hips = scene.avatars[0].bone("Hips").expect("rig is bound");
    let rest = scene.graph[hips].world.position;
    assert_eq!(skin.palette(&scene.graph)[0].w.truncate(), rest);

    scene.tick(1.0);
    let posed = scene.graph[hips].world.position;
    assert!(!close((posed - rest).x.abs() + (posed - rest).z.abs(), 0.0));
    let moved = skin.palette(&scene.graph)[0].w.truncate();
    assert!(close(moved.x, posed.x) && close(moved.y, posed.y) && close(moved.z, posed.z));
}

#[test]
fn teardown_stops_playing_sources() {
    let mut scene = test_scene();
    let url = "soft-ambient-background-music.mp3";
    scene.complete(ok(url, AssetTarget::AmbientSound, audio(url)));
    scene.drain_audio(&mut Recorder::default());

    scene.teardown();
    let mut output = Recorder::default();
    scene.drain_audio(&mut output);
    assert_eq!(
        output.0,
        vec![AudioCommand::Stop {
            source: scene.ambient_source()
        }]
    );
}
