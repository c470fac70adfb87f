use futures::{StreamExt, executor::block_on};
use snow_globe::{
    SceneConfig, SceneContext,
    data_structures::material::Shading,
    resources::{AssetKind, AssetSource, Completion},
    scene::plan::AssetTarget,
};

use crate::common::test_utils::*;

mod common;

/// Serves every planned texture and sound; every model is missing.
fn source_without_models(scene: &SceneContext) -> AssetSource {
    let png = png_bytes();
    let files: Vec<_> = scene
        .plan()
        .iter()
        .flat_map(|task| task.assets())
        .filter_map(|asset| match asset.kind {
            AssetKind::Texture => Some((asset.url.clone(), png.clone())),
            AssetKind::Audio => Some((asset.url.clone(), vec![0u8; 32])),
            AssetKind::Mesh => None,
        })
        .collect();
    AssetSource::memory(files)
}

fn run_all(scene: &mut SceneContext, source: AssetSource) -> Vec<Completion<AssetTarget>> {
    let tasks = scene.start_loading();
    let streams = tasks.into_iter().map(|task| task.into_stream(source.clone()));
    block_on(futures::stream::iter(streams).flatten().collect())
}

#[test]
fn the_scene_survives_missing_models() {
    let mut scene = SceneContext::new(SceneConfig::default());
    let source = source_without_models(&scene);
    let completions = run_all(&mut scene, source);
    let meshes = completions
        .iter()
        .filter(|c| c.result.is_err())
        .count();
    for completion in completions {
        scene.complete(completion);
    }

    assert!(scene.loading.is_hidden());
    assert_eq!(scene.loading.percent(), 100);
    assert_eq!(scene.loading.failed(), meshes);
    assert!(scene.sky_faces().is_some());
    assert!(scene.blenders.iter().all(|b| !b.is_ready()));

    let ambient = scene.audio.source(scene.ambient_source());
    assert!(ambient.is_some_and(|s| s.is_playing()));

    let ground = scene
        .assets
        .material(scene.materials.ground)
        .expect("ground material");
    let Shading::Standard(material) = ground.shading() else {
        panic!("ground is a standard material");
    };
    assert!(material.map.is_some());

    // the scene keeps ticking without any model
    scene.tick(1.0 / 60.0);
    assert!(scene.time() > 0.0);
}

#[test]
fn avatar_chains_fail_as_a_unit() {
    let mut scene = SceneContext::new(SceneConfig::default());
    let source = source_without_models(&scene);
    let completions = run_all(&mut scene, source);

    let clips: Vec<_> = completions
        .iter()
        .filter(|c| matches!(c.target, AssetTarget::AvatarClip { .. }))
        .collect();
    assert_eq!(clips.len(), 4);
    for clip in clips {
        let err = clip.result.as_ref().expect_err("the rig never loaded");
        assert!(format!("{err:#}").contains("skipped"));
    }
}
