//! Wavefront OBJ decoding.
//!
//! Materials referenced by `mtllib` are not read: every OBJ in the scene gets its
//! material assigned when it is placed.

use std::io::{BufReader, Cursor};

use anyhow::Context as _;

use crate::{
    data_structures::{instance::Instance, model},
    resources::mesh::{AssetNode, MeshAsset, MeshData, Primitive},
};

/// Decodes an OBJ file into a root node with one child node per object.
pub async fn decode(url: &str, bytes: &[u8]) -> anyhow::Result<MeshAsset> {
    let mut obj_reader = BufReader::new(Cursor::new(bytes));

    let (models, _) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |_| async move { tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(Vec::<u8>::new()))) },
    )
    .await
    .with_context(|| format!("invalid OBJ {url}"))?;

    let mut asset = MeshAsset {
        name: url.to_string(),
        ..Default::default()
    };
    asset.nodes.push(AssetNode {
        name: url.to_string(),
        local: Instance::new(),
        parent: None,
        primitives: Vec::new(),
    });

    for (idx, m) in models.iter().enumerate() {
        let mesh = to_mesh_data(m);
        if !mesh.is_valid() {
            log::warn!(
                "Mesh at index {} in file {} could not be loaded due to overflows. Make sure you use the right scale in your .obj export settings.",
                idx,
                url
            );
            continue;
        }
        asset.nodes.push(AssetNode {
            name: m.name.clone(),
            local: Instance::new(),
            parent: Some(0),
            primitives: vec![Primitive {
                mesh: asset.meshes.len(),
                ..Default::default()
            }],
        });
        asset.meshes.push(mesh);
    }
    anyhow::ensure!(!asset.meshes.is_empty(), "{url} contains no usable mesh");
    Ok(asset)
}

fn to_mesh_data(m: &tobj::Model) -> MeshData {
    let vertices = (0..m.mesh.positions.len() / 3)
        .map(|i| model::ModelVertex {
            position: [
                m.mesh.positions[i * 3],
                m.mesh.positions[i * 3 + 1],
                m.mesh.positions[i * 3 + 2],
            ],
            tex_coords: [
                m.mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                1.0 - m.mesh.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
            ],
            normal: [
                m.mesh.normals.get(i * 3).map_or(0.0, |f| *f),
                m.mesh.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                m.mesh.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
            ],
            // We'll calculate these later
            tangent: [0.0; 3],
            bitangent: [0.0; 3],
        })
        .collect::<Vec<_>>();

    let mut mesh = MeshData::new(m.name.clone(), vertices, m.mesh.indices.clone());
    if mesh.is_valid() {
        mesh.compute_tangents();
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "mtllib grass.mtl
o Patch
v 0 0 0
v 1 0 0
v 1 0 1
v 0 0 1
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 1 0
usemtl grass
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn quads_are_triangulated_under_a_root() {
        let asset = futures::executor::block_on(decode("grass.obj", QUAD.as_bytes())).expect("decode");
        assert_eq!(asset.nodes.len(), 2);
        assert_eq!(asset.nodes[1].name, "Patch");
        assert_eq!(asset.nodes[1].parent, Some(0));
        assert_eq!(asset.meshes[0].indices.len(), 6);
        assert!(asset.meshes[0].vertices.iter().all(|v| v.normal == [0.0, 1.0, 0.0]));
    }

    #[test]
    fn empty_files_are_rejected() {
        assert!(futures::executor::block_on(decode("empty.obj", b"")).is_err());
    }
}
