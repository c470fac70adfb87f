use cgmath::Matrix4;
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{instance::Instance, model},
    resources::{animation::AnimationClip, texture::ImageData},
};

/// Decoded, CPU-side triangle mesh.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<model::ModelVertex>,
    pub indices: Vec<u32>,
    /// One entry per vertex for skinned meshes, empty otherwise.
    pub skin: Vec<model::SkinVertex>,
}

impl MeshData {
    pub fn new(name: impl Into<String>, vertices: Vec<model::ModelVertex>, indices: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            vertices,
            indices,
            skin: Vec::new(),
        }
    }

    pub fn with_skin(mut self, skin: Vec<model::SkinVertex>) -> Self {
        self.skin = skin;
        self
    }

    pub fn is_skinned(&self) -> bool {
        !self.skin.is_empty()
    }

    /// Whether the indices form whole triangles inside the vertex list and a
    /// skin, if any, covers every vertex.
    pub fn is_valid(&self) -> bool {
        let len = self.vertices.len() as u32;
        self.indices.len() % 3 == 0
            && self.indices.iter().all(|&i| i < len)
            && (self.skin.is_empty() || self.skin.len() == self.vertices.len())
    }

    pub fn upload(&self, device: &wgpu::Device) -> model::Mesh {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", self.name)),
            contents: bytemuck::cast_slice(&self.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", self.name)),
            contents: bytemuck::cast_slice(&self.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let skin_buffer = self.is_skinned().then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{:?} Skin Buffer", self.name)),
                contents: bytemuck::cast_slice(&self.skin),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });

        model::Mesh {
            name: self.name.clone(),
            vertex_buffer,
            index_buffer,
            skin_buffer,
            num_elements: self.indices.len() as u32,
        }
    }

    /**
     * Obj files and generated geometry don't come with tangents and bitangents so
     * they have to be calculated for normal maps to work correctly.
     */
    pub fn compute_tangents(&mut self) {
        let vertices = &mut self.vertices;
        for v in vertices.iter_mut() {
            v.tangent = [0.0; 3];
            v.bitangent = [0.0; 3];
        }
        let mut triangles_included = vec![0u32; vertices.len()];

        // Calculate tangents and bitangets. We're going to
        // use the triangles, so we need to loop through the
        // indices in chunks of 3
        for c in self.indices.chunks_exact(3) {
            let (i0, i1, i2) = (c[0] as usize, c[1] as usize, c[2] as usize);
            if i0 >= vertices.len() || i1 >= vertices.len() || i2 >= vertices.len() {
                continue;
            }
            let v0 = vertices[i0];
            let v1 = vertices[i1];
            let v2 = vertices[i2];

            let pos0: cgmath::Vector3<_> = v0.position.into();
            let pos1: cgmath::Vector3<_> = v1.position.into();
            let pos2: cgmath::Vector3<_> = v2.position.into();

            let uv0: cgmath::Vector2<_> = v0.tex_coords.into();
            let uv1: cgmath::Vector2<_> = v1.tex_coords.into();
            let uv2: cgmath::Vector2<_> = v2.tex_coords.into();

            // Calculate the edges of the triangle
            let delta_pos1 = pos1 - pos0;
            let delta_pos2 = pos2 - pos0;

            // This will give us a direction to calculate the
            // tangent and bitangent
            let delta_uv1 = uv1 - uv0;
            let delta_uv2 = uv2 - uv0;

            // Solving the following system of equations will
            // give us the tangent and bitangent.
            //     delta_pos1 = delta_uv1.x * T + delta_u.y * B
            //     delta_pos2 = delta_uv2.x * T + delta_uv2.y * B
            let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
            if det.abs() < f32::EPSILON {
                // degenerate uv mapping
                continue;
            }
            let r = 1.0 / det;
            let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) * r;
            // We flip the bitangent to enable right-handed normal
            // maps with wgpu texture coordinate system
            let bitangent = (delta_pos2 * delta_uv1.x - delta_pos1 * delta_uv2.x) * -r;

            // We'll use the same tangent/bitangent for each vertex in the triangle
            for i in [i0, i1, i2] {
                vertices[i].tangent = (tangent + cgmath::Vector3::from(vertices[i].tangent)).into();
                vertices[i].bitangent =
                    (bitangent + cgmath::Vector3::from(vertices[i].bitangent)).into();
                // Used to average the tangents/bitangents
                triangles_included[i] += 1;
            }
        }

        // Average the tangents/bitangents
        for (i, n) in triangles_included.into_iter().enumerate() {
            if n == 0 {
                continue;
            }
            let denom = 1.0 / n as f32;
            let v = &mut vertices[i];
            v.tangent = (cgmath::Vector3::from(v.tangent) * denom).into();
            v.bitangent = (cgmath::Vector3::from(v.bitangent) * denom).into();
        }
    }
}

/// One drawable part of an asset node: a mesh, the image its material
/// samples and the skin deforming it, all as indices into the owning
/// [`MeshAsset`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Primitive {
    pub mesh: usize,
    pub image: Option<usize>,
    pub skin: Option<usize>,
}

/// The joints a skinned mesh follows, as indices into [`MeshAsset::nodes`],
/// with the inverse bind matrix of each.
#[derive(Clone, Debug, PartialEq)]
pub struct Skin {
    pub joints: Vec<usize>,
    pub inverse_bind: Vec<Matrix4<f32>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssetNode {
    pub name: String,
    pub local: Instance,
    /// Index of the parent in [`MeshAsset::nodes`]; roots have none.
    pub parent: Option<usize>,
    pub primitives: Vec<Primitive>,
}

/// A decoded model file: its node hierarchy, meshes, embedded images and
/// animation clips. Nodes are stored parents first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshAsset {
    pub name: String,
    pub nodes: Vec<AssetNode>,
    pub meshes: Vec<MeshData>,
    pub images: Vec<ImageData>,
    pub clips: Vec<AnimationClip>,
    pub skins: Vec<Skin>,
}

impl MeshAsset {
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(idx, _)| idx)
    }

    pub fn children(&self, parent: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, node)| node.parent == Some(parent))
            .map(|(idx, _)| idx)
    }

    /// Takes the clips out of an asset that only carries animation.
    pub fn into_clips(self) -> Vec<AnimationClip> {
        self.clips
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::model::ModelVertex;

    fn vertex(position: [f32; 3], tex_coords: [f32; 2]) -> ModelVertex {
        ModelVertex {
            position,
            tex_coords,
            normal: [0.0, 0.0, 1.0],
            ..Default::default()
        }
    }

    #[test]
    fn tangent_follows_the_u_axis() {
        let mut mesh = MeshData::new(
            "quad",
            vec![
                vertex([0.0, 0.0, 0.0], [0.0, 1.0]),
                vertex([1.0, 0.0, 0.0], [1.0, 1.0]),
                vertex([0.0, 1.0, 0.0], [0.0, 0.0]),
            ],
            vec![0, 1, 2],
        );
        mesh.compute_tangents();
        for v in &mesh.vertices {
            assert!((v.tangent[0] - 1.0).abs() < 1e-5);
            assert!(v.tangent[1].abs() < 1e-5);
        }
    }

    #[test]
    fn out_of_range_indices_are_invalid() {
        let mesh = MeshData::new("broken", vec![vertex([0.0; 3], [0.0; 2])], vec![0, 0, 3]);
        assert!(!mesh.is_valid());
    }

    #[test]
    fn a_skin_must_cover_every_vertex() {
        let vertices = vec![vertex([0.0; 3], [0.0; 2]); 3];
        let skin = model::SkinVertex::new([0; 4], [1.0, 0.0, 0.0, 0.0]);
        let mesh = MeshData::new("skinned", vertices, vec![0, 1, 2]);
        assert!(mesh.clone().with_skin(vec![skin; 3]).is_valid());
        assert!(!mesh.with_skin(vec![skin; 2]).is_valid());
    }
}
