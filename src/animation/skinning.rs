//! Joint palettes of skinned meshes.
//!
//! A skin binds a mesh to joint nodes of the scene graph. Each frame the
//! palette entry of a joint is its world transform times its inverse bind
//! matrix, so a mesh in its bind pose is left where it was authored.

use cgmath::Matrix4;

use crate::data_structures::scene_graph::{NodeId, SceneGraph};

/// Joints a single skin may carry; the shaders size their palette to match.
pub const MAX_JOINTS: usize = 128;

#[derive(Clone, Debug, PartialEq)]
pub struct SkinBinding {
    pub name: String,
    pub joints: Vec<NodeId>,
    pub inverse_bind: Vec<Matrix4<f32>>,
}

impl SkinBinding {
    pub fn new(name: impl Into<String>, joints: Vec<NodeId>, inverse_bind: Vec<Matrix4<f32>>) -> Self {
        let name = name.into();
        if joints.len() > MAX_JOINTS {
            log::warn!("{name}: {} joints, only the first {MAX_JOINTS} deform", joints.len());
        }
        Self {
            name,
            joints,
            inverse_bind,
        }
    }

    /// Skinning matrices for the current world transforms.
    pub fn palette(&self, graph: &SceneGraph) -> Vec<Matrix4<f32>> {
        self.joints
            .iter()
            .zip(&self.inverse_bind)
            .take(MAX_JOINTS)
            .map(|(&joint, inverse_bind)| graph[joint].world.to_matrix() * inverse_bind)
            .collect()
    }

    /// The palette as the shaders read it, padded to [`MAX_JOINTS`].
    pub fn palette_raw(&self, graph: &SceneGraph) -> Vec<[[f32; 4]; 4]> {
        let mut raw: Vec<[[f32; 4]; 4]> = self.palette(graph).into_iter().map(Into::into).collect();
        raw.resize(MAX_JOINTS, Matrix4::from_scale(1.0).into());
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::instance::Instance;
    use cgmath::{SquareMatrix, Vector3, Vector4};

    fn arm() -> (SceneGraph, SkinBinding) {
        let mut graph = SceneGraph::new();
        let hips = graph.add_group(graph.root(), "Hips", Instance::new().with_position([0.0, 1.0, 0.0]));
        graph.update_world_transforms();
        let inverse_bind = graph[hips].world.to_matrix().invert().expect("invertible");
        (graph, SkinBinding::new("arm", vec![hips], vec![inverse_bind]))
    }

    #[test]
    fn the_bind_pose_leaves_vertices_in_place() {
        let (graph, skin) = arm();
        let palette = skin.palette(&graph);
        assert_eq!(palette, vec![Matrix4::identity()]);
    }

    #[test]
    fn moving_a_joint_moves_its_vertices() {
        let (mut graph, skin) = arm();
        let hips = skin.joints[0];
        graph[hips].local.position = Vector3::new(2.0, 1.0, 0.0);
        graph.update_world_transforms();

        let vertex = skin.palette(&graph)[0] * Vector4::new(0.0, 1.0, 0.0, 1.0);
        assert_eq!(vertex, Vector4::new(2.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn the_raw_palette_is_padded_for_the_shaders() {
        let (graph, skin) = arm();
        let raw = skin.palette_raw(&graph);
        assert_eq!(raw.len(), MAX_JOINTS);
        assert_eq!(raw[MAX_JOINTS - 1], Into::<[[f32; 4]; 4]>::into(Matrix4::<f32>::identity()));
    }
}
