//! Scene graph and hierarchical scene organization.
//!
//! The graph is an arena of [`Node`]s addressed by [`NodeId`]. Every node holds
//! a local transform relative to its parent and a cached world transform that
//! [`SceneGraph::update_world_transforms`] recomputes top-down as
//! `parent.world * local`. Nodes are tagged with [`Capabilities`] at
//! construction; bulk edits walk a subtree and only touch nodes carrying the
//! requested capability.

use std::ops::{BitOr, Index, IndexMut};

use crate::data_structures::{instance::Instance, material::MaterialId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of a mesh in the scene's mesh table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub usize);

/// Index of a skin in the scene's skin table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SkinId(pub usize);

/// Capability tags of a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Self = Self(0);
    /// The node draws a mesh and therefore takes part in shadowing.
    pub const HAS_SHADOW: Self = Self(1);
    pub const CAST_SHADOW: Self = Self(1 << 1);
    pub const RECEIVE_SHADOW: Self = Self(1 << 2);
    /// The node draws a mesh whose material can be replaced.
    pub const HAS_MATERIAL_SLOT: Self = Self(1 << 3);
    /// Every capability a mesh node is created with.
    pub const MESH: Self = Self(Self::HAS_SHADOW.0 | Self::HAS_MATERIAL_SLOT.0);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub name: String,
    pub local: Instance,
    pub world: Instance,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub capabilities: Capabilities,
    pub mesh: Option<MeshId>,
    pub material: Option<MaterialId>,
    /// Joints deforming the mesh; skinned meshes ignore their own transform.
    pub skin: Option<SkinId>,
    pub visible: bool,
}

impl Node {
    fn new(name: impl Into<String>, parent: Option<NodeId>, local: Instance) -> Self {
        Self {
            name: name.into(),
            local,
            world: local,
            parent,
            children: Vec::new(),
            capabilities: Capabilities::NONE,
            mesh: None,
            material: None,
            skin: None,
            visible: true,
        }
    }

    pub fn is_drawable(&self) -> bool {
        self.visible && self.mesh.is_some() && self.material.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct SceneGraph {
    nodes: Vec<Node>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new("root", None, Instance::new())],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // the root always exists
        false
    }

    /// Adds an empty group node below `parent`.
    pub fn add_group(&mut self, parent: NodeId, name: &str, local: Instance) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(name, Some(parent), local));
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Adds a node drawing `mesh` with `material` below `parent`.
    pub fn add_mesh(
        &mut self,
        parent: NodeId,
        name: &str,
        local: Instance,
        mesh: MeshId,
        material: Option<MaterialId>,
    ) -> NodeId {
        let id = self.add_group(parent, name, local);
        let node = &mut self.nodes[id.0];
        node.mesh = Some(mesh);
        node.material = material;
        node.capabilities = Capabilities::MESH;
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(idx, node)| (NodeId(idx), node))
    }

    /// Ids of `id` and all of its descendants, parents before children.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.nodes[current.0].children.iter().rev().copied());
        }
        out
    }

    pub fn find_in_subtree(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.subtree(id)
            .into_iter()
            .find(|&node| self.nodes[node.0].name == name)
    }

    /// Calls `f` on every node below and including `id` that carries all of
    /// `required`.
    pub fn visit_mut(&mut self, id: NodeId, required: Capabilities, mut f: impl FnMut(&mut Node)) {
        for node in self.subtree(id) {
            let node = &mut self.nodes[node.0];
            if node.capabilities.contains(required) {
                f(node);
            }
        }
    }

    /// Deep-copies the subtree at `source` below `parent`. The copy keeps the
    /// source's local transforms, meshes and materials.
    pub fn clone_subtree(&mut self, source: NodeId, parent: NodeId) -> NodeId {
        let template = self.nodes[source.0].clone();
        let copy = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            ..template.clone()
        });
        self.nodes[parent.0].children.push(copy);
        for child in template.children {
            self.clone_subtree(child, copy);
        }
        copy
    }

    /// Recomputes every world transform from the local transforms.
    pub fn update_world_transforms(&mut self) {
        let mut stack = vec![(self.root(), Instance::new())];
        while let Some((id, parent_world)) = stack.pop() {
            let node = &mut self.nodes[id.0];
            node.world = &parent_world * &node.local;
            let world = node.world;
            stack.extend(node.children.iter().map(|&child| (child, world)));
        }
    }

    /// Nodes that draw something this frame.
    pub fn drawables(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.iter().filter(|(_, node)| node.is_drawable() && self.is_visible(node))
    }

    fn is_visible(&self, node: &Node) -> bool {
        let mut current = node.parent;
        while let Some(parent) = current {
            let parent = &self.nodes[parent.0];
            if !parent.visible {
                return false;
            }
            current = parent.parent;
        }
        true
    }
}

impl Index<NodeId> for SceneGraph {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Self::Output {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for SceneGraph {
    fn index_mut(&mut self, id: NodeId) -> &mut Self::Output {
        &mut self.nodes[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Vector3;

    #[test]
    fn world_transforms_compose_down_the_tree() {
        let mut graph = SceneGraph::new();
        let globe = graph.add_group(graph.root(), "globe", Instance::placed([0.0, -9.0, -5.0], 0.0, 1.0));
        let quad = graph.add_group(globe, "quad", Instance::placed([-8.0, 5.5, 9.0], 0.0, 0.5));
        let bench = graph.add_group(quad, "bench", Instance::new().with_position([2.0, 0.0, 0.0]));
        graph.update_world_transforms();
        assert_eq!(graph[bench].world.position, Vector3::new(-7.0, -3.5, 4.0));
        assert_eq!(graph[bench].world.scale, Vector3::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn clones_are_deep_and_independent() {
        let mut graph = SceneGraph::new();
        let bench = graph.add_group(graph.root(), "bench", Instance::new());
        let seat = graph.add_mesh(bench, "seat", Instance::new(), MeshId(0), None);
        let copy = graph.clone_subtree(bench, graph.root());
        assert_ne!(copy, bench);
        let copied_seat = graph[copy].children[0];
        assert_ne!(copied_seat, seat);
        assert_eq!(graph[copied_seat].mesh, Some(MeshId(0)));

        graph[copy].local = Instance::new().with_position([1.0, 0.0, 0.0]);
        assert_eq!(graph[bench].local, Instance::new());
        assert_eq!(graph[graph.root()].children, vec![bench, copy]);
    }

    #[test]
    fn visitor_only_touches_tagged_nodes() {
        let mut graph = SceneGraph::new();
        let quad = graph.add_group(graph.root(), "quad", Instance::new());
        let mesh = graph.add_mesh(quad, "body", Instance::new(), MeshId(3), None);
        graph.visit_mut(quad, Capabilities::HAS_SHADOW, |node| {
            node.capabilities
                .insert(Capabilities::CAST_SHADOW | Capabilities::RECEIVE_SHADOW);
        });
        assert!(graph[mesh].capabilities.contains(Capabilities::RECEIVE_SHADOW));
        assert!(!graph[quad].capabilities.contains(Capabilities::CAST_SHADOW));
    }

    #[test]
    fn hidden_groups_hide_their_meshes() {
        let mut graph = SceneGraph::new();
        let group = graph.add_group(graph.root(), "group", Instance::new());
        graph.add_mesh(group, "mesh", Instance::new(), MeshId(0), Some(MaterialId(0)));
        assert_eq!(graph.drawables().count(), 1);
        graph[group].visible = false;
        assert_eq!(graph.drawables().count(), 0);
    }
}
