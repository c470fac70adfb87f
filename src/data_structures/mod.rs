//! Engine data structures: meshes, materials, textures, scene graphs, and instances.
//!
//! This module contains the core data types for scene representation:
//!
//! - `model` contains vertex layouts and the GPU mesh and material resources
//! - `material` describes how surfaces are shaded, independent of the GPU
//! - `geometry` generates spheres, cylinders and planes
//! - `texture` contains the GPU texture wrapper and creation utilities
//! - `instance` holds per-node transformation data
//! - `scene_graph` enables hierarchical scene organization

pub mod geometry;
pub mod instance;
pub mod material;
pub mod model;
pub mod scene_graph;
pub mod texture;
