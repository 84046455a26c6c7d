//! Engine data structures: poses, atlases and the scene graph.
//!
//! - `pose` holds the 2D position/rotation/scale value type and its composition
//! - `texture` describes texture atlases cut into tiles
//! - `scene_graph` enables hierarchical scene organization

pub mod pose;
pub mod scene_graph;
pub mod texture;
