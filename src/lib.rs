//! tile-ngin
//!
//! The spatial core of a small 2D engine: a scene graph with hierarchical
//! transforms, a chunked tile world streamed through a fixed number of GPU
//! buffer slots, and GJK/EPA collision detection driving simple rigid-body
//! physics. Window handling, input and shader management are left to the
//! embedding application; this crate hands it transforms, vertex data and
//! draw ranges.
//!
//! High-level modules
//! - `config`: engine tunables read from RON
//! - `data_structures`: poses, texture atlases and the scene graph
//! - `flow`: per-tick orchestration and logger setup
//! - `grid`: chunked tile storage, residency loader and map files
//! - `physics`: collider shapes, GJK/EPA and rigid bodies
//! - `render`: slot buffers and the renderer contract
//!

pub mod config;
pub mod data_structures;
pub mod flow;
pub mod grid;
pub mod physics;
pub mod render;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
