//! Engine tunables.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```ron
//! (
//!     grid: (chunk_size: (16, 16), slots: 25),
//!     loader: (radius: 2),
//! )
//! ```

use std::{fs, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub grid: GridConfig,
    pub loader: LoaderConfig,
    pub physics: PhysicsConfig,
}

impl EngineConfig {
    pub fn from_ron_str(text: &str) -> anyhow::Result<Self> {
        ron::from_str(text).context("failed to parse engine config")
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config {}", path.display()))?;
        Self::from_ron_str(&text).with_context(|| format!("in {}", path.display()))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// World size of one tile.
    pub tile_size: (f32, f32),
    /// Tiles per chunk along x and y.
    pub chunk_size: (u32, u32),
    /// Number of buffer slots, i.e. chunks that can be resident at once.
    pub slots: usize,
    pub layer: i32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            tile_size: (1.0, 1.0),
            chunk_size: (32, 32),
            slots: 9,
            layer: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Chebyshev radius of the resident window, in chunks.
    pub radius: u32,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { radius: 1 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// EPA convergence threshold, also added to every resolution vector.
    pub epsilon: f32,
    /// Cap for GJK and EPA iterations.
    pub max_iterations: usize,
    /// Linear speeds below this snap to zero.
    pub linear_deadzone: f32,
    /// Angular speeds (degrees/s) below this snap to zero.
    pub angular_deadzone: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.001,
            max_iterations: 64,
            linear_deadzone: 0.01,
            angular_deadzone: 0.1,
        }
    }
}
