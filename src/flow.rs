//! Per-tick orchestration.
//!
//! A [`Simulation`] bundles the scene, the tile grid and the physics world
//! and advances them in a fixed order every tick:
//!
//! 1. chunk residency follows the tracked node ([`Simulation::stream`])
//! 2. the caller renders (slot uploads, draw calls, drawables)
//! 3. rigid bodies integrate, then collisions are resolved ([`Simulation::simulate`])
//!
//! Corrections made in step 3 only become visible in the next tick's render.

use std::{path::Path, time::Duration};

use crate::{
    config::EngineConfig,
    data_structures::scene_graph::{NodeId, Scene},
    grid::{
        TileGrid,
        loader::{ChunkLoader, LoadReport},
    },
    physics::{Contact, Physics},
};

/// Initialise `env_logger` once. Later calls are ignored.
pub fn init_logger() {
    if let Err(e) = env_logger::try_init() {
        log::debug!("logger already initialised: {}", e);
    }
}

/// What happened during one [`Simulation::step`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    pub load: LoadReport,
    pub contacts: Vec<Contact>,
}

pub struct Simulation {
    pub scene: Scene,
    pub grid: TileGrid,
    pub physics: Physics,
    loader: Option<ChunkLoader>,
    config: EngineConfig,
}

impl Simulation {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            scene: Scene::new(),
            grid: TileGrid::from_config(&config.grid),
            physics: Physics::new(config.physics.clone()),
            loader: None,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Makes the chunk window follow `node`.
    pub fn track(&mut self, node: NodeId) {
        match &mut self.loader {
            Some(loader) => loader.set_node(node),
            None => self.loader = Some(ChunkLoader::new(node, self.config.loader.radius)),
        }
    }

    pub fn loader(&self) -> Option<&ChunkLoader> {
        self.loader.as_ref()
    }

    pub fn loader_mut(&mut self) -> Option<&mut ChunkLoader> {
        self.loader.as_mut()
    }

    /// Updates chunk residency around the tracked node.
    pub fn stream(&mut self) -> LoadReport {
        match &mut self.loader {
            Some(loader) => loader.load_chunks_square(&self.scene, &mut self.grid),
            None => LoadReport::default(),
        }
    }

    /// Integrates every body by `dt`, then runs the collision pass.
    pub fn simulate(&mut self, dt: Duration) -> Vec<Contact> {
        self.physics.update_all(&mut self.scene, dt.as_secs_f32());
        self.physics.check_all(&mut self.scene)
    }

    /// One full tick. `render` runs between streaming and physics.
    pub fn step(&mut self, dt: Duration, render: impl FnOnce(&mut Self)) -> TickReport {
        let load = self.stream();
        render(self);
        let contacts = self.simulate(dt);
        TickReport { load, contacts }
    }

    /// Loads a map into the grid. Residency is recomputed on the next tick.
    pub fn load_map(&mut self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        self.grid.load_file(path)?;
        if let Some(loader) = &mut self.loader {
            loader.reset();
        }
        Ok(())
    }

    pub fn save_map(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        self.grid.save_file(path)
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
