//! Shared resource registry.
//!
//! Holds the engines in priority order, the boundary engine and the compile
//! options. It is built once through `&mut self` and then handed to any
//! number of compilations as `&SharedResource` (or inside an `Arc`).

use crate::engine::{cpu_engine, gpu_engine, BoundaryEngine, Engine};
use crate::error::{ForgeError, ForgeResult};
use crate::runtime::options::CompileOptions;
use std::fmt;
use std::sync::Arc;

pub struct SharedResource {
    engines: Vec<Arc<dyn Engine>>,
    boundary: Arc<dyn Engine>,
    options: CompileOptions,
}

impl SharedResource {
    /// Empty registry with the default boundary engine
    pub fn new() -> Self {
        Self {
            engines: Vec::new(),
            boundary: Arc::new(BoundaryEngine::new()),
            options: CompileOptions::default(),
        }
    }

    /// GPU first, vector CPU second
    pub fn with_default_engines() -> Self {
        let mut resource = Self::new();
        resource.engines.push(Arc::new(gpu_engine()));
        resource.engines.push(Arc::new(cpu_engine()));
        resource
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// Builder form of [`register_engine`](Self::register_engine)
    pub fn with_engine(mut self, engine: Arc<dyn Engine>) -> ForgeResult<Self> {
        self.register_engine(engine)?;
        Ok(self)
    }

    /// Append an engine at the lowest priority.
    pub fn register_engine(&mut self, engine: Arc<dyn Engine>) -> ForgeResult<()> {
        let id = engine.engine_id();
        if id == self.boundary.engine_id() || self.engine(id).is_some() {
            return Err(ForgeError::InvalidConfiguration(format!(
                "engine '{}' is already registered",
                id
            )));
        }
        tracing::debug!(engine = id, priority = self.engines.len(), "registered engine");
        self.engines.push(engine);
        Ok(())
    }

    pub fn set_boundary_engine(&mut self, engine: Arc<dyn Engine>) -> ForgeResult<()> {
        if self.engine(engine.engine_id()).is_some() {
            return Err(ForgeError::InvalidConfiguration(format!(
                "boundary engine id '{}' collides with a registered engine",
                engine.engine_id()
            )));
        }
        self.boundary = engine;
        Ok(())
    }

    pub fn set_options(&mut self, options: CompileOptions) {
        self.options = options;
    }

    /// All registered engines in priority order
    pub fn engines(&self) -> &[Arc<dyn Engine>] {
        &self.engines
    }

    /// Engines that pass the option filter, in priority order
    pub fn active_engines(&self) -> impl Iterator<Item = &Arc<dyn Engine>> {
        self.engines
            .iter()
            .filter(|e| self.options.allows_engine(e.engine_id()))
    }

    pub fn engine(&self, id: &str) -> Option<&Arc<dyn Engine>> {
        self.engines.iter().find(|e| e.engine_id() == id)
    }

    pub fn boundary_engine(&self) -> &Arc<dyn Engine> {
        &self.boundary
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }
}

impl Default for SharedResource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SharedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.engines.iter().map(|e| e.engine_id()).collect();
        f.debug_struct("SharedResource")
            .field("engines", &ids)
            .field("boundary", &self.boundary.engine_id())
            .field("options", &self.options)
            .finish()
    }
}
