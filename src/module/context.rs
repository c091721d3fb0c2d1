//! Per-loader module resolution context

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use crate::module::request::ALL_UNNAMED;
use crate::runtime::{LayerId, LoaderHandle, ModuleHandle, ModuleRuntime};

/// Resolves module names to live handles for one loader generation
///
/// The unnamed module and the layer are captured at construction; named
/// lookups are memoized, including misses. A context must be rebuilt for each
/// new loader since handles are loader and layer specific.
pub struct ClassloaderModuleContext {
    runtime: Arc<dyn ModuleRuntime>,
    loader: LoaderHandle,
    unnamed_module: ModuleHandle,
    layer: LayerId,
    cache: DashMap<String, Option<ModuleHandle>>,
}

impl ClassloaderModuleContext {
    pub fn new(runtime: Arc<dyn ModuleRuntime>, loader: &LoaderHandle) -> Self {
        let unnamed_module = runtime.unnamed_module(loader);
        let layer = runtime
            .layer_of(&unnamed_module)
            .unwrap_or_else(|| runtime.boot_layer());
        Self {
            runtime,
            loader: loader.clone(),
            unnamed_module,
            layer,
            cache: DashMap::new(),
        }
    }

    /// Resolve `module_name`, or `None` if no such module is visible
    ///
    /// [`ALL_UNNAMED`] always resolves to this loader's unnamed module.
    pub fn find_module(&self, module_name: &str) -> Option<ModuleHandle> {
        if module_name == ALL_UNNAMED {
            return Some(self.unnamed_module.clone());
        }
        if let Some(cached) = self.cache.get(module_name) {
            return cached.value().clone();
        }

        // Resolved outside the map lock; a racing resolver computes the same value
        let resolved = self.runtime.find_module(self.layer, module_name);
        trace!(
            "Resolved module {} for loader {}: {:?}",
            module_name,
            self.loader,
            resolved
        );
        self.cache
            .entry(module_name.to_string())
            .or_insert(resolved)
            .value()
            .clone()
    }

    pub fn unnamed_module(&self) -> &ModuleHandle {
        &self.unnamed_module
    }

    pub fn loader(&self) -> &LoaderHandle {
        &self.loader
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn runtime(&self) -> &Arc<dyn ModuleRuntime> {
        &self.runtime
    }

    /// Number of memoized names (hits and misses)
    pub fn cached_names(&self) -> usize {
        self.cache.len()
    }
}

impl fmt::Debug for ClassloaderModuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassloaderModuleContext")
            .field("loader", &self.loader)
            .field("unnamed_module", &self.unnamed_module)
            .field("layer", &self.layer)
            .field("cached_names", &self.cache.len())
            .finish()
    }
}
