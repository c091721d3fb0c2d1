//! In-memory module runtime
//!
//! A complete module graph living in process memory: layers with parents,
//! named modules with their packages, one unnamed module per loader, and
//! additive edge sets. Privileged capabilities are gated by [`RuntimeFlags`]
//! the same way a real host gates them behind startup flags.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use super::{
    AccessError, AddOpensHandle, Instrumentation, InternalCallError, LayerId, LoaderHandle,
    ModuleHandle, ModuleId, ModuleRedefinition, ModuleRuntime, MutationError, PrivilegedLookup,
};

const BOOT_LAYER: LayerId = LayerId(0);

/// Startup privileges granted to the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeFlags {
    /// Internal module API is exported to unnamed modules
    pub internal_api_exported: bool,
    /// The method-handle package is opened to unnamed modules
    pub invoke_package_opened: bool,
    /// Agents may attach to the running process
    pub agent_attach_allowed: bool,
    /// An agent was attached at startup by an external mechanism
    pub agent_preattached: bool,
}

impl RuntimeFlags {
    /// No privileged mechanism is available
    pub fn unprivileged() -> Self {
        Self {
            internal_api_exported: false,
            invoke_package_opened: false,
            agent_attach_allowed: false,
            agent_preattached: false,
        }
    }

    /// Every privileged mechanism is available
    pub fn fully_privileged() -> Self {
        Self {
            internal_api_exported: true,
            invoke_package_opened: true,
            agent_attach_allowed: true,
            agent_preattached: false,
        }
    }
}

impl Default for RuntimeFlags {
    /// A process started without extra flags: only self-attachment works
    fn default() -> Self {
        Self {
            agent_attach_allowed: true,
            ..Self::unprivileged()
        }
    }
}

struct ModuleRecord {
    handle: ModuleHandle,
    layer: Option<LayerId>,
    packages: HashSet<String>,
    reads: HashSet<ModuleId>,
    exports: HashMap<String, HashSet<ModuleId>>,
    opens: HashMap<String, HashSet<ModuleId>>,
    uses: HashSet<String>,
    provides: HashMap<String, Vec<String>>,
}

impl ModuleRecord {
    fn new(handle: ModuleHandle, layer: Option<LayerId>, packages: HashSet<String>) -> Self {
        Self {
            handle,
            layer,
            packages,
            reads: HashSet::new(),
            exports: HashMap::new(),
            opens: HashMap::new(),
            uses: HashSet::new(),
            provides: HashMap::new(),
        }
    }

    fn display_name(&self) -> String {
        self.handle.to_string()
    }

    fn require_package(&self, package: &str) -> Result<(), MutationError> {
        if self.packages.contains(package) {
            Ok(())
        } else {
            Err(MutationError::UnknownPackage {
                module: self.display_name(),
                package: package.to_string(),
            })
        }
    }
}

struct LayerRecord {
    parent: Option<LayerId>,
    modules: HashMap<String, ModuleId>,
}

#[derive(Default)]
struct Graph {
    modules: HashMap<ModuleId, ModuleRecord>,
    layers: HashMap<LayerId, LayerRecord>,
    /// loader id -> its unnamed module
    loaders: HashMap<u64, ModuleId>,
}

struct Inner {
    graph: RwLock<Graph>,
    flags: RuntimeFlags,
    next_id: AtomicU64,
    lookups: AtomicUsize,
    mutations: AtomicUsize,
}

impl Inner {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn require_module<'g>(
        graph: &'g Graph,
        module: &ModuleHandle,
    ) -> Result<&'g ModuleRecord, MutationError> {
        graph
            .modules
            .get(&module.id())
            .ok_or_else(|| MutationError::UnknownModule(module.to_string()))
    }

    /// Add a single "opens" edge; opening a package of an unnamed module is a no-op
    fn add_opens(
        &self,
        source: &ModuleHandle,
        package: &str,
        target: &ModuleHandle,
    ) -> Result<(), MutationError> {
        let mut graph = self.graph.write();
        Self::require_module(&graph, target)?;
        let record = Self::require_module(&graph, source)?;
        if !record.handle.is_named() {
            return Ok(());
        }
        record.require_package(package)?;

        let record = graph
            .modules
            .get_mut(&source.id())
            .ok_or_else(|| MutationError::UnknownModule(source.to_string()))?;
        if record
            .opens
            .entry(package.to_string())
            .or_default()
            .insert(target.id())
        {
            self.mutations.fetch_add(1, Ordering::Relaxed);
            trace!("Opened {}/{} to {}", source, package, target);
        }
        Ok(())
    }

    fn redefine(
        &self,
        module: &ModuleHandle,
        redefinition: &ModuleRedefinition,
    ) -> Result<(), MutationError> {
        let mut graph = self.graph.write();
        let record = Self::require_module(&graph, module)?;
        if !record.handle.is_named() {
            return Ok(());
        }

        // Validate everything first so a rejected redefinition changes nothing
        for package in redefinition
            .extra_exports
            .keys()
            .chain(redefinition.extra_opens.keys())
        {
            record.require_package(package)?;
        }
        let targets = redefinition
            .extra_reads
            .iter()
            .chain(redefinition.extra_exports.values().flatten())
            .chain(redefinition.extra_opens.values().flatten());
        for target in targets {
            Self::require_module(&graph, target)?;
        }

        let record = graph
            .modules
            .get_mut(&module.id())
            .ok_or_else(|| MutationError::UnknownModule(module.to_string()))?;
        let mut added = 0usize;
        for target in &redefinition.extra_reads {
            added += usize::from(record.reads.insert(target.id()));
        }
        for (package, targets) in &redefinition.extra_exports {
            let edges = record.exports.entry(package.clone()).or_default();
            for target in targets {
                added += usize::from(edges.insert(target.id()));
            }
        }
        for (package, targets) in &redefinition.extra_opens {
            let edges = record.opens.entry(package.clone()).or_default();
            for target in targets {
                added += usize::from(edges.insert(target.id()));
            }
        }
        for service in &redefinition.extra_uses {
            added += usize::from(record.uses.insert(service.clone()));
        }
        for (service, providers) in &redefinition.extra_provides {
            let existing = record.provides.entry(service.clone()).or_default();
            for provider in providers {
                if !existing.contains(provider) {
                    existing.push(provider.clone());
                    added += 1;
                }
            }
        }
        self.mutations.fetch_add(added, Ordering::Relaxed);
        debug!("Redefined module {} ({} new edges)", module, added);
        Ok(())
    }
}

/// In-process module runtime
///
/// Cloning is cheap; clones share the same graph.
#[derive(Clone)]
pub struct InMemoryRuntime {
    inner: Arc<Inner>,
}

impl InMemoryRuntime {
    /// Create a runtime with default flags (self-attachment only)
    pub fn new() -> Self {
        Self::with_flags(RuntimeFlags::default())
    }

    /// Create a runtime started with the given privileges
    pub fn with_flags(flags: RuntimeFlags) -> Self {
        let mut graph = Graph::default();
        graph.layers.insert(
            BOOT_LAYER,
            LayerRecord {
                parent: None,
                modules: HashMap::new(),
            },
        );
        Self {
            inner: Arc::new(Inner {
                graph: RwLock::new(graph),
                flags,
                next_id: AtomicU64::new(1),
                lookups: AtomicUsize::new(0),
                mutations: AtomicUsize::new(0),
            }),
        }
    }

    pub fn flags(&self) -> RuntimeFlags {
        self.inner.flags
    }

    /// Create a child layer of `parent`
    pub fn new_layer(&self, parent: LayerId) -> Result<LayerId, MutationError> {
        let mut graph = self.inner.graph.write();
        if !graph.layers.contains_key(&parent) {
            return Err(MutationError::Rejected {
                module: String::new(),
                reason: format!("unknown parent layer {}", parent.0),
            });
        }
        let layer = LayerId(self.inner.next_id());
        graph.layers.insert(
            layer,
            LayerRecord {
                parent: Some(parent),
                modules: HashMap::new(),
            },
        );
        Ok(layer)
    }

    /// Define a named module in the boot layer
    pub fn define_module(
        &self,
        name: &str,
        packages: &[&str],
    ) -> Result<ModuleHandle, MutationError> {
        self.define_module_in(BOOT_LAYER, name, packages)
    }

    /// Define a named module in `layer`
    pub fn define_module_in(
        &self,
        layer: LayerId,
        name: &str,
        packages: &[&str],
    ) -> Result<ModuleHandle, MutationError> {
        let mut graph = self.inner.graph.write();
        let layer_record = graph.layers.get(&layer).ok_or_else(|| MutationError::Rejected {
            module: name.to_string(),
            reason: format!("unknown layer {}", layer.0),
        })?;
        if layer_record.modules.contains_key(name) {
            return Err(MutationError::Rejected {
                module: name.to_string(),
                reason: "module already defined in layer".to_string(),
            });
        }

        let handle = ModuleHandle::named(self.inner.next_id(), name);
        let packages = packages.iter().map(|p| p.to_string()).collect();
        graph.modules.insert(
            handle.id(),
            ModuleRecord::new(handle.clone(), Some(layer), packages),
        );
        if let Some(layer_record) = graph.layers.get_mut(&layer) {
            layer_record.modules.insert(name.to_string(), handle.id());
        }
        Ok(handle)
    }

    /// Create a loader whose unnamed module resolves against the boot layer
    pub fn new_loader(&self, name: &str) -> LoaderHandle {
        self.register_loader(name, None)
    }

    /// Create a loader whose unnamed module resolves against `layer`
    pub fn new_loader_in_layer(&self, name: &str, layer: LayerId) -> LoaderHandle {
        self.register_loader(name, Some(layer))
    }

    fn register_loader(&self, name: &str, layer: Option<LayerId>) -> LoaderHandle {
        let loader = LoaderHandle::new(self.inner.next_id(), name);
        let unnamed = ModuleHandle::unnamed(self.inner.next_id());
        let mut graph = self.inner.graph.write();
        graph.modules.insert(
            unnamed.id(),
            ModuleRecord::new(unnamed.clone(), layer, HashSet::new()),
        );
        graph.loaders.insert(loader.id(), unnamed.id());
        loader
    }

    /// Add a "reads" edge outside of any reconfiguration
    pub fn add_reads(
        &self,
        source: &ModuleHandle,
        target: &ModuleHandle,
    ) -> Result<(), MutationError> {
        let mut redefinition = ModuleRedefinition::default();
        redefinition.extra_reads.insert(target.clone());
        self.inner.redefine(source, &redefinition)
    }

    /// Add an "exports" edge outside of any reconfiguration
    pub fn add_exports(
        &self,
        source: &ModuleHandle,
        package: &str,
        target: &ModuleHandle,
    ) -> Result<(), MutationError> {
        let mut redefinition = ModuleRedefinition::default();
        redefinition
            .extra_exports
            .entry(package.to_string())
            .or_default()
            .insert(target.clone());
        self.inner.redefine(source, &redefinition)
    }

    /// Whether `source` opens `package` to `target`
    ///
    /// Unnamed modules open every package.
    pub fn is_opened_to(
        &self,
        source: &ModuleHandle,
        package: &str,
        target: &ModuleHandle,
    ) -> bool {
        let graph = self.inner.graph.read();
        match graph.modules.get(&source.id()) {
            Some(record) if !record.handle.is_named() => true,
            Some(record) => record
                .opens
                .get(package)
                .is_some_and(|targets| targets.contains(&target.id())),
            None => false,
        }
    }

    /// Whether `source` exports `package` to `target`
    pub fn is_exported_to(
        &self,
        source: &ModuleHandle,
        package: &str,
        target: &ModuleHandle,
    ) -> bool {
        let graph = self.inner.graph.read();
        graph
            .modules
            .get(&source.id())
            .and_then(|record| record.exports.get(package))
            .is_some_and(|targets| targets.contains(&target.id()))
    }

    /// Whether `source` reads `target`
    pub fn reads(&self, source: &ModuleHandle, target: &ModuleHandle) -> bool {
        let graph = self.inner.graph.read();
        graph
            .modules
            .get(&source.id())
            .is_some_and(|record| record.reads.contains(&target.id()))
    }

    /// Opens edges of `module`, as package -> displayed target names
    pub fn opens_of(&self, module: &ModuleHandle) -> BTreeMap<String, BTreeSet<String>> {
        let graph = self.inner.graph.read();
        let Some(record) = graph.modules.get(&module.id()) else {
            return BTreeMap::new();
        };
        record
            .opens
            .iter()
            .map(|(package, targets)| {
                let names = targets
                    .iter()
                    .filter_map(|id| graph.modules.get(id))
                    .map(ModuleRecord::display_name)
                    .collect();
                (package.clone(), names)
            })
            .collect()
    }

    /// Number of layer traversals performed by `find_module`
    pub fn lookup_count(&self) -> usize {
        self.inner.lookups.load(Ordering::Relaxed)
    }

    /// Number of edges added to the graph so far
    pub fn mutation_count(&self) -> usize {
        self.inner.mutations.load(Ordering::Relaxed)
    }

    fn instrumentation(&self) -> Arc<dyn Instrumentation> {
        Arc::new(MemoryInstrumentation {
            inner: Arc::clone(&self.inner),
        })
    }
}

impl Default for InMemoryRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleRuntime for InMemoryRuntime {
    fn boot_layer(&self) -> LayerId {
        BOOT_LAYER
    }

    fn layer_of(&self, module: &ModuleHandle) -> Option<LayerId> {
        let graph = self.inner.graph.read();
        graph.modules.get(&module.id()).and_then(|record| record.layer)
    }

    fn unnamed_module(&self, loader: &LoaderHandle) -> ModuleHandle {
        if let Some(id) = self.inner.graph.read().loaders.get(&loader.id()) {
            return ModuleHandle::unnamed(*id);
        }
        // Loader handle minted elsewhere: give it its own unnamed module
        let unnamed = ModuleHandle::unnamed(self.inner.next_id());
        let mut graph = self.inner.graph.write();
        let id = *graph.loaders.entry(loader.id()).or_insert(unnamed.id());
        graph
            .modules
            .entry(id)
            .or_insert_with(|| ModuleRecord::new(ModuleHandle::unnamed(id), None, HashSet::new()));
        ModuleHandle::unnamed(id)
    }

    fn find_module(&self, layer: LayerId, name: &str) -> Option<ModuleHandle> {
        self.inner.lookups.fetch_add(1, Ordering::Relaxed);
        let graph = self.inner.graph.read();
        let mut current = Some(layer);
        while let Some(layer_id) = current {
            let record = graph.layers.get(&layer_id)?;
            if let Some(id) = record.modules.get(name) {
                return graph.modules.get(id).map(|m| m.handle.clone());
            }
            current = record.parent;
        }
        None
    }

    fn internal_add_opens(
        &self,
        source: Option<&ModuleHandle>,
        package: Option<&str>,
        target: Option<&ModuleHandle>,
    ) -> Result<(), InternalCallError> {
        if !self.inner.flags.internal_api_exported {
            return Err(InternalCallError::IllegalAccess(
                "internal module API is not exported to the unnamed module".to_string(),
            ));
        }
        let (Some(source), Some(package), Some(target)) = (source, package, target) else {
            return Err(InternalCallError::NullArgument);
        };
        Ok(self.inner.add_opens(source, package, target)?)
    }

    fn privileged_lookup(&self) -> Result<Arc<dyn PrivilegedLookup>, AccessError> {
        if !self.inner.flags.invoke_package_opened {
            return Err(AccessError::Inaccessible(
                "unable to make the privileged lookup field accessible: \
                 the invoke package is not opened to the unnamed module"
                    .to_string(),
            ));
        }
        Ok(Arc::new(MemoryLookup {
            inner: Arc::clone(&self.inner),
        }))
    }

    fn attached_instrumentation(&self) -> Option<Arc<dyn Instrumentation>> {
        self.inner
            .flags
            .agent_preattached
            .then(|| self.instrumentation())
    }

    fn attach_agent(&self) -> Result<Arc<dyn Instrumentation>, AccessError> {
        if !self.inner.flags.agent_attach_allowed {
            return Err(AccessError::AttachRefused(
                "self-attachment is disabled in this process".to_string(),
            ));
        }
        Ok(self.instrumentation())
    }
}

struct MemoryLookup {
    inner: Arc<Inner>,
}

impl PrivilegedLookup for MemoryLookup {
    fn find_add_opens(&self) -> Result<Arc<dyn AddOpensHandle>, AccessError> {
        Ok(Arc::new(MemoryAddOpens {
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct MemoryAddOpens {
    inner: Arc<Inner>,
}

impl AddOpensHandle for MemoryAddOpens {
    fn invoke(
        &self,
        source: &ModuleHandle,
        package: &str,
        target: &ModuleHandle,
    ) -> Result<(), MutationError> {
        self.inner.add_opens(source, package, target)
    }
}

struct MemoryInstrumentation {
    inner: Arc<Inner>,
}

impl Instrumentation for MemoryInstrumentation {
    fn redefine_module(
        &self,
        module: &ModuleHandle,
        redefinition: &ModuleRedefinition,
    ) -> Result<(), MutationError> {
        self.inner.redefine(module, redefinition)
    }
}
