//! Host runtime adapter
//!
//! The reconfiguration logic never talks to a concrete module system. Module
//! lookup, the unnamed module of a loader, and the privileged entry points
//! used to add "opens" edges all go through [`ModuleRuntime`].
//!
//! ## Capabilities
//!
//! - **Resolution**: boot layer, layer of a module, unnamed module of a loader,
//!   lookup of a named module in a layer (and its parents)
//! - **Direct internal API**: `internal_add_opens`, usable only when the host
//!   exports its internal module API to us
//! - **Privileged lookup**: a lookup object obtained by bypassing
//!   encapsulation, bound to the private add-opens implementation
//! - **Instrumentation**: an agent with module redefinition support
//!
//! Privileged capabilities default to "unavailable", so an adapter for a host
//! without them only needs to implement resolution.

pub mod memory;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

pub use memory::{InMemoryRuntime, RuntimeFlags};

/// Runtime-assigned module identity
pub type ModuleId = u64;

/// Opaque handle to a live module of the host runtime
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleHandle {
    id: ModuleId,
    name: Option<Arc<str>>,
}

impl ModuleHandle {
    /// Handle to a named module
    pub fn named(id: ModuleId, name: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            name: Some(name.into()),
        }
    }

    /// Handle to an unnamed module (one exists per loader)
    pub fn unnamed(id: ModuleId) -> Self {
        Self { id, name: None }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }
}

impl fmt::Display for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => f.write_str(name),
            None => write!(f, "UNNAMED#{}", self.id),
        }
    }
}

/// Module layer identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(pub u64);

/// Handle to a loader (one per live-reload generation)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoaderHandle {
    id: u64,
    name: Arc<str>,
}

impl LoaderHandle {
    pub fn new(id: u64, name: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for LoaderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

/// Extra edges for an additive module redefinition
///
/// Nothing in here replaces existing configuration: every field only adds
/// edges on top of what the module already declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleRedefinition {
    pub extra_reads: HashSet<ModuleHandle>,
    pub extra_exports: HashMap<String, HashSet<ModuleHandle>>,
    pub extra_opens: HashMap<String, HashSet<ModuleHandle>>,
    pub extra_uses: HashSet<String>,
    pub extra_provides: HashMap<String, Vec<String>>,
}

impl ModuleRedefinition {
    /// Redefinition that only adds "opens" edges
    pub fn opens(extra_opens: HashMap<String, HashSet<ModuleHandle>>) -> Self {
        Self {
            extra_opens,
            ..Self::default()
        }
    }
}

/// Failure signature of a direct internal API call
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InternalCallError {
    /// The call went through and rejected a missing argument
    #[error("null argument passed to internal module API")]
    NullArgument,
    /// The internal API is not exported to the caller
    #[error("illegal access to internal module API: {0}")]
    IllegalAccess(String),
    #[error(transparent)]
    Mutation(#[from] MutationError),
}

/// Failure to acquire a privileged capability
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("no such field: {0}")]
    NoSuchField(String),
    #[error("no such method: {0}")]
    NoSuchMethod(String),
    #[error("inaccessible object: {0}")]
    Inaccessible(String),
    #[error("agent attachment refused: {0}")]
    AttachRefused(String),
    #[error("capability not supported by this runtime: {0}")]
    Unsupported(&'static str),
}

/// The host rejected a module graph mutation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error("unknown module {0}")]
    UnknownModule(String),
    #[error("package {package} is not in module {module}")]
    UnknownPackage { module: String, package: String },
    #[error("redefinition of module {module} rejected: {reason}")]
    Rejected { module: String, reason: String },
}

/// Handle bound to the runtime's private add-opens implementation
pub trait AddOpensHandle: Send + Sync {
    fn invoke(
        &self,
        source: &ModuleHandle,
        package: &str,
        target: &ModuleHandle,
    ) -> Result<(), MutationError>;
}

/// Lookup object with full privileges over the runtime's internals
pub trait PrivilegedLookup: Send + Sync {
    /// Bind a handle to the private add-opens implementation
    fn find_add_opens(&self) -> Result<Arc<dyn AddOpensHandle>, AccessError>;
}

/// Instrumentation facility of an attached agent
pub trait Instrumentation: Send + Sync {
    /// Redefine `module`, adding the edges in `redefinition`
    fn redefine_module(
        &self,
        module: &ModuleHandle,
        redefinition: &ModuleRedefinition,
    ) -> Result<(), MutationError>;
}

/// Platform adapter over the host runtime's module system
pub trait ModuleRuntime: Send + Sync {
    /// The boot layer
    fn boot_layer(&self) -> LayerId;

    /// Layer a module belongs to
    ///
    /// `None` when the module has no layer; callers fall back to the boot layer.
    fn layer_of(&self, module: &ModuleHandle) -> Option<LayerId>;

    /// The unnamed module of `loader`
    fn unnamed_module(&self, loader: &LoaderHandle) -> ModuleHandle;

    /// Find a named module in `layer` or its parents
    fn find_module(&self, layer: LayerId, name: &str) -> Option<ModuleHandle>;

    /// Direct internal add-opens API
    ///
    /// `None` arguments are never valid; callers use them to probe for
    /// accessibility without touching any module.
    fn internal_add_opens(
        &self,
        _source: Option<&ModuleHandle>,
        _package: Option<&str>,
        _target: Option<&ModuleHandle>,
    ) -> Result<(), InternalCallError> {
        Err(InternalCallError::IllegalAccess(
            "internal module API not available".to_string(),
        ))
    }

    /// Acquire a privileged lookup object
    fn privileged_lookup(&self) -> Result<Arc<dyn PrivilegedLookup>, AccessError> {
        Err(AccessError::Unsupported("privileged lookup"))
    }

    /// Instrumentation already attached by an external mechanism
    fn attached_instrumentation(&self) -> Option<Arc<dyn Instrumentation>> {
        None
    }

    /// Self-attach an instrumentation agent
    fn attach_agent(&self) -> Result<Arc<dyn Instrumentation>, AccessError> {
        Err(AccessError::Unsupported("agent attachment"))
    }
}
