//! Unit loader for one loader generation
//!
//! Defines each named unit at most once, coordinating concurrent loads of
//! the same name through [`NamedExclusiveSingleOperations`] instead of keeping
//! a lock per name forever.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tracing::trace;

use super::exclusive::{ExclusiveError, NamedExclusiveSingleOperations};
use super::listener::LoaderEventListener;
use crate::runtime::LoaderHandle;

/// Where a loader reads unit bytes and resources from
pub trait UnitSource: Send + Sync {
    fn read_unit(&self, name: &str) -> Option<Vec<u8>>;

    fn read_resource(&self, name: &str) -> Option<Vec<u8>>;

    /// Whether `name` exists, without reading it
    fn has_resource(&self, name: &str) -> bool {
        self.read_resource(name).is_some()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("unit {0} not found")]
    NotFound(String),
    #[error("failed to coordinate loading of unit {name}: {reason}")]
    Coordination { name: String, reason: String },
}

/// A unit defined by a loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinedUnit {
    pub name: String,
    pub loader: LoaderHandle,
    pub bytes: Arc<[u8]>,
}

pub struct UnitLoader {
    handle: LoaderHandle,
    source: Arc<dyn UnitSource>,
    listeners: Vec<Arc<dyn LoaderEventListener>>,
    defined: DashMap<String, Arc<DefinedUnit>>,
    operations: NamedExclusiveSingleOperations<Arc<DefinedUnit>, LoadError>,
}

impl UnitLoader {
    pub fn new(handle: LoaderHandle, source: Arc<dyn UnitSource>) -> Self {
        Self {
            handle,
            source,
            listeners: Vec::new(),
            defined: DashMap::new(),
            operations: NamedExclusiveSingleOperations::new(),
        }
    }

    /// Bound on waiting for a concurrent load of the same unit
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.operations = NamedExclusiveSingleOperations::with_wait_timeout(wait_timeout);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn LoaderEventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn handle(&self) -> &LoaderHandle {
        &self.handle
    }

    /// Load `name`, defining it on first use
    pub fn load_unit(&self, name: &str) -> Result<Arc<DefinedUnit>, LoadError> {
        for listener in &self.listeners {
            listener.load_unit(name, self.handle.name());
        }
        self.operations
            .exclusive_execution(
                name,
                |name: &str| self.find_defined(name),
                |name, source| self.define(name, source),
                self.source.as_ref(),
            )
            .map_err(|err| match err {
                ExclusiveError::Failed(err) => err,
                other => LoadError::Coordination {
                    name: name.to_string(),
                    reason: other.to_string(),
                },
            })
    }

    fn define(&self, name: &str, source: &dyn UnitSource) -> Result<Arc<DefinedUnit>, LoadError> {
        let bytes = source
            .read_unit(name)
            .ok_or_else(|| LoadError::NotFound(name.to_string()))?;
        let unit = Arc::new(DefinedUnit {
            name: name.to_string(),
            loader: self.handle.clone(),
            bytes: bytes.into(),
        });
        self.defined.insert(name.to_string(), Arc::clone(&unit));
        trace!("Defined unit {} in loader {}", name, self.handle);
        Ok(unit)
    }

    /// Already-defined unit, if any
    pub fn find_defined(&self, name: &str) -> Option<Arc<DefinedUnit>> {
        self.defined.get(name).map(|unit| Arc::clone(unit.value()))
    }

    pub fn defined_count(&self) -> usize {
        self.defined.len()
    }

    /// Read a resource through this loader
    pub fn resource(&self, name: &str) -> Option<Vec<u8>> {
        for listener in &self.listeners {
            listener.open_resource_stream(name, self.handle.name());
        }
        self.source.read_resource(name)
    }

    /// Locator of a resource, `loader#id!/name`
    pub fn resource_url(&self, name: &str) -> Option<String> {
        for listener in &self.listeners {
            listener.getting_url_from_resource(name, self.handle.name());
        }
        self.source
            .has_resource(name)
            .then(|| format!("{}!/{}", self.handle, name))
    }

    /// Every locator of a resource visible through this loader
    pub fn resource_urls(&self, name: &str) -> Vec<String> {
        for listener in &self.listeners {
            listener.enumerating_resource_urls(name, self.handle.name());
        }
        self.source
            .has_resource(name)
            .then(|| format!("{}!/{}", self.handle, name))
            .into_iter()
            .collect()
    }

    /// Loads currently being coordinated
    pub fn pending_loads(&self) -> usize {
        self.operations.pending_operations()
    }
}

impl fmt::Debug for UnitLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitLoader")
            .field("handle", &self.handle)
            .field("defined", &self.defined.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
