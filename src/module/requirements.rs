//! Manifest rendering of module requirements
//!
//! Packaged artifacts carry an `Add-Opens` manifest attribute so the runtime
//! applies the opens at launch. The value is a space-joined list of
//! `module/package` entries, sorted by module then package, deduplicated.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, warn};

use crate::module::request::ModuleOpenRequest;

/// Manifest attribute holding the opens
pub const ADD_OPENS_ATTRIBUTE: &str = "Add-Opens";

/// Module requirements resolved from an aggregated request batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedModuleRequirements {
    entries: BTreeSet<(String, String)>,
}

impl ResolvedModuleRequirements {
    /// Collect the `(module, package)` pairs of `requests`
    ///
    /// Opening modules are dropped: the manifest can only open to all
    /// unnamed modules.
    pub fn new(requests: &[ModuleOpenRequest]) -> Self {
        let entries = requests
            .iter()
            .flat_map(|request| {
                request
                    .packages()
                    .iter()
                    .map(move |package| (request.opened_module().to_string(), package.clone()))
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The attribute value, or `None` when nothing needs opening
    pub fn add_opens_value(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        let value = self
            .entries
            .iter()
            .map(|(module, package)| format!("{}/{}", module, package))
            .collect::<Vec<_>>()
            .join(" ");
        Some(value)
    }

    /// Write the `Add-Opens` attribute into `manifest`
    ///
    /// An existing attribute is replaced, with a warning.
    pub fn render_into(&self, manifest: &mut ManifestAttributes) {
        let Some(value) = self.add_opens_value() else {
            debug!("No module opens required, not writing {}", ADD_OPENS_ATTRIBUTE);
            return;
        };
        if let Some(previous) = manifest.insert(ADD_OPENS_ATTRIBUTE, value) {
            warn!(
                "An '{}' entry was already defined in the manifest ('{}'); it has been overwritten \
                 by the opens required by the application's modules",
                ADD_OPENS_ATTRIBUTE, previous
            );
        }
    }
}

/// Ordered main-section attributes of a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestAttributes {
    attributes: Vec<(String, String)>,
}

impl ManifestAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, keeping its position if present; returns the previous value
    pub fn insert(&mut self, key: &str, value: String) -> Option<String> {
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.attributes.push((key.to_string(), value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl fmt::Display for ManifestAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.attributes {
            writeln!(f, "{}: {}", key, value)?;
        }
        Ok(())
    }
}
