//! Request collection
//!
//! Any number of independent producers contribute module open requests
//! during the collection phase. The collector makes no assumption about their
//! identity, ordering or count; it only deduplicates and hands the complete
//! batch over once collection is finished.

use std::collections::HashSet;

use tracing::debug;

use crate::config::{DeclaredModuleOpen, ExtensionJvmConfig};
use crate::module::request::{ModuleOpenRequest, RequestError};

/// JVM option names remapped into module open requests
const ADD_OPENS_OPTIONS: [&str; 2] = ["add-opens", "--add-opens"];

/// Source of module open requests (an extension or plugin)
pub trait ModuleOpenProducer: Send + Sync {
    /// Producer name, used in diagnostics
    fn name(&self) -> &str;

    /// Requests this producer needs applied
    fn module_opens(&self) -> Result<Vec<ModuleOpenRequest>, RequestError>;
}

/// Aggregates requests from every producer, keeping first-seen order
#[derive(Debug, Default)]
pub struct RequestCollector {
    requests: Vec<ModuleOpenRequest>,
    seen: HashSet<ModuleOpenRequest>,
}

impl RequestCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request; returns false if an identical one was already collected
    pub fn push(&mut self, request: ModuleOpenRequest) -> bool {
        if self.seen.contains(&request) {
            return false;
        }
        self.seen.insert(request.clone());
        self.requests.push(request);
        true
    }

    /// Add several requests, returning how many were new
    pub fn extend<I>(&mut self, requests: I) -> usize
    where
        I: IntoIterator<Item = ModuleOpenRequest>,
    {
        requests
            .into_iter()
            .map(|request| usize::from(self.push(request)))
            .sum()
    }

    /// Collect everything `producer` contributes
    pub fn collect_from(
        &mut self,
        producer: &dyn ModuleOpenProducer,
    ) -> Result<usize, RequestError> {
        let added = self.extend(producer.module_opens()?);
        debug!(
            "Producer {} contributed {} new module open requests",
            producer.name(),
            added
        );
        Ok(added)
    }

    /// Add an open declared in configuration
    pub fn add_declared(&mut self, declared: &DeclaredModuleOpen) -> Result<bool, RequestError> {
        let request = ModuleOpenRequest::new(
            declared.module.clone(),
            declared.to.clone(),
            declared.packages.iter().cloned(),
        )?;
        Ok(self.push(request))
    }

    /// Remap an extension's `add-opens` JVM options into requests
    pub fn add_extension_options(
        &mut self,
        extension: &ExtensionJvmConfig,
    ) -> Result<usize, RequestError> {
        let mut added = 0;
        for option in &extension.jvm_options {
            if !ADD_OPENS_OPTIONS.contains(&option.name.as_str()) {
                debug!(
                    "Ignoring JVM option {} of extension {}",
                    option.name, extension.name
                );
                continue;
            }
            for value in &option.values {
                added += self.extend(parse_add_opens(value)?);
            }
        }
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// End the collection phase, yielding the batch
    pub fn finish(self) -> Vec<ModuleOpenRequest> {
        self.requests
    }
}

/// Parse an `--add-opens` value: `module/package=target[,target...]`
///
/// Yields one request per target.
pub fn parse_add_opens(value: &str) -> Result<Vec<ModuleOpenRequest>, RequestError> {
    let malformed = || {
        RequestError::InvalidArgument(format!(
            "malformed add-opens value '{}', expected module/package=target[,target]",
            value
        ))
    };
    let (source, targets) = value.trim().split_once('=').ok_or_else(malformed)?;
    let (module, package) = source.split_once('/').ok_or_else(malformed)?;

    targets
        .split(',')
        .map(str::trim)
        .map(|target| {
            if target.is_empty() {
                return Err(malformed());
            }
            ModuleOpenRequest::new(module, target, [package])
        })
        .collect()
}
