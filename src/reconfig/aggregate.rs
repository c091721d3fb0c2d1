//! Grouping of requests by opened module

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::module::{ClassloaderModuleContext, ModuleOpenRequest};
use crate::runtime::{ModuleHandle, ModuleRedefinition};

/// Package -> modules it must be opened to, for one opened module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerModuleOpenInstructions {
    targets_by_package: HashMap<String, HashSet<ModuleHandle>>,
}

impl PerModuleOpenInstructions {
    /// Record that `package` must be opened to `target` (set union)
    pub fn add_opens(&mut self, package: &str, target: ModuleHandle) {
        self.targets_by_package
            .entry(package.to_string())
            .or_default()
            .insert(target);
    }

    pub fn targets(&self, package: &str) -> Option<&HashSet<ModuleHandle>> {
        self.targets_by_package.get(package)
    }

    pub fn is_empty(&self) -> bool {
        self.targets_by_package.is_empty()
    }

    /// Every `(package, target)` edge, sorted for a stable application order
    pub fn edges(&self) -> Vec<(&str, &ModuleHandle)> {
        let mut edges: Vec<_> = self
            .targets_by_package
            .iter()
            .flat_map(|(package, targets)| targets.iter().map(move |t| (package.as_str(), t)))
            .collect();
        edges.sort_by(|a, b| a.0.cmp(b.0).then_with(|| a.1.id().cmp(&b.1.id())));
        edges
    }

    /// Additive redefinition carrying only these opens
    pub fn to_redefinition(&self) -> ModuleRedefinition {
        ModuleRedefinition::opens(self.targets_by_package.clone())
    }
}

/// Open instructions for a whole batch, grouped by resolved opened module
#[derive(Debug, Default)]
pub struct AggregatedOpenInstructions {
    groups: Vec<(ModuleHandle, PerModuleOpenInstructions)>,
    index: HashMap<ModuleHandle, usize>,
    skipped: usize,
}

impl AggregatedOpenInstructions {
    /// Resolve and group `requests`
    ///
    /// A request whose opened or opening module does not resolve is skipped
    /// with a warning; the rest of the batch is unaffected. Groups keep the
    /// order in which their module was first seen.
    pub fn aggregate(requests: &[ModuleOpenRequest], context: &ClassloaderModuleContext) -> Self {
        let mut aggregated = Self::default();
        for request in requests {
            let Some(opened) = context.find_module(request.opened_module()) else {
                warn_module_skipped(request.opened_module(), request);
                aggregated.skipped += 1;
                continue;
            };
            let Some(opening) = context.find_module(request.opening_module()) else {
                warn_module_skipped(request.opening_module(), request);
                aggregated.skipped += 1;
                continue;
            };

            let instructions = aggregated.group_mut(opened);
            for package in request.packages() {
                instructions.add_opens(package, opening.clone());
            }
        }
        aggregated
    }

    fn group_mut(&mut self, module: ModuleHandle) -> &mut PerModuleOpenInstructions {
        let position = match self.index.get(&module) {
            Some(position) => *position,
            None => {
                self.groups.push((module.clone(), PerModuleOpenInstructions::default()));
                self.index.insert(module, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        &mut self.groups[position].1
    }

    pub fn get(&self, module: &ModuleHandle) -> Option<&PerModuleOpenInstructions> {
        self.index.get(module).map(|position| &self.groups[*position].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ModuleHandle, &PerModuleOpenInstructions)> {
        self.groups.iter().map(|(module, instructions)| (module, instructions))
    }

    /// Number of opened modules
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Requests skipped because a module did not resolve
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

pub(crate) fn warn_module_skipped(module_name: &str, request: &ModuleOpenRequest) {
    warn!(
        "Module {} not found, skipping processing of module open request: {}",
        module_name, request
    );
}
