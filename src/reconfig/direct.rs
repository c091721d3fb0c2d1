//! Direct internal API strategy
//!
//! Calls the runtime's internal add-opens API. That API is only reachable
//! when the process was started with the internal module package exported to
//! unnamed modules, so construction probes it first and fails fast otherwise.

use std::sync::Arc;

use tracing::debug;

use super::aggregate::AggregatedOpenInstructions;
use super::{ModulesReconfigurer, ReconfigError, StrategyInitError, StrategyKind};
use crate::module::{ClassloaderModuleContext, ModuleOpenRequest};
use crate::runtime::{InternalCallError, ModuleRuntime};

pub struct DirectApiReconfigurer {
    runtime: Arc<dyn ModuleRuntime>,
}

impl DirectApiReconfigurer {
    pub fn new(runtime: Arc<dyn ModuleRuntime>) -> Result<Self, StrategyInitError> {
        probe_internal_api(runtime.as_ref())?;
        Ok(Self { runtime })
    }
}

/// Invoke the internal API with missing arguments
///
/// The call never modifies a module. A rejected argument proves the API is
/// reachable; an access error means the export flag is absent.
fn probe_internal_api(runtime: &dyn ModuleRuntime) -> Result<(), StrategyInitError> {
    match runtime.internal_add_opens(None, None, None) {
        Ok(()) | Err(InternalCallError::NullArgument) => Ok(()),
        Err(InternalCallError::IllegalAccess(reason)) => {
            Err(StrategyInitError::InternalApiInaccessible(reason))
        }
        Err(other) => Err(StrategyInitError::UnexpectedProbe(other)),
    }
}

impl ModulesReconfigurer for DirectApiReconfigurer {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DirectApi
    }

    fn open_modules(
        &self,
        requests: &[ModuleOpenRequest],
        context: &ClassloaderModuleContext,
    ) -> Result<(), ReconfigError> {
        let aggregated = AggregatedOpenInstructions::aggregate(requests, context);
        for (module, instructions) in aggregated.iter() {
            for (package, target) in instructions.edges() {
                self.runtime
                    .internal_add_opens(Some(module), Some(package), Some(target))
                    .map_err(|source| ReconfigError::AddOpens {
                        module: module.to_string(),
                        package: package.to_string(),
                        target: target.to_string(),
                        source,
                    })?;
                debug!("Opened module {}/{} to {}", module, package, target);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{InMemoryRuntime, RuntimeFlags};

    #[test]
    fn test_construction_fails_without_export_flag() {
        let runtime = Arc::new(InMemoryRuntime::with_flags(RuntimeFlags::unprivileged()));
        assert!(matches!(
            DirectApiReconfigurer::new(runtime),
            Err(StrategyInitError::InternalApiInaccessible(_))
        ));
    }

    #[test]
    fn test_probe_does_not_mutate() {
        let memory = InMemoryRuntime::with_flags(RuntimeFlags::fully_privileged());
        memory.define_module("java.base", &["java.lang"]).unwrap();
        assert!(DirectApiReconfigurer::new(Arc::new(memory.clone())).is_ok());
        assert_eq!(memory.mutation_count(), 0);
    }
}
