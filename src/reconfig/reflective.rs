//! Reflective handle strategy
//!
//! Acquires a privileged lookup by bypassing encapsulation and binds a handle
//! to the runtime's private add-opens implementation. The handle is acquired
//! once at construction and reused for every request.

use std::sync::Arc;

use tracing::debug;

use super::aggregate::AggregatedOpenInstructions;
use super::{ModulesReconfigurer, ReconfigError, StrategyInitError, StrategyKind};
use crate::module::{ClassloaderModuleContext, ModuleOpenRequest};
use crate::runtime::{AddOpensHandle, InternalCallError, ModuleRuntime};

pub struct ReflectiveHandleReconfigurer {
    add_opens: Arc<dyn AddOpensHandle>,
}

impl ReflectiveHandleReconfigurer {
    pub fn new(runtime: &dyn ModuleRuntime) -> Result<Self, StrategyInitError> {
        let lookup = runtime
            .privileged_lookup()
            .map_err(StrategyInitError::PrivilegedLookup)?;
        let add_opens = lookup
            .find_add_opens()
            .map_err(StrategyInitError::PrivilegedLookup)?;
        debug!("Acquired privileged handle to the add-opens implementation");
        Ok(Self { add_opens })
    }
}

impl ModulesReconfigurer for ReflectiveHandleReconfigurer {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ReflectiveHandle
    }

    fn open_modules(
        &self,
        requests: &[ModuleOpenRequest],
        context: &ClassloaderModuleContext,
    ) -> Result<(), ReconfigError> {
        if requests.is_empty() {
            return Ok(());
        }
        let aggregated = AggregatedOpenInstructions::aggregate(requests, context);
        for (module, instructions) in aggregated.iter() {
            for (package, target) in instructions.edges() {
                self.add_opens
                    .invoke(module, package, target)
                    .map_err(|source| ReconfigError::AddOpens {
                        module: module.to_string(),
                        package: package.to_string(),
                        target: target.to_string(),
                        source: InternalCallError::Mutation(source),
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
    use crate::runtime::{AccessError, InMemoryRuntime, RuntimeFlags};

    #[test]
    fn test_construction_wraps_lookup_failure() {
        let runtime = InMemoryRuntime::with_flags(RuntimeFlags::unprivileged());
        let err = ReflectiveHandleReconfigurer::new(&runtime).err().unwrap();
        assert!(matches!(
            err,
            StrategyInitError::PrivilegedLookup(AccessError::Inaccessible(_))
        ));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_construction_succeeds_with_invoke_package_opened() {
        let runtime = InMemoryRuntime::with_flags(RuntimeFlags {
            invoke_package_opened: true,
            ..RuntimeFlags::unprivileged()
        });
        assert!(ReflectiveHandleReconfigurer::new(&runtime).is_ok());
    }
}
