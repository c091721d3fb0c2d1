//! Instrumentation agent strategy
//!
//! Redefines each opened module once per pass, adding only "opens" edges.
//! Reuses an agent already attached to the process, otherwise self-attaches
//! a new one.

use std::sync::Arc;

use tracing::debug;

use super::aggregate::AggregatedOpenInstructions;
use super::{ModulesReconfigurer, ReconfigError, StrategyInitError, StrategyKind};
use crate::module::{ClassloaderModuleContext, ModuleOpenRequest};
use crate::runtime::{Instrumentation, ModuleRuntime};

pub struct AgentReconfigurer {
    instrumentation: Arc<dyn Instrumentation>,
}

impl AgentReconfigurer {
    pub fn new(runtime: &dyn ModuleRuntime) -> Result<Self, StrategyInitError> {
        let instrumentation = match runtime.attached_instrumentation() {
            Some(instrumentation) => {
                debug!("Reusing the instrumentation agent already attached to the process");
                instrumentation
            }
            None => runtime
                .attach_agent()
                .map_err(StrategyInitError::AgentInstall)?,
        };
        Ok(Self { instrumentation })
    }
}

impl ModulesReconfigurer for AgentReconfigurer {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Agent
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
            self.instrumentation
                .redefine_module(module, &instructions.to_redefinition())
                .map_err(|source| ReconfigError::Redefinition {
                    module: module.to_string(),
                    source,
                })?;
        }
        debug!("Redefined {} modules", aggregated.len());
        Ok(())
    }
}
