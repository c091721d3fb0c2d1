//! Strategy selection
//!
//! Tries each strategy in privilege order and keeps the first one that
//! initializes. The choice is made once, lazily, and reused for the lifetime
//! of the factory.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{
    AgentReconfigurer, DirectApiReconfigurer, FallbackReconfigurer, ModulesReconfigurer,
    ReflectiveHandleReconfigurer, StrategyInitError, StrategyKind,
};
use crate::runtime::ModuleRuntime;
use crate::utils::error_chain;

pub struct ReconfigurerFactory {
    runtime: Arc<dyn ModuleRuntime>,
    disabled: HashSet<StrategyKind>,
    selected: OnceCell<Arc<dyn ModulesReconfigurer>>,
}

impl ReconfigurerFactory {
    pub fn new(runtime: Arc<dyn ModuleRuntime>) -> Self {
        Self::with_disabled(runtime, Vec::new())
    }

    /// Create a factory that never selects the `disabled` strategies
    ///
    /// The fallback strategy cannot be disabled.
    pub fn with_disabled<I>(runtime: Arc<dyn ModuleRuntime>, disabled: I) -> Self
    where
        I: IntoIterator<Item = StrategyKind>,
    {
        let mut disabled: HashSet<StrategyKind> = disabled.into_iter().collect();
        if disabled.remove(&StrategyKind::Fallback) {
            warn!("The fallback module reconfiguration strategy cannot be disabled");
        }
        Self {
            runtime,
            disabled,
            selected: OnceCell::new(),
        }
    }

    /// The selected strategy, constructing it on first use
    pub fn reconfigurer(&self) -> Arc<dyn ModulesReconfigurer> {
        Arc::clone(self.selected.get_or_init(|| self.select()))
    }

    /// Kind of the selected strategy, if selection already happened
    pub fn selected_kind(&self) -> Option<StrategyKind> {
        self.selected.get().map(|reconfigurer| reconfigurer.kind())
    }

    fn select(&self) -> Arc<dyn ModulesReconfigurer> {
        let mut failures = 0usize;
        for kind in StrategyKind::PRIVILEGE_ORDER
            .into_iter()
            .filter(|kind| kind.is_privileged())
        {
            match self.construct(kind) {
                Ok(reconfigurer) => {
                    info!("Reconfiguring modules using the {} strategy", kind);
                    return reconfigurer;
                }
                Err(StrategyInitError::Disabled(kind)) => {
                    debug!("Skipping the {} strategy: disabled by configuration", kind);
                }
                Err(err) => {
                    report_failure(kind, &err, failures == 0);
                    failures += 1;
                }
            }
        }
        info!(
            "No privileged module reconfiguration strategy available, \
             module opens will only be reported"
        );
        Arc::new(FallbackReconfigurer::new())
    }

    fn construct(
        &self,
        kind: StrategyKind,
    ) -> Result<Arc<dyn ModulesReconfigurer>, StrategyInitError> {
        if self.disabled.contains(&kind) {
            return Err(StrategyInitError::Disabled(kind));
        }
        let reconfigurer: Arc<dyn ModulesReconfigurer> = match kind {
            StrategyKind::DirectApi => {
                Arc::new(DirectApiReconfigurer::new(Arc::clone(&self.runtime))?)
            }
            StrategyKind::ReflectiveHandle => {
                Arc::new(ReflectiveHandleReconfigurer::new(self.runtime.as_ref())?)
            }
            StrategyKind::Agent => Arc::new(AgentReconfigurer::new(self.runtime.as_ref())?),
            StrategyKind::Fallback => Arc::new(FallbackReconfigurer::new()),
        };
        Ok(reconfigurer)
    }
}

/// Only the first failure is worth the operator's attention
fn report_failure(kind: StrategyKind, err: &StrategyInitError, first: bool) {
    if first {
        warn!(
            "Module reconfiguration using the {} strategy is not available: {}. \
             Start the process with '{}' to enable it; trying less privileged strategies",
            kind,
            error_chain(err),
            kind.remediation().unwrap_or_default()
        );
    } else {
        debug!(
            "Module reconfiguration using the {} strategy is not available: {}",
            kind,
            error_chain(err)
        );
    }
}

impl fmt::Debug for ReconfigurerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconfigurerFactory")
            .field("disabled", &self.disabled)
            .field("selected", &self.selected_kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{InMemoryRuntime, RuntimeFlags};

    fn factory(flags: RuntimeFlags) -> ReconfigurerFactory {
        ReconfigurerFactory::new(Arc::new(InMemoryRuntime::with_flags(flags)))
    }

    #[test]
    fn test_most_privileged_wins() {
        let factory = factory(RuntimeFlags::fully_privileged());
        assert_eq!(factory.reconfigurer().kind(), StrategyKind::DirectApi);
    }

    #[test]
    fn test_agent_chosen_when_two_most_privileged_fail() {
        let factory = factory(RuntimeFlags::default());
        assert_eq!(factory.reconfigurer().kind(), StrategyKind::Agent);
    }

    #[test]
    fn test_fallback_chosen_when_all_fail() {
        let factory = factory(RuntimeFlags::unprivileged());
        assert_eq!(factory.reconfigurer().kind(), StrategyKind::Fallback);
    }

    #[test]
    fn test_selection_is_memoized() {
        let factory = factory(RuntimeFlags::default());
        assert_eq!(factory.selected_kind(), None);
        let first = factory.reconfigurer();
        let second = factory.reconfigurer();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.selected_kind(), Some(StrategyKind::Agent));
    }

    #[test]
    fn test_disabled_strategies_skipped() {
        let runtime = Arc::new(InMemoryRuntime::with_flags(RuntimeFlags::fully_privileged()));
        let factory = ReconfigurerFactory::with_disabled(
            runtime,
            [StrategyKind::DirectApi, StrategyKind::Fallback],
        );
        assert_eq!(factory.reconfigurer().kind(), StrategyKind::ReflectiveHandle);
    }
}
