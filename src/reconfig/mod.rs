//! Runtime module reconfiguration
//!
//! Applies a batch of [`ModuleOpenRequest`]s to the running process through
//! one of several strategies, ordered by the privilege they need:
//!
//! 1. [`DirectApiReconfigurer`]: the internal add-opens API, when exported to us
//! 2. [`ReflectiveHandleReconfigurer`]: a handle bound through a privileged lookup
//! 3. [`AgentReconfigurer`]: module redefinition through an instrumentation agent
//! 4. [`FallbackReconfigurer`]: no mutation, one warning per request
//!
//! [`ReconfigurerFactory`] picks the first strategy that initializes and
//! keeps it for its own lifetime.

pub mod agent;
pub mod aggregate;
pub mod direct;
pub mod factory;
pub mod fallback;
pub mod reflective;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::module::{ClassloaderModuleContext, ModuleOpenRequest};
use crate::runtime::{AccessError, InternalCallError, MutationError};

pub use agent::AgentReconfigurer;
pub use aggregate::{AggregatedOpenInstructions, PerModuleOpenInstructions};
pub use direct::DirectApiReconfigurer;
pub use factory::ReconfigurerFactory;
pub use fallback::FallbackReconfigurer;
pub use reflective::ReflectiveHandleReconfigurer;

/// A strategy for opening packages of running modules
pub trait ModulesReconfigurer: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Apply `requests`, resolving module names through `context`
    ///
    /// Unresolvable module names are logged and skipped one request at a
    /// time. A mutation rejected by the runtime fails the whole pass.
    /// Applying the same requests twice is a no-op the second time.
    fn open_modules(
        &self,
        requests: &[ModuleOpenRequest],
        context: &ClassloaderModuleContext,
    ) -> Result<(), ReconfigError>;
}

/// Reconfiguration strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    DirectApi,
    ReflectiveHandle,
    Agent,
    Fallback,
}

impl StrategyKind {
    /// Most privileged first
    pub const PRIVILEGE_ORDER: [StrategyKind; 4] = [
        StrategyKind::DirectApi,
        StrategyKind::ReflectiveHandle,
        StrategyKind::Agent,
        StrategyKind::Fallback,
    ];

    /// Human-readable name for diagnostics
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::DirectApi => "direct internal API",
            StrategyKind::ReflectiveHandle => "reflective handle",
            StrategyKind::Agent => "instrumentation agent",
            StrategyKind::Fallback => "fallback",
        }
    }

    /// Startup flag an operator supplies to make this strategy available
    pub fn remediation(self) -> Option<&'static str> {
        match self {
            StrategyKind::DirectApi => {
                Some("--add-exports=java.base/jdk.internal.module=ALL-UNNAMED")
            }
            StrategyKind::ReflectiveHandle => {
                Some("--add-opens=java.base/java.lang.invoke=ALL-UNNAMED")
            }
            StrategyKind::Agent => Some("-XX:+EnableDynamicAgentLoading"),
            StrategyKind::Fallback => None,
        }
    }

    pub fn is_privileged(self) -> bool {
        self != StrategyKind::Fallback
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A strategy cannot be used in this process
#[derive(Debug, Error)]
pub enum StrategyInitError {
    #[error("internal module API is not accessible ({0})")]
    InternalApiInaccessible(String),
    #[error("unexpected outcome probing the internal module API")]
    UnexpectedProbe(#[source] InternalCallError),
    #[error("failed to acquire a privileged add-opens handle")]
    PrivilegedLookup(#[source] AccessError),
    #[error("failed to install an agent in the running process")]
    AgentInstall(#[source] AccessError),
    #[error("strategy '{0}' is disabled by configuration")]
    Disabled(StrategyKind),
}

/// A reconfiguration pass failed
#[derive(Debug, Error)]
pub enum ReconfigError {
    #[error("failed to redefine module {module}")]
    Redefinition {
        module: String,
        #[source]
        source: MutationError,
    },
    #[error("failed to open {module}/{package} to {target}")]
    AddOpens {
        module: String,
        package: String,
        target: String,
        #[source]
        source: InternalCallError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privilege_order_ends_with_fallback() {
        let order = StrategyKind::PRIVILEGE_ORDER;
        assert_eq!(order.last(), Some(&StrategyKind::Fallback));
        assert!(order[..3].iter().all(|kind| kind.is_privileged()));
        assert!(order[..3].iter().all(|kind| kind.remediation().is_some()));
        assert_eq!(StrategyKind::Fallback.remediation(), None);
    }

    #[test]
    fn test_kind_serde_names() {
        let kinds: Vec<StrategyKind> =
            serde_json::from_str(r#"["direct-api", "reflective-handle", "agent"]"#).unwrap();
        assert_eq!(
            kinds,
            vec![
                StrategyKind::DirectApi,
                StrategyKind::ReflectiveHandle,
                StrategyKind::Agent
            ]
        );
    }
}
