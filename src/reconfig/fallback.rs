//! Fallback strategy
//!
//! Used when no privileged mechanism is available. Changes nothing and warns
//! once per request with the flags an operator would have to pass by hand.

use tracing::warn;

use super::{ModulesReconfigurer, ReconfigError, StrategyKind};
use crate::module::{ClassloaderModuleContext, ModuleOpenRequest};

#[derive(Debug, Default)]
pub struct FallbackReconfigurer;

impl FallbackReconfigurer {
    pub fn new() -> Self {
        Self
    }
}

impl ModulesReconfigurer for FallbackReconfigurer {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Fallback
    }

    fn open_modules(
        &self,
        requests: &[ModuleOpenRequest],
        _context: &ClassloaderModuleContext,
    ) -> Result<(), ReconfigError> {
        for request in requests {
            warn!(
                "Could not automatically add-opens for module {}/{{{}}} to module {}; \
                 start the process with {}",
                request.opened_module(),
                request.packages().iter().cloned().collect::<Vec<_>>().join(","),
                request.opening_module(),
                manual_flags(request)
            );
        }
        Ok(())
    }
}

/// Command-line flags equivalent to `request`
fn manual_flags(request: &ModuleOpenRequest) -> String {
    request
        .packages()
        .iter()
        .map(|package| {
            format!(
                "--add-opens={}/{}={}",
                request.opened_module(),
                package,
                request.opening_module()
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_flags() {
        let request =
            ModuleOpenRequest::to_all_unnamed("java.base", ["java.util", "java.lang"]).unwrap();
        assert_eq!(
            manual_flags(&request),
            "--add-opens=java.base/java.lang=ALL-UNNAMED \
             --add-opens=java.base/java.util=ALL-UNNAMED"
        );
    }
}
