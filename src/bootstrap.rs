//! Startup orchestration
//!
//! [`ModuleBootstrap`] is the process-scoped owner of everything module
//! reconfiguration needs: the runtime adapter, the memoized strategy and the
//! final request batch. It is built once, after every producer contributed
//! its requests, and applied once per loader generation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info};

use crate::classloading::{UnitLoader, UnitSource, DEFAULT_WAIT_TIMEOUT};
use crate::config::ReconfigConfig;
use crate::module::{
    ClassloaderModuleContext, ManifestAttributes, ModuleOpenProducer, ModuleOpenRequest,
    RequestCollector, ResolvedModuleRequirements,
};
use crate::reconfig::{ReconfigError, ReconfigurerFactory, StrategyKind};
use crate::runtime::{LoaderHandle, ModuleRuntime};

pub struct ModuleBootstrap {
    runtime: Arc<dyn ModuleRuntime>,
    factory: ReconfigurerFactory,
    requests: Vec<ModuleOpenRequest>,
    wait_timeout: Duration,
    render_add_opens: bool,
}

impl ModuleBootstrap {
    /// Bootstrap applying `requests` with default settings
    pub fn new(runtime: Arc<dyn ModuleRuntime>, requests: Vec<ModuleOpenRequest>) -> Self {
        Self {
            factory: ReconfigurerFactory::new(Arc::clone(&runtime)),
            runtime,
            requests,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            render_add_opens: true,
        }
    }

    /// Bootstrap from configuration plus any number of producers
    ///
    /// Collects config-declared opens, extension JVM options and producer
    /// requests, in that order, deduplicated.
    pub fn from_config(
        runtime: Arc<dyn ModuleRuntime>,
        config: &ReconfigConfig,
        producers: &[&dyn ModuleOpenProducer],
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let mut collector = RequestCollector::new();
        for declared in &config.module_opens {
            collector
                .add_declared(declared)
                .with_context(|| format!("Invalid module open declared for {}", declared.module))?;
        }
        for extension in &config.extensions {
            collector
                .add_extension_options(extension)
                .with_context(|| format!("Invalid JVM options of extension {}", extension.name))?;
        }
        for producer in producers {
            collector
                .collect_from(*producer)
                .with_context(|| format!("Producer {} failed", producer.name()))?;
        }
        info!("Collected {} module open requests", collector.len());

        Ok(Self {
            factory: ReconfigurerFactory::with_disabled(
                Arc::clone(&runtime),
                config.strategies.disabled.iter().copied(),
            ),
            runtime,
            requests: collector.finish(),
            wait_timeout: config.exclusive.wait_timeout(),
            render_add_opens: config.manifest.render_add_opens,
        })
    }

    /// Open the requested packages for one loader generation
    ///
    /// Returns the generation's context; it must not be reused for another
    /// loader. The strategy is only selected once requests exist.
    pub fn apply(&self, loader: &LoaderHandle) -> Result<ClassloaderModuleContext, ReconfigError> {
        let context = ClassloaderModuleContext::new(Arc::clone(&self.runtime), loader);
        if self.requests.is_empty() {
            debug!("No module open requests for loader {}", loader);
            return Ok(context);
        }

        let reconfigurer = self.factory.reconfigurer();
        reconfigurer.open_modules(&self.requests, &context)?;
        info!(
            "Applied {} module open requests for loader {} using the {} strategy",
            self.requests.len(),
            loader,
            reconfigurer.kind()
        );
        Ok(context)
    }

    /// Manifest requirements of the request batch
    pub fn requirements(&self) -> ResolvedModuleRequirements {
        ResolvedModuleRequirements::new(&self.requests)
    }

    /// Write the `Add-Opens` attribute, unless disabled by configuration
    pub fn render_manifest(&self, manifest: &mut ManifestAttributes) {
        if self.render_add_opens {
            self.requirements().render_into(manifest);
        } else {
            debug!("Add-Opens manifest rendering disabled by configuration");
        }
    }

    /// Unit loader for a new generation, using the configured wait bound
    pub fn unit_loader(&self, loader: LoaderHandle, source: Arc<dyn UnitSource>) -> UnitLoader {
        UnitLoader::new(loader, source).with_wait_timeout(self.wait_timeout)
    }

    pub fn requests(&self) -> &[ModuleOpenRequest] {
        &self.requests
    }

    pub fn selected_strategy(&self) -> Option<StrategyKind> {
        self.factory.selected_kind()
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }
}

impl fmt::Debug for ModuleBootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleBootstrap")
            .field("requests", &self.requests.len())
            .field("factory", &self.factory)
            .field("wait_timeout", &self.wait_timeout)
            .finish()
    }
}
