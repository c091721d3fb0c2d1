//! Module Reconfig - runtime module encapsulation reconfiguration
//!
//! At process startup, opens packages of running modules to the modules that
//! need reflective access to them, the programmatic equivalent of
//! `--add-opens`. Requests are collected from any number of independent
//! producers, deduplicated, and applied through the most privileged
//! mechanism the process allows.
//!
//! ## Architecture
//!
//! 1. [`module`]: requests, collection, per-loader resolution, manifest rendering
//! 2. [`reconfig`]: the strategy chain and its factory
//! 3. [`classloading`]: named exclusive execution and loader instrumentation
//! 4. [`bootstrap`]: the orchestrator owning runtime, strategy and batch
//! 5. [`runtime`]: the adapter to the host module system
//!
//! ## Design Principles
//!
//! 1. **Never abort startup**: without privileges, degrade to warnings that
//!    name the flags an operator must pass
//! 2. **Additive only**: existing module edges are never dropped or replaced
//! 3. **Per-loader resolution**: module handles never leak across loader generations
//! 4. **Bounded coordination**: concurrent waiters time out instead of piling up

pub mod bootstrap;
pub mod classloading;
pub mod config;
pub mod module;
pub mod reconfig;
pub mod runtime;
pub mod utils;

pub use bootstrap::ModuleBootstrap;
pub use config::ReconfigConfig;
pub use module::{ClassloaderModuleContext, ModuleOpenRequest, RequestError, ALL_UNNAMED};
pub use reconfig::{ModulesReconfigurer, ReconfigError, ReconfigurerFactory, StrategyKind};
pub use runtime::{InMemoryRuntime, LoaderHandle, ModuleHandle, ModuleRuntime, RuntimeFlags};
