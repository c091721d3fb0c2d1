//! Classloading support
//!
//! Coordination and observation utilities for loaders that may be hit by
//! many threads at once during startup and live reload.

pub mod exclusive;
pub mod limiter;
pub mod listener;
pub mod loader;

pub use exclusive::{ExclusiveError, NamedExclusiveSingleOperations, DEFAULT_WAIT_TIMEOUT};
pub use limiter::{LimiterError, LoaderLimiter};
pub use listener::LoaderEventListener;
pub use loader::{DefinedUnit, LoadError, UnitLoader, UnitSource};
