//! Module open requests and their resolution
//!
//! ## Flow
//!
//! - **Collection**: producers contribute [`ModuleOpenRequest`]s into a
//!   [`RequestCollector`], which deduplicates them
//! - **Resolution**: a [`ClassloaderModuleContext`] resolves module names for
//!   one loader generation, memoizing lookups
//! - **Packaging**: [`ResolvedModuleRequirements`] renders the batch as an
//!   `Add-Opens` manifest attribute

pub mod collector;
pub mod context;
pub mod request;
pub mod requirements;

pub use collector::{parse_add_opens, ModuleOpenProducer, RequestCollector};
pub use context::ClassloaderModuleContext;
pub use request::{ModuleOpenRequest, RequestError, ALL_UNNAMED};
pub use requirements::{ManifestAttributes, ResolvedModuleRequirements, ADD_OPENS_ATTRIBUTE};
