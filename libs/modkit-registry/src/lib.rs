//! Type-indexed service registry for manual dependency wiring.
//!
//! Instances are stored under their concrete type and looked up by that type,
//! by a capability (trait) they implement, or by a declared ancestor. A lookup
//! succeeds only when exactly one stored instance qualifies.
//!
//! ```ignore
//! use std::sync::Arc;
//! use modkit_registry::{Registry, capability, component};
//!
//! trait Clock: Send + Sync {
//!     fn now(&self) -> u64;
//! }
//! capability!(Clock);
//!
//! struct SystemClock;
//! impl Clock for SystemClock {
//!     fn now(&self) -> u64 { 0 }
//! }
//! component!(SystemClock implements Clock);
//!
//! let registry = Registry::new();
//! registry.store(Arc::new(SystemClock));
//! let clock: Arc<dyn Clock> = registry.get::<dyn Clock>()?;
//! ```
//!
//! This is not an `IoC` container: there is no constructor wiring, no
//! lifecycle management and no scoping.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod catalog;
pub mod config;
mod error;
mod instance;
mod macros;
mod registry;
mod stats;

pub use catalog::{
    Ancestors, Component, Extends, GlobalCatalog, Lookup, StaticCatalog, TypeCatalog, TypeInfo,
    TypeKey, TypeKind,
};
pub use config::{ConfigError, RegistryConfig};
pub use error::RegistryError;
pub use instance::Instance;
pub use registry::Registry;
pub use stats::LookupStats;

#[doc(hidden)]
pub mod __private {
    pub use inventory;
}
