//! Type-indexed service registry.
//!
//! Design goals:
//! - Providers store an instance once, keyed by its own concrete type.
//! - Consumers fetch by concrete type, by any capability (trait) the instance
//!   implements, or by any declared ancestor, without knowing which concrete
//!   type was stored.
//! - A lookup returns exactly one instance or fails. Zero matches is
//!   `NotFound`, more than one is `Ambiguous`; the registry never picks.
//!
//! Typical flows:
//! - During start-up a single initializing task stores services, replacing
//!   defaults through `store_or_replace`.
//! - Steady-state consumers resolve `Arc<dyn Api>` handles and keep them.
//! - Tests `clone()` a fully wired registry and swap single services in the
//!   copy without touching the original.
//!
//! Implementation details:
//! - Key = `TypeKey` of the concrete type (at most one instance per type).
//! - Value = `Instance` (`Arc<dyn Any + Send + Sync>` plus its descriptor).
//! - Storage is a `DashMap`: single-key writes and full scans are safe from
//!   any thread without an outer lock.
//!
//! Notes:
//! - Compound operations are not atomic. Two concurrent `store_or_replace`
//!   calls over overlapping queries can lose an update or leave two matching
//!   entries behind (surfacing later as `Ambiguous`). Serialize registration.
//! - Removing an entry drops only the association; handles already given out
//!   stay valid.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::catalog::{Component, GlobalCatalog, Lookup, TypeCatalog, TypeInfo, TypeKey};
use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::instance::Instance;
use crate::stats::{Instrumentation, LookupStats};

/// Internal map type for the registry.
type InstanceMap = DashMap<TypeKey, Instance>;

/// Heterogeneous store of service instances, queried by type.
pub struct Registry {
    entries: InstanceMap,
    catalog: Arc<dyn TypeCatalog>,
    stats: Instrumentation,
}

impl Registry {
    /// Empty registry resolving names through the [`GlobalCatalog`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_catalog(Arc::new(GlobalCatalog))
    }

    /// Empty registry resolving names through `catalog`.
    #[must_use]
    pub fn with_catalog(catalog: Arc<dyn TypeCatalog>) -> Self {
        Self {
            entries: DashMap::new(),
            catalog,
            stats: Instrumentation::default(),
        }
    }

    /// Registry pre-seeded with `instances`, each under its own concrete
    /// type. When two share a type the later one wins.
    #[must_use]
    pub fn with_instances<I>(instances: I) -> Self
    where
        I: IntoIterator<Item = Instance>,
    {
        let registry = Self::new();
        for instance in instances {
            registry.store_instance(instance);
        }
        registry
    }

    /// Empty registry with instrumentation set up from `config`.
    #[must_use]
    pub fn from_config(config: &RegistryConfig) -> Self {
        Self {
            entries: DashMap::new(),
            catalog: Arc::new(GlobalCatalog),
            stats: Instrumentation::new(config.stats_logging, config.slow_lookup_threshold),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------- Mutation ----------

impl Registry {
    /// Store `instance` under its concrete type, overwriting any previous
    /// instance of that exact type. Never fails.
    pub fn store<T: Component>(&self, instance: Arc<T>) -> &Self {
        self.store_instance(Instance::new(instance))
    }

    /// Type-erased form of [`store`](Self::store).
    pub fn store_instance(&self, instance: Instance) -> &Self {
        tracing::trace!(type_name = instance.type_name(), "Storing instance");
        self.entries.insert(instance.key(), instance);
        self
    }

    /// Store `instance`, first removing the single instance currently
    /// matching `Q`.
    ///
    /// - nothing matches `Q`: just stores;
    /// - one instance matches: removes it (by its own concrete type), then stores;
    /// - several match: fails with `Ambiguous` and changes nothing.
    ///
    /// # Errors
    /// `RegistryError::Ambiguous` when more than one stored instance matches `Q`.
    pub fn store_or_replace<Q, T>(&self, instance: Arc<T>) -> Result<&Self, RegistryError>
    where
        Q: Lookup + ?Sized,
        T: Component,
    {
        self.replace_matching(Instance::new(instance), Q::type_info())
    }

    /// [`store_or_replace`](Self::store_or_replace) with the query given by
    /// fully-qualified name.
    ///
    /// # Errors
    /// `RegistryError::Unresolved` for an unknown name, `RegistryError::DuplicateName`
    /// for a name distinct types claim, `RegistryError::Ambiguous` when more
    /// than one stored instance matches.
    pub fn store_or_replace_by_name<T: Component>(
        &self,
        instance: Arc<T>,
        name: &str,
    ) -> Result<&Self, RegistryError> {
        let query = self.resolve_name(name)?;
        self.replace_matching(Instance::new(instance), query)
    }

    /// Type-erased form of [`store_or_replace`](Self::store_or_replace).
    ///
    /// # Errors
    /// `RegistryError::Ambiguous` when more than one stored instance matches `query`.
    pub fn store_instance_or_replace(
        &self,
        instance: Instance,
        query: &'static TypeInfo,
    ) -> Result<&Self, RegistryError> {
        self.replace_matching(instance, query)
    }

    fn replace_matching(
        &self,
        instance: Instance,
        query: &'static TypeInfo,
    ) -> Result<&Self, RegistryError> {
        match self.lookup(query) {
            Ok(previous) => {
                tracing::debug!(
                    query = query.name(),
                    replaced = previous.type_name(),
                    replacement = instance.type_name(),
                    "Replacing registered instance"
                );
                self.entries.remove(&previous.key());
            }
            Err(RegistryError::NotFound { .. }) => {}
            Err(err) => return Err(err),
        }
        Ok(self.store_instance(instance))
    }

    /// Remove the instance stored under exactly the concrete type `T`.
    /// Instances of subclasses of `T` are left alone.
    pub fn remove<T: Component>(&self) -> Option<Instance> {
        self.entries
            .remove(&T::type_info().key())
            .map(|(_, instance)| instance)
    }

    /// Drop every entry. Idempotent.
    pub fn flush(&self) {
        self.entries.clear();
    }

    /// Turn on lookup instrumentation. There is no way to turn it off.
    pub fn enable_stats_logging(&self) -> &Self {
        self.stats.enable();
        self
    }
}

// ---------- Lookup engine ----------

impl Registry {
    /// Find the single instance matching `query`.
    ///
    /// An instance matches when its concrete type is `query`, implements the
    /// capability `query`, or has `query` in its ancestor chain.
    ///
    /// # Errors
    /// `NotFound` for zero matches, `Ambiguous` (carrying every match) for more
    /// than one.
    pub fn lookup(&self, query: &'static TypeInfo) -> Result<Instance, RegistryError> {
        self.timed(query, || self.find_unique(query))
    }

    /// [`lookup`](Self::lookup) with the query given by fully-qualified name.
    ///
    /// # Errors
    /// `Unresolved` when the catalog does not know `name`, `DuplicateName` when
    /// distinct types claim it, otherwise as [`lookup`](Self::lookup).
    pub fn lookup_by_name(&self, name: &str) -> Result<Instance, RegistryError> {
        let query = self.resolve_name(name)?;
        self.lookup(query)
    }

    /// Typed lookup: `Arc<T>` for a component, `Arc<dyn Trait>` for a
    /// capability.
    ///
    /// # Errors
    /// As [`lookup`](Self::lookup); `TypeMismatch` if the descriptors declare a
    /// relation the instance cannot be viewed through.
    pub fn get<Q: Lookup + ?Sized>(&self) -> Result<Q::Output, RegistryError> {
        let query = Q::type_info();
        self.timed(query, || view::<Q>(&self.find_unique(query)?))
    }

    /// Typed lookup with the query given by name; the match is then viewed as `Q`.
    ///
    /// # Errors
    /// As [`lookup_by_name`](Self::lookup_by_name), plus `TypeMismatch` when the
    /// match cannot be viewed as `Q`.
    pub fn get_by_name<Q: Lookup + ?Sized>(&self, name: &str) -> Result<Q::Output, RegistryError> {
        let query = self.resolve_name(name)?;
        self.timed(query, || view::<Q>(&self.find_unique(query)?))
    }

    fn resolve_name(&self, name: &str) -> Result<&'static TypeInfo, RegistryError> {
        self.catalog.resolve(name)
    }

    /// Runs `lookup` and, when stats logging is on, records it only if it
    /// succeeded as a whole.
    fn timed<T>(
        &self,
        query: &'static TypeInfo,
        lookup: impl FnOnce() -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let started = self.stats.start();
        let found = lookup()?;
        if let Some(started) = started {
            self.stats.record(query, started);
        }
        Ok(found)
    }

    fn find_unique(&self, query: &'static TypeInfo) -> Result<Instance, RegistryError> {
        let mut matches: Vec<Instance> = Vec::new();
        for entry in &self.entries {
            let candidate = entry.value();
            if candidate.type_info().is_assignable_to(query)
                && !matches.iter().any(|m| m.same_as(candidate))
            {
                matches.push(candidate.clone());
            }
        }

        if matches.len() > 1 {
            return Err(RegistryError::Ambiguous {
                query: query.name(),
                matches,
            });
        }
        matches.pop().ok_or(RegistryError::NotFound {
            query: query.name(),
        })
    }
}

fn view<Q: Lookup + ?Sized>(instance: &Instance) -> Result<Q::Output, RegistryError> {
    Q::view(instance).ok_or_else(|| RegistryError::TypeMismatch {
        query: Q::type_info().name(),
        found: instance.type_name(),
    })
}

// ---------- Fallback accessors ----------
//
// Every failure kind collapses into absence here: a caller cannot tell
// "nothing matched" from "too many matched" without calling `get`.

impl Registry {
    /// `get::<Q>()`, or `fallback` on any failure.
    #[must_use]
    pub fn get_or_else<Q: Lookup + ?Sized>(&self, fallback: Q::Output) -> Q::Output {
        absent_on_error(self.get::<Q>()).unwrap_or(fallback)
    }

    /// `get::<Q>()`, or `None` on any failure.
    #[must_use]
    pub fn get_or_none<Q: Lookup + ?Sized>(&self) -> Option<Q::Output> {
        absent_on_error(self.get::<Q>())
    }

    /// Whether `get::<Q>()` would succeed.
    #[must_use]
    pub fn contains<Q: Lookup + ?Sized>(&self) -> bool {
        self.get_or_none::<Q>().is_some()
    }

    /// Whether `get::<Q>()` would fail, for any reason.
    #[must_use]
    pub fn missing<Q: Lookup + ?Sized>(&self) -> bool {
        !self.contains::<Q>()
    }

    /// `lookup_by_name(name)`, or `fallback` on any failure.
    #[must_use]
    pub fn lookup_by_name_or_else(&self, name: &str, fallback: Instance) -> Instance {
        absent_on_error(self.lookup_by_name(name)).unwrap_or(fallback)
    }

    /// `lookup_by_name(name)`, or `None` on any failure.
    #[must_use]
    pub fn lookup_by_name_or_none(&self, name: &str) -> Option<Instance> {
        absent_on_error(self.lookup_by_name(name))
    }

    /// Whether `lookup_by_name(name)` would succeed.
    #[must_use]
    pub fn contains_name(&self, name: &str) -> bool {
        self.lookup_by_name_or_none(name).is_some()
    }

    /// Whether `lookup_by_name(name)` would fail, for any reason.
    #[must_use]
    pub fn missing_name(&self, name: &str) -> bool {
        !self.contains_name(name)
    }
}

fn absent_on_error<T>(result: Result<T, RegistryError>) -> Option<T> {
    result
        .inspect_err(|err| tracing::trace!(kind = err.kind(), error = %err, "Lookup treated as absent"))
        .ok()
}

// ---------- Introspection ----------

impl Registry {
    /// Number of stored instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of the stored concrete types, sorted.
    #[must_use]
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> =
            self.entries.iter().map(|entry| entry.key().name()).collect();
        names.sort_unstable();
        names
    }

    /// Lookup counters; all zero unless stats logging is enabled.
    #[must_use]
    pub fn stats(&self) -> LookupStats {
        self.stats.snapshot()
    }

    #[must_use]
    pub fn stats_logging_enabled(&self) -> bool {
        self.stats.is_enabled()
    }
}

/// Independent copy of the mapping. Entries still point at the same
/// instances; stores and removals on either side are invisible to the other.
/// The copy keeps the catalog and the instrumentation settings but starts
/// with zeroed counters.
impl Clone for Registry {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            catalog: Arc::clone(&self.catalog),
            stats: self.stats.fork(),
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.type_names())
            .field("stats_logging", &self.stats.is_enabled())
            .finish_non_exhaustive()
    }
}
