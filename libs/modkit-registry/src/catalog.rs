//! Type catalog: static descriptors that stand in for runtime reflection.
//!
//! Every storable concrete type (a *component*) and every trait it can be
//! looked up by (a *capability*) carries a [`TypeInfo`] built at compile time
//! by the [`component!`](crate::component) and [`capability!`](crate::capability)
//! macros. The descriptor answers three questions for the lookup engine:
//!
//! - identity: is this exactly the requested type?
//! - capabilities: does this type implement the requested trait, directly,
//!   through a supertrait, or through one of its ancestors?
//! - ancestry: is the requested type one of its declared superclasses?
//!
//! Rust has no class inheritance, so ancestry is declared. A subclass embeds a
//! shared handle to its base and implements [`Extends`] to hand it out.
//!
//! Name-keyed lookups go through the [`TypeCatalog`] trait. The default
//! [`GlobalCatalog`] indexes every descriptor submitted through `inventory`;
//! [`StaticCatalog`] is an explicit table for hosts that want to control the
//! set of resolvable names.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;

use crate::error::RegistryError;
use crate::instance::Instance;

/// Shared, type-erased instance as held by the registry.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Boxed typed view (`Arc<dyn Capability>`) produced by a capability cast.
pub type Erased = Box<dyn Any>;

/// What a descriptor describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// A concrete, storable type.
    Component,
    /// A trait that components can be looked up by.
    Capability,
}

/// Link from a component to its direct superclass.
#[doc(hidden)]
pub struct ParentLink {
    pub info: fn() -> &'static TypeInfo,
    pub upcast: fn(AnyArc) -> Option<AnyArc>,
}

/// A capability implemented directly by a component.
#[doc(hidden)]
pub struct CapabilityImpl {
    pub info: fn() -> &'static TypeInfo,
    pub cast: fn(AnyArc) -> Option<Erased>,
}

/// A supertrait of a capability.
#[doc(hidden)]
pub struct SuperLink {
    pub info: fn() -> &'static TypeInfo,
    pub upcast: fn(Erased) -> Option<Erased>,
}

/// Compile-time descriptor of a component or capability.
///
/// Fields are public only so the declaration macros can build descriptors in
/// `static` items; use the accessor methods instead.
pub struct TypeInfo {
    #[doc(hidden)]
    pub name: &'static str,
    #[doc(hidden)]
    pub id: fn() -> TypeId,
    #[doc(hidden)]
    pub kind: TypeKind,
    #[doc(hidden)]
    pub parent: Option<ParentLink>,
    #[doc(hidden)]
    pub capabilities: &'static [CapabilityImpl],
    #[doc(hidden)]
    pub supertraits: &'static [SuperLink],
}

impl TypeInfo {
    /// Fully-qualified name used for name-keyed lookups.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        (self.id)()
    }

    #[must_use]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    #[must_use]
    pub fn is_capability(&self) -> bool {
        self.kind == TypeKind::Capability
    }

    /// Registry key of this type.
    #[must_use]
    pub fn key(&self) -> TypeKey {
        TypeKey {
            id: self.type_id(),
            name: self.name,
        }
    }

    /// Exact identity comparison.
    #[must_use]
    pub fn is(&self, other: &TypeInfo) -> bool {
        self.type_id() == other.type_id()
    }

    /// Direct superclass, if one was declared.
    #[must_use]
    pub fn parent(&self) -> Option<&'static TypeInfo> {
        self.parent.as_ref().map(|link| (link.info)())
    }

    /// Strict superclasses, nearest first.
    #[must_use]
    pub fn ancestors(&self) -> Ancestors {
        Ancestors {
            next: self.parent(),
        }
    }

    /// Whether this component implements `capability`, directly, through a
    /// supertrait relationship, or through any ancestor.
    #[must_use]
    pub fn implements(&self, capability: &TypeInfo) -> bool {
        self.declares(capability)
            || self
                .ancestors()
                .any(|ancestor| ancestor.declares(capability))
    }

    fn declares(&self, capability: &TypeInfo) -> bool {
        self.capabilities
            .iter()
            .any(|imp| (imp.info)().extends_capability(capability))
    }

    /// Whether this capability is `target` or transitively extends it.
    #[must_use]
    pub fn extends_capability(&self, target: &TypeInfo) -> bool {
        self.is(target)
            || self
                .supertraits
                .iter()
                .any(|sup| (sup.info)().extends_capability(target))
    }

    /// The matching rule of the lookup engine: exact type, then capability,
    /// then ancestor chain.
    #[must_use]
    pub fn is_assignable_to(&self, target: &TypeInfo) -> bool {
        if self.is(target) {
            return true;
        }
        match target.kind {
            TypeKind::Capability => self.implements(target),
            TypeKind::Component => self.ancestors().any(|ancestor| ancestor.is(target)),
        }
    }

    /// Walks the parent links until `target` is reached, upcasting `value`
    /// at each step.
    pub(crate) fn upcast_to(&self, value: AnyArc, target: &TypeInfo) -> Option<AnyArc> {
        let mut level = self;
        let mut value = value;
        loop {
            if level.is(target) {
                return Some(value);
            }
            let link = level.parent.as_ref()?;
            value = (link.upcast)(value)?;
            level = (link.info)();
        }
    }

    /// Produces a boxed `Arc<dyn Target>` for a capability this component
    /// (or one of its ancestors) implements.
    pub(crate) fn cast_to_capability(&self, value: AnyArc, target: &TypeInfo) -> Option<Erased> {
        let mut level = self;
        let mut value = value;
        loop {
            for imp in level.capabilities {
                let capability = (imp.info)();
                if capability.extends_capability(target) {
                    let erased = (imp.cast)(Arc::clone(&value))?;
                    return capability.narrow(erased, target);
                }
            }
            let link = level.parent.as_ref()?;
            value = (link.upcast)(value)?;
            level = (link.info)();
        }
    }

    /// Upcasts a boxed `Arc<dyn Self>` along supertraits until `target`.
    fn narrow(&self, erased: Erased, target: &TypeInfo) -> Option<Erased> {
        if self.is(target) {
            return Some(erased);
        }
        let link = self
            .supertraits
            .iter()
            .find(|sup| (sup.info)().extends_capability(target))?;
        (link.info)().narrow((link.upcast)(erased)?, target)
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("parent", &self.parent().map(TypeInfo::name))
            .finish_non_exhaustive()
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Iterator over a component's ancestor chain.
pub struct Ancestors {
    next: Option<&'static TypeInfo>,
}

impl Iterator for Ancestors {
    type Item = &'static TypeInfo;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}

/// Stable key of a concrete type in the registry: its `TypeId`.
///
/// The name is carried for diagnostics only and does not take part in
/// equality or hashing.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Links a Rust type (a component `T` or a `dyn Capability`) to its
/// descriptor and to the typed handle lookups return for it.
///
/// Implemented by the [`component!`](crate::component) and
/// [`capability!`](crate::capability) macros.
pub trait Lookup: 'static {
    /// `Arc<T>` for components, `Arc<dyn Capability>` for capabilities.
    type Output: Clone;

    fn type_info() -> &'static TypeInfo;

    /// Views a matched instance as this type.
    fn view(instance: &Instance) -> Option<Self::Output>;
}

/// A concrete type that can be stored in the registry.
pub trait Component: Lookup<Output = Arc<Self>> + Any + Send + Sync {}

/// Declared inheritance: `Self` is a subclass of `P`.
///
/// The subclass hands out its embedded base, so a lookup by `P` that matches
/// a `Self` instance returns the base the instance was built on.
pub trait Extends<P: Component>: Component {
    fn upcast(self: Arc<Self>) -> Arc<P>;
}

/// Entry submitted to `inventory` by the declaration macros.
#[doc(hidden)]
pub struct Registration {
    info: fn() -> &'static TypeInfo,
}

impl Registration {
    #[must_use]
    pub const fn new(info: fn() -> &'static TypeInfo) -> Self {
        Self { info }
    }
}

inventory::collect!(Registration);

#[doc(hidden)]
#[must_use]
pub fn upcast_parent<S, P>(value: AnyArc) -> Option<AnyArc>
where
    S: Extends<P>,
    P: Component,
{
    let concrete = value.downcast::<S>().ok()?;
    Some(<S as Extends<P>>::upcast(concrete) as AnyArc)
}

#[doc(hidden)]
#[must_use]
pub fn downcast_arc<S: Any + Send + Sync>(value: AnyArc) -> Option<Arc<S>> {
    value.downcast::<S>().ok()
}

#[doc(hidden)]
#[must_use]
pub fn erase<T: Any>(view: T) -> Erased {
    Box::new(view)
}

#[doc(hidden)]
#[must_use]
pub fn unerase<T: Any>(erased: Erased) -> Option<T> {
    erased.downcast::<T>().ok().map(|boxed| *boxed)
}

#[doc(hidden)]
#[must_use]
pub fn view_component<S: Component>(instance: &Instance) -> Option<Arc<S>> {
    instance
        .type_info()
        .upcast_to(instance.shared(), S::type_info())
        .and_then(downcast_arc::<S>)
}

#[doc(hidden)]
#[must_use]
pub fn view_capability<C>(instance: &Instance) -> Option<Arc<C>>
where
    C: Lookup + ?Sized,
{
    instance
        .type_info()
        .cast_to_capability(instance.shared(), C::type_info())
        .and_then(unerase::<Arc<C>>)
}

/// Resolves fully-qualified type names to descriptors.
pub trait TypeCatalog: Send + Sync {
    /// Returns the descriptor registered under `name`.
    ///
    /// # Errors
    /// `RegistryError::Unresolved` for an unknown name,
    /// `RegistryError::DuplicateName` when distinct types claim it.
    fn resolve(&self, name: &str) -> Result<&'static TypeInfo, RegistryError>;
}

fn unresolved(name: &str) -> RegistryError {
    RegistryError::Unresolved {
        name: name.to_owned(),
    }
}

/// Global index entry: one descriptor, or a name several types collide on.
#[derive(Clone, Copy)]
enum NameSlot {
    Unique(&'static TypeInfo),
    Conflict(usize),
}

static GLOBAL_INDEX: LazyLock<HashMap<&'static str, NameSlot>> = LazyLock::new(|| {
    let mut index: HashMap<&'static str, NameSlot> = HashMap::new();
    for registration in inventory::iter::<Registration> {
        let info = (registration.info)();
        match index.entry(info.name()) {
            Entry::Vacant(slot) => {
                slot.insert(NameSlot::Unique(info));
            }
            Entry::Occupied(mut slot) => {
                let claimants = match *slot.get() {
                    NameSlot::Unique(existing) if existing.is(info) => continue,
                    NameSlot::Unique(_) => 2,
                    NameSlot::Conflict(count) => count.saturating_add(1),
                };
                tracing::warn!(
                    type_name = info.name(),
                    claimants,
                    "Distinct types registered under the same name; name lookups will fail"
                );
                slot.insert(NameSlot::Conflict(claimants));
            }
        }
    }
    tracing::debug!(types = index.len(), "Global type catalog indexed");
    index
});

/// Catalog over every type declared with the macros anywhere in the binary.
///
/// A name declared by more than one type never resolves; lookups by it fail
/// with `DuplicateName` instead of depending on link order.
#[derive(Clone, Copy, Debug, Default)]
pub struct GlobalCatalog;

impl TypeCatalog for GlobalCatalog {
    fn resolve(&self, name: &str) -> Result<&'static TypeInfo, RegistryError> {
        match GLOBAL_INDEX.get(name).copied() {
            Some(NameSlot::Unique(info)) => Ok(info),
            Some(NameSlot::Conflict(claimants)) => Err(RegistryError::DuplicateName {
                name: name.to_owned(),
                claimants,
            }),
            None => Err(unresolved(name)),
        }
    }
}

/// Explicit name -> descriptor table.
#[derive(Default)]
pub struct StaticCatalog {
    by_name: RwLock<HashMap<&'static str, &'static TypeInfo>>,
}

impl StaticCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `Q` under its declared name. Re-registering a name overwrites it.
    pub fn register<Q: Lookup + ?Sized>(&self) -> &Self {
        self.register_info(Q::type_info())
    }

    pub fn register_info(&self, info: &'static TypeInfo) -> &Self {
        self.by_name.write().insert(info.name(), info);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.read().is_empty()
    }
}

impl TypeCatalog for StaticCatalog {
    fn resolve(&self, name: &str) -> Result<&'static TypeInfo, RegistryError> {
        self.by_name
            .read()
            .get(name)
            .copied()
            .ok_or_else(|| unresolved(name))
    }
}

impl fmt::Debug for StaticCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.by_name.read().keys().copied().collect();
        names.sort_unstable();
        f.debug_struct("StaticCatalog")
            .field("names", &names)
            .finish()
    }
}
