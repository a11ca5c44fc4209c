use std::fmt;
use std::sync::Arc;

use crate::catalog::{AnyArc, Component, Lookup, TypeInfo, TypeKey};

/// A stored service instance: a shared, type-erased value plus its descriptor.
///
/// Cloning an `Instance` clones the handle, never the value. Two handles are
/// the same instance when they point at the same allocation.
#[derive(Clone)]
pub struct Instance {
    value: AnyArc,
    info: &'static TypeInfo,
}

impl Instance {
    #[must_use]
    pub fn new<T: Component>(value: Arc<T>) -> Self {
        Self {
            value,
            info: T::type_info(),
        }
    }

    /// Wraps an owned value in a fresh `Arc`.
    #[must_use]
    pub fn from_value<T: Component>(value: T) -> Self {
        Self::new(Arc::new(value))
    }

    /// Descriptor of the concrete type.
    #[must_use]
    pub fn type_info(&self) -> &'static TypeInfo {
        self.info
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.info.name()
    }

    /// Key the registry stores this instance under.
    #[must_use]
    pub fn key(&self) -> TypeKey {
        self.info.key()
    }

    /// Identity comparison with another handle.
    #[must_use]
    pub fn same_as(&self, other: &Instance) -> bool {
        self.addr() == other.addr()
    }

    /// Whether `other` (any typed view) points at this instance.
    #[must_use]
    pub fn is<T: ?Sized>(&self, other: &Arc<T>) -> bool {
        self.addr() == Arc::as_ptr(other).cast::<()>()
    }

    /// Views the instance as `Q`: the exact type, an ancestor, or a capability.
    #[must_use]
    pub fn view<Q: Lookup + ?Sized>(&self) -> Option<Q::Output> {
        Q::view(self)
    }

    /// Exact-type downcast; ancestors do not match.
    #[must_use]
    pub fn downcast<T: Component>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }

    pub(crate) fn shared(&self) -> AnyArc {
        Arc::clone(&self.value)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.value).cast::<()>()
    }
}

impl<T: Component> From<Arc<T>> for Instance {
    fn from(value: Arc<T>) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.info.name())
            .field("addr", &self.addr())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:p}", self.info.name(), self.addr())
    }
}
