//! Declaration macros that build [`TypeInfo`](crate::TypeInfo) descriptors.
//!
//! ```ignore
//! trait Store: Send + Sync {}
//! trait ReadOnlyStore: Store {}
//! modkit_registry::capability!(Store);
//! modkit_registry::capability!(ReadOnlyStore extends Store);
//!
//! struct MemStore;
//! impl Store for MemStore {}
//! modkit_registry::component!(MemStore implements Store);
//!
//! struct CachedStore { inner: Arc<MemStore> }
//! impl Extends<MemStore> for CachedStore {
//!     fn upcast(self: Arc<Self>) -> Arc<MemStore> { Arc::clone(&self.inner) }
//! }
//! modkit_registry::component!(CachedStore as "storage.CachedStore" extends MemStore);
//! ```
//!
//! Types must be named by a plain identifier (bring them into scope with
//! `use`). Without `as "..."` the lookup name is the module path of the
//! declaration followed by the identifier. Every declaration is submitted to
//! `inventory`, which feeds [`GlobalCatalog`](crate::GlobalCatalog).

/// Declares a storable concrete type.
///
/// `component!(Ty [as "name"] [extends Parent] [implements CapA, CapB])`
///
/// `extends Parent` requires `Ty: Extends<Parent>`; every capability listed
/// must be declared with [`capability!`] and implemented by `Ty`.
#[macro_export]
macro_rules! component {
    (
        $ty:ident
        $(as $name:literal)?
        $(extends $parent:ident)?
        $(implements $($cap:ident),+ $(,)?)?
    ) => {
        impl $crate::Lookup for $ty {
            type Output = ::std::sync::Arc<$ty>;

            fn type_info() -> &'static $crate::TypeInfo {
                static INFO: $crate::TypeInfo = $crate::TypeInfo {
                    name: $crate::__type_name!($ty $(, $name)?),
                    id: ::std::any::TypeId::of::<$ty>,
                    kind: $crate::TypeKind::Component,
                    parent: $crate::__parent_link!($ty $(, $parent)?),
                    capabilities: &[
                        $($(
                            $crate::catalog::CapabilityImpl {
                                info: <dyn $cap as $crate::Lookup>::type_info,
                                cast: |value| {
                                    $crate::catalog::downcast_arc::<$ty>(value).map(|concrete| {
                                        $crate::catalog::erase(
                                            concrete as ::std::sync::Arc<dyn $cap>,
                                        )
                                    })
                                },
                            },
                        )+)?
                    ],
                    supertraits: &[],
                };
                &INFO
            }

            fn view(instance: &$crate::Instance) -> ::std::option::Option<Self::Output> {
                $crate::catalog::view_component::<$ty>(instance)
            }
        }

        impl $crate::Component for $ty {}

        $crate::__private::inventory::submit! {
            $crate::catalog::Registration::new(<$ty as $crate::Lookup>::type_info)
        }
    };
}

/// Declares a trait that components can be looked up by.
///
/// `capability!(Trait [as "name"] [extends SuperA, SuperB])`
///
/// The trait must be dyn-compatible; `extends` lists supertraits that were
/// themselves declared with `capability!`.
#[macro_export]
macro_rules! capability {
    (
        $cap:ident
        $(as $name:literal)?
        $(extends $($sup:ident),+ $(,)?)?
    ) => {
        impl $crate::Lookup for dyn $cap {
            type Output = ::std::sync::Arc<dyn $cap>;

            fn type_info() -> &'static $crate::TypeInfo {
                static INFO: $crate::TypeInfo = $crate::TypeInfo {
                    name: $crate::__type_name!($cap $(, $name)?),
                    id: ::std::any::TypeId::of::<dyn $cap>,
                    kind: $crate::TypeKind::Capability,
                    parent: ::std::option::Option::None,
                    capabilities: &[],
                    supertraits: &[
                        $($(
                            $crate::catalog::SuperLink {
                                info: <dyn $sup as $crate::Lookup>::type_info,
                                upcast: |erased| {
                                    $crate::catalog::unerase::<::std::sync::Arc<dyn $cap>>(erased)
                                        .map(|view| {
                                            $crate::catalog::erase(
                                                view as ::std::sync::Arc<dyn $sup>,
                                            )
                                        })
                                },
                            },
                        )+)?
                    ],
                };
                &INFO
            }

            fn view(instance: &$crate::Instance) -> ::std::option::Option<Self::Output> {
                $crate::catalog::view_capability::<dyn $cap>(instance)
            }
        }

        $crate::__private::inventory::submit! {
            $crate::catalog::Registration::new(<dyn $cap as $crate::Lookup>::type_info)
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __type_name {
    ($ty:ident, $name:literal) => {
        $name
    };
    ($ty:ident) => {
        ::std::concat!(::std::module_path!(), "::", ::std::stringify!($ty))
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __parent_link {
    ($ty:ident) => {
        ::std::option::Option::None
    };
    ($ty:ident, $parent:ident) => {
        ::std::option::Option::Some($crate::catalog::ParentLink {
            info: <$parent as $crate::Lookup>::type_info,
            upcast: $crate::catalog::upcast_parent::<$ty, $parent>,
        })
    };
}
