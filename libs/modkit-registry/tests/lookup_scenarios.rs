#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end lookup, replacement and snapshot behavior.

use std::fmt;
use std::sync::Arc;

use modkit_registry::{
    Extends, Instance, Lookup, Registry, RegistryError, capability, component,
};

// ---------- Fixtures (must be at module scope for `inventory`) ----------

#[derive(Debug)]
struct TypeA;
#[derive(Debug)]
struct TypeB;
#[derive(Debug)]
struct TypeC;

component!(TypeA as "pkg.TypeA");
component!(TypeB as "pkg.TypeB");
component!(TypeC as "pkg.TypeC");

#[derive(Debug)]
struct C {
    label: &'static str,
}

#[derive(Debug)]
struct CPlus {
    base: Arc<C>,
}

impl Extends<C> for CPlus {
    fn upcast(self: Arc<Self>) -> Arc<C> {
        Arc::clone(&self.base)
    }
}

#[derive(Debug)]
struct CPlusPlus {
    base: Arc<CPlus>,
}

impl Extends<CPlus> for CPlusPlus {
    fn upcast(self: Arc<Self>) -> Arc<CPlus> {
        Arc::clone(&self.base)
    }
}

component!(C as "pkg.C");
component!(CPlus as "pkg.CPlus" extends C);
component!(CPlusPlus as "pkg.CPlusPlus" extends CPlus);

trait IFace: fmt::Debug + Send + Sync {
    fn tag(&self) -> &'static str;
}
capability!(IFace as "pkg.IFace");

#[derive(Debug)]
struct Impl1;
impl IFace for Impl1 {
    fn tag(&self) -> &'static str {
        "impl1"
    }
}

#[derive(Debug)]
struct Impl2;
impl IFace for Impl2 {
    fn tag(&self) -> &'static str {
        "impl2"
    }
}

component!(Impl1 as "pkg.Impl1" implements IFace);
component!(Impl2 as "pkg.Impl2" implements IFace);

#[derive(Debug)]
struct First;
#[derive(Debug)]
struct Second;

component!(First as "pkg.Twice");
component!(Second as "pkg.Twice");

fn c_chain() -> (Arc<C>, Arc<CPlus>, Arc<CPlusPlus>) {
    let c = Arc::new(C { label: "base" });
    let cplus = Arc::new(CPlus {
        base: Arc::clone(&c),
    });
    let cplusplus = Arc::new(CPlusPlus {
        base: Arc::clone(&cplus),
    });
    (c, cplus, cplusplus)
}

fn same<T: ?Sized, U: ?Sized>(left: &Arc<T>, right: &Arc<U>) -> bool {
    Arc::as_ptr(left).cast::<()>() == Arc::as_ptr(right).cast::<()>()
}

// ---------- Concrete scenarios ----------

#[test]
fn empty_registry_reports_not_found() {
    let registry = Registry::new();
    let err = registry.get::<TypeA>().unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "no registered instance matches `pkg.TypeA`");
}

#[test]
fn seeded_registry_answers_exact_type_queries() {
    let a = Arc::new(TypeA);
    let b = Arc::new(TypeB);
    let registry = Registry::with_instances([
        Instance::new(Arc::clone(&a)),
        Instance::new(Arc::clone(&b)),
    ]);

    assert!(Arc::ptr_eq(&registry.get::<TypeA>().unwrap(), &a));
    assert!(Arc::ptr_eq(&registry.get::<TypeB>().unwrap(), &b));
    assert!(registry.get::<TypeC>().unwrap_err().is_not_found());
}

#[test]
fn subclass_chain_makes_ancestor_queries_ambiguous() {
    let (_, cplus, cplusplus) = c_chain();
    let registry = Registry::new();
    registry.store(Arc::clone(&cplus)).store(Arc::clone(&cplusplus));

    let err = registry.get::<C>().unwrap_err();
    assert!(err.is_ambiguous());
    let mut names: Vec<&str> = err.matches().iter().map(Instance::type_name).collect();
    names.sort_unstable();
    assert_eq!(names, ["pkg.CPlus", "pkg.CPlusPlus"]);

    assert!(registry.get::<CPlus>().unwrap_err().is_ambiguous());
    assert!(Arc::ptr_eq(
        &registry.get::<CPlusPlus>().unwrap(),
        &cplusplus
    ));
}

#[test]
fn single_subclass_satisfies_every_ancestor_query() {
    let (c, cplus, cplusplus) = c_chain();
    let registry = Registry::new();
    registry.store(Arc::clone(&cplusplus));

    let as_c = registry.get::<C>().unwrap();
    assert!(Arc::ptr_eq(&as_c, &c));
    assert_eq!(as_c.label, "base");
    assert!(Arc::ptr_eq(&registry.get::<CPlus>().unwrap(), &cplus));

    let instance = registry.lookup(C::type_info()).unwrap();
    assert!(instance.is(&cplusplus), "lookup returns the stored instance");
}

#[test]
fn store_or_replace_swaps_capability_implementation() {
    let registry = Registry::new();
    registry.store(Arc::new(Impl1));
    let impl2 = Arc::new(Impl2);

    registry
        .store_or_replace::<dyn IFace, _>(Arc::clone(&impl2))
        .unwrap();

    let got = registry.get::<dyn IFace>().unwrap();
    assert!(same(&got, &impl2));
    assert_eq!(got.tag(), "impl2");
    assert!(registry.get::<Impl1>().unwrap_err().is_not_found());
}

#[test]
fn name_keyed_lookup() {
    let a = Arc::new(TypeA);
    let registry = Registry::new();
    registry.store(Arc::clone(&a));

    let found = registry.lookup_by_name("pkg.TypeA").unwrap();
    assert!(found.is(&a));
    assert!(Arc::ptr_eq(
        &registry.get_by_name::<TypeA>("pkg.TypeA").unwrap(),
        &a
    ));

    assert!(
        registry
            .lookup_by_name("pkg.TypeC")
            .unwrap_err()
            .is_not_found()
    );
    assert!(
        registry
            .lookup_by_name("pkg.Unregistered")
            .unwrap_err()
            .is_unresolved()
    );
}

#[test]
fn name_keyed_lookup_follows_capabilities_and_ancestors() -> anyhow::Result<()> {
    let (c, _, cplusplus) = c_chain();
    let registry = Registry::new();
    registry.store(Arc::clone(&cplusplus)).store(Arc::new(Impl1));

    assert!(registry.lookup_by_name("pkg.C")?.is(&cplusplus));
    assert!(Arc::ptr_eq(&registry.get_by_name::<C>("pkg.C")?, &c));
    assert_eq!(registry.get_by_name::<dyn IFace>("pkg.IFace")?.tag(), "impl1");
    Ok(())
}

#[test]
fn name_keyed_fallbacks_absorb_every_failure() {
    let registry = Registry::new();
    registry.store(Arc::new(Impl1)).store(Arc::new(Impl2));
    let fallback = Instance::from_value(TypeB);

    assert!(registry.missing_name("pkg.IFace"), "ambiguous");
    assert!(registry.missing_name("pkg.TypeA"), "not found");
    assert!(registry.missing_name("pkg.Unregistered"), "unresolved");
    assert!(registry.lookup_by_name_or_none("pkg.IFace").is_none());
    assert!(
        registry
            .lookup_by_name_or_else("pkg.IFace", fallback.clone())
            .same_as(&fallback)
    );
    assert!(registry.contains_name("pkg.Impl1"));
}

#[test]
fn store_or_replace_by_name() {
    let registry = Registry::new();
    registry.store(Arc::new(Impl1));

    registry
        .store_or_replace_by_name(Arc::new(Impl2), "pkg.IFace")
        .unwrap();
    assert_eq!(registry.get::<dyn IFace>().unwrap().tag(), "impl2");
    assert_eq!(registry.len(), 1);

    let err = registry
        .store_or_replace_by_name(Arc::new(TypeA), "pkg.Unregistered")
        .unwrap_err();
    assert!(err.is_unresolved());
    assert!(registry.missing::<TypeA>(), "no mutation on resolution failure");
}

#[test]
fn name_claimed_by_two_types_never_resolves() {
    let registry = Registry::new();
    registry.store(Arc::new(First)).store(Arc::new(Second));

    match registry.lookup_by_name("pkg.Twice") {
        Err(RegistryError::DuplicateName { name, claimants }) => {
            assert_eq!(name, "pkg.Twice");
            assert_eq!(claimants, 2);
        }
        other => panic!("Expected DuplicateName, got {other:?}"),
    }
    assert!(registry.missing_name("pkg.Twice"));

    // Typed lookups still tell the two apart.
    assert!(registry.contains::<First>());
    assert!(registry.contains::<Second>());
}

#[test]
fn duplicate_name_fails_the_same_way_whichever_type_is_stored() {
    let registry = Registry::new();
    registry.store(Arc::new(First));

    assert!(
        registry
            .get_by_name::<First>("pkg.Twice")
            .unwrap_err()
            .is_duplicate_name()
    );
    assert!(
        registry
            .get_by_name::<Second>("pkg.Twice")
            .unwrap_err()
            .is_duplicate_name()
    );

    let err = registry
        .store_or_replace_by_name(Arc::new(Second), "pkg.Twice")
        .unwrap_err();
    assert!(err.is_duplicate_name());
    assert!(registry.missing::<Second>(), "no mutation on resolution failure");
    assert_eq!(registry.len(), 1);
}

// ---------- Properties ----------

#[test]
fn round_trip_returns_the_same_instance() {
    let registry = Registry::new();
    let (c, cplus, cplusplus) = c_chain();
    registry
        .store(Arc::clone(&c))
        .store(Arc::clone(&cplus))
        .store(Arc::clone(&cplusplus));

    assert!(Arc::ptr_eq(&registry.get::<CPlusPlus>().unwrap(), &cplusplus));
    assert!(registry.lookup(CPlus::type_info()).is_err(), "CPlus and CPlusPlus");
    assert!(registry.lookup(C::type_info()).is_err(), "all three");
}

#[test]
fn replacement_of_exact_type_drops_the_previous_instance() {
    let registry = Registry::new();
    let first = Arc::new(TypeA);
    let second = Arc::new(TypeA);
    registry.store(Arc::clone(&first));

    registry
        .store_or_replace::<TypeA, _>(Arc::clone(&second))
        .unwrap();

    let got = registry.get::<TypeA>().unwrap();
    assert!(Arc::ptr_eq(&got, &second));
    assert!(!Arc::ptr_eq(&got, &first));
    assert_eq!(registry.len(), 1);
}

#[test]
fn replacement_by_ancestor_removes_the_subclass_entry() {
    let (_, cplus, _) = c_chain();
    let registry = Registry::new();
    registry.store(Arc::clone(&cplus));
    let replacement = Arc::new(C { label: "fresh" });

    registry
        .store_or_replace::<C, _>(Arc::clone(&replacement))
        .unwrap();

    assert!(registry.get::<CPlus>().unwrap_err().is_not_found());
    assert!(Arc::ptr_eq(&registry.get::<C>().unwrap(), &replacement));
}

#[test]
fn ambiguity_is_never_resolved_by_picking() {
    let registry = Registry::new();
    registry.store(Arc::new(Impl1)).store(Arc::new(Impl2));

    for _ in 0..16 {
        match registry.lookup(<dyn IFace>::type_info()) {
            Err(RegistryError::Ambiguous { query, matches }) => {
                assert_eq!(query, "pkg.IFace");
                assert_eq!(matches.len(), 2);
            }
            other => panic!("Expected Ambiguous, got {other:?}"),
        }
    }
}

#[test]
fn clones_are_structurally_independent() {
    let original = Registry::new();
    original.store(Arc::new(TypeA));
    let copy = original.clone();

    copy.store(Arc::new(TypeB));
    assert!(copy.contains::<TypeB>());
    assert!(original.missing::<TypeB>());

    original.store(Arc::new(TypeC));
    assert!(original.contains::<TypeC>());
    assert!(copy.missing::<TypeC>());

    copy.flush();
    assert!(original.contains::<TypeA>());
}

#[test]
fn concurrent_stores_and_gets_keep_the_map_consistent() {
    let registry = Registry::new();
    registry.store(Arc::new(TypeA));

    std::thread::scope(|scope| {
        for i in 0..8 {
            let registry = &registry;
            scope.spawn(move || {
                for _ in 0..100 {
                    if i % 2 == 0 {
                        registry.store(Arc::new(TypeB));
                    } else {
                        registry.store(Arc::new(Impl1));
                    }
                    assert!(registry.get::<TypeA>().is_ok());
                }
            });
        }
    });

    assert_eq!(registry.len(), 3);
    assert_eq!(registry.type_names(), ["pkg.Impl1", "pkg.TypeA", "pkg.TypeB"]);
}
