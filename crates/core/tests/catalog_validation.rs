use probe_core::catalog::{
    Catalog, CatalogError, Family, Fingerprint, OffsetRule, RequiredFeature, ResolverHint,
    SizeRule, CATALOG_VERSION,
};
use probe_core::evidence::Role;

fn minimal_fingerprint(family: Family, variant: &'static str) -> Fingerprint {
    Fingerprint {
        family,
        variant,
        required: vec![RequiredFeature::Field {
            offset: OffsetRule::Exact(0),
            size: SizeRule::Exact(4),
            role: Role::Start,
        }],
        optional: vec![],
        hint: ResolverHint::ElementStride,
        layout: vec![],
    }
}

#[test]
fn builtin_catalog_validates() {
    let catalog = Catalog::builtin().expect("builtin catalog");
    assert_eq!(catalog.version(), CATALOG_VERSION);
    assert_eq!(catalog.fingerprints().len(), 6);
}

/// The catalog order is the tie-break order; it must stay stable.
#[test]
fn builtin_catalog_family_order_is_fixed() {
    let catalog = Catalog::builtin().expect("builtin catalog");
    let families: Vec<Family> = catalog.fingerprints().iter().map(|fp| fp.family).collect();
    assert_eq!(
        families,
        vec![Family::String, Family::Vector, Family::Map, Family::Set, Family::List, Family::Bitset]
    );
}

#[test]
fn global_catalog_is_shared_and_valid() {
    let a = probe_core::catalog::global();
    let b = probe_core::catalog::global();
    assert_eq!(a.version(), b.version());
    assert!(std::ptr::eq(a, b));
}

#[test]
fn empty_catalog_is_rejected() {
    let err = Catalog::new("test", vec![]).unwrap_err();
    assert!(matches!(err, CatalogError::Empty));
}

/// Two variants of one family with identical required signatures could both
/// fully bind the same evidence; that is a malformed catalog, caught at
/// construction rather than at query time.
#[test]
fn duplicate_required_signature_is_rejected() {
    let entries = vec![
        minimal_fingerprint(Family::Vector, "first"),
        minimal_fingerprint(Family::Vector, "second"),
    ];
    let err = Catalog::new("test", entries).unwrap_err();
    match err {
        CatalogError::DuplicateSignature { family, first, second } => {
            assert_eq!(family, Family::Vector);
            assert_eq!(first, "first");
            assert_eq!(second, "second");
        }
        other => panic!("expected DuplicateSignature, got {other:?}"),
    }
}

/// The same required signature under different families is fine; families
/// are expected to collide structurally (that is what Ambiguous is for).
#[test]
fn same_signature_across_families_is_allowed() {
    let entries = vec![
        minimal_fingerprint(Family::Vector, "v"),
        minimal_fingerprint(Family::List, "l"),
    ];
    assert!(Catalog::new("test", entries).is_ok());
}
