use probe_core::catalog::{Catalog, Family, Fingerprint};
use probe_core::evidence::{EvidenceItem, EvidenceSet};
use probe_core::resolver::{resolve, Bindings, ResolutionError};

fn field(offset: u32, size: u32, role: &str) -> EvidenceItem {
    EvidenceItem::FieldAccess { offset, size, role_hint: Some(role.to_string()) }
}

fn catalog() -> Catalog {
    Catalog::builtin().expect("builtin catalog")
}

fn fingerprint(catalog: &Catalog, family: Family) -> &Fingerprint {
    catalog
        .fingerprints()
        .iter()
        .find(|fp| fp.family == family)
        .expect("family present in builtin catalog")
}

fn evidence(items: Vec<EvidenceItem>) -> EvidenceSet {
    EvidenceSet::new(items).expect("valid evidence")
}

#[test]
fn vector_element_size_comes_from_the_stride_divisor() {
    let catalog = catalog();
    let ev = evidence(vec![
        field(0, 4, "start"),
        field(4, 4, "end"),
        field(8, 4, "capacity"),
        EvidenceItem::StrideArith { divisor: 8 },
    ]);
    let bindings = resolve(fingerprint(&catalog, Family::Vector), &ev).expect("resolves");
    match bindings {
        Bindings::Vector { element_size, hypotheses } => {
            assert_eq!(element_size, 8);
            assert!(hypotheses.iter().any(|h| h == "f64"));
        }
        other => panic!("expected vector bindings, got {other:?}"),
    }
}

#[test]
fn vector_without_stride_evidence_fails_recoverably() {
    let catalog = catalog();
    let ev = evidence(vec![field(0, 4, "start"), field(4, 4, "end"), field(8, 4, "capacity")]);
    let err = resolve(fingerprint(&catalog, Family::Vector), &ev).unwrap_err();
    assert_eq!(err, ResolutionError::NoStrideEvidence);
}

#[test]
fn string_bindings_are_fixed_by_the_abi() {
    let catalog = catalog();
    let ev = evidence(vec![field(0, 4, "pointer-or-buffer")]);
    let bindings = resolve(fingerprint(&catalog, Family::String), &ev).expect("resolves");
    assert_eq!(
        bindings,
        Bindings::String { buffer_size: 16, capacity_sentinel: 15, char_size: 1 }
    );
}

#[test]
fn bitset_shift_of_five_selects_32_bit_words() {
    let catalog = catalog();
    let ev = evidence(vec![
        field(0, 4, "bit-word"),
        field(4, 4, "bit-word"),
        EvidenceItem::ShiftArith { amount: 5 },
    ]);
    let bindings = resolve(fingerprint(&catalog, Family::Bitset), &ev).expect("resolves");
    match bindings {
        Bindings::Bitset { bits, word_bits, words } => {
            assert_eq!(word_bits, 32);
            assert_eq!(words, 2);
            assert_eq!(bits, 64);
        }
        other => panic!("expected bitset bindings, got {other:?}"),
    }
}

#[test]
fn bitset_shift_of_six_selects_64_bit_words() {
    let catalog = catalog();
    let ev = evidence(vec![
        field(0, 8, "bit-word"),
        field(8, 8, "bit-word"),
        EvidenceItem::ShiftArith { amount: 6 },
    ]);
    let bindings = resolve(fingerprint(&catalog, Family::Bitset), &ev).expect("resolves");
    assert_eq!(bindings, Bindings::Bitset { bits: 128, word_bits: 64, words: 2 });
}

/// A shift amount that disagrees with the declared word extent must fail
/// with both hypotheses attached, never silently pick one.
#[test]
fn bitset_width_disagreement_is_reported_not_guessed() {
    let catalog = catalog();
    let ev = evidence(vec![
        field(0, 4, "bit-word"),
        field(4, 4, "bit-word"),
        EvidenceItem::ShiftArith { amount: 6 },
    ]);
    let err = resolve(fingerprint(&catalog, Family::Bitset), &ev).unwrap_err();
    assert_eq!(err, ResolutionError::InconsistentWidth { from_shift: 64, from_extent: 32 });
}

#[test]
fn map_key_and_value_sizes_come_from_the_field_shapes() {
    let catalog = catalog();
    let ev = evidence(vec![
        field(0, 4, "left"),
        field(4, 4, "right"),
        field(8, 4, "parent"),
        EvidenceItem::ConstantCompare { at_offset: 12, value: 0x0101 },
        field(16, 4, "key"),
        field(20, 8, "value"),
    ]);
    let bindings = resolve(fingerprint(&catalog, Family::Map), &ev).expect("resolves");
    match bindings {
        Bindings::MapLike { key_size, value_size, .. } => {
            assert_eq!(key_size, 4);
            assert_eq!(value_size, Some(8));
        }
        other => panic!("expected map-like bindings, got {other:?}"),
    }
}

/// No distinguishing value field: the value type is recorded as absent, not
/// invented.
#[test]
fn set_records_the_value_type_as_absent() {
    let catalog = catalog();
    let ev = evidence(vec![
        field(0, 4, "left"),
        field(4, 4, "right"),
        field(8, 4, "parent"),
        EvidenceItem::ConstantCompare { at_offset: 12, value: 0x0101 },
        field(16, 4, "key"),
    ]);
    let bindings = resolve(fingerprint(&catalog, Family::Set), &ev).expect("resolves");
    match bindings {
        Bindings::MapLike { key_size, value_size, .. } => {
            assert_eq!(key_size, 4);
            assert_eq!(value_size, None);
        }
        other => panic!("expected map-like bindings, got {other:?}"),
    }
}

/// The known 12-byte-node sentinel recovers the 32-bit address-space limit
/// as corroboration.
#[test]
fn list_sentinel_recovers_the_address_space_hint() {
    let catalog = catalog();
    let ev = evidence(vec![
        field(0, 4, "forward"),
        field(4, 4, "back"),
        field(8, 4, "value"),
        EvidenceItem::ConstantCompare { at_offset: 4, value: 357_913_941 },
    ]);
    let bindings = resolve(fingerprint(&catalog, Family::List), &ev).expect("resolves");
    match bindings {
        Bindings::List { value_size, node_size, address_space_hint, .. } => {
            assert_eq!(value_size, 4);
            assert_eq!(node_size, 12);
            assert_eq!(address_space_hint, Some(357_913_941 * 12));
        }
        other => panic!("expected list bindings, got {other:?}"),
    }
}

#[test]
fn list_without_sentinel_still_resolves() {
    let catalog = catalog();
    let ev = evidence(vec![field(0, 4, "forward"), field(4, 4, "back"), field(8, 8, "value")]);
    let bindings = resolve(fingerprint(&catalog, Family::List), &ev).expect("resolves");
    match bindings {
        Bindings::List { value_size, node_size, address_space_hint, .. } => {
            assert_eq!(value_size, 8);
            assert_eq!(node_size, 16);
            assert_eq!(address_space_hint, None);
        }
        other => panic!("expected list bindings, got {other:?}"),
    }
}
