use probe_core::catalog::Family;
use probe_core::engine::{Engine, QueryOptions};
use probe_core::evidence::EvidenceItem;
use probe_core::matcher::Classification;
use probe_core::report::MAX_PARTIALS;

fn field(offset: u32, size: u32, role: &str) -> EvidenceItem {
    EvidenceItem::FieldAccess { offset, size, role_hint: Some(role.to_string()) }
}

fn engine() -> Engine {
    Engine::new().expect("builtin catalog")
}

#[test]
fn unique_report_carries_bindings_and_layout() {
    let report = engine()
        .analyze_items(
            vec![
                field(0, 4, "start"),
                field(4, 4, "end"),
                field(8, 4, "capacity"),
                EvidenceItem::StrideArith { divisor: 8 },
            ],
            &QueryOptions::default(),
        )
        .expect("query runs");

    assert_eq!(report.classification, Classification::Unique);
    assert_eq!(report.catalog_version, "msvc-x86-v1");
    let winner = &report.candidates[0];
    assert_eq!(winner.family, Family::Vector);
    assert!(winner.bindings.is_some());
    assert!(winner.resolution_error.is_none());
    let layout = winner.layout.as_ref().expect("layout synthesized");
    assert_eq!(layout.total_size, 12);
}

/// A unique match whose parameters cannot be derived still reports the
/// family/variant decision; only the bindings are withheld.
#[test]
fn resolution_failure_does_not_invalidate_the_match() {
    let report = engine()
        .analyze_items(
            vec![field(0, 4, "start"), field(4, 4, "end"), field(8, 4, "capacity")],
            &QueryOptions::default(),
        )
        .expect("query runs");

    assert_eq!(report.classification, Classification::Unique);
    let winner = &report.candidates[0];
    assert_eq!(winner.family, Family::Vector);
    assert!(winner.bindings.is_none());
    assert!(winner.layout.is_none());
    let err = winner.resolution_error.as_ref().expect("recorded error");
    assert!(err.contains("stride"), "unexpected error text: {err}");
}

/// Ambiguous: every tied candidate is independently resolved where
/// possible. Here the list node resolves (its value slot is right there)
/// while the vector cannot without stride arithmetic.
#[test]
fn ambiguous_report_resolves_each_tied_candidate_independently() {
    let report = engine()
        .analyze_items(
            vec![field(0, 4, "pointer"), field(4, 4, "pointer"), field(8, 4, "pointer")],
            &QueryOptions::default(),
        )
        .expect("query runs");

    assert_eq!(report.classification, Classification::Ambiguous);
    assert_eq!(report.candidates.len(), 2);
    assert_eq!(report.candidates[0].family, Family::Vector);
    assert!(report.candidates[0].resolution_error.is_some());
    assert_eq!(report.candidates[1].family, Family::List);
    let list_layout = report.candidates[1].layout.as_ref().expect("list layout");
    assert_eq!(list_layout.total_size, 12);
}

#[test]
fn no_match_report_lists_the_best_partials() {
    let report = engine()
        .analyze_items(vec![field(0, 4, "left")], &QueryOptions::default())
        .expect("query runs");

    assert_eq!(report.classification, Classification::NoMatch);
    assert!(!report.candidates.is_empty());
    assert!(report.candidates.len() <= MAX_PARTIALS);
    for partial in &report.candidates {
        assert_eq!(partial.confidence, 0.0);
        assert!(partial.layout.is_none());
        assert!(!partial.missing_required.is_empty());
    }
}

#[test]
fn text_rendering_summarizes_the_outcome() {
    let report = engine()
        .analyze_items(
            vec![
                field(0, 4, "pointer-or-buffer"),
                field(4, 4, "size"),
                EvidenceItem::ConstantCompare { at_offset: 20, value: 15 },
            ],
            &QueryOptions::default(),
        )
        .expect("query runs");

    let text = report.render_text();
    assert!(text.contains("classification: unique"));
    assert!(text.contains("string/sso"));
    assert!(text.contains("buffer"));
    assert!(text.contains("capacity"));
}
