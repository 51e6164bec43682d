use std::time::Instant;

use probe_core::engine::{Engine, EngineError, QueryOptions};
use probe_core::evidence::{EvidenceItem, EvidenceSet, InputError};

fn field(offset: u32, size: u32) -> EvidenceItem {
    EvidenceItem::FieldAccess { offset, size, role_hint: None }
}

#[test]
fn empty_evidence_never_starts_a_query() {
    let engine = Engine::new().expect("builtin catalog");
    let err = engine.analyze_items(vec![], &QueryOptions::default()).unwrap_err();
    assert!(matches!(err, EngineError::Input(InputError::Empty)));
}

#[test]
fn zero_sized_field_access_is_rejected() {
    let err = EvidenceSet::new(vec![field(0, 0)]).unwrap_err();
    assert_eq!(err, InputError::ZeroSizedField { offset: 0 });
}

#[test]
fn absurd_offsets_are_rejected() {
    let err = EvidenceSet::new(vec![field(1 << 20, 4)]).unwrap_err();
    assert!(matches!(err, InputError::OffsetOutOfRange { .. }));
}

#[test]
fn call_arity_must_match_listed_sizes() {
    let err = EvidenceSet::new(vec![EvidenceItem::CallSignature {
        callee: "sub_4017E0".to_string(),
        arg_count: 3,
        arg_sizes: vec![4, 4],
    }])
    .unwrap_err();
    assert_eq!(
        err,
        InputError::ArgCountMismatch { callee: "sub_4017E0".to_string(), declared: 3, listed: 2 }
    );
}

/// An already-elapsed deadline aborts the query before any fingerprint is
/// scored; only this query fails.
#[test]
fn elapsed_deadline_times_out_the_query() {
    let engine = Engine::new().expect("builtin catalog");
    let opts = QueryOptions { deadline: Some(Instant::now()), ..QueryOptions::default() };
    let err = engine
        .analyze_items(vec![field(0, 4), field(4, 4), field(8, 4)], &opts)
        .unwrap_err();
    assert!(matches!(err, EngineError::Timeout));

    // The engine is untouched; the next query succeeds.
    let report = engine
        .analyze_items(vec![field(0, 4), field(4, 4), field(8, 4)], &QueryOptions::default())
        .expect("query runs");
    assert!(!report.candidates.is_empty());
}

/// The engine shares one immutable catalog across threads with no locking;
/// concurrent queries must not interfere.
#[test]
fn concurrent_queries_are_independent() {
    let engine = std::sync::Arc::new(Engine::new().expect("builtin catalog"));
    let mut handles = Vec::new();
    for _ in 0..4 {
        let engine = engine.clone();
        handles.push(std::thread::spawn(move || {
            let report = engine
                .analyze_items(
                    vec![
                        EvidenceItem::FieldAccess {
                            offset: 0,
                            size: 4,
                            role_hint: Some("start".to_string()),
                        },
                        EvidenceItem::FieldAccess {
                            offset: 4,
                            size: 4,
                            role_hint: Some("end".to_string()),
                        },
                        EvidenceItem::FieldAccess {
                            offset: 8,
                            size: 4,
                            role_hint: Some("capacity".to_string()),
                        },
                        EvidenceItem::StrideArith { divisor: 4 },
                    ],
                    &QueryOptions::default(),
                )
                .expect("query runs");
            report.candidates[0].variant.clone()
        }));
    }
    for handle in handles {
        assert_eq!(handle.join().expect("thread"), "triple-ptr");
    }
}
