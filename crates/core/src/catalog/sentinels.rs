//! Versioned heuristic data tables.
//!
//! These back the corroborating (optional) features and the advisory naming
//! in parameter resolution. They are deliberately plain data: a new STL
//! release or a different ABI changes these tables, not the matcher.

/// Maximum-element-count sentinels for `std::list<T>` on 32-bit targets,
/// one per plausible node size: `floor((2^32 - 1) / node_size)`.
///
/// The compiler bakes these into the "list too long" length check; seeing
/// one compared against a size field is strong corroboration. 357913941 is
/// the 12-byte-node entry (two pointers plus a 4-byte value) quoted in
/// decompilations of `std::list<float>`.
pub const LIST_MAX_SENTINELS: &[(u32, i64)] = &[
    (12, 357_913_941),
    (16, 268_435_455),
    (20, 214_748_364),
    (24, 178_956_970),
    (28, 153_391_689),
    (32, 134_217_727),
    (36, 119_304_647),
    (40, 107_374_182),
];

/// True if `value` is a known list max-element-count sentinel.
pub fn is_list_max_sentinel(value: i64) -> bool {
    LIST_MAX_SENTINELS.iter().any(|(_, v)| *v == value)
}

/// Inverse lookup: the node size whose sentinel is `value`.
pub fn list_node_size_for_sentinel(value: i64) -> Option<u32> {
    LIST_MAX_SENTINELS.iter().find(|(_, v)| *v == value).map(|(n, _)| *n)
}

/// Advisory type names for a recovered element/key/value size.
///
/// Naming is a convenience for the human reading the report; the engine
/// itself only ever claims "size = N".
pub fn size_hypotheses(size: u32) -> &'static [&'static str] {
    match size {
        1 => &["char", "bool", "u8"],
        2 => &["u16", "i16", "wchar_t"],
        4 => &["u32", "i32", "f32", "pointer"],
        8 => &["u64", "i64", "f64"],
        12 => &["12-byte aggregate (e.g. vec3<f32>)"],
        16 => &["16-byte aggregate"],
        24 => &["std::string value type (x86, VS2013)"],
        28 => &["std::string value type (x86, VS2015+)"],
        _ => &[],
    }
}
