//! Fingerprint catalog: immutable, versioned structural signatures for the
//! MSVC x86 container families.
//!
//! The catalog is built once (and validated) at startup, then shared
//! read-only across every query for the life of the process. Entries are
//! transcribed from how the MSVC STL actually lays these types out on x86;
//! ABI or STL-version differences are data changes here, never matcher logic
//! changes.

pub mod sentinels;

use std::fmt;

use once_cell::sync::Lazy;
use serde::Serialize;
use thiserror::Error;

use crate::evidence::Role;

/// Version tag of the embedded fingerprint data.
pub const CATALOG_VERSION: &str = "msvc-x86-v1";

/// Pointer width of the target ABI, in bytes.
pub const PTR_SIZE: u32 = 4;

/// Container family. The set is fixed by the ABI and ordered: ranking ties
/// are broken by this order, never by evidence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    String,
    Vector,
    Map,
    Set,
    List,
    Bitset,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Family::String => "string",
            Family::Vector => "vector",
            Family::Map => "map",
            Family::Set => "set",
            Family::List => "list",
            Family::Bitset => "bitset",
        };
        f.write_str(name)
    }
}

/// Where a required field may sit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetRule {
    Exact(u32),
    /// Strictly after the given offset (e.g. a map's value field after the key).
    After(u32),
}

/// How large a required field may be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeRule {
    Exact(u32),
    OneOf(&'static [u32]),
    Any,
}

impl SizeRule {
    pub fn admits(&self, size: u32) -> bool {
        match self {
            SizeRule::Exact(n) => size == *n,
            SizeRule::OneOf(ns) => ns.contains(&size),
            SizeRule::Any => size > 0,
        }
    }
}

/// A structural feature that must be present for the fingerprint to bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequiredFeature {
    /// A field access matching offset, size and role. An evidence field with
    /// no recognized role hint matches any role (wildcard).
    Field { offset: OffsetRule, size: SizeRule, role: Role },
    /// A known sentinel constant at a fixed offset (string capacity 15,
    /// tree sentinel flag word 0x0101).
    SentinelValue { at_offset: u32, value: i64 },
    /// No field access strictly after the given offset. Distinguishes set
    /// (no mapped value after the key) from map.
    NoFieldAfter { offset: u32 },
    /// A bit-index shift of 5 or 6 was observed (bitset word indexing).
    ShiftPattern,
}

impl fmt::Display for RequiredFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequiredFeature::Field { offset, size, role } => {
                match offset {
                    OffsetRule::Exact(o) => write!(f, "field at {o}")?,
                    OffsetRule::After(o) => write!(f, "field after {o}")?,
                }
                match size {
                    SizeRule::Exact(n) => write!(f, " of {n} bytes")?,
                    SizeRule::OneOf(ns) => write!(f, " sized one of {ns:?}")?,
                    SizeRule::Any => {}
                }
                write!(f, " ({role:?})")
            }
            RequiredFeature::SentinelValue { at_offset, value } => {
                write!(f, "constant {value:#x} at offset {at_offset}")
            }
            RequiredFeature::NoFieldAfter { offset } => {
                write!(f, "no field after offset {offset}")
            }
            RequiredFeature::ShiftPattern => write!(f, "bit-index shift of 5 or 6"),
        }
    }
}

/// A corroborating feature: raises confidence when present, never required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionalFeature {
    /// All listed offsets are stored/compared to zero (default construction).
    ZeroedSlots { offsets: &'static [u32] },
    /// A known maximum-element-count sentinel appears as a compared constant.
    ListMaxSentinel,
    /// A call whose callee name contains the given fragment.
    DiagnosticCall { callee_contains: &'static str, arg_count: Option<u32> },
    /// A referenced string literal containing the given fragment.
    LiteralText { contains: &'static str },
    /// A 3-argument construction call paired with a literal whose observed
    /// length matches its text (`ctor(dst, "String", 6)`).
    CtorLiteral,
}

impl fmt::Display for OptionalFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionalFeature::ZeroedSlots { offsets } => {
                write!(f, "zero-initialized slots at {offsets:?}")
            }
            OptionalFeature::ListMaxSentinel => write!(f, "known max-element-count sentinel"),
            OptionalFeature::DiagnosticCall { callee_contains, .. } => {
                write!(f, "call to *{callee_contains}*")
            }
            OptionalFeature::LiteralText { contains } => write!(f, "literal containing {contains:?}"),
            OptionalFeature::CtorLiteral => write!(f, "construction call with literal and length"),
        }
    }
}

/// Strategy for deriving template parameters once this fingerprint wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverHint {
    /// Small-string union; all parameters fixed by the ABI.
    Sso,
    /// Element size from the observed stride divisor.
    ElementStride,
    /// Key/value sizes read off the matched node fields.
    NodeFields,
    /// Value size from the node's third slot; node size derived from it.
    ListNode,
    /// Word width from the shift amount, cross-checked against the extent.
    WordShift,
}

/// Byte size of a canonical layout field, possibly binding-parameterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeSpec {
    Fixed(u32),
    KeySize,
    ValueSize,
    /// `words * word_bits / 8` from resolved bitset bindings.
    WordArray,
}

/// One field of the canonical (true, in-memory) layout this fingerprint
/// expands to. Offsets are derived by walking the templates in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTemplate {
    pub name: &'static str,
    pub role: &'static str,
    pub size: SizeSpec,
    /// Explicit alignment override; defaults to the natural alignment of the
    /// resolved size. The string union needs this (16-byte buffer, 4-byte
    /// aligned because of the pointer member).
    pub align: Option<u32>,
}

/// Declarative, immutable signature of one container family + variant.
///
/// The match shape (`required`/`optional`) describes what the *observed
/// access pattern* looks like in decompiled code; `layout` is the canonical
/// struct the synthesizer emits. The two differ: decompilers frequently
/// report accesses through a collapsed slot view of the region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub family: Family,
    pub variant: &'static str,
    pub required: Vec<RequiredFeature>,
    pub optional: Vec<OptionalFeature>,
    pub hint: ResolverHint,
    pub layout: Vec<FieldTemplate>,
}

/// Error type for catalog construction.
///
/// A malformed catalog is a defect in the engine's embedded data, reported
/// at startup and never deferred to query time.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog is empty")]
    Empty,

    #[error(
        "fingerprints {family}/{first} and {family}/{second} have identical \
         required-feature signatures"
    )]
    DuplicateSignature { family: Family, first: &'static str, second: &'static str },
}

/// The validated, read-only fingerprint registry.
#[derive(Debug, Clone)]
pub struct Catalog {
    version: &'static str,
    entries: Vec<Fingerprint>,
}

impl Catalog {
    /// Validate and seal a set of fingerprints.
    ///
    /// Within one family, no two variants may carry the same required
    /// signature; both could then fully bind the same evidence set, which
    /// the classification rules cannot untangle.
    pub fn new(version: &'static str, entries: Vec<Fingerprint>) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }
        for (i, a) in entries.iter().enumerate() {
            for b in entries.iter().skip(i + 1) {
                if a.family == b.family && a.required == b.required {
                    return Err(CatalogError::DuplicateSignature {
                        family: a.family,
                        first: a.variant,
                        second: b.variant,
                    });
                }
            }
        }
        Ok(Self { version, entries })
    }

    /// All fingerprints in fixed, stable order (the tie-break order).
    pub fn fingerprints(&self) -> &[Fingerprint] {
        &self.entries
    }

    pub fn version(&self) -> &'static str {
        self.version
    }

    /// Build the embedded MSVC x86 catalog.
    pub fn builtin() -> Result<Self, CatalogError> {
        Catalog::new(CATALOG_VERSION, builtin_fingerprints())
    }
}

/// Process-wide shared catalog: built on first use, immutable afterwards,
/// safe for unsynchronized concurrent reads.
pub fn global() -> &'static Catalog {
    static GLOBAL: Lazy<Catalog> = Lazy::new(|| {
        Catalog::builtin().expect("embedded fingerprint catalog is malformed")
    });
    &GLOBAL
}

fn builtin_fingerprints() -> Vec<Fingerprint> {
    use OptionalFeature::*;
    use RequiredFeature::*;

    vec![
        // std::string with the small-buffer union: { union { char* p; char
        // buf[16]; }; DWORD size; DWORD max; } where max is pinned to 15.
        // Decompilers report the initial stores through adjacent small slots.
        Fingerprint {
            family: Family::String,
            variant: "sso",
            required: vec![
                Field {
                    offset: OffsetRule::Exact(0),
                    size: SizeRule::Exact(PTR_SIZE),
                    role: Role::PointerOrBuffer,
                },
                Field {
                    offset: OffsetRule::Exact(4),
                    size: SizeRule::Exact(4),
                    role: Role::Length,
                },
                SentinelValue { at_offset: 20, value: 15 },
            ],
            optional: vec![CtorLiteral],
            hint: ResolverHint::Sso,
            layout: vec![
                FieldTemplate {
                    name: "buffer",
                    role: "buffer-or-pointer",
                    size: SizeSpec::Fixed(16),
                    align: Some(4),
                },
                FieldTemplate {
                    name: "size",
                    role: "length",
                    size: SizeSpec::Fixed(4),
                    align: None,
                },
                FieldTemplate {
                    name: "capacity",
                    role: "capacity",
                    size: SizeSpec::Fixed(4),
                    align: None,
                },
            ],
        },
        // std::vector: three same-typed pointers, all zero on default
        // construction.
        Fingerprint {
            family: Family::Vector,
            variant: "triple-ptr",
            required: vec![
                Field {
                    offset: OffsetRule::Exact(0),
                    size: SizeRule::Exact(PTR_SIZE),
                    role: Role::Start,
                },
                Field {
                    offset: OffsetRule::Exact(4),
                    size: SizeRule::Exact(PTR_SIZE),
                    role: Role::End,
                },
                Field {
                    offset: OffsetRule::Exact(8),
                    size: SizeRule::Exact(PTR_SIZE),
                    role: Role::CapacityEnd,
                },
            ],
            optional: vec![ZeroedSlots { offsets: &[0, 4, 8] }],
            hint: ResolverHint::ElementStride,
            layout: vec![
                FieldTemplate {
                    name: "start",
                    role: "pointer",
                    size: SizeSpec::Fixed(PTR_SIZE),
                    align: None,
                },
                FieldTemplate {
                    name: "end",
                    role: "pointer",
                    size: SizeSpec::Fixed(PTR_SIZE),
                    align: None,
                },
                FieldTemplate {
                    name: "capacity_end",
                    role: "pointer",
                    size: SizeSpec::Fixed(PTR_SIZE),
                    align: None,
                },
            ],
        },
        // Red-black tree sentinel node as std::map materializes it: left,
        // right and parent all pointing back at the node, and a combined
        // flag word storing is-first-node and color (0x0101 when both set).
        // The mapped value is a second typed field after the key.
        Fingerprint {
            family: Family::Map,
            variant: "rb-node",
            required: vec![
                Field {
                    offset: OffsetRule::Exact(0),
                    size: SizeRule::Exact(PTR_SIZE),
                    role: Role::Left,
                },
                Field {
                    offset: OffsetRule::Exact(4),
                    size: SizeRule::Exact(PTR_SIZE),
                    role: Role::Right,
                },
                Field {
                    offset: OffsetRule::Exact(8),
                    size: SizeRule::Exact(PTR_SIZE),
                    role: Role::Parent,
                },
                SentinelValue { at_offset: 12, value: 0x0101 },
                Field {
                    offset: OffsetRule::Exact(16),
                    size: SizeRule::Any,
                    role: Role::Key,
                },
                Field {
                    offset: OffsetRule::After(16),
                    size: SizeRule::Any,
                    role: Role::Value,
                },
            ],
            optional: vec![DiagnosticCall { callee_contains: "operator new", arg_count: None }],
            hint: ResolverHint::NodeFields,
            layout: vec![
                FieldTemplate {
                    name: "left",
                    role: "pointer",
                    size: SizeSpec::Fixed(PTR_SIZE),
                    align: None,
                },
                FieldTemplate {
                    name: "right",
                    role: "pointer",
                    size: SizeSpec::Fixed(PTR_SIZE),
                    align: None,
                },
                FieldTemplate {
                    name: "parent",
                    role: "pointer",
                    size: SizeSpec::Fixed(PTR_SIZE),
                    align: None,
                },
                FieldTemplate {
                    name: "flags",
                    role: "flags",
                    size: SizeSpec::Fixed(4),
                    align: None,
                },
                FieldTemplate { name: "key", role: "key", size: SizeSpec::KeySize, align: None },
                FieldTemplate {
                    name: "value",
                    role: "value",
                    size: SizeSpec::ValueSize,
                    align: None,
                },
            ],
        },
        // Same sentinel node with no second typed field after the key.
        Fingerprint {
            family: Family::Set,
            variant: "rb-node",
            required: vec![
                Field {
                    offset: OffsetRule::Exact(0),
                    size: SizeRule::Exact(PTR_SIZE),
                    role: Role::Left,
                },
                Field {
                    offset: OffsetRule::Exact(4),
                    size: SizeRule::Exact(PTR_SIZE),
                    role: Role::Right,
                },
                Field {
                    offset: OffsetRule::Exact(8),
                    size: SizeRule::Exact(PTR_SIZE),
                    role: Role::Parent,
                },
                SentinelValue { at_offset: 12, value: 0x0101 },
                Field {
                    offset: OffsetRule::Exact(16),
                    size: SizeRule::Any,
                    role: Role::Key,
                },
                NoFieldAfter { offset: 16 },
            ],
            optional: vec![DiagnosticCall { callee_contains: "operator new", arg_count: None }],
            hint: ResolverHint::NodeFields,
            layout: vec![
                FieldTemplate {
                    name: "left",
                    role: "pointer",
                    size: SizeSpec::Fixed(PTR_SIZE),
                    align: None,
                },
                FieldTemplate {
                    name: "right",
                    role: "pointer",
                    size: SizeSpec::Fixed(PTR_SIZE),
                    align: None,
                },
                FieldTemplate {
                    name: "parent",
                    role: "pointer",
                    size: SizeSpec::Fixed(PTR_SIZE),
                    align: None,
                },
                FieldTemplate {
                    name: "flags",
                    role: "flags",
                    size: SizeSpec::Fixed(4),
                    align: None,
                },
                FieldTemplate { name: "key", role: "key", size: SizeSpec::KeySize, align: None },
            ],
        },
        // Doubly-linked list node: forward/back pointers then the value.
        // The length-check-plus-_Xlength_error pair and the max-element
        // sentinel are strong corroboration but never required.
        Fingerprint {
            family: Family::List,
            variant: "dlink-node",
            required: vec![
                Field {
                    offset: OffsetRule::Exact(0),
                    size: SizeRule::Exact(PTR_SIZE),
                    role: Role::Forward,
                },
                Field {
                    offset: OffsetRule::Exact(4),
                    size: SizeRule::Exact(PTR_SIZE),
                    role: Role::Back,
                },
                Field {
                    offset: OffsetRule::Exact(8),
                    size: SizeRule::Any,
                    role: Role::Value,
                },
            ],
            optional: vec![
                ListMaxSentinel,
                DiagnosticCall { callee_contains: "_Xlength_error", arg_count: None },
                LiteralText { contains: "list too long" },
            ],
            hint: ResolverHint::ListNode,
            layout: vec![
                FieldTemplate {
                    name: "forward",
                    role: "pointer",
                    size: SizeSpec::Fixed(PTR_SIZE),
                    align: None,
                },
                FieldTemplate {
                    name: "back",
                    role: "pointer",
                    size: SizeSpec::Fixed(PTR_SIZE),
                    align: None,
                },
                FieldTemplate {
                    name: "value",
                    role: "value",
                    size: SizeSpec::ValueSize,
                    align: None,
                },
            ],
        },
        // std::bitset: a flat array of 32- or 64-bit words. Word width is a
        // resolver decision (shift amount vs declared extent); the matcher
        // only demands a word-shaped slot and the indexing shift.
        Fingerprint {
            family: Family::Bitset,
            variant: "word-array",
            required: vec![
                Field {
                    offset: OffsetRule::Exact(0),
                    size: SizeRule::OneOf(&[4, 8]),
                    role: Role::BitWord,
                },
                ShiftPattern,
            ],
            optional: vec![
                DiagnosticCall { callee_contains: "_Xout_of_range", arg_count: None },
                DiagnosticCall { callee_contains: "_Xoverflow_error", arg_count: None },
                DiagnosticCall { callee_contains: "_Xinvalid_argument", arg_count: None },
                LiteralText { contains: "bitset" },
            ],
            hint: ResolverHint::WordShift,
            layout: vec![FieldTemplate {
                name: "bits",
                role: "bit-word",
                size: SizeSpec::WordArray,
                align: None,
            }],
        },
    ]
}
