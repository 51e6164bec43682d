//! Parameter resolver: derives template parameters (element size, word
//! width, key/value split) for a winning candidate from the evidence it
//! matched.
//!
//! Resolution can fail without invalidating the match: the family/variant
//! decision stands and the caller receives the specific error instead of
//! bindings.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;

use crate::catalog::{sentinels, Family, Fingerprint, ResolverHint};
use crate::evidence::{EvidenceSet, Role};

/// String small-buffer size fixed by the x86 ABI.
const SSO_BUFFER_SIZE: u32 = 16;

/// Whether a tree container tolerates duplicate keys (multimap/multiset).
///
/// The evidence vocabulary carries no structural signal for this, so it is
/// reported as unresolved rather than guessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeys {
    Unresolved,
}

/// Resolved template bindings, one payload shape per family.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Bindings {
    String { buffer_size: u32, capacity_sentinel: i64, char_size: u32 },
    Vector { element_size: u32, hypotheses: Vec<String> },
    MapLike { key_size: u32, value_size: Option<u32>, duplicate_keys: DuplicateKeys },
    List { value_size: u32, node_size: u32, address_space_hint: Option<u64>, hypotheses: Vec<String> },
    Bitset { bits: u32, word_bits: u32, words: u32 },
}

impl Bindings {
    pub fn family_name(&self) -> &'static str {
        match self {
            Bindings::String { .. } => "string",
            Bindings::Vector { .. } => "vector",
            Bindings::MapLike { .. } => "map-like",
            Bindings::List { .. } => "list",
            Bindings::Bitset { .. } => "bitset",
        }
    }

    /// Flatten to the string map carried on the synthesized layout.
    pub fn summary(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        match self {
            Bindings::String { buffer_size, capacity_sentinel, char_size } => {
                out.insert("buffer_size".into(), buffer_size.to_string());
                out.insert("capacity_sentinel".into(), capacity_sentinel.to_string());
                out.insert("char_size".into(), char_size.to_string());
            }
            Bindings::Vector { element_size, hypotheses } => {
                out.insert("element_size".into(), element_size.to_string());
                if !hypotheses.is_empty() {
                    out.insert("type_hypotheses".into(), hypotheses.join(" / "));
                }
            }
            Bindings::MapLike { key_size, value_size, duplicate_keys: _ } => {
                out.insert("key_size".into(), key_size.to_string());
                out.insert(
                    "value_size".into(),
                    value_size.map_or_else(|| "absent".to_string(), |v| v.to_string()),
                );
                out.insert("duplicate_keys".into(), "unresolved".into());
            }
            Bindings::List { value_size, node_size, address_space_hint, hypotheses } => {
                out.insert("value_size".into(), value_size.to_string());
                out.insert("node_size".into(), node_size.to_string());
                if let Some(limit) = address_space_hint {
                    out.insert("address_space_hint".into(), limit.to_string());
                }
                if !hypotheses.is_empty() {
                    out.insert("type_hypotheses".into(), hypotheses.join(" / "));
                }
            }
            Bindings::Bitset { bits, word_bits, words } => {
                out.insert("bits".into(), bits.to_string());
                out.insert("word_bits".into(), word_bits.to_string());
                out.insert("words".into(), words.to_string());
            }
        }
        out
    }
}

/// Error type for parameter resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("no stride arithmetic in evidence; element size is unrecoverable")]
    NoStrideEvidence,

    #[error("stride divisor of zero in evidence")]
    ZeroStride,

    #[error("no bit-index shift in evidence; word width is unrecoverable")]
    NoShiftEvidence,

    #[error("bit-index shift of {0} maps to no known word width")]
    UnsupportedShift(u32),

    #[error(
        "word width from shift ({from_shift} bits) disagrees with declared \
         extent ({from_extent} bits)"
    )]
    InconsistentWidth { from_shift: u32, from_extent: u32 },

    #[error("matched evidence carries no {0} field")]
    MissingField(&'static str),
}

/// Derive template bindings for `fp` from `evidence`.
pub fn resolve(fp: &Fingerprint, evidence: &EvidenceSet) -> Result<Bindings, ResolutionError> {
    match fp.hint {
        ResolverHint::Sso => Ok(Bindings::String {
            buffer_size: SSO_BUFFER_SIZE,
            capacity_sentinel: (SSO_BUFFER_SIZE - 1) as i64,
            char_size: 1,
        }),
        ResolverHint::ElementStride => resolve_stride(evidence),
        ResolverHint::NodeFields => resolve_node_fields(fp.family, evidence),
        ResolverHint::ListNode => resolve_list_node(evidence),
        ResolverHint::WordShift => resolve_word_shift(evidence),
    }
}

fn hypotheses_for(size: u32) -> Vec<String> {
    sentinels::size_hypotheses(size).iter().map(|s| s.to_string()).collect()
}

fn resolve_stride(ev: &EvidenceSet) -> Result<Bindings, ResolutionError> {
    let divisor = ev.stride_divisor().ok_or(ResolutionError::NoStrideEvidence)?;
    if divisor == 0 {
        return Err(ResolutionError::ZeroStride);
    }
    Ok(Bindings::Vector { element_size: divisor, hypotheses: hypotheses_for(divisor) })
}

fn resolve_node_fields(family: Family, ev: &EvidenceSet) -> Result<Bindings, ResolutionError> {
    // Key field sits right after the 16-byte node header.
    let key = ev.field_at(16).ok_or(ResolutionError::MissingField("key"))?;
    let value_size = match family {
        Family::Map => {
            let value = ev
                .fields()
                .iter()
                .filter(|f| f.offset > 16)
                .min_by_key(|f| f.offset)
                .ok_or(ResolutionError::MissingField("value"))?;
            Some(value.size)
        }
        // Set semantics: the value type is recorded as absent.
        _ => None,
    };
    Ok(Bindings::MapLike {
        key_size: key.size,
        value_size,
        duplicate_keys: DuplicateKeys::Unresolved,
    })
}

fn resolve_list_node(ev: &EvidenceSet) -> Result<Bindings, ResolutionError> {
    let value = ev.field_at(8).ok_or(ResolutionError::MissingField("value"))?;
    let node_size = 8 + value.size;
    // A known max-element-count sentinel, when its table node size agrees
    // with what we derived, recovers the ~4 GiB address-space limit.
    // Corroboration only; never the primary signal.
    let address_space_hint = ev
        .constants()
        .find(|(_, v)| sentinels::list_node_size_for_sentinel(*v) == Some(node_size))
        .map(|(_, v)| v as u64 * node_size as u64);
    Ok(Bindings::List {
        value_size: value.size,
        node_size,
        address_space_hint,
        hypotheses: hypotheses_for(value.size),
    })
}

fn resolve_word_shift(ev: &EvidenceSet) -> Result<Bindings, ResolutionError> {
    let shift = ev.shift_amount().ok_or(ResolutionError::NoShiftEvidence)?;
    let from_shift = match shift {
        5 => 32,
        6 => 64,
        other => return Err(ResolutionError::UnsupportedShift(other)),
    };

    // Declared extent: contiguous word-sized slots starting at offset 0.
    let first = ev
        .fields()
        .iter()
        .find(|f| f.offset == 0 && matches!(f.role, None | Some(Role::BitWord)))
        .ok_or(ResolutionError::MissingField("bit-word"))?;
    let word_size = first.size;
    let from_extent = word_size * 8;
    if from_shift != from_extent {
        return Err(ResolutionError::InconsistentWidth { from_shift, from_extent });
    }

    let offsets: BTreeSet<u32> = ev
        .fields()
        .iter()
        .filter(|f| {
            f.size == word_size
                && f.offset % word_size == 0
                && matches!(f.role, None | Some(Role::BitWord))
        })
        .map(|f| f.offset)
        .collect();
    let words = offsets.len() as u32;

    Ok(Bindings::Bitset { bits: words * from_shift, word_bits: from_shift, words })
}
