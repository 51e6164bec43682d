//! Typed evidence model: the facts an external extractor observed about one
//! candidate memory region and the code manipulating it.
//!
//! Evidence items are immutable once produced; a query is a finite, unordered
//! set of items for a single region. The engine never looks at machine code
//! itself, only at these records.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sanity bound on field offsets; a candidate container region larger than
/// this is almost certainly extractor garbage.
pub const MAX_REGION_BYTES: u32 = 4096;

/// One observed fact about a memory region.
///
/// `StrideArith` and `ShiftArith` carry arithmetic patterns the extractor
/// lifted from surrounding code: `(end - start) / N` size computations and
/// `pos >> k` bit-word indexing. They are what make template-parameter
/// recovery possible without any type declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvidenceItem {
    /// A load or store at a fixed offset inside the region.
    FieldAccess {
        offset: u32,
        size: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role_hint: Option<String>,
    },
    /// A literal value compared against (or stored to) a fixed offset.
    ConstantCompare { at_offset: u32, value: i64 },
    /// A call taking the region (or a node of it) as an argument.
    CallSignature { callee: String, arg_count: u32, arg_sizes: Vec<u32> },
    /// A string literal referenced near the manipulating code.
    StringRef { text: String, observed_length: u32 },
    /// Subtraction-then-division between two pointer-valued fields.
    StrideArith { divisor: u32 },
    /// Right-shift applied to a bit index before word selection.
    ShiftArith { amount: u32 },
}

/// Closed role vocabulary for field observations.
///
/// Extractor hints are free-form strings; [`Role::parse`] maps the known
/// spellings onto this vocabulary. Generic hints ("pointer", "unknown")
/// parse to `None` and act as wildcards during matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    PointerOrBuffer,
    Length,
    Start,
    End,
    CapacityEnd,
    Left,
    Right,
    Parent,
    Key,
    Value,
    Forward,
    Back,
    Head,
    BitWord,
}

impl Role {
    /// Map an extractor hint string to a role, if it names one.
    pub fn parse(hint: &str) -> Option<Role> {
        match hint.trim().to_ascii_lowercase().as_str() {
            "pointer-or-buffer" | "buffer-or-pointer" => Some(Role::PointerOrBuffer),
            "size" | "length" | "len" => Some(Role::Length),
            "start" | "begin" | "first" => Some(Role::Start),
            "end" | "finish" => Some(Role::End),
            "capacity" | "capacity-end" | "cap" | "max" => Some(Role::CapacityEnd),
            "left" => Some(Role::Left),
            "right" => Some(Role::Right),
            "parent" => Some(Role::Parent),
            "key" => Some(Role::Key),
            "value" | "mapped" => Some(Role::Value),
            "forward" | "next" => Some(Role::Forward),
            "back" | "prev" => Some(Role::Back),
            "head" => Some(Role::Head),
            "bit-word" | "bitword" | "word" => Some(Role::BitWord),
            _ => None,
        }
    }
}

/// Error type for malformed evidence input.
///
/// Any of these means the query never starts; they indicate a broken
/// extractor, not an unusual binary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("evidence set is empty")]
    Empty,

    #[error("field access at offset {offset} has zero size")]
    ZeroSizedField { offset: u32 },

    #[error("offset {offset} exceeds the region sanity bound of {max} bytes")]
    OffsetOutOfRange { offset: u32, max: u32 },

    #[error("call to `{callee}` declares {declared} arguments but lists {listed} sizes")]
    ArgCountMismatch { callee: String, declared: u32, listed: usize },
}

/// A field observation with its hint already parsed into the role vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldObs {
    pub offset: u32,
    pub size: u32,
    pub role: Option<Role>,
}

/// A validated, query-scoped set of evidence items.
///
/// Construction validates the stream; after that the set is immutable and
/// every engine stage reads it without copying.
#[derive(Debug, Clone)]
pub struct EvidenceSet {
    items: Vec<EvidenceItem>,
    fields: Vec<FieldObs>,
}

impl EvidenceSet {
    /// Validate a raw item stream and build the query set.
    pub fn new(items: Vec<EvidenceItem>) -> Result<Self, InputError> {
        if items.is_empty() {
            return Err(InputError::Empty);
        }
        let mut fields = Vec::new();
        for item in &items {
            match item {
                EvidenceItem::FieldAccess { offset, size, role_hint } => {
                    if *size == 0 {
                        return Err(InputError::ZeroSizedField { offset: *offset });
                    }
                    if *offset > MAX_REGION_BYTES {
                        return Err(InputError::OffsetOutOfRange {
                            offset: *offset,
                            max: MAX_REGION_BYTES,
                        });
                    }
                    fields.push(FieldObs {
                        offset: *offset,
                        size: *size,
                        role: role_hint.as_deref().and_then(Role::parse),
                    });
                }
                EvidenceItem::ConstantCompare { at_offset, .. } => {
                    if *at_offset > MAX_REGION_BYTES {
                        return Err(InputError::OffsetOutOfRange {
                            offset: *at_offset,
                            max: MAX_REGION_BYTES,
                        });
                    }
                }
                EvidenceItem::CallSignature { callee, arg_count, arg_sizes } => {
                    if arg_sizes.len() != *arg_count as usize {
                        return Err(InputError::ArgCountMismatch {
                            callee: callee.clone(),
                            declared: *arg_count,
                            listed: arg_sizes.len(),
                        });
                    }
                }
                EvidenceItem::StringRef { .. }
                | EvidenceItem::StrideArith { .. }
                | EvidenceItem::ShiftArith { .. } => {}
            }
        }
        Ok(Self { items, fields })
    }

    pub fn items(&self) -> &[EvidenceItem] {
        &self.items
    }

    /// Field observations with parsed roles, in extractor order.
    pub fn fields(&self) -> &[FieldObs] {
        &self.fields
    }

    /// First field observation at exactly `offset`, if any.
    pub fn field_at(&self, offset: u32) -> Option<&FieldObs> {
        self.fields.iter().find(|f| f.offset == offset)
    }

    /// True if some constant `value` is compared/stored at `at_offset`.
    pub fn has_constant_at(&self, at: u32, expected: i64) -> bool {
        self.constants().any(|(o, v)| o == at && v == expected)
    }

    pub fn constants(&self) -> impl Iterator<Item = (u32, i64)> + '_ {
        self.items.iter().filter_map(|i| match i {
            EvidenceItem::ConstantCompare { at_offset, value } => Some((*at_offset, *value)),
            _ => None,
        })
    }

    pub fn calls(&self) -> impl Iterator<Item = (&str, u32, &[u32])> + '_ {
        self.items.iter().filter_map(|i| match i {
            EvidenceItem::CallSignature { callee, arg_count, arg_sizes } => {
                Some((callee.as_str(), *arg_count, arg_sizes.as_slice()))
            }
            _ => None,
        })
    }

    pub fn string_refs(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.items.iter().filter_map(|i| match i {
            EvidenceItem::StringRef { text, observed_length } => {
                Some((text.as_str(), *observed_length))
            }
            _ => None,
        })
    }

    /// Divisor of the first observed subtraction-then-division pattern.
    pub fn stride_divisor(&self) -> Option<u32> {
        self.items.iter().find_map(|i| match i {
            EvidenceItem::StrideArith { divisor } => Some(*divisor),
            _ => None,
        })
    }

    /// Shift amount of the first observed bit-index shift.
    pub fn shift_amount(&self) -> Option<u32> {
        self.items.iter().find_map(|i| match i {
            EvidenceItem::ShiftArith { amount } => Some(*amount),
            _ => None,
        })
    }
}
