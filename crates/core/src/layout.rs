//! Layout synthesizer: expands a fingerprint's canonical shape into a
//! concrete, byte-exact field layout using resolved bindings.
//!
//! Pure structural expansion; no matching or inference happens here. The
//! only failure mode is caller-supplied bindings that do not belong to the
//! fingerprint, which is programmer error and treated as an internal
//! invariant violation upstream.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{Fingerprint, ResolverHint, SizeSpec};
use crate::resolver::Bindings;

/// One concrete field of a synthesized layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub offset: u32,
    pub size: u32,
    pub role: String,
}

/// A complete synthesized layout for one container instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub total_size: u32,
    pub alignment: u32,
    pub fields: Vec<Field>,
    /// Resolved template bindings, flattened for downstream tooling.
    pub bindings: BTreeMap<String, String>,
}

/// Error type for layout synthesis. Either variant is an internal invariant
/// violation, never a property of the analyzed binary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("bindings for {got} cannot expand a {expected} fingerprint")]
    BindingsMismatch { expected: String, got: &'static str },

    #[error("bindings lack a {0} although the fingerprint's shape needs one")]
    MissingBinding(&'static str),

    #[error("synthesized layout is inconsistent: {0}")]
    Inconsistent(String),
}

/// Expand `fp`'s canonical shape with `bindings`.
pub fn synthesize(fp: &Fingerprint, bindings: &Bindings) -> Result<Layout, LayoutError> {
    let compatible = matches!(
        (fp.hint, bindings),
        (ResolverHint::Sso, Bindings::String { .. })
            | (ResolverHint::ElementStride, Bindings::Vector { .. })
            | (ResolverHint::NodeFields, Bindings::MapLike { .. })
            | (ResolverHint::ListNode, Bindings::List { .. })
            | (ResolverHint::WordShift, Bindings::Bitset { .. })
    );
    if !compatible {
        return Err(LayoutError::BindingsMismatch {
            expected: fp.family.to_string(),
            got: bindings.family_name(),
        });
    }

    let mut fields = Vec::with_capacity(fp.layout.len());
    let mut cursor = 0u32;
    let mut alignment = 1u32;

    for template in &fp.layout {
        let size = field_size(&template.size, bindings)?;
        // A word array aligns to its word, not to its total byte size.
        let align = match (&template.size, bindings) {
            (SizeSpec::WordArray, Bindings::Bitset { word_bits, .. }) => word_bits / 8,
            _ => template.align.unwrap_or_else(|| natural_alignment(size)),
        };
        let offset = round_up(cursor, align);
        fields.push(Field {
            name: template.name.to_string(),
            offset,
            size,
            role: template.role.to_string(),
        });
        cursor = offset + size;
        alignment = alignment.max(align);
    }

    let total_size = round_up(cursor, alignment);
    check_invariants(&fields, total_size)?;

    Ok(Layout { total_size, alignment, fields, bindings: bindings.summary() })
}

fn field_size(spec: &SizeSpec, bindings: &Bindings) -> Result<u32, LayoutError> {
    match (spec, bindings) {
        (SizeSpec::Fixed(n), _) => Ok(*n),
        (SizeSpec::KeySize, Bindings::MapLike { key_size, .. }) => Ok(*key_size),
        (SizeSpec::ValueSize, Bindings::MapLike { value_size, .. }) => {
            value_size.ok_or(LayoutError::MissingBinding("value size"))
        }
        (SizeSpec::ValueSize, Bindings::List { value_size, .. }) => Ok(*value_size),
        (SizeSpec::WordArray, Bindings::Bitset { word_bits, words, .. }) => {
            Ok(words * word_bits / 8)
        }
        (spec, b) => Err(LayoutError::BindingsMismatch {
            expected: format!("{spec:?}"),
            got: b.family_name(),
        }),
    }
}

/// Natural alignment for the x86 target: 8 for 8-byte-multiple fields
/// (doubles, 64-bit bit words), otherwise the largest of 4/2/1 dividing the
/// size.
fn natural_alignment(size: u32) -> u32 {
    if size >= 8 && size % 8 == 0 {
        8
    } else if size % 4 == 0 {
        4
    } else if size % 2 == 0 {
        2
    } else {
        1
    }
}

fn round_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

fn check_invariants(fields: &[Field], total_size: u32) -> Result<(), LayoutError> {
    let mut prev_end = 0u32;
    for field in fields {
        if field.offset < prev_end {
            return Err(LayoutError::Inconsistent(format!(
                "field `{}` at offset {} overlaps the previous field ending at {}",
                field.name, field.offset, prev_end
            )));
        }
        prev_end = field.offset + field.size;
    }
    if total_size < prev_end {
        return Err(LayoutError::Inconsistent(format!(
            "total size {total_size} is smaller than the last field's end {prev_end}"
        )));
    }
    Ok(())
}
