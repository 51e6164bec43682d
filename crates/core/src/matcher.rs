//! Matcher: scores an evidence set against every catalog fingerprint and
//! classifies the outcome.
//!
//! Pure function of (catalog, evidence): no hidden state, so the same inputs
//! always produce the same ranked result, ordering included.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::catalog::{
    sentinels, Catalog, Family, OffsetRule, OptionalFeature, RequiredFeature, SizeRule,
};
use crate::evidence::{EvidenceSet, FieldObs, Role};

/// Weight of a complete required-feature match. Dominant by design: optional
/// corroboration can only ever add the remainder.
pub const REQUIRED_WEIGHT: f64 = 0.75;

/// Weight distributed across a fingerprint's optional features.
pub const OPTIONAL_WEIGHT: f64 = 0.25;

/// Minimum confidence for a candidate to be accepted at all.
pub const ACCEPT_THRESHOLD: f64 = 0.6;

/// Two candidates whose confidence differs by no more than this are tied.
pub const AMBIGUITY_MARGIN: f64 = 0.05;

/// Outcome classification for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Unique,
    Ambiguous,
    NoMatch,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Classification::Unique => "unique",
            Classification::Ambiguous => "ambiguous",
            Classification::NoMatch => "no_match",
        };
        f.write_str(name)
    }
}

/// One attempted binding of a fingerprint to the evidence set.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub family: Family,
    pub variant: &'static str,
    /// Position in the catalog; the fixed tie-break order.
    pub catalog_index: usize,
    /// 0.0 when any required feature is missing.
    pub confidence: f64,
    pub matched_required: usize,
    pub total_required: usize,
    pub matched_optional: usize,
    pub total_optional: usize,
    /// Descriptions of unmatched required features, for diagnostics.
    pub missing_required: Vec<String>,
}

impl Candidate {
    pub fn is_accepted(&self) -> bool {
        self.missing_required.is_empty() && self.confidence >= ACCEPT_THRESHOLD
    }
}

/// Ranked candidates plus the classification of the whole query.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub classification: Classification,
    /// Accepted candidates, confidence-descending, ties in catalog order.
    pub candidates: Vec<Candidate>,
    /// Rejected fingerprints ranked by how close they came; used only for
    /// NoMatch diagnostics.
    pub partials: Vec<Candidate>,
}

impl MatchResult {
    /// Accepted candidates within the ambiguity margin of the leader.
    pub fn tied(&self) -> &[Candidate] {
        match self.candidates.first() {
            None => &[],
            Some(top) => {
                let n = self
                    .candidates
                    .iter()
                    .take_while(|c| top.confidence - c.confidence <= AMBIGUITY_MARGIN)
                    .count();
                &self.candidates[..n]
            }
        }
    }
}

/// The query deadline elapsed mid-match. Only this query is affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryTimeout;

/// Score `evidence` against every fingerprint in `catalog`.
///
/// `deadline`, when set, is checked between fingerprints; exceeding it
/// aborts this query without touching any shared state.
pub fn match_evidence(
    catalog: &Catalog,
    evidence: &EvidenceSet,
    deadline: Option<Instant>,
) -> Result<MatchResult, QueryTimeout> {
    let mut accepted = Vec::new();
    let mut partials = Vec::new();

    for (index, fp) in catalog.fingerprints().iter().enumerate() {
        if let Some(d) = deadline {
            if Instant::now() >= d {
                return Err(QueryTimeout);
            }
        }

        let missing: Vec<String> = fp
            .required
            .iter()
            .filter(|req| !required_present(req, evidence))
            .map(|req| req.to_string())
            .collect();
        let matched_required = fp.required.len() - missing.len();
        let matched_optional =
            fp.optional.iter().filter(|opt| optional_present(opt, evidence)).count();

        let confidence = if missing.is_empty() {
            score(matched_optional, fp.optional.len())
        } else {
            0.0
        };

        let candidate = Candidate {
            family: fp.family,
            variant: fp.variant,
            catalog_index: index,
            confidence,
            matched_required,
            total_required: fp.required.len(),
            matched_optional,
            total_optional: fp.optional.len(),
            missing_required: missing,
        };

        if candidate.is_accepted() {
            log::debug!(
                "{}/{}: accepted, confidence {:.3} ({}+{} features)",
                fp.family,
                fp.variant,
                candidate.confidence,
                candidate.matched_required,
                candidate.matched_optional
            );
            accepted.push(candidate);
        } else {
            log::debug!(
                "{}/{}: rejected, {}/{} required features",
                fp.family,
                fp.variant,
                candidate.matched_required,
                candidate.total_required
            );
            partials.push(candidate);
        }
    }

    // Confidence descending; equal scores fall back to catalog order, never
    // to evidence order. sort_by is stable, so index order is preserved.
    accepted.sort_by(|a, b| {
        b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal)
    });
    partials.sort_by(|a, b| b.matched_required.cmp(&a.matched_required));

    let classification = match accepted.first() {
        None => Classification::NoMatch,
        Some(top) => {
            let tied = accepted
                .iter()
                .filter(|c| top.confidence - c.confidence <= AMBIGUITY_MARGIN)
                .count();
            if tied > 1 {
                Classification::Ambiguous
            } else {
                Classification::Unique
            }
        }
    };

    Ok(MatchResult { classification, candidates: accepted, partials })
}

/// Confidence for a full required match with `matched` of `total` optional
/// corroborating features present. A fingerprint with no optional features
/// scores the full 1.0 on a complete required match.
fn score(matched: usize, total: usize) -> f64 {
    if total == 0 {
        REQUIRED_WEIGHT + OPTIONAL_WEIGHT
    } else {
        REQUIRED_WEIGHT + OPTIONAL_WEIGHT * matched as f64 / total as f64
    }
}

fn field_matches(obs: &FieldObs, offset: &OffsetRule, size: &SizeRule, role: Role) -> bool {
    let offset_ok = match offset {
        OffsetRule::Exact(o) => obs.offset == *o,
        OffsetRule::After(o) => obs.offset > *o,
    };
    // A field with no recognized role hint is a wildcard.
    offset_ok && size.admits(obs.size) && obs.role.map_or(true, |r| r == role)
}

fn required_present(req: &RequiredFeature, ev: &EvidenceSet) -> bool {
    match req {
        RequiredFeature::Field { offset, size, role } => {
            ev.fields().iter().any(|f| field_matches(f, offset, size, *role))
        }
        RequiredFeature::SentinelValue { at_offset, value } => {
            ev.has_constant_at(*at_offset, *value)
        }
        RequiredFeature::NoFieldAfter { offset } => !ev.fields().iter().any(|f| f.offset > *offset),
        RequiredFeature::ShiftPattern => matches!(ev.shift_amount(), Some(5) | Some(6)),
    }
}

fn optional_present(opt: &OptionalFeature, ev: &EvidenceSet) -> bool {
    match opt {
        OptionalFeature::ZeroedSlots { offsets } => {
            offsets.iter().all(|o| ev.has_constant_at(*o, 0))
        }
        OptionalFeature::ListMaxSentinel => {
            ev.constants().any(|(_, v)| sentinels::is_list_max_sentinel(v))
        }
        OptionalFeature::DiagnosticCall { callee_contains, arg_count } => {
            ev.calls().any(|(callee, n, _)| {
                callee.contains(callee_contains) && arg_count.map_or(true, |a| a == n)
            })
        }
        OptionalFeature::LiteralText { contains } => {
            ev.string_refs().any(|(text, _)| text.contains(contains))
        }
        OptionalFeature::CtorLiteral => {
            ev.calls().any(|(_, n, _)| n == 3)
                && ev.string_refs().any(|(text, len)| text.len() as u32 == len)
        }
    }
}
