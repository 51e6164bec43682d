//! Result reporter: packages ranked candidates, confidence, bindings and
//! synthesized layouts into one structured document for the caller.

use chrono::Utc;
use serde::Serialize;

use crate::catalog::{Catalog, Family};
use crate::evidence::EvidenceSet;
use crate::layout::{self, Layout, LayoutError};
use crate::matcher::{Candidate, Classification, MatchResult};
use crate::resolver::{self, Bindings};

/// How many near-miss fingerprints a NoMatch report lists.
pub const MAX_PARTIALS: usize = 3;

/// One candidate as reported to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateReport {
    pub family: Family,
    pub variant: String,
    pub confidence: f64,
    pub matched_required: usize,
    pub total_required: usize,
    pub matched_optional: usize,
    pub total_optional: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bindings: Option<Bindings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<Layout>,
}

impl CandidateReport {
    fn plain(candidate: &Candidate) -> Self {
        Self {
            family: candidate.family,
            variant: candidate.variant.to_string(),
            confidence: candidate.confidence,
            matched_required: candidate.matched_required,
            total_required: candidate.total_required,
            matched_optional: candidate.matched_optional,
            total_optional: candidate.total_optional,
            missing_required: candidate.missing_required.clone(),
            bindings: None,
            resolution_error: None,
            layout: None,
        }
    }
}

/// The complete result of one query.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub engine_version: String,
    pub catalog_version: String,
    pub generated_at: String,
    /// SHA-256 of the evidence input, when the frontend computed one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_digest: Option<String>,
    pub classification: Classification,
    pub candidates: Vec<CandidateReport>,
}

impl Report {
    /// Assemble a report from a match result.
    ///
    /// Unique: the winner is resolved and synthesized. Ambiguous: every
    /// candidate tied within the margin is independently resolved and
    /// synthesized where possible, in the fixed tie-break order. NoMatch:
    /// the best partials and their missing-feature lists are included as a
    /// diagnostic aid; never raises.
    ///
    /// Resolution failure is recorded per candidate and does not disturb
    /// the classification; only a synthesizer invariant violation is an
    /// error here.
    pub fn build(
        catalog: &Catalog,
        result: &MatchResult,
        evidence: &EvidenceSet,
        max_partials: usize,
    ) -> Result<Report, LayoutError> {
        let mut candidates = Vec::new();
        match result.classification {
            Classification::NoMatch => {
                for partial in result.partials.iter().take(max_partials) {
                    candidates.push(CandidateReport::plain(partial));
                }
            }
            Classification::Unique | Classification::Ambiguous => {
                let tied = result.tied().len();
                for (i, candidate) in result.candidates.iter().enumerate() {
                    let mut entry = CandidateReport::plain(candidate);
                    if i < tied {
                        let fp = &catalog.fingerprints()[candidate.catalog_index];
                        match resolver::resolve(fp, evidence) {
                            Ok(bindings) => {
                                entry.layout = Some(layout::synthesize(fp, &bindings)?);
                                entry.bindings = Some(bindings);
                            }
                            Err(err) => entry.resolution_error = Some(err.to_string()),
                        }
                    }
                    candidates.push(entry);
                }
            }
        }

        Ok(Report {
            engine_version: crate::version().to_string(),
            catalog_version: catalog.version().to_string(),
            generated_at: Utc::now().to_rfc3339(),
            evidence_digest: None,
            classification: result.classification,
            candidates,
        })
    }

    /// Human-readable rendering for terminal output.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "layout-probe report (engine {}, catalog {})\n",
            self.engine_version, self.catalog_version
        ));
        out.push_str(&format!("classification: {}\n", self.classification));
        if let Some(digest) = &self.evidence_digest {
            out.push_str(&format!("evidence sha256: {digest}\n"));
        }
        if self.candidates.is_empty() {
            out.push_str("no candidates\n");
            return out;
        }
        for (i, c) in self.candidates.iter().enumerate() {
            out.push_str(&format!(
                "#{} {}/{} confidence {:.3} ({}/{} required, {}/{} optional)\n",
                i + 1,
                c.family,
                c.variant,
                c.confidence,
                c.matched_required,
                c.total_required,
                c.matched_optional,
                c.total_optional
            ));
            for missing in &c.missing_required {
                out.push_str(&format!("   missing: {missing}\n"));
            }
            if let Some(err) = &c.resolution_error {
                out.push_str(&format!("   unresolved: {err}\n"));
            }
            if let Some(bindings) = &c.bindings {
                for (key, value) in bindings.summary() {
                    out.push_str(&format!("   {key} = {value}\n"));
                }
            }
            if let Some(layout) = &c.layout {
                out.push_str(&format!(
                    "   layout: {} bytes, align {}\n",
                    layout.total_size, layout.alignment
                ));
                for field in &layout.fields {
                    out.push_str(&format!(
                        "     +{:<4} {:<14} {:>3}  {}\n",
                        field.offset, field.name, field.size, field.role
                    ));
                }
            }
        }
        out
    }
}
