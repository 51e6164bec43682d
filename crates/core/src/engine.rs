//! Engine facade: one validated catalog, many independent queries.
//!
//! The engine holds no mutable state; `analyze` borrows `&self` and a
//! query-scoped evidence set, so callers may run one task per candidate
//! region on a worker pool with no cross-task ordering concerns.

use std::time::Instant;

use thiserror::Error;

use crate::catalog::{Catalog, CatalogError};
use crate::evidence::{EvidenceItem, EvidenceSet, InputError};
use crate::matcher;
use crate::report::{Report, MAX_PARTIALS};

/// Per-query knobs. Each query may carry a deadline; exceeding it aborts
/// that query only.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub deadline: Option<Instant>,
    /// How many near-miss fingerprints a NoMatch report lists.
    pub max_partials: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self { deadline: None, max_partials: MAX_PARTIALS }
    }
}

/// Error type for whole-query failures. NoMatch, ambiguity and parameter
/// resolution failures are structured results, not errors; what remains is
/// bad input, a blown deadline, or a defect in the engine itself.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid evidence: {0}")]
    Input(#[from] InputError),

    #[error("query deadline exceeded")]
    Timeout,

    /// Catalog or synthesizer invariant violation: a defect in the engine,
    /// not in the analyzed binary.
    #[error("internal invariant violation: {0}")]
    Invariant(String),
}

/// A recognition engine bound to one immutable catalog.
pub struct Engine {
    catalog: Catalog,
}

impl Engine {
    /// Build an engine over the embedded catalog, validating it first.
    pub fn new() -> Result<Self, CatalogError> {
        Ok(Self { catalog: Catalog::builtin()? })
    }

    /// Build an engine over a custom (already validated) catalog.
    pub fn with_catalog(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Run one query against a validated evidence set.
    pub fn analyze(
        &self,
        evidence: &EvidenceSet,
        opts: &QueryOptions,
    ) -> Result<Report, EngineError> {
        let result = matcher::match_evidence(&self.catalog, evidence, opts.deadline)
            .map_err(|_| EngineError::Timeout)?;
        Report::build(&self.catalog, &result, evidence, opts.max_partials)
            .map_err(|e| EngineError::Invariant(e.to_string()))
    }

    /// Validate a raw item stream, then run one query.
    pub fn analyze_items(
        &self,
        items: Vec<EvidenceItem>,
        opts: &QueryOptions,
    ) -> Result<Report, EngineError> {
        let evidence = EvidenceSet::new(items)?;
        self.analyze(&evidence, opts)
    }
}
