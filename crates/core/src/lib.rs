//! probe-core
//!
//! Core library for recognizing MSVC container layouts (string, vector,
//! map/set, list, bitset) from structural evidence observed in decompiled
//! x86 binaries.
//!
//! The crate is organized as a pipeline over a fixed, embedded fingerprint
//! catalog: evidence (supplied by an external extractor) is scored against
//! every fingerprint, the winning candidate's template parameters are
//! derived arithmetically from the evidence, and the result is expanded into
//! a byte-exact field layout for downstream tooling.
//!
//! The goal is to keep all substantive logic here so it is fully testable and
//! reusable from multiple frontends (CLI, Python bindings, etc.).

pub mod catalog;
pub mod engine;
pub mod evidence;
pub mod layout;
pub mod matcher;
pub mod report;
pub mod resolver;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
