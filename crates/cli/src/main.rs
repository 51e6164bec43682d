use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use layout_probe::{is_supported_arch, load_evidence_file, sha256_file};
use probe_core::engine::{Engine, EngineError, QueryOptions};
use probe_core::matcher::Classification;

/// Container-layout recognition CLI.
///
/// This CLI is a thin wrapper around `probe-core` (exposed in code as
/// `probe_core`). All substantive logic lives in the library so it can be
/// tested thoroughly and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "layout-probe",
    version,
    about = "Recognize MSVC container layouts from decompiled evidence",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one evidence file and report the recognized container layout.
    ///
    /// Exit status: 0 = unique match, 1 = no match, 2 = ambiguous,
    /// 3 = malformed input, 4 = internal invariant violation.
    Analyze {
        /// Path to the evidence file (JSON, or YAML by extension).
        #[arg(long)]
        evidence: PathBuf,

        /// Target architecture. Only the embedded x86 catalog is available.
        #[arg(long, default_value = "x86")]
        arch: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Per-query deadline in milliseconds.
        #[arg(long)]
        deadline_ms: Option<u64>,
    },

    /// List the embedded fingerprint catalog.
    Catalog {
        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

const EXIT_UNIQUE: i32 = 0;
const EXIT_NO_MATCH: i32 = 1;
const EXIT_AMBIGUOUS: i32 = 2;
const EXIT_BAD_INPUT: i32 = 3;
const EXIT_INTERNAL: i32 = 4;

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let code = match cli.command {
        Command::Analyze { evidence, arch, json, deadline_ms } => {
            analyze_command(&evidence, &arch, json, deadline_ms)
        }
        Command::Catalog { json } => catalog_command(json),
    };
    process::exit(code);
}

/// Run one recognition query and map the outcome onto the exit contract.
fn analyze_command(evidence: &Path, arch: &str, json: bool, deadline_ms: Option<u64>) -> i32 {
    if !is_supported_arch(arch) {
        eprintln!("error: unsupported arch `{arch}`; the embedded catalog targets x86");
        return EXIT_BAD_INPUT;
    }

    let file = match load_evidence_file(evidence) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("error: {err:#}");
            return EXIT_BAD_INPUT;
        }
    };
    if let Some(file_arch) = &file.arch {
        if !is_supported_arch(file_arch) {
            eprintln!("error: evidence file targets `{file_arch}`, catalog targets x86");
            return EXIT_BAD_INPUT;
        }
    }

    // Best-effort provenance; the report is still useful without it.
    let digest = sha256_file(evidence).ok();

    let engine = match Engine::new() {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("internal error: {err}");
            return EXIT_INTERNAL;
        }
    };

    let opts = QueryOptions {
        deadline: deadline_ms.map(|ms| Instant::now() + Duration::from_millis(ms)),
        ..QueryOptions::default()
    };

    let mut report = match engine.analyze_items(file.items, &opts) {
        Ok(report) => report,
        Err(EngineError::Input(err)) => {
            eprintln!("error: {err}");
            return EXIT_BAD_INPUT;
        }
        Err(EngineError::Timeout) => {
            eprintln!("error: query deadline exceeded");
            return EXIT_NO_MATCH;
        }
        Err(EngineError::Invariant(err)) => {
            eprintln!("internal error: {err}");
            return EXIT_INTERNAL;
        }
    };
    report.evidence_digest = digest;

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(serialized) => println!("{serialized}"),
            Err(err) => {
                eprintln!("internal error: failed to serialize report: {err}");
                return EXIT_INTERNAL;
            }
        }
    } else {
        print!("{}", report.render_text());
    }

    match report.classification {
        Classification::Unique => EXIT_UNIQUE,
        Classification::NoMatch => EXIT_NO_MATCH,
        Classification::Ambiguous => EXIT_AMBIGUOUS,
    }
}

/// List the embedded catalog. The catalog is versioned data compiled into
/// the engine, not user-configurable at runtime.
fn catalog_command(json: bool) -> i32 {
    let catalog = probe_core::catalog::global();

    if json {
        let fingerprints: Vec<_> = catalog
            .fingerprints()
            .iter()
            .map(|fp| {
                serde_json::json!({
                    "family": fp.family.to_string(),
                    "variant": fp.variant,
                    "required_features": fp.required.len(),
                    "optional_features": fp.optional.len(),
                })
            })
            .collect();
        let doc = serde_json::json!({
            "version": catalog.version(),
            "fingerprints": fingerprints,
        });
        match serde_json::to_string_pretty(&doc) {
            Ok(serialized) => println!("{serialized}"),
            Err(err) => {
                eprintln!("internal error: failed to serialize catalog: {err}");
                return EXIT_INTERNAL;
            }
        }
    } else {
        println!("Fingerprint catalog {} ({} entries):", catalog.version(), catalog.fingerprints().len());
        for fp in catalog.fingerprints() {
            println!(
                "  - {}/{} [{} required, {} optional]",
                fp.family,
                fp.variant,
                fp.required.len(),
                fp.optional.len()
            );
        }
    }
    EXIT_UNIQUE
}
