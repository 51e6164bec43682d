use std::fs;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use probe_core::evidence::EvidenceItem;
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// On-disk evidence document: the extractor's observations for one
/// candidate memory region, JSON or YAML by file extension.
#[derive(Debug, Deserialize)]
pub struct EvidenceFile {
    /// Optional architecture tag; must agree with the embedded catalog.
    #[serde(default)]
    pub arch: Option<String>,
    pub items: Vec<EvidenceItem>,
}

/// Read and parse an evidence file.
pub fn load_evidence_file(path: &Path) -> Result<EvidenceFile> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read evidence file: {}", path.display()))?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);

    if is_yaml {
        serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse evidence YAML: {}", path.display()))
    } else {
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse evidence JSON: {}", path.display()))
    }
}

/// True for architecture names the embedded catalog covers.
pub fn is_supported_arch(arch: &str) -> bool {
    matches!(arch.trim().to_ascii_lowercase().as_str(), "x86" | "i386")
}

/// Compute the SHA-256 hash of a file and return it as a hex string.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open evidence for hashing: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("Failed to read evidence for hashing: {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let digest = hasher.finalize();
    Ok(format!("{:x}", digest))
}
