use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn utc_compact_string(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Stable identifier: `<prefix>:<first 16 hex chars of sha256(parts joined by newline)>`.
pub fn stable_id(prefix: &str, parts: &[&str]) -> String {
    let joined = parts.join("\n");
    let digest = sha256_hex(joined.as_bytes());
    format!("{}:{}", prefix, &digest[..16])
}

pub fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}

pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let mut out = input.chars().take(max_chars).collect::<String>();
    out.push('…');
    out
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))?;

    let mut file = File::create(path)
        .with_context(|| format!("failed to create json file: {}", path.display()))?;
    file.write_all(&data)
        .with_context(|| format!("failed to write json file: {}", path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("failed to finalize json file: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_id_is_prefixed_and_deterministic() {
        let first = stable_id("pub", &["http://example.org/", "Title"]);
        let second = stable_id("pub", &["http://example.org/", "Title"]);
        assert_eq!(first, second);
        assert!(first.starts_with("pub:"));
        assert_eq!(first.len(), "pub:".len() + 16);
        assert_ne!(first, stable_id("pub", &["http://example.org/", "Other"]));
    }

    #[test]
    fn truncate_chars_respects_multibyte_text() {
        assert_eq!(truncate_chars("výsledky", 3), "výs…");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
