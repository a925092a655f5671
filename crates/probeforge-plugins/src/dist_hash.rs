//! Deterministic content hash over a plugin's `dist/` directory.
//!
//! Grounded on the SHA256SUMS verification pattern in `src/update/verify.rs`:
//! files are hashed individually with `sha2`, but
//! here the per-file digests are folded into one tree hash so a single
//! `dist.hash` field in the manifest can cover every shipped file, not just
//! the entry module.

use std::path::{Path, PathBuf};

use probeforge_api::CoreError;
use sha2::{Digest, Sha256};

use crate::manifest::DistInfo;

/// Walk `dir` and return every regular file path relative to `dir`, sorted
/// so the hash is independent of filesystem iteration order.
fn sorted_relative_files(dir: &Path) -> Result<Vec<PathBuf>, CoreError> {
    let mut out = Vec::new();
    collect(dir, dir, &mut out)?;
    out.sort();
    Ok(out)
}

fn collect(root: &Path, current: &Path, out: &mut Vec<PathBuf>) -> Result<(), CoreError> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect(root, &path, out)?;
        } else {
            out.push(path.strip_prefix(root).unwrap_or(&path).to_path_buf());
        }
    }
    Ok(())
}

fn hash_sorted_files(dist_dir: &Path, files: &[PathBuf]) -> Result<String, CoreError> {
    let mut hasher = Sha256::new();
    for rel in files {
        let rel_str = rel.to_string_lossy().replace('\\', "/");
        hasher.update(rel_str.as_bytes());
        hasher.update([0u8]);
        let bytes = std::fs::read(dist_dir.join(rel))?;
        hasher.update(&bytes);
        hasher.update([0u8]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compute the dist hash: sha256 over each sorted relative path (as UTF-8
/// bytes, forward-slash separated), a NUL separator, the file's contents,
/// and another NUL before the next entry.
pub fn compute_dist_hash(dist_dir: &Path) -> Result<String, CoreError> {
    let files = sorted_relative_files(dist_dir)?;
    hash_sorted_files(dist_dir, &files)
}

/// Verify `dist_dir` hashes to `expected`. A dist directory containing zero
/// files is always rejected -- an empty hash can never be a legitimate
/// plugin payload.
pub fn verify_dist_hash(
    plugin_id: &str,
    dist_dir: &Path,
    expected: &str,
) -> Result<(), CoreError> {
    let expected_hex = expected.strip_prefix("sha256:").unwrap_or(expected);
    let files = sorted_relative_files(dist_dir)?;
    if files.is_empty() {
        return Err(CoreError::integrity(
            plugin_id,
            "dist directory contains zero files",
        ));
    }
    let actual = hash_sorted_files(dist_dir, &files)?;
    if actual != expected_hex {
        return Err(CoreError::integrity(
            plugin_id,
            format!("dist hash mismatch: manifest declares {expected}, computed sha256:{actual}"),
        ));
    }
    Ok(())
}

/// Under `coverage == "all"` and `STRICT_INTEGRITY`, confirm every file
/// under `dist_dir` also has a matching entry in `dist.checksums` and that
/// each declared checksum matches the file on disk. A no-op when coverage
/// isn't declared as `"all"` or the policy isn't set, since per-file
/// checksums are an additional, opt-in layer on top of the tree hash
/// `verify_dist_hash` already checks.
pub fn verify_coverage_all(
    plugin_id: &str,
    dist_dir: &Path,
    dist: &DistInfo,
    strict_integrity: bool,
) -> Result<(), CoreError> {
    if !strict_integrity || dist.coverage.as_deref() != Some("all") {
        return Ok(());
    }
    let checksums = dist.checksums.as_ref().ok_or_else(|| {
        CoreError::integrity(
            plugin_id,
            "coverage=\"all\" declared but manifest carries no per-file checksums",
        )
    })?;
    let declared: std::collections::HashMap<&str, &crate::manifest::FileChecksum> = checksums
        .files
        .iter()
        .map(|f| (f.path.as_str(), f))
        .collect();

    for rel in sorted_relative_files(dist_dir)? {
        let rel_str = rel.to_string_lossy().replace('\\', "/");
        let Some(entry) = declared.get(rel_str.as_str()) else {
            return Err(CoreError::integrity(
                plugin_id,
                format!("file '{rel_str}' is missing a per-file checksum under coverage=\"all\""),
            ));
        };
        if !entry.alg.eq_ignore_ascii_case("sha256") {
            return Err(CoreError::integrity(
                plugin_id,
                format!("unsupported checksum algorithm '{}' for file '{rel_str}'", entry.alg),
            ));
        }
        let bytes = std::fs::read(dist_dir.join(&rel))?;
        let actual = hex::encode(Sha256::digest(&bytes));
        if actual != entry.value {
            return Err(CoreError::integrity(
                plugin_id,
                format!(
                    "per-file checksum mismatch for '{rel_str}': declared {}, computed {actual}",
                    entry.value
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn hash_is_stable_and_order_independent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.wasm"), b"bbb").unwrap();
        fs::write(dir.path().join("a.wasm"), b"aaa").unwrap();
        let h1 = compute_dist_hash(dir.path()).unwrap();

        let dir2 = tempfile::tempdir().unwrap();
        fs::write(dir2.path().join("a.wasm"), b"aaa").unwrap();
        fs::write(dir2.path().join("b.wasm"), b"bbb").unwrap();
        let h2 = compute_dist_hash(dir2.path()).unwrap();

        assert_eq!(h1, h2);
    }

    #[test]
    fn hash_changes_when_content_changes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.wasm"), b"aaa").unwrap();
        let h1 = compute_dist_hash(dir.path()).unwrap();
        fs::write(dir.path().join("a.wasm"), b"aaaa").unwrap();
        let h2 = compute_dist_hash(dir.path()).unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn verify_rejects_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.wasm"), b"aaa").unwrap();
        assert!(verify_dist_hash("plugin", dir.path(), "not-a-real-hash").is_err());
    }

    #[test]
    fn verify_rejects_empty_dist_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = verify_dist_hash("plugin", dir.path(), "anything").unwrap_err();
        assert!(err.to_string().contains("zero files"));
    }

    #[test]
    fn coverage_all_is_noop_without_strict_integrity() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.wasm"), b"aaa").unwrap();
        let mut dist = DistInfo::with_hash("x");
        dist.coverage = Some("all".into());
        assert!(verify_coverage_all("plugin", dir.path(), &dist, false).is_ok());
    }

    #[test]
    fn coverage_all_rejects_missing_per_file_checksum() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.wasm"), b"aaa").unwrap();
        let mut dist = DistInfo::with_hash("x");
        dist.coverage = Some("all".into());
        dist.checksums = Some(crate::manifest::ChecksumManifest { files: vec![] });
        let err = verify_coverage_all("plugin", dir.path(), &dist, true).unwrap_err();
        assert!(err.to_string().contains("missing a per-file checksum"));
    }

    #[test]
    fn coverage_all_accepts_matching_checksums() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.wasm"), b"aaa").unwrap();
        let value = hex::encode(Sha256::digest(b"aaa"));
        let mut dist = DistInfo::with_hash("x");
        dist.coverage = Some("all".into());
        dist.checksums = Some(crate::manifest::ChecksumManifest {
            files: vec![crate::manifest::FileChecksum {
                path: "a.wasm".into(),
                alg: "sha256".into(),
                value,
            }],
        });
        assert!(verify_coverage_all("plugin", dir.path(), &dist, true).is_ok());
    }
}
