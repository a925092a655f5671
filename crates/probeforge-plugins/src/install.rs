//! Install pipeline: fetch a plugin package, extract it into a staging
//! directory, and hand the manager a directory ready for manifest parsing
//! and dist-hash verification.
//!
//! Grounded on `src/clawhub/downloader.rs`, which fetches a package archive
//! over HTTP and extracts it before the rest of the install flow inspects
//! it. `PluginManager::install` does the dist-hash check and
//! the final atomic move into place; this module only gets bytes onto disk
//! in a directory shaped like a plugin.

use std::io::Read;
use std::path::{Path, PathBuf};

use base64::Engine;
use probeforge_api::CoreError;

use crate::discovery::MANIFEST_FILENAME;
use crate::manifest::SignatureAlgorithm;

pub enum InstallSource {
    LocalPath(PathBuf),
    Url(String),
}

/// A detached signature supplied by the caller at install time (as opposed
/// to one embedded in the manifest's own `signatures` list), verified
/// against the dist hash before the install is finalized.
pub struct DetachedSignature {
    pub algorithm: SignatureAlgorithm,
    /// base64-encoded raw signature bytes over the dist hash.
    pub signature: String,
    pub public_key: Vec<u8>,
}

/// Caller-supplied integrity material for one `install()` call. Either field
/// left unset is only acceptable when the matching policy flag
/// (`strict_integrity` for checksum, `require_signatures` for signature)
/// isn't set.
#[derive(Default)]
pub struct InstallOptions {
    pub checksum: Option<String>,
    pub signature: Option<DetachedSignature>,
}

/// Verify a caller-supplied checksum against the dist directory's content
/// hash, the same digest `dist_hash::compute_dist_hash` produces.
pub fn verify_checksum(plugin_id: &str, dist_dir: &Path, expected: &str) -> Result<(), CoreError> {
    let expected_hex = expected.strip_prefix("sha256:").unwrap_or(expected);
    let actual = crate::dist_hash::compute_dist_hash(dist_dir)?;
    if actual != expected_hex {
        return Err(CoreError::integrity(
            plugin_id,
            format!("caller-supplied checksum mismatch: expected {expected}, computed sha256:{actual}"),
        ));
    }
    Ok(())
}

/// Verify a caller-supplied detached signature over the dist hash using the
/// caller-supplied public key, independent of the manifest's own
/// `signatures` list and trusted keyring.
pub fn verify_detached_signature(
    plugin_id: &str,
    dist_hash: &str,
    sig: &DetachedSignature,
) -> Result<(), CoreError> {
    let sig_bytes = base64::engine::general_purpose::STANDARD
        .decode(&sig.signature)
        .map_err(|e| CoreError::signature(plugin_id, format!("detached signature is not valid base64: {e}")))?;
    let verifier = ring::signature::UnparsedPublicKey::new(
        crate::signature::verifying_algorithm(sig.algorithm),
        &sig.public_key,
    );
    let message = dist_hash.strip_prefix("sha256:").unwrap_or(dist_hash);
    verifier
        .verify(message.as_bytes(), &sig_bytes)
        .map_err(|_| CoreError::signature(plugin_id, "detached signature failed verification"))?;
    Ok(())
}

pub struct StagedPlugin {
    pub path: PathBuf,
    pub source_description: String,
    _tempdir: Option<tempfile::TempDir>,
}

impl StagedPlugin {
    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILENAME)
    }
}

pub async fn stage_source(source: InstallSource) -> Result<StagedPlugin, CoreError> {
    match source {
        InstallSource::LocalPath(path) => stage_local(path).await,
        InstallSource::Url(url) => stage_remote(url).await,
    }
}

async fn stage_local(path: PathBuf) -> Result<StagedPlugin, CoreError> {
    let description = path.display().to_string();
    tokio::task::spawn_blocking(move || {
        let tempdir = tempfile::tempdir()?;
        if path.is_dir() {
            copy_dir_recursive(&path, tempdir.path())?;
        } else {
            extract_archive(&path, tempdir.path())?;
        }
        let staged_path = flatten_single_child(tempdir.path())?;
        Ok(StagedPlugin {
            path: staged_path,
            source_description: description,
            _tempdir: Some(tempdir),
        })
    })
    .await
    .map_err(|e| CoreError::manifest(&path_placeholder(), format!("staging task panicked: {e}")))?
}

async fn stage_remote(url: String) -> Result<StagedPlugin, CoreError> {
    let response = reqwest::get(&url)
        .await
        .map_err(|e| CoreError::manifest(Path::new(&url), format!("download failed: {e}")))?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| CoreError::manifest(Path::new(&url), format!("failed to read response body: {e}")))?;

    let url_for_ext = url.clone();
    tokio::task::spawn_blocking(move || {
        let tempdir = tempfile::tempdir()?;
        let download_path = tempdir.path().join(archive_filename(&url_for_ext));
        std::fs::write(&download_path, &bytes)?;
        let extract_dir = tempdir.path().join("extracted");
        std::fs::create_dir_all(&extract_dir)?;
        extract_archive(&download_path, &extract_dir)?;
        let staged_path = flatten_single_child(&extract_dir)?;
        Ok(StagedPlugin {
            path: staged_path,
            source_description: url_for_ext,
            _tempdir: Some(tempdir),
        })
    })
    .await
    .map_err(|e| CoreError::manifest(Path::new(&url), format!("staging task panicked: {e}")))?
}

fn archive_filename(url: &str) -> String {
    url.rsplit('/').next().unwrap_or("plugin.zip").to_string()
}

fn path_placeholder() -> PathBuf {
    PathBuf::from("<staging>")
}

fn extract_archive(archive: &Path, dest: &Path) -> Result<(), CoreError> {
    let name = archive.to_string_lossy().to_lowercase();
    if name.ends_with(".zip") {
        extract_zip(archive, dest)
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        extract_tar_gz(archive, dest)
    } else if name.ends_with(".tar.xz") {
        extract_tar_xz(archive, dest)
    } else if name.ends_with(".tar") {
        let file = std::fs::File::open(archive)?;
        tar::Archive::new(file).unpack(dest)?;
        Ok(())
    } else {
        Err(CoreError::manifest(
            archive,
            "unrecognized archive extension (expected .zip, .tar.gz, .tgz, .tar.xz, or .tar)",
        ))
    }
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<(), CoreError> {
    let file = std::fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| CoreError::manifest(archive, format!("invalid zip archive: {e}")))?;
    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| CoreError::manifest(archive, format!("corrupt zip entry: {e}")))?;
        let Some(rel_path) = entry.enclosed_name() else {
            continue;
        };
        let out_path = dest.join(rel_path);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out_file = std::fs::File::create(&out_path)?;
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf)?;
        std::io::Write::write_all(&mut out_file, &buf)?;
    }
    Ok(())
}

fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<(), CoreError> {
    let file = std::fs::File::open(archive)?;
    let decoder = flate2::read::GzDecoder::new(file);
    tar::Archive::new(decoder).unpack(dest)?;
    Ok(())
}

fn extract_tar_xz(archive: &Path, dest: &Path) -> Result<(), CoreError> {
    let file = std::fs::File::open(archive)?;
    let decoder = xz2::read::XzDecoder::new(file);
    tar::Archive::new(decoder).unpack(dest)?;
    Ok(())
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<(), CoreError> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Many archives wrap their contents in one top-level directory
/// (`net-probe-0.1.0/mcp-plugin.json` instead of `mcp-plugin.json`). If the
/// staging directory contains exactly one entry and it's a directory with
/// no manifest of its own at `dest`, treat that child as the real root.
fn flatten_single_child(dest: &Path) -> Result<PathBuf, CoreError> {
    if dest.join(MANIFEST_FILENAME).is_file() {
        return Ok(dest.to_path_buf());
    }
    let mut entries = std::fs::read_dir(dest)?;
    let (Some(first), None) = (entries.next(), entries.next()) else {
        return Ok(dest.to_path_buf());
    };
    let first = first?;
    if first.path().is_dir() && first.path().join(MANIFEST_FILENAME).is_file() {
        Ok(first.path())
    } else {
        Ok(dest.to_path_buf())
    }
}
