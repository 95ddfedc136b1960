//! Deterministic packaging of a receipt file.
//!
//! SUNAT takes receipts as a single-entry zip archive, base64-encoded, with
//! a SHA-256 digest of the archive bytes alongside. Packaging is pure: the
//! same file content always yields the same archive, digest, and payload.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::Error;

/// A receipt ready for submission.
///
/// Produced once by [`package`] and consumed by
/// [`crate::client::ReceiptClient::submit`].
#[derive(Debug, Clone)]
pub struct PackagedReceipt {
    /// Document name: the file's base name up to the first `.`. Used in the
    /// submission URL and as the stem of `zip_file_name`.
    pub logical_name: String,
    /// `{logical_name}.zip`, the `nomArchivo` value on the wire.
    pub zip_file_name: String,
    /// Raw bytes of the single-entry zip archive.
    pub archive: Vec<u8>,
    /// Lower-case hex SHA-256 of `archive`.
    pub sha256_hex: String,
    /// Base64 (standard alphabet, no line breaks) of `archive`.
    pub base64: String,
}

impl PackagedReceipt {
    /// Persists the archive bytes as `{logical_name}.zip` under `dir`.
    ///
    /// Side option for operators who want the exact submitted artifact on
    /// disk; submission itself never touches the filesystem.
    pub fn write_archive(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        let path = dir.join(&self.zip_file_name);
        fs::write(&path, &self.archive)
            .with_context(|| format!("failed to write archive to {}", path.display()))?;
        Ok(path)
    }
}

/// Reads the file at `path` and produces its submission payload.
///
/// The archive holds exactly one entry, stored under the file's own name.
/// Digest and base64 cover the archive bytes, not the source file; that is
/// what the `hashZip` field on the wire refers to.
pub fn package(path: &Path) -> Result<PackagedReceipt, Error> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::Packaging {
            path: path.to_path_buf(),
            message: "path has no usable file name".to_string(),
        })?;

    let logical_name = file_name.split('.').next().unwrap_or(file_name);
    if logical_name.is_empty() {
        return Err(Error::Packaging {
            path: path.to_path_buf(),
            message: "cannot derive a document name from the file name".to_string(),
        });
    }

    let contents = fs::read(path).map_err(|e| Error::Packaging {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let archive = zip_single_entry(file_name, &contents).map_err(|e| Error::Packaging {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(&archive);
    let sha256_hex = hex::encode(hasher.finalize());
    let base64 = BASE64.encode(&archive);

    Ok(PackagedReceipt {
        logical_name: logical_name.to_string(),
        zip_file_name: format!("{logical_name}.zip"),
        archive,
        sha256_hex,
        base64,
    })
}

fn zip_single_entry(entry_name: &str, contents: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    // Fixed timestamp: repeated packaging of the same content must be
    // byte-identical, and the digest covers these bytes.
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    writer.start_file(entry_name, options)?;
    writer.write_all(contents)?;
    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}
