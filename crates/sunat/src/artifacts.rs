//! Persistence of CDR archives and error details.
//!
//! A resolved ticket can carry a CDR (constancia de recepción) as a
//! base64-encoded zip, and a rejected one carries an error envelope worth
//! keeping next to the submitted file. Everything here is filesystem
//! plumbing after the fact; submission itself never depends on it.

use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use zip::ZipArchive;

use crate::report::Reporter;
use crate::ticket::{TicketError, TicketStatus};

/// Writes ticket artifacts to their configured directories.
#[derive(Debug, Clone)]
pub struct ArtifactPersister {
    output_dir: PathBuf,
    error_dir: Option<PathBuf>,
}

impl ArtifactPersister {
    pub fn new(output_dir: impl Into<PathBuf>, error_dir: Option<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            error_dir,
        }
    }

    /// Extracts the CDR archive carried by `status` into the output
    /// directory and returns the path of the extracted file.
    ///
    /// A response without an archive is a reported no-op, not an error.
    /// The base64 payload may carry embedded whitespace; SUNAT wraps long
    /// payloads.
    pub fn save_certificate(
        &self,
        status: &TicketStatus,
        reporter: &mut dyn Reporter,
    ) -> Result<Option<PathBuf>> {
        let Some(encoded) = status.certificate.as_deref() else {
            reporter.info("response carried no CDR archive");
            return Ok(None);
        };

        let compact: Vec<u8> = encoded
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        let bytes = BASE64
            .decode(compact)
            .context("CDR payload is not valid base64")?;
        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).context("CDR payload is not a zip archive")?;

        if archive.len() != 1 {
            bail!(
                "expected exactly one entry in the CDR archive, found {}",
                archive.len()
            );
        }

        let mut entry = archive
            .by_index(0)
            .context("could not read the CDR archive entry")?;
        if entry.is_dir() {
            bail!("CDR archive holds a directory instead of a file");
        }
        let relative = entry.enclosed_name().ok_or_else(|| {
            anyhow!(
                "CDR entry name {:?} escapes the output directory",
                entry.name()
            )
        })?;

        let dest = self.output_dir.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut file =
            File::create(&dest).with_context(|| format!("failed to create {}", dest.display()))?;
        io::copy(&mut entry, &mut file)
            .with_context(|| format!("failed to write {}", dest.display()))?;

        Ok(Some(dest))
    }

    /// Writes the error envelope as `{name}_error.txt` in the error
    /// directory, if one is configured.
    pub fn save_error(
        &self,
        name: &str,
        error: &TicketError,
        reporter: &mut dyn Reporter,
    ) -> Result<Option<PathBuf>> {
        let Some(dir) = &self.error_dir else {
            reporter.warn(&format!(
                "no error directory configured; detail for {name} not written"
            ));
            return Ok(None);
        };

        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join(format!("{name}_error.txt"));
        let contents = format!("Error Code: {} | Detail: {}", error.code, error.detail);
        fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))?;

        Ok(Some(path))
    }
}
