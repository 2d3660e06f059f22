//! Input resolution: normalise caller input to a local file pdfium can open.
//!
//! ## Why buffer bytes to a temp file?
//!
//! pdfium requires a file-system path — it cannot stream from a byte buffer.
//! Writing caller-supplied bytes to a `NamedTempFile` gives us a path pdfium
//! can open while ensuring cleanup happens automatically when
//! [`ResolvedInput`] is dropped, even if the process panics. We validate the
//! PDF magic bytes (`%PDF`) before handing anything to pdfium so callers get
//! a meaningful error rather than a pdfium crash.

use crate::error::PaperwhiteError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// The resolved input — either a local path or a buffered temp file.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input arrived as in-memory bytes, written to a temp file.
    /// The `NamedTempFile` is kept alive to prevent cleanup until processing
    /// completes.
    Buffered { path: PathBuf, _temp: NamedTempFile },
}

impl ResolvedInput {
    /// Get the path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Buffered { path, .. } => path,
        }
    }
}

/// Resolve a local file path, validating existence and PDF magic bytes.
pub fn resolve_path(path: impl AsRef<Path>) -> Result<ResolvedInput, PaperwhiteError> {
    let path = path.as_ref().to_path_buf();

    if !path.exists() {
        return Err(PaperwhiteError::FileNotFound { path });
    }

    // Check read permission by attempting to open
    match std::fs::File::open(&path) {
        Ok(mut f) => {
            // Verify PDF magic bytes
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(PaperwhiteError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PaperwhiteError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(PaperwhiteError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Write in-memory PDF bytes to a managed temp file pdfium can open.
pub fn buffer_bytes(bytes: &[u8]) -> Result<ResolvedInput, PaperwhiteError> {
    let mut temp = NamedTempFile::new()
        .map_err(|e| PaperwhiteError::Internal(format!("tempfile: {e}")))?;
    temp.write_all(bytes)
        .map_err(|e| PaperwhiteError::Internal(format!("tempfile write: {e}")))?;
    temp.flush()
        .map_err(|e| PaperwhiteError::Internal(format!("tempfile flush: {e}")))?;

    let path = temp.path().to_path_buf();

    // Verify PDF magic bytes
    if bytes.len() >= 4 && &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(PaperwhiteError::NotAPdf { path, magic });
    }

    debug!("Buffered {} input bytes to {}", bytes.len(), path.display());
    Ok(ResolvedInput::Buffered { path, _temp: temp })
}
