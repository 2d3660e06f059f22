//! Error types for the paperwhite library.
//!
//! A single fatal error type covers the whole pipeline. Whitening is
//! all-or-nothing: a page that cannot be rasterised or re-encoded aborts the
//! conversion, and no partially whitened document is ever handed back as if
//! it were valid. There is therefore no per-page "soft" error type — every
//! failure is `Err(PaperwhiteError)` from the top-level `convert*` functions.
//!
//! One outcome is deliberately *not* an error: a document with zero pages.
//! The `convert*` functions signal it as `Ok(None)` so callers can
//! distinguish "nothing to whiten" from both success-with-bytes and failure.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the paperwhite library.
///
/// Any variant aborts the conversion that raised it. Page-scoped variants
/// carry the 1-based page number of the offending page.
#[derive(Debug, Error)]
pub enum PaperwhiteError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// Compressing a binarised page into its output image stream failed.
    #[error("Encoding failed for page {page}: {detail}")]
    PageEncodingFailed { page: usize, detail: String },

    /// The output document could not be serialised.
    #[error("Failed to assemble output PDF: {detail}")]
    CompositionFailed { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
paperwhite needs the PDFium shared library at runtime.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Or install pdfium where the dynamic linker can find it\n\
    (e.g. /usr/local/lib/libpdfium.so).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rasterisation_failed_display() {
        let e = PaperwhiteError::RasterisationFailed {
            page: 3,
            detail: "corrupt content stream".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("page 3"), "got: {msg}");
        assert!(msg.contains("corrupt content stream"));
    }

    #[test]
    fn not_a_pdf_shows_magic_bytes() {
        let e = PaperwhiteError::NotAPdf {
            path: PathBuf::from("notes.txt"),
            magic: *b"hell",
        };
        let msg = e.to_string();
        assert!(msg.contains("notes.txt"));
        assert!(msg.contains("104"), "magic bytes rendered as u8: {msg}");
    }

    #[test]
    fn page_encoding_failed_display() {
        let e = PaperwhiteError::PageEncodingFailed {
            page: 12,
            detail: "allocation failure".into(),
        };
        assert!(e.to_string().contains("page 12"));
    }

    #[test]
    fn composition_failed_display() {
        let e = PaperwhiteError::CompositionFailed {
            detail: "xref write error".into(),
        };
        assert!(e.to_string().contains("xref write error"));
    }

    #[test]
    fn invalid_config_display() {
        let e = PaperwhiteError::InvalidConfig("scale_factor must be positive".into());
        assert!(e.to_string().contains("scale_factor"));
    }

    #[test]
    fn output_write_failed_keeps_source() {
        use std::error::Error as _;
        let e = PaperwhiteError::OutputWriteFailed {
            path: PathBuf::from("/no/such/dir/out.pdf"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "nope"),
        };
        assert!(e.source().is_some());
    }
}
