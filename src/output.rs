//! Output types returned by the `convert*` entry points.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Full result of a whitening conversion.
///
/// Returned by [`crate::convert`] and friends wrapped in `Option`: `None`
/// means the input document had zero pages and no output was produced.
pub struct ConversionOutput {
    /// The whitened PDF document, ready to write or send.
    pub pdf: Vec<u8>,
    /// Per-page records, in input page order.
    pub pages: Vec<PageRecord>,
    /// Metadata of the input document.
    pub metadata: DocumentMetadata,
    /// Aggregate statistics for the run.
    pub stats: ConversionStats,
}

impl fmt::Debug for ConversionOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionOutput")
            .field("pdf", &format_args!("<{} bytes>", self.pdf.len()))
            .field("pages", &self.pages.len())
            .field("metadata", &self.metadata)
            .field("stats", &self.stats)
            .finish()
    }
}

/// What happened to one input page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Rendered width in pixels.
    pub width: u32,
    /// Rendered height in pixels.
    pub height: u32,
    /// Fraction of pixels that binarised to black, in `0.0..=1.0`.
    ///
    /// A diagnostic for threshold tuning: a page of ordinary text lands
    /// around 0.02–0.10; a value near 1.0 means the threshold swallowed the
    /// background, near 0.0 that it erased the content.
    pub black_ratio: f32,
    /// Compressed size of the page's embedded image stream in bytes.
    pub encoded_bytes: usize,
    /// Wall-clock time spent on this page (render + binarise + encode + place).
    pub duration_ms: u64,
}

/// Aggregate statistics for one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages in the input document.
    pub total_pages: usize,
    /// Pages in the output document (sheets, in 4-up layout).
    pub output_pages: usize,
    /// Size of the finished PDF in bytes.
    pub output_bytes: usize,
    /// End-to-end wall-clock time.
    pub total_duration_ms: u64,
    /// Time spent rasterising pages.
    pub render_duration_ms: u64,
    /// Time spent binarising rasters.
    pub binarize_duration_ms: u64,
    /// Time spent compressing image streams.
    pub encode_duration_ms: u64,
    /// Time spent assembling and serialising the output document.
    pub compose_duration_ms: u64,
}

/// Document metadata extracted from the input PDF.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
    pub is_encrypted: bool,
}
