//! Conversion entry points.
//!
//! ## Why one blocking task?
//!
//! pdfium wraps thread-local C++ state and must not run on async worker
//! threads. The whole page loop therefore runs inside a single
//! `tokio::task::spawn_blocking` call rather than hopping between the async
//! and blocking pools per page: the loop is CPU-bound end to end, and staying
//! on one thread keeps the per-conversion memory guarantee (one page's
//! buffers live at a time) trivially true.
//!
//! The resolved input moves into that task, so any temporary file backing it
//! (see [`convert_from_bytes`]) is removed exactly once when the task ends,
//! on success and on error alike.

use crate::config::ConversionConfig;
use crate::error::PaperwhiteError;
use crate::output::{ConversionOutput, ConversionStats, DocumentMetadata};
use crate::pipeline::{driver, input, source};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Whiten a PDF file.
///
/// This is the primary entry point for the library: every page is rasterised,
/// thresholded to pure black and white, and re-embedded losslessly into a new
/// document.
///
/// # Arguments
/// * `input`  — Path to a local PDF file
/// * `config` — Conversion configuration
///
/// # Returns
/// * `Ok(Some(output))` — the whitened document plus per-page records and stats
/// * `Ok(None)` — the input opened fine but holds zero pages; there is no
///   output document for "no content"
///
/// # Errors
/// The first page to fail any stage aborts the whole conversion:
/// - File not found, permission denied, or not a PDF at all
/// - Password required or wrong
/// - Rasterisation, encoding, or composition failure (the error names the
///   page and stage)
pub async fn convert(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<Option<ConversionOutput>, PaperwhiteError> {
    let total_start = Instant::now();
    let input = input.as_ref();
    info!("Starting conversion: {}", input.display());

    let resolved = input::resolve_path(input)?;
    convert_resolved(resolved, config.clone(), total_start).await
}

/// Whiten PDF bytes held in memory.
///
/// Internally the bytes are pinned to a managed [`tempfile`] (pdfium reads
/// from the filesystem) and the file is cleaned up automatically when the
/// conversion finishes, whatever the outcome.
///
/// This is the right API when PDF data arrives from a network stream,
/// database, or message payload rather than a file on disk.
///
/// # Example
/// ```rust,no_run
/// use paperwhite::{convert_from_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("document.pdf")?;
/// let config = ConversionConfig::default();
/// if let Some(output) = convert_from_bytes(&bytes, &config).await? {
///     std::fs::write("document-white.pdf", &output.pdf)?;
/// }
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<Option<ConversionOutput>, PaperwhiteError> {
    let total_start = Instant::now();
    let resolved = input::buffer_bytes(bytes)?;
    convert_resolved(resolved, config.clone(), total_start).await
}

/// Shared tail of [`convert`] and [`convert_from_bytes`].
async fn convert_resolved(
    resolved: input::ResolvedInput,
    config: ConversionConfig,
    total_start: Instant,
) -> Result<Option<ConversionOutput>, PaperwhiteError> {
    // ── Step 1: run the whole page loop on the blocking pool ────────────
    // `resolved` moves into the task; a buffered temp file backing it is
    // deleted when the task ends, on every exit path.
    let result = tokio::task::spawn_blocking(move || {
        let pdfium = source::bind_pdfium()?;
        let document =
            source::open_document(&pdfium, resolved.path(), config.password.as_deref())?;
        let metadata = source::read_metadata(&document);
        let mut pages = source::PdfiumSource::new(
            document,
            config.scale_factor,
            config.max_raster_pixels,
        );
        let run = driver::run_pipeline(&mut pages, &config)?;
        Ok::<_, PaperwhiteError>((run, metadata))
    })
    .await
    .map_err(|e| PaperwhiteError::Internal(format!("Conversion task panicked: {}", e)))?;
    let (run, metadata) = result?;

    // ── Step 2: empty documents produce no output at all ────────────────
    let Some(run) = run else {
        return Ok(None);
    };

    // ── Step 3: assemble output and stats ───────────────────────────────
    let stats = ConversionStats {
        total_pages: run.pages.len(),
        output_pages: run.output_pages,
        output_bytes: run.pdf.len(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        render_duration_ms: run.render_duration_ms,
        binarize_duration_ms: run.binarize_duration_ms,
        encode_duration_ms: run.encode_duration_ms,
        compose_duration_ms: run.compose_duration_ms,
    };
    info!(
        "Conversion complete: {} page(s) → {} output page(s) in {}ms",
        stats.total_pages, stats.output_pages, stats.total_duration_ms
    );

    Ok(Some(ConversionOutput {
        pdf: run.pdf,
        pages: run.pages,
        metadata,
        stats,
    }))
}

/// Whiten a PDF and write the result directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files. Returns
/// `Ok(None)` without creating anything when the input has no pages.
pub async fn convert_to_file(
    input: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<Option<ConversionStats>, PaperwhiteError> {
    let Some(output) = convert(input, config).await? else {
        info!("No output written: document has no pages");
        return Ok(None);
    };
    let path = output_path.as_ref();

    // Atomic write: write to temp, then rename
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PaperwhiteError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, &output.pdf)
        .await
        .map_err(|e| PaperwhiteError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| PaperwhiteError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(Some(output.stats))
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<Option<ConversionOutput>, PaperwhiteError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PaperwhiteError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input, config))
}

/// Extract PDF metadata without converting anything.
///
/// Cheap: the document is opened and its info dictionary read, but no page
/// is ever rasterised.
pub async fn inspect(input: impl AsRef<Path>) -> Result<DocumentMetadata, PaperwhiteError> {
    let resolved = input::resolve_path(input)?;
    source::extract_metadata(resolved.path(), None).await
}
