//! Page sources: where raster images come from.
//!
//! The driver pulls pages one at a time through the [`PageSource`] trait and
//! never learns where they originate. Production code uses [`PdfiumSource`],
//! which renders via the pdfium C++ library; tests substitute in-memory fakes
//! so the page-at-a-time sequencing can be verified without a PDF renderer on
//! the machine.
//!
//! ## Why scale, not DPI?
//!
//! pdfium renders in page units (points), so a single multiplier gives
//! predictable output: a 595 × 842 pt page at scale 1.5 is always
//! 893 × 1263 px. Page sizes vary wildly though; an A0 poster at the same
//! scale would be over 5,000 px wide. `max_raster_pixels` caps the longest
//! edge regardless of physical size, keeping the per-page working set
//! bounded.
//!
//! ## Why bind pdfium at runtime?
//!
//! The pdfium library ships as a platform binary, not a Rust crate. Binding
//! at runtime lets one build run anywhere the library can be found: an
//! explicit `PDFIUM_LIB_PATH` directory, the working directory, or the
//! system library path, in that order.

use crate::error::PaperwhiteError;
use crate::output::DocumentMetadata;
use image::RgbImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, warn};

/// Anything that can report a page count and rasterise pages on demand.
///
/// Implementations hand out one page per call; the caller owns the returned
/// buffer outright and drops it before asking for the next page.
pub trait PageSource {
    /// Total number of pages available.
    fn page_count(&self) -> usize;

    /// Render page `index` (0-based) to an RGB raster.
    fn rasterize(&mut self, index: usize) -> Result<RgbImage, PaperwhiteError>;
}

/// Locate and bind the pdfium library.
///
/// Search order: the directory named by `PDFIUM_LIB_PATH`, then the current
/// working directory, then the system library path.
pub fn bind_pdfium() -> Result<Pdfium, PaperwhiteError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir)),
        Err(_) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| PaperwhiteError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

/// Open a document, translating pdfium's load errors into ours.
pub fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, PaperwhiteError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                PaperwhiteError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                PaperwhiteError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            PaperwhiteError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

/// [`PageSource`] backed by an open pdfium document.
pub struct PdfiumSource<'a> {
    document: PdfDocument<'a>,
    page_count: usize,
    scale_factor: f32,
    max_raster_pixels: u32,
}

impl<'a> PdfiumSource<'a> {
    pub fn new(document: PdfDocument<'a>, scale_factor: f32, max_raster_pixels: u32) -> Self {
        let page_count = document.pages().len() as usize;
        Self {
            document,
            page_count,
            scale_factor,
            max_raster_pixels,
        }
    }
}

impl PageSource for PdfiumSource<'_> {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn rasterize(&mut self, index: usize) -> Result<RgbImage, PaperwhiteError> {
        let page = self.document.pages().get(index as u16).map_err(|e| {
            PaperwhiteError::RasterisationFailed {
                page: index + 1,
                detail: format!("{:?}", e),
            }
        })?;

        let scale = effective_scale(
            page.width().value,
            page.height().value,
            self.scale_factor,
            self.max_raster_pixels,
        );
        if scale < self.scale_factor {
            warn!(
                "Page {}: scale reduced {} → {:.3} to keep the longest edge within {} px",
                index + 1,
                self.scale_factor,
                scale,
                self.max_raster_pixels
            );
        }

        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap =
            page.render_with_config(&render_config)
                .map_err(|e| PaperwhiteError::RasterisationFailed {
                    page: index + 1,
                    detail: format!("{:?}", e),
                })?;

        let image = bitmap.as_image().into_rgb8();
        debug!(
            "Rendered page {} → {}x{} px",
            index + 1,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}

/// Requested scale, reduced just enough that the longest page edge stays
/// within `max_edge_px` once rendered.
fn effective_scale(width_pts: f32, height_pts: f32, requested: f32, max_edge_px: u32) -> f32 {
    let longest_pts = width_pts.max(height_pts).max(1.0);
    let cap = max_edge_px as f32 / longest_pts;
    requested.min(cap)
}

/// Read document metadata from an already-open document.
pub fn read_metadata(document: &PdfDocument<'_>) -> DocumentMetadata {
    let metadata = document.metadata();
    let pages = document.pages();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: pages.len() as usize,
        pdf_version: format!("{:?}", document.version()),
        is_encrypted: false, // pdfium doesn't readily expose this after opening
    }
}

/// Extract document metadata from a PDF without rendering pages.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, PaperwhiteError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium()?;
        let document = open_document(&pdfium, &path, pwd.as_deref())?;
        Ok(read_metadata(&document))
    })
    .await
    .map_err(|e| PaperwhiteError::Internal(format!("Metadata task panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_scale_passes_through_when_under_cap() {
        // A4 at 1.5 → longest edge 1263 px, well under 6000.
        assert_eq!(effective_scale(595.0, 842.0, 1.5, 6000), 1.5);
    }

    #[test]
    fn effective_scale_caps_oversized_pages() {
        // A0 poster: 2384 × 3370 pts. At scale 4 the long edge would be
        // 13480 px; the cap pulls it back to exactly 6000.
        let scale = effective_scale(2384.0, 3370.0, 4.0, 6000);
        assert!(scale < 4.0);
        let rendered_edge = 3370.0 * scale;
        assert!((rendered_edge - 6000.0).abs() < 1.0, "{rendered_edge}");
    }

    #[test]
    fn effective_scale_uses_longest_edge_for_landscape() {
        let portrait = effective_scale(595.0, 842.0, 8.0, 2000);
        let landscape = effective_scale(842.0, 595.0, 8.0, 2000);
        assert_eq!(portrait, landscape);
    }

    #[test]
    fn effective_scale_handles_degenerate_page_size() {
        let scale = effective_scale(0.0, 0.0, 1.5, 6000);
        assert!(scale.is_finite());
        assert!(scale > 0.0);
    }
}
