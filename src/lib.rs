//! # paperwhite
//!
//! Force PDF page backgrounds to pure white via luminance thresholding.
//!
//! ## Why this crate?
//!
//! Scans and phone photos of documents carry yellowed paper, shadows, and
//! sensor noise that waste toner and hurt legibility. Contrast filters only
//! go so far: grey stays grey. This crate rasterises each page, maps every
//! pixel to pure black or pure white by a single luminance cutoff, and
//! rebuilds the document losslessly, so printed output contains ink only
//! where there was content.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     validate the path or byte buffer (magic check)
//!  ├─ 2. Source    rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Binarise  luma > threshold ⇒ white, else black (Rec. 601 weights)
//!  ├─ 4. Encode    zlib-compress the two-tone raster
//!  └─ 5. Compose   embed each stream as an image XObject, one document out
//! ```
//!
//! Pages flow through stages 2–5 strictly one at a time, so peak memory is a
//! single page's raster regardless of document length.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paperwhite::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     match convert("scan.pdf", &config).await? {
//!         Some(output) => {
//!             std::fs::write("scan-white.pdf", &output.pdf)?;
//!             eprintln!(
//!                 "{} page(s), {} bytes",
//!                 output.stats.output_pages, output.stats.output_bytes
//!             );
//!         }
//!         None => eprintln!("document has no pages"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paperwhite` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! paperwhite = { version = "0.5", default-features = false }
//! ```
//!
//! ## Choosing a Scale Factor
//!
//! | Scale | A4 render    | Page raster | Best for |
//! |-------|--------------|-------------|----------|
//! | 1.0   | 595×842 px   | ~1.5 MB     | Screen reading |
//! | 1.5   | 893×1263 px  | ~3.4 MB     | Default — crisp print-size text |
//! | 2.0   | 1190×1684 px | ~6.0 MB     | Small print, dense scans |
//! | 3.0   | 1785×2526 px | ~13.5 MB    | Archival quality, large-format sources |
//!
//! Text thinner than a rendered pixel vanishes during thresholding, so raise
//! the scale before lowering the threshold when fine detail drops out.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, PageLayout};
pub use convert::{convert, convert_from_bytes, convert_sync, convert_to_file, inspect};
pub use error::PaperwhiteError;
pub use output::{ConversionOutput, ConversionStats, DocumentMetadata, PageRecord};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
