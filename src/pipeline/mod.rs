//! Pipeline stages for PDF background whitening.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. substitute a fake page source in tests)
//! without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ source ──▶ binarize ──▶ encode ──▶ compose
//! (path)    (pdfium)   (threshold)  (zlib)     (lopdf)
//! ```
//!
//! 1. [`input`]    — validate the user-supplied path or byte buffer and pin
//!    it to a local file
//! 2. [`source`]   — rasterise pages on demand via pdfium, one at a time
//! 3. [`binarize`] — map every pixel to pure black or pure white by a global
//!    luminance threshold
//! 4. [`encode`]   — zlib-compress the two-tone raster into the exact stream
//!    an image XObject embeds
//! 5. [`compose`]  — place each stream into the output document and
//!    serialise it once at the end
//!
//! [`driver`] owns the sequencing: it pulls pages through stages 2–5 strictly
//! one page at a time, so peak memory never depends on document length.

pub mod binarize;
pub mod compose;
pub mod driver;
pub mod encode;
pub mod input;
pub mod source;
