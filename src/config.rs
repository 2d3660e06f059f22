//! Configuration types for PDF whitening.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across threads, serialise them for logging, and
//! diff two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A many-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::PaperwhiteError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for a whitening conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use paperwhite::{ConversionConfig, PageLayout};
///
/// let config = ConversionConfig::builder()
///     .scale_factor(1.2)
///     .threshold(140)
///     .layout(PageLayout::FourUp)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Zoom multiplier applied uniformly to both page axes when rasterising.
    /// Range: 0.1–8.0. Default: 1.5.
    ///
    /// A page is rendered at `round(points × scale_factor)` pixels per axis,
    /// so scale is the single lever trading visual fidelity against peak
    /// memory: an A4 page costs ~1.5 MB of pixels at 1.0 and ~6 MB at 2.0.
    /// Values between 1.0 and 2.0 cover practically every scanned document;
    /// drop below 1.0 only when memory is very tight and the source is large.
    pub scale_factor: f32,

    /// Luminance cutoff on a 0–255 scale. Default: 160.
    ///
    /// A pixel whose luminance is strictly greater than the threshold becomes
    /// pure white; everything else becomes pure black. 160 keeps typical
    /// yellowed-paper and shadowed-photo backgrounds white while preserving
    /// printed text. Raise it towards 200 when faint pencil strokes vanish;
    /// lower it towards 120 when background bleed survives. There is no
    /// adaptive mode: the cutoff is global and content-independent.
    pub threshold: u8,

    /// Output page layout. Default: [`PageLayout::Single`].
    ///
    /// `Single` emits one output page per input page, sized to the rendered
    /// pixels. `FourUp` packs four whitened pages per A4 sheet, quartering
    /// paper use when the output is destined for a printer.
    pub layout: PageLayout,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 6000.
    ///
    /// A safety cap independent of `scale_factor`. A 2.0× render of an A0
    /// poster would produce a 6 700 × 9 500 px image and exhaust memory on
    /// small machines. When a page would exceed the cap, the effective scale
    /// is reduced for that page only, keeping both axes proportional.
    pub max_raster_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Optional progress observer, called between pipeline stages.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            scale_factor: 1.5,
            threshold: 160,
            layout: PageLayout::default(),
            max_raster_pixels: 6000,
            password: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("scale_factor", &self.scale_factor)
            .field("threshold", &self.threshold)
            .field("layout", &self.layout)
            .field("max_raster_pixels", &self.max_raster_pixels)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn scale_factor(mut self, scale: f32) -> Self {
        self.config.scale_factor = scale.clamp(0.1, 8.0);
        self
    }

    pub fn threshold(mut self, threshold: u8) -> Self {
        self.config.threshold = threshold;
        self
    }

    pub fn layout(mut self, layout: PageLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn max_raster_pixels(mut self, px: u32) -> Self {
        self.config.max_raster_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, PaperwhiteError> {
        let c = &self.config;
        if !c.scale_factor.is_finite() || c.scale_factor <= 0.0 {
            return Err(PaperwhiteError::InvalidConfig(format!(
                "scale_factor must be a positive number, got {}",
                c.scale_factor
            )));
        }
        if c.max_raster_pixels < 100 {
            return Err(PaperwhiteError::InvalidConfig(format!(
                "max_raster_pixels must be ≥ 100, got {}",
                c.max_raster_pixels
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Output document layout.
///
/// Chosen once per conversion, never per page. The layout fixes `k`, the
/// number of input pages packed into one output page, so the output always
/// holds `ceil(input_pages / k)` pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageLayout {
    /// One output page per input page, sized to the rendered pixels. (default)
    #[default]
    Single,
    /// Four input pages per 595×842 pt (A4) sheet, placed into quadrants
    /// top-left, top-right, bottom-left, bottom-right in input order.
    FourUp,
}

impl PageLayout {
    /// Number of input pages packed into one output page.
    pub fn pages_per_sheet(self) -> usize {
        match self {
            PageLayout::Single => 1,
            PageLayout::FourUp => 4,
        }
    }
}

impl fmt::Display for PageLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageLayout::Single => write!(f, "single"),
            PageLayout::FourUp => write!(f, "4up"),
        }
    }
}
