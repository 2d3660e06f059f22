//! Binarisation: force every pixel to pure black or pure white.
//!
//! ## Why a global threshold?
//!
//! The whole point of the pipeline is a two-value output: any pixel that is
//! not paper-white becomes ink-black. A single global cutoff keeps the
//! operation deterministic, content-independent, and O(pixels) with no
//! intermediate buffers. Adaptive schemes (Otsu, Sauvola) pick a "better"
//! cutoff per image or per window, but they make the output depend on page
//! statistics — two visually identical pages could binarise differently —
//! and none of them is needed when the caller can simply tune `threshold`.
//!
//! No dithering, no anti-aliasing: those reintroduce the gray values this
//! stage exists to remove.

use image::RgbImage;

// Integer Rec. 601 luminance weights, scaled by 256.
const LUMA_RED_WEIGHT: u32 = 77; // 0.299 * 256
const LUMA_GREEN_WEIGHT: u32 = 150; // 0.587 * 256
const LUMA_BLUE_WEIGHT: u32 = 29; // 0.114 * 256

/// Perceived brightness of one pixel on a 0–255 scale.
///
/// `Y = (77*R + 150*G + 29*B) >> 8`; the weights sum to 256, so pure white
/// maps to exactly 255 and pure black to 0.
#[inline]
fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((LUMA_RED_WEIGHT * r as u32 + LUMA_GREEN_WEIGHT * g as u32 + LUMA_BLUE_WEIGHT * b as u32)
        >> 8) as u8
}

/// Map a raster to strict black/white: luminance strictly greater than
/// `threshold` becomes white, everything else black.
///
/// Consumes the raster and rewrites its pixels in place, so the binarised
/// image reuses the input allocation. Dimensions are preserved exactly.
/// Total function: there is no failure path for any input image.
pub fn binarize(mut raster: RgbImage, threshold: u8) -> RgbImage {
    for pixel in raster.pixels_mut() {
        let [r, g, b] = pixel.0;
        pixel.0 = if luminance(r, g, b) > threshold {
            [255, 255, 255]
        } else {
            [0, 0, 0]
        };
    }
    raster
}

/// Count the black pixels of a binarised image.
///
/// Used for the per-page `black_ratio` diagnostic. Only the red channel is
/// inspected: after [`binarize`] all three channels agree.
pub fn black_pixel_count(binary: &RgbImage) -> u64 {
    binary.pixels().filter(|p| p.0[0] == 0).count() as u64
}
