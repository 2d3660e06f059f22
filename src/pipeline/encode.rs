//! Image encoding: binarised raster → flate-compressed PDF image stream.
//!
//! The output document embeds each page as an image XObject whose stream is
//! the raw 8-bit RGB samples under `/FlateDecode`. Encoding to the PDF's
//! native stream format here means the compositor can drop the bytes straight
//! into an object without transcoding, and zlib is lossless — a lossy format
//! would smear gray back into edges the binariser just made pure.
//! Two-valued rows are extremely repetitive, so flate typically shrinks a
//! page to well under 1% of its raw pixel size.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::RgbImage;
use std::io::Write;
use tracing::debug;

/// A page image serialised for embedding: dimensions plus the
/// zlib-compressed raw RGB samples.
#[derive(Debug, Clone)]
pub struct EncodedPage {
    pub width: u32,
    pub height: u32,
    /// Zlib stream of `width * height * 3` bytes of 8-bit RGB samples,
    /// rows top to bottom.
    pub data: Vec<u8>,
}

/// Compress a binarised page into its embeddable image stream.
///
/// Pure transform: the input image is untouched and no state is kept.
/// Fails only if the in-memory zlib encoder fails, which is fatal for the
/// conversion (there is nothing to retry).
pub fn encode_page(binary: &RgbImage) -> Result<EncodedPage, std::io::Error> {
    let (width, height) = binary.dimensions();

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(binary.as_raw())?;
    let data = encoder.finish()?;

    debug!(
        "Encoded {}x{} page → {} bytes compressed",
        width,
        height,
        data.len()
    );

    Ok(EncodedPage {
        width,
        height,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use image::Rgb;
    use std::io::Read;

    #[test]
    fn encode_roundtrips_pixel_data() {
        let img = RgbImage::from_fn(10, 6, |x, _| {
            if x < 5 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let encoded = encode_page(&img).expect("encode should succeed");
        assert_eq!(encoded.width, 10);
        assert_eq!(encoded.height, 6);

        let mut inflated = Vec::new();
        ZlibDecoder::new(encoded.data.as_slice())
            .read_to_end(&mut inflated)
            .expect("valid zlib stream");
        assert_eq!(inflated, *img.as_raw());
    }

    #[test]
    fn binary_pages_compress_hard() {
        let img = RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]));
        let encoded = encode_page(&img).unwrap();
        let raw = 200 * 200 * 3;
        assert!(
            encoded.data.len() * 100 < raw,
            "white page compressed to {} of {} raw bytes",
            encoded.data.len(),
            raw
        );
    }

    #[test]
    fn encode_does_not_consume_the_image() {
        let img = RgbImage::from_pixel(3, 3, Rgb([0, 0, 0]));
        let first = encode_page(&img).unwrap();
        let second = encode_page(&img).unwrap();
        assert_eq!(first.data, second.data);
    }
}
