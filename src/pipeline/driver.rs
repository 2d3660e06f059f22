//! The page-at-a-time conversion loop.
//!
//! ## Why strictly sequential?
//!
//! A 600-page scan rasterised at scale 1.5 holds roughly 4 MB of RGB pixels
//! per page. Collecting every page up front (the obvious `Vec<RgbImage>`
//! approach) costs gigabytes on large documents; pulling page `i + 1` only
//! after page `i`'s raster, binary and encoded buffers are gone caps the
//! working set at a single page regardless of document length. The loop body
//! enforces this through ownership: each stage consumes its input, and the
//! only artefact that outlives an iteration is the zlib stream already placed
//! in the output document.
//!
//! Any stage error aborts the whole conversion. There are no partially
//! converted output documents: callers either get the complete result or an
//! error naming the stage and page that failed.

use crate::config::ConversionConfig;
use crate::error::PaperwhiteError;
use crate::output::PageRecord;
use crate::pipeline::binarize::{binarize, black_pixel_count};
use crate::pipeline::compose::Compositor;
use crate::pipeline::encode::encode_page;
use crate::pipeline::source::PageSource;
use std::time::Instant;
use tracing::{debug, info};

/// Everything the pipeline produced for one document.
///
/// The caller combines this with input metadata and wall-clock timing to form
/// the public conversion output.
#[derive(Debug)]
pub struct PipelineRun {
    /// The serialised output document.
    pub pdf: Vec<u8>,
    /// Per-input-page records, in page order.
    pub pages: Vec<PageRecord>,
    /// Number of pages in the output document.
    pub output_pages: usize,
    pub render_duration_ms: u64,
    pub binarize_duration_ms: u64,
    pub encode_duration_ms: u64,
    pub compose_duration_ms: u64,
}

/// Convert every page of `source`, in order.
///
/// Returns `Ok(None)` when the source has no pages: an empty document is
/// neither a success with output nor an error, so it gets its own signal.
pub fn run_pipeline<S: PageSource>(
    source: &mut S,
    config: &ConversionConfig,
) -> Result<Option<PipelineRun>, PaperwhiteError> {
    let total_pages = source.page_count();
    if total_pages == 0 {
        info!("Document has no pages; nothing to convert");
        return Ok(None);
    }

    info!(
        "Converting {} page(s): threshold={}, scale={}, layout={}",
        total_pages, config.threshold, config.scale_factor, config.layout
    );
    if let Some(cb) = &config.progress_callback {
        cb.on_conversion_start(total_pages);
    }

    let mut compositor = Compositor::new(config.layout);
    let mut pages = Vec::with_capacity(total_pages);
    let mut render_ms = 0u64;
    let mut binarize_ms = 0u64;
    let mut encode_ms = 0u64;
    let mut compose_ms = 0u64;

    for index in 0..total_pages {
        let page_num = index + 1;
        if let Some(cb) = &config.progress_callback {
            cb.on_page_start(page_num, total_pages);
        }
        let page_started = Instant::now();

        // Stage 1: rasterise. The raster exists only within this iteration.
        let stage = Instant::now();
        let raster = source.rasterize(index)?;
        render_ms += stage.elapsed().as_millis() as u64;
        let (width, height) = raster.dimensions();

        // Stage 2: binarise, consuming the raster in place.
        let stage = Instant::now();
        let binary = binarize(raster, config.threshold);
        let black_pixels = black_pixel_count(&binary);
        binarize_ms += stage.elapsed().as_millis() as u64;

        // Stage 3: encode, then release the pixel buffer.
        let stage = Instant::now();
        let encoded =
            encode_page(&binary).map_err(|e| PaperwhiteError::PageEncodingFailed {
                page: page_num,
                detail: e.to_string(),
            })?;
        drop(binary);
        encode_ms += stage.elapsed().as_millis() as u64;
        let encoded_bytes = encoded.data.len();

        // Stage 4: hand the compressed stream to the output document.
        let stage = Instant::now();
        compositor.place(index, encoded)?;
        compose_ms += stage.elapsed().as_millis() as u64;

        let black_ratio = black_pixels as f32 / (width as u64 * height as u64).max(1) as f32;
        debug!(
            "Page {page_num}/{total_pages}: {width}x{height} px, {:.1}% black, {encoded_bytes} bytes",
            black_ratio * 100.0
        );
        pages.push(PageRecord {
            page_num,
            width,
            height,
            black_ratio,
            encoded_bytes,
            duration_ms: page_started.elapsed().as_millis() as u64,
        });
        if let Some(cb) = &config.progress_callback {
            cb.on_page_complete(page_num, total_pages, encoded_bytes);
        }
    }

    let stage = Instant::now();
    let pdf = compositor.finalize()?.ok_or_else(|| {
        PaperwhiteError::Internal("compositor produced no output for a non-empty document".into())
    })?;
    compose_ms += stage.elapsed().as_millis() as u64;
    let output_pages = compositor.output_pages();

    info!(
        "Converted {} page(s) → {} output page(s), {} bytes",
        total_pages,
        output_pages,
        pdf.len()
    );
    if let Some(cb) = &config.progress_callback {
        cb.on_conversion_complete(total_pages, output_pages);
    }

    Ok(Some(PipelineRun {
        pdf,
        pages,
        output_pages,
        render_duration_ms: render_ms,
        binarize_duration_ms: binarize_ms,
        encode_duration_ms: encode_ms,
        compose_duration_ms: compose_ms,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageLayout;
    use crate::progress::ConversionProgressCallback;
    use image::{Rgb, RgbImage};
    use lopdf::{Document, Object};
    use std::sync::{Arc, Mutex};

    type EventLog = Arc<Mutex<Vec<String>>>;

    /// In-memory page source that records every rasterise call.
    struct FakeSource {
        pages: Vec<RgbImage>,
        log: EventLog,
        fail_at: Option<usize>,
    }

    impl FakeSource {
        fn new(pages: Vec<RgbImage>, log: EventLog) -> Self {
            Self {
                pages,
                log,
                fail_at: None,
            }
        }
    }

    impl PageSource for FakeSource {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn rasterize(&mut self, index: usize) -> Result<RgbImage, PaperwhiteError> {
            self.log.lock().unwrap().push(format!("rasterize {index}"));
            if self.fail_at == Some(index) {
                return Err(PaperwhiteError::RasterisationFailed {
                    page: index + 1,
                    detail: "synthetic failure".into(),
                });
            }
            Ok(self.pages[index].clone())
        }
    }

    /// Progress observer writing into the same log as the source, so the
    /// interleaving of pulls and completions is visible.
    struct LoggingCallback {
        log: EventLog,
    }

    impl ConversionProgressCallback for LoggingCallback {
        fn on_conversion_start(&self, total_pages: usize) {
            self.log.lock().unwrap().push(format!("begin {total_pages}"));
        }
        fn on_page_start(&self, page_num: usize, _total_pages: usize) {
            self.log.lock().unwrap().push(format!("start {page_num}"));
        }
        fn on_page_complete(&self, page_num: usize, _total_pages: usize, _encoded_bytes: usize) {
            self.log.lock().unwrap().push(format!("complete {page_num}"));
        }
        fn on_conversion_complete(&self, total_pages: usize, output_pages: usize) {
            self.log
                .lock()
                .unwrap()
                .push(format!("done {total_pages}/{output_pages}"));
        }
    }

    fn solid_page(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([value, value, value]))
    }

    fn media_box(doc: &Document, page: lopdf::ObjectId) -> Vec<f32> {
        doc.get_dictionary(page)
            .unwrap()
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|obj| match obj {
                Object::Integer(i) => *i as f32,
                Object::Real(r) => *r,
                other => panic!("expected number, got {other:?}"),
            })
            .collect()
    }

    #[test]
    fn empty_source_yields_none_without_side_effects() {
        let log: EventLog = Default::default();
        let mut source = FakeSource::new(vec![], log.clone());
        let config = ConversionConfig::builder()
            .progress_callback(Arc::new(LoggingCallback { log: log.clone() }))
            .build()
            .unwrap();

        let run = run_pipeline(&mut source, &config).unwrap();
        assert!(run.is_none());
        assert!(log.lock().unwrap().is_empty(), "no hooks fire for empty input");
    }

    #[test]
    fn pages_are_pulled_one_at_a_time_in_order() {
        let log: EventLog = Default::default();
        let mut source = FakeSource::new(
            vec![solid_page(4, 4, 200); 3],
            log.clone(),
        );
        let config = ConversionConfig::builder()
            .progress_callback(Arc::new(LoggingCallback { log: log.clone() }))
            .build()
            .unwrap();

        run_pipeline(&mut source, &config).unwrap().unwrap();

        // Page i is fully placed (complete i) before page i+1 is rasterised.
        let events = log.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "begin 3",
                "start 1",
                "rasterize 0",
                "complete 1",
                "start 2",
                "rasterize 1",
                "complete 2",
                "start 3",
                "rasterize 2",
                "complete 3",
                "done 3/3",
            ]
        );
    }

    #[test]
    fn output_preserves_input_page_order() {
        let log: EventLog = Default::default();
        // Page i is 10+i pixels wide; in single layout the output page size
        // mirrors the raster size, so order is visible in the MediaBoxes.
        let pages = (0..10).map(|i| solid_page(10 + i, 20, 255)).collect();
        let mut source = FakeSource::new(pages, log);

        let run = run_pipeline(&mut source, &ConversionConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(run.output_pages, 10);
        assert_eq!(run.pages.len(), 10);
        assert!(run.pdf.starts_with(b"%PDF"));

        let doc = Document::load_mem(&run.pdf).unwrap();
        let page_ids: Vec<_> = doc.get_pages().into_values().collect();
        assert_eq!(page_ids.len(), 10);
        for (i, page) in page_ids.iter().enumerate() {
            assert_eq!(
                media_box(&doc, *page),
                vec![0.0, 0.0, (10 + i) as f32, 20.0],
                "output page {i} must come from input page {i}"
            );
        }

        for (i, record) in run.pages.iter().enumerate() {
            assert_eq!(record.page_num, i + 1);
            assert_eq!(record.width, (10 + i) as u32);
        }
    }

    #[test]
    fn four_up_layout_quarters_the_page_count() {
        for (inputs, expected) in [(1, 1), (4, 1), (5, 2), (9, 3)] {
            let log: EventLog = Default::default();
            let mut source = FakeSource::new(vec![solid_page(6, 8, 0); inputs], log);
            let config = ConversionConfig::builder()
                .layout(PageLayout::FourUp)
                .build()
                .unwrap();

            let run = run_pipeline(&mut source, &config).unwrap().unwrap();
            assert_eq!(run.output_pages, expected, "{inputs} input pages");

            let doc = Document::load_mem(&run.pdf).unwrap();
            assert_eq!(doc.get_pages().len(), expected);
        }
    }

    #[test]
    fn failure_aborts_without_pulling_further_pages() {
        let log: EventLog = Default::default();
        let mut source = FakeSource::new(vec![solid_page(4, 4, 128); 5], log.clone());
        source.fail_at = Some(2);
        let config = ConversionConfig::builder()
            .progress_callback(Arc::new(LoggingCallback { log: log.clone() }))
            .build()
            .unwrap();

        let err = run_pipeline(&mut source, &config).unwrap_err();
        assert!(
            matches!(err, PaperwhiteError::RasterisationFailed { page: 3, .. }),
            "{err:?}"
        );

        let events = log.lock().unwrap().clone();
        assert!(events.contains(&"rasterize 2".to_string()));
        assert!(!events.iter().any(|e| e == "rasterize 3"), "{events:?}");
        assert!(!events.iter().any(|e| e.starts_with("done")), "{events:?}");
    }

    #[test]
    fn page_records_carry_black_ratio_and_sizes() {
        // Left half ink, right half paper: exactly 50% black after
        // thresholding at the default 160.
        let mut img = RgbImage::from_pixel(8, 4, Rgb([255, 255, 255]));
        for y in 0..4 {
            for x in 0..4 {
                img.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        let log: EventLog = Default::default();
        let mut source = FakeSource::new(vec![img], log);

        let run = run_pipeline(&mut source, &ConversionConfig::default())
            .unwrap()
            .unwrap();
        let record = &run.pages[0];
        assert_eq!(record.width, 8);
        assert_eq!(record.height, 4);
        assert!((record.black_ratio - 0.5).abs() < f32::EPSILON);
        assert!(record.encoded_bytes > 0);
    }
}
