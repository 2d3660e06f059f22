//! Output document assembly: place encoded pages, then serialise once.
//!
//! ## Why build the PDF by hand?
//!
//! Every output page contains exactly one kind of content — full-bleed image
//! XObjects — so the document reduces to a handful of lopdf objects per page:
//! the compressed image stream, a four-operation content stream (`q`, `cm`,
//! `Do`, `Q` per image), and the page dictionary wiring them together. No
//! layout engine, no fonts, no text.
//!
//! The compositor owns the [`lopdf::Document`] exclusively until
//! [`Compositor::finalize`], which serialises it and hands the bytes to the
//! caller. Finalising caches the result, so a second call returns
//! byte-identical output instead of re-serialising a mutated document.
//!
//! Two layouts exist, fixed for the lifetime of one compositor:
//! * **Single** — one output page per placed image, page size equal to the
//!   image's pixel size in points, image drawn edge to edge.
//! * **FourUp** — a fixed 595×842 pt sheet split into four equal quadrant
//!   slots, visited top-left, top-right, bottom-left, bottom-right. Each
//!   image is scaled to fit its slot, preserving aspect ratio, centred. A
//!   final sheet holding fewer than four images is sealed as-is.

use crate::config::PageLayout;
use crate::error::PaperwhiteError;
use crate::pipeline::encode::EncodedPage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

/// Output sheet size in 4-up layout: A4 at 72 dpi.
const SHEET_WIDTH_PT: f32 = 595.0;
const SHEET_HEIGHT_PT: f32 = 842.0;

/// All four slots are equal quadrants of the sheet.
const SLOT_WIDTH_PT: f32 = SHEET_WIDTH_PT / 2.0;
const SLOT_HEIGHT_PT: f32 = SHEET_HEIGHT_PT / 2.0;

/// Bottom-left corner of each slot, in sheet coordinates (PDF origin is the
/// bottom-left of the page). Order is the visiting order.
const SLOTS: [Slot; 4] = [
    Slot { x: 0.0, y: SLOT_HEIGHT_PT },            // top-left
    Slot { x: SLOT_WIDTH_PT, y: SLOT_HEIGHT_PT },  // top-right
    Slot { x: 0.0, y: 0.0 },                       // bottom-left
    Slot { x: SLOT_WIDTH_PT, y: 0.0 },             // bottom-right
];

#[derive(Debug, Clone, Copy)]
struct Slot {
    x: f32,
    y: f32,
}

impl Slot {
    /// Transformation matrix drawing an `image_width` × `image_height` image
    /// scaled to fit this slot, aspect ratio preserved, centred.
    fn fit(&self, image_width: f32, image_height: f32) -> [f32; 6] {
        let image_width = image_width.max(1.0);
        let image_height = image_height.max(1.0);
        let scale = (SLOT_WIDTH_PT / image_width).min(SLOT_HEIGHT_PT / image_height);
        let drawn_width = image_width * scale;
        let drawn_height = image_height * scale;
        let tx = self.x + (SLOT_WIDTH_PT - drawn_width) / 2.0;
        let ty = self.y + (SLOT_HEIGHT_PT - drawn_height) / 2.0;
        [drawn_width, 0.0, 0.0, drawn_height, tx, ty]
    }
}

/// One open 4-up sheet accumulating up to four placed images.
struct SheetState {
    /// XObject name, image object id, and placement matrix per slot filled.
    images: Vec<(String, ObjectId, [f32; 6])>,
}

/// Builds the output document from encoded page images.
///
/// Placements must arrive in input page order; the slot an image lands in is
/// derived purely from its page index, never from its content.
pub struct Compositor {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
    layout: PageLayout,
    sheet: Option<SheetState>,
    placed: usize,
    finalized: Option<Vec<u8>>,
}

impl Compositor {
    /// Create an empty compositor for the given layout.
    pub fn new(layout: PageLayout) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            page_ids: Vec::new(),
            layout,
            sheet: None,
            placed: 0,
            finalized: None,
        }
    }

    /// Number of images placed so far.
    pub fn pages_placed(&self) -> usize {
        self.placed
    }

    /// Number of pages the output document will hold (sealed sheets plus an
    /// open one, if any).
    pub fn output_pages(&self) -> usize {
        self.page_ids.len() + usize::from(self.sheet.is_some())
    }

    /// Place the next page image into the document.
    ///
    /// `page_index` is the 0-based input page index. In 4-up layout it fixes
    /// the slot (`page_index mod 4`) and when the slot wraps to 0 the previous
    /// sheet is sealed and a new one opened.
    pub fn place(&mut self, page_index: usize, image: EncodedPage) -> Result<(), PaperwhiteError> {
        if self.finalized.is_some() {
            return Err(PaperwhiteError::Internal(
                "page placed after the output document was finalised".into(),
            ));
        }
        debug_assert_eq!(page_index, self.placed, "placements must arrive in page order");

        match self.layout {
            PageLayout::Single => self.place_single(image)?,
            PageLayout::FourUp => self.place_grid(page_index, image)?,
        }
        self.placed += 1;
        Ok(())
    }

    /// Serialise the document and return its bytes.
    ///
    /// Returns `None` when no page was ever placed: an all-empty input
    /// produces no output document at all rather than an empty file. Calling
    /// again without intervening [`place`](Self::place) calls returns the
    /// same bytes.
    pub fn finalize(&mut self) -> Result<Option<Vec<u8>>, PaperwhiteError> {
        if let Some(bytes) = &self.finalized {
            return Ok(Some(bytes.clone()));
        }

        self.seal_open_sheet()?;
        if self.page_ids.is_empty() {
            return Ok(None);
        }

        let kids: Vec<Object> = self.page_ids.iter().map(|&id| id.into()).collect();
        let count = self.page_ids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        let info_id = self.doc.add_object(dictionary! {
            "Producer" => Object::string_literal(concat!("paperwhite ", env!("CARGO_PKG_VERSION"))),
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", info_id);

        let mut bytes = Vec::new();
        self.doc
            .save_to(&mut bytes)
            .map_err(|e| PaperwhiteError::CompositionFailed {
                detail: format!("PDF serialisation: {e}"),
            })?;

        debug!(
            "Finalised output document: {} pages, {} bytes",
            self.page_ids.len(),
            bytes.len()
        );
        self.finalized = Some(bytes.clone());
        Ok(Some(bytes))
    }

    /// One output page per image, sized to the image's pixels (one point per
    /// pixel), image drawn edge to edge.
    fn place_single(&mut self, image: EncodedPage) -> Result<(), PaperwhiteError> {
        let width = image.width as i64;
        let height = image.height as i64;
        let xobject_id = self.add_image_xobject(image);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        (width as f32).into(),
                        0.into(),
                        0.into(),
                        (height as f32).into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec!["Im0".into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = self.add_content_stream(content)?;

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => xobject_id },
            },
            "Contents" => content_id,
        });
        self.page_ids.push(page_id);
        Ok(())
    }

    /// Slot the image into the current 4-up sheet, opening a fresh sheet when
    /// the slot index wraps to 0.
    fn place_grid(&mut self, page_index: usize, image: EncodedPage) -> Result<(), PaperwhiteError> {
        let slot_index = page_index % 4;
        if slot_index == 0 {
            self.seal_open_sheet()?;
            self.sheet = Some(SheetState { images: Vec::with_capacity(4) });
        }

        let matrix = SLOTS[slot_index].fit(image.width as f32, image.height as f32);
        let name = format!("Im{slot_index}");
        let xobject_id = self.add_image_xobject(image);

        let sheet = self.sheet.as_mut().ok_or_else(|| {
            PaperwhiteError::Internal(format!(
                "no open sheet for page index {page_index} (slot {slot_index})"
            ))
        })?;
        sheet.images.push((name, xobject_id, matrix));
        Ok(())
    }

    /// Emit the open sheet, if any, as an output page. Partial sheets are
    /// emitted as-is.
    fn seal_open_sheet(&mut self) -> Result<(), PaperwhiteError> {
        let Some(sheet) = self.sheet.take() else {
            return Ok(());
        };
        if sheet.images.is_empty() {
            return Ok(());
        }

        let mut operations = Vec::with_capacity(sheet.images.len() * 4);
        let mut xobjects = Dictionary::new();
        for (name, id, matrix) in &sheet.images {
            operations.push(Operation::new("q", vec![]));
            operations.push(Operation::new(
                "cm",
                matrix.iter().map(|&v| v.into()).collect(),
            ));
            operations.push(Operation::new("Do", vec![name.as_str().into()]));
            operations.push(Operation::new("Q", vec![]));
            xobjects.set(name.clone(), Object::Reference(*id));
        }

        let content_id = self.add_content_stream(Content { operations })?;
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                SHEET_WIDTH_PT.into(),
                SHEET_HEIGHT_PT.into(),
            ],
            "Resources" => dictionary! { "XObject" => Object::Dictionary(xobjects) },
            "Contents" => content_id,
        });
        self.page_ids.push(page_id);
        debug!("Sealed sheet with {} image(s)", sheet.images.len());
        Ok(())
    }

    /// Add the image as an XObject stream; the compressed samples move into
    /// the document without copying.
    fn add_image_xobject(&mut self, image: EncodedPage) -> ObjectId {
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width as i64,
            "Height" => image.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        };
        self.doc.add_object(Stream::new(dict, image.data))
    }

    fn add_content_stream(&mut self, content: Content) -> Result<ObjectId, PaperwhiteError> {
        let encoded = content
            .encode()
            .map_err(|e| PaperwhiteError::CompositionFailed {
                detail: format!("content stream encode: {e}"),
            })?;
        Ok(self.doc.add_object(Stream::new(dictionary! {}, encoded)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::encode_page;
    use flate2::read::ZlibDecoder;
    use image::{Rgb, RgbImage};
    use std::io::Read;

    /// Encoded solid-colour page whose first pixel carries a sentinel value.
    fn sentinel_page(width: u32, height: u32, sentinel: u8) -> EncodedPage {
        let mut img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
        img.put_pixel(0, 0, Rgb([sentinel, sentinel, sentinel]));
        encode_page(&img).unwrap()
    }

    fn load(bytes: &[u8]) -> Document {
        Document::load_mem(bytes).expect("output must parse as a PDF")
    }

    /// Page object ids in document page order.
    fn page_ids(doc: &Document) -> Vec<ObjectId> {
        doc.get_pages().into_values().collect()
    }

    fn as_number(object: &Object) -> f32 {
        match object {
            Object::Integer(i) => *i as f32,
            Object::Real(r) => *r,
            other => panic!("expected number, got {other:?}"),
        }
    }

    fn media_box(doc: &Document, page: ObjectId) -> Vec<f32> {
        doc.get_dictionary(page)
            .unwrap()
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(as_number)
            .collect()
    }

    /// XObject (name, object id) pairs of a page, in insertion order.
    fn xobjects(doc: &Document, page: ObjectId) -> Vec<(String, ObjectId)> {
        doc.get_dictionary(page)
            .unwrap()
            .get(b"Resources")
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"XObject")
            .unwrap()
            .as_dict()
            .unwrap()
            .iter()
            .map(|(name, obj)| {
                (
                    String::from_utf8_lossy(name).into_owned(),
                    obj.as_reference().unwrap(),
                )
            })
            .collect()
    }

    fn content_operations(doc: &Document, page: ObjectId) -> Vec<Operation> {
        let content_id = doc
            .get_dictionary(page)
            .unwrap()
            .get(b"Contents")
            .unwrap()
            .as_reference()
            .unwrap();
        let stream = doc.get_object(content_id).unwrap().as_stream().unwrap();
        Content::decode(&stream.content).unwrap().operations
    }

    fn inflate_image(doc: &Document, image_id: ObjectId) -> Vec<u8> {
        let stream = doc.get_object(image_id).unwrap().as_stream().unwrap();
        let mut raw = Vec::new();
        ZlibDecoder::new(stream.content.as_slice())
            .read_to_end(&mut raw)
            .expect("image stream must be valid zlib");
        raw
    }

    #[test]
    fn single_layout_emits_one_sized_page_per_image() {
        let mut compositor = Compositor::new(PageLayout::Single);
        compositor.place(0, sentinel_page(120, 80, 0)).unwrap();
        compositor.place(1, sentinel_page(60, 200, 1)).unwrap();
        compositor.place(2, sentinel_page(300, 300, 2)).unwrap();

        let bytes = compositor.finalize().unwrap().expect("placed pages");
        let doc = load(&bytes);
        let pages = page_ids(&doc);
        assert_eq!(pages.len(), 3);

        assert_eq!(media_box(&doc, pages[0]), vec![0.0, 0.0, 120.0, 80.0]);
        assert_eq!(media_box(&doc, pages[1]), vec![0.0, 0.0, 60.0, 200.0]);
        assert_eq!(media_box(&doc, pages[2]), vec![0.0, 0.0, 300.0, 300.0]);

        for page in &pages {
            let xs = xobjects(&doc, *page);
            assert_eq!(xs.len(), 1);
            assert_eq!(xs[0].0, "Im0");
        }
    }

    #[test]
    fn single_layout_preserves_page_order() {
        let mut compositor = Compositor::new(PageLayout::Single);
        for i in 0..10 {
            compositor.place(i, sentinel_page(4, 4, i as u8)).unwrap();
        }
        let bytes = compositor.finalize().unwrap().unwrap();
        let doc = load(&bytes);

        let pages = page_ids(&doc);
        assert_eq!(pages.len(), 10);
        for (i, page) in pages.iter().enumerate() {
            let (_, image_id) = xobjects(&doc, *page)[0].clone();
            let raw = inflate_image(&doc, image_id);
            assert_eq!(raw[0], i as u8, "page {i} carries the wrong image");
        }
    }

    #[test]
    fn four_up_packs_five_pages_onto_two_sheets() {
        let mut compositor = Compositor::new(PageLayout::FourUp);
        for i in 0..5 {
            compositor.place(i, sentinel_page(100, 100, i as u8)).unwrap();
        }
        let bytes = compositor.finalize().unwrap().unwrap();
        let doc = load(&bytes);

        let pages = page_ids(&doc);
        assert_eq!(pages.len(), 2);
        assert_eq!(media_box(&doc, pages[0]), vec![0.0, 0.0, 595.0, 842.0]);
        assert_eq!(media_box(&doc, pages[1]), vec![0.0, 0.0, 595.0, 842.0]);

        let sheet0 = xobjects(&doc, pages[0]);
        assert_eq!(
            sheet0.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            vec!["Im0", "Im1", "Im2", "Im3"]
        );

        // Partial final sheet: exactly one image, in the top-left slot.
        let sheet1 = xobjects(&doc, pages[1]);
        assert_eq!(sheet1.len(), 1);
        assert_eq!(sheet1[0].0, "Im0");
        let raw = inflate_image(&doc, sheet1[0].1);
        assert_eq!(raw[0], 4, "second sheet must hold input page 4");
    }

    #[test]
    fn four_up_slot_geometry_scales_and_centres() {
        let mut compositor = Compositor::new(PageLayout::FourUp);
        compositor.place(0, sentinel_page(100, 100, 0)).unwrap();
        let bytes = compositor.finalize().unwrap().unwrap();
        let doc = load(&bytes);

        let pages = page_ids(&doc);
        let ops = content_operations(&doc, pages[0]);
        let cm = ops
            .iter()
            .find(|op| op.operator == "cm")
            .expect("placement matrix present");
        let values: Vec<f32> = cm.operands.iter().map(as_number).collect();

        // A square image in a 297.5 × 421 slot scales to 297.5 on both axes,
        // flush left, vertically centred in the top-left quadrant.
        assert!((values[0] - 297.5).abs() < 0.01, "width: {values:?}");
        assert!((values[3] - 297.5).abs() < 0.01, "height: {values:?}");
        assert!((values[4] - 0.0).abs() < 0.01, "tx: {values:?}");
        assert!((values[5] - 482.75).abs() < 0.01, "ty: {values:?}");
    }

    #[test]
    fn four_up_visits_slots_in_reading_order() {
        let mut compositor = Compositor::new(PageLayout::FourUp);
        for i in 0..4 {
            compositor
                .place(i, sentinel_page(200, 280, i as u8))
                .unwrap();
        }
        let bytes = compositor.finalize().unwrap().unwrap();
        let doc = load(&bytes);
        let pages = page_ids(&doc);
        assert_eq!(pages.len(), 1);

        let ops = content_operations(&doc, pages[0]);
        let draws: Vec<String> = ops
            .iter()
            .filter(|op| op.operator == "Do")
            .map(|op| format!("{:?}", op.operands[0]))
            .collect();
        assert_eq!(draws.len(), 4);

        let matrices: Vec<Vec<f32>> = ops
            .iter()
            .filter(|op| op.operator == "cm")
            .map(|op| op.operands.iter().map(as_number).collect())
            .collect();
        // tx, ty per slot: TL, TR, BL, BR.
        assert!(matrices[0][4] < matrices[1][4], "TL left of TR");
        assert!((matrices[0][5] - matrices[1][5]).abs() < 0.01, "top row level");
        assert!(matrices[0][5] > matrices[2][5], "TL above BL");
        assert!(matrices[2][4] < matrices[3][4], "BL left of BR");
    }

    #[test]
    fn image_stream_survives_embedding_bit_exact() {
        let mut img = RgbImage::from_pixel(3, 2, Rgb([255, 255, 255]));
        img.put_pixel(1, 0, Rgb([0, 0, 0]));
        let encoded = encode_page(&img).unwrap();

        let mut compositor = Compositor::new(PageLayout::Single);
        compositor.place(0, encoded).unwrap();
        let bytes = compositor.finalize().unwrap().unwrap();
        let doc = load(&bytes);

        let pages = page_ids(&doc);
        let (_, image_id) = xobjects(&doc, pages[0])[0].clone();
        let image_dict = &doc.get_object(image_id).unwrap().as_stream().unwrap().dict;
        assert_eq!(image_dict.get(b"Width").unwrap().as_i64().unwrap(), 3);
        assert_eq!(image_dict.get(b"Height").unwrap().as_i64().unwrap(), 2);

        assert_eq!(inflate_image(&doc, image_id), *img.as_raw());
    }

    #[test]
    fn finalize_twice_returns_identical_bytes() {
        let mut compositor = Compositor::new(PageLayout::FourUp);
        compositor.place(0, sentinel_page(50, 70, 9)).unwrap();
        compositor.place(1, sentinel_page(50, 70, 8)).unwrap();

        let first = compositor.finalize().unwrap().unwrap();
        let second = compositor.finalize().unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn finalize_without_placements_returns_none() {
        let mut compositor = Compositor::new(PageLayout::Single);
        assert!(compositor.finalize().unwrap().is_none());
        assert!(compositor.finalize().unwrap().is_none());
    }

    #[test]
    fn place_after_finalize_is_rejected() {
        let mut compositor = Compositor::new(PageLayout::Single);
        compositor.place(0, sentinel_page(10, 10, 0)).unwrap();
        compositor.finalize().unwrap();

        let err = compositor.place(1, sentinel_page(10, 10, 1)).unwrap_err();
        assert!(matches!(err, PaperwhiteError::Internal(_)));
    }

    #[test]
    fn output_page_count_formula_holds() {
        for (layout, inputs, expected) in [
            (PageLayout::Single, 1, 1),
            (PageLayout::Single, 7, 7),
            (PageLayout::FourUp, 1, 1),
            (PageLayout::FourUp, 4, 1),
            (PageLayout::FourUp, 5, 2),
            (PageLayout::FourUp, 8, 2),
            (PageLayout::FourUp, 9, 3),
        ] {
            let mut compositor = Compositor::new(layout);
            for i in 0..inputs {
                compositor.place(i, sentinel_page(20, 20, i as u8)).unwrap();
            }
            let bytes = compositor.finalize().unwrap().unwrap();
            let doc = load(&bytes);
            assert_eq!(
                page_ids(&doc).len(),
                expected,
                "{layout:?} with {inputs} inputs"
            );
        }
    }
}
