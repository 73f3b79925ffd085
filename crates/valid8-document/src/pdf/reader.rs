// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader — parses uploaded PDFs with `lopdf` and rasterizes each page
// from the image XObjects it embeds.
//
// Scanned certificates wrapped in a PDF carry each page as the largest image
// drawn on it. Born-digital pages draw their text as text objects instead;
// they become blank frames sized from the MediaBox (so page numbering is
// preserved) carrying the page's extracted text layer.

use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, instrument, warn};
use valid8_core::error::{Result, Valid8Error};

use crate::frame::Frame;

/// Limit on the Parent chain walked when resolving inherited page attributes.
const MAX_TREE_DEPTH: usize = 32;

/// Resolution used for blank pages (pixels per inch).
const BLANK_PAGE_DPI: f64 = 150.0;

/// US Letter in points, used when a page has no MediaBox.
const DEFAULT_MEDIA_BOX: (f64, f64) = (612.0, 792.0);

/// Refuse embedded images larger than this many pixels.
const MAX_IMAGE_PIXELS: u64 = 80_000_000;

/// Reads PDF documents and turns their pages into raster frames.
pub struct PdfReader {
    /// The underlying lopdf document.
    document: Document,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Parse a PDF already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            Valid8Error::CorruptInput(format!("failed to parse PDF: {}", err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");
        Ok(Self { document })
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    // -- Rasterization --------------------------------------------------------

    /// One frame per page, in page order.
    #[instrument(skip(self), fields(pages = self.page_count()))]
    pub fn rasterize_pages(&self) -> Result<Vec<Frame>> {
        let pages = self.document.get_pages();
        if pages.is_empty() {
            return Err(Valid8Error::CorruptInput("PDF has no pages".into()));
        }

        let mut frames = Vec::with_capacity(pages.len());
        for (index, (page_number, page_id)) in pages.iter().enumerate() {
            let frame = match self.largest_page_image(*page_id)? {
                Some(image) => Frame::new(index, image),
                None => {
                    let blank = Frame::new(index, self.blank_page(*page_id));
                    match self.page_text(*page_number) {
                        Some(text) => {
                            debug!(page_number, chars = text.len(), "page has no raster; using its text layer");
                            blank.with_text_layer(text)
                        }
                        None => {
                            warn!(page_number, "page has no decodable raster or text; using a blank page");
                            blank
                        }
                    }
                }
            };
            debug!(
                page_number,
                width = frame.width(),
                height = frame.height(),
                "page rasterized"
            );
            frames.push(frame);
        }

        info!(frames = frames.len(), "PDF rasterized");
        Ok(frames)
    }

    /// Decode the image XObject covering the most pixels on a page.
    fn largest_page_image(&self, page_id: ObjectId) -> Result<Option<DynamicImage>> {
        let Some(resources) = self
            .inherited(page_id, b"Resources")
            .and_then(|object| object.as_dict().ok())
        else {
            return Ok(None);
        };
        let Some(xobjects) = resources
            .get(b"XObject")
            .ok()
            .and_then(|object| self.resolve(object))
            .and_then(|object| object.as_dict().ok())
        else {
            return Ok(None);
        };

        let mut best: Option<(&Stream, u64)> = None;
        for (_name, entry) in xobjects.iter() {
            let Some(stream) = self.resolve(entry).and_then(|object| object.as_stream().ok())
            else {
                continue;
            };
            if name_of(stream.dict.get(b"Subtype").ok()) != Some(b"Image".as_slice()) {
                continue;
            }
            let (Some(width), Some(height)) = (
                integer_of(stream.dict.get(b"Width").ok()),
                integer_of(stream.dict.get(b"Height").ok()),
            ) else {
                continue;
            };
            let area = width.max(0) as u64 * height.max(0) as u64;
            if best.is_none_or(|(_, current)| area > current) {
                best = Some((stream, area));
            }
        }

        match best {
            Some((stream, _)) => self.decode_image(stream),
            None => Ok(None),
        }
    }

    /// Decode an image XObject. `Ok(None)` means the encoding is not one we
    /// rasterize; malformed data is an error.
    fn decode_image(&self, stream: &Stream) -> Result<Option<DynamicImage>> {
        let dict = &stream.dict;
        let width = integer_of(dict.get(b"Width").ok()).unwrap_or(0);
        let height = integer_of(dict.get(b"Height").ok()).unwrap_or(0);
        if width <= 0 || height <= 0 {
            return Err(Valid8Error::CorruptInput(format!(
                "image XObject has invalid size {width}x{height}"
            )));
        }
        let (width, height) = (width as u32, height as u32);
        if width as u64 * height as u64 > MAX_IMAGE_PIXELS {
            return Err(Valid8Error::CorruptInput(format!(
                "embedded image {width}x{height} exceeds the pixel limit"
            )));
        }

        let filters = self.filters(dict);
        let samples = match filters.as_slice() {
            [] => stream.content.clone(),
            [filter] if filter.as_slice() == b"DCTDecode" => {
                let image = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
                    .map_err(|err| {
                        Valid8Error::CorruptInput(format!("embedded JPEG is unreadable: {}", err))
                    })?;
                return Ok(Some(image));
            }
            [filter] if filter.as_slice() == b"FlateDecode" => {
                stream.decompressed_content().map_err(|err| {
                    Valid8Error::CorruptInput(format!("failed to inflate image stream: {}", err))
                })?
            }
            other => {
                let names: Vec<String> = other
                    .iter()
                    .map(|name| String::from_utf8_lossy(name).into_owned())
                    .collect();
                warn!(filters = ?names, "unsupported image filter chain");
                return Ok(None);
            }
        };

        let is_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
        let bits = if is_mask {
            1
        } else {
            integer_of(dict.get(b"BitsPerComponent").ok()).unwrap_or(8)
        };
        let components = if is_mask {
            Some(1)
        } else {
            self.color_components(dict)
        };

        match bits {
            8 => decode_8bit(&samples, width, height, components),
            1 => decode_1bit(&samples, width, height).map(Some),
            other => {
                warn!(bits = other, "unsupported bits per component");
                Ok(None)
            }
        }
    }

    /// Text drawn on a page as text objects, if there is any.
    fn page_text(&self, page_number: u32) -> Option<String> {
        match self.document.extract_text(&[page_number]) {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(err) => {
                debug!(page_number, error = %err, "text layer unreadable");
                None
            }
        }
    }

    /// Blank white page sized from the MediaBox.
    fn blank_page(&self, page_id: ObjectId) -> DynamicImage {
        let (width_pt, height_pt) = self
            .inherited(page_id, b"MediaBox")
            .and_then(|object| object.as_array().ok())
            .and_then(|values| media_box_size(self, values))
            .unwrap_or(DEFAULT_MEDIA_BOX);
        let scale = BLANK_PAGE_DPI / 72.0;
        let width = ((width_pt * scale).round() as u32).max(1);
        let height = ((height_pt * scale).round() as u32).max(1);
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([255])))
    }

    // -- Object helpers -------------------------------------------------------

    /// Follow indirect references until a direct object is reached.
    fn resolve<'a>(&'a self, object: &'a Object) -> Option<&'a Object> {
        let mut current = object;
        for _ in 0..MAX_TREE_DEPTH {
            match current {
                Object::Reference(id) => current = self.document.get_object(*id).ok()?,
                direct => return Some(direct),
            }
        }
        None
    }

    /// Look up a page attribute, walking up the page tree when the page
    /// itself does not define it.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut node = self.document.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_TREE_DEPTH {
            if let Ok(value) = node.get(key) {
                return self.resolve(value);
            }
            let parent = node.get(b"Parent").ok()?;
            node = self.resolve(parent)?.as_dict().ok()?;
        }
        None
    }

    fn filters(&self, dict: &Dictionary) -> Vec<Vec<u8>> {
        let Some(filter) = dict.get(b"Filter").ok().and_then(|object| self.resolve(object))
        else {
            return Vec::new();
        };
        match filter {
            Object::Name(name) => vec![name.clone()],
            Object::Array(items) => items
                .iter()
                .filter_map(|item| name_of(self.resolve(item)).map(<[u8]>::to_vec))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Number of colour components, or `None` when it must be inferred from
    /// the sample count (ICC-based and indexed spaces).
    fn color_components(&self, dict: &Dictionary) -> Option<usize> {
        let space = dict.get(b"ColorSpace").ok().and_then(|object| self.resolve(object))?;
        match name_of(Some(space))? {
            b"DeviceGray" | b"CalGray" => Some(1),
            b"DeviceRGB" | b"CalRGB" => Some(3),
            b"DeviceCMYK" => Some(4),
            _ => None,
        }
    }
}

fn name_of(object: Option<&Object>) -> Option<&[u8]> {
    match object? {
        Object::Name(name) => Some(name.as_slice()),
        _ => None,
    }
}

fn integer_of(object: Option<&Object>) -> Option<i64> {
    match object? {
        Object::Integer(value) => Some(*value),
        Object::Real(value) => Some(*value as i64),
        _ => None,
    }
}

fn number_of(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(*value as f64),
        _ => None,
    }
}

fn media_box_size(reader: &PdfReader, values: &[Object]) -> Option<(f64, f64)> {
    let numbers: Vec<f64> = values
        .iter()
        .filter_map(|value| reader.resolve(value).and_then(number_of))
        .collect();
    match numbers.as_slice() {
        [x0, y0, x1, y1] if (x1 - x0).abs() > 0.0 && (y1 - y0).abs() > 0.0 => {
            Some(((x1 - x0).abs(), (y1 - y0).abs()))
        }
        _ => None,
    }
}

fn decode_8bit(
    samples: &[u8],
    width: u32,
    height: u32,
    components: Option<usize>,
) -> Result<Option<DynamicImage>> {
    let pixels = width as usize * height as usize;
    let components = match components {
        Some(count) => count,
        None => match samples.len() / pixels.max(1) {
            count @ (1 | 3 | 4) => count,
            _ => {
                warn!(bytes = samples.len(), pixels, "cannot infer colour components");
                return Ok(None);
            }
        },
    };

    let expected = pixels * components;
    if samples.len() < expected {
        return Err(Valid8Error::CorruptInput(format!(
            "image stream truncated: {} of {} bytes",
            samples.len(),
            expected
        )));
    }
    let samples = &samples[..expected];

    let image = match components {
        1 => GrayImage::from_raw(width, height, samples.to_vec()).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(width, height, samples.to_vec()).map(DynamicImage::ImageRgb8),
        4 => {
            let rgb: Vec<u8> = samples
                .chunks_exact(4)
                .flat_map(|cmyk| {
                    let k = 255 - cmyk[3] as u16;
                    [0, 1, 2].map(|i| ((255 - cmyk[i] as u16) * k / 255) as u8)
                })
                .collect();
            RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
        }
        _ => None,
    };
    Ok(image)
}

fn decode_1bit(samples: &[u8], width: u32, height: u32) -> Result<DynamicImage> {
    let row_bytes = (width as usize).div_ceil(8);
    let expected = row_bytes * height as usize;
    if samples.len() < expected {
        return Err(Valid8Error::CorruptInput(format!(
            "bilevel image stream truncated: {} of {} bytes",
            samples.len(),
            expected
        )));
    }

    let mut image = GrayImage::new(width, height);
    for (y, row) in samples.chunks_exact(row_bytes).take(height as usize).enumerate() {
        for x in 0..width as usize {
            let bit = (row[x / 8] >> (7 - (x % 8))) & 1;
            image.put_pixel(x as u32, y as u32, Luma([if bit == 1 { 255 } else { 0 }]));
        }
    }
    Ok(DynamicImage::ImageLuma8(image))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::dictionary;

    /// Content of one synthetic test page.
    pub(crate) enum TestPage {
        /// Unfiltered 8-bit grayscale image of the given size and value.
        Gray { width: u32, height: u32, value: u8 },
        /// Page without any image XObject.
        Empty,
        /// Page drawing one line of Helvetica text per entry, no images.
        Text(&'static [&'static str]),
    }

    /// Build a PDF whose pages draw the given images.
    pub(crate) fn build_pdf(pages: &[TestPage]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();

        for page in pages {
            let mut content = b"q 100 0 0 100 0 0 cm /Im0 Do Q".to_vec();
            let resources = match page {
                TestPage::Gray { width, height, value } => {
                    let pixels = vec![*value; (*width * *height) as usize];
                    let image = Stream::new(
                        dictionary! {
                            "Type" => "XObject",
                            "Subtype" => "Image",
                            "Width" => *width as i64,
                            "Height" => *height as i64,
                            "ColorSpace" => "DeviceGray",
                            "BitsPerComponent" => 8_i64,
                        },
                        pixels,
                    );
                    let image_id = doc.add_object(image);
                    dictionary! { "XObject" => dictionary! { "Im0" => image_id } }
                }
                TestPage::Empty => dictionary! {},
                TestPage::Text(lines) => {
                    content = lines
                        .iter()
                        .enumerate()
                        .map(|(i, line)| format!("BT /F1 10 Tf 10 {} Td ({line}) Tj ET\n", 60 - 12 * i))
                        .collect::<String>()
                        .into_bytes();
                    let font_id = doc.add_object(dictionary! {
                        "Type" => "Font",
                        "Subtype" => "Type1",
                        "BaseFont" => "Helvetica",
                        "Encoding" => "WinAnsiEncoding",
                    });
                    dictionary! { "Font" => dictionary! { "F1" => font_id } }
                }
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0_i64.into(), 0_i64.into(), 144_i64.into(), 72_i64.into()],
                "Contents" => content_id,
                "Resources" => resources,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("serialise test PDF");
        bytes
    }

    #[test]
    fn pages_rasterize_in_order() {
        let bytes = build_pdf(&[
            TestPage::Gray { width: 30, height: 20, value: 10 },
            TestPage::Gray { width: 40, height: 25, value: 200 },
        ]);
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        assert_eq!(reader.page_count(), 2);

        let frames = reader.rasterize_pages().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].page_index(), 0);
        assert_eq!((frames[0].width(), frames[0].height()), (30, 20));
        assert_eq!(frames[1].to_gray().get_pixel(0, 0).0[0], 200);
    }

    /// A page with nothing to rasterize still yields a frame (2in x 1in at 150 dpi).
    #[test]
    fn empty_page_becomes_blank_frame() {
        let bytes = build_pdf(&[TestPage::Empty]);
        let frames = PdfReader::from_bytes(&bytes).unwrap().rasterize_pages().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!((frames[0].width(), frames[0].height()), (300, 150));
        assert_eq!(frames[0].to_gray().get_pixel(10, 10).0[0], 255);
        assert_eq!(frames[0].text_layer(), None);
    }

    #[test]
    fn text_only_page_carries_its_text_layer() {
        let bytes = build_pdf(&[
            TestPage::Text(&["Student Name Jane Smith", "Issued by Business College"]),
            TestPage::Gray { width: 30, height: 20, value: 10 },
        ]);
        let frames = PdfReader::from_bytes(&bytes).unwrap().rasterize_pages().unwrap();
        assert_eq!(frames.len(), 2);

        let text = frames[0].text_layer().expect("text layer");
        assert!(text.contains("Jane Smith"));
        assert!(text.contains("Business College"));
        assert_eq!((frames[0].width(), frames[0].height()), (300, 150));
        assert_eq!(frames[1].text_layer(), None);
    }

    #[test]
    fn garbage_is_corrupt_input() {
        let result = PdfReader::from_bytes(b"%PDF-1.4 this is not a pdf");
        assert!(matches!(result, Err(Valid8Error::CorruptInput(_))));
    }

    #[test]
    fn cmyk_samples_convert_to_rgb() {
        // Pure cyan and pure black.
        let samples = [255, 0, 0, 0, 0, 0, 0, 255];
        let image = decode_8bit(&samples, 2, 1, Some(4)).unwrap().unwrap().to_rgb8();
        assert_eq!(image.get_pixel(0, 0).0, [0, 255, 255]);
        assert_eq!(image.get_pixel(1, 0).0, [0, 0, 0]);
    }

    #[test]
    fn truncated_samples_are_rejected() {
        let result = decode_8bit(&[0u8; 10], 4, 4, Some(1));
        assert!(matches!(result, Err(Valid8Error::CorruptInput(_))));
    }

    #[test]
    fn bilevel_rows_are_unpacked() {
        // 10 pixels wide: first byte 0b1010_0000, second byte 0b1000_0000.
        let image = decode_1bit(&[0b1010_0000, 0b1000_0000], 10, 1).unwrap().to_luma8();
        assert_eq!(image.get_pixel(0, 0).0[0], 255);
        assert_eq!(image.get_pixel(1, 0).0[0], 0);
        assert_eq!(image.get_pixel(2, 0).0[0], 255);
        assert_eq!(image.get_pixel(8, 0).0[0], 255);
        assert_eq!(image.get_pixel(9, 0).0[0], 0);
    }
}
