// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document loader — normalizes an uploaded document into raster frames.
//
// Everything is decoded from memory; no temporary files are created, so there
// is nothing to clean up on any exit path.

use image::{ImageError, ImageFormat};
use tracing::{debug, info, instrument};
use valid8_core::error::{Result, Valid8Error};
use valid8_core::types::{Document, MediaType};

use crate::frame::Frame;
use crate::pdf::PdfReader;

/// Turns documents into frames: one per PDF page, one for a plain image.
pub struct DocumentLoader;

impl DocumentLoader {
    /// Decode `document` into its ordered frames.
    ///
    /// # Errors
    ///
    /// [`Valid8Error::UnsupportedFormat`] when the media type has no decoder,
    /// [`Valid8Error::CorruptInput`] when the bytes cannot be decoded.
    #[instrument(skip_all, fields(media_type = %document.media_type().mime_type(), bytes = document.len()))]
    pub fn load(document: &Document) -> Result<Vec<Frame>> {
        if document.is_empty() {
            return Err(Valid8Error::CorruptInput("document is empty".into()));
        }

        let frames = match document.media_type() {
            MediaType::Pdf => PdfReader::from_bytes(document.bytes())?.rasterize_pages()?,
            other => {
                let format = image_format(other).ok_or_else(|| {
                    Valid8Error::UnsupportedFormat(other.mime_type().to_owned())
                })?;
                let image = image::load_from_memory_with_format(document.bytes(), format)
                    .map_err(|err| match err {
                        ImageError::Unsupported(detail) => {
                            Valid8Error::UnsupportedFormat(detail.to_string())
                        }
                        other => Valid8Error::CorruptInput(format!(
                            "failed to decode {}: {}",
                            document.media_type().mime_type(),
                            other
                        )),
                    })?;
                debug!(width = image.width(), height = image.height(), "image decoded");
                vec![Frame::new(0, image)]
            }
        };

        info!(frames = frames.len(), "document loaded");
        Ok(frames)
    }
}

fn image_format(media_type: &MediaType) -> Option<ImageFormat> {
    match media_type {
        MediaType::Png => Some(ImageFormat::Png),
        MediaType::Jpeg => Some(ImageFormat::Jpeg),
        MediaType::Tiff => Some(ImageFormat::Tiff),
        MediaType::Bmp => Some(ImageFormat::Bmp),
        MediaType::Gif => Some(ImageFormat::Gif),
        MediaType::Webp => Some(ImageFormat::WebP),
        MediaType::Pdf | MediaType::Other(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::reader::tests::{TestPage, build_pdf};
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;

    fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), format)
            .expect("encode test image");
        bytes
    }

    /// Every supported raster format yields exactly one frame.
    #[test]
    fn single_images_yield_one_frame() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(24, 16, Rgb([250, 250, 250])));
        for (format, media_type) in [
            (ImageFormat::Png, MediaType::Png),
            (ImageFormat::Jpeg, MediaType::Jpeg),
            (ImageFormat::Bmp, MediaType::Bmp),
            (ImageFormat::Tiff, MediaType::Tiff),
        ] {
            let document = Document::new(encode(&image, format), media_type.clone());
            let frames = DocumentLoader::load(&document).unwrap();
            assert_eq!(frames.len(), 1, "{media_type:?}");
            assert_eq!((frames[0].width(), frames[0].height()), (24, 16));
        }
    }

    #[test]
    fn pdf_yields_frame_per_page() {
        let bytes = build_pdf(&[
            TestPage::Gray { width: 10, height: 10, value: 0 },
            TestPage::Empty,
            TestPage::Gray { width: 12, height: 8, value: 90 },
        ]);
        let frames = DocumentLoader::load(&Document::new(bytes, MediaType::Pdf)).unwrap();
        let indices: Vec<usize> = frames.iter().map(Frame::page_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!((frames[2].width(), frames[2].height()), (12, 8));
    }

    #[test]
    fn unknown_media_type_is_unsupported() {
        let document = Document::new(b"PK\x03\x04".to_vec(), MediaType::from_extension("docx"));
        assert!(matches!(
            DocumentLoader::load(&document),
            Err(Valid8Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn truncated_png_is_corrupt() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(32, 32));
        let mut bytes = encode(&image, ImageFormat::Png);
        bytes.truncate(bytes.len() / 2);
        let document = Document::new(bytes, MediaType::Png);
        assert!(matches!(
            DocumentLoader::load(&document),
            Err(Valid8Error::CorruptInput(_))
        ));
    }

    #[test]
    fn empty_document_is_corrupt() {
        let document = Document::new(Vec::new(), MediaType::Png);
        assert!(matches!(
            DocumentLoader::load(&document),
            Err(Valid8Error::CorruptInput(_))
        ));
    }
}
