// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text extraction — runs the preprocessing chain and a recognizer backend over
// frames and scores the result.

use std::sync::Arc;

use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use valid8_core::error::{Result, Valid8Error};

use crate::frame::Frame;
use crate::scan::enhance::ScanEnhancer;

/// Confidence given to a page read from its PDF text layer rather than
/// recognized from pixels.
pub const TEXT_LAYER_CONFIDENCE: f32 = 100.0;

/// One recognized token with the backend's confidence in it (0..=100).
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedWord {
    pub text: String,
    pub confidence: f32,
}

impl RecognizedWord {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// A line of words in reading order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognizedLine {
    pub words: Vec<RecognizedWord>,
}

impl RecognizedLine {
    pub fn new(words: Vec<RecognizedWord>) -> Self {
        Self { words }
    }

    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A text recognition backend. Receives the already preprocessed grayscale
/// frame.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &GrayImage) -> Result<Vec<RecognizedLine>>;
}

/// Text recognized from one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawText {
    pub page_index: usize,
    pub text: String,
    /// Mean word confidence, 0..=100.
    pub confidence: f32,
}

/// Text recognized from every frame of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentText {
    /// Successful pages in frame order.
    pub pages: Vec<RawText>,
    /// Index into `pages` of the highest-confidence page; first wins ties.
    pub canonical: usize,
    /// All page texts joined by newlines, in frame order.
    pub concatenated: String,
}

impl DocumentText {
    pub fn canonical(&self) -> &RawText {
        &self.pages[self.canonical]
    }

    pub fn confidence(&self) -> f32 {
        self.canonical().confidence
    }

    /// The text handed to the field parser: the canonical page, or the whole
    /// document when no page produced a confident token.
    pub fn parse_source(&self) -> &str {
        if self.confidence() > 0.0 {
            &self.canonical().text
        } else {
            &self.concatenated
        }
    }
}

/// Drives a [`TextRecognizer`] over frames.
#[derive(Clone)]
pub struct TextExtractor {
    recognizer: Arc<dyn TextRecognizer>,
}

impl TextExtractor {
    pub fn new(recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self { recognizer }
    }

    /// Extract text and confidence from a single frame.
    ///
    /// # Errors
    ///
    /// [`Valid8Error::ExtractionFailed`] when the frame is empty or the
    /// recognizer fails. Low confidence is not an error.
    ///
    /// A frame carrying a PDF text layer is read from that layer at
    /// [`TEXT_LAYER_CONFIDENCE`]; the recognizer is not consulted.
    #[instrument(skip_all, fields(page = frame.page_index(), width = frame.width(), height = frame.height()))]
    pub fn extract(&self, frame: &Frame) -> Result<RawText> {
        if let Some(layer) = frame.text_layer() {
            let text = layer
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            debug!(chars = text.len(), "frame read from its text layer");
            return Ok(RawText {
                page_index: frame.page_index(),
                text,
                confidence: TEXT_LAYER_CONFIDENCE,
            });
        }

        if frame.is_empty() {
            return Err(Valid8Error::ExtractionFailed(format!(
                "page {} has no pixels",
                frame.page_index()
            )));
        }

        let prepared = ScanEnhancer::from_dynamic(frame.image())
            .prepare_for_ocr()
            .into_gray();

        let lines = self.recognizer.recognize(&prepared).map_err(|err| match err {
            Valid8Error::ExtractionFailed(msg) => Valid8Error::ExtractionFailed(msg),
            other => Valid8Error::ExtractionFailed(format!(
                "recognizer failed on page {}: {}",
                frame.page_index(),
                other
            )),
        })?;

        let text = lines
            .iter()
            .map(RecognizedLine::text)
            .filter(|line| !line.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        let confidence = mean_confidence(lines.iter().flat_map(|l| l.words.iter()));

        debug!(lines = lines.len(), chars = text.len(), confidence, "frame recognized");
        Ok(RawText {
            page_index: frame.page_index(),
            text,
            confidence,
        })
    }

    /// Extract every frame. Frames that fail are skipped with a warning; the
    /// document only fails when none succeed.
    #[instrument(skip_all, fields(frames = frames.len()))]
    pub fn extract_document(&self, frames: &[Frame]) -> Result<DocumentText> {
        let mut pages = Vec::with_capacity(frames.len());
        let mut last_error = None;

        for frame in frames {
            match self.extract(frame) {
                Ok(raw) => pages.push(raw),
                Err(err) => {
                    warn!(page = frame.page_index(), error = %err, "skipping page that failed extraction");
                    last_error = Some(err);
                }
            }
        }

        if pages.is_empty() {
            return Err(match last_error {
                Some(err) => err,
                None => Valid8Error::ExtractionFailed("document has no pages".into()),
            });
        }

        let mut canonical = 0;
        for (index, page) in pages.iter().enumerate() {
            if page.confidence > pages[canonical].confidence {
                canonical = index;
            }
        }
        let concatenated = pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        info!(
            pages = pages.len(),
            canonical_page = pages[canonical].page_index,
            confidence = pages[canonical].confidence,
            "document text extracted"
        );
        Ok(DocumentText {
            pages,
            canonical,
            concatenated,
        })
    }
}

/// Mean of the positive confidences, clamped to 0..=100; 0 when there are none.
fn mean_confidence<'a>(words: impl Iterator<Item = &'a RecognizedWord>) -> f32 {
    let (sum, count) = words
        .map(|w| w.confidence)
        .filter(|c| c.is_finite() && *c > 0.0)
        .fold((0.0f64, 0u32), |(sum, count), c| (sum + c as f64, count + 1));
    if count == 0 {
        return 0.0;
    }
    ((sum / count as f64) as f32).clamp(0.0, 100.0)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{DynamicImage, Luma};
    use std::sync::Mutex;

    /// Returns canned lines per call, in order; errors once the script runs out.
    pub(crate) struct ScriptedRecognizer {
        script: Mutex<Vec<Result<Vec<RecognizedLine>>>>,
    }

    impl ScriptedRecognizer {
        pub(crate) fn new(mut script: Vec<Result<Vec<RecognizedLine>>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
            }
        }
    }

    impl TextRecognizer for ScriptedRecognizer {
        fn recognize(&self, _image: &GrayImage) -> Result<Vec<RecognizedLine>> {
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(Valid8Error::ExtractionFailed("script exhausted".into())))
        }
    }

    pub(crate) fn line(words: &[(&str, f32)]) -> RecognizedLine {
        RecognizedLine::new(
            words
                .iter()
                .map(|(text, conf)| RecognizedWord::new(*text, *conf))
                .collect(),
        )
    }

    fn frame(page: usize) -> Frame {
        Frame::new(page, DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 30, Luma([240]))))
    }

    #[test]
    fn confidence_ignores_non_positive_tokens() {
        let extractor = TextExtractor::new(Arc::new(ScriptedRecognizer::new(vec![Ok(vec![
            line(&[("Bachelor", 90.0), ("of", -1.0)]),
            line(&[("Science", 70.0), ("x", 0.0)]),
        ])])));
        let raw = extractor.extract(&frame(0)).unwrap();
        assert_eq!(raw.text, "Bachelor of\nScience x");
        assert!((raw.confidence - 80.0).abs() < 1e-4);
    }

    #[test]
    fn no_confident_tokens_gives_zero() {
        let extractor = TextExtractor::new(Arc::new(ScriptedRecognizer::new(vec![Ok(vec![
            line(&[("???", 0.0)]),
        ])])));
        assert_eq!(extractor.extract(&frame(0)).unwrap().confidence, 0.0);
    }

    #[test]
    fn confidence_is_clamped() {
        let extractor = TextExtractor::new(Arc::new(ScriptedRecognizer::new(vec![Ok(vec![
            line(&[("x", 250.0)]),
        ])])));
        assert_eq!(extractor.extract(&frame(0)).unwrap().confidence, 100.0);
    }

    #[test]
    fn recognizer_errors_become_extraction_failures() {
        let extractor = TextExtractor::new(Arc::new(ScriptedRecognizer::new(vec![Err(
            Valid8Error::Detector("model crashed".into()),
        )])));
        assert!(matches!(
            extractor.extract(&frame(0)),
            Err(Valid8Error::ExtractionFailed(_))
        ));
    }

    /// Highest confidence wins; the earlier page wins a tie.
    #[test]
    fn canonical_page_prefers_confidence_then_order() {
        let extractor = TextExtractor::new(Arc::new(ScriptedRecognizer::new(vec![
            Ok(vec![line(&[("cover", 40.0)])]),
            Ok(vec![line(&[("degree", 85.0)])]),
            Ok(vec![line(&[("terms", 85.0)])]),
        ])));
        let text = extractor
            .extract_document(&[frame(0), frame(1), frame(2)])
            .unwrap();
        assert_eq!(text.canonical().page_index, 1);
        assert_eq!(text.parse_source(), "degree");
        assert_eq!(text.concatenated, "cover\ndegree\nterms");
    }

    #[test]
    fn failed_pages_are_skipped() {
        let extractor = TextExtractor::new(Arc::new(ScriptedRecognizer::new(vec![
            Err(Valid8Error::ExtractionFailed("blank".into())),
            Ok(vec![line(&[("diploma", 60.0)])]),
        ])));
        let text = extractor.extract_document(&[frame(0), frame(1)]).unwrap();
        assert_eq!(text.pages.len(), 1);
        assert_eq!(text.canonical().page_index, 1);
    }

    #[test]
    fn all_pages_failing_is_an_error() {
        let extractor = TextExtractor::new(Arc::new(ScriptedRecognizer::new(vec![])));
        assert!(matches!(
            extractor.extract_document(&[frame(0), frame(1)]),
            Err(Valid8Error::ExtractionFailed(_))
        ));
    }

    #[test]
    fn text_layer_skips_the_recognizer() {
        // An empty script would fail any recognition call.
        let extractor = TextExtractor::new(Arc::new(ScriptedRecognizer::new(vec![])));
        let page = frame(0).with_text_layer("  Student Name Jane Smith \n\n Year 2024 ");
        let raw = extractor.extract(&page).unwrap();
        assert_eq!(raw.text, "Student Name Jane Smith\nYear 2024");
        assert_eq!(raw.confidence, TEXT_LAYER_CONFIDENCE);
    }

    #[test]
    fn born_digital_pdf_yields_claims() {
        use crate::fields::FieldParser;
        use crate::pdf::reader::tests::{build_pdf, TestPage};
        use crate::pdf::PdfReader;

        let bytes = build_pdf(&[TestPage::Text(&[
            "Student Name Jane Smith",
            "Course Master of Business Administration",
            "Issued by Business College",
            "Year 2024",
        ])]);
        let frames = PdfReader::from_bytes(&bytes).unwrap().rasterize_pages().unwrap();
        let extractor = TextExtractor::new(Arc::new(ScriptedRecognizer::new(vec![])));
        let text = extractor.extract_document(&frames).unwrap();
        assert_eq!(text.confidence(), TEXT_LAYER_CONFIDENCE);

        let claims = FieldParser::new().unwrap().parse(text.parse_source());
        assert_eq!(claims.student_name, "Jane Smith");
        assert_eq!(claims.course, "Master of Business Administration");
        assert_eq!(claims.institution, "Business College");
        assert_eq!(claims.year, "2024");
    }

    #[test]
    fn zero_confidence_parses_whole_document() {
        let extractor = TextExtractor::new(Arc::new(ScriptedRecognizer::new(vec![
            Ok(vec![line(&[("Jane", 0.0)])]),
            Ok(vec![line(&[("Doe", 0.0)])]),
        ])));
        let text = extractor.extract_document(&[frame(0), frame(1)]).unwrap();
        assert_eq!(text.parse_source(), "Jane\nDoe");
    }
}
