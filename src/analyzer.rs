use crate::decode::ImageDecoder;
use crate::image_discovery::{ImageSource, PageImageDiscovery};
use crate::{ExtractError, ExtractedImage, ExtractionSummary, ExtractorConfig, Result};
use image::DynamicImage;
use lopdf::{Document, ObjectId};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

// ── PageImage ────────────────────────────────────────────────────────────────

/// An image drawn by a page, not yet decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    /// 1-based page number.
    pub page: u32,

    /// 1-based position among the images the page draws.
    pub index: usize,

    /// The image XObject or inline image holding the data.
    pub source: ImageSource,
}

/// MD5 over an image's decoded pixels and their layout, so the same picture
/// matches however its stream was compressed.
fn pixel_digest(image: &DynamicImage) -> [u8; 16] {
    let color = image.color();
    let mut context = md5::Context::new();
    context.consume(image.width().to_be_bytes());
    context.consume(image.height().to_be_bytes());
    context.consume([color.channel_count(), color.bytes_per_pixel()]);
    context.consume(image.as_bytes());
    context.compute().0
}

// ── PdfAnalyzer ──────────────────────────────────────────────────────────────

/// Entry point for extracting the images of one PDF document.
///
/// # Creating an analyzer
///
/// ```no_run
/// use eximgpdf::{PdfAnalyzer, ExtractorConfig};
///
/// // From a file path
/// let a = PdfAnalyzer::from_path("scan.pdf").unwrap();
///
/// // From an in-memory buffer
/// let bytes = std::fs::read("scan.pdf").unwrap();
/// let a = PdfAnalyzer::from_bytes(&bytes).unwrap();
///
/// // With custom configuration
/// let cfg = ExtractorConfig {
///     strict_decoding: true,
///     ..Default::default()
/// };
/// let a = PdfAnalyzer::with_config("scan.pdf", cfg).unwrap();
/// ```
pub struct PdfAnalyzer {
    document: Document,
    config: ExtractorConfig,
}

impl PdfAnalyzer {
    // ── Constructors ──────────────────────────────────────────────────────────

    /// Load a PDF from the file system.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_config(path, ExtractorConfig::default())
    }

    /// Load a PDF from an in-memory byte slice.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::open(Document::load_mem(data)?, ExtractorConfig::default())
    }

    /// Load a PDF from the file system with a custom [`ExtractorConfig`].
    pub fn with_config<P: AsRef<Path>>(path: P, config: ExtractorConfig) -> Result<Self> {
        Self::open(Document::load(path)?, config)
    }

    /// Only the empty password is ever tried. lopdf's loader already applies
    /// it and strips `/Encrypt` when it works, so a document still encrypted
    /// here needs a real password and is refused with
    /// [`ExtractError::Decrypt`].
    fn open(mut document: Document, config: ExtractorConfig) -> Result<Self> {
        if document.is_encrypted() {
            document
                .decrypt("")
                .map_err(|e| ExtractError::Decrypt(e.to_string()))?;
        }
        Ok(Self { document, config })
    }

    // ── Pages ─────────────────────────────────────────────────────────────────

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// The images drawn by page `page` (1-based), in paint order.
    ///
    /// Returns an empty list for a page number outside the document.
    pub fn page_images(&self, page: u32) -> Vec<PageImage> {
        match self.document.get_pages().get(&page) {
            Some(&page_id) => self.images_of(page, page_id),
            None => Vec::new(),
        }
    }

    fn images_of(&self, page: u32, page_id: ObjectId) -> Vec<PageImage> {
        PageImageDiscovery::new(&self.document)
            .collect_page_images(page_id)
            .into_iter()
            .enumerate()
            .map(|(i, source)| PageImage {
                page,
                index: i + 1,
                source,
            })
            .collect()
    }

    /// Decode a single image found by [`page_images`](Self::page_images).
    pub fn decode_image(&self, image: &PageImage) -> Result<ExtractedImage> {
        let decoder = ImageDecoder::new(&self.document);
        let decoded = match &image.source {
            ImageSource::XObject(id) => decoder.decode(self.document.get_object(*id)?.as_stream()?)?,
            ImageSource::Inline(stream) => decoder.decode(stream)?,
        };
        Ok(ExtractedImage {
            page: image.page,
            index: image.index,
            image: decoded,
        })
    }

    // ── Extraction ────────────────────────────────────────────────────────────

    /// Write every distinct image of the document into `output_dir` as
    /// `p<page>_i<index>.png`.
    ///
    /// Images whose decoded pixels were already written for this document are
    /// skipped. The directory is only created once there is something to
    /// write. Images with an unsupported encoding are skipped with a warning,
    /// or abort the extraction when [`ExtractorConfig::strict_decoding`] is
    /// set.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use eximgpdf::PdfAnalyzer;
    ///
    /// let analyzer = PdfAnalyzer::from_path("scan.pdf").unwrap();
    /// let summary = analyzer.extract_images("scan").unwrap();
    /// println!("{} written, {} duplicates", summary.written.len(), summary.duplicates);
    /// ```
    pub fn extract_images<P: AsRef<Path>>(&self, output_dir: P) -> Result<ExtractionSummary> {
        let output_dir = output_dir.as_ref();
        let mut seen: HashSet<[u8; 16]> = HashSet::new();
        let mut summary = ExtractionSummary::default();

        for (&page, &page_id) in &self.document.get_pages() {
            summary.pages += 1;
            for found in self.images_of(page, page_id) {
                let image = match self.decode_image(&found) {
                    Ok(image) => image,
                    Err(ExtractError::UnsupportedImage(reason)) if !self.config.strict_decoding => {
                        warn!(page, index = found.index, %reason, "skipping image");
                        summary.unsupported += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                if !seen.insert(pixel_digest(&image.image)) {
                    debug!(page, index = found.index, "skipping duplicate image");
                    summary.duplicates += 1;
                    continue;
                }

                let dest = output_dir.join(image.file_name());
                info!(path = %dest.display(), "creating");
                summary.written.push(image.save_to_disk(output_dir)?);
            }
        }

        Ok(summary)
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    /// Returns a reference to the active [`ExtractorConfig`].
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }
}
