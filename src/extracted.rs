use crate::Result;
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};

// ── ExtractedImage ───────────────────────────────────────────────────────────

/// A decoded image taken from one page of a PDF document.
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    /// 1-based page number the image was drawn on.
    pub page: u32,

    /// 1-based position of the image among the images drawn by that page,
    /// duplicates included.
    pub index: usize,

    /// The decoded pixels.
    pub image: DynamicImage,
}

impl ExtractedImage {
    /// The output file name, `p<page>_i<index>.png`.
    ///
    /// ```
    /// # use eximgpdf::ExtractedImage;
    /// # let image = ExtractedImage { page: 3, index: 2, image: image::DynamicImage::new_luma8(1, 1) };
    /// assert_eq!(image.file_name(), "p3_i2.png");
    /// ```
    pub fn file_name(&self) -> String {
        format!("p{}_i{}.png", self.page, self.index)
    }

    /// Write this image as a PNG into `output_dir`, creating the directory if
    /// necessary, and return the path written. An existing file is replaced.
    pub fn save_to_disk<P: AsRef<Path>>(&self, output_dir: P) -> Result<PathBuf> {
        let dir = output_dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let dest = dir.join(self.file_name());
        self.image.save_with_format(&dest, ImageFormat::Png)?;
        Ok(dest)
    }
}

// ── ExtractionSummary ────────────────────────────────────────────────────────

/// What [`crate::PdfAnalyzer::extract_images`] did with one document.
#[derive(Debug, Clone, Default)]
pub struct ExtractionSummary {
    /// Number of pages examined.
    pub pages: usize,

    /// Every PNG written, in the order written.
    pub written: Vec<PathBuf>,

    /// Images skipped because identical image data was already written.
    pub duplicates: usize,

    /// Images skipped because their encoding is not supported.
    pub unsupported: usize,
}

impl ExtractionSummary {
    /// Total number of images found, written or not.
    pub fn images_found(&self) -> usize {
        self.written.len() + self.duplicates + self.unsupported
    }
}
