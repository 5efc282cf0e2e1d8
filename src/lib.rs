//! # eximgpdf
//!
//! A Rust library for pulling the embedded raster images out of PDF documents.
//!
//! ## What this crate does
//!
//! 1. **Normalize paths** — every input path is canonicalized and the set is
//!    reduced to non-overlapping roots, so no subtree is visited twice.
//! 2. **Collect documents** — each root is walked, hidden entries are skipped,
//!    and files ending in `.pdf` (any case) are gathered in natural order.
//! 3. **Extract images** — every page of every document is searched for image
//!    XObjects and inline images; identical pictures are written only once
//!    per document.
//! 4. **Write PNGs** — for `X.pdf` the images land in `X/p<page>_i<index>.png`.
//!
//! ## Quick example
//!
//! ```no_run
//! use eximgpdf::{extract_images, ExtractorConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let summary = extract_images(&["./scans"], &ExtractorConfig::default())?;
//! println!("{} image(s) from {} document(s)", summary.images_written, summary.documents);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use thiserror::Error;

mod analyzer;
mod batch;
mod collector;
mod decode;
mod extracted;
mod image_discovery;
mod natural;
mod pdf_utils;
mod roots;

pub use analyzer::{PageImage, PdfAnalyzer};
pub use batch::{extract_images, output_directory_for, process_file, BatchSummary};
pub use collector::collect_files;
pub use extracted::{ExtractedImage, ExtractionSummary};
pub use image_discovery::ImageSource;
pub use natural::natural_cmp;
pub use roots::{CanonicalPath, RootSet};

/// Suffix of the documents this crate looks for.
pub const PDF_SUFFIX: &str = ".pdf";

// ── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration for [`extract_images`] and [`PdfAnalyzer`].
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// File-name suffix the collector matches, compared case-insensitively.
    pub suffix: String,

    /// When `true`, an image whose encoding or color space cannot be decoded
    /// aborts the run with [`ExtractError::UnsupportedImage`]. When `false`
    /// such images are skipped with a warning.
    pub strict_decoding: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            suffix: PDF_SUFFIX.to_string(),
            strict_decoding: false,
        }
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

/// Every error that this crate can produce.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// A filesystem I/O error occurred (e.g. when creating an output directory).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// An input path does not exist or cannot be canonicalized.
    #[error("cannot resolve '{}': {source}", path.display())]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Walking a root directory failed.
    #[error("failed to traverse '{}': {source}", root.display())]
    Traversal {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// The underlying lopdf parser returned an error.
    #[error("PDF parse error: {0}")]
    ParseError(#[from] lopdf::Error),

    /// The document is encrypted and the empty password does not open it.
    #[error("unable to decrypt: {0}")]
    Decrypt(String),

    /// The image uses an encoding or color space this crate cannot decode.
    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    /// The image dictionary or its sample data is malformed.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// JPEG decoding or PNG encoding failed.
    #[error("image codec error: {0}")]
    ImageError(#[from] image::ImageError),

    /// Processing a single document failed.
    #[error("{}: {source}", path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: Box<ExtractError>,
    },
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ExtractError>;
