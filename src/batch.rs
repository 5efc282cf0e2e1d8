use crate::{collect_files, ExtractError, ExtractionSummary, ExtractorConfig, PdfAnalyzer, Result, RootSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Totals over every document handled by [`extract_images`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub documents: usize,
    pub pages: usize,
    pub images_written: usize,
    pub duplicates: usize,
    pub unsupported: usize,
}

impl BatchSummary {
    fn add(&mut self, document: &ExtractionSummary) {
        self.documents += 1;
        self.pages += document.pages;
        self.images_written += document.written.len();
        self.duplicates += document.duplicates;
        self.unsupported += document.unsupported;
    }
}

/// Extract the images of every PDF found under `paths`.
///
/// An empty `paths` means the current working directory. Paths are reduced
/// to non-overlapping roots first, so a file reachable from two inputs is
/// processed once. Documents are handled one at a time in natural order and
/// the first failure ends the run.
pub fn extract_images<P: AsRef<Path>>(paths: &[P], config: &ExtractorConfig) -> Result<BatchSummary> {
    let roots = if paths.is_empty() {
        RootSet::reduce([std::env::current_dir()?])?
    } else {
        RootSet::reduce(paths)?
    };
    debug!(roots = roots.len(), "reduced input paths");

    let files = collect_files(&roots, &config.suffix)?;
    debug!(files = files.len(), "collected documents");

    let mut summary = BatchSummary::default();
    for file in &files {
        let document = process_file(file, config).map_err(|source| ExtractError::Document {
            path: file.clone(),
            source: Box::new(source),
        })?;
        summary.add(&document);
    }
    Ok(summary)
}

/// Extract the images of one document into [`output_directory_for`] it.
pub fn process_file<P: AsRef<Path>>(path: P, config: &ExtractorConfig) -> Result<ExtractionSummary> {
    let path = path.as_ref();
    info!(path = %path.display(), "examining");
    let analyzer = PdfAnalyzer::with_config(path, config.clone())?;
    analyzer.extract_images(output_directory_for(path))
}

/// The directory a document's images are written to: the document's own
/// path without its extension, so `scans/a.pdf` maps to `scans/a`.
pub fn output_directory_for<P: AsRef<Path>>(path: P) -> PathBuf {
    path.as_ref().with_extension("")
}
