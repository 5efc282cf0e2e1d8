use crate::natural::natural_cmp;
use crate::{ExtractError, Result, RootSet};
use std::path::PathBuf;
use walkdir::{DirEntry, WalkDir};

/// Walk every root and return the files whose name ends with `suffix`,
/// compared case-insensitively, in natural order.
///
/// Entries whose name starts with `.` are skipped, and hidden directories are
/// not descended into. A root itself is never treated as hidden, since it was
/// named explicitly. Symbolic links are not followed.
///
/// Fails on the first traversal error.
pub fn collect_files(roots: &RootSet, suffix: &str) -> Result<Vec<PathBuf>> {
    let suffix = suffix.to_ascii_lowercase();
    let mut files = Vec::new();

    for root in roots {
        let walker = WalkDir::new(root).into_iter().filter_entry(|e| !is_hidden(e));
        for entry in walker {
            let entry = entry.map_err(|source| ExtractError::Traversal {
                root: root.as_path().to_path_buf(),
                source,
            })?;
            if entry.file_type().is_file() && has_suffix(&entry, &suffix) {
                files.push(entry.into_path());
            }
        }
    }

    files.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
    Ok(files)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// `suffix` must already be lowercase.
fn has_suffix(entry: &DirEntry, suffix: &str) -> bool {
    entry
        .file_name()
        .to_string_lossy()
        .to_ascii_lowercase()
        .ends_with(suffix)
}
