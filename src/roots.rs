use crate::{ExtractError, Result};
use std::fmt;
use std::path::{Path, PathBuf};

// ── CanonicalPath ─────────────────────────────────────────────────────────────

/// An absolute, symlink-resolved filesystem path.
///
/// Two `CanonicalPath`s are equal exactly when they name the same entry, which
/// makes them safe to compare for ancestry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalPath(PathBuf);

impl CanonicalPath {
    /// Canonicalize `path`, failing when it does not exist or cannot be read.
    pub fn resolve<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        std::fs::canonicalize(path)
            .map(Self)
            .map_err(|source| ExtractError::Resolve {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Returns `true` when `self` lies within the subtree rooted at `other`.
    ///
    /// The comparison is component-wise, so `/a/bc` is not inside `/a/b`.
    /// A path is its own descendant.
    pub fn is_descendant_of(&self, other: &CanonicalPath) -> bool {
        self.0.starts_with(&other.0)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for CanonicalPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.display().fmt(f)
    }
}

// ── RootSet ───────────────────────────────────────────────────────────────────

/// A set of canonical paths in which no member is an ancestor of another.
///
/// ```no_run
/// use eximgpdf::RootSet;
///
/// let roots = RootSet::reduce(&["docs", "docs/2019", "scans"]).unwrap();
/// assert_eq!(roots.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RootSet {
    roots: Vec<CanonicalPath>,
}

impl RootSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonicalize every path and reduce the result to non-overlapping roots.
    ///
    /// Fails on the first path that cannot be resolved; no partial set is
    /// returned.
    pub fn reduce<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut set = Self::new();
        for path in paths {
            set.insert(CanonicalPath::resolve(path)?);
        }
        Ok(set)
    }

    /// Add `candidate` unless an existing member already covers it.
    ///
    /// Members that lie under `candidate` are dropped. Returns `true` when the
    /// candidate became a member.
    pub fn insert(&mut self, candidate: CanonicalPath) -> bool {
        if self.roots.contains(&candidate) {
            return false;
        }

        let mut i = 0;
        while i < self.roots.len() {
            let member = &self.roots[i];
            let below = candidate.is_descendant_of(member);
            let above = member.is_descendant_of(&candidate);
            if below && !above {
                return false;
            }
            if above && !below {
                self.roots.swap_remove(i);
                continue;
            }
            i += 1;
        }

        self.roots.push(candidate);
        true
    }

    pub fn contains(&self, path: &CanonicalPath) -> bool {
        self.roots.contains(path)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanonicalPath> {
        self.roots.iter()
    }
}

impl<'a> IntoIterator for &'a RootSet {
    type Item = &'a CanonicalPath;
    type IntoIter = std::slice::Iter<'a, CanonicalPath>;

    fn into_iter(self) -> Self::IntoIter {
        self.roots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical(p: &str) -> CanonicalPath {
        CanonicalPath(PathBuf::from(p))
    }

    #[test]
    fn descendant_check_is_component_wise() {
        assert!(canonical("/a/b/c").is_descendant_of(&canonical("/a/b")));
        assert!(!canonical("/a/bc").is_descendant_of(&canonical("/a/b")));
        assert!(!canonical("/a").is_descendant_of(&canonical("/a/b")));
    }

    #[test]
    fn insert_drops_every_covered_member() {
        let mut set = RootSet::new();
        assert!(set.insert(canonical("/a/x")));
        assert!(set.insert(canonical("/a/y")));
        assert!(set.insert(canonical("/b")));
        assert!(set.insert(canonical("/a")));

        assert_eq!(set.len(), 2);
        assert!(set.contains(&canonical("/a")));
        assert!(set.contains(&canonical("/b")));
    }

    #[test]
    fn insert_rejects_duplicates_and_descendants() {
        let mut set = RootSet::new();
        assert!(set.insert(canonical("/a")));
        assert!(!set.insert(canonical("/a")));
        assert!(!set.insert(canonical("/a/b/c")));
        assert_eq!(set.len(), 1);
    }
}
