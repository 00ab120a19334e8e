//! Safe resolution of library-relative identifiers into absolute paths.
//!
//! Catalog rows and upload headers carry paths relative to a base directory
//! (the library root or the resources root). [`PathResolver::resolve`]
//! normalizes them lexically and refuses anything that would land outside
//! the base, before any filesystem access happens.
//! [`PathResolver::resolve_existing`] additionally follows symlinks and is
//! used wherever a file is about to be served.

use std::path::{Path, PathBuf};

use crate::error::CoreError;

/// Characters refused inside a single path segment, in addition to NUL and
/// other control characters.
pub const ILLEGAL_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*', '\\'];

/// Resolves relative segments against a fixed base directory.
#[derive(Debug, Clone)]
pub struct PathResolver {
    base: PathBuf,
}

impl PathResolver {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Join `segments` onto the base directory.
    ///
    /// Each segment may itself contain `/` separators. Empty and `.`
    /// components are dropped, `..` removes the previous component. Climbing
    /// above the base, absolute segments and illegal characters all fail with
    /// [`CoreError::PathTraversal`]. Purely lexical: the filesystem is not
    /// touched.
    pub fn resolve<I, S>(&self, segments: I) -> Result<PathBuf, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parts: Vec<&str> = Vec::new();
        let segments: Vec<S> = segments.into_iter().collect();

        for segment in &segments {
            let segment = segment.as_ref();
            if segment.starts_with('/') {
                return Err(CoreError::PathTraversal(format!(
                    "absolute path '{segment}' is not allowed"
                )));
            }

            for component in segment.split('/') {
                match component {
                    "" | "." => {}
                    ".." => {
                        if parts.pop().is_none() {
                            return Err(CoreError::PathTraversal(format!(
                                "'{segment}' escapes the base directory"
                            )));
                        }
                    }
                    name => {
                        validate_filename(name)?;
                        parts.push(name);
                    }
                }
            }
        }

        let mut resolved = self.base.clone();
        resolved.extend(parts);
        Ok(resolved)
    }

    /// Like [`resolve`](Self::resolve), then canonicalize the result and make
    /// sure symlinks do not point outside the canonical base.
    ///
    /// A missing target yields [`CoreError::SourceMissing`].
    pub async fn resolve_existing<I, S>(&self, segments: I) -> Result<PathBuf, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let path = self.resolve(segments)?;

        let canonical = tokio::fs::canonicalize(&path)
            .await
            .map_err(|e| CoreError::from_source_io(e, &path))?;
        let canonical_base = tokio::fs::canonicalize(&self.base)
            .await
            .map_err(|e| CoreError::from_source_io(e, &self.base))?;

        if !canonical.starts_with(&canonical_base) {
            let relative = path.strip_prefix(&self.base).unwrap_or(&path);
            return Err(CoreError::PathTraversal(format!(
                "'{}' resolves outside the base directory",
                relative.display()
            )));
        }

        Ok(path)
    }
}

/// Reject a single filename that the target filesystem cannot hold.
pub fn validate_filename(name: &str) -> Result<(), CoreError> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(CoreError::PathTraversal(format!(
            "'{name}' is not a valid file name"
        )));
    }
    if name.contains('/') {
        return Err(CoreError::PathTraversal(format!(
            "file name '{name}' must not contain '/'"
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| c.is_control() || ILLEGAL_FILENAME_CHARS.contains(c))
    {
        return Err(CoreError::PathTraversal(format!(
            "file name '{name}' contains illegal character {c:?}"
        )));
    }
    Ok(())
}

/// Replace characters that cannot appear in a file name with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c == '/' || c.is_control() || ILLEGAL_FILENAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn resolves_nested_segments_under_base() {
        let resolver = PathResolver::new("/library");
        let path = resolver.resolve(["roms/gba", "Game (USA).gba"]).unwrap();
        assert_eq!(path, PathBuf::from("/library/roms/gba/Game (USA).gba"));
    }

    #[test]
    fn dot_components_are_normalized() {
        let resolver = PathResolver::new("/library");
        let path = resolver.resolve(["roms/./psx/../gba//", "a.gba"]).unwrap();
        assert_eq!(path, PathBuf::from("/library/roms/gba/a.gba"));
    }

    #[test]
    fn parent_escape_is_rejected() {
        // The base does not exist; rejection must not depend on the filesystem.
        let resolver = PathResolver::new("/definitely/not/a/real/dir");
        assert_matches!(
            resolver.resolve(["../../etc/passwd"]),
            Err(CoreError::PathTraversal(_))
        );
    }

    #[test]
    fn escape_after_descending_is_rejected() {
        let resolver = PathResolver::new("/library");
        assert_matches!(
            resolver.resolve(["roms", "../../secret"]),
            Err(CoreError::PathTraversal(_))
        );
    }

    #[test]
    fn absolute_segment_is_rejected() {
        let resolver = PathResolver::new("/library");
        assert_matches!(
            resolver.resolve(["/etc/passwd"]),
            Err(CoreError::PathTraversal(_))
        );
    }

    #[test]
    fn illegal_characters_are_rejected() {
        let resolver = PathResolver::new("/library");
        for bad in ["a\0b", "what?.bin", "c:evil", "x|y", "tab\there"] {
            assert_matches!(
                resolver.resolve(["roms", bad]),
                Err(CoreError::PathTraversal(_)),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn sanitize_replaces_illegal_characters() {
        assert_eq!(sanitize_filename("Zelda: A/B?.zip"), "Zelda_ A_B_.zip");
        assert_eq!(sanitize_filename("  plain.gba "), "plain.gba");
    }

    #[tokio::test]
    async fn resolve_existing_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = PathResolver::new(dir.path());
        assert_matches!(
            resolver.resolve_existing(["nope.bin"]).await,
            Err(CoreError::SourceMissing { .. })
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn resolve_existing_rejects_escaping_symlink() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret"), b"x").unwrap();

        let base = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret"), base.path().join("link"))
            .unwrap();

        let resolver = PathResolver::new(base.path());
        assert_matches!(
            resolver.resolve_existing(["link"]).await,
            Err(CoreError::PathTraversal(_))
        );
    }
}
