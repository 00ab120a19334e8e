//! Streaming-ZIP manifests for the reverse proxy.
//!
//! In proxied mode the application never touches file contents for
//! multi-file downloads. It answers with `X-Archive-Files: zip` and a body
//! of one line per archive member:
//!
//! ```text
//! <crc32> <size> <percent-encoded location> <archive filename>
//! ```
//!
//! Lines are separated by `\n`. The proxy (nginx `mod_zip`) fetches every
//! location through its own internal routes and streams the ZIP. A CRC of
//! `-` tells the proxy to compute it. Generated members have no file on
//! disk and are referenced inline through `/decode?value=<base64>`.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::entries::{crc32_to_hex, SourceFile, SyntheticEntry};
use crate::error::CoreError;

/// Response header that switches the proxy into ZIP-streaming mode.
pub const ARCHIVE_FILES_HEADER: &str = "x-archive-files";

/// Value of [`ARCHIVE_FILES_HEADER`].
pub const ARCHIVE_FILES_ZIP: &str = "zip";

/// Internal proxy route that decodes inline content.
pub const INLINE_DECODE_PREFIX: &str = "/decode?value=";

/// Placeholder CRC when the checksum is unknown.
const UNKNOWN_CRC: &str = "-";

/// Unreserved characters and `/` stay literal; everything else is escaped.
const LOCATION_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

/// One member of a deferred archive. Holds no file bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLine {
    pub crc32: Option<String>,
    pub size_bytes: u64,
    pub encoded_location: String,
    pub filename: String,
}

impl fmt::Display for ManifestLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.crc32.as_deref().unwrap_or(UNKNOWN_CRC),
            self.size_bytes,
            self.encoded_location,
            self.filename
        )
    }
}

/// Describe `files` followed by `synthetic` entries.
///
/// Every file is stat'ed for its current size, so a member deleted since it
/// was cataloged fails with [`CoreError::SourceMissing`] instead of producing
/// a line the proxy cannot resolve. Checksums come from the catalog.
pub async fn encode(
    files: &[SourceFile],
    synthetic: &[SyntheticEntry],
    location_prefix: &str,
) -> Result<Vec<ManifestLine>, CoreError> {
    let mut lines = Vec::with_capacity(files.len() + synthetic.len());
    let prefix = location_prefix.trim_end_matches('/');

    for file in files {
        let metadata = tokio::fs::metadata(&file.absolute_path).await.map_err(|e| {
            let err = CoreError::from_source_io(e, &file.absolute_path);
            if matches!(err, CoreError::SourceMissing { .. }) {
                tracing::error!(
                    path = %file.absolute_path.display(),
                    file_id = file.file_id,
                    "Manifest member not found on disk",
                );
            }
            err
        })?;

        lines.push(ManifestLine {
            crc32: file.crc_hash.clone().filter(|crc| !crc.is_empty()),
            size_bytes: metadata.len(),
            encoded_location: quote(&format!("{prefix}/{}", file.relative_path)),
            filename: file.archive_name.clone(),
        });
    }

    lines.extend(synthetic.iter().map(inline_line));
    Ok(lines)
}

/// Manifest line carrying `entry` inline.
pub fn inline_line(entry: &SyntheticEntry) -> ManifestLine {
    ManifestLine {
        crc32: Some(crc32_to_hex(entry.crc32())),
        size_bytes: entry.size(),
        encoded_location: format!("{INLINE_DECODE_PREFIX}{}", BASE64.encode(&entry.content)),
        filename: entry.name.clone(),
    }
}

/// Serialize lines into the response body.
pub fn render(lines: &[ManifestLine]) -> String {
    lines
        .iter()
        .map(ManifestLine::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Percent-encode `value`, keeping unreserved characters and `/`.
pub fn quote(value: &str) -> String {
    utf8_percent_encode(value, LOCATION_ENCODE_SET).to_string()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use assert_matches::assert_matches;

    use super::*;

    fn source(dir: &Path, name: &str, crc: Option<&str>) -> SourceFile {
        SourceFile {
            file_id: 1,
            archive_name: name.to_string(),
            relative_path: format!("roms/psx/My Game/{name}"),
            absolute_path: dir.join(name),
            crc_hash: crc.map(str::to_string),
        }
    }

    #[test]
    fn quote_matches_url_path_rules() {
        assert_eq!(
            quote("/library-zip/roms/psx/My Game (USA)/a+b.bin"),
            "/library-zip/roms/psx/My%20Game%20%28USA%29/a%2Bb.bin"
        );
        assert_eq!(quote("Pokémon.gb"), "Pok%C3%A9mon.gb");
        assert_eq!(quote("a_b-c.d~e"), "a_b-c.d~e");
    }

    #[test]
    fn line_format_is_space_separated() {
        let line = ManifestLine {
            crc32: None,
            size_bytes: 42,
            encoded_location: "/library-zip/x%20y.bin".into(),
            filename: "x y.bin".into(),
        };
        assert_eq!(line.to_string(), "- 42 /library-zip/x%20y.bin x y.bin");
    }

    #[test]
    fn inline_line_embeds_base64_content() {
        let entry = SyntheticEntry {
            name: "Game.m3u".into(),
            content: b"a.bin\nb.bin".to_vec(),
        };
        let line = inline_line(&entry);
        assert_eq!(line.size_bytes, 11);
        assert_eq!(line.encoded_location, "/decode?value=YS5iaW4KYi5iaW4=");
        assert_eq!(
            line.crc32.as_deref(),
            Some(crc32_to_hex(crc32fast::hash(b"a.bin\nb.bin")).as_str())
        );
    }

    #[tokio::test]
    async fn encode_uses_fresh_sizes_and_catalog_checksums() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), b"12345").unwrap();
        std::fs::write(dir.path().join("b.bin"), b"").unwrap();

        let files = vec![
            source(dir.path(), "a.bin", Some("deadbeef")),
            source(dir.path(), "b.bin", Some("")),
        ];
        let playlist = SyntheticEntry {
            name: "My Game.m3u".into(),
            content: b"a.bin\nb.bin".to_vec(),
        };

        let lines = encode(&files, &[playlist], "/library-zip/").await.unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0].to_string(),
            "deadbeef 5 /library-zip/roms/psx/My%20Game/a.bin a.bin"
        );
        assert_eq!(
            lines[1].to_string(),
            "- 0 /library-zip/roms/psx/My%20Game/b.bin b.bin"
        );
        assert!(lines[2].encoded_location.starts_with(INLINE_DECODE_PREFIX));
        assert_eq!(lines[2].filename, "My Game.m3u");

        let body = render(&lines);
        assert_eq!(body.lines().count(), 3);
        assert!(!body.ends_with('\n'));
    }

    #[tokio::test]
    async fn encode_fails_on_missing_member() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), b"1").unwrap();

        let files = vec![
            source(dir.path(), "a.bin", None),
            source(dir.path(), "gone.bin", None),
        ];
        assert_matches!(
            encode(&files, &[], "/library-zip").await,
            Err(CoreError::SourceMissing { .. })
        );
    }
}
