//! In-memory ZIP assembly for multi-file downloads.
//!
//! Used when the server delivers archives itself instead of handing a
//! manifest to the reverse proxy. The whole archive is held in memory, so
//! callers run [`assemble`] on the blocking pool.

use std::fs::File;
use std::io::{self, Cursor, Write};

use chrono::{Datelike, NaiveDateTime, Timelike};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime as ZipDateTime, ZipWriter};

use crate::entries::{SourceFile, SyntheticEntry};
use crate::error::CoreError;

/// Permission bits stored for every entry.
const ENTRY_PERMISSIONS: u32 = 0o600;

/// Build a ZIP containing `files` in the given order followed by
/// `synthetic` entries.
///
/// Empty files are stored, everything else is deflated. All entries share
/// the `modified` timestamp, so two runs over unchanged files with the same
/// timestamp produce identical bytes. The first missing source aborts the
/// whole archive with [`CoreError::SourceMissing`].
pub fn assemble(
    files: &[SourceFile],
    synthetic: &[SyntheticEntry],
    modified: NaiveDateTime,
) -> Result<Vec<u8>, CoreError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let base_options = SimpleFileOptions::default()
        .last_modified_time(zip_timestamp(modified))
        .unix_permissions(ENTRY_PERMISSIONS);

    for file in files {
        let mut source = File::open(&file.absolute_path).map_err(|e| source_error(e, file))?;
        let size = source
            .metadata()
            .map_err(|e| source_error(e, file))?
            .len();

        let method = if size == 0 {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        let options = base_options
            .compression_method(method)
            .large_file(size >= u64::from(u32::MAX));

        writer
            .start_file(file.archive_name.as_str(), options)
            .map_err(zip_error)?;
        io::copy(&mut source, &mut writer).map_err(|e| source_error(e, file))?;
    }

    for entry in synthetic {
        writer
            .start_file(
                entry.name.as_str(),
                base_options.compression_method(CompressionMethod::Stored),
            )
            .map_err(zip_error)?;
        writer
            .write_all(&entry.content)
            .map_err(|e| CoreError::Internal(format!("Failed to write {}: {e}", entry.name)))?;
    }

    let cursor = writer.finish().map_err(zip_error)?;
    Ok(cursor.into_inner())
}

/// Convert a wall-clock time into the DOS timestamp ZIP entries carry.
/// Out-of-range values (before 1980) fall back to the format's epoch.
pub fn zip_timestamp(at: NaiveDateTime) -> ZipDateTime {
    let year = u16::try_from(at.year()).unwrap_or(1980);
    ZipDateTime::from_date_and_time(
        year,
        at.month() as u8,
        at.day() as u8,
        at.hour() as u8,
        at.minute() as u8,
        at.second() as u8,
    )
    .unwrap_or_default()
}

fn source_error(err: io::Error, file: &SourceFile) -> CoreError {
    let err = CoreError::from_source_io(err, &file.absolute_path);
    if matches!(err, CoreError::SourceMissing { .. }) {
        tracing::error!(
            path = %file.absolute_path.display(),
            file_id = file.file_id,
            "Archive member not found on disk",
        );
    }
    err
}

fn zip_error(err: zip::result::ZipError) -> CoreError {
    CoreError::Internal(format!("ZIP assembly failed: {err}"))
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::path::Path;

    use assert_matches::assert_matches;
    use zip::ZipArchive;

    use super::*;

    fn source(dir: &Path, name: &str) -> SourceFile {
        SourceFile {
            file_id: 0,
            archive_name: name.to_string(),
            relative_path: format!("roms/psx/Game/{name}"),
            absolute_path: dir.join(name),
            crc_hash: None,
        }
    }

    fn timestamp() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 5, 17)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
    }

    fn playlist() -> SyntheticEntry {
        SyntheticEntry {
            name: "Game.m3u".into(),
            content: b"a.bin\nb.bin".to_vec(),
        }
    }

    #[test]
    fn entries_follow_input_order_then_synthetic() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), b"alpha").unwrap();
        std::fs::write(dir.path().join("b.bin"), b"bravo").unwrap();

        let files = vec![source(dir.path(), "a.bin"), source(dir.path(), "b.bin")];
        let bytes = assemble(&files, &[playlist()], timestamp()).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3);

        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, ["a.bin", "b.bin", "Game.m3u"]);

        let mut content = String::new();
        archive
            .by_name("Game.m3u")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "a.bin\nb.bin");

        let mut alpha = String::new();
        archive
            .by_name("a.bin")
            .unwrap()
            .read_to_string(&mut alpha)
            .unwrap();
        assert_eq!(alpha, "alpha");
    }

    #[test]
    fn empty_files_are_stored_and_others_deflated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("empty.bin"), b"").unwrap();
        std::fs::write(dir.path().join("data.bin"), vec![7u8; 4096]).unwrap();

        let files = vec![source(dir.path(), "data.bin"), source(dir.path(), "empty.bin")];
        let bytes = assemble(&files, &[], timestamp()).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(
            archive.by_name("data.bin").unwrap().compression(),
            CompressionMethod::Deflated
        );
        assert_eq!(
            archive.by_name("empty.bin").unwrap().compression(),
            CompressionMethod::Stored
        );
    }

    #[test]
    fn missing_member_aborts_assembly() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), b"alpha").unwrap();

        let files = vec![source(dir.path(), "a.bin"), source(dir.path(), "gone.bin")];
        let err = assemble(&files, &[playlist()], timestamp()).unwrap_err();
        assert_matches!(err, CoreError::SourceMissing { path } if path.ends_with("gone.bin"));
    }

    #[test]
    fn same_inputs_produce_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), b"alpha").unwrap();
        std::fs::write(dir.path().join("b.bin"), b"").unwrap();

        let files = vec![source(dir.path(), "a.bin"), source(dir.path(), "b.bin")];
        let first = assemble(&files, &[playlist()], timestamp()).unwrap();
        let second = assemble(&files, &[playlist()], timestamp()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn timestamps_before_dos_epoch_fall_back() {
        let old = chrono::NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(zip_timestamp(old), ZipDateTime::default());
    }
}
