//! Archive members: real files resolved from the catalog and generated
//! (synthetic) entries such as the multi-disc playlist.

use std::path::PathBuf;

use crate::catalog::{Rom, RomFile};
use crate::naming::{self, PLAYLIST_EXTENSION};

/// A catalog file resolved for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub file_id: i64,
    /// Entry name inside the archive.
    pub archive_name: String,
    /// Path relative to the library root.
    pub relative_path: String,
    /// Location on this host.
    pub absolute_path: PathBuf,
    pub crc_hash: Option<String>,
}

/// A generated archive member that has no file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticEntry {
    pub name: String,
    pub content: Vec<u8>,
}

impl SyntheticEntry {
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn crc32(&self) -> u32 {
        crc32fast::hash(&self.content)
    }
}

/// A playlist is generated only when none of the delivered files is one.
pub fn needs_playlist(files: &[RomFile]) -> bool {
    !files.iter().any(RomFile::is_playlist)
}

/// Build `<fs_name>.m3u` listing `entry_names` one per line, in order.
pub fn build_playlist(rom: &Rom, entry_names: &[String]) -> SyntheticEntry {
    SyntheticEntry {
        name: format!("{}.{PLAYLIST_EXTENSION}", rom.fs_name),
        content: entry_names.join("\n").into_bytes(),
    }
}

/// Entries listed by a playlist, skipping blank lines and `#` directives.
pub fn parse_playlist(content: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(content)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Resolve the synthetic entries for a delivery of `files` (already
/// sorted) whose archive names are `entry_names`.
pub fn synthetic_entries(rom: &Rom, files: &[RomFile], entry_names: &[String]) -> Vec<SyntheticEntry> {
    if needs_playlist(files) {
        vec![build_playlist(rom, entry_names)]
    } else {
        Vec::new()
    }
}

/// Lowercase, zero-padded hex form of a CRC32.
pub fn crc32_to_hex(crc: u32) -> String {
    format!("{crc:08x}")
}

/// Whether `name` denotes a playlist file.
pub fn is_playlist_name(name: &str) -> bool {
    naming::file_extension(name).is_some_and(|ext| ext.eq_ignore_ascii_case(PLAYLIST_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: i64, name: &str) -> RomFile {
        RomFile {
            id,
            rom_id: 1,
            file_name: name.to_string(),
            file_path: "roms/psx/Game".to_string(),
            file_size_bytes: 1,
            crc_hash: None,
        }
    }

    fn rom(files: Vec<RomFile>) -> Rom {
        Rom {
            id: 1,
            platform_id: 1,
            name: Some("Game".into()),
            summary: None,
            fs_name: "Game".into(),
            fs_path: "roms/psx".into(),
            fs_name_no_tags: "Game".into(),
            fs_name_no_ext: "Game".into(),
            path_manual: None,
            files,
        }
    }

    #[test]
    fn playlist_round_trips_entry_names() {
        let names = vec!["a.bin".to_string(), ".Game/b.bin".to_string()];
        let entry = build_playlist(&rom(vec![]), &names);
        assert_eq!(entry.name, "Game.m3u");
        assert_eq!(entry.content, b"a.bin\n.Game/b.bin");
        assert_eq!(parse_playlist(&entry.content), names);
    }

    #[test]
    fn existing_playlist_suppresses_generation() {
        let files = vec![file(1, "a.cue"), file(2, "Game.M3U")];
        assert!(!needs_playlist(&files));
        let names = vec!["a.cue".to_string(), "Game.M3U".to_string()];
        assert!(synthetic_entries(&rom(files.clone()), &files, &names).is_empty());
    }

    #[test]
    fn crc_hex_is_zero_padded() {
        assert_eq!(crc32_to_hex(0xab), "000000ab");
        let entry = SyntheticEntry {
            name: "x.m3u".into(),
            content: b"a.bin\nb.bin".to_vec(),
        };
        assert_eq!(entry.crc32(), crc32fast::hash(b"a.bin\nb.bin"));
        assert_eq!(entry.size(), 11);
        assert!(is_playlist_name("x.m3u"));
    }
}
