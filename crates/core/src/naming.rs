//! File-name helpers for roms: extensions, tag stripping and the
//! presentation name a member file gets inside a download.

use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::{Rom, RomFile};

/// Extension of generated and detected playlists.
pub const PLAYLIST_EXTENSION: &str = "m3u";

/// `(USA)`, `[!]` and friends.
static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]+)\)|\[([^\]]+)\]").expect("valid tag regex"));

static MULTI_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid whitespace regex"));

/// Extension of `file_name` without the dot. Dotfiles have no extension.
pub fn file_extension(file_name: &str) -> Option<&str> {
    match file_name.rfind('.') {
        Some(0) | None => None,
        Some(idx) => Some(&file_name[idx + 1..]).filter(|ext| !ext.is_empty()),
    }
}

/// `file_name` with its last extension removed.
pub fn name_without_extension(file_name: &str) -> &str {
    match file_extension(file_name) {
        Some(ext) => &file_name[..file_name.len() - ext.len() - 1],
        None => file_name,
    }
}

/// `file_name` without extension and without bracketed tags.
pub fn name_without_tags(file_name: &str) -> String {
    let stripped = TAG_REGEX.replace_all(name_without_extension(file_name), "");
    MULTI_SPACE.replace_all(stripped.trim(), " ").into_owned()
}

/// Name of `file` inside a download of `rom`.
///
/// The name is the file's path relative to the rom directory. With
/// `hidden_folder` set and a rom made of several files, members are grouped
/// under `.<fs_name>/` so frontends that expect hidden multi-disc folders
/// only see the playlist at the top level.
pub fn name_for_download(rom: &Rom, file: &RomFile, hidden_folder: bool) -> String {
    let inner = match relative_dir(&file.file_path, &rom.full_path()) {
        Some(dir) if !dir.is_empty() => format!("{dir}/{}", file.file_name),
        _ => file.file_name.clone(),
    };

    if hidden_folder && rom.has_multiple_files() {
        format!(".{}/{inner}", rom.fs_name)
    } else {
        inner
    }
}

/// `path` relative to `root`, when `path` is `root` or lies below it.
fn relative_dir<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    let path = path.trim_end_matches('/');
    let root = root.trim_end_matches('/');
    let rest = path.strip_prefix(root)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with_files(fs_name: &str, files: &[(&str, &str)]) -> Rom {
        Rom {
            id: 1,
            platform_id: 1,
            name: None,
            summary: None,
            fs_name: fs_name.to_string(),
            fs_path: "roms/psx".to_string(),
            fs_name_no_tags: name_without_tags(fs_name),
            fs_name_no_ext: name_without_extension(fs_name).to_string(),
            path_manual: None,
            files: files
                .iter()
                .enumerate()
                .map(|(i, (dir, name))| RomFile {
                    id: i as i64 + 1,
                    rom_id: 1,
                    file_name: name.to_string(),
                    file_path: dir.to_string(),
                    file_size_bytes: 1,
                    crc_hash: None,
                })
                .collect(),
        }
    }

    #[test]
    fn extension_parsing() {
        assert_eq!(file_extension("Game.gba"), Some("gba"));
        assert_eq!(file_extension("archive.tar.gz"), Some("gz"));
        assert_eq!(file_extension(".hidden"), None);
        assert_eq!(file_extension("noext"), None);
        assert_eq!(name_without_extension("Game (USA).gba"), "Game (USA)");
    }

    #[test]
    fn tags_are_stripped() {
        assert_eq!(
            name_without_tags("Final Fantasy VII (USA) [Disc 1] (Rev 1).cue"),
            "Final Fantasy VII"
        );
        assert_eq!(name_without_tags("Tetris (World) (En,Ja).gb"), "Tetris");
    }

    #[test]
    fn download_name_is_relative_to_rom_directory() {
        let rom = rom_with_files(
            "FF7",
            &[("roms/psx/FF7", "disc1.cue"), ("roms/psx/FF7/bins", "disc1.bin")],
        );
        assert_eq!(name_for_download(&rom, &rom.files[0], false), "disc1.cue");
        assert_eq!(name_for_download(&rom, &rom.files[1], false), "bins/disc1.bin");
    }

    #[test]
    fn hidden_folder_groups_multi_file_roms() {
        let rom = rom_with_files("FF7", &[("roms/psx/FF7", "a.cue"), ("roms/psx/FF7", "b.cue")]);
        assert_eq!(name_for_download(&rom, &rom.files[0], true), ".FF7/a.cue");
    }

    #[test]
    fn hidden_folder_ignored_for_single_file_roms() {
        let rom = rom_with_files("Game.gba", &[("roms/psx", "Game.gba")]);
        assert_eq!(name_for_download(&rom, &rom.files[0], true), "Game.gba");
    }

    #[test]
    fn sibling_directory_with_shared_prefix_is_not_relative() {
        assert_eq!(relative_dir("roms/psx/FF7-extra", "roms/psx/FF7"), None);
        assert_eq!(relative_dir("roms/psx/FF7/", "roms/psx/FF7"), Some(""));
    }
}
