pub mod labels;

use crate::{SUPPORTED_EXTENSIONS, TRACK_ID_LEN};
use labels::LabelTable;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A MIDI file found on disk with the track id derived from its directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub track_id: String,
    pub path: PathBuf,
}

/// A file paired with its ground-truth genre.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedPath {
    pub path: PathBuf,
    pub genre: String,
}

/// Walk `root` for MIDI files. Each file's track id is the trailing
/// `TRACK_ID_LEN` characters of its containing directory's name.
pub fn discover(root: &Path) -> Vec<DiscoveredFile> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() || !is_midi(entry.path()) {
            continue;
        }
        let Some(track_id) = entry.path().parent().and_then(track_id_of) else {
            log::debug!("No track id for {}", entry.path().display());
            continue;
        };
        files.push(DiscoveredFile {
            track_id,
            path: entry.into_path(),
        });
    }

    log::info!("Discovered {} MIDI files under {}", files.len(), root.display());
    files
}

/// Inner join of discovered files against the label table, in discovery order.
pub fn join(files: Vec<DiscoveredFile>, table: &LabelTable) -> Vec<MatchedPath> {
    let total = files.len();
    let matched: Vec<MatchedPath> = files
        .into_iter()
        .filter_map(|f| {
            table.genre(&f.track_id).map(|genre| MatchedPath {
                path: f.path,
                genre: genre.to_string(),
            })
        })
        .collect();

    log::info!("Matched {} of {} files to labels", matched.len(), total);
    matched
}

fn is_midi(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

fn track_id_of(dir: &Path) -> Option<String> {
    let name = dir.file_name()?.to_str()?;
    let chars: Vec<char> = name.chars().collect();
    let start = chars.len().saturating_sub(TRACK_ID_LEN);
    Some(chars[start..].iter().collect())
}
