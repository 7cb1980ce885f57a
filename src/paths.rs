use crate::error::{DatasetError, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const MIX_DIR: &str = "mix";
pub const INSTRUMENT_DIR: &str = "instrument";
pub const VOCAL_DIR: &str = "vocal";

const AUDIO_EXTENSIONS: [&str; 3] = ["wav", "flac", "mp3"];

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Audio files directly inside `dir`, sorted by name.
pub fn list_audio_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(DatasetError::invalid(format!(
            "{} is not a directory",
            dir.display()
        )));
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_audio_file(p))
        .collect();
    files.sort();
    Ok(files)
}

/// `<dest>/<kind>/<stem>.wav`
pub fn output_path(dest: &Path, kind: &str, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    dest.join(kind).join(format!("{stem}.wav"))
}
