//! File naming helpers shared by every orchestrator.

use chrono::Local;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

/// Replaces filesystem-unsafe characters in a title.
///
/// Every run of `/ \ : * ? " < > |` and control characters collapses into a
/// single `_`. Leading and trailing whitespace and dots are dropped (Windows
/// refuses names ending in a dot). The result may be empty; callers pick
/// their own fallback.
///
/// # Example
///
/// ```
/// use tubecore::core::utils::safe_name;
///
/// assert_eq!(safe_name("AC/DC: Live?"), "AC_DC_ Live_");
/// assert_eq!(safe_name("a//\\b"), "a_b");
/// ```
pub fn safe_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut in_run = false;

    for c in name.chars() {
        let unsafe_char = matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control();
        if unsafe_char {
            if !in_run {
                result.push('_');
            }
            in_run = true;
        } else {
            result.push(c);
            in_run = false;
        }
    }

    result
        .trim_matches(|c: char| c.is_whitespace() || c == '.')
        .to_string()
}

/// [`safe_name`] with a fallback for titles that sanitize to nothing.
pub fn safe_title(title: Option<&str>, fallback: &str) -> String {
    let name = safe_name(title.unwrap_or_default());
    if name.is_empty() {
        fallback.to_string()
    } else {
        name
    }
}

/// Local timestamp tag used in every output name: `YYYYMMDD-HHMMSS`.
pub fn now_tag() -> String {
    Local::now().format("%Y%m%d-%H%M%S").to_string()
}

/// Formats seconds as `H:MM:SS`, dropping the fractional part.
///
/// ```
/// use tubecore::core::utils::human_ts;
///
/// assert_eq!(human_ts(0.0), "0:00:00");
/// assert_eq!(human_ts(3725.9), "1:02:05");
/// ```
pub fn human_ts(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Claims a collision-free path `<dir>/<base>.<ext>`, probing `<base>-001`,
/// `<base>-002`, ... when the name is taken.
///
/// The winning name is created empty with `create_new`, so two concurrent
/// callers can never be handed the same path. Callers then overwrite the
/// placeholder by renaming or copying onto it.
pub fn unique_path(dir: &Path, base: &str, ext: &str) -> io::Result<PathBuf> {
    let base = safe_name(base);
    let ext = ext.trim_start_matches('.');

    let mut attempt: u32 = 0;
    loop {
        let file_name = if attempt == 0 {
            format!("{}.{}", base, ext)
        } else {
            format!("{}-{:03}.{}", base, attempt, ext)
        };
        let candidate = dir.join(file_name);

        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Moves a file onto a claimed path, copying when a plain rename fails
/// (for example across filesystems).
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to)?;
    std::fs::remove_file(from)
}

/// Expands `~` and makes a user-supplied folder absolute.
pub fn expand_folder(folder: &str) -> PathBuf {
    let expanded = shellexpand::tilde(folder.trim()).to_string();
    let path = PathBuf::from(expanded);
    if path.is_absolute() {
        path
    } else {
        std::env::current_dir().map(|cwd| cwd.join(&path)).unwrap_or(path)
    }
}

/// Copies `file` into `folder` under a collision-free name and returns the
/// destination. The folder is created when missing.
pub fn copy_into_folder(file: &Path, folder: &Path) -> io::Result<PathBuf> {
    std::fs::create_dir_all(folder)?;

    let stem = file.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    let ext = file.extension().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();

    let dest = unique_path(folder, &stem, &ext)?;
    std::fs::copy(file, &dest)?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_safe_name() {
        assert_eq!(safe_name("song/name"), "song_name");
        assert_eq!(safe_name("a\\b:c*d?e\"f<g>h|i"), "a_b_c_d_e_f_g_h_i");
        assert_eq!(safe_name("runs///of:::bad"), "runs_of_bad");
        assert_eq!(safe_name("  padded title.  "), "padded title");
        assert_eq!(safe_name("tab\there"), "tab_here");
        assert_eq!(safe_name(""), "");
        assert_eq!(safe_name("Дорадура - трек (live) [2024]"), "Дорадура - трек (live) [2024]");
    }

    #[test]
    fn test_safe_title_fallback() {
        assert_eq!(safe_title(Some("Clip"), "video"), "Clip");
        assert_eq!(safe_title(Some(" ... "), "video"), "video");
        assert_eq!(safe_title(None, "audio"), "audio");
    }

    #[test]
    fn test_now_tag_shape() {
        let tag = now_tag();
        assert_eq!(tag.len(), 15);
        assert_eq!(&tag[8..9], "-");
        assert!(tag.chars().filter(|c| *c != '-').all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_human_ts() {
        assert_eq!(human_ts(0.0), "0:00:00");
        assert_eq!(human_ts(9.99), "0:00:09");
        assert_eq!(human_ts(70.0), "0:01:10");
        assert_eq!(human_ts(36_000.0), "10:00:00");
        assert_eq!(human_ts(-5.0), "0:00:00");
    }

    #[test]
    fn test_unique_path_suffixes_collisions() {
        let dir = tempfile::tempdir().unwrap();

        let first = unique_path(dir.path(), "Title-720p (HD)-20250101-000000", "mp4").unwrap();
        let second = unique_path(dir.path(), "Title-720p (HD)-20250101-000000", ".mp4").unwrap();
        let third = unique_path(dir.path(), "Title-720p (HD)-20250101-000000", "mp4").unwrap();

        assert_eq!(first.file_name().unwrap(), "Title-720p (HD)-20250101-000000.mp4");
        assert_eq!(second.file_name().unwrap(), "Title-720p (HD)-20250101-000000-001.mp4");
        assert_eq!(third.file_name().unwrap(), "Title-720p (HD)-20250101-000000-002.mp4");
    }

    #[test]
    fn test_unique_path_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("clip.mp3");
        std::fs::write(&existing, b"original").unwrap();

        let claimed = unique_path(dir.path(), "clip", "mp3").unwrap();
        std::fs::write(&claimed, b"new").unwrap();

        assert_ne!(claimed, existing);
        assert_eq!(std::fs::read(&existing).unwrap(), b"original");
    }

    #[test]
    fn test_unique_path_sanitizes_base() {
        let dir = tempfile::tempdir().unwrap();
        let path = unique_path(dir.path(), "a/b", "png").unwrap();
        assert_eq!(path.parent().unwrap(), dir.path());
        assert_eq!(path.file_name().unwrap(), "a_b.png");
    }

    #[test]
    fn test_copy_into_folder_creates_and_suffixes() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_root = tempfile::tempdir().unwrap();
        let dst = dst_root.path().join("nested/out");

        let file = src_dir.path().join("song-ORIGINAL-20250101-000000.webm");
        std::fs::write(&file, b"data").unwrap();

        let first = copy_into_folder(&file, &dst).unwrap();
        let second = copy_into_folder(&file, &dst).unwrap();

        assert_eq!(first.file_name().unwrap(), "song-ORIGINAL-20250101-000000.webm");
        assert_eq!(second.file_name().unwrap(), "song-ORIGINAL-20250101-000000-001.webm");
        assert_eq!(std::fs::read(&second).unwrap(), b"data");
        assert!(file.exists());
    }

    #[test]
    fn test_move_file() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("a.bin");
        std::fs::write(&from, b"x").unwrap();
        let to = unique_path(dir.path(), "b", "bin").unwrap();

        move_file(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"x");
    }
}
