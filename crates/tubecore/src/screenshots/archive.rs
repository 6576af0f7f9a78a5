//! Screenshot archives

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::core::error::AppResult;
use crate::core::utils::{now_tag, unique_path};

/// Claims `<dir>/screenshots-<timestamp>.zip`.
pub fn archive_path(dir: &Path) -> AppResult<PathBuf> {
    Ok(unique_path(dir, &format!("screenshots-{}", now_tag()), "zip")?)
}

/// Writes `files` into a deflate archive at `zip_path`, flat, under their base names.
pub fn zip_files(files: &[PathBuf], zip_path: &Path) -> AppResult<()> {
    let mut zip = ZipWriter::new(BufWriter::new(File::create(zip_path)?));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for file in files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.to_string_lossy().to_string());
        zip.start_file(name, options)?;
        let mut source = File::open(file)?;
        std::io::copy(&mut source, &mut zip)?;
    }

    let mut writer = zip.finish()?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Read;

    #[test]
    fn test_zip_is_flat_and_complete() {
        let dir = tempfile::tempdir().unwrap();
        let frames_dir = dir.path().join("screenshots");
        std::fs::create_dir_all(&frames_dir).unwrap();
        let a = frames_dir.join("screenshot_0-00-00.png");
        let b = frames_dir.join("screenshot_0-00-10.png");
        std::fs::write(&a, b"frame-a").unwrap();
        std::fs::write(&b, b"frame-b").unwrap();

        let zip_path = archive_path(dir.path()).unwrap();
        zip_files(&[a, b], &zip_path).unwrap();

        let name = zip_path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("screenshots-") && name.ends_with(".zip"));

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        let mut entry = archive.by_name("screenshot_0-00-10.png").unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "frame-b");
    }

    #[test]
    fn test_archive_names_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let first = archive_path(dir.path()).unwrap();
        let second = archive_path(dir.path()).unwrap();
        assert_ne!(first, second);
    }
}
