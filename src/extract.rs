// src/extract.rs
use anyhow::{anyhow, Context, Result};
use std::{
    fs::{self, File},
    io::{self, BufWriter},
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};
use zip::ZipArchive;

fn open_archive(zip_path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(zip_path)
        .with_context(|| format!("Failed to open ZIP file: {:?}", zip_path))?;
    ZipArchive::new(file).with_context(|| format!("Failed to read ZIP archive: {:?}", zip_path))
}

/// Extract every member of `zip_path` into `dest_dir`, overwriting files of the same name.
/// Members whose path would escape `dest_dir` are rejected.
/// Returns the paths of the extracted files, in archive order.
#[instrument(level = "info", skip(zip_path, dest_dir), fields(zip = %zip_path.as_ref().display()))]
pub fn extract_all(zip_path: impl AsRef<Path>, dest_dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let zip_path = zip_path.as_ref();
    let dest_dir = dest_dir.as_ref();
    let mut archive = open_archive(zip_path)?;

    let mut written = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).with_context(|| {
            format!("Failed to access ZIP entry #{} in {:?}", i, zip_path)
        })?;
        let rel = entry
            .enclosed_name()
            .ok_or_else(|| anyhow!("unsafe entry name {:?} in {:?}", entry.name(), zip_path))?;
        let out_path = dest_dir.join(rel);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .with_context(|| format!("Failed to create dir {}", out_path.display()))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create dir {}", parent.display()))?;
        }
        let mut out = BufWriter::new(
            File::create(&out_path)
                .with_context(|| format!("Failed to create file {}", out_path.display()))?,
        );
        let bytes = io::copy(&mut entry, &mut out)
            .with_context(|| format!("Failed to write file {}", out_path.display()))?;
        debug!(path = %out_path.display(), bytes, "extracted");
        written.push(out_path);
    }
    Ok(written)
}

/// Extract the single member `member` of `zip_path` into `dest_dir`.
pub fn extract_file(
    zip_path: impl AsRef<Path>,
    member: &str,
    dest_dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let zip_path = zip_path.as_ref();
    let mut archive = open_archive(zip_path)?;
    let mut entry = archive
        .by_name(member)
        .with_context(|| format!("{} not found in {:?}", member, zip_path))?;
    let rel = entry
        .enclosed_name()
        .ok_or_else(|| anyhow!("unsafe entry name {:?} in {:?}", member, zip_path))?;
    let out_path = dest_dir.as_ref().join(rel);
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create dir {}", parent.display()))?;
    }
    let mut out = BufWriter::new(
        File::create(&out_path)
            .with_context(|| format!("Failed to create file {}", out_path.display()))?,
    );
    io::copy(&mut entry, &mut out)
        .with_context(|| format!("Failed to write file {}", out_path.display()))?;
    Ok(out_path)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::tempdir;
    use zip::write::FileOptions;
    use zip::CompressionMethod;

    /// Build a zip in memory from `(name, content)` pairs.
    pub(crate) fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options: FileOptions<'_, ()> =
                FileOptions::default().compression_method(CompressionMethod::Deflated);
            for (name, content) in files {
                zip.start_file(*name, options).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn test_extract_all_overwrites() -> Result<()> {
        let dir = tempdir()?;
        let zip_path = dir.path().join("csv_hak.zip");
        fs::write(
            &zip_path,
            zip_bytes(&[
                ("psam_h02.csv", "RT,SERIALNO\nH,1\n"),
                ("ACS2018_PUMS_README.pdf", "readme"),
            ]),
        )?;
        fs::write(dir.path().join("psam_h02.csv"), "stale")?;

        let written = extract_all(&zip_path, dir.path())?;

        assert_eq!(written.len(), 2);
        assert_eq!(
            fs::read_to_string(dir.path().join("psam_h02.csv"))?,
            "RT,SERIALNO\nH,1\n"
        );
        assert!(dir.path().join("ACS2018_PUMS_README.pdf").exists());
        // archive stays in place
        assert!(zip_path.exists());
        Ok(())
    }

    #[test]
    fn test_extract_rejects_escaping_paths() -> Result<()> {
        let dir = tempdir()?;
        let zip_path = dir.path().join("evil.zip");
        fs::write(&zip_path, zip_bytes(&[("../escape.csv", "x")]))?;

        assert!(extract_all(&zip_path, dir.path().join("inner")).is_err());
        assert!(!dir.path().join("escape.csv").exists());
        Ok(())
    }

    #[test]
    fn test_extract_file_single_member() -> Result<()> {
        let dir = tempdir()?;
        let zip_path = dir.path().join("csv_pca.zip");
        fs::write(
            &zip_path,
            zip_bytes(&[("psam_p06.csv", "RT\nP\n"), ("other.txt", "no")]),
        )?;

        let out = extract_file(&zip_path, "psam_p06.csv", dir.path())?;

        assert_eq!(out, dir.path().join("psam_p06.csv"));
        assert!(!dir.path().join("other.txt").exists());
        assert!(extract_file(&zip_path, "missing.csv", dir.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_corrupt_archive_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let zip_path = dir.path().join("broken.zip");
        fs::write(&zip_path, b"not a zip")?;
        let err = extract_all(&zip_path, dir.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to read ZIP archive"));
        Ok(())
    }
}
