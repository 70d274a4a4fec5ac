//! Archive bundling of job outputs.
//!
//! Packages a job's named artifacts into a single zip. Archive names are
//! derived from the job id, and an existing archive is reused instead of
//! being rebuilt, so repeated requests return byte-identical artifacts.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{MediaError, MediaResult};

/// Deterministic archive path for a job.
pub fn archive_path(dir: &Path, prefix: &str, job_id: &str) -> PathBuf {
    dir.join(format!("{}_{}.zip", prefix, job_id))
}

/// Bundle `files` (entry name, source path) into the archive at `dest`.
///
/// If `dest` already exists it is returned untouched. Entry timestamps are
/// pinned so rebuilding from the same inputs is reproducible.
pub fn bundle(files: &[(String, PathBuf)], dest: &Path) -> MediaResult<PathBuf> {
    if dest.exists() {
        info!("Archive already exists, reusing: {}", dest.display());
        return Ok(dest.to_path_buf());
    }

    let file = File::create(dest)?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    for (name, path) in files {
        if !path.exists() {
            // Leave no half-written archive behind
            drop(writer);
            let _ = std::fs::remove_file(dest);
            return Err(MediaError::FileNotFound(path.clone()));
        }
        writer.start_file(name.as_str(), options)?;
        let mut src = File::open(path)?;
        io::copy(&mut src, &mut writer)?;
    }

    writer.finish()?;
    info!("Bundled {} files into {}", files.len(), dest.display());
    Ok(dest.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_inputs(dir: &Path) -> Vec<(String, PathBuf)> {
        let mut files = Vec::new();
        for (name, content) in [("a.png", b"aaaa".as_slice()), ("b.png", b"bb".as_slice())] {
            let path = dir.join(name);
            std::fs::write(&path, content).unwrap();
            files.push((name.to_string(), path));
        }
        files
    }

    #[test]
    fn test_archive_path_is_deterministic() {
        let p = archive_path(Path::new("/tmp/out"), "frames", "job-1");
        assert_eq!(p, PathBuf::from("/tmp/out/frames_job-1.zip"));
    }

    #[test]
    fn test_bundle_and_reuse_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_inputs(dir.path());
        let dest = archive_path(dir.path(), "frames", "job-1");

        bundle(&files, &dest).unwrap();
        let first = std::fs::read(&dest).unwrap();

        // Mutate an input; the existing archive must be reused, not rebuilt.
        std::fs::write(&files[0].1, b"changed").unwrap();
        bundle(&files, &dest).unwrap();
        let second = std::fs::read(&dest).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_bundle_missing_input_errors_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![("gone.png".to_string(), dir.path().join("gone.png"))];
        let dest = archive_path(dir.path(), "frames", "job-2");

        let err = bundle(&files, &dest).unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
        assert!(!dest.exists());
    }

    #[test]
    fn test_bundle_lists_all_entries() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_inputs(dir.path());
        let dest = archive_path(dir.path(), "frames", "job-3");
        bundle(&files, &dest).unwrap();

        let reader = File::open(&dest).unwrap();
        let mut zip = zip::ZipArchive::new(reader).unwrap();
        assert_eq!(zip.len(), 2);
        assert!(zip.by_name("a.png").is_ok());
    }
}
