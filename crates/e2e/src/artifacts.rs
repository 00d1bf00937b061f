//! Packaging of run artifacts (report, screenshots, diffs) for upload

use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::E2eResult;

#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub path: PathBuf,
    pub files: usize,
    pub sha256: String,
}

/// Write every file under `results_dir` into a gzipped tarball at `archive`.
///
/// Paths inside the archive are relative to `results_dir`. The archive itself
/// is skipped if it lives inside the directory being packed.
pub fn package_results(results_dir: &Path, archive: &Path) -> E2eResult<ArtifactBundle> {
    if let Some(parent) = archive.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(archive)?;
    let archive_abs = archive.canonicalize()?;

    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut files = 0;

    let mut entries: Vec<PathBuf> = walkdir::WalkDir::new(results_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    entries.sort();

    for path in entries {
        if path.canonicalize()? == archive_abs {
            continue;
        }
        let Ok(relative) = path.strip_prefix(results_dir) else {
            continue;
        };
        builder.append_path_with_name(&path, relative)?;
        files += 1;
    }

    builder.into_inner()?.finish()?;

    let data = std::fs::read(archive)?;
    let sha256 = hex::encode(Sha256::digest(&data));

    info!("Packaged {} file(s) into {} (sha256 {})", files, archive.display(), sha256);

    Ok(ArtifactBundle {
        path: archive.to_path_buf(),
        files,
        sha256,
    })
}
