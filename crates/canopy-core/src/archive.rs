//! Directory packaging for metadata deploys.

use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use zip::write::SimpleFileOptions;

/// Zip `dir` into an archive rooted under the directory's base name.
///
/// When `out` is not given the archive lands in the system temp directory
/// as `<base>.zip`. Returns the archive path.
pub fn zip_directory(dir: &Path, out: Option<&Path>) -> anyhow::Result<PathBuf> {
    let base = dir
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .with_context(|| format!("Cannot derive an archive name from {}", dir.display()))?;
    let out_path = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| std::env::temp_dir().join(format!("{base}.zip")));

    let started = Instant::now();
    let file = File::create(&out_path)
        .with_context(|| format!("Failed to create archive: {}", out_path.display()))?;
    let mut writer = zip::ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    add_directory(&mut writer, dir, &base, options)?;

    let file = writer.finish().context("Failed to finalize archive")?;
    let bytes = file.metadata().map(|meta| meta.len()).unwrap_or(0);
    tracing::debug!(
        "{} bytes written to {} in {:?}",
        bytes,
        out_path.display(),
        started.elapsed()
    );
    Ok(out_path)
}

fn add_directory(
    zip: &mut zip::ZipWriter<File>,
    dir: &Path,
    prefix: &str,
    options: SimpleFileOptions,
) -> anyhow::Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<_>>()?;
    // Deterministic archive layout regardless of readdir order.
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry.file_name();
        let child = format!("{prefix}/{}", name.to_string_lossy());
        if path.is_dir() {
            zip.add_directory(child.as_str(), options)?;
            add_directory(zip, &path, &child, options)?;
        } else {
            zip.start_file(child.as_str(), options)?;
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read file: {}", path.display()))?;
            zip.write_all(&bytes)?;
        }
    }
    Ok(())
}
