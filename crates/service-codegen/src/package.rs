//! Packaging of generated projects
//!
//! A [`PackagedSource`] owns the temporary directory its tarball lives in;
//! dropping the handle removes the directory and everything in it.

use crate::codegen::CodeGenerator;
use anyhow::{Context, Result};
use architect_common::ServiceSpec;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

/// A gzipped tarball of a generated service
#[derive(Debug)]
pub struct PackagedSource {
    dir: TempDir,
    path: PathBuf,
    file_name: String,
}

impl PackagedSource {
    /// Location of the tarball on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name of the tarball, e.g. `contact-form-api.tar.gz`
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Directory that is removed together with the handle
    pub fn scratch_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn size(&self) -> std::io::Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    pub fn read(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }
}

/// Render the spec into a fresh temporary directory and pack it
///
/// The unpacked sources are removed once the tarball is written; only the
/// tarball remains, owned by the returned handle.
pub fn package_service(spec: &ServiceSpec) -> Result<PackagedSource> {
    let generator = CodeGenerator::new(spec.clone());

    let dir = tempfile::Builder::new()
        .prefix(&format!("{}-", spec.service_name))
        .tempdir()
        .context("Failed to create scratch directory")?;

    let source_dir = dir.path().join("source");
    generator.generate_package(&source_dir)?;

    let file_name = format!("{}.tar.gz", spec.service_name);
    let path = dir.path().join(&file_name);
    create_tarball(&source_dir, &path)?;

    std::fs::remove_dir_all(&source_dir).with_context(|| {
        format!("Failed to remove rendered sources in {}", source_dir.display())
    })?;

    info!("Packaged {} into {}", spec.service_name, path.display());

    Ok(PackagedSource {
        dir,
        path,
        file_name,
    })
}

fn create_tarball(source_dir: &Path, output_path: &Path) -> Result<()> {
    let tar_gz = File::create(output_path).context("Failed to create tarball")?;

    let enc = flate2::write::GzEncoder::new(tar_gz, flate2::Compression::default());
    let mut tar = tar::Builder::new(enc);

    tar.append_dir_all(".", source_dir)
        .context("Failed to create tar archive")?;

    let enc = tar.into_inner().context("Failed to finish tar archive")?;
    enc.finish().context("Failed to finish gzip stream")?;

    Ok(())
}
