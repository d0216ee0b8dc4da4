/*!
 * Compressed archives of the generated output
 */

use std::fs::File;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use flate2::write::GzEncoder;
use flate2::Compression;
use strum::Display;
use tar::Builder;

use crate::error::{FlatdumpError, Result, ResultExt};

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, ValueEnum)]
pub enum ArchiveFormat {
    /// Gzip-compressed tarball
    #[value(name = "tar.gz")]
    #[strum(serialize = "tar.gz")]
    TarGz,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
        }
    }
}

/// Archive `file` next to itself as `<file>.<ext>` and return the archive path.
///
/// The archive holds a single member named after the file's base name.
pub fn archive_file(file: &Path, format: ArchiveFormat) -> Result<PathBuf> {
    if !file.is_file() {
        return Err(FlatdumpError::PathNotFound(file.display().to_string()));
    }

    let name = file
        .file_name()
        .ok_or_else(|| FlatdumpError::Archive(format!("{} has no file name", file.display())))?;
    let archive_path = PathBuf::from(format!("{}.{}", file.display(), format.extension()));

    match format {
        ArchiveFormat::TarGz => {
            let output = File::create(&archive_path)
                .with_context(|| format!("creating {}", archive_path.display()))?;
            let encoder = GzEncoder::new(output, Compression::new(6));
            let mut builder = Builder::new(encoder);
            builder
                .append_path_with_name(file, name)
                .map_err(|e| FlatdumpError::Archive(format!("adding {}: {}", file.display(), e)))?;
            let encoder = builder.into_inner()?;
            encoder.finish()?;
        }
    }

    tracing::info!("Created archive: {}", archive_path.display());
    Ok(archive_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::fs;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn test_tar_gz_archive() -> std::io::Result<()> {
        let dir = tempdir()?;
        let output = dir.path().join("dump.txt");
        fs::write(&output, "## File Data\n")?;

        let archive = archive_file(&output, ArchiveFormat::TarGz)?;
        assert_eq!(archive, dir.path().join("dump.txt.tar.gz"));

        let mut tarball = tar::Archive::new(GzDecoder::new(File::open(&archive)?));
        let mut members = tarball.entries()?;
        let mut member = members.next().expect("one member")?;
        assert_eq!(member.path()?.to_string_lossy(), "dump.txt");
        let mut content = String::new();
        member.read_to_string(&mut content)?;
        assert_eq!(content, "## File Data\n");
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let err = archive_file(Path::new("/nonexistent/flatdump.txt"), ArchiveFormat::TarGz)
            .unwrap_err();
        assert!(matches!(err, FlatdumpError::PathNotFound(_)));
    }
}
