//! Unpacking toolchain tarballs and writing the flashable zip.

use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

/// Supported toolchain archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarZst,
}

impl ArchiveFormat {
    /// Guess the format from a file name.
    pub fn from_name(name: &str) -> Option<Self> {
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
            Some(Self::TarZst)
        } else {
            None
        }
    }
}

/// Remove `dir` if it exists and create it empty.
pub fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        log::debug!("removing {}", dir.display());
        fs::remove_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    }
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))
}

/// Unpack a tarball into a freshly recreated `dest`.
pub fn extract(bytes: &[u8], format: ArchiveFormat, dest: &Path) -> Result<()> {
    reset_dir(dest)?;
    let reader: Box<dyn Read + '_> = match format {
        ArchiveFormat::TarGz => Box::new(flate2::read::GzDecoder::new(bytes)),
        ArchiveFormat::TarZst => Box::new(
            zstd::stream::read::Decoder::new(bytes)
                .map_err(|e| Error::Archive(format!("zstd: {e}")))?,
        ),
    };
    tar::Archive::new(reader)
        .unpack(dest)
        .map_err(|e| Error::Archive(format!("unpacking into {}: {e}", dest.display())))
}

/// Directory holding `bin/` inside an unpacked toolchain.
///
/// Archives either contain `bin/` at the top or wrap everything in one
/// directory; both layouts are accepted.
pub fn toolchain_root(dest: &Path) -> Result<PathBuf> {
    if dest.join("bin").is_dir() {
        return Ok(dest.to_path_buf());
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dest).map_err(|e| Error::io(dest, e))? {
        let entry = entry.map_err(|e| Error::io(dest, e))?;
        if entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    match dirs.as_slice() {
        [only] if only.join("bin").is_dir() => Ok(only.clone()),
        _ => Err(Error::ToolMissing {
            tool: "bin/".to_string(),
            reason: "not found".to_string(),
            dir: dest.to_path_buf(),
        }),
    }
}

/// Zip the contents of `src` into `out`, leaving out `.git`.
///
/// Returns the size of the written zip.
pub fn zip_dir(src: &Path, out: &Path) -> Result<u64> {
    let file = File::create(out).map_err(|e| Error::io(out, e))?;
    let mut zip = zip::ZipWriter::new(file);

    let walker = WalkDir::new(src)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");

    for entry in walker {
        let entry = entry.map_err(|e| Error::Archive(e.to_string()))?;
        let path = entry.path();
        let relative = path
            .strip_prefix(src)
            .map_err(|e| Error::Archive(e.to_string()))?;
        let name = relative.to_string_lossy().replace('\\', "/");
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(unix_mode(path));

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{name}/"), options)?;
        } else {
            zip.start_file(name, options)?;
            let mut input = File::open(path).map_err(|e| Error::io(path, e))?;
            io::copy(&mut input, &mut zip).map_err(|e| Error::io(path, e))?;
        }
    }

    let mut file = zip.finish()?;
    file.flush().map_err(|e| Error::io(out, e))?;
    let size = fs::metadata(out).map_err(|e| Error::io(out, e))?.len();
    Ok(size)
}

fn unix_mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).map_or(0o644, |m| m.permissions().mode() & 0o777)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tarball(entries: &[(&str, &[u8], u32)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data, mode) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_format_from_name() {
        assert_eq!(ArchiveFormat::from_name("a.tar.gz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_name("a.tar.zst"), Some(ArchiveFormat::TarZst));
        assert_eq!(ArchiveFormat::from_name("a.zip"), None);
    }

    #[test]
    fn test_extract_replaces_previous_contents() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("toolchain");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("stale"), "old").unwrap();

        let bytes = gzip(&tarball(&[("bin/clang", b"#!/bin/sh\n", 0o755)]));
        extract(&bytes, ArchiveFormat::TarGz, &dest).unwrap();

        assert!(!dest.join("stale").exists());
        assert!(dest.join("bin/clang").is_file());
    }

    #[test]
    fn test_extract_zstd_and_hoist_root() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("tc");
        let tar = tarball(&[("clang-r1/bin/clang", b"x", 0o755)]);
        let bytes = zstd::encode_all(&tar[..], 3).unwrap();

        extract(&bytes, ArchiveFormat::TarZst, &dest).unwrap();
        assert_eq!(toolchain_root(&dest).unwrap(), dest.join("clang-r1"));
    }

    #[test]
    fn test_extract_rejects_garbage() {
        let temp = TempDir::new().unwrap();
        let result = extract(b"not a tarball", ArchiveFormat::TarGz, &temp.path().join("x"));
        assert!(matches!(result, Err(Error::Archive(_))));
    }

    #[test]
    fn test_toolchain_root_missing_bin() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a")).unwrap();
        fs::create_dir_all(temp.path().join("b")).unwrap();
        assert!(toolchain_root(temp.path()).is_err());
    }

    #[test]
    fn test_zip_dir_excludes_git() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("AnyKernel3");
        fs::create_dir_all(src.join(".git/objects")).unwrap();
        fs::write(src.join(".git/HEAD"), "ref").unwrap();
        fs::create_dir_all(src.join("tools")).unwrap();
        fs::write(src.join("anykernel.sh"), "#!/sbin/sh").unwrap();
        fs::write(src.join("tools/busybox"), "bb").unwrap();
        fs::write(src.join("Image.gz"), "kernel").unwrap();

        let out = temp.path().join("out.zip");
        let size = zip_dir(&src, &out).unwrap();
        assert!(size > 0);

        let archive = zip::ZipArchive::new(File::open(&out).unwrap()).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["Image.gz", "anykernel.sh", "tools/", "tools/busybox"]);
    }
}
