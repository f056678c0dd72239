//! ZIP bundling of the output directory

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::absolute_path;

/// Suffix appended to the output directory name to form the archive name
pub const ARCHIVE_SUFFIX: &str = "_EventLogsAndDumps.zip";

/// Archive path for `output_dir`: a sibling named `<dir>_EventLogsAndDumps.zip`.
///
/// `output_dir` is made absolute first, so `.` and `a/..` name the folder they
/// resolve to.
pub fn archive_path_for(output_dir: &Path) -> Result<PathBuf> {
    let output_dir = absolute_path(output_dir);
    let name = output_dir
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Output folder has no name: {}", output_dir.display()))?;
    let mut file_name = name.to_os_string();
    file_name.push(ARCHIVE_SUFFIX);

    Ok(match output_dir.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    })
}

/// Write every file under `output_dir` into a deflate-compressed ZIP.
///
/// Entry names are relative to the parent of `output_dir`, so the archive has a
/// single top-level folder named after it. Returns the archive path.
pub fn create_archive(output_dir: &Path) -> Result<PathBuf> {
    let output_dir = absolute_path(output_dir);
    let archive_path = archive_path_for(&output_dir)?;
    let base = output_dir.parent().unwrap_or(Path::new(""));

    let file = File::create(&archive_path)
        .with_context(|| format!("Failed to create {}", archive_path.display()))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);

    let mut count = 0usize;
    for entry in WalkDir::new(&output_dir).sort_by_file_name() {
        let entry = entry.context("Failed to walk output folder")?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let name = entry_name(path, base)?;

        zip.start_file(name, options)
            .with_context(|| format!("Failed to add {}", path.display()))?;
        let mut src =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        io::copy(&mut src, &mut zip)
            .with_context(|| format!("Failed to compress {}", path.display()))?;
        count += 1;
    }

    zip.finish().context("Failed to finish ZIP")?;
    debug!("Wrote {} file(s) to {}", count, archive_path.display());
    Ok(archive_path)
}

/// `/`-separated path of `path` relative to `base`
fn entry_name(path: &Path, base: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(base)
        .with_context(|| format!("{} is outside {}", path.display(), base.display()))?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;

    #[test]
    fn test_archive_path_is_sibling() {
        assert_eq!(
            archive_path_for(Path::new("/cases/host1")).unwrap(),
            PathBuf::from("/cases/host1_EventLogsAndDumps.zip")
        );
        assert_eq!(
            archive_path_for(Path::new("/cases/host1/")).unwrap(),
            PathBuf::from("/cases/host1_EventLogsAndDumps.zip")
        );
        assert_eq!(
            archive_path_for(Path::new("out")).unwrap(),
            std::env::current_dir().unwrap().join("out_EventLogsAndDumps.zip")
        );
        assert!(archive_path_for(Path::new("/")).is_err());
    }

    #[test]
    fn test_archive_path_resolves_dot_segments() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(
            archive_path_for(Path::new(".")).unwrap(),
            archive_path_for(&cwd).unwrap()
        );
        assert_eq!(
            archive_path_for(Path::new("a/..")).unwrap(),
            archive_path_for(&cwd).unwrap()
        );
        assert_eq!(
            archive_path_for(Path::new("/cases/host1/..")).unwrap(),
            PathBuf::from("/cases_EventLogsAndDumps.zip")
        );
    }

    #[test]
    fn test_archive_of_dir_given_with_parent_segment() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("host-07");
        fs::create_dir_all(out.join("sub")).unwrap();
        fs::write(out.join("System.evtx"), b"sys").unwrap();

        let archive = create_archive(&out.join("sub").join("..")).unwrap();
        assert_eq!(archive, root.path().join("host-07_EventLogsAndDumps.zip"));

        let zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let names: Vec<&str> = zip.file_names().collect();
        assert_eq!(names, vec!["host-07/System.evtx"]);
    }

    #[test]
    fn test_archive_contains_every_file_under_top_folder() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("case-42");
        fs::create_dir_all(out.join("CrashDumps")).unwrap();
        fs::write(out.join("Application.evtx"), b"app").unwrap();
        fs::write(out.join("System.evtx"), b"sys").unwrap();
        fs::write(out.join("CrashDumps").join("a.dmp"), b"dump").unwrap();
        fs::create_dir(out.join("empty")).unwrap();

        let archive = create_archive(&out).unwrap();
        assert_eq!(archive, root.path().join("case-42_EventLogsAndDumps.zip"));

        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "case-42/Application.evtx",
                "case-42/CrashDumps/a.dmp",
                "case-42/System.evtx",
            ]
        );

        let mut entry = zip.by_name("case-42/CrashDumps/a.dmp").unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "dump");
    }

    #[test]
    fn test_archive_of_missing_dir_fails() {
        let root = tempfile::tempdir().unwrap();
        assert!(create_archive(&root.path().join("missing")).is_err());
    }
}
