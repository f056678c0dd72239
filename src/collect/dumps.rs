//! Crash dump copying

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{is_blank, AbortToken};

/// Extension identifying crash dump files
pub const DUMP_EXTENSION: &str = "dmp";

/// Outcome of a dump copy pass
#[derive(Debug, Default)]
pub struct DumpReport {
    /// Files copied successfully
    pub copied: usize,
    /// Files that failed to copy, with the reason
    pub errors: Vec<(PathBuf, io::Error)>,
}

/// Whether `dir` can be used as a crash dump source
pub fn is_valid_source(dir: &Path) -> bool {
    !is_blank(dir) && dir.is_dir()
}

/// List `*.dmp` files directly inside `dir`, sorted by name.
pub fn find_dumps(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(DUMP_EXTENSION))
        })
        .collect()
}

/// Copy every crash dump in `source_dir` into `dest_dir`.
///
/// Returns an empty report without touching `dest_dir` when the source is
/// blank or not a directory. A failed copy is recorded and the rest continue.
/// `abort` is checked before each file. `on_error` sees each failure as it
/// happens.
pub fn collect_dumps(
    source_dir: &Path,
    dest_dir: &Path,
    abort: &AbortToken,
    mut on_error: impl FnMut(&Path, &io::Error),
) -> io::Result<DumpReport> {
    let mut report = DumpReport::default();
    if !is_valid_source(source_dir) {
        return Ok(report);
    }

    fs::create_dir_all(dest_dir)?;

    for src in find_dumps(source_dir) {
        if abort.is_aborted() {
            debug!("Dump copy aborted after {} file(s)", report.copied);
            break;
        }
        let Some(file_name) = src.file_name() else {
            continue;
        };
        let dest = dest_dir.join(file_name);
        match copy_preserving_mtime(&src, &dest) {
            Ok(()) => report.copied += 1,
            Err(e) => {
                warn!("Failed to copy {}: {}", src.display(), e);
                on_error(&src, &e);
                report.errors.push((src, e));
            }
        }
    }

    Ok(report)
}

/// `fs::copy` carries permissions; the modification time is restored here.
fn copy_preserving_mtime(src: &Path, dest: &Path) -> io::Result<()> {
    fs::copy(src, dest)?;
    let modified = fs::metadata(src)?.modified()?;
    let file = fs::OpenOptions::new().write(true).open(dest)?;
    file.set_modified(modified)?;
    Ok(())
}
