//! Event log and crash dump collection
//!
//! The collection pipeline exports named event logs through an external tool,
//! copies crash dumps, and optionally bundles the output directory into a ZIP.
//! Progress is reported as a stream of [`CollectionEvent`]s.

pub mod archive;
pub mod dumps;
pub mod exporter;
pub mod pipeline;
pub mod sanitize;

pub use archive::{archive_path_for, create_archive};
pub use dumps::{collect_dumps, DumpReport};
pub use exporter::{CommandExporter, Exporter};
pub use pipeline::{CollectionEvent, CollectionHandle, Collector, PipelineState};
pub use sanitize::sanitize_log_name;

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Default log names offered to the operator
pub const DEFAULT_LOG_NAMES: &[&str] = &["Application", "System", "Security", "Setup"];

/// Subdirectory of the output directory that receives crash dumps
pub const CRASH_DUMPS_SUBDIR: &str = "CrashDumps";

/// Input to one collection run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRequest {
    /// Logs to export, in order
    pub log_names: Vec<String>,
    /// Directory receiving exported logs (created if absent); absolute after
    /// [`CollectionRequest::validate`]
    pub output_dir: PathBuf,
    /// Copy crash dumps from `crash_dump_dir`
    pub include_crash_dumps: bool,
    /// Source of `*.dmp` files; only read when `include_crash_dumps` is set
    pub crash_dump_dir: PathBuf,
    /// Bundle the output directory into a ZIP after collection
    pub create_archive: bool,
}

impl CollectionRequest {
    /// Trim log names, drop blank ones, check the required inputs, and make
    /// `output_dir` absolute.
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        self.log_names = self
            .log_names
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect();

        if self.log_names.is_empty() {
            return Err(ValidationError::NoLogNames);
        }
        if is_blank(&self.output_dir) {
            return Err(ValidationError::EmptyOutputDir);
        }
        self.output_dir = absolute_path(&self.output_dir);
        Ok(self)
    }

    /// Destination directory for crash dumps
    pub fn crash_dumps_dest(&self) -> PathBuf {
        self.output_dir.join(CRASH_DUMPS_SUBDIR)
    }
}

/// Parse a comma-separated list of log names, dropping blanks.
pub fn parse_log_names(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Absolute form of `path` with `.` and `..` resolved lexically.
///
/// Relative paths are joined to the current directory. Symlinks are not
/// followed, so the result may not exist yet.
pub fn absolute_path(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(normalized.components().next_back(), Some(Component::Normal(_))) {
                    normalized.pop();
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

pub(crate) fn is_blank(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().trim().is_empty()
}

/// Result of exporting one log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Export command completed; the file is expected at `path`
    Success { name: String, path: PathBuf },
    /// Export tool missing on this host
    ToolUnavailable { name: String },
    /// Export exceeded the configured timeout
    TimedOut { name: String },
    /// Any other invocation failure
    Error { name: String, message: String },
}

impl ExportOutcome {
    pub fn log_name(&self) -> &str {
        match self {
            ExportOutcome::Success { name, .. }
            | ExportOutcome::ToolUnavailable { name }
            | ExportOutcome::TimedOut { name }
            | ExportOutcome::Error { name, .. } => name,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExportOutcome::Success { .. })
    }
}

/// Aggregate outcome of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionResult {
    pub exports: Vec<ExportOutcome>,
    pub dumps_copied: usize,
    pub archive_path: Option<PathBuf>,
    pub aborted: bool,
}

impl CollectionResult {
    pub fn exported_count(&self) -> usize {
        self.exports.iter().filter(|o| o.is_success()).count()
    }
}

/// Missing required input; the run is not started
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Enter at least one log name")]
    NoLogNames,
    #[error("Select an output folder")]
    EmptyOutputDir,
}

/// Reasons a run is refused before it starts
#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("a collection into {} is already running", .0.display())]
    AlreadyRunning(PathBuf),
}

/// Cooperative abort signal shared between the host and a running pipeline
///
/// Checked before each export and each dump copy; never interrupts an
/// in-flight process or copy.
#[derive(Debug, Clone, Default)]
pub struct AbortToken(Arc<AtomicBool>);

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(names: &[&str], out: &str) -> CollectionRequest {
        CollectionRequest {
            log_names: names.iter().map(|s| s.to_string()).collect(),
            output_dir: PathBuf::from(out),
            include_crash_dumps: false,
            crash_dump_dir: PathBuf::new(),
            create_archive: false,
        }
    }

    #[test]
    fn test_validate_trims_and_drops_blank_names() {
        let req = request(&[" Application ", "", "  ", "System"], "/tmp/out")
            .validate()
            .unwrap();
        assert_eq!(req.log_names, vec!["Application", "System"]);
    }

    #[test]
    fn test_validate_rejects_missing_inputs() {
        assert_eq!(
            request(&[], "/tmp/out").validate(),
            Err(ValidationError::NoLogNames)
        );
        assert_eq!(
            request(&[" ", ""], "/tmp/out").validate(),
            Err(ValidationError::NoLogNames)
        );
        assert_eq!(
            request(&["System"], "   ").validate(),
            Err(ValidationError::EmptyOutputDir)
        );
    }

    #[test]
    fn test_validate_makes_output_dir_absolute() {
        let cwd = std::env::current_dir().unwrap();
        let req = request(&["System"], ".").validate().unwrap();
        assert_eq!(req.output_dir, cwd);

        let req = request(&["System"], "/cases/host1/../host2/./out").validate().unwrap();
        assert_eq!(req.output_dir, PathBuf::from("/cases/host2/out"));
        assert_eq!(req.crash_dumps_dest(), PathBuf::from("/cases/host2/out/CrashDumps"));
    }

    #[test]
    fn test_absolute_path() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(absolute_path(Path::new("out")), cwd.join("out"));
        assert_eq!(absolute_path(Path::new("a/..")), cwd);
        assert_eq!(absolute_path(Path::new("/cases/host1/..")), PathBuf::from("/cases"));
        assert_eq!(absolute_path(Path::new("/..")), PathBuf::from("/"));
    }

    #[test]
    fn test_parse_log_names() {
        assert_eq!(
            parse_log_names("Application, System,,Security , "),
            vec!["Application", "System", "Security"]
        );
        assert!(parse_log_names(" , ").is_empty());
    }

    #[test]
    fn test_abort_token_is_shared() {
        let token = AbortToken::new();
        let clone = token.clone();
        assert!(!clone.is_aborted());
        token.abort();
        assert!(clone.is_aborted());
    }

    #[test]
    fn test_result_counts_successes() {
        let result = CollectionResult {
            exports: vec![
                ExportOutcome::Success {
                    name: "Application".into(),
                    path: PathBuf::from("/out/Application.evtx"),
                },
                ExportOutcome::ToolUnavailable { name: "System".into() },
            ],
            ..Default::default()
        };
        assert_eq!(result.exported_count(), 1);
        assert_eq!(result.exports[1].log_name(), "System");
    }
}
