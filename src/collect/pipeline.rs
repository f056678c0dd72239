//! Collection pipeline
//!
//! Runs export → crash dumps → archive for one [`CollectionRequest`] on a
//! background task. Progress is streamed as [`CollectionEvent`]s over a
//! channel; the host keeps an [`AbortToken`] to stop the run between items.
//! No step failure ends the run early; only validation refuses to start it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::archive::{archive_path_for, create_archive};
use super::dumps::{self, collect_dumps};
use super::exporter::Exporter;
use super::{
    AbortToken, CollectError, CollectionRequest, CollectionResult, ExportOutcome,
};

const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Pipeline progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Validating,
    Exporting,
    CopyingDumps,
    Archiving,
    Done,
    Aborted,
}

impl PipelineState {
    /// Status bar text
    pub fn status_text(&self) -> &'static str {
        match self {
            PipelineState::Idle => "Ready",
            PipelineState::Validating
            | PipelineState::Exporting
            | PipelineState::CopyingDumps
            | PipelineState::Archiving => "Collecting...",
            PipelineState::Done => "Done.",
            PipelineState::Aborted => "Aborted.",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self,
            PipelineState::Validating
                | PipelineState::Exporting
                | PipelineState::CopyingDumps
                | PipelineState::Archiving
        )
    }
}

/// Progress notification from a running pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionEvent {
    StateChanged(PipelineState),
    OutputDirCreating(PathBuf),
    /// The output folder could not be created; nothing else runs
    OutputDirFailed { path: PathBuf, message: String },
    ExportStarted { name: String, path: PathBuf },
    ExportFinished(ExportOutcome),
    DumpsStarted,
    /// Crash dumps requested but the source folder is missing or invalid
    DumpsSkipped { source: PathBuf },
    DumpCopyFailed { file: PathBuf, message: String },
    DumpsFailed(String),
    DumpsCopied(usize),
    ArchiveStarted(PathBuf),
    ArchiveCreated(PathBuf),
    ArchiveFailed(String),
    Aborted,
    /// Last event of every run
    Finished(CollectionResult),
}

impl CollectionEvent {
    /// Operator-facing log line, if the event has one
    pub fn log_line(&self) -> Option<String> {
        let line = match self {
            CollectionEvent::StateChanged(_) => return None,
            CollectionEvent::OutputDirCreating(path) => {
                format!("Creating output folder {}...", path.display())
            }
            CollectionEvent::OutputDirFailed { path, message } => {
                format!("Cannot create output folder {}: {}", path.display(), message)
            }
            CollectionEvent::ExportStarted { name, path } => {
                format!("Exporting {} -> {}", name, path.display())
            }
            CollectionEvent::ExportFinished(outcome) => match outcome {
                ExportOutcome::Success { path, .. } => format!("  -> {}", path.display()),
                ExportOutcome::ToolUnavailable { name } => {
                    format!("  Skipped (export tool not found or not supported here): {}", name)
                }
                ExportOutcome::TimedOut { name } => format!("  Timeout: {}", name),
                ExportOutcome::Error { name, message } => {
                    format!("  Error: {}: {}", name, message)
                }
            },
            CollectionEvent::DumpsStarted => "Copying crash dumps...".to_string(),
            CollectionEvent::DumpsSkipped { .. } => {
                "Crash dump folder missing or invalid; skipped.".to_string()
            }
            CollectionEvent::DumpCopyFailed { file, message } => {
                let name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.display().to_string());
                format!("  Skip {}: {}", name, message)
            }
            CollectionEvent::DumpsFailed(message) => {
                format!("  Crash dump copy error: {}", message)
            }
            CollectionEvent::DumpsCopied(count) => format!("  Copied {} crash dump(s).", count),
            CollectionEvent::ArchiveStarted(path) => format!("Creating ZIP: {}", path.display()),
            CollectionEvent::ArchiveCreated(path) => format!("  -> {}", path.display()),
            CollectionEvent::ArchiveFailed(message) => format!("  ZIP error: {}", message),
            CollectionEvent::Aborted => {
                "Aborted. Files collected so far were kept.".to_string()
            }
            CollectionEvent::Finished(result) => format!(
                "Finished: {}/{} log(s) exported, {} crash dump(s) copied{}.",
                result.exported_count(),
                result.exports.len(),
                result.dumps_copied,
                if result.archive_path.is_some() { ", ZIP created" } else { "" }
            ),
        };
        Some(line)
    }
}

/// Starts collection runs, at most one per output folder at a time
pub struct Collector<E: Exporter> {
    exporter: Arc<E>,
    active: Arc<Mutex<HashSet<PathBuf>>>,
}

impl<E: Exporter> Clone for Collector<E> {
    fn clone(&self) -> Self {
        Self {
            exporter: Arc::clone(&self.exporter),
            active: Arc::clone(&self.active),
        }
    }
}

impl<E: Exporter> Collector<E> {
    pub fn new(exporter: E) -> Self {
        Self {
            exporter: Arc::new(exporter),
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn exporter(&self) -> &E {
        &self.exporter
    }

    /// Validate `request` and run it on a background task.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(&self, request: CollectionRequest) -> Result<CollectionHandle, CollectError> {
        self.start_with(request, AbortToken::new())
    }

    /// Like [`Collector::start`], with a caller-supplied abort token
    pub fn start_with(
        &self,
        request: CollectionRequest,
        abort: AbortToken,
    ) -> Result<CollectionHandle, CollectError> {
        let request = request.validate()?;
        let guard = RunGuard::acquire(&self.active, &request.output_dir)?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let exporter = Arc::clone(&self.exporter);
        let task_abort = abort.clone();
        let output_dir = request.output_dir.clone();

        info!(
            "Starting collection of {} log(s) into {}",
            request.log_names.len(),
            output_dir.display()
        );

        let task = tokio::spawn(async move {
            let _guard = guard;
            run_pipeline(exporter.as_ref(), request, &task_abort, &tx).await
        });

        Ok(CollectionHandle {
            abort,
            events: rx,
            task,
            output_dir,
        })
    }
}

/// Host side of a running collection
pub struct CollectionHandle {
    abort: AbortToken,
    events: mpsc::Receiver<CollectionEvent>,
    task: JoinHandle<CollectionResult>,
    output_dir: PathBuf,
}

impl CollectionHandle {
    /// Request an abort; takes effect at the next checkpoint
    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn abort_token(&self) -> AbortToken {
        self.abort.clone()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Next event without waiting
    pub fn try_next_event(&mut self) -> Option<CollectionEvent> {
        self.events.try_recv().ok()
    }

    /// Next event; `None` once the run has ended and all events are drained
    pub async fn next_event(&mut self) -> Option<CollectionEvent> {
        self.events.recv().await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to end
    pub async fn wait(self) -> anyhow::Result<CollectionResult> {
        Ok(self.task.await?)
    }
}

/// Marks an output folder as busy for the lifetime of a run
struct RunGuard {
    active: Arc<Mutex<HashSet<PathBuf>>>,
    dir: PathBuf,
}

impl RunGuard {
    fn acquire(active: &Arc<Mutex<HashSet<PathBuf>>>, dir: &Path) -> Result<Self, CollectError> {
        let mut set = active.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(dir.to_path_buf()) {
            return Err(CollectError::AlreadyRunning(dir.to_path_buf()));
        }
        Ok(Self {
            active: Arc::clone(active),
            dir: dir.to_path_buf(),
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut set = self.active.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.dir);
    }
}

async fn emit(tx: &mpsc::Sender<CollectionEvent>, event: CollectionEvent) {
    if tx.send(event).await.is_err() {
        debug!("Collection event receiver dropped");
    }
}

async fn run_pipeline<E: Exporter>(
    exporter: &E,
    request: CollectionRequest,
    abort: &AbortToken,
    tx: &mpsc::Sender<CollectionEvent>,
) -> CollectionResult {
    let mut result = CollectionResult::default();
    let output_dir = request.output_dir.clone();

    emit(tx, CollectionEvent::StateChanged(PipelineState::Validating)).await;
    emit(tx, CollectionEvent::OutputDirCreating(output_dir.clone())).await;
    if let Err(e) = tokio::fs::create_dir_all(&output_dir).await {
        warn!("Failed to create {}: {}", output_dir.display(), e);
        emit(
            tx,
            CollectionEvent::OutputDirFailed {
                path: output_dir,
                message: e.to_string(),
            },
        )
        .await;
        return finish(tx, result, PipelineState::Done).await;
    }

    emit(tx, CollectionEvent::StateChanged(PipelineState::Exporting)).await;
    for name in &request.log_names {
        if abort.is_aborted() {
            return finish(tx, result, PipelineState::Aborted).await;
        }
        let path = exporter.destination(name, &output_dir);
        emit(
            tx,
            CollectionEvent::ExportStarted {
                name: name.clone(),
                path,
            },
        )
        .await;

        let outcome = exporter.export(name, &output_dir).await;
        debug!("Export of {} finished: {:?}", name, outcome);
        emit(tx, CollectionEvent::ExportFinished(outcome.clone())).await;
        result.exports.push(outcome);
    }

    if abort.is_aborted() {
        return finish(tx, result, PipelineState::Aborted).await;
    }

    if request.include_crash_dumps {
        if dumps::is_valid_source(&request.crash_dump_dir) {
            emit(tx, CollectionEvent::StateChanged(PipelineState::CopyingDumps)).await;
            emit(tx, CollectionEvent::DumpsStarted).await;
            result.dumps_copied = copy_dumps(&request, abort, tx).await;
        } else {
            emit(
                tx,
                CollectionEvent::DumpsSkipped {
                    source: request.crash_dump_dir.clone(),
                },
            )
            .await;
        }

        if abort.is_aborted() {
            return finish(tx, result, PipelineState::Aborted).await;
        }
    }

    if request.create_archive {
        emit(tx, CollectionEvent::StateChanged(PipelineState::Archiving)).await;
        result.archive_path = archive(&output_dir, tx).await;
    }

    finish(tx, result, PipelineState::Done).await
}

async fn copy_dumps(
    request: &CollectionRequest,
    abort: &AbortToken,
    tx: &mpsc::Sender<CollectionEvent>,
) -> usize {
    let source = request.crash_dump_dir.clone();
    let dest = request.crash_dumps_dest();
    let abort = abort.clone();
    let error_tx = tx.clone();

    // コピー中のエラーはその場でイベント化する（blocking スレッドから送信）
    let joined = tokio::task::spawn_blocking(move || {
        collect_dumps(&source, &dest, &abort, |file, e| {
            let _ = error_tx.blocking_send(CollectionEvent::DumpCopyFailed {
                file: file.to_path_buf(),
                message: e.to_string(),
            });
        })
    })
    .await;

    match joined {
        Ok(Ok(report)) => {
            emit(tx, CollectionEvent::DumpsCopied(report.copied)).await;
            report.copied
        }
        Ok(Err(e)) => {
            emit(tx, CollectionEvent::DumpsFailed(e.to_string())).await;
            0
        }
        Err(e) => {
            emit(tx, CollectionEvent::DumpsFailed(e.to_string())).await;
            0
        }
    }
}

async fn archive(output_dir: &Path, tx: &mpsc::Sender<CollectionEvent>) -> Option<PathBuf> {
    let path = match archive_path_for(output_dir) {
        Ok(path) => path,
        Err(e) => {
            emit(tx, CollectionEvent::ArchiveFailed(format!("{:#}", e))).await;
            return None;
        }
    };
    emit(tx, CollectionEvent::ArchiveStarted(path)).await;

    let dir = output_dir.to_path_buf();
    match tokio::task::spawn_blocking(move || create_archive(&dir)).await {
        Ok(Ok(path)) => {
            emit(tx, CollectionEvent::ArchiveCreated(path.clone())).await;
            Some(path)
        }
        Ok(Err(e)) => {
            warn!("ZIP creation failed: {:#}", e);
            emit(tx, CollectionEvent::ArchiveFailed(format!("{:#}", e))).await;
            None
        }
        Err(e) => {
            emit(tx, CollectionEvent::ArchiveFailed(e.to_string())).await;
            None
        }
    }
}

async fn finish(
    tx: &mpsc::Sender<CollectionEvent>,
    mut result: CollectionResult,
    state: PipelineState,
) -> CollectionResult {
    if state == PipelineState::Aborted {
        result.aborted = true;
        info!("Collection aborted after {} export(s)", result.exports.len());
        emit(tx, CollectionEvent::Aborted).await;
    } else {
        info!(
            "Collection finished: {}/{} exported, {} dump(s), archive: {:?}",
            result.exported_count(),
            result.exports.len(),
            result.dumps_copied,
            result.archive_path
        );
    }
    emit(tx, CollectionEvent::StateChanged(state)).await;
    emit(tx, CollectionEvent::Finished(result.clone())).await;
    result
}
