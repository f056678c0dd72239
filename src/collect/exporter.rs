//! Per-log export through an external command
//!
//! The default command is `wevtutil epl <log> <dest> /ow:true`. Each invocation
//! is bounded by a timeout and classified into an [`ExportOutcome`]; nothing
//! here returns an error to the caller.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::sanitize::sanitize_log_name;
use super::ExportOutcome;

/// Exports a single named log into an output directory
pub trait Exporter: Send + Sync + 'static {
    /// Path the export of `log_name` is written to
    fn destination(&self, log_name: &str, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}.evtx", sanitize_log_name(log_name)))
    }

    /// Export `log_name` into `output_dir`. Not interruptible once started.
    fn export(
        &self,
        log_name: &str,
        output_dir: &Path,
    ) -> impl Future<Output = ExportOutcome> + Send;
}

/// Export command configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Executable to run
    #[serde(default = "default_program")]
    pub program: String,
    /// Arguments; `{log}` and `{dest}` are replaced per invocation
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Extension of exported files (without the dot)
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Per-invocation timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Treat a non-zero exit status as a failed export
    #[serde(default)]
    pub strict_exit_status: bool,
}

fn default_program() -> String {
    "wevtutil".to_string()
}

fn default_args() -> Vec<String> {
    ["epl", "{log}", "{dest}", "/ow:true"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_extension() -> String {
    "evtx".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            extension: default_extension(),
            timeout_secs: default_timeout_secs(),
            strict_exit_status: false,
        }
    }
}

impl ExporterConfig {
    /// Fill in the argument template for one log
    pub fn expand_args(&self, log_name: &str, dest: &Path) -> Vec<String> {
        let dest = dest.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace("{log}", log_name).replace("{dest}", &dest))
            .collect()
    }
}

/// [`Exporter`] that spawns the configured command
#[derive(Debug, Clone)]
pub struct CommandExporter {
    config: ExporterConfig,
    timeout: Duration,
}

impl CommandExporter {
    pub fn new(config: ExporterConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        Self { config, timeout }
    }

    /// Override the configured timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, log_name: &str, dest: &Path) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(self.config.expand_args(log_name, dest))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd
    }
}

impl Exporter for CommandExporter {
    fn destination(&self, log_name: &str, output_dir: &Path) -> PathBuf {
        output_dir.join(format!(
            "{}.{}",
            sanitize_log_name(log_name),
            self.config.extension
        ))
    }

    fn export(
        &self,
        log_name: &str,
        output_dir: &Path,
    ) -> impl Future<Output = ExportOutcome> + Send {
        let name = log_name.to_string();
        let dest = self.destination(log_name, output_dir);
        let mut cmd = self.command(log_name, &dest);
        let program = self.config.program.clone();
        let limit = self.timeout;
        let strict = self.config.strict_exit_status;

        async move {
            debug!("Running {} for {} -> {}", program, name, dest.display());

            let child = match cmd.spawn() {
                Ok(child) => child,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return ExportOutcome::ToolUnavailable { name };
                }
                Err(e) => {
                    return ExportOutcome::Error {
                        name,
                        message: format!("Failed to start {}: {}", program, e),
                    };
                }
            };

            // タイムアウト時は future ごと child を drop し、kill_on_drop で終了させる
            let output = match timeout(limit, child.wait_with_output()).await {
                Err(_) => {
                    warn!("{} timed out after {:?} exporting {}", program, limit, name);
                    return ExportOutcome::TimedOut { name };
                }
                Ok(Err(e)) => {
                    return ExportOutcome::Error {
                        name,
                        message: format!("Failed to wait for {}: {}", program, e),
                    };
                }
                Ok(Ok(output)) => output,
            };

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                let detail = if stderr.is_empty() {
                    String::from_utf8_lossy(&output.stdout).trim().to_string()
                } else {
                    stderr
                };
                if strict {
                    return ExportOutcome::Error {
                        name,
                        message: format!("{} exited with {}: {}", program, output.status, detail),
                    };
                }
                warn!("{} exited with {} for {}: {}", program, output.status, name, detail);
            }

            ExportOutcome::Success { name, path: dest }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh_exporter(script: &str) -> CommandExporter {
        CommandExporter::new(ExporterConfig {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                script.to_string(),
                "sh".to_string(),
                "{log}".to_string(),
                "{dest}".to_string(),
            ],
            ..ExporterConfig::default()
        })
    }

    #[test]
    fn test_default_args_expand_to_wevtutil_epl() {
        let config = ExporterConfig::default();
        let args = config.expand_args("System", Path::new("/out/System.evtx"));
        assert_eq!(config.program, "wevtutil");
        assert_eq!(args, vec!["epl", "System", "/out/System.evtx", "/ow:true"]);
        assert_eq!(config.timeout_secs, 120);
    }

    #[test]
    fn test_destination_uses_sanitized_stem() {
        let exporter = CommandExporter::new(ExporterConfig::default());
        assert_eq!(
            exporter.destination("Microsoft-Windows-Sysmon/Operational", Path::new("/out")),
            PathBuf::from("/out/Microsoft-Windows-Sysmon_Operational.evtx")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_export_success_writes_destination() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = sh_exporter(r#"printf '%s' "$1" > "$2""#);

        let outcome = exporter.export("Application", dir.path()).await;

        let expected = dir.path().join("Application.evtx");
        assert_eq!(
            outcome,
            ExportOutcome::Success {
                name: "Application".to_string(),
                path: expected.clone(),
            }
        );
        assert_eq!(std::fs::read_to_string(expected).unwrap(), "Application");
    }

    #[tokio::test]
    async fn test_missing_tool_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CommandExporter::new(ExporterConfig {
            program: "eventlog-collector-no-such-tool".to_string(),
            ..ExporterConfig::default()
        });

        let outcome = exporter.export("System", dir.path()).await;
        assert_eq!(
            outcome,
            ExportOutcome::ToolUnavailable {
                name: "System".to_string()
            }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unstartable_tool_is_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("wevtutil");
        std::fs::write(&tool, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o644)).unwrap();

        let exporter = CommandExporter::new(ExporterConfig {
            program: tool.to_string_lossy().into_owned(),
            ..ExporterConfig::default()
        });

        match exporter.export("System", dir.path()).await {
            ExportOutcome::Error { name, message } => {
                assert_eq!(name, "System");
                assert!(message.starts_with("Failed to start"), "{}", message);
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_export_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = sh_exporter("sleep 5").with_timeout(Duration::from_millis(200));

        let started = Instant::now();
        let outcome = exporter.export("Security", dir.path()).await;

        assert_eq!(
            outcome,
            ExportOutcome::TimedOut {
                name: "Security".to_string()
            }
        );
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_success_unless_strict() {
        let dir = tempfile::tempdir().unwrap();
        let script = "echo 'access denied' >&2; exit 5";

        let lenient = sh_exporter(script).export("Security", dir.path()).await;
        assert!(lenient.is_success());

        let mut strict = sh_exporter(script);
        strict.config.strict_exit_status = true;
        match strict.export("Security", dir.path()).await {
            ExportOutcome::Error { name, message } => {
                assert_eq!(name, "Security");
                assert!(message.contains("access denied"));
            }
            other => panic!("expected error, got {:?}", other),
        }
    }
}
