use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::collect::exporter::ExporterConfig;
use crate::collect::{CollectionRequest, DEFAULT_LOG_NAMES};

/// フォームの初期値（前回の入力を保存）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDefaults {
    /// エクスポートするログ名
    #[serde(default = "default_log_names")]
    pub log_names: Vec<String>,
    /// クラッシュダンプを含めるか
    #[serde(default = "default_true")]
    pub include_crash_dumps: bool,
    /// クラッシュダンプの取得元
    #[serde(default = "default_crash_dump_dir")]
    pub crash_dump_dir: PathBuf,
    /// 出力先フォルダ
    #[serde(default)]
    pub output_dir: PathBuf,
    /// 収集後にZIPを作成するか
    #[serde(default = "default_true")]
    pub create_archive: bool,
}

fn default_log_names() -> Vec<String> {
    DEFAULT_LOG_NAMES.iter().map(|s| s.to_string()).collect()
}

fn default_true() -> bool {
    true
}

/// `%LOCALAPPDATA%\CrashDumps`（Windows のユーザーモードダンプの既定位置）
fn default_crash_dump_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.data_local_dir().to_path_buf())
        .or_else(|| std::env::var_os("LOCALAPPDATA").map(PathBuf::from))
        .unwrap_or_default()
        .join("CrashDumps")
}

impl Default for CollectionDefaults {
    fn default() -> Self {
        Self {
            log_names: default_log_names(),
            include_crash_dumps: true,
            crash_dump_dir: default_crash_dump_dir(),
            output_dir: PathBuf::new(),
            create_archive: true,
        }
    }
}

impl CollectionDefaults {
    /// 現在の値からリクエストを組み立て（検証は Collector 側）
    pub fn to_request(&self) -> CollectionRequest {
        CollectionRequest {
            log_names: self.log_names.clone(),
            output_dir: self.output_dir.clone(),
            include_crash_dumps: self.include_crash_dumps,
            crash_dump_dir: self.crash_dump_dir.clone(),
            create_archive: self.create_archive,
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// 収集フォームの初期値
    #[serde(default)]
    pub collection: CollectionDefaults,
    /// エクスポートコマンド設定
    #[serde(default)]
    pub exporter: ExporterConfig,
}

impl Config {
    /// 設定ファイルから読み込み（存在しない場合はデフォルトを作成して保存）
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;
            Ok(config)
        } else {
            // 初回起動時はデフォルト設定をファイルに保存
            let config = Self::default();
            if let Err(e) = config.save_to(config_path) {
                tracing::warn!("Failed to save default config: {}", e);
            }
            Ok(config)
        }
    }

    /// 読み込みに失敗した場合はデフォルトを返す。
    ///
    /// 2つ目の値はファイルへ書き戻してよいか。壊れたファイルは上書きしない。
    pub fn load_or_default(config_path: &Path) -> (Self, bool) {
        match Self::load_from(config_path) {
            Ok(config) => (config, true),
            Err(e) => {
                tracing::warn!("Using default config: {:#}", e);
                (Self::default(), false)
            }
        }
    }

    /// 設定ファイルパスを取得
    pub fn config_path() -> Result<PathBuf> {
        // ~/.config/eventlog-collector/config.toml を使用
        let base_dirs = directories::BaseDirs::new()
            .ok_or_else(|| anyhow::anyhow!("Failed to determine home directory"))?;
        Ok(base_dirs
            .home_dir()
            .join(".config/eventlog-collector/config.toml"))
    }

    /// 現在の設定をファイルに保存
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(
            config.collection.log_names,
            vec!["Application", "System", "Security", "Setup"]
        );
        assert!(config.collection.include_crash_dumps);
        assert!(config.collection.create_archive);
        assert!(config.collection.crash_dump_dir.ends_with("CrashDumps"));
        assert_eq!(config.exporter.program, "wevtutil");
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.collection.output_dir = PathBuf::from("/cases/host1");
        config.collection.log_names = vec!["System".to_string()];
        config.exporter.timeout_secs = 30;
        config.exporter.strict_exit_status = true;
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[collection]\noutput_dir = \"/evidence\"\n\n[exporter]\ntimeout_secs = 10\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.collection.output_dir, PathBuf::from("/evidence"));
        assert_eq!(config.collection.log_names.len(), 4);
        assert_eq!(config.exporter.timeout_secs, 10);
        assert_eq!(config.exporter.args, ExporterConfig::default().args);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "collection = 3").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_unparsable_file_is_not_writable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let original = "[exporter]\nprogram = \"custom-tool\"\ntimeout_secs = \"soon\"\n";
        std::fs::write(&path, original).unwrap();

        let (config, writable) = Config::load_or_default(&path);
        assert_eq!(config, Config::default());
        assert!(!writable);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);

        let (_, writable) = Config::load_or_default(&dir.path().join("fresh.toml"));
        assert!(writable);
    }

    #[test]
    fn test_to_request() {
        let defaults = CollectionDefaults {
            output_dir: PathBuf::from("/out"),
            create_archive: false,
            ..CollectionDefaults::default()
        };
        let request = defaults.to_request();
        assert_eq!(request.output_dir, PathBuf::from("/out"));
        assert_eq!(request.log_names.len(), 4);
        assert!(!request.create_archive);
    }
}
