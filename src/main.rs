use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use eventlog_collector::app::{poll_event, Action, AppEvent, AppState, Command, Config};
use eventlog_collector::collect::{
    CollectionEvent, CollectionHandle, CollectionRequest, Collector, CommandExporter,
    PipelineState,
};
use eventlog_collector::ui;

/// 終了時に実行中の収集を待つ最大時間
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Event Log Collector - export event logs and crash dumps into a ZIP bundle
#[derive(Parser)]
#[command(name = "eventlog-collector")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Config file (defaults to ~/.config/eventlog-collector/config.toml)
    #[arg(long, env = "EVENTLOG_COLLECTOR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the TUI (default)
    Tui,
    /// Run one collection without the TUI, printing the log to stdout
    Collect(CollectArgs),
}

#[derive(Args)]
struct CollectArgs {
    /// Log names to export (comma-separated or repeated; defaults from config)
    #[arg(short = 'n', long = "log", value_delimiter = ',')]
    logs: Vec<String>,
    /// Output folder (defaults from config)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Crash dump folder (defaults from config)
    #[arg(long)]
    crash_dumps: Option<PathBuf>,
    /// Do not copy crash dumps
    #[arg(long)]
    no_crash_dumps: bool,
    /// Do not create a ZIP bundle
    #[arg(long)]
    no_zip: bool,
    /// Per-log export timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Treat a non-zero exit status of the export tool as a failure
    #[arg(long)]
    strict_exit_status: bool,
}

impl CollectArgs {
    /// コマンドライン指定を設定値に重ねる
    fn apply(self, config: &mut Config) -> CollectionRequest {
        let collection = &mut config.collection;
        if !self.logs.is_empty() {
            collection.log_names = self.logs;
        }
        if let Some(output) = self.output {
            collection.output_dir = output;
        }
        if let Some(dir) = self.crash_dumps {
            collection.crash_dump_dir = dir;
            collection.include_crash_dumps = true;
        }
        if self.no_crash_dumps {
            collection.include_crash_dumps = false;
        }
        if self.no_zip {
            collection.create_archive = false;
        }
        if let Some(timeout) = self.timeout {
            config.exporter.timeout_secs = timeout;
        }
        if self.strict_exit_status {
            config.exporter.strict_exit_status = true;
        }
        config.collection.to_request()
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ログ初期化
    init_logging(&cli.log_level)?;

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::config_path()?,
    };
    // 読み込めなかった設定ファイルは上書きしない
    let (config, writable) = Config::load_or_default(&config_path);
    let save_path = writable.then_some(config_path.as_path());

    match cli.command {
        Some(Commands::Collect(args)) => run_collect(args, config),
        Some(Commands::Tui) | None => run_tui(config, save_path),
    }
}

fn init_logging(level: &str) -> Result<()> {
    let log_dir = directories::ProjectDirs::from("", "", "eventlog-collector")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("eventlog-collector"));

    std::fs::create_dir_all(&log_dir)?;
    let log_file = std::fs::File::create(log_dir.join("eventlog-collector.log"))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(log_file).with_ansi(false))
        .init();

    info!("Event Log Collector starting");
    Ok(())
}

fn new_collector(config: &Config) -> Collector<CommandExporter> {
    Collector::new(CommandExporter::new(config.exporter.clone()))
}

/// TUIなしで1回収集する
fn run_collect(args: CollectArgs, mut config: Config) -> Result<()> {
    let request = args.apply(&mut config);
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async move {
        let collector = new_collector(&config);
        let mut handle = collector.start(request)?;

        // Ctrl-C は中断要求として扱う（実行中の項目は完了させる）
        let abort = handle.abort_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Abort requested; stopping after the current item...");
                abort.abort();
            }
        });

        println!("{}", PipelineState::Exporting.status_text());
        while let Some(event) = handle.next_event().await {
            if let Some(line) = event.log_line() {
                println!("{}", line);
            }
            if let CollectionEvent::StateChanged(state) = event {
                if !state.is_running() {
                    println!("{}", state.status_text());
                }
            }
        }

        let result = handle.wait().await?;
        info!(
            "Headless collection finished (aborted: {}, exported: {})",
            result.aborted,
            result.exported_count()
        );
        Ok::<_, anyhow::Error>(())
    })
}

fn run_tui(mut config: Config, save_path: Option<&Path>) -> Result<()> {
    // Create tokio runtime for the collection task
    let runtime = tokio::runtime::Runtime::new()?;
    let _enter = runtime.enter();
    let collector = new_collector(&config);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let mut state = AppState::new(&config);

    let result = run_app(&mut terminal, &mut state, &collector, &mut config, save_path);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // 中断済みの収集が現在の項目を終えるのを少し待つ
    if let Some(handle) = state.collection.take() {
        handle.abort();
        eprintln!("Waiting for the running collection to stop...");
        wait_for_shutdown(&runtime, handle);
    }

    result
}

fn wait_for_shutdown(runtime: &tokio::runtime::Runtime, handle: CollectionHandle) {
    let outcome = runtime.block_on(tokio::time::timeout(SHUTDOWN_GRACE, handle.wait()));
    match outcome {
        Ok(Ok(result)) => info!("Collection stopped (aborted: {})", result.aborted),
        Ok(Err(e)) => tracing::warn!("Collection task failed: {:#}", e),
        Err(_) => tracing::warn!("Collection did not stop within {:?}", SHUTDOWN_GRACE),
    }
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState,
    collector: &Collector<CommandExporter>,
    config: &mut Config,
    save_path: Option<&Path>,
) -> Result<()> {
    loop {
        // Check for collection events (non-blocking)
        state.drain_collection_events();

        terminal.draw(|frame| {
            ui::render(frame, state);
        })?;

        if let Some(event) = poll_event(Duration::from_millis(100))? {
            match event {
                AppEvent::Key(key) => {
                    let action = Action::from(key);
                    if let Some(command) = state.handle_action(action) {
                        execute_command(state, collector, config, save_path, command);
                    }
                }
                AppEvent::Resize(_, _) => {}
            }
        }

        if state.should_quit {
            break;
        }
    }

    Ok(())
}

/// AppState から要求された操作を実行
fn execute_command(
    state: &mut AppState,
    collector: &Collector<CommandExporter>,
    config: &mut Config,
    save_path: Option<&Path>,
    command: Command,
) {
    match command {
        Command::StartCollection(request) => match collector.start(request) {
            Ok(handle) => {
                state.begin_collection(handle);
                // 次回起動時のために入力値を保存
                config.collection = state.form.to_defaults();
                if let Some(path) = save_path {
                    if let Err(e) = config.save_to(path) {
                        tracing::warn!("Failed to save config: {}", e);
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Collection not started: {}", e);
                state.collection_rejected(e.to_string());
            }
        },
        Command::AbortCollection => {
            if let Some(ref handle) = state.collection {
                info!("Abort requested for {}", handle.output_dir().display());
                handle.abort();
            }
        }
    }
}
