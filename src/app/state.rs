use chrono::Local;

use crate::app::config::Config;
use crate::app::events::Action;
use crate::collect::{CollectionEvent, CollectionHandle, CollectionRequest, PipelineState};
use crate::ui::form::FormState;

/// ログビューに保持する最大行数
const MAX_LOG_LINES: usize = 5000;

/// アプリケーションの表示モード
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Form,
    Help,
}

/// アクション処理の結果、main 側で実行すべき操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// このリクエストで収集を開始
    StartCollection(CollectionRequest),
    /// 実行中の収集を中断
    AbortCollection,
}

/// アプリケーション状態
pub struct AppState {
    pub form: FormState,
    pub view_mode: ViewMode,
    /// パイプラインの現在状態
    pub pipeline_state: PipelineState,
    /// ログビューの行（追記のみ）
    pub log_lines: Vec<String>,
    /// 一時的なステータスメッセージ（バリデーションエラー等）
    pub status_message: Option<String>,
    /// 実行中の収集
    pub collection: Option<CollectionHandle>,
    /// 中断要求済み
    pub abort_requested: bool,
    pub should_quit: bool,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            form: FormState::from_defaults(&config.collection),
            view_mode: ViewMode::default(),
            pipeline_state: PipelineState::Idle,
            log_lines: Vec::new(),
            status_message: None,
            collection: None,
            abort_requested: false,
            should_quit: false,
        }
    }

    /// 収集が実行中か
    pub fn is_running(&self) -> bool {
        self.collection.is_some()
    }

    /// ステータスバーの表示文字列
    pub fn status_text(&self) -> &str {
        if let Some(ref msg) = self.status_message {
            return msg;
        }
        if self.abort_requested && self.pipeline_state.is_running() {
            return "Aborting...";
        }
        self.pipeline_state.status_text()
    }

    /// キーアクションを処理
    pub fn handle_action(&mut self, action: Action) -> Option<Command> {
        if self.view_mode == ViewMode::Help {
            if matches!(action, Action::ToggleHelp | Action::Abort) {
                self.view_mode = ViewMode::Form;
            } else if action == Action::Quit {
                return self.request_quit();
            }
            return None;
        }

        match action {
            Action::Quit => return self.request_quit(),
            Action::ToggleHelp => self.view_mode = ViewMode::Help,
            Action::Collect => return self.request_start(),
            Action::Abort => {
                if self.is_running() {
                    return self.request_abort();
                }
                self.status_message = None;
            }
            Action::NextField => self.form.focus = self.form.focus.next(),
            Action::PrevField => self.form.focus = self.form.focus.prev(),
            _ if self.is_running() => {
                // 実行中はフォームを編集しない
            }
            Action::Input(' ') if self.form.focus.is_toggle() => self.form.toggle_focused(),
            Action::Input(c) => self.edit(|input| input.insert_char(c)),
            Action::Backspace => self.edit(|input| input.backspace()),
            Action::Delete => self.edit(|input| input.delete()),
            Action::CursorLeft => self.edit(|input| input.move_left()),
            Action::CursorRight => self.edit(|input| input.move_right()),
            Action::CursorHome => self.edit(|input| input.move_home()),
            Action::CursorEnd => self.edit(|input| input.move_end()),
            Action::None => {}
        }
        None
    }

    fn edit(&mut self, f: impl FnOnce(&mut crate::ui::form::TextInput)) {
        if let Some(input) = self.form.focused_input_mut() {
            f(input);
            self.status_message = None;
        }
    }

    fn request_start(&mut self) -> Option<Command> {
        if self.is_running() {
            self.status_message = Some("Collection already in progress".to_string());
            return None;
        }
        match self.form.to_defaults().to_request().validate() {
            Ok(request) => Some(Command::StartCollection(request)),
            Err(e) => {
                self.status_message = Some(e.to_string());
                None
            }
        }
    }

    fn request_abort(&mut self) -> Option<Command> {
        if self.abort_requested {
            return None;
        }
        self.abort_requested = true;
        self.push_log("Abort requested; stopping after the current item...");
        Some(Command::AbortCollection)
    }

    fn request_quit(&mut self) -> Option<Command> {
        self.should_quit = true;
        if self.is_running() {
            return self.request_abort();
        }
        None
    }

    /// 収集開始時の状態リセット（ログビューはクリア）
    pub fn begin_collection(&mut self, handle: CollectionHandle) {
        self.log_lines.clear();
        self.status_message = None;
        self.abort_requested = false;
        self.pipeline_state = PipelineState::Validating;
        self.collection = Some(handle);
    }

    /// 開始に失敗した場合
    pub fn collection_rejected(&mut self, message: String) {
        self.status_message = Some(message);
    }

    /// 実行中の収集から届いたイベントをすべて取り込む
    pub fn drain_collection_events(&mut self) {
        let mut events = Vec::new();
        let mut ended = false;
        if let Some(handle) = self.collection.as_mut() {
            // 終了判定は取り出しの前に行う（終了済みならイベントは全て送信済み）
            ended = handle.is_finished();
            while let Some(event) = handle.try_next_event() {
                events.push(event);
            }
        }
        for event in events {
            self.apply_collection_event(event);
        }

        // Finished を送らずにタスクが終わった（パニック等）
        if ended && self.collection.is_some() {
            tracing::error!("Collection task ended without a final event");
            self.collection = None;
            self.abort_requested = false;
            self.pipeline_state = PipelineState::Aborted;
            self.push_log("Collection stopped unexpectedly; see the log file for details.");
        }
    }

    /// パイプラインイベントを反映
    pub fn apply_collection_event(&mut self, event: CollectionEvent) {
        if let Some(line) = event.log_line() {
            self.push_log(&line);
        }
        match event {
            CollectionEvent::StateChanged(state) => self.pipeline_state = state,
            CollectionEvent::Finished(_) => {
                self.collection = None;
                self.abort_requested = false;
            }
            _ => {}
        }
    }

    /// タイムスタンプ付きでログを追記
    pub fn push_log(&mut self, line: &str) {
        let stamp = Local::now().format("%H:%M:%S");
        self.log_lines.push(format!("[{}] {}", stamp, line));
        if self.log_lines.len() > MAX_LOG_LINES {
            let excess = self.log_lines.len() - MAX_LOG_LINES;
            self.log_lines.drain(..excess);
        }
    }
}
