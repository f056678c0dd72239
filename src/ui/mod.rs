pub mod form;
pub mod help_view;
pub mod log_view;
pub mod status_bar;

pub use form::{Field, FormState, TextInput};

use ratatui::{
    layout::{Constraint, Layout, Rect},
    Frame,
};

use crate::app::{AppState, ViewMode};

/// フォームの高さ（5項目 + 枠線）
const FORM_HEIGHT: u16 = 7;

/// 中央配置用のRect計算（共通ユーティリティ）
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(area);

    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}

/// メインUIを描画
pub fn render(frame: &mut Frame, state: &AppState) {
    let area = frame.area();

    // メインレイアウト: フォーム + ログ + ステータスバー
    let chunks = Layout::vertical([
        Constraint::Length(FORM_HEIGHT), // 入力フォーム
        Constraint::Min(3),              // ログ
        Constraint::Length(1),           // ステータスバー
    ])
    .split(area);

    form::render(frame, chunks[0], state);
    log_view::render(frame, chunks[1], state);
    status_bar::render(frame, chunks[2], state);

    // オーバーレイ
    match &state.view_mode {
        ViewMode::Help => help_view::render(frame, area),
        ViewMode::Form => {}
    }
}
