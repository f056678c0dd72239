use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::app::AppState;
use crate::collect::PipelineState;

/// ステータスバーを描画
pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
    let color = if state.status_message.is_some() {
        Color::Red
    } else {
        match state.pipeline_state {
            PipelineState::Done => Color::Green,
            PipelineState::Aborted => Color::Yellow,
            PipelineState::Idle => Color::Gray,
            _ => Color::Cyan,
        }
    };
    let left_content = Span::styled(format!(" {} ", state.status_text()), Style::default().fg(color));

    let hint = if state.is_running() {
        " Esc: abort | F1: help "
    } else {
        " F5: collect | F1: help "
    };
    let help_hint = Span::styled(
        hint,
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    );
    let hint_width = hint.len() as u16;

    // 左右に分けて表示
    let left = Paragraph::new(Line::from(left_content));
    let right = Paragraph::new(Line::from(help_hint));

    // 左側
    let left_area = Rect {
        x: area.x,
        y: area.y,
        width: area.width.saturating_sub(hint_width),
        height: area.height,
    };

    // 右側
    let right_area = Rect {
        x: area.x + area.width.saturating_sub(hint_width),
        y: area.y,
        width: hint_width.min(area.width),
        height: area.height,
    };

    frame.render_widget(left, left_area);
    frame.render_widget(right, right_area);
}
