use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::centered_rect;

fn key_line(key: &'static str, text: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<10}", key), Style::default().fg(Color::Yellow)),
        Span::raw(text),
    ])
}

/// ヘルプオーバーレイを描画
pub fn render(frame: &mut Frame, area: Rect) {
    // 中央に配置
    let popup_area = centered_rect(60, 60, area);

    // 背景をクリア
    frame.render_widget(Clear, popup_area);

    let help_text = vec![
        Line::from(vec![
            Span::styled("Form", Style::default().add_modifier(Modifier::BOLD)),
        ]),
        Line::from(""),
        key_line("Tab/↓", "Next field"),
        key_line("S-Tab/↑", "Previous field"),
        key_line("Space", "Toggle checkbox"),
        key_line("←/→", "Move cursor"),
        Line::from(""),
        Line::from(vec![
            Span::styled("Collection", Style::default().add_modifier(Modifier::BOLD)),
        ]),
        Line::from(""),
        key_line("F5/C-r", "Collect"),
        key_line("Esc", "Abort after the current item"),
        Line::from(""),
        Line::from(vec![
            Span::styled("Other", Style::default().add_modifier(Modifier::BOLD)),
        ]),
        Line::from(""),
        key_line("F1", "Toggle this help"),
        key_line("C-c/C-q", "Quit"),
        Line::from(""),
        Line::from(Span::styled(
            "Exporting Security may require Administrator rights.",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(" Help ")
                .title_alignment(Alignment::Center)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .alignment(Alignment::Left);

    frame.render_widget(help, popup_area);
}
