use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthChar;

use crate::app::AppState;

/// 行の内容から表示色を決める
fn line_style(line: &str) -> Style {
    let body = line.split_once("] ").map(|(_, rest)| rest).unwrap_or(line);
    let trimmed = body.trim_start();
    if trimmed.starts_with("Error")
        || trimmed.starts_with("ZIP error")
        || trimmed.starts_with("Cannot create")
        || trimmed.starts_with("Crash dump copy error")
    {
        Style::default().fg(Color::Red)
    } else if trimmed.starts_with("Timeout")
        || trimmed.starts_with("Skip")
        || trimmed.starts_with("Abort")
        || trimmed.starts_with("Crash dump folder missing")
    {
        Style::default().fg(Color::Yellow)
    } else if trimmed.starts_with("->") || trimmed.starts_with("Copied") {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::White)
    }
}

/// 表示幅 `width` で折り返す（文字単位）
fn wrap_line(line: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return Vec::new();
    }
    let mut rows = Vec::new();
    let mut current = String::new();
    let mut used = 0;
    for c in line.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width && !current.is_empty() {
            rows.push(std::mem::take(&mut current));
            used = 0;
        }
        current.push(c);
        used += w;
    }
    rows.push(current);
    rows
}

/// ログビューを描画（常に末尾を表示）
pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default()
        .title(" Log ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    let visible = inner.height as usize;

    // 折り返し後の行数で末尾から詰める
    let mut tail: Vec<Line> = Vec::with_capacity(visible);
    'lines: for line in state.log_lines.iter().rev() {
        let style = line_style(line);
        for row in wrap_line(line, inner.width as usize).into_iter().rev() {
            if tail.len() >= visible {
                break 'lines;
            }
            tail.push(Line::styled(row, style));
        }
    }
    tail.reverse();

    frame.render_widget(Paragraph::new(tail).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Config;
    use ratatui::{backend::TestBackend, Terminal};

    #[test]
    fn test_line_style() {
        assert_eq!(line_style("[10:00:00]   Error: System: boom").fg, Some(Color::Red));
        assert_eq!(line_style("[10:00:00]   Timeout: Security").fg, Some(Color::Yellow));
        assert_eq!(line_style("[10:00:00]   -> /out/System.evtx").fg, Some(Color::Green));
        assert_eq!(line_style("[10:00:00] Exporting System").fg, Some(Color::White));
    }

    #[test]
    fn test_wrap_line_by_display_width() {
        assert_eq!(wrap_line("abcdefg", 3), vec!["abc", "def", "g"]);
        assert_eq!(wrap_line("ログabc", 3), vec!["ロ", "グa", "bc"]);
        assert_eq!(wrap_line("", 3), vec![""]);
        assert!(wrap_line("abc", 0).is_empty());
    }

    #[test]
    fn test_newest_line_visible_after_wrapped_lines() {
        let mut state = AppState::new(&Config::default());
        for i in 0..3 {
            state.push_log(&format!(
                "Exporting Microsoft-Windows-Sysmon/Operational -> /cases/very/long/path/name/{}.evtx",
                i
            ));
        }
        state.push_log("LAST-LINE");

        let mut terminal = Terminal::new(TestBackend::new(40, 6)).unwrap();
        terminal
            .draw(|frame| render(frame, frame.area(), &state))
            .unwrap();

        let buffer = terminal.backend().buffer();
        let rows: Vec<String> = (0..buffer.area.height)
            .map(|y| {
                (0..buffer.area.width)
                    .map(|x| buffer[(x, y)].symbol())
                    .collect()
            })
            .collect();

        // 最終行（枠の直上）に最新のログ
        assert!(rows[4].contains("LAST-LINE"), "rows: {:#?}", rows);
        assert!(rows[3].contains(".evtx"), "rows: {:#?}", rows);
    }
}
