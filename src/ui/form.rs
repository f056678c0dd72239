use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use std::path::PathBuf;
use unicode_width::UnicodeWidthChar;

use crate::app::config::CollectionDefaults;
use crate::app::AppState;
use crate::collect::parse_log_names;

/// 1行テキスト入力（カーソルは文字単位）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    value: String,
    cursor: usize,
}

impl TextInput {
    /// カーソルを末尾に置いて作成
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let cursor = value.chars().count();
        Self { value, cursor }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    /// 文字を入力
    pub fn insert_char(&mut self, c: char) {
        let idx = self.byte_index(self.cursor);
        self.value.insert(idx, c);
        self.cursor += 1;
    }

    /// バックスペース
    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let idx = self.byte_index(self.cursor);
            self.value.remove(idx);
        }
    }

    /// Delete
    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let idx = self.byte_index(self.cursor);
            self.value.remove(idx);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.value.chars().count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.value.chars().count();
    }

    /// 表示幅 `width` に収まる部分と、その中でのカーソル列。
    ///
    /// カーソルが常に見えるよう先頭側を読み飛ばす。
    pub fn visible_window(&self, width: usize) -> (String, usize) {
        if width == 0 {
            return (String::new(), 0);
        }
        let widths: Vec<usize> = self
            .value
            .chars()
            .map(|c| c.width().unwrap_or(0))
            .collect();
        let cursor_col: usize = widths[..self.cursor].iter().sum();

        let mut start = 0;
        let mut skipped = 0;
        while cursor_col - skipped >= width && start < self.cursor {
            skipped += widths[start];
            start += 1;
        }

        let mut used = 0;
        let visible: String = self
            .value
            .chars()
            .zip(widths.iter())
            .skip(start)
            .take_while(|(_, w)| {
                used += **w;
                used <= width
            })
            .map(|(c, _)| c)
            .collect();
        (visible, cursor_col - skipped)
    }
}

/// フォームの項目（表示順）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Field {
    #[default]
    LogNames,
    IncludeCrashDumps,
    CrashDumpDir,
    OutputDir,
    CreateArchive,
}

impl Field {
    const ALL: [Field; 5] = [
        Field::LogNames,
        Field::IncludeCrashDumps,
        Field::CrashDumpDir,
        Field::OutputDir,
        Field::CreateArchive,
    ];

    fn position(self) -> usize {
        Self::ALL.iter().position(|f| *f == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.position() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.position() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// チェックボックス項目か
    pub fn is_toggle(self) -> bool {
        matches!(self, Field::IncludeCrashDumps | Field::CreateArchive)
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::LogNames => "Log names",
            Field::IncludeCrashDumps => "Include crash dumps",
            Field::CrashDumpDir => "Crash dump folder",
            Field::OutputDir => "Output folder",
            Field::CreateArchive => "Create ZIP bundle after collection",
        }
    }
}

/// 収集フォームの入力状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    pub log_names: TextInput,
    pub include_crash_dumps: bool,
    pub crash_dump_dir: TextInput,
    pub output_dir: TextInput,
    pub create_archive: bool,
    pub focus: Field,
}

impl FormState {
    pub fn from_defaults(defaults: &CollectionDefaults) -> Self {
        Self {
            log_names: TextInput::new(defaults.log_names.join(", ")),
            include_crash_dumps: defaults.include_crash_dumps,
            crash_dump_dir: TextInput::new(defaults.crash_dump_dir.to_string_lossy()),
            output_dir: TextInput::new(defaults.output_dir.to_string_lossy()),
            create_archive: defaults.create_archive,
            focus: Field::default(),
        }
    }

    /// 入力値を設定値に変換（前後の空白は除去）
    pub fn to_defaults(&self) -> CollectionDefaults {
        CollectionDefaults {
            log_names: parse_log_names(self.log_names.value()),
            include_crash_dumps: self.include_crash_dumps,
            crash_dump_dir: PathBuf::from(self.crash_dump_dir.value().trim()),
            output_dir: PathBuf::from(self.output_dir.value().trim()),
            create_archive: self.create_archive,
        }
    }

    /// フォーカス中のテキスト入力
    pub fn focused_input_mut(&mut self) -> Option<&mut TextInput> {
        match self.focus {
            Field::LogNames => Some(&mut self.log_names),
            Field::CrashDumpDir => Some(&mut self.crash_dump_dir),
            Field::OutputDir => Some(&mut self.output_dir),
            Field::IncludeCrashDumps | Field::CreateArchive => None,
        }
    }

    fn input(&self, field: Field) -> Option<&TextInput> {
        match field {
            Field::LogNames => Some(&self.log_names),
            Field::CrashDumpDir => Some(&self.crash_dump_dir),
            Field::OutputDir => Some(&self.output_dir),
            Field::IncludeCrashDumps | Field::CreateArchive => None,
        }
    }

    fn checked(&self, field: Field) -> bool {
        match field {
            Field::IncludeCrashDumps => self.include_crash_dumps,
            Field::CreateArchive => self.create_archive,
            _ => false,
        }
    }

    /// フォーカス中のチェックボックスを切り替え
    pub fn toggle_focused(&mut self) {
        match self.focus {
            Field::IncludeCrashDumps => self.include_crash_dumps = !self.include_crash_dumps,
            Field::CreateArchive => self.create_archive = !self.create_archive,
            _ => {}
        }
    }
}

const LABEL_WIDTH: u16 = 22;

/// 収集フォームを描画
pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
    let form = &state.form;
    let editable = !state.is_running();

    let block = Block::default()
        .title(" Event Log & Crash Dump Collector ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::vertical([Constraint::Length(1); 5]).split(inner);

    for (field, row) in Field::ALL.iter().zip(rows.iter()) {
        let focused = *field == form.focus;
        let label_style = if focused {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let marker = if focused { "> " } else { "  " };

        let line = if field.is_toggle() {
            let check = if form.checked(*field) { "[x] " } else { "[ ] " };
            Line::from(vec![
                Span::styled(marker, label_style),
                Span::styled(check, Style::default().fg(Color::Green)),
                Span::styled(field.label(), label_style),
            ])
        } else {
            let value_width = row.width.saturating_sub(LABEL_WIDTH) as usize;
            let (value, cursor_col) = form
                .input(*field)
                .map(|i| i.visible_window(value_width))
                .unwrap_or_default();
            let value_style = if editable {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let line = Line::from(vec![
                Span::styled(marker, label_style),
                Span::styled(
                    format!("{:<width$}", format!("{}:", field.label()), width = LABEL_WIDTH as usize - 2),
                    label_style,
                ),
                Span::styled(value, value_style),
            ]);

            // カーソル位置を設定
            if focused && editable && value_width > 0 {
                let x = row.x + LABEL_WIDTH + cursor_col as u16;
                frame.set_cursor_position((x, row.y));
            }
            line
        };
        frame.render_widget(Paragraph::new(line), *row);
    }
}
