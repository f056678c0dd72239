use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;

/// アプリケーション内部イベント
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// キー入力
    Key(KeyEvent),
    /// ターミナルリサイズ
    Resize(u16, u16),
}

/// ユーザーアクション（キー入力から変換）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// 次のフィールドへ
    NextField,
    /// 前のフィールドへ
    PrevField,
    /// 文字入力（チェックボックス上の Space はトグル）
    Input(char),
    Backspace,
    Delete,
    CursorLeft,
    CursorRight,
    CursorHome,
    CursorEnd,
    /// 収集開始
    Collect,
    /// 実行中の収集を中断 / オーバーレイを閉じる
    Abort,
    /// ヘルプ表示切替
    ToggleHelp,
    /// 終了
    Quit,
    /// 何もしない
    None,
}

impl From<KeyEvent> for Action {
    fn from(key: KeyEvent) -> Self {
        if key.kind == KeyEventKind::Release {
            return Action::None;
        }
        match (key.code, key.modifiers) {
            // 終了・開始（Ctrl 系を先に判定）
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Action::Quit,
            (KeyCode::Char('q'), KeyModifiers::CONTROL) => Action::Quit,
            (KeyCode::Char('r'), KeyModifiers::CONTROL) => Action::Collect,
            (KeyCode::F(5), _) => Action::Collect,
            (KeyCode::F(1), _) => Action::ToggleHelp,
            (KeyCode::Esc, _) => Action::Abort,
            // フォーカス移動
            (KeyCode::Tab | KeyCode::Down, _) => Action::NextField,
            (KeyCode::BackTab | KeyCode::Up, _) => Action::PrevField,
            (KeyCode::Enter, _) => Action::NextField,
            // 編集
            (KeyCode::Backspace, _) => Action::Backspace,
            (KeyCode::Delete, _) => Action::Delete,
            (KeyCode::Left, _) => Action::CursorLeft,
            (KeyCode::Right, _) => Action::CursorRight,
            (KeyCode::Home, _) => Action::CursorHome,
            (KeyCode::End, _) => Action::CursorEnd,
            (KeyCode::Char(c), m) if !m.contains(KeyModifiers::CONTROL) => Action::Input(c),
            // その他
            _ => Action::None,
        }
    }
}

/// イベントポーリング
pub fn poll_event(timeout: Duration) -> std::io::Result<Option<AppEvent>> {
    if event::poll(timeout)? {
        match event::read()? {
            Event::Key(key) => Ok(Some(AppEvent::Key(key))),
            Event::Resize(w, h) => Ok(Some(AppEvent::Resize(w, h))),
            _ => Ok(None),
        }
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(Action::from(key(KeyCode::F(5), KeyModifiers::NONE)), Action::Collect);
        assert_eq!(
            Action::from(key(KeyCode::Char('r'), KeyModifiers::CONTROL)),
            Action::Collect
        );
        assert_eq!(
            Action::from(key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Action::Quit
        );
        assert_eq!(Action::from(key(KeyCode::Esc, KeyModifiers::NONE)), Action::Abort);
        assert_eq!(
            Action::from(key(KeyCode::BackTab, KeyModifiers::SHIFT)),
            Action::PrevField
        );
    }

    #[test]
    fn test_plain_chars_are_input() {
        // q や r はフィールド入力として扱う
        assert_eq!(
            Action::from(key(KeyCode::Char('q'), KeyModifiers::NONE)),
            Action::Input('q')
        );
        assert_eq!(
            Action::from(key(KeyCode::Char('S'), KeyModifiers::SHIFT)),
            Action::Input('S')
        );
        assert_eq!(
            Action::from(key(KeyCode::Char(' '), KeyModifiers::NONE)),
            Action::Input(' ')
        );
    }
}
