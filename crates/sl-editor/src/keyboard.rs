//! Keyboard navigation while a cell is selected or open for text entry.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavCommand {
    /// Relative move. `commit_first` commits a dirty edit before moving.
    Move {
        rows: i64,
        columns: i64,
        commit_first: bool,
    },
    FirstRow,
    LastRow,
    PageUp,
    PageDown,
    OpenTextEntry,
    LeaveTextEntry,
    ClearDraft,
    Input(char),
    Backspace,
}

fn step(rows: i64, columns: i64, commit_first: bool) -> NavCommand {
    NavCommand::Move {
        rows,
        columns,
        commit_first,
    }
}

/// Map a key to a navigation command. `text_entry` selects the mode.
pub fn interpret(key: KeyEvent, text_entry: bool) -> Option<NavCommand> {
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    if text_entry {
        return match key.code {
            KeyCode::Tab if shift => Some(step(0, -1, true)),
            KeyCode::Tab => Some(step(0, 1, true)),
            KeyCode::BackTab => Some(step(0, -1, true)),
            KeyCode::Enter if shift => Some(step(-1, 0, true)),
            KeyCode::Enter => Some(step(1, 0, true)),
            KeyCode::Esc => Some(NavCommand::LeaveTextEntry),
            KeyCode::Backspace => Some(NavCommand::Backspace),
            KeyCode::Char(c) if !ctrl => Some(NavCommand::Input(c)),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Up => Some(step(-1, 0, false)),
        KeyCode::Down => Some(step(1, 0, false)),
        KeyCode::Left => Some(step(0, -1, false)),
        KeyCode::Right => Some(step(0, 1, false)),
        KeyCode::Tab if shift => Some(step(0, -1, false)),
        KeyCode::Tab => Some(step(0, 1, false)),
        KeyCode::BackTab => Some(step(0, -1, false)),
        KeyCode::Enter if shift => Some(step(-1, 0, false)),
        KeyCode::Enter => Some(NavCommand::OpenTextEntry),
        KeyCode::Esc => Some(NavCommand::ClearDraft),
        KeyCode::Home if ctrl => Some(NavCommand::FirstRow),
        KeyCode::End if ctrl => Some(NavCommand::LastRow),
        KeyCode::PageUp => Some(NavCommand::PageUp),
        KeyCode::PageDown => Some(NavCommand::PageDown),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_selection_mode() {
        assert_eq!(
            interpret(key(KeyCode::Down, KeyModifiers::NONE), false),
            Some(step(1, 0, false))
        );
        assert_eq!(
            interpret(key(KeyCode::Enter, KeyModifiers::NONE), false),
            Some(NavCommand::OpenTextEntry)
        );
        assert_eq!(
            interpret(key(KeyCode::Esc, KeyModifiers::NONE), false),
            Some(NavCommand::ClearDraft)
        );
        assert_eq!(
            interpret(key(KeyCode::End, KeyModifiers::CONTROL), false),
            Some(NavCommand::LastRow)
        );
        assert_eq!(interpret(key(KeyCode::End, KeyModifiers::NONE), false), None);
        assert_eq!(interpret(key(KeyCode::Char('x'), KeyModifiers::NONE), false), None);
    }

    #[test]
    fn test_text_entry_mode_commits_before_moving() {
        assert_eq!(
            interpret(key(KeyCode::Tab, KeyModifiers::NONE), true),
            Some(step(0, 1, true))
        );
        assert_eq!(
            interpret(key(KeyCode::BackTab, KeyModifiers::SHIFT), true),
            Some(step(0, -1, true))
        );
        assert_eq!(
            interpret(key(KeyCode::Enter, KeyModifiers::SHIFT), true),
            Some(step(-1, 0, true))
        );
        assert_eq!(
            interpret(key(KeyCode::Esc, KeyModifiers::NONE), true),
            Some(NavCommand::LeaveTextEntry)
        );
        assert_eq!(
            interpret(key(KeyCode::Char('a'), KeyModifiers::NONE), true),
            Some(NavCommand::Input('a'))
        );
        // Arrows belong to the text input.
        assert_eq!(interpret(key(KeyCode::Left, KeyModifiers::NONE), true), None);
    }
}
