//! Input handling for the TUI.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::api::WorkerCommand;

use super::app::Action;

/// Convert a crossterm key event to an Action.
pub fn handle_key_event(key: KeyEvent) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Esc => Some(Action::Back),
        KeyCode::Up | KeyCode::Char('k') => Some(Action::Up),
        KeyCode::Down | KeyCode::Char('j') => Some(Action::Down),
        KeyCode::Left => Some(Action::Left),
        KeyCode::Right => Some(Action::Right),
        KeyCode::Enter => Some(Action::Select),
        KeyCode::Char('r') | KeyCode::F(5) => Some(Action::Refresh),
        KeyCode::Char('o') => Some(Action::Overview),
        KeyCode::Char('u') => Some(Action::Queue),
        KeyCode::Char('h') => Some(Action::History),
        KeyCode::Char('n') => Some(Action::Notifications),
        KeyCode::Char('c') => Some(Action::NewJob),
        KeyCode::Char('x') => Some(Action::Cancel),
        KeyCode::Char('t') => Some(Action::Retry),
        KeyCode::Char(' ') | KeyCode::Char('s') => Some(Action::ToggleSelect),
        KeyCode::Char('a') => Some(Action::SelectAll),
        KeyCode::Char('B') => Some(Action::BulkCancel),
        KeyCode::Char('p') => Some(Action::AutoRefresh),
        KeyCode::Char('e') => Some(Action::Export),
        KeyCode::Char('m') => Some(Action::MarkRead),
        KeyCode::Char('f') => Some(Action::CycleStatus),
        KeyCode::Char('S') => Some(Action::Worker(WorkerCommand::Start)),
        KeyCode::Char('X') => Some(Action::Worker(WorkerCommand::Stop)),
        KeyCode::Char('R') => Some(Action::Worker(WorkerCommand::Restart)),
        KeyCode::Char('1') => Some(Action::ToggleProcedure(0)),
        KeyCode::Char('2') => Some(Action::ToggleProcedure(1)),
        KeyCode::Char('+') => Some(Action::PriorityUp),
        KeyCode::Char('-') => Some(Action::PriorityDown),
        _ => None,
    }
}

/// Convert a crossterm Event to an Action.
pub fn handle_event(event: Event) -> Option<Action> {
    match event {
        Event::Key(key) => handle_key_event(key),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> Option<Action> {
        handle_key_event(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn keys_map_to_actions() {
        assert_eq!(press(KeyCode::Char('q')), Some(Action::Quit));
        assert_eq!(
            handle_key_event(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Action::Quit)
        );
        assert_eq!(press(KeyCode::Char('c')), Some(Action::NewJob));
        assert_eq!(press(KeyCode::Char('B')), Some(Action::BulkCancel));
        assert_eq!(
            press(KeyCode::Char('R')),
            Some(Action::Worker(WorkerCommand::Restart))
        );
        assert_eq!(press(KeyCode::Char('Z')), None);
    }
}
