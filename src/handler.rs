use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::App;
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => {
            for c in text.replace("\r\n", "\n").chars() {
                app.insert_char(c);
            }
        }
        AppEvent::Resize(_, _) => app.scroll_to_bottom(),
        AppEvent::Tick => {
            app.tick_animation();
        }
        AppEvent::Stream { id, event } => app.handle_stream(id, event),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        // Quit
        KeyCode::Char('c') if ctrl => app.should_quit = true,
        KeyCode::Esc => app.should_quit = true,

        // Clear Chat
        KeyCode::Char('l') if ctrl => app.clear_chat(),

        // Alt+Enter or Shift+Enter starts a new line, plain Enter sends
        KeyCode::Enter
            if key.modifiers.intersects(KeyModifiers::ALT | KeyModifiers::SHIFT) =>
        {
            app.insert_char('\n');
        }
        KeyCode::Enter => app.submit(),

        // Transcript scrolling
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::PageUp => app.scroll_up(app.half_page()),
        KeyCode::PageDown => app.scroll_down(app.half_page()),
        KeyCode::Char('u') if ctrl => app.scroll_up(app.half_page()),
        KeyCode::Char('d') if ctrl => app.scroll_down(app.half_page()),

        // Input editing
        KeyCode::Backspace => app.delete_char(),
        KeyCode::Delete => app.delete_char_forward(),
        KeyCode::Left => app.move_cursor_left(),
        KeyCode::Right => app.move_cursor_right(),
        KeyCode::Home => app.move_cursor_start(),
        KeyCode::End => app.move_cursor_end(),
        KeyCode::Char(c) if !ctrl => app.insert_char(c),

        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InvokeClient;
    use crate::error::ErrorCategory;
    use crate::stream::StreamMode;
    use tokio::sync::mpsc;

    fn test_app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        App::new(InvokeClient::new("http://127.0.0.1:9/invoke", StreamMode::Replace), tx)
    }

    fn key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
        handle_event(app, AppEvent::Key(KeyEvent::new(code, modifiers)));
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            key(app, KeyCode::Char(c), KeyModifiers::NONE);
        }
    }

    fn scroll(app: &mut App, kind: MouseEventKind, column: u16, row: u16) {
        handle_event(
            app,
            AppEvent::Mouse(MouseEvent { kind, column, row, modifiers: KeyModifiers::NONE }),
        );
    }

    #[test]
    fn test_typing_and_alt_enter_builds_multiline_input() {
        let mut app = test_app();
        type_text(&mut app, "line one");
        key(&mut app, KeyCode::Enter, KeyModifiers::ALT);
        type_text(&mut app, "two");
        assert_eq!(app.chat.input(), "line one\ntwo");
        assert!(!app.chat.is_pending());

        key(&mut app, KeyCode::Backspace, KeyModifiers::NONE);
        assert_eq!(app.chat.input(), "line one\ntw");
    }

    #[test]
    fn test_enter_on_blank_input_sets_validation_error() {
        let mut app = test_app();
        type_text(&mut app, "  ");
        key(&mut app, KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(
            app.chat.error().map(|e| e.category()),
            Some(ErrorCategory::Validation)
        );
        assert!(app.chat.messages().is_empty());
    }

    #[test]
    fn test_ctrl_l_clears_input_and_error() {
        let mut app = test_app();
        key(&mut app, KeyCode::Enter, KeyModifiers::NONE);
        type_text(&mut app, "draft");
        key(&mut app, KeyCode::Char('l'), KeyModifiers::CONTROL);
        assert_eq!(app.chat.input(), "");
        assert!(app.chat.error().is_none());
        assert_eq!(app.cursor, 0);
    }

    #[test]
    fn test_quit_keys() {
        let mut app = test_app();
        key(&mut app, KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(app.should_quit);
        assert_eq!(app.chat.input(), "");

        let mut app = test_app();
        key(&mut app, KeyCode::Esc, KeyModifiers::NONE);
        assert!(app.should_quit);
    }

    #[test]
    fn test_paste_normalizes_line_endings() {
        let mut app = test_app();
        handle_event(&mut app, AppEvent::Paste("a\r\nb".to_string()));
        assert_eq!(app.chat.input(), "a\nb");
        assert_eq!(app.cursor, 3);
    }

    #[test]
    fn test_mouse_scroll_only_inside_chat_area() {
        let mut app = test_app();
        app.chat_area = Some(Rect::new(10, 0, 40, 10));
        app.scroll = 5;

        scroll(&mut app, MouseEventKind::ScrollUp, 2, 2);
        assert_eq!(app.scroll, 5);

        scroll(&mut app, MouseEventKind::ScrollUp, 20, 2);
        assert_eq!(app.scroll, 2);
        assert!(!app.follow);
    }
}
