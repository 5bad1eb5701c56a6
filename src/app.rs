use ratatui::layout::Rect;
use ratatui::widgets::{Paragraph, Wrap};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::InvokeClient;
use crate::state::{Action, ChatState, Command, SubmissionId};
use crate::stream::StreamEvent;
use crate::tui::AppEvent;
use crate::ui::transcript_lines;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub chat: ChatState,

    // Input editing
    pub cursor: usize, // cursor position in chat.input(), in chars

    // Transcript view
    pub scroll: u16,
    pub follow: bool, // keep the view pinned to the newest message
    pub chat_height: u16,
    pub chat_width: u16,
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    client: InvokeClient,
    events: mpsc::UnboundedSender<AppEvent>,
    task: Option<(SubmissionId, JoinHandle<()>)>,
}

impl App {
    pub fn new(client: InvokeClient, events: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self {
            should_quit: false,
            chat: ChatState::new(),
            cursor: 0,
            scroll: 0,
            follow: true,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,
            animation_frame: 0,
            client,
            events,
            task: None,
        }
    }

    pub fn endpoint(&self) -> &str {
        self.client.endpoint()
    }

    pub fn stream_mode(&self) -> &'static str {
        self.client.mode().as_str()
    }

    /// Run an action through the chat state and carry out whatever it asks for.
    pub fn dispatch(&mut self, action: Action) {
        if let Some(command) = self.chat.update(action) {
            self.execute(command);
        }
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Send(submission) => {
                self.abort_task();

                let client = self.client.clone();
                let tx = self.events.clone();
                let id = submission.id;
                let handle = tokio::spawn(async move {
                    client
                        .invoke(&submission.input, |event| {
                            let _ = tx.send(AppEvent::Stream { id, event });
                        })
                        .await;
                });
                self.task = Some((id, handle));
            }
            Command::Cancel(id) => {
                tracing::debug!(submission = id.0, "cancelling submission");
                self.abort_task();
            }
        }
    }

    fn abort_task(&mut self) {
        if let Some((id, handle)) = self.task.take() {
            if !handle.is_finished() {
                tracing::debug!(submission = id.0, "aborting in-flight request");
                handle.abort();
            }
        }
    }

    pub fn has_running_task(&self) -> bool {
        self.task.as_ref().is_some_and(|(_, handle)| !handle.is_finished())
    }

    pub fn handle_stream(&mut self, id: SubmissionId, event: StreamEvent) {
        self.dispatch(Action::Stream { id, event });
        if !self.chat.is_pending() {
            // the task has reported its last event
            if self.task.as_ref().is_some_and(|(task_id, _)| *task_id == id) {
                self.task = None;
            }
        }
        self.scroll_to_bottom();
    }

    pub fn submit(&mut self) {
        self.dispatch(Action::Submit);
        self.cursor = self.chat.input().chars().count();
        self.follow = true;
        self.scroll_to_bottom();
    }

    /// Clear transcript, input, error and any in-flight request.
    pub fn clear_chat(&mut self) {
        self.dispatch(Action::Reset);
        self.cursor = 0;
        self.scroll = 0;
        self.follow = true;
        self.animation_frame = 0;
    }

    // Input editing
    pub fn insert_char(&mut self, c: char) {
        let mut input = self.chat.input().to_string();
        let byte_pos = char_to_byte_index(&input, self.cursor);
        input.insert(byte_pos, c);
        self.cursor += 1;
        self.dispatch(Action::SetInput(input));
    }

    pub fn delete_char(&mut self) {
        if self.cursor > 0 {
            let mut input = self.chat.input().to_string();
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&input, self.cursor);
            input.remove(byte_pos);
            self.dispatch(Action::SetInput(input));
        }
    }

    pub fn delete_char_forward(&mut self) {
        let char_count = self.chat.input().chars().count();
        if self.cursor < char_count {
            let mut input = self.chat.input().to_string();
            let byte_pos = char_to_byte_index(&input, self.cursor);
            input.remove(byte_pos);
            self.dispatch(Action::SetInput(input));
        }
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        let char_count = self.chat.input().chars().count();
        self.cursor = (self.cursor + 1).min(char_count);
    }

    pub fn move_cursor_start(&mut self) {
        self.cursor = 0;
    }

    pub fn move_cursor_end(&mut self) {
        self.cursor = self.chat.input().chars().count();
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.chat.is_pending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Transcript scrolling
    pub fn scroll_up(&mut self, amount: u16) {
        self.scroll = self.scroll.saturating_sub(amount);
        self.follow = false;
    }

    pub fn scroll_down(&mut self, amount: u16) {
        let max_scroll = self.max_scroll();
        self.scroll = self.scroll.saturating_add(amount).min(max_scroll);
        self.follow = self.scroll >= max_scroll;
    }

    pub fn half_page(&self) -> u16 {
        (self.visible_height() / 2).max(1)
    }

    /// Keep the newest message in view unless the user scrolled away.
    pub fn scroll_to_bottom(&mut self) {
        if self.follow {
            self.scroll = self.max_scroll();
        }
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    fn max_scroll(&self) -> u16 {
        self.transcript_height().saturating_sub(self.visible_height())
    }

    /// Number of terminal rows the transcript takes at the current width.
    pub fn transcript_height(&self) -> u16 {
        let wrap_width = if self.chat_width > 0 { self.chat_width } else { 50 };

        // Same lines and wrap settings the chat pane renders with
        let rows = Paragraph::new(transcript_lines(self))
            .wrap(Wrap { trim: false })
            .line_count(wrap_width);
        u16::try_from(rows).unwrap_or(u16::MAX)
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.abort_task();
    }
}
