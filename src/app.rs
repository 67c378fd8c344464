use anyhow::Result;
use chrono::{DateTime, Local};
use tokio::task::JoinHandle;

use crate::chat::{CareClient, CONNECT_ERROR_REPLY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

/// One transcript entry. Immutable once appended.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Local>,
    /// True only for bot entries synthesized from a transport failure.
    pub is_error: bool,
}

/// The chat session controller: owns the transcript, the pending input
/// buffer, and the busy flag. The UI renders whatever this exposes and feeds
/// raw input events back in; it holds no conversation state of its own.
pub struct App {
    pub should_quit: bool,

    // Conversation state
    pub transcript: Vec<ChatMessage>,
    pub input: String,
    pub input_cursor: usize, // char index into input
    /// True iff a send has been issued and not yet resolved. `submit` refuses
    /// new requests while this is set, so at most one call is ever in flight.
    pub busy: bool,
    pub pending_reply: Option<JoinHandle<Result<String>>>,

    // Bumped after every mutation. The render loop (or a test harness)
    // compares revisions to know when a fresh snapshot needs drawing.
    revision: u64,

    // Presentation state
    pub chat_scroll: u16,
    pub chat_height: u16, // inner chat area, set during render
    pub chat_width: u16,
    pub animation_frame: u8, // 0-2 for the thinking ellipsis

    // Backend
    pub client: CareClient,
    pub backend_status: Option<String>,
}

impl App {
    pub fn new(client: CareClient) -> Self {
        Self {
            should_quit: false,

            transcript: Vec::new(),
            input: String::new(),
            input_cursor: 0,
            busy: false,
            pending_reply: None,

            revision: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,

            client,
            backend_status: None,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn publish(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Force a redraw without changing conversation state (e.g. on resize).
    pub fn request_redraw(&mut self) {
        self.publish();
    }

    /// Submit the current input buffer as a user turn.
    ///
    /// A no-op while a request is in flight or when the buffer is blank;
    /// that's a UI guard, not a failure. The busy check here, not the input
    /// box's visual state, is what enforces the one-request-at-a-time
    /// contract.
    pub fn submit(&mut self) {
        if self.busy || self.input.trim().is_empty() {
            return;
        }

        let text = std::mem::take(&mut self.input);
        self.input_cursor = 0;
        self.push_message(text.clone(), Sender::User, false);
        self.busy = true;

        let client = self.client.clone();
        self.pending_reply = Some(tokio::spawn(async move { client.send(&text).await }));

        self.scroll_to_bottom();
        self.publish();
    }

    /// Fold the resolved send back into the transcript and end the turn.
    ///
    /// Success and failure take the same path: a failure becomes a regular
    /// bot message carrying the apology text with `is_error` set. Busy is
    /// always cleared, so the session stays usable after any outcome.
    pub fn on_response(&mut self, result: Result<String>) {
        let (content, is_error) = match result {
            Ok(reply) => (reply, false),
            Err(_) => (CONNECT_ERROR_REPLY.to_string(), true),
        };

        self.push_message(content, Sender::Bot, is_error);
        self.busy = false;
        self.pending_reply = None;

        self.scroll_to_bottom();
        self.publish();
    }

    fn push_message(&mut self, content: String, sender: Sender, is_error: bool) {
        // Clamp so transcript timestamps never go backwards, even if the
        // system clock does.
        let mut now = Local::now();
        if let Some(last) = self.transcript.last() {
            if now < last.timestamp {
                now = last.timestamp;
            }
        }
        self.transcript.push(ChatMessage {
            content,
            sender,
            timestamp: now,
            is_error,
        });
    }

    /// Drop the local transcript. Refused while a request is in flight so an
    /// eventual reply never lands in an empty conversation. Returns whether
    /// anything was cleared, so the caller knows to reset the backend too.
    pub fn clear_conversation(&mut self) -> bool {
        if self.busy || self.transcript.is_empty() {
            return false;
        }
        self.transcript.clear();
        self.chat_scroll = 0;
        self.publish();
        true
    }

    // Input buffer editing. Unconditional: edits are accepted even while a
    // request is in flight. Cursor is a char index; byte positions are
    // derived per edit for UTF-8 safety.

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
        self.input.insert(byte_pos, c);
        self.input_cursor += 1;
        self.publish();
    }

    pub fn delete_back(&mut self) {
        if self.input_cursor > 0 {
            self.input_cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
            self.publish();
        }
    }

    pub fn delete_forward(&mut self) {
        if self.input_cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
            self.publish();
        }
    }

    pub fn cursor_left(&mut self) {
        if self.input_cursor > 0 {
            self.input_cursor -= 1;
            self.publish();
        }
    }

    pub fn cursor_right(&mut self) {
        if self.input_cursor < self.input.chars().count() {
            self.input_cursor += 1;
            self.publish();
        }
    }

    pub fn cursor_home(&mut self) {
        if self.input_cursor != 0 {
            self.input_cursor = 0;
            self.publish();
        }
    }

    pub fn cursor_end(&mut self) {
        let end = self.input.chars().count();
        if self.input_cursor != end {
            self.input_cursor = end;
            self.publish();
        }
    }

    // Transcript scrolling

    pub fn scroll_up(&mut self, lines: u16) {
        let before = self.chat_scroll;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        if self.chat_scroll != before {
            self.publish();
        }
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let before = self.chat_scroll;
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll());
        if self.chat_scroll != before {
            self.publish();
        }
    }

    pub fn scroll_half_page_up(&mut self) {
        self.scroll_up((self.chat_height / 2).max(1));
    }

    pub fn scroll_half_page_down(&mut self) {
        self.scroll_down((self.chat_height / 2).max(1));
    }

    fn max_scroll(&self) -> u16 {
        let visible = if self.chat_height > 0 { self.chat_height } else { 20 };
        self.total_chat_lines().saturating_sub(visible)
    }

    fn scroll_to_bottom(&mut self) {
        self.chat_scroll = self.max_scroll();
    }

    /// Rendered line count of the chat pane, mirroring how the UI wraps it:
    /// a label line per message, wrapped content, a blank separator, plus the
    /// thinking indicator while busy.
    fn total_chat_lines(&self) -> u16 {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total: u16 = 0;
        for msg in &self.transcript {
            total += 1; // label line
            for line in msg.content.lines() {
                // Char count, not byte length, for proper UTF-8 handling
                let chars = line.chars().count();
                if chars == 0 {
                    total += 1;
                } else {
                    total += ((chars / wrap_width) + 1) as u16;
                }
            }
            total += 1; // blank line after message
        }

        if self.busy {
            total += 2; // "Bot:" + "Thinking..."
        }

        total
    }

    /// Advance the thinking ellipsis. Only publishes while a request is in
    /// flight, so idle ticks don't trigger redraws.
    pub fn tick_animation(&mut self) {
        if self.busy {
            self.animation_frame = (self.animation_frame + 1) % 3;
            self.publish();
        }
    }
}

/// Convert a character index to a byte index for UTF-8 safe string edits.
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn test_app() -> App {
        // Discard port: nothing listens there, so stray spawned sends fail
        // fast without touching a real backend.
        App::new(CareClient::new("http://127.0.0.1:9"))
    }

    #[tokio::test]
    async fn submit_appends_user_message_and_sets_busy() {
        let mut app = test_app();
        app.input = "Hello".to_string();
        app.input_cursor = 5;

        app.submit();

        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript[0].content, "Hello");
        assert_eq!(app.transcript[0].sender, Sender::User);
        assert!(!app.transcript[0].is_error);
        assert!(app.busy);
        assert!(app.pending_reply.is_some());
        assert!(app.input.is_empty());
        assert_eq!(app.input_cursor, 0);
    }

    #[tokio::test]
    async fn submit_while_busy_is_a_noop() {
        let mut app = test_app();
        app.input = "Hello".to_string();
        app.submit();

        let revision = app.revision();
        app.input = "again".to_string();
        app.submit();

        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.input, "again");
        assert_eq!(app.revision(), revision);
    }

    #[test]
    fn blank_submit_is_a_noop() {
        let mut app = test_app();
        app.input = "   ".to_string();

        let revision = app.revision();
        app.submit();

        assert!(app.transcript.is_empty());
        assert!(!app.busy);
        assert_eq!(app.input, "   ");
        assert_eq!(app.revision(), revision);
    }

    #[test]
    fn successful_response_appends_bot_message_and_clears_busy() {
        let mut app = test_app();
        app.push_message("Hello".to_string(), Sender::User, false);
        app.busy = true;

        app.on_response(Ok("Hi there!".to_string()));

        assert_eq!(app.transcript.len(), 2);
        let reply = &app.transcript[1];
        assert_eq!(reply.content, "Hi there!");
        assert_eq!(reply.sender, Sender::Bot);
        assert!(!reply.is_error);
        assert!(!app.busy);
        assert!(app.pending_reply.is_none());
    }

    #[test]
    fn failed_response_appends_apology_and_clears_busy() {
        let mut app = test_app();
        app.push_message("Help".to_string(), Sender::User, false);
        app.busy = true;

        app.on_response(Err(anyhow!("connection refused")));

        assert_eq!(app.transcript.len(), 2);
        let reply = &app.transcript[1];
        assert_eq!(reply.content, CONNECT_ERROR_REPLY);
        assert_eq!(reply.sender, Sender::Bot);
        assert!(reply.is_error);
        assert!(!app.busy);
    }

    #[tokio::test]
    async fn turns_alternate_in_transcript_order() {
        let mut app = test_app();

        app.input = "Hello".to_string();
        app.submit();
        app.on_response(Ok("Hi there!".to_string()));

        app.input = "Help".to_string();
        app.submit();
        app.on_response(Err(anyhow!("timed out")));

        let senders: Vec<Sender> = app.transcript.iter().map(|m| m.sender).collect();
        assert_eq!(
            senders,
            vec![Sender::User, Sender::Bot, Sender::User, Sender::Bot]
        );
        for pair in app.transcript.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn buffer_edits_are_utf8_safe_and_accepted_while_busy() {
        let mut app = test_app();
        app.busy = true;

        app.insert_char('ñ');
        app.insert_char('a');
        app.cursor_left();
        app.insert_char('b');
        assert_eq!(app.input, "ñba");

        app.delete_back();
        assert_eq!(app.input, "ña");
        app.delete_forward();
        assert_eq!(app.input, "ñ");
        assert_eq!(app.input_cursor, 1);
    }

    #[test]
    fn revision_bumps_on_mutation_but_not_on_idle_tick() {
        let mut app = test_app();

        let before = app.revision();
        app.insert_char('h');
        assert!(app.revision() > before);

        let before = app.revision();
        app.tick_animation();
        assert_eq!(app.revision(), before);

        app.busy = true;
        app.tick_animation();
        assert!(app.revision() > before);
    }

    #[test]
    fn clear_conversation_refused_while_busy() {
        let mut app = test_app();
        app.push_message("Hello".to_string(), Sender::User, false);
        app.busy = true;

        assert!(!app.clear_conversation());
        assert_eq!(app.transcript.len(), 1);

        app.busy = false;
        assert!(app.clear_conversation());
        assert!(app.transcript.is_empty());
        assert!(!app.clear_conversation());
    }
}
