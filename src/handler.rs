use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::App;
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => app.request_redraw(),
        AppEvent::Tick => {
            app.tick_animation();
            poll_pending_reply(app).await;
        }
    }
    Ok(())
}

/// Resolve the in-flight send if it has finished. Runs on every tick, so a
/// reply lands in the transcript within one tick interval of arriving.
async fn poll_pending_reply(app: &mut App) {
    let finished = app
        .pending_reply
        .as_ref()
        .map(|task| task.is_finished())
        .unwrap_or(false);
    if !finished {
        return;
    }

    if let Some(task) = app.pending_reply.take() {
        // A panicked send task is just another transport failure.
        let result = task.await.unwrap_or_else(|join_err| Err(join_err.into()));
        app.on_response(result);
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => app.should_quit = true,
            KeyCode::Char('l') => {
                if app.clear_conversation() {
                    // Reset the backend's rolling context too; best effort.
                    let client = app.client.clone();
                    tokio::spawn(async move {
                        let _ = client.clear_history().await;
                    });
                }
            }
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Enter => app.submit(),

        // Input buffer editing; accepted even while a request is in flight
        KeyCode::Char(c) => app.insert_char(c),
        KeyCode::Backspace => app.delete_back(),
        KeyCode::Delete => app.delete_forward(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),

        // Transcript scrolling
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::PageUp => app.scroll_half_page_up(),
        KeyCode::PageDown => app.scroll_half_page_down(),

        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}
