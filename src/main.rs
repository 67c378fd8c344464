use anyhow::Result;

mod app;
mod chat;
mod config;
mod handler;
mod tui;
mod ui;

use app::App;
use chat::CareClient;
use config::Config;
use tui::EventHandler;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().unwrap_or_else(|_| Config::new());
    if config.endpoint.is_none() {
        // First run: write the template so the endpoint is easy to find
        // and edit. Best effort; the default still applies without it.
        let _ = Config {
            endpoint: Some(config::DEFAULT_ENDPOINT.to_string()),
        }
        .save();
    }
    let client = CareClient::new(config.endpoint());

    // One probe before entering the alternate screen so the help line can
    // say whether the backend is reachable.
    let backend_status = client.health().await.ok();

    let mut app = App::new(client);
    app.backend_status = backend_status;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let run_result = run(&mut app, &mut terminal, &mut events).await;

    tui::restore()?;
    run_result
}

/// Draw-on-publish loop: redraw only when the app's revision has moved, then
/// block on the next event.
async fn run(app: &mut App, terminal: &mut tui::Tui, events: &mut EventHandler) -> Result<()> {
    let mut drawn_revision: Option<u64> = None;

    while !app.should_quit {
        if drawn_revision != Some(app.revision()) {
            terminal.draw(|frame| ui::render(app, frame))?;
            drawn_revision = Some(app.revision());
        }

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }

    Ok(())
}
