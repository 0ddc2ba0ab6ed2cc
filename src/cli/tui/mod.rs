//! Interactive TUI for jobdeck.
//!
//! Overview, queue monitor, history and notifications in one terminal
//! session. The controllers keep polling in the background; the draw loop
//! only copies their state out between key presses.

mod app;
mod input;
mod ui;

use std::io::{self, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event, execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::api::JobApi;
use crate::config::AppConfig;

use app::TuiApp;

/// How long to wait for input before redrawing with fresh state.
const FRAME_INTERVAL: Duration = Duration::from_millis(250);

/// Run the TUI against `api`. Exports land in `export_dir`.
pub async fn run(api: Arc<dyn JobApi>, config: &AppConfig, export_dir: PathBuf) -> Result<()> {
    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let mut app = TuiApp::new(api, config, export_dir);
    let result = run_app(&mut terminal, &mut app).await;
    app.shutdown();

    // Restore terminal
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut TuiApp,
) -> Result<()> {
    app.init().await;

    while app.running {
        terminal.draw(|frame| ui::render(frame, app))?;

        if event::poll(FRAME_INTERVAL)? {
            let event = event::read()?;
            if let Some(action) = input::handle_event(event) {
                app.handle_action(action).await;
            }
        } else {
            app.sync().await;
        }
    }

    Ok(())
}
