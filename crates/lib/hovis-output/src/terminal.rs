use std::io;
use std::{error, panic};

use crossterm::event::{KeyCode, KeyEvent};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::Backend;
use ratatui::Terminal;

use crate::ui::{Renderer, SimContent};

pub type ContentResult<T> = Result<T, Box<dyn error::Error>>;

/// Progress screen drawn on standard error, leaving standard output to the telemetry stream.
#[derive(Debug)]
pub struct TerminalUI<B: Backend, R: Renderer> {
    terminal: Terminal<B>,
    renderer: R,
}

impl<B: Backend, R: Renderer> TerminalUI<B, R> {
    pub fn new(terminal: Terminal<B>, renderer: R) -> Self {
        Self { terminal, renderer }
    }

    /// Switches stderr to raw mode on the alternate screen. A panic restores the terminal
    /// before the default hook reports it.
    pub fn init(&mut self) -> ContentResult<()> {
        terminal::enable_raw_mode()?;
        crossterm::execute!(io::stderr(), EnterAlternateScreen)?;

        let panic_hook = panic::take_hook();
        panic::set_hook(Box::new(move |panic| {
            let _ = Self::reset();
            panic_hook(panic);
        }));

        self.terminal.hide_cursor()?;
        self.terminal.clear()?;
        Ok(())
    }

    pub fn draw_ui(&mut self, content: &mut SimContent) -> ContentResult<()> {
        self.terminal
            .draw(|frame| self.renderer.render_sim_ui(content, frame))?;
        Ok(())
    }

    fn reset() -> ContentResult<()> {
        terminal::disable_raw_mode()?;
        crossterm::execute!(io::stderr(), LeaveAlternateScreen)?;
        Ok(())
    }

    pub fn exit(&mut self) -> ContentResult<()> {
        Self::reset()?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

pub fn handle_sim_key_events(key_event: KeyEvent, content: &mut SimContent) {
    if let KeyCode::Esc | KeyCode::Char('q') = key_event.code {
        content.quit()
    }
}
