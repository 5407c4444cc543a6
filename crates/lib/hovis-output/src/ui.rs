use crossterm::event::KeyEvent;
use ratatui::Frame;

#[derive(Clone, Copy, Debug)]
pub enum Message {
    Key(KeyEvent),
    Resize(u16, u16),
    Progress(ProgressUpdate),
    Quit,
}

/// Snapshot of the run sent from the engine thread to the screen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub now: u64,
    pub pending_events: u64,
    pub delivered_events: u64,
}

#[derive(Debug, Clone, Default)]
pub struct SimUIMetadata {
    pub scenario: String,
    pub transport: String,
    pub config_file: String,
    pub log_path: String,
}

#[derive(Debug, Default)]
pub struct SimContent {
    pub running: bool,
    pub duration: u64,
    pub progress: ProgressUpdate,
    pub metadata: SimUIMetadata,
}

impl SimContent {
    pub fn new(duration: u64, metadata: SimUIMetadata) -> Self {
        Self {
            duration,
            running: true,
            metadata,
            ..Self::default()
        }
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn update(&mut self, progress: ProgressUpdate) {
        self.progress = progress;
    }

    pub fn completion(&self) -> f64 {
        if self.duration == 0 {
            return 1.0;
        }
        (self.progress.now as f64 / self.duration as f64).min(1.0)
    }
}

pub trait Renderer: Send {
    fn render_sim_ui(&self, content: &mut SimContent, frame: &mut Frame);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_is_a_fraction_of_the_run() {
        let mut content = SimContent::new(60000, SimUIMetadata::default());
        content.update(ProgressUpdate {
            now: 15000,
            ..ProgressUpdate::default()
        });
        assert_eq!(content.completion(), 0.25);
        content.quit();
        assert!(!content.running);
    }
}
