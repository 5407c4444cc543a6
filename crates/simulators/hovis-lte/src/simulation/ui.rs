use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::widgets::{Borders, Gauge};
use ratatui::{
    layout::Alignment,
    style::{Color, Modifier, Style},
    widgets::{Block, BorderType, Paragraph},
    Frame,
};

use hovis_output::ui::{Renderer, SimContent};

#[derive(Default)]
pub struct SimRenderer {}

impl SimRenderer {
    pub fn new() -> Self {
        Self {}
    }
}

impl Renderer for SimRenderer {
    fn render_sim_ui(&self, content: &mut SimContent, frame: &mut Frame) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![
                Constraint::Percentage(30),
                Constraint::Percentage(20),
                Constraint::Percentage(50),
            ])
            .split(frame.area());

        frame.render_widget(
            Paragraph::new(format!(
                " ======================= H O V I S =======================\n\
              \n\
              Scenario: {}    Transport: {}\n\
              \n\
              ===========================================================
            ",
                content.metadata.scenario, content.metadata.transport
            ))
            .block(
                Block::bordered()
                    .title("hovis-lte")
                    .title_alignment(Alignment::Center)
                    .border_type(BorderType::Rounded),
            )
            .style(Style::default().fg(Color::Cyan).bg(Color::Black))
            .centered(),
            layout[0],
        );

        let completion = content.completion();
        let progress_text = format!(
            "Simulated: {} / {} ms. {:.2}%. ",
            content.progress.now,
            content.duration,
            completion * 100.0
        );
        frame.render_widget(
            Gauge::default()
                .gauge_style(
                    Style::default()
                        .fg(Color::LightBlue)
                        .bg(Color::Black)
                        .add_modifier(Modifier::ITALIC),
                )
                .label(progress_text)
                .ratio(completion)
                .use_unicode(true)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title("Simulation Progress")
                        .title_alignment(Alignment::Center),
                ),
            layout[1],
        );

        let simulation_details = format!(
            "Config File: {}\n\
        Log Path: {}\n\
        Pending Events: {}\n\
        Delivered Events: {}
        ",
            content.metadata.config_file,
            content.metadata.log_path,
            content.progress.pending_events,
            content.progress.delivered_events,
        );
        frame.render_widget(
            Paragraph::new(simulation_details)
                .block(Block::default().borders(Borders::ALL).title("More details"))
                .style(Style::default().fg(Color::White).bg(Color::Black))
                .alignment(Alignment::Left),
            layout[2],
        );
    }
}
