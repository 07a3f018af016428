//! Dashboard screen rendering
//!
//! One row per entity: name, incidence colored by severity with its
//! tendency arrow and, for countries, the vaccination share with a progress
//! bar. Entities without data show "unavailable".

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::format::{incidence_text, progress_bar, vaccination_text, BAR_WIDTH, UNAVAILABLE};
use crate::app::App;
use crate::metrics::Severity;
use crate::view::{EntityView, ProgressTone};

/// Color for an incidence tier
pub fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Low => Color::Green,
        Severity::Moderate => Color::Yellow,
        Severity::High => Color::Red,
        Severity::Critical => Color::Magenta,
    }
}

/// Color for the vaccination progress bar
pub fn tone_color(tone: ProgressTone) -> Color {
    match tone {
        ProgressTone::Red => Color::Red,
        ProgressTone::Orange => Color::Rgb(255, 165, 0),
        ProgressTone::Green => Color::Green,
    }
}

/// Width of the name column
const LABEL_WIDTH: usize = 16;

pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(3),    // Entities
            Constraint::Length(2), // Footer
        ])
        .split(area);

    render_title(frame, app, chunks[0]);
    render_entities(frame, app, chunks[1]);
    render_footer(frame, app, chunks[2]);
}

fn render_title(frame: &mut Frame, app: &App, area: Rect) {
    let title = Paragraph::new(Line::from(vec![
        Span::styled(
            app.view.title.clone(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  {}", app.view.today.format("%b %-d, %Y")),
            Style::default().fg(Color::DarkGray),
        ),
    ]))
    .block(Block::default().borders(Borders::BOTTOM));

    frame.render_widget(title, area);
}

fn render_entities(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();

    for entity in &app.view.regions {
        lines.push(entity_line(entity));
    }
    if !app.view.regions.is_empty() && !app.view.countries.is_empty() {
        lines.push(Line::from(""));
    }
    for entity in &app.view.countries {
        lines.push(entity_line(entity));
    }

    frame.render_widget(Paragraph::new(lines), area);
}

fn entity_line(entity: &EntityView) -> Line<'static> {
    let mut spans = vec![Span::styled(
        format!("{:<width$}", entity.label, width = LABEL_WIDTH),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    let unavailable = || Span::styled(format!("{:<12}", UNAVAILABLE), Style::default().fg(Color::DarkGray));

    match &entity.incidence {
        Some(Ok(incidence)) => spans.push(Span::styled(
            format!("{:<12}", incidence_text(incidence)),
            Style::default().fg(severity_color(incidence.severity)),
        )),
        Some(Err(_)) => spans.push(unavailable()),
        None => {}
    }

    match &entity.vaccination {
        Some(Ok(vaccination)) => {
            spans.push(Span::styled(
                progress_bar(vaccination.progress, BAR_WIDTH),
                Style::default().fg(tone_color(vaccination.tone)),
            ));
            spans.push(Span::raw(format!(" {}", vaccination_text(vaccination))));
        }
        Some(Err(_)) => spans.push(unavailable()),
        None => {}
    }

    Line::from(spans)
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::styled(
        app.view.footer.clone(),
        Style::default().fg(Color::DarkGray),
    )];
    if app.failed_loads > 0 {
        spans.push(Span::styled(
            format!("  {} source(s) failed", app.failed_loads),
            Style::default().fg(Color::Red),
        ));
    }
    spans.push(Span::styled(
        "  q quit  ? help",
        Style::default().fg(Color::DarkGray),
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
