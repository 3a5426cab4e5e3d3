use std::time::Duration;

use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::{App, RunState};
use crate::executor::RunStatus;

/// Render the full TUI frame.
pub fn draw(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // status bar
            Constraint::Min(1),    // output area
            Constraint::Length(1), // help bar
        ])
        .split(frame.area());

    // ── Status bar ──────────────────────────────────────────────
    let (state_text, state_color) = status_text(&app.run_state);
    let mut spans = vec![
        Span::styled(
            format!(" {} ", app.command_line),
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {state_text} "),
            Style::default().fg(Color::Black).bg(state_color),
        ),
    ];
    if let Some(err) = &app.last_error {
        spans.push(Span::styled(
            format!(" watch error: {err} "),
            Style::default().fg(Color::White).bg(Color::Red),
        ));
    }
    let status_bar = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Cyan));
    frame.render_widget(status_bar, chunks[0]);

    // ── Output area ─────────────────────────────────────────────
    // viewport_height = output area height minus 2 for the block borders
    app.viewport_height = chunks[1].height.saturating_sub(2);
    app.clamp_scroll();

    let title = format!(" Output (run {}) ", app.runs);
    let lines: Vec<Line> = app.output.iter().map(|l| Line::raw(l.as_str())).collect();
    let output_widget = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .scroll((app.scroll, 0));
    frame.render_widget(output_widget, chunks[1]);

    // ── Help bar ────────────────────────────────────────────────
    let help = " q: quit | r: run now | j/k: scroll | g/G: top/bottom | PgUp/PgDn ";
    let help_bar = Paragraph::new(Line::from(Span::styled(
        help,
        Style::default().fg(Color::DarkGray),
    )));
    frame.render_widget(help_bar, chunks[2]);
}

fn status_text(state: &RunState) -> (String, Color) {
    match state {
        RunState::Waiting => ("waiting for changes".into(), Color::Gray),
        RunState::Running { since } => (
            format!("running {}", ago(since.elapsed())),
            Color::Yellow,
        ),
        RunState::Finished { status, at } => {
            let when = ago(at.elapsed());
            match status {
                RunStatus::Success => (format!("ok  {when} ago"), Color::Green),
                RunStatus::Failed(code) => (format!("exit {code}  {when} ago"), Color::Red),
                RunStatus::Terminated => (format!("killed  {when} ago"), Color::Red),
                RunStatus::LaunchFailed(_) => {
                    (format!("failed to start  {when} ago"), Color::Red)
                }
            }
        }
    }
}

fn ago(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else {
        format!("{}m", secs / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    fn render(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 12)).unwrap();
        terminal.draw(|frame| draw(frame, app)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn shows_command_output_and_status() {
        let mut app = App::new("cargo test".into());
        app.run_finished("command returned nonzero exit status: 3\nboom\n", RunStatus::Failed(3));
        let screen = render(&mut app);

        assert!(screen.contains("cargo test"));
        assert!(screen.contains("exit 3"));
        assert!(screen.contains("command returned nonzero exit status: 3"));
        assert!(screen.contains("boom"));
        assert_eq!(app.viewport_height, 8);
    }

    #[test]
    fn shows_watch_error() {
        let mut app = App::new("make".into());
        app.watch_error("too many open files".into());
        let screen = render(&mut app);
        assert!(screen.contains("waiting for changes"));
        assert!(screen.contains("too many open files"));
    }

    #[test]
    fn ago_formats() {
        assert_eq!(ago(Duration::from_secs(5)), "5s");
        assert_eq!(ago(Duration::from_secs(125)), "2m");
    }
}
