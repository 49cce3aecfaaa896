use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::Result;
use crossterm::cursor;
use crossterm::event::{self, Event};
use crossterm::terminal::{self, Clear, ClearType};
use knitchart_core::{marker_lines, ChartSession, Command, SessionEvent};
use knitchart_tty::{
    format_status, parse_row_settings, write_status_line, EventMapper, MarkerListRenderer,
    TerminalGrid, UiEvent,
};
use tracing::warn;

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, cursor::Show);
    }
}

enum LoopAction {
    Continue,
    ContinueRedraw,
    Quit,
}

/// Runs the interactive loop until the user quits. Saves keep running in
/// the background; the caller flushes them afterwards.
pub fn run(session: &mut ChartSession) -> Result<()> {
    let _raw = RawModeGuard::new()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, cursor::Hide)?;
    let mut renderer = MarkerListRenderer::new(stdout);
    let mut mapper = EventMapper::new();
    let mut message: Option<String> = None;

    let mut grid = current_grid()?;
    resize_viewport(session, grid)?;
    session.apply(Command::ResetZoom)?;
    session.apply(Command::ScrollToCurrentRow)?;
    session.drain_events();
    let mut dirty = true;

    loop {
        if dirty {
            redraw(&mut renderer, session, grid, &mapper, message.as_deref())?;
            dirty = false;
        }

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let action = match event::read()? {
            Event::Resize(columns, rows) => {
                grid = list_grid(columns, rows);
                resize_viewport(session, grid)?;
                LoopAction::ContinueRedraw
            }
            ev => {
                let ui_event = mapper.map_event(ev);
                handle_event(ui_event, session, &mut message)?
            }
        };
        if session.drain_events().iter().any(SessionEvent::needs_redraw) {
            dirty = true;
        }
        match action {
            LoopAction::Continue if dirty => {}
            LoopAction::Continue => {
                if let Some(status) = status_text(session, &mapper, message.as_deref()) {
                    draw_status_line(&mut renderer, grid, &status)?;
                }
            }
            LoopAction::ContinueRedraw => dirty = true,
            LoopAction::Quit => break,
        }
    }

    let writer = renderer.writer();
    crossterm::execute!(writer, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    Ok(())
}

fn handle_event(
    event: UiEvent,
    session: &mut ChartSession,
    message: &mut Option<String>,
) -> Result<LoopAction> {
    let action = match event {
        UiEvent::Command(command) => {
            *message = None;
            session.apply(command)?;
            LoopAction::Continue
        }
        UiEvent::BeginSettings | UiEvent::SettingsInputChanged { .. } => LoopAction::Continue,
        UiEvent::SettingsSubmit { input } => {
            match parse_row_settings(&input, session.row_settings()) {
                Ok(settings) => match session.apply(Command::ApplyRowSettings(settings)) {
                    Ok(_) => *message = Some("markers regenerated".to_string()),
                    Err(err) => {
                        warn!(?err, "rejected row settings");
                        *message = Some(err.to_string());
                    }
                },
                Err(err) => *message = Some(err.to_string()),
            }
            LoopAction::ContinueRedraw
        }
        UiEvent::SettingsCancel => LoopAction::ContinueRedraw,
        UiEvent::Quit => LoopAction::Quit,
        UiEvent::None => LoopAction::Continue,
    };
    Ok(action)
}

fn redraw(
    renderer: &mut MarkerListRenderer<Stdout>,
    session: &ChartSession,
    grid: TerminalGrid,
    mapper: &EventMapper,
    message: Option<&str>,
) -> Result<()> {
    if let Some(chart) = session.chart() {
        let (_, height) = grid.viewport_size();
        let lines = marker_lines(
            chart.progress.markers(),
            chart.progress.current_row_index(),
            &chart.viewport.transform(),
            height,
        );
        renderer.draw(&lines, grid)?;
    }
    if let Some(status) = status_text(session, mapper, message) {
        draw_status_line(renderer, grid, &status)?;
    }
    Ok(())
}

fn status_text(
    session: &ChartSession,
    mapper: &EventMapper,
    message: Option<&str>,
) -> Option<String> {
    let mut status = format_status(session)?;
    if let Some(message) = message {
        status.push_str("  ");
        status.push_str(message);
    }
    if let Some(pending) = mapper.pending_input() {
        status.push_str("  ");
        status.push_str(&pending);
    }
    Some(status)
}

fn draw_status_line(
    renderer: &mut MarkerListRenderer<Stdout>,
    grid: TerminalGrid,
    status: &str,
) -> Result<()> {
    let writer = renderer.writer();
    crossterm::execute!(
        writer,
        cursor::MoveTo(0, grid.rows),
        Clear(ClearType::CurrentLine)
    )?;
    let width = usize::from(grid.columns);
    let clipped: String = status.chars().take(width).collect();
    write_status_line(writer, &clipped)?;
    Ok(())
}

fn current_grid() -> Result<TerminalGrid> {
    let (columns, rows) = terminal::size()?;
    Ok(list_grid(columns, rows))
}

/// Leaves the bottom row for the status line.
fn list_grid(columns: u16, rows: u16) -> TerminalGrid {
    TerminalGrid::clamped(columns, rows.saturating_sub(1))
}

fn resize_viewport(session: &mut ChartSession, grid: TerminalGrid) -> Result<()> {
    let (width, height) = grid.viewport_size();
    session.apply(Command::ResizeViewport { width, height })?;
    Ok(())
}
