use std::io::{self, Write};

use anyhow::Result;
use crossterm::{
    cursor,
    event::{Event, KeyCode, KeyEvent, KeyModifiers},
    queue,
    style::{Attribute, Print, SetAttribute},
    terminal::{Clear, ClearType},
};
use knitchart_core::{ChartSession, Command, MarkerLine, MarkerStyle, RowSettings, UndoTarget};
use thiserror::Error;

/// Nominal pixel size of one terminal cell, used as view-space units.
pub const CELL_WIDTH: f64 = 8.0;
pub const CELL_HEIGHT: f64 = 16.0;

#[derive(Debug, Clone)]
pub enum UiEvent {
    Command(Command),
    BeginSettings,
    SettingsInputChanged { input: String },
    SettingsSubmit { input: String },
    SettingsCancel,
    Quit,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Settings,
}

#[derive(Debug, Default)]
pub struct EventMapper {
    pending_count: Option<usize>,
    pending_digits: String,
    char_stack: String,
    mode: InputMode,
    settings_buffer: String,
}

impl EventMapper {
    pub const SCROLL_STEP: f64 = CELL_HEIGHT * 2.0;
    pub const ZOOM_IN: f64 = 1.1;
    pub const ZOOM_OUT: f64 = 0.9;
    /// Largest count prefix; further digits are ignored.
    pub const MAX_COUNT: usize = 9_999;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.reset_count();
            self.reset_char_stack();
            self.settings_buffer.clear();
            self.mode = mode;
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        match self.mode {
            InputMode::Normal => self.map_event_normal(event),
            InputMode::Settings => self.map_event_settings(event),
        }
    }

    fn map_event_normal(&mut self, event: Event) -> UiEvent {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event
        else {
            return UiEvent::None;
        };

        match (code, modifiers) {
            (KeyCode::Char(c), _) if self.char_stack == "u" => {
                self.reset_char_stack();
                let target = match c {
                    'r' => UndoTarget::RowIndex,
                    'm' => UndoTarget::Markers,
                    'c' => UndoTarget::CheckCount,
                    _ => {
                        self.reset_count();
                        return UiEvent::None;
                    }
                };
                self.reset_count();
                UiEvent::Command(Command::undo(target))
            }
            (KeyCode::Char(c), KeyModifiers::NONE) if c.is_ascii_digit() => {
                if let Some(digit) = c.to_digit(10) {
                    self.push_digit(digit as usize);
                }
                UiEvent::None
            }
            (KeyCode::Char('u'), _) => {
                if self.char_stack.is_empty() {
                    self.char_stack.push('u');
                }
                UiEvent::None
            }
            (KeyCode::Char('j'), KeyModifiers::NONE)
            | (KeyCode::Char(' '), _)
            | (KeyCode::Enter, _) => {
                let times = self.take_count();
                UiEvent::Command(Command::Advance { times })
            }
            (KeyCode::Up, _) => self.scroll(0.0, -Self::SCROLL_STEP),
            (KeyCode::Down, _) => self.scroll(0.0, Self::SCROLL_STEP),
            (KeyCode::Left, _) => self.scroll(-Self::SCROLL_STEP, 0.0),
            (KeyCode::Right, _) => self.scroll(Self::SCROLL_STEP, 0.0),
            (KeyCode::Char('+'), _) => {
                self.reset_count();
                UiEvent::Command(Command::ZoomBy {
                    factor: Self::ZOOM_IN,
                })
            }
            (KeyCode::Char('-'), _) => {
                self.reset_count();
                UiEvent::Command(Command::ZoomBy {
                    factor: Self::ZOOM_OUT,
                })
            }
            (KeyCode::Char('='), _) => {
                self.reset_count();
                UiEvent::Command(Command::ResetZoom)
            }
            (KeyCode::Char('g'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::Command(Command::ScrollToCurrentRow)
            }
            (KeyCode::Char('x'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::Command(Command::SetDrawing(None))
            }
            (KeyCode::Char('s'), KeyModifiers::NONE) => {
                self.set_mode(InputMode::Settings);
                UiEvent::BeginSettings
            }
            (KeyCode::Char('q'), _) => {
                self.reset_count();
                UiEvent::Quit
            }
            _ => {
                self.reset_count();
                self.reset_char_stack();
                UiEvent::None
            }
        }
    }

    fn map_event_settings(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Key(KeyEvent {
                code, modifiers, ..
            }) => match (code, modifiers) {
                (KeyCode::Esc, _) => {
                    self.set_mode(InputMode::Normal);
                    UiEvent::SettingsCancel
                }
                (KeyCode::Enter, _) => {
                    let input = self.settings_buffer.clone();
                    self.set_mode(InputMode::Normal);
                    UiEvent::SettingsSubmit { input }
                }
                (KeyCode::Backspace, _) => {
                    self.settings_buffer.pop();
                    UiEvent::SettingsInputChanged {
                        input: self.settings_buffer.clone(),
                    }
                }
                (KeyCode::Char(c), mods)
                    if (mods.is_empty() || mods == KeyModifiers::SHIFT)
                        && (c.is_ascii_digit() || c == '.' || c == ' ') =>
                {
                    self.settings_buffer.push(c);
                    UiEvent::SettingsInputChanged {
                        input: self.settings_buffer.clone(),
                    }
                }
                _ => UiEvent::None,
            },
            _ => UiEvent::None,
        }
    }

    fn push_digit(&mut self, digit: usize) {
        let current = self.pending_count.unwrap_or(0);
        let next = current * 10 + digit;
        if next > Self::MAX_COUNT {
            return;
        }
        self.pending_count = Some(next);
        if let Some(c) = char::from_digit(digit as u32, 10) {
            self.pending_digits.push(c);
        }
    }

    fn take_count(&mut self) -> usize {
        let count = self
            .pending_count
            .take()
            .filter(|&count| count > 0)
            .unwrap_or(1);
        self.pending_digits.clear();
        count
    }

    fn reset_count(&mut self) {
        self.pending_count = None;
        self.pending_digits.clear();
    }

    fn reset_char_stack(&mut self) {
        self.char_stack.clear();
    }

    fn scroll(&mut self, dx: f64, dy: f64) -> UiEvent {
        let multiplier = self.take_count() as f64;
        self.reset_char_stack();
        UiEvent::Command(Command::ScrollBy {
            dx: dx * multiplier,
            dy: dy * multiplier,
        })
    }

    pub fn pending_input(&self) -> Option<String> {
        if matches!(self.mode, InputMode::Settings) {
            return Some(format!("rows: {}", self.settings_buffer));
        }
        let mut pending = String::new();
        pending.push_str(&self.pending_digits);
        pending.push_str(&self.char_stack);
        if pending.is_empty() {
            None
        } else {
            Some(pending)
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SettingsInputError {
    #[error("expected `start_y row_height [step]`, got {0:?}")]
    Shape(String),
    #[error("{0:?} is not a number")]
    Number(String),
}

/// Parses `start_y row_height [step]`; a missing step keeps `current.step_count`.
pub fn parse_row_settings(
    input: &str,
    current: RowSettings,
) -> Result<RowSettings, SettingsInputError> {
    let parts: Vec<&str> = input.split_whitespace().collect();
    if !(2..=3).contains(&parts.len()) {
        return Err(SettingsInputError::Shape(input.to_string()));
    }
    let number = |raw: &str| -> Result<f64, SettingsInputError> {
        raw.parse::<f64>()
            .map_err(|_| SettingsInputError::Number(raw.to_string()))
    };
    let step_count = match parts.get(2) {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| SettingsInputError::Number(raw.to_string()))?,
        None => current.step_count,
    };
    Ok(RowSettings {
        start_y: number(parts[0])?,
        row_height: number(parts[1])?,
        step_count,
    })
}

/// Terminal area available for the marker list, in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalGrid {
    pub columns: u16,
    pub rows: u16,
}

impl TerminalGrid {
    pub fn clamped(columns: u16, rows: u16) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
        }
    }

    pub fn viewport_size(&self) -> (f64, f64) {
        (
            f64::from(self.columns) * CELL_WIDTH,
            f64::from(self.rows) * CELL_HEIGHT,
        )
    }

    pub fn row_for(&self, view_y: f64) -> Option<u16> {
        if view_y < 0.0 {
            return None;
        }
        let row = (view_y / CELL_HEIGHT).floor();
        if row >= f64::from(self.rows) {
            None
        } else {
            Some(row as u16)
        }
    }
}

/// Draws marker lines as rows of box-drawing characters.
pub struct MarkerListRenderer<W: Write> {
    writer: W,
}

impl<W: Write> MarkerListRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn draw(&mut self, lines: &[MarkerLine], grid: TerminalGrid) -> Result<()> {
        queue!(self.writer, Clear(ClearType::All))?;
        for line in lines {
            let Some(row) = grid.row_for(line.view_y) else {
                continue;
            };
            let label = format!(" row {} ", line.index + 1);
            let (glyph, mark) = match line.style {
                MarkerStyle::Current => ('━', '▶'),
                MarkerStyle::Checked => ('─', '✓'),
                MarkerStyle::Unchecked => ('┄', ' '),
            };
            let width = usize::from(grid.columns);
            let fill = width.saturating_sub(label.chars().count() + 2);
            let content: String = std::iter::once(mark)
                .chain(std::iter::once(' '))
                .chain(label.chars())
                .chain(std::iter::repeat(glyph).take(fill))
                .take(width)
                .collect();

            queue!(self.writer, cursor::MoveTo(0, row))?;
            if line.style == MarkerStyle::Current {
                queue!(
                    self.writer,
                    SetAttribute(Attribute::Bold),
                    Print(content),
                    SetAttribute(Attribute::Reset)
                )?;
            } else {
                queue!(self.writer, Print(content))?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// One-line summary of the open chart, or `None` when nothing is open.
pub fn format_status(session: &ChartSession) -> Option<String> {
    let chart = session.chart()?;
    let progress = &chart.progress;
    let mut undo = String::new();
    for (target, key) in [
        (UndoTarget::RowIndex, 'r'),
        (UndoTarget::Markers, 'm'),
        (UndoTarget::CheckCount, 'c'),
    ] {
        if progress.can_undo(target) {
            undo.push(key);
        }
    }
    let mut status = format!(
        "{}  row {}/{}  checks {}  step {}  zoom {:.2}x",
        chart.document.title,
        progress.current_row_index() + 1,
        progress.markers().len(),
        progress.check_count(),
        session.row_settings().step_count,
        chart.viewport.zoom_scale,
    );
    if !undo.is_empty() {
        status.push_str("  undo[");
        status.push_str(&undo);
        status.push(']');
    }
    Some(status)
}

pub fn write_status_line<W: Write>(writer: &mut W, label: &str) -> io::Result<()> {
    write!(writer, "{}", label)?;
    writer.flush()
}
