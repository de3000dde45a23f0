//! Terminal backend abstraction and the crossterm device.
//!
//! The backend handles raw mode and alternate screen transitions behind an
//! RAII guard so state restores even on early returns or panics. The
//! device implements the contract the session consumes: blocking event
//! transfer with a background wakeup, cell rewrites, cell replication, and
//! frame synchronization. Replication is served from a client-side screen
//! cell buffer since terminals expose no portable region copy.

use std::io::{Stdout, Write, stdout};

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender, unbounded};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{
        DisableBracketedPaste, EnableBracketedPaste, Event as CtEvent, KeyCode, KeyEvent,
        KeyEventKind, KeyModifiers,
    },
    execute, queue,
    style::{Attribute, Color, Print, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{
        Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, SetTitle, disable_raw_mode,
        enable_raw_mode, size,
    },
};
use tracing::trace;

use core_events::{DeviceEvent, Key, ModMask, NamedKey};
use core_model::{Area, Instruction};
use core_text::{Cell, Glyph};

pub mod screen;
pub use screen::Screen;

pub trait TerminalBackend {
    fn enter(&mut self) -> Result<()>;
    fn leave(&mut self) -> Result<()>;
    fn set_title(&mut self, title: &str) -> Result<()>;
}

pub struct CrosstermBackend {
    entered: bool,
}

/// RAII guard ensuring terminal state restoration even if the caller
/// early-returns or panics.
pub struct TerminalGuard<'a> {
    backend: &'a mut CrosstermBackend,
}

impl Default for CrosstermBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CrosstermBackend {
    pub fn new() -> Self {
        Self { entered: false }
    }

    /// Enter and return a guard that will leave on drop.
    pub fn enter_guard(&mut self) -> Result<TerminalGuard<'_>> {
        self.enter()?;
        Ok(TerminalGuard { backend: self })
    }
}

impl TerminalBackend for CrosstermBackend {
    fn enter(&mut self) -> Result<()> {
        if !self.entered {
            enable_raw_mode()?;
            execute!(stdout(), EnterAlternateScreen, EnableBracketedPaste, Hide)?;
            self.entered = true;
        }
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        if self.entered {
            execute!(stdout(), DisableBracketedPaste, LeaveAlternateScreen, Show)?;
            disable_raw_mode()?;
            self.entered = false;
        }
        Ok(())
    }

    fn set_title(&mut self, title: &str) -> Result<()> {
        execute!(stdout(), SetTitle(title))?;
        Ok(())
    }
}

impl Drop for CrosstermBackend {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

impl Drop for TerminalGuard<'_> {
    fn drop(&mut self) {
        let _ = self.backend.leave();
    }
}

/// Translate a crossterm key event into the normalized key model.
pub fn translate_key(event: &KeyEvent) -> Option<Key> {
    if event.kind == KeyEventKind::Release {
        return None;
    }

    let mut mods = ModMask::empty();
    if event.modifiers.contains(KeyModifiers::SHIFT) {
        mods |= ModMask::SHIFT;
    }
    if event.modifiers.contains(KeyModifiers::CONTROL) {
        mods |= ModMask::CONTROL;
    }
    if event.modifiers.contains(KeyModifiers::ALT) {
        mods |= ModMask::META;
    }
    if event.modifiers.contains(KeyModifiers::SUPER) {
        mods |= ModMask::SYSTEM;
    }

    let key = match event.code {
        KeyCode::Char(' ') => Key::named(NamedKey::Space),
        KeyCode::Char(c) => {
            // Shifted characters arrive pre-shifted; the modifier is kept
            // only when it distinguishes a binding.
            if c.is_uppercase() {
                mods |= ModMask::SHIFT;
            }
            Key::character(c)
        }
        KeyCode::Enter => Key::named(NamedKey::Return),
        KeyCode::Esc => Key::named(NamedKey::Escape),
        KeyCode::Backspace => Key::named(NamedKey::Backspace),
        KeyCode::Delete => Key::named(NamedKey::Delete),
        KeyCode::Tab => Key::named(NamedKey::Tab),
        KeyCode::BackTab => {
            mods |= ModMask::SHIFT;
            Key::named(NamedKey::Tab)
        }
        KeyCode::Up => Key::named(NamedKey::Up),
        KeyCode::Down => Key::named(NamedKey::Down),
        KeyCode::Left => Key::named(NamedKey::Left),
        KeyCode::Right => Key::named(NamedKey::Right),
        KeyCode::Home => Key::named(NamedKey::Home),
        KeyCode::End => Key::named(NamedKey::End),
        KeyCode::PageUp => Key::named(NamedKey::PageUp),
        KeyCode::PageDown => Key::named(NamedKey::PageDown),
        KeyCode::Insert => Key::named(NamedKey::Insert),
        KeyCode::F(n) => Key::named(NamedKey::Function(n)),
        _ => return None,
    };
    Some(key.with(mods))
}

fn rgb(color: u32) -> Color {
    Color::Rgb {
        r: ((color >> 16) & 0xFF) as u8,
        g: ((color >> 8) & 0xFF) as u8,
        b: (color & 0xFF) as u8,
    }
}

/// The terminal device: event intake with wakeup support, and the screen
/// surface the session's instructions land on.
pub struct Device {
    out: Stdout,
    screen: Screen,
    wakeup_tx: Sender<()>,
    wakeup_rx: Receiver<()>,
}

impl Device {
    pub fn new(lines: usize, span: usize) -> Self {
        let (wakeup_tx, wakeup_rx) = unbounded();
        Self {
            out: stdout(),
            screen: Screen::new(lines, span),
            wakeup_tx,
            wakeup_rx,
        }
    }

    pub fn from_terminal() -> Result<Self> {
        let (span, lines) = size()?;
        Ok(Self::new(lines as usize, span as usize))
    }

    pub fn dimensions(&self) -> (usize, usize) {
        self.screen.dimensions()
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    /// A handle the background thread uses to interrupt `transfer_event`.
    pub fn wakeup_handle(&self) -> impl Fn() + Send + Sync + use<> {
        let tx = self.wakeup_tx.clone();
        move || {
            let _ = tx.send(());
        }
    }

    /// Block until input or a wakeup arrives.
    pub fn transfer_event(&mut self) -> Result<DeviceEvent> {
        loop {
            if self.wakeup_rx.try_recv().is_ok() {
                return Ok(DeviceEvent::Wakeup);
            }

            if crossterm::event::poll(std::time::Duration::from_millis(50))? {
                match crossterm::event::read()? {
                    CtEvent::Key(k) => {
                        if let Some(key) = translate_key(&k) {
                            trace!(target: "terminal.input", key = %key, "key_event");
                            return Ok(DeviceEvent::Key(key));
                        }
                    }
                    CtEvent::Resize(span, lines) => {
                        self.screen.resize(lines as usize, span as usize);
                        return Ok(DeviceEvent::Resize {
                            lines: lines as usize,
                            span: span as usize,
                        });
                    }
                    CtEvent::Paste(text) => return Ok(DeviceEvent::Paste(text)),
                    CtEvent::FocusGained => return Ok(DeviceEvent::FocusGained),
                    CtEvent::FocusLost => return Ok(DeviceEvent::FocusLost),
                    _ => {}
                }
            }
        }
    }

    /// Apply one display instruction to the screen buffer and queue the
    /// terminal output realizing it.
    pub fn dispatch(&mut self, instruction: &Instruction) -> Result<()> {
        match instruction {
            Instruction::Rewrite { area, cells } => {
                self.screen.rewrite(area, cells);
                self.redraw(area)?;
            }
            Instruction::Copy { src, dst } => {
                self.screen.replicate_cells(src, dst);
                self.redraw(dst)?;
            }
        }
        Ok(())
    }

    /// Clear the area to blanks.
    pub fn invalidate_cells(&mut self, area: &Area) -> Result<()> {
        self.screen.invalidate_cells(area);
        self.redraw(area)
    }

    /// Overwrite one cell directly; used for indicators and cursor cells.
    pub fn put(&mut self, y: usize, x: usize, cell: Cell) -> Result<()> {
        let area = Area::new(y, x, 1, 1);
        self.screen.rewrite(&area, std::slice::from_ref(&cell));
        self.redraw(&area)
    }

    fn redraw(&mut self, area: &Area) -> Result<()> {
        let (lines, span) = self.screen.dimensions();
        let bottom = area.bottom().min(lines);
        let right = area.right().min(span);

        for y in area.top_offset..bottom {
            queue!(self.out, MoveTo(area.left_offset as u16, y as u16))?;
            let mut x = area.left_offset;
            while x < right {
                let Some(cell) = self.screen.cell(y, x) else {
                    break;
                };
                if cell.window == 0 {
                    queue!(
                        self.out,
                        SetForegroundColor(rgb(cell.style.textcolor)),
                        SetBackgroundColor(rgb(cell.style.cellcolor)),
                    )?;
                    if cell.style.underline {
                        queue!(self.out, SetAttribute(Attribute::Underlined))?;
                    }
                    if cell.text.is_empty() {
                        queue!(self.out, Print(' '))?;
                    } else {
                        queue!(self.out, Print(cell.text.as_str()))?;
                    }
                    if cell.style.underline {
                        queue!(self.out, SetAttribute(Attribute::NoUnderline))?;
                    }
                }
                x += 1;
            }
        }
        Ok(())
    }

    /// Redraw the full surface from the buffer.
    pub fn render_image(&mut self) -> Result<()> {
        let (lines, span) = self.screen.dimensions();
        queue!(self.out, Clear(ClearType::All))?;
        self.redraw(&Area::new(0, 0, lines, span))
    }

    /// Commit queued output to the terminal.
    pub fn synchronize(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Blank cell carrying the default style.
    pub fn blank(style: Glyph) -> Cell {
        Cell::blank(style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_translation_basics() {
        let ev = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        assert_eq!(translate_key(&ev).unwrap().identifier(), "[A]");

        let ev = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::CONTROL);
        let key = translate_key(&ev).unwrap();
        assert!(key.mods.contains(ModMask::CONTROL));

        let ev = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(translate_key(&ev).unwrap().identifier(), "[\u{23CE}]");
    }

    #[test]
    fn uppercase_implies_shift() {
        let ev = KeyEvent::new(KeyCode::Char('A'), KeyModifiers::NONE);
        let key = translate_key(&ev).unwrap();
        assert!(key.mods.contains(ModMask::SHIFT));
        assert!(key.identifier().starts_with("[A]["));
    }

    #[test]
    fn release_events_ignored() {
        let mut ev = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        ev.kind = KeyEventKind::Release;
        assert!(translate_key(&ev).is_none());
    }

    #[test]
    fn wakeup_interrupts_polling() {
        let device = Device::new(24, 80);
        let wake = device.wakeup_handle();
        wake();
        // The queued wakeup is observed without any terminal input.
        assert!(device.wakeup_rx.try_recv().is_ok());
    }
}
