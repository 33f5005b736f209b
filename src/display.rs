//! Two-line character display: the hardware abstraction, an in-memory
//! surface, and the controller that serializes clear+write sequences.

use anyhow::Result;
use parking_lot::Mutex;

pub const ROWS: usize = 2;
pub const COLS: usize = 16;

const BANNER: [(usize, usize, &str); 2] = [(0, 3, "Edrumulus"), (1, 0, "Prototype 5")];

/// Minimal HD44780-style command set.
pub trait CharDisplay: Send {
    fn clear(&mut self) -> Result<()>;
    fn set_cursor(&mut self, row: usize, col: usize) -> Result<()>;
    fn write_str(&mut self, text: &str) -> Result<()>;
}

impl<T: CharDisplay + ?Sized> CharDisplay for Box<T> {
    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }

    fn set_cursor(&mut self, row: usize, col: usize) -> Result<()> {
        (**self).set_cursor(row, col)
    }

    fn write_str(&mut self, text: &str) -> Result<()> {
        (**self).write_str(text)
    }
}

/// Map a char onto the displayable ASCII range.
pub fn display_byte(ch: char) -> u8 {
    if ch.is_ascii_graphic() || ch == ' ' {
        ch as u8
    } else {
        b'?'
    }
}

// ─────────────────── in-memory surface ───────────────────────────────────────

/// Mirror of the visible cells. Writes past the last column are clipped.
#[cfg(any(test, not(feature = "rpi")))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSurface {
    cells: [[u8; COLS]; ROWS],
    cursor: (usize, usize),
}

#[cfg(any(test, not(feature = "rpi")))]
impl TextSurface {
    pub fn new() -> Self {
        Self {
            cells: [[b' '; COLS]; ROWS],
            cursor: (0, 0),
        }
    }

    /// Row contents without trailing blanks.
    pub fn line(&self, row: usize) -> String {
        self.cells
            .get(row)
            .map(|cells| String::from_utf8_lossy(cells).trim_end().to_owned())
            .unwrap_or_default()
    }
}

#[cfg(any(test, not(feature = "rpi")))]
impl Default for TextSurface {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, not(feature = "rpi")))]
impl CharDisplay for TextSurface {
    fn clear(&mut self) -> Result<()> {
        self.cells = [[b' '; COLS]; ROWS];
        self.cursor = (0, 0);
        Ok(())
    }

    fn set_cursor(&mut self, row: usize, col: usize) -> Result<()> {
        anyhow::ensure!(
            row < ROWS && col < COLS,
            "cursor ({row}, {col}) outside {ROWS}x{COLS}"
        );
        self.cursor = (row, col);
        Ok(())
    }

    fn write_str(&mut self, text: &str) -> Result<()> {
        let (row, mut col) = self.cursor;
        for ch in text.chars() {
            if col >= COLS {
                break;
            }
            self.cells[row][col] = display_byte(ch);
            col += 1;
        }
        self.cursor = (row, col.min(COLS));
        Ok(())
    }
}

/// Stand-in for machines without the LCD: keeps a surface and logs it.
#[cfg(not(feature = "rpi"))]
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    surface: TextSurface,
}

#[cfg(not(feature = "rpi"))]
impl CharDisplay for HeadlessDisplay {
    fn clear(&mut self) -> Result<()> {
        self.surface.clear()
    }

    fn set_cursor(&mut self, row: usize, col: usize) -> Result<()> {
        self.surface.set_cursor(row, col)
    }

    fn write_str(&mut self, text: &str) -> Result<()> {
        self.surface.write_str(text)?;
        log::info!(
            "📟 [{:<16}] [{:<16}]",
            self.surface.line(0),
            self.surface.line(1)
        );
        Ok(())
    }
}

// ─────────────────── controller ──────────────────────────────────────────────

/// Owns the display. The mutex is the one lock shared by every button
/// callback; it covers exactly one clear+write sequence.
pub struct DisplayController<D> {
    display: Mutex<D>,
}

impl<D: CharDisplay> DisplayController<D> {
    pub fn new(display: D) -> Self {
        Self {
            display: Mutex::new(display),
        }
    }

    /// Clear both rows and write `label` at the start of row 0.
    pub fn show(&self, label: &str) -> Result<()> {
        let mut display = self.display.lock();
        display.clear()?;
        display.set_cursor(0, 0)?;
        display.write_str(label)
    }

    pub fn show_startup_banner(&self) -> Result<()> {
        let mut display = self.display.lock();
        display.clear()?;
        for (row, col, text) in BANNER {
            display.set_cursor(row, col)?;
            display.write_str(text)?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn lock(&self) -> parking_lot::MutexGuard<'_, D> {
        self.display.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn banner_occupies_both_rows() {
        let ctl = DisplayController::new(TextSurface::new());
        ctl.show_startup_banner().unwrap();
        let surface = ctl.lock();
        assert_eq!(surface.line(0), "   Edrumulus");
        assert_eq!(surface.line(1), "Prototype 5");
    }

    #[test]
    fn show_replaces_row_zero_and_clears_row_one() {
        let ctl = DisplayController::new(TextSurface::new());
        ctl.show_startup_banner().unwrap();
        ctl.show("Button 3").unwrap();
        let surface = ctl.lock();
        assert_eq!(surface.line(0), "Button 3");
        assert_eq!(surface.line(1), "");
    }

    #[test]
    fn show_is_idempotent() {
        let once = DisplayController::new(TextSurface::new());
        once.show("Button 5").unwrap();

        let twice = DisplayController::new(TextSurface::new());
        twice.show("Button 5").unwrap();
        twice.show("Button 5").unwrap();

        assert_eq!(*once.lock(), *twice.lock());
    }

    #[test]
    fn long_text_is_clipped() {
        let mut surface = TextSurface::new();
        surface.write_str("0123456789abcdefXYZ").unwrap();
        assert_eq!(surface.line(0), "0123456789abcdef");
        assert_eq!(surface.line(1), "");
    }

    #[test]
    fn non_ascii_becomes_placeholder() {
        let mut surface = TextSurface::new();
        surface.write_str("Snäre\t").unwrap();
        assert_eq!(surface.line(0), "Sn?re?");
    }

    #[test]
    fn cursor_outside_surface_is_rejected() {
        let mut surface = TextSurface::new();
        assert!(surface.set_cursor(2, 0).is_err());
        assert!(surface.set_cursor(0, 16).is_err());
        assert!(surface.set_cursor(1, 15).is_ok());
    }

    #[test]
    fn concurrent_shows_never_interleave() {
        let ctl = Arc::new(DisplayController::new(TextSurface::new()));
        let labels = ["Button 1", "Button 2", "Button 3", "Button 4"];

        let handles: Vec<_> = labels
            .iter()
            .map(|&label| {
                let ctl = ctl.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        ctl.show(label).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let surface = ctl.lock();
        assert!(labels.contains(&surface.line(0).as_str()));
        assert_eq!(surface.line(1), "");
    }
}
