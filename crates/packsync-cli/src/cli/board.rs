//! Redraws the progress board in place on a terminal.

use crossterm::cursor::{MoveToColumn, MoveUp};
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use std::io::{self, IsTerminal, Write};

pub struct BoardPainter<W: Write> {
    out: W,
    /// Lines of the last frame; erased before the next one on a terminal.
    lines: u16,
    in_place: bool,
}

impl BoardPainter<io::Stdout> {
    /// Paints to stdout, in place when stdout is a terminal and as a plain
    /// sequence of frames otherwise.
    pub fn stdout() -> Self {
        let out = io::stdout();
        let in_place = out.is_terminal();
        Self::new(out, in_place)
    }
}

impl<W: Write> BoardPainter<W> {
    pub fn new(out: W, in_place: bool) -> Self {
        Self {
            out,
            lines: 0,
            in_place,
        }
    }

    pub fn draw(&mut self, frame: &str) -> io::Result<()> {
        if self.in_place && self.lines > 0 {
            queue!(
                self.out,
                MoveUp(self.lines),
                MoveToColumn(0),
                Clear(ClearType::FromCursorDown)
            )?;
        }
        queue!(self.out, Print(frame), Print("\n"))?;
        if !self.in_place {
            queue!(self.out, Print("\n"))?;
        }
        self.out.flush()?;
        self.lines = u16::try_from(frame.lines().count()).unwrap_or(u16::MAX);
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}
