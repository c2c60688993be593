use std::io::{self, Write};

use crossterm::{
    cursor, queue,
    style::{Color, Print, SetBackgroundColor, SetForegroundColor},
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Rgb {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
}

/// Stand-in color when an emotion has no palette entry.
pub(crate) const NEUTRAL_GRAY: Rgb = Rgb { r: 150, g: 150, b: 150 };

impl Rgb {
    pub(crate) const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub(crate) fn lerp(a: Rgb, b: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let f = |x: u8, y: u8| -> u8 {
            (x as f32 + (y as f32 - x as f32) * t)
                .round()
                .clamp(0.0, 255.0) as u8
        };
        Rgb {
            r: f(a.r, b.r),
            g: f(a.g, b.g),
            b: f(a.b, b.b),
        }
    }

    pub(crate) fn scale(self, k: f32) -> Rgb {
        let k = k.max(0.0);
        let s = |v: u8| -> u8 { ((v as f32) * k).round().clamp(0.0, 255.0) as u8 };
        Rgb {
            r: s(self.r),
            g: s(self.g),
            b: s(self.b),
        }
    }

    pub(crate) fn to_color(self) -> Color {
        Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

#[derive(Clone, PartialEq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Rgb,
    pub(crate) bg: Rgb,
}

impl Cell {
    pub(crate) fn blank(bg: Rgb) -> Self {
        Self {
            ch: ' ',
            fg: Rgb::new(255, 255, 255),
            bg,
        }
    }
}

/// Double-buffered cell grid; only changed cells are re-emitted on flush.
pub(crate) struct Diff {
    w: u16,
    h: u16,
    prev: Vec<Cell>,
    next: Vec<Cell>,
}

impl Diff {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        let blank = Cell::blank(Rgb::new(0, 0, 0));
        let n = w as usize * h as usize;
        Self {
            w,
            h,
            prev: vec![blank.clone(); n],
            next: vec![blank; n],
        }
    }

    pub(crate) fn resize(&mut self, w: u16, h: u16) {
        if self.w == w && self.h == h {
            return;
        }
        *self = Self::new(w, h);
    }

    pub(crate) fn size(&self) -> (u16, u16) {
        (self.w, self.h)
    }

    fn idx(&self, x: u16, y: u16) -> usize {
        y as usize * self.w as usize + x as usize
    }

    pub(crate) fn clear_next(&mut self, bg: Rgb) {
        for c in &mut self.next {
            c.ch = ' ';
            c.fg = Rgb::new(255, 255, 255);
            c.bg = bg;
        }
    }

    pub(crate) fn set_next(&mut self, x: u16, y: u16, cell: Cell) {
        if x >= self.w || y >= self.h {
            return;
        }
        let i = self.idx(x, y);
        self.next[i] = cell;
    }

    pub(crate) fn flush<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        let mut last_fg: Option<Rgb> = None;
        let mut last_bg: Option<Rgb> = None;

        for y in 0..self.h {
            for x in 0..self.w {
                let i = self.idx(x, y);
                if self.prev[i] == self.next[i] {
                    continue;
                }
                let c = self.next[i].clone();

                queue!(out, cursor::MoveTo(x, y))?;
                if last_bg != Some(c.bg) {
                    queue!(out, SetBackgroundColor(c.bg.to_color()))?;
                    last_bg = Some(c.bg);
                }
                if last_fg != Some(c.fg) {
                    queue!(out, SetForegroundColor(c.fg.to_color()))?;
                    last_fg = Some(c.fg);
                }
                queue!(out, Print(c.ch))?;
            }
        }

        std::mem::swap(&mut self.prev, &mut self.next);
        Ok(())
    }
}

pub(crate) fn draw_text(diff: &mut Diff, x: u16, y: u16, text: &str, fg: Rgb, bg: Rgb) {
    for (i, ch) in text.chars().enumerate() {
        diff.set_next(x.saturating_add(i as u16), y, Cell { ch, fg, bg });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_endpoints() {
        let a = Rgb::new(0, 0, 0);
        let b = Rgb::new(200, 100, 50);
        assert_eq!(Rgb::lerp(a, b, 0.0), a);
        assert_eq!(Rgb::lerp(a, b, 1.0), b);
        assert_eq!(Rgb::lerp(a, b, 2.0), b);
    }

    #[test]
    fn scale_saturates() {
        let c = Rgb::new(200, 200, 200).scale(2.0);
        assert_eq!(c, Rgb::new(255, 255, 255));
    }

    #[test]
    fn set_next_out_of_bounds_is_ignored() {
        let mut d = Diff::new(4, 4);
        d.set_next(10, 10, Cell::blank(Rgb::new(1, 2, 3)));
        assert_eq!(d.size(), (4, 4));
    }
}
