//! Terminal tables for the `test` report.
//!
//! Box-drawing borders with ANSI colour by default; `ascii` switches to
//! `+-|` borders and drops colour so output can be diffed or piped.

use bitmix_core::Verdict;

const BOLD: &str = "\x1b[1m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tone {
    #[default]
    Plain,
    Warn,
    Fail,
}

impl From<Verdict> for Tone {
    fn from(v: Verdict) -> Self {
        match v {
            Verdict::Failed => Self::Fail,
            Verdict::Suspicious => Self::Warn,
            Verdict::Noted | Verdict::Unremarkable => Self::Plain,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Cell {
    text: String,
    tone: Tone,
}

impl Cell {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tone: Tone::Plain,
        }
    }

    pub fn toned(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }
}

struct Border {
    h: char,
    v: char,
    top: [char; 3],
    mid: [char; 3],
    bottom: [char; 3],
}

const BOX: Border = Border {
    h: '─',
    v: '│',
    top: ['┌', '┬', '┐'],
    mid: ['├', '┼', '┤'],
    bottom: ['└', '┴', '┘'],
};

const ASCII: Border = Border {
    h: '-',
    v: '|',
    top: ['+', '+', '+'],
    mid: ['+', '+', '+'],
    bottom: ['+', '+', '+'],
};

/// A fixed set of columns and the rows under them.
#[derive(Debug, Clone)]
pub struct Table {
    headers: Vec<(&'static str, Align)>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(headers: &[(&'static str, Align)]) -> Self {
        Self {
            headers: headers.to_vec(),
            rows: Vec::new(),
        }
    }

    /// Append a row. Missing cells render empty, extra cells are dropped.
    pub fn push(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    fn widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, (h, _))| {
                self.rows
                    .iter()
                    .filter_map(|r| r.get(i))
                    .map(|c| c.text.chars().count())
                    .chain(std::iter::once(h.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    pub fn render(&self, ascii: bool) -> String {
        let border = if ascii { &ASCII } else { &BOX };
        let widths = self.widths();
        let mut out = String::new();

        rule(&mut out, border, border.top, &widths);

        out.push(border.v);
        for ((header, _), width) in self.headers.iter().zip(&widths) {
            let text = pad(header, *width, Align::Left);
            if ascii {
                out.push_str(&format!(" {text} "));
            } else {
                out.push_str(&format!(" {BOLD}{text}{RESET} "));
            }
            out.push(border.v);
        }
        out.push('\n');

        rule(&mut out, border, border.mid, &widths);

        let empty = Cell::new("");
        for row in &self.rows {
            out.push(border.v);
            for (i, ((_, align), width)) in self.headers.iter().zip(&widths).enumerate() {
                let cell = row.get(i).unwrap_or(&empty);
                let text = pad(&cell.text, *width, *align);
                match (ascii, cell.tone) {
                    (false, Tone::Warn) => out.push_str(&format!(" {YELLOW}{text}{RESET} ")),
                    (false, Tone::Fail) => out.push_str(&format!(" {RED}{text}{RESET} ")),
                    _ => out.push_str(&format!(" {text} ")),
                }
                out.push(border.v);
            }
            out.push('\n');
        }

        rule(&mut out, border, border.bottom, &widths);
        out
    }
}

fn rule(out: &mut String, border: &Border, corners: [char; 3], widths: &[usize]) {
    out.push(corners[0]);
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            out.push(corners[1]);
        }
        out.extend(std::iter::repeat_n(border.h, width + 2));
    }
    out.push(corners[2]);
    out.push('\n');
}

fn pad(text: &str, width: usize, align: Align) -> String {
    match align {
        Align::Left => format!("{text:<width$}"),
        Align::Right => format!("{text:>width$}"),
    }
}
