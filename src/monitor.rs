//! Text output for polled bar arrays.
//!
//! `meter` redraws a single line of eighth-block glyphs in place; `raw`
//! prints one line of values per poll, for piping into other tools.

use std::io::{self, Write};

use crate::config::OutputStyle;

/// Glyphs for 0/8 through 8/8 of a cell
const LEVELS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

pub fn render_meter(bars: &[f32]) -> String {
    bars.iter()
        .map(|&v| {
            let level = (v.clamp(0.0, 1.0) * 8.0).round() as usize;
            LEVELS[level.min(8)]
        })
        .collect()
}

pub fn render_raw(bars: &[f32]) -> String {
    bars.iter()
        .map(|v| format!("{:.3}", v))
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct Monitor<W: Write> {
    style: OutputStyle,
    out: W,
}

impl<W: Write> Monitor<W> {
    pub fn new(style: OutputStyle, out: W) -> Self {
        Self { style, out }
    }

    pub fn draw(&mut self, bars: &[f32]) -> io::Result<()> {
        match self.style {
            OutputStyle::Meter => write!(self.out, "\r{}", render_meter(bars))?,
            OutputStyle::Raw => writeln!(self.out, "{}", render_raw(bars))?,
        }
        self.out.flush()
    }

    /// Leave the cursor on a fresh line.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.style == OutputStyle::Meter {
            writeln!(self.out)?;
        }
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meter_maps_levels_to_glyphs() {
        assert_eq!(render_meter(&[0.0, 0.5, 1.0, 2.0]), " ▄██");
    }

    #[test]
    fn raw_prints_fixed_precision() {
        assert_eq!(render_raw(&[0.0, 0.1234, 1.0]), "0.000 0.123 1.000");
    }

    #[test]
    fn monitor_writes_one_line_per_poll_in_raw_style() {
        let mut monitor = Monitor::new(OutputStyle::Raw, Vec::new());
        monitor.draw(&[0.5]).unwrap();
        monitor.draw(&[0.25]).unwrap();
        monitor.finish().unwrap();
        assert_eq!(String::from_utf8(monitor.out).unwrap(), "0.500\n0.250\n");
    }

    #[test]
    fn meter_redraws_in_place() {
        let mut monitor = Monitor::new(OutputStyle::Meter, Vec::new());
        monitor.draw(&[1.0]).unwrap();
        monitor.finish().unwrap();
        assert_eq!(String::from_utf8(monitor.out).unwrap(), "\r█\n");
    }
}
