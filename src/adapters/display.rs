//! Text rendering of the local screen.
//!
//! Implements [`DisplayPort`] by laying each [`DisplayFrame`] out as the
//! fixed rows of the 320×240 panel and writing them to the log whenever
//! they change.  A pixel driver would consume the same rows.

use core::fmt::Write;

use log::info;

use crate::app::display::{DisplayFrame, PanelFrame, ProgressBar, RemoteBanner};
use crate::app::ports::DisplayPort;

/// Character cells in the progress bar.
const BAR_CELLS: usize = 16;

pub type Row = heapless::String<80>;
pub type Screen = heapless::Vec<Row, 6>;

/// Lay a frame out as screen rows.
pub fn layout(frame: &DisplayFrame) -> Screen {
    match frame {
        DisplayFrame::Panel(p) => panel_rows(p),
        DisplayFrame::Remote(b) => banner_rows(b),
    }
}

fn panel_rows(p: &PanelFrame) -> Screen {
    let mut rows = Screen::new();
    match p.readings {
        Some(m) => {
            push(&mut rows, format_args!("V: {:>10.2}", m.voltage_v));
            push(&mut rows, format_args!("I: {:>10.2}", m.current_a));
            push(&mut rows, format_args!("R: {:>10.2}", m.resistance_ohm));
        }
        None => {
            push(&mut rows, format_args!("V: {:>10}", "--"));
            push(&mut rows, format_args!("I: {:>10}", "--"));
            push(&mut rows, format_args!("R: {:>10}", "--"));
        }
    }
    match p.bar {
        ProgressBar::Hidden => push(&mut rows, format_args!("TIME: {}", p.clock)),
        ProgressBar::Empty => push(&mut rows, format_args!("TIME: {} [{}]", p.clock, bar(0.0))),
        ProgressBar::Remaining(f) => {
            push(&mut rows, format_args!("TIME: {} [{}]", p.clock, bar(f)));
        }
    }
    push(&mut rows, format_args!("STATUS: {}", p.status_label));
    rows
}

fn banner_rows(b: &RemoteBanner) -> Screen {
    let mut rows = Screen::new();
    push(&mut rows, format_args!("Mode: Web Server"));
    push(&mut rows, format_args!("Controlled via"));
    push(&mut rows, format_args!("Local Web"));
    push(&mut rows, format_args!("SSID: {}", b.ap_ssid));
    push(&mut rows, format_args!("IP: {}", b.ap_address));
    rows
}

fn bar(fraction: f32) -> heapless::String<{ BAR_CELLS * 3 }> {
    let filled = ((fraction.clamp(0.0, 1.0) * BAR_CELLS as f32).round()) as usize;
    let mut s = heapless::String::new();
    for i in 0..BAR_CELLS {
        let _ = s.push(if i < filled { '█' } else { '░' });
    }
    s
}

fn push(rows: &mut Screen, args: core::fmt::Arguments<'_>) {
    let mut row = Row::new();
    // Rows longer than the panel are cut.
    let _ = row.write_fmt(args);
    let _ = rows.push(row);
}

/// Logs the screen on change.
#[derive(Default)]
pub struct LogDisplay {
    last: Screen,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> &Screen {
        &self.last
    }
}

impl DisplayPort for LogDisplay {
    fn render(&mut self, frame: &DisplayFrame) {
        let screen = layout(frame);
        if screen == self.last {
            return;
        }
        for row in &screen {
            info!("LCD | {}", row);
        }
        self.last = screen;
    }
}
