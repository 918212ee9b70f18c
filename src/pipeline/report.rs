//! Session summaries and console feedback.

use std::io::Write;

use serde::Serialize;

use crate::audio::meter::render_level;

/// How enhanced frames reach the primary sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    /// Delay-compensated, sample-exact against the input file.
    File,
    /// Full frames passed straight through; output lags by the engine delay.
    Capture,
}

/// Engine geometry announced when a session starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub mode: StreamMode,
    pub version: String,
    pub frame_length: usize,
    pub sample_rate: u32,
    pub delay_samples: usize,
    pub total_samples: Option<u64>,
}

/// Outcome of a completed session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamReport {
    pub mode: StreamMode,
    pub sample_rate: u32,
    pub delay_samples: usize,
    pub frames_processed: u64,
    pub samples_written: u64,
    pub reference_samples_written: Option<u64>,
    pub total_cpu_usec: u64,
    pub total_processed_usec: f64,
    pub rtf: Option<f64>,
}

impl StreamReport {
    /// Duration of the primary output, in seconds.
    pub fn seconds_written(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples_written as f64 / f64::from(self.sample_rate)
    }
}

/// Receives progress from the orchestrator. All methods default to no-ops.
pub trait StreamObserver {
    /// Capture mode: the input device about to be started.
    fn on_device_selected(&mut self, _name: &str) {}

    fn on_start(&mut self, _info: &SessionInfo) {}

    /// File mode: `position` is the end of the frame just processed.
    fn on_progress(&mut self, _position: u64, _total: u64) {}

    /// Capture mode: loudness of the raw frame, 0..=100.
    fn on_level(&mut self, _percent: u8) {}

    fn on_finish(&mut self, _report: &StreamReport) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl StreamObserver for NullObserver {}

/// Progress bar, level meter and RTF line on a terminal.
///
/// Console output is informational; write failures are ignored.
pub struct ConsoleObserver<W: Write> {
    out: W,
    progress_width: usize,
    meter_width: usize,
    last_percent: Option<u32>,
}

impl ConsoleObserver<std::io::Stdout> {
    pub fn stdout(progress_width: usize, meter_width: usize) -> Self {
        Self::new(std::io::stdout(), progress_width, meter_width)
    }
}

impl<W: Write> ConsoleObserver<W> {
    pub fn new(out: W, progress_width: usize, meter_width: usize) -> Self {
        Self {
            out,
            progress_width,
            meter_width,
            last_percent: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn progress_ratio(position: u64, total: u64) -> f64 {
    if total == 0 {
        1.0
    } else {
        (position as f64 / total as f64).min(1.0)
    }
}

fn progress_percent(position: u64, total: u64) -> u32 {
    (progress_ratio(position, total) * 100.0).round() as u32
}

/// `[ 40%]########            |` for a position out of `total`, capped at 100%.
pub fn render_progress(position: u64, total: u64, width: usize) -> String {
    let ratio = progress_ratio(position, total);
    let percentage = progress_percent(position, total);
    let filled = ((ratio * width as f64).round() as usize).min(width);
    format!(
        "[{:3}%]{}{}|",
        percentage,
        "#".repeat(filled),
        " ".repeat(width - filled)
    )
}

impl<W: Write> StreamObserver for ConsoleObserver<W> {
    fn on_device_selected(&mut self, name: &str) {
        let _ = writeln!(self.out, "Selected device: {}.", name);
    }

    fn on_start(&mut self, info: &SessionInfo) {
        let _ = writeln!(self.out, "V{}\n", info.version);
        let line = match info.mode {
            StreamMode::File => "Processing audio...",
            StreamMode::Capture => "Start recording (press Ctrl+C to stop)...",
        };
        let _ = writeln!(self.out, "{}", line);
        let _ = self.out.flush();
    }

    fn on_progress(&mut self, position: u64, total: u64) {
        let percent = progress_percent(position, total);
        if self.last_percent == Some(percent) {
            return;
        }
        self.last_percent = Some(percent);
        let bar = render_progress(position, total, self.progress_width);
        let _ = write!(self.out, "\r{}", bar);
        let _ = self.out.flush();
    }

    fn on_level(&mut self, percent: u8) {
        let _ = write!(self.out, "\r{}", render_level(percent, self.meter_width));
        let _ = self.out.flush();
    }

    fn on_finish(&mut self, report: &StreamReport) {
        let _ = writeln!(self.out);
        match report.rtf {
            Some(rtf) => {
                let _ = writeln!(self.out, "Real time factor : {:.3}", rtf);
            }
            None => {
                let _ = writeln!(self.out, "Real time factor : undefined (no audio processed)");
            }
        }
        let _ = self.out.flush();
    }
}
