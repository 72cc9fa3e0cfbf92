//! Sample output
//!
//! Text mode appends one line per tick with a bracketed group per core:
//!
//! ```text
//! [ 12.40% 10.02%  8.75%  8.71%  4.10% 15.33%] [  0.51%  0.48% ...]
//! ```
//!
//! JSON mode writes one object per line instead.

use std::io::Write;

use clap::ValueEnum;
use serde::Serialize;

use crate::domain::PortStatError;
use crate::pmc::HardwareEvent;

use super::sampler::{CoreSample, TickSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Render one tick as a text line (without the trailing newline).
pub fn format_text_row(sample: &TickSample) -> String {
    let groups: Vec<String> = sample
        .cores
        .iter()
        .map(|core| {
            let cells: String = core.percentages.iter().map(|p| format!("{p:6.2}%")).collect();
            format!("[{cells}]")
        })
        .collect();
    groups.join(" ")
}

/// Column legend for text mode.
pub fn format_header(events: &[HardwareEvent], cores: usize) -> String {
    let names: Vec<&str> = events.iter().map(|e| e.name).collect();
    format!("{cores} cores, per core: [{}]", names.join(" "))
}

#[derive(Serialize)]
struct JsonRow<'a> {
    elapsed_cycles: u64,
    ports: &'a [&'static str],
    cores: &'a [CoreSample],
}

/// Render one tick as a single-line JSON object.
///
/// # Errors
/// Propagates serialization failures.
pub fn format_json_row(
    sample: &TickSample,
    ports: &[&'static str],
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&JsonRow {
        elapsed_cycles: sample.elapsed_cycles,
        ports,
        cores: &sample.cores,
    })
}

/// Appends rendered samples to an output stream, flushing after every line.
pub struct SampleWriter<W: Write> {
    out: W,
    format: OutputFormat,
    ports: Vec<&'static str>,
}

impl<W: Write> SampleWriter<W> {
    pub fn new(out: W, format: OutputFormat, events: &[HardwareEvent]) -> Self {
        Self { out, format, ports: events.iter().map(|e| e.name).collect() }
    }

    /// Write one sample.
    ///
    /// # Errors
    /// [`PortStatError::Output`] if the stream rejects the write.
    pub fn write_sample(&mut self, sample: &TickSample) -> Result<(), PortStatError> {
        let line = match self.format {
            OutputFormat::Text => format_text_row(sample),
            OutputFormat::Json => format_json_row(sample, &self.ports)
                .map_err(|e| PortStatError::Output(e.to_string()))?,
        };
        writeln!(self.out, "{line}")
            .and_then(|()| self.out.flush())
            .map_err(|e| PortStatError::Output(e.to_string()))
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
