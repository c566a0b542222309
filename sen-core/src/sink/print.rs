//! Sink que imprime relatórios formatados

use std::io::{self, Stderr, Stdout, Write};

use crate::format::{OutputFormat, Report};
use crate::sink::{CycleFailure, Sink, SinkError, SinkResult};
use crate::types::Measurement;

/// Escreve cada medição em `out` e cada ciclo com falha em `err`
#[derive(Debug)]
pub struct PrintSink<W = Stdout, E = Stderr> {
    name: String,
    format: OutputFormat,
    pretty: bool,
    out: W,
    err: E,
}

impl PrintSink {
    /// Saída padrão e erro padrão do processo
    pub fn stdout(name: impl Into<String>, format: OutputFormat, pretty: bool) -> Self {
        Self::new(name, format, pretty, io::stdout(), io::stderr())
    }
}

impl<W: Write, E: Write> PrintSink<W, E> {
    pub fn new(name: impl Into<String>, format: OutputFormat, pretty: bool, out: W, err: E) -> Self {
        Self {
            name: name.into(),
            format,
            pretty,
            out,
            err,
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn into_parts(self) -> (W, E) {
        (self.out, self.err)
    }

    fn io_error(&self, e: io::Error) -> SinkError {
        SinkError::Io {
            sink: "print".into(),
            message: e.to_string(),
        }
    }
}

fn serialization_error(e: serde_json::Error) -> SinkError {
    SinkError::Serialization {
        sink: "print".into(),
        message: e.to_string(),
    }
}

impl<W: Write + Send, E: Write + Send> Sink for PrintSink<W, E> {
    fn name(&self) -> &str {
        "print"
    }

    fn consume(&mut self, measurement: &Measurement) -> SinkResult<()> {
        let rendered = Report::new(&self.name, measurement)
            .render(self.format, self.pretty)
            .map_err(serialization_error)?;
        writeln!(self.out, "{}", rendered).map_err(|e| self.io_error(e))?;
        self.out.flush().map_err(|e| self.io_error(e))
    }

    fn cycle_failed(&mut self, failure: &CycleFailure) -> SinkResult<()> {
        writeln!(self.err, "cycle {} failed: {}", failure.cycle, failure.error)
            .map_err(|e| self.io_error(e))
    }
}
