//! Plain-text reporting on the terminal

use crate::output::report::{Metadata, ResourceReport};
use crate::output::traits::{OutputHandler, OutputResult};
use std::io::{self, Write};
use std::sync::Mutex;

/// Prints each completed resource as soon as it is recorded
///
/// Writes are serialized through an internal mutex so that blocks from
/// concurrent workers never interleave.
pub struct CliOutput<W: Write + Send> {
    out: Mutex<W>,
}

impl CliOutput<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> CliOutput<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Returns the underlying writer
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W: Write + Send> OutputHandler for CliOutput<W> {
    fn record(&self, report: &ResourceReport) -> OutputResult<()> {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        write_resource(&mut *out, report)?;
        out.flush()?;
        Ok(())
    }
}

/// Writes the block for one resource
pub fn write_resource<W: Write + ?Sized>(out: &mut W, report: &ResourceReport) -> io::Result<()> {
    writeln!(out, "Resource: {}", report.resource)?;
    writeln!(out, "  Endpoints discovered: {}", report.endpoint_count())?;

    if report.endpoints.is_empty() {
        writeln!(out, "  No endpoints were found.")?;
        writeln!(out)?;
        return Ok(());
    }

    for endpoint in &report.endpoints {
        writeln!(out, "    - {}", endpoint.link)?;
    }
    writeln!(out)
}

/// Writes the run summary
pub fn write_summary<W: Write + ?Sized>(out: &mut W, metadata: &Metadata) -> io::Result<()> {
    writeln!(out, "Summary")?;
    writeln!(out, "=======")?;
    writeln!(out, "Resources scanned : {}", metadata.total_resources)?;
    writeln!(out, "Endpoints discovered: {}", metadata.total_endpoints)
}

/// Prints the run summary to stdout
pub fn print_summary(metadata: &Metadata) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_summary(&mut out, metadata)
}
