use indicatif::style::TemplateError;
use indicatif::{ProgressBar, ProgressStyle};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter, Stdout, Write};
use std::path::Path;

use crate::stats::{RunSummary, SessionStats};

/// Status refresh cadence, in primes. Repainting on every hit would throttle
/// the stream itself.
const STATUS_EVERY: u64 = 4096;

/// Writes the prime stream to stdout and keeps a status line on stderr. The
/// two never share a stream, so piping the primes away leaves the status
/// visible.
pub struct Reporter {
    out: BufWriter<Stdout>,
    status: ProgressBar,
}

impl Reporter {
    pub fn new() -> Result<Self, TemplateError> {
        let status = ProgressBar::new_spinner();
        status.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        Ok(Self {
            out: BufWriter::with_capacity(1 << 16, io::stdout()),
            status,
        })
    }

    pub fn report(&mut self, value: u64, stats: &SessionStats) -> io::Result<()> {
        writeln!(self.out, "{value}")?;
        if stats.primes_found % STATUS_EVERY == 0 {
            self.out.flush()?;
            self.refresh_status(stats);
        }
        Ok(())
    }

    fn refresh_status(&self, stats: &SessionStats) {
        self.status.set_message(format!(
            "primes: {} | last: {} | up {} | ~{:.1}k numbers/s | {} remaining",
            stats.primes_found,
            stats.last_value,
            format_secs(stats.elapsed_secs()),
            stats.numbers_per_sec() / 1000.0,
            format_secs(stats.remaining_secs()),
        ));
    }

    /// Flush the stream and clear the status line so the terminal is left
    /// the way we found it.
    pub fn finish(&mut self) -> io::Result<()> {
        self.out.flush()?;
        self.status.finish_and_clear();
        Ok(())
    }
}

pub fn write_summary(path: &Path, summary: &RunSummary) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, summary)?;
    Ok(())
}

/// Render seconds as `Ny Nd HH:MM:SS`; a full sweep of u64 is measured in
/// geological time, so years lead.
fn format_secs(secs: u64) -> String {
    format!(
        "{}y {}d {:02}:{:02}:{:02}",
        secs / 31_536_000,
        (secs / 86_400) % 365,
        (secs / 3_600) % 24,
        (secs / 60) % 60,
        secs % 60
    )
}
