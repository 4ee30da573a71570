use std::io::{self, Stdout, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crossterm::QueueableCommand;
use crossterm::cursor::MoveToColumn;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};

use crate::domain::IdRange;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { range: IdRange },
    /// `total` is the number of profiles ranked so far.
    Ranked { total: u64 },
    Flushed { records: usize },
    Finished { elapsed: Duration },
}

pub trait ProgressSink: Send + Sync {
    fn event(&self, event: ProgressEvent);
}

/// Success counter shared by all workers. Display only.
#[derive(Debug, Default)]
pub struct ProgressCounter {
    ranked: AtomicU64,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one success and returns the new total.
    pub fn record(&self) -> u64 {
        self.ranked.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn total(&self) -> u64 {
        self.ranked.load(Ordering::Relaxed)
    }
}

/// Single updating status line.
pub struct TerminalProgress<W: Write + Send = Stdout> {
    out: Mutex<W>,
    // Totals can arrive out of order from different workers.
    shown: AtomicU64,
}

impl TerminalProgress<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalProgress<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            shown: AtomicU64::new(0),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn render(&self, event: &ProgressEvent) -> io::Result<()> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        match event {
            ProgressEvent::Started { range } => {
                writeln!(out, "Scraping profiles {range} in progress...")?;
            }
            ProgressEvent::Ranked { total } => {
                if self.shown.fetch_max(*total, Ordering::Relaxed) > *total {
                    return Ok(());
                }
                out.queue(MoveToColumn(0))?
                    .queue(Clear(ClearType::CurrentLine))?
                    .queue(Print(format!("Processed {total} profiles...")))?;
            }
            ProgressEvent::Flushed { .. } => {}
            ProgressEvent::Finished { elapsed } => {
                writeln!(out)?;
                writeln!(out, "Scraping and sorting completed in {elapsed:.2?}")?;
            }
        }
        out.flush()
    }
}

impl<W: Write + Send> ProgressSink for TerminalProgress<W> {
    fn event(&self, event: ProgressEvent) {
        if let Err(err) = self.render(&event) {
            tracing::debug!(error = %err, "progress line not rendered");
        }
    }
}
