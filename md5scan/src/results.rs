use std::io::{self, Write};
use std::time::Duration;

use crate::kernel::Backend;
use crate::metrics::ScanStats;

/// Message printed when the whole corpus was scanned without a hit
pub const NOT_FOUND_MESSAGE: &str = "Target MD5 sum is not found";

/// A candidate whose digest equals the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Absolute corpus offset of the first byte
    pub offset: usize,
    /// Partition that found it
    pub partition: usize,
    /// Kernel lane that produced the digest
    pub lane: usize,
    /// The matched bytes, exactly the substring length
    pub bytes: Vec<u8>,
}

impl Match {
    /// Lossy text rendering for display
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Found(Match),
    NotFound,
}

impl ScanOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, ScanOutcome::Found(_))
    }

    pub fn as_match(&self) -> Option<&Match> {
        match self {
            ScanOutcome::Found(m) => Some(m),
            ScanOutcome::NotFound => None,
        }
    }
}

/// Everything a finished scan produced
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub outcome: ScanOutcome,
    pub stats: ScanStats,
    pub elapsed: Duration,
    pub backend: Backend,
    pub threads: usize,
}

impl ScanReport {
    /// Writes the outcome line. Matched bytes are written unchanged.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        match &self.outcome {
            ScanOutcome::Found(m) => {
                out.write_all(b"Match with string '")?;
                out.write_all(&m.bytes)?;
                out.write_all(b"'\n")?;
            }
            ScanOutcome::NotFound => writeln!(out, "{}", NOT_FOUND_MESSAGE)?,
        }
        out.flush()
    }
}
