//! Output module for crawl events and results
//!
//! This module handles:
//! - The leveled event interface the crawl core reports through
//! - Crawl statistics and their console summary
//! - Writing the visited URL set

mod events;
pub mod stats;

pub use events::{CrawlEvent, EventSink, MemorySink, NullSink, TracingSink, Verbosity, DETAIL_TARGET};
pub use stats::{print_statistics, CrawlStatistics, StatsRecorder};

use crate::crawler::CrawlReport;
use std::io::{self, Write};
use std::path::Path;

/// Writes the visited URLs, one per line
pub fn write_visited<W: Write>(report: &CrawlReport, mut out: W) -> io::Result<()> {
    for url in &report.visited {
        writeln!(out, "{}", url)?;
    }
    out.flush()
}

/// Writes the visited URLs to a file, replacing it if it exists
pub fn write_visited_to_file(report: &CrawlReport, path: &Path) -> io::Result<()> {
    let file = std::fs::File::create(path)?;
    write_visited(report, io::BufWriter::new(file))
}
