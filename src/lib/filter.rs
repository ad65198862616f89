//! Selection of read pairs by barcode status and whitelist, and the metrics collected while
//! doing so.
#![forbid(unsafe_code)]

use std::{path::Path, time::Instant};

use ahash::AHashSet;
use anyhow::{Context, Result};
use fgoxide::io::DelimFile;
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    pair_writer::WritePair,
    read_pair::{ReadPair, ReadStatus},
    whitelist::BarcodeWhitelist,
};

/// The number of analyzed pairs between progress messages.
pub const PROGRESS_INTERVAL: u64 = 250_000;

/// Counts describing a completed filtering run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterMetrics {
    /// The number of read pairs read from the input.
    pub reads_analyzed: u64,
    /// The number of read pairs written to the output.
    pub reads_output: u64,
    pub reads_per_second: f64,
    pub elapsed_seconds: f64,
}

impl FilterMetrics {
    /// Write the metrics as a single row TSV file with a header.
    pub fn write<P: AsRef<Path>>(&self, path: &P) -> Result<()> {
        DelimFile::default().write_tsv(path, std::iter::once(self)).with_context(|| {
            format!("Unable to write metrics to {}", path.as_ref().to_string_lossy())
        })
    }
}

/// Forwards the read pairs with an accepted status, and a whitelisted gem barcode if a whitelist
/// is given, from a source to a sink.
pub struct ReadFilter {
    statuses: AHashSet<ReadStatus>,
    whitelist: Option<BarcodeWhitelist>,
    verbose: bool,
    reads_analyzed: u64,
    reads_output: u64,
    start: Instant,
}

impl ReadFilter {
    pub fn new<I>(statuses: I, whitelist: Option<BarcodeWhitelist>, verbose: bool) -> Self
    where
        I: IntoIterator<Item = ReadStatus>,
    {
        Self {
            statuses: statuses.into_iter().collect(),
            whitelist,
            verbose,
            reads_analyzed: 0,
            reads_output: 0,
            start: Instant::now(),
        }
    }

    /// True if the pair should be written.
    pub fn accept(&self, pair: &ReadPair) -> bool {
        self.statuses.contains(&pair.status)
            && self.whitelist.as_ref().map_or(true, |w| w.keep(&pair.gem_bc))
    }

    /// The metrics for everything filtered so far.
    pub fn metrics(&self) -> FilterMetrics {
        let elapsed_seconds = self.start.elapsed().as_secs_f64();
        let reads_per_second = if elapsed_seconds > 0.0 {
            self.reads_analyzed as f64 / elapsed_seconds
        } else {
            0.0
        };
        FilterMetrics {
            reads_analyzed: self.reads_analyzed,
            reads_output: self.reads_output,
            reads_per_second,
            elapsed_seconds,
        }
    }

    fn log_progress(&self) {
        let metrics = self.metrics();
        info!(
            "Analyzed {} reads ({:.0} reads/sec), {} reads output",
            metrics.reads_analyzed, metrics.reads_per_second, metrics.reads_output
        );
    }

    /// Pull every pair from `source`, writing the accepted ones to `sink`.
    ///
    /// Stops at the first error from either side.
    pub fn run<I, S>(&mut self, source: I, sink: &mut S) -> Result<FilterMetrics>
    where
        I: IntoIterator<Item = Result<ReadPair>>,
        S: WritePair,
    {
        self.start = Instant::now();
        for pair in source {
            let pair = pair?;
            self.reads_analyzed += 1;
            if self.accept(&pair) {
                sink.write_pair(&pair)?;
                self.reads_output += 1;
            }
            if self.verbose && self.reads_analyzed % PROGRESS_INTERVAL == 0 {
                self.log_progress();
            }
        }
        if self.verbose {
            self.log_progress();
        }
        Ok(self.metrics())
    }
}
