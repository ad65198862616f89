#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use env_logger::Env;
use itertools::Itertools;

use crate::{
    pair_reader::InputFiles,
    pair_writer::{OutputTarget, STDOUT_NAME},
    read_pair::ReadStatus,
    utils::{built_info, NUM_CPU},
    whitelist::BarcodeWhitelist,
};

pub static TOOL_NAME: &str = "bcfilter";

static SHORT_USAGE: &str = "Filters barcode-tagged paired FASTQs by barcode status and whitelist.";

static LONG_USAGE: &str = "
Filters barcode-tagged paired FASTQs by barcode status and whitelist.

Input reads must carry the tags written by the barcode preprocessing step in their headers:

  @<gem-barcode>:<read-id> 1:N:0:<library-barcode>:<status>_<sgem-barcode>_<sgem-qual>_<trim-seq>_<trim-qual>

A read pair is kept when its status is one of --status and, when a barcode table (-B) or list
(-L) is given, its gem barcode is in the table (and its count is within --min and --max).

Read 1 FASTQs are given with --read1, wildcards may be used in file names.  When --read2 is
not given each read 2 FASTQ is found next to its read 1 FASTQ by replacing a single `1` in the
file name with a `2`.  FASTQs ending in `.gz` are decompressed.

Output is written to standard output as interleaved FASTQ unless --output gives a path prefix,
in which case `<prefix>_R1_001.fastq.gz` and `<prefix>_R2_001.fastq.gz` are written.

Example invocation:

bcfilter \\
  --status MATCH MISMATCH1 \\
  --barcode barcode_counts.tsv --min 100 \\
  --read1 'fastqs/sample_S1_L00*_R1_001.fastq.gz' \\
  --output filtered/sample
";

#[derive(Parser, Debug, Clone)]
#[clap(name = TOOL_NAME, version = built_info::VERSION.as_str(), about=SHORT_USAGE, long_about=LONG_USAGE, term_width=0)]
pub struct Opts {
    /// The barcode statuses of the read pairs to keep.
    #[clap(
        long,
        short = 's',
        default_values = &["MATCH", "MISMATCH1"],
        possible_values = ReadStatus::possible_values(),
        multiple_values = true,
        display_order = 1
    )]
    pub status: Vec<ReadStatus>,

    /// Path(s) to the read 1 FASTQs, or the interleaved FASTQs.
    ///
    /// Multiple values may be separated by spaces or commas. Wildcards (`*`, `?`, `[...]`) are
    /// expanded in file names.
    #[clap(long, short = '1', multiple_values = true, display_order = 2)]
    pub read1: Vec<String>,

    /// Path(s) to the read 2 FASTQs.
    ///
    /// If omitted, read 2 FASTQs are inferred from the read 1 FASTQ names.
    #[clap(long, short = '2', multiple_values = true, display_order = 2)]
    pub read2: Vec<String>,

    /// The input FASTQs are interleaved.
    #[clap(long = "interleaved-in", short = 'l', display_order = 3)]
    pub interleaved_in: bool,

    /// Read interleaved FASTQ from standard input.
    #[clap(long, display_order = 3)]
    pub stdin: bool,

    /// A barcode table with one `<barcode>[<TAB><count>]` per line.
    #[clap(long, short = 'B', display_order = 11)]
    pub barcode: Option<PathBuf>,

    /// A barcode list with one barcode per line.
    #[clap(long, short = 'L', display_order = 11)]
    pub list: Option<PathBuf>,

    /// The minimum count in the barcode table of a barcode to keep.
    ///
    /// [default: None]
    #[clap(long, short = 'm', display_order = 12)]
    pub min: Option<u64>,

    /// The maximum count in the barcode table of a barcode to keep.
    ///
    /// [default: None]
    #[clap(long, short = 'n', display_order = 12)]
    pub max: Option<u64>,

    /// The output path prefix, or `stdout`.
    ///
    /// Writing to standard output is always interleaved and uncompressed.
    #[clap(long, short = 'o', default_value = STDOUT_NAME, display_order = 21)]
    pub output: OutputTarget,

    /// Write interleaved output.
    #[clap(long = "interleaved-out", short = 'i', display_order = 21)]
    pub interleaved_out: bool,

    /// Write uncompressed output.
    #[clap(long, short = 'g', display_order = 21)]
    pub nogzip: bool,

    /// Path to write a TSV of filtering metrics to.
    ///
    /// [default: None]
    #[clap(long, display_order = 21)]
    pub metrics: Option<PathBuf>,

    /// Only log warnings, errors and the number of reads written.
    #[clap(long, display_order = 31)]
    pub quiet: bool,

    /// Number of threads for compressing the output reads.
    #[clap(long, default_value = NUM_CPU.as_str(), display_order = 31)]
    pub compressor_threads: usize,
}

/// Split values on commas, dropping empty entries.
fn split_values(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect_vec()
}

impl Opts {
    /// Check that the options are consistent with each other.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.stdin || !split_values(&self.read1).is_empty(),
            "Either --read1 or --stdin must be given"
        );
        ensure!(
            self.barcode.is_none() || self.list.is_none(),
            "Only one of --barcode and --list may be given"
        );
        ensure!(
            self.barcode.is_some() || (self.min.is_none() && self.max.is_none()),
            "--min and --max require --barcode"
        );
        ensure!(self.compressor_threads > 0, "--compressor-threads must be greater than zero");
        Ok(())
    }

    /// Whether per-file and progress messages are logged.
    pub fn verbose(&self) -> bool {
        !self.quiet
    }

    /// The read 1 (or interleaved) input.
    pub fn read1_input(&self) -> InputFiles {
        if self.stdin {
            InputFiles::Stdin
        } else {
            InputFiles::Patterns(split_values(&self.read1))
        }
    }

    /// The read 2 patterns, `None` when read 2 files are to be inferred.
    pub fn read2_patterns(&self) -> Option<Vec<String>> {
        let patterns = split_values(&self.read2);
        if patterns.is_empty() {
            None
        } else {
            Some(patterns)
        }
    }

    /// Load the barcode table or list, if one was given.
    pub fn whitelist(&self) -> Result<Option<BarcodeWhitelist>> {
        let (path, min, max) = match (&self.barcode, &self.list) {
            (Some(path), _) => (path, self.min, self.max),
            (None, Some(path)) => (path, None, None),
            (None, None) => return Ok(None),
        };
        let whitelist = BarcodeWhitelist::from_path(path, min, max)
            .with_context(|| format!("Unable to load barcodes from {}", path.to_string_lossy()))?;
        Ok(Some(whitelist))
    }
}

/// Implement defaults that match the CLI options to allow for easier testing.
///
/// Note that these defaults exist only within test code.
#[cfg(test)]
impl Default for Opts {
    fn default() -> Self {
        Self {
            status: vec![ReadStatus::Match, ReadStatus::Mismatch1],
            read1: vec![],
            read2: vec![],
            interleaved_in: false,
            stdin: false,
            barcode: None,
            list: None,
            min: None,
            max: None,
            output: OutputTarget::Stdout,
            interleaved_out: false,
            nogzip: false,
            metrics: None,
            quiet: false,
            compressor_threads: 2,
        }
    }
}

/// Parse args and set up logging / tracing
pub fn setup() -> Opts {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    Opts::parse()
}
