#![forbid(unsafe_code)]
//! Gem barcode whitelists.
//!
//! A whitelist is loaded from a barcode table produced by the upstream preprocessing step. Each
//! line holds either a bare barcode or a barcode and its observed read count separated by a tab:
//!
//! ```text
//! AACCGGTTAACCGGTT	1520
//! AACCGGTTAACCGGTA
//! ```
//!
//! Barcodes are stored by their [`seq_to_hash`] key rather than their bytes.
//!
//! # Usage
//!
//! ```rust
//! use bcfilter_lib::whitelist::BarcodeWhitelist;
//! let whitelist = BarcodeWhitelist::from_counts([("AACCGG", 10)], Some(5), Some(20));
//! assert!(whitelist.keep(b"AACCGG"));
//! assert!(!whitelist.keep(b"TTTTTT"));
//! ```

use std::{
    fs::File,
    io::{BufReader, Read},
    num::ParseIntError,
    path::{Path, PathBuf},
};

use ahash::AHashMap;
use csv::{ReaderBuilder, Trim};
use gzp::BUFSIZE;
use thiserror::Error;

/// The integer key a barcode is stored under.
pub type BarcodeKey = u128;

/// The number of leading bases that contribute to a [`BarcodeKey`].
pub const MAX_ENCODED_BASES: usize = 64;

/// The errors that may occur when loading a [`BarcodeWhitelist`].
#[derive(Error, Debug)]
pub enum WhitelistError {
    #[error("Could not open barcode file: {}", path.to_string_lossy())]
    Open { path: PathBuf, source: std::io::Error },

    #[error("Unable to read barcode file line number {line}: {source}")]
    InvalidLine { source: csv::Error, line: usize },

    #[error("Unknown barcode file format on line number {line}: expected 1 or 2 tab-separated fields, found {fields}")]
    InvalidNumberOfColumns { fields: usize, line: usize },

    #[error("Invalid barcode count `{count}` on line number {line}")]
    InvalidCount { count: String, line: usize, source: ParseIntError },
}

/// Encode a base as a base-4 digit. Anything other than `ACGT` (either case) is treated as `A`.
#[inline]
fn base_to_digit(base: u8) -> BarcodeKey {
    match base {
        b'C' | b'c' => 1,
        b'G' | b'g' => 2,
        b'T' | b't' => 3,
        _ => 0,
    }
}

/// Encode a sequence as a base-4 numeral with the first base as the least significant digit.
///
/// The encoding is lossy by construction:
/// - case is folded, `acgt` encodes like `ACGT`
/// - `N` and any other non-`ACGT` byte encodes like `A`
/// - bases past [`MAX_ENCODED_BASES`] do not contribute to the key
pub fn seq_to_hash(seq: &[u8]) -> BarcodeKey {
    seq.iter()
        .take(MAX_ENCODED_BASES)
        .enumerate()
        .fold(0, |key, (i, base)| key | (base_to_digit(*base) << (2 * i)))
}

/// A set of gem barcodes with their observed counts and optional count bounds.
#[derive(Debug, Clone, Default)]
pub struct BarcodeWhitelist {
    counts: AHashMap<BarcodeKey, u64>,
    min: Option<u64>,
    max: Option<u64>,
}

impl BarcodeWhitelist {
    /// Load a whitelist from a barcode table file.
    ///
    /// # Errors
    ///
    /// - [`WhitelistError::Open`] if the file can't be opened
    /// - any error from [`BarcodeWhitelist::from_reader`]
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        min: Option<u64>,
        max: Option<u64>,
    ) -> Result<Self, WhitelistError> {
        let file = File::open(&path)
            .map_err(|source| WhitelistError::Open { path: path.as_ref().to_path_buf(), source })?;
        Self::from_reader(BufReader::with_capacity(BUFSIZE, file), min, max)
    }

    /// Load a whitelist from a barcode table.
    ///
    /// Empty lines are skipped. Rows without a count are stored with a count of zero. When a
    /// barcode occurs more than once the last row wins.
    ///
    /// # Errors
    ///
    /// - [`WhitelistError::InvalidNumberOfColumns`] if a row has more than two fields
    /// - [`WhitelistError::InvalidCount`] if a count is not a non-negative integer
    /// - [`WhitelistError::InvalidLine`] if the table can't be read
    pub fn from_reader<R: Read>(
        reader: R,
        min: Option<u64>,
        max: Option<u64>,
    ) -> Result<Self, WhitelistError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .trim(Trim::All)
            .from_reader(reader);

        let mut counts = AHashMap::new();
        for (index, record) in reader.byte_records().enumerate() {
            let line = index + 1;
            let record = record.map_err(|source| WhitelistError::InvalidLine { source, line })?;
            let line = record.position().map_or(line, |p| p.line() as usize);
            match record.len() {
                1 if record[0].is_empty() => continue,
                1 => {
                    counts.insert(seq_to_hash(&record[0]), 0);
                }
                // a trailing delimiter without a count
                2 if record[1].is_empty() => {
                    counts.insert(seq_to_hash(&record[0]), 0);
                }
                2 => {
                    let count = String::from_utf8_lossy(&record[1]).to_string();
                    let parsed = count
                        .parse::<u64>()
                        .map_err(|source| WhitelistError::InvalidCount { count, line, source })?;
                    counts.insert(seq_to_hash(&record[0]), parsed);
                }
                fields => return Err(WhitelistError::InvalidNumberOfColumns { fields, line }),
            }
        }
        Ok(Self { counts, min, max })
    }

    /// Build a whitelist from barcode and count pairs.
    pub fn from_counts<I, B>(counts: I, min: Option<u64>, max: Option<u64>) -> Self
    where
        I: IntoIterator<Item = (B, u64)>,
        B: AsRef<[u8]>,
    {
        let counts =
            counts.into_iter().map(|(barcode, count)| (seq_to_hash(barcode.as_ref()), count)).collect();
        Self { counts, min, max }
    }

    /// Returns true if the barcode is present and its count satisfies every configured bound.
    pub fn keep(&self, barcode: &[u8]) -> bool {
        match self.count(barcode) {
            Some(count) => {
                self.min.map_or(true, |min| count >= min) && self.max.map_or(true, |max| count <= max)
            }
            None => false,
        }
    }

    /// The stored count for the barcode, if present.
    pub fn count(&self, barcode: &[u8]) -> Option<u64> {
        self.counts.get(&seq_to_hash(barcode)).copied()
    }

    /// The number of distinct barcode keys.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn min(&self) -> Option<u64> {
        self.min
    }

    pub fn max(&self) -> Option<u64> {
        self.max
    }
}
