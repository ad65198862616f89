//! Reading of [`ReadPair`]s from paired or interleaved FASTQ files.
//!
//! A [`PairedReadSource`] owns the list of input files for each mate and opens them one
//! pair at a time, moving on to the next pair of files whenever the current pair is
//! exhausted.
#![forbid(unsafe_code)]

use std::{
    fmt::Display,
    fs::File,
    io::{self, BufReader, Read},
    path::PathBuf,
};

use anyhow::{anyhow, ensure, Context, Result};
use flate2::read::MultiGzDecoder;
use gzp::BUFSIZE;
use log::info;
use seq_io::fastq::{self, Record};

use crate::{
    read_pair::{ReadPair, ReadPairError},
    utils::{expand_glob, infer_read_file_name, is_gzip_path},
};

/// The marker that distinguishes mate 2 file names from mate 1 file names.
pub const READ2_MARKER: char = '2';

type FastqReader = fastq::Reader<Box<dyn Read>>;

/// Where mate 1 (or interleaved) reads come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputFiles {
    /// Interleaved reads on standard input.
    Stdin,
    /// Path patterns, each possibly containing glob wildcards.
    Patterns(Vec<String>),
}

/// A single input stream.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FastqInput {
    Stdin,
    Path(PathBuf),
}

impl Display for FastqInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FastqInput::Stdin => write!(f, "stdin"),
            FastqInput::Path(path) => write!(f, "{}", path.to_string_lossy()),
        }
    }
}

impl FastqInput {
    /// Open the input, decompressing it when its name ends in `.gz`.
    fn open(&self) -> Result<FastqReader> {
        let reader: Box<dyn Read> = match self {
            FastqInput::Stdin => Box::new(io::stdin()),
            FastqInput::Path(path) => {
                let file = File::open(path).with_context(|| {
                    format!("Unable to open FASTQ file: {}", path.to_string_lossy())
                })?;
                let file = BufReader::with_capacity(BUFSIZE, file);
                if is_gzip_path(path) {
                    Box::new(MultiGzDecoder::new(file))
                } else {
                    Box::new(file)
                }
            }
        };
        Ok(fastq::Reader::with_capacity(reader, BUFSIZE))
    }
}

/// Expand the patterns for one mate into the list of files to read.
fn expand_patterns(patterns: &[String], mate: &str) -> Result<Vec<FastqInput>> {
    let mut inputs = vec![];
    for pattern in patterns {
        let paths = expand_glob(pattern)?;
        ensure!(
            !paths.is_empty() && paths.iter().all(|p| p.is_file()),
            "{} file(s) not found: {}",
            mate,
            pattern
        );
        inputs.extend(paths.into_iter().map(FastqInput::Path));
    }
    Ok(inputs)
}

/// The streams of the file pair currently being read.
struct OpenFiles {
    read1: FastqReader,
    read2: Option<FastqReader>,
    read1_name: String,
    read2_name: String,
}

impl OpenFiles {
    /// Read the next pair from the mate 1 and mate 2 streams, `None` once both are exhausted.
    fn next_pair(&mut self) -> Result<Option<ReadPair>> {
        let mate2 = match self.read2.as_mut() {
            Some(reader) => reader,
            None => return self.next_interleaved(),
        };
        match (self.read1.next(), mate2.next()) {
            (None, None) => Ok(None),
            (Some(read1), Some(read2)) => {
                let read1 = read1
                    .with_context(|| format!("Failed reading FASTQ from {}", self.read1_name))?;
                let read2 = read2
                    .with_context(|| format!("Failed reading FASTQ from {}", self.read2_name))?;
                Ok(Some(ReadPair::from_records(&read1, &read2)?))
            }
            (Some(_), None) => Err(ReadPairError::TruncatedPair(format!(
                "{} ended before {}",
                self.read2_name, self.read1_name
            ))
            .into()),
            (None, Some(_)) => Err(ReadPairError::TruncatedPair(format!(
                "{} ended before {}",
                self.read1_name, self.read2_name
            ))
            .into()),
        }
    }

    /// Read two consecutive records from the mate 1 stream.
    fn next_interleaved(&mut self) -> Result<Option<ReadPair>> {
        let read1 = match self.read1.next() {
            None => return Ok(None),
            Some(record) => record
                .with_context(|| format!("Failed reading FASTQ from {}", self.read1_name))?
                .to_owned_record(),
        };
        match self.read1.next() {
            None => Err(ReadPairError::TruncatedPair(format!(
                "{} ended after the first mate of {}",
                self.read1_name,
                String::from_utf8_lossy(read1.head())
            ))
            .into()),
            Some(read2) => {
                let read2 = read2
                    .with_context(|| format!("Failed reading FASTQ from {}", self.read1_name))?;
                Ok(Some(ReadPair::from_records(&read1, &read2)?))
            }
        }
    }
}

enum SourceState {
    Closed,
    Open(OpenFiles),
    Exhausted,
}

/// Yields [`ReadPair`]s from a list of mate 1 / mate 2 file pairs, or from interleaved files.
///
/// File pairs are taken from the end of the lists, so the last matching file pair is read
/// first.
pub struct PairedReadSource {
    read1: Vec<FastqInput>,
    read2: Vec<FastqInput>,
    interleaved: bool,
    verbose: bool,
    state: SourceState,
    pairs_read: u64,
}

impl PairedReadSource {
    /// Build a source over the given inputs.
    ///
    /// When not interleaved and no `read2` patterns are given, each mate 2 file is inferred from
    /// its mate 1 file with [`infer_read_file_name`]. Reading from [`InputFiles::Stdin`] is
    /// always interleaved.
    ///
    /// # Errors
    ///
    /// - if a pattern matches no files
    /// - if a mate 2 file can't be inferred
    /// - if there are different numbers of mate 1 and mate 2 files
    pub fn new(
        read1: InputFiles,
        read2: Option<Vec<String>>,
        interleaved: bool,
        verbose: bool,
    ) -> Result<Self> {
        let (read1, interleaved) = match read1 {
            InputFiles::Stdin => (vec![FastqInput::Stdin], true),
            InputFiles::Patterns(patterns) => (expand_patterns(&patterns, "read1")?, interleaved),
        };

        let read2 = if interleaved {
            vec![]
        } else if let Some(patterns) = read2 {
            expand_patterns(&patterns, "read2")?
        } else {
            let mut inferred = Vec::with_capacity(read1.len());
            for input in &read1 {
                if let FastqInput::Path(path) = input {
                    inferred.push(FastqInput::Path(infer_read_file_name(path, READ2_MARKER)?));
                }
            }
            inferred
        };

        ensure!(
            interleaved || read1.len() == read2.len(),
            "Found {} read1 file(s) but {} read2 file(s)",
            read1.len(),
            read2.len()
        );

        Ok(Self { read1, read2, interleaved, verbose, state: SourceState::Closed, pairs_read: 0 })
    }

    /// Close the current file pair, if any.
    pub fn close(&mut self) {
        if let SourceState::Open(_) = self.state {
            self.state = SourceState::Closed;
        }
    }

    /// Close the current file pair and open the next one.
    ///
    /// Returns `false` once there are no file pairs left.
    pub fn open(&mut self) -> Result<bool> {
        self.close();
        let read1 = match self.read1.pop() {
            Some(input) => input,
            None => {
                self.state = SourceState::Exhausted;
                return Ok(false);
            }
        };

        let files = if self.interleaved {
            if self.verbose {
                info!("Reading interleaved pairs from {}", read1);
            }
            OpenFiles {
                read1: read1.open()?,
                read2: None,
                read1_name: read1.to_string(),
                read2_name: read1.to_string(),
            }
        } else {
            let read2 = self.read2.pop().ok_or_else(|| anyhow!("No read2 file for {}", read1))?;
            if self.verbose {
                info!("Reading pairs from {} and {}", read1, read2);
            }
            OpenFiles {
                read1: read1.open()?,
                read2: Some(read2.open()?),
                read1_name: read1.to_string(),
                read2_name: read2.to_string(),
            }
        };
        self.state = SourceState::Open(files);
        Ok(true)
    }

    /// The next pair, moving on to the next file pair as needed, `None` at the end of all data.
    ///
    /// # Errors
    ///
    /// - if a file can't be opened or read
    /// - with a [`ReadPairError`] if the records of the two mates are inconsistent
    pub fn next_pair(&mut self) -> Result<Option<ReadPair>> {
        loop {
            match &mut self.state {
                SourceState::Open(files) => {
                    if let Some(pair) = files.next_pair()? {
                        self.pairs_read += 1;
                        return Ok(Some(pair));
                    }
                }
                SourceState::Exhausted => return Ok(None),
                SourceState::Closed => (),
            }
            if !self.open()? {
                return Ok(None);
            }
        }
    }

    /// Up to `n` pairs, fewer only at the end of all data.
    pub fn next_batch(&mut self, n: usize) -> Result<Vec<ReadPair>> {
        let mut batch = Vec::with_capacity(n);
        while batch.len() < n {
            match self.next_pair()? {
                Some(pair) => batch.push(pair),
                None => break,
            }
        }
        Ok(batch)
    }

    /// The number of pairs read so far.
    pub fn pairs_read(&self) -> u64 {
        self.pairs_read
    }

    /// The number of file pairs not yet opened.
    pub fn files_remaining(&self) -> usize {
        self.read1.len()
    }
}

impl Iterator for PairedReadSource {
    type Item = Result<ReadPair>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_pair().transpose()
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use matches::assert_matches;
    use rstest::rstest;
    use tempfile::tempdir;

    use crate::{
        read_pair::{ReadPairError, ReadStatus},
        utils::{
            test_commons::{
                generate_pairs, write_pairs_interleaved, write_pairs_to_files,
                write_reads_to_file, Tagged,
            },
            InferenceError,
        },
    };

    use super::{InputFiles, PairedReadSource};

    fn patterns(paths: &[&Path]) -> InputFiles {
        InputFiles::Patterns(paths.iter().map(|p| p.to_string_lossy().to_string()).collect())
    }

    fn ids(source: PairedReadSource) -> Vec<String> {
        source.map(|pair| String::from_utf8(pair.unwrap().id).unwrap()).collect()
    }

    #[test]
    fn test_reads_all_file_pairs_last_first() {
        let dir = tempdir().unwrap();
        write_pairs_to_files(
            &generate_pairs("a", ReadStatus::Match, 3),
            dir.path().join("a_R1_001.fastq"),
            dir.path().join("a_R2_001.fastq"),
        );
        write_pairs_to_files(
            &generate_pairs("b", ReadStatus::Match, 2),
            dir.path().join("b_R1_001.fastq"),
            dir.path().join("b_R2_001.fastq"),
        );

        let read1 = dir.path().join("*_R1_001.fastq");
        let source = PairedReadSource::new(patterns(&[&read1]), None, false, false).unwrap();
        assert_eq!(source.files_remaining(), 2);
        assert_eq!(
            ids(source),
            vec!["b:read:1", "b:read:2", "a:read:1", "a:read:2", "a:read:3"]
        );
    }

    #[test]
    fn test_wildcard_directories() {
        let dir = tempdir().unwrap();
        for (lane, n) in [("lane1", 2), ("lane2", 1)] {
            let lane_dir = dir.path().join("runs").join(lane);
            std::fs::create_dir_all(&lane_dir).unwrap();
            write_pairs_to_files(
                &generate_pairs(lane, ReadStatus::Match, n),
                lane_dir.join("s_R1.fq"),
                lane_dir.join("s_R2.fq"),
            );
        }

        let read1 = dir.path().join("runs").join("lane*").join("s_R1.fq");
        let source = PairedReadSource::new(patterns(&[&read1]), None, false, false).unwrap();
        assert_eq!(source.files_remaining(), 2);
        assert_eq!(ids(source), vec!["lane2:read:1", "lane1:read:1", "lane1:read:2"]);
    }

    #[test]
    fn test_pairs_read_leaves_the_source_usable() {
        let dir = tempdir().unwrap();
        let read1 = dir.path().join("s_R1.fq");
        let pairs = generate_pairs("x", ReadStatus::Match, 4);
        write_pairs_to_files(&pairs, &read1, dir.path().join("s_R2.fq"));

        let mut source = PairedReadSource::new(patterns(&[&read1]), None, false, false).unwrap();
        assert_eq!(source.pairs_read(), 0);
        assert!(source.next_pair().unwrap().is_some());
        assert_eq!(source.pairs_read(), 1);
        assert_eq!(source.files_remaining(), 0);
        assert_eq!(source.next_batch(10).unwrap().len(), 3);
        assert_eq!(source.pairs_read(), 4);
    }

    #[test]
    fn test_explicit_read2_files() {
        let dir = tempdir().unwrap();
        let pairs = generate_pairs("x", ReadStatus::Unknown, 4);
        let read1 = dir.path().join("first.fq");
        let read2 = dir.path().join("second.fq");
        write_pairs_to_files(&pairs, &read1, &read2);

        let mut source = PairedReadSource::new(
            patterns(&[&read1]),
            Some(vec![read2.to_string_lossy().to_string()]),
            false,
            true,
        )
        .unwrap();
        let batch = source.next_batch(3).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(source.pairs_read(), 3);
        assert_eq!(source.files_remaining(), 0);
        let rest = source.next_batch(3).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].status, ReadStatus::Unknown);
        assert!(source.next_pair().unwrap().is_none());
        assert!(source.next_pair().unwrap().is_none());
        assert_eq!(source.pairs_read(), 4);
    }

    #[test]
    fn test_mate_id_mismatch_fails_on_that_pull() {
        let dir = tempdir().unwrap();
        let mut pairs = generate_pairs("x", ReadStatus::Match, 4);
        pairs[2].1 = Tagged::default().with("x:read:99", "MATCH").record(2);
        let read1 = dir.path().join("s_R1.fq");
        write_pairs_to_files(&pairs, &read1, dir.path().join("s_R2.fq"));

        let mut source = PairedReadSource::new(patterns(&[&read1]), None, false, false).unwrap();
        assert!(source.next_pair().unwrap().is_some());
        assert!(source.next_pair().unwrap().is_some());
        let err = source.next_pair().unwrap_err();
        assert_matches!(
            err.downcast_ref::<ReadPairError>(),
            Some(ReadPairError::MateIdMismatch { .. })
        );
    }

    #[rstest]
    #[case(3, 2)]
    #[case(2, 3)]
    fn test_truncated_mate_file(#[case] num_read1: usize, #[case] num_read2: usize) {
        let dir = tempdir().unwrap();
        let pairs = generate_pairs("x", ReadStatus::Match, 3);
        let read1 = dir.path().join("s_R1.fq");
        write_reads_to_file(pairs.iter().take(num_read1).map(|(r1, _)| r1), &read1);
        write_reads_to_file(pairs.iter().take(num_read2).map(|(_, r2)| r2), dir.path().join("s_R2.fq"));

        let mut source = PairedReadSource::new(patterns(&[&read1]), None, false, false).unwrap();
        assert_eq!(source.next_batch(2).unwrap().len(), 2);
        let err = source.next_pair().unwrap_err();
        assert_matches!(err.downcast_ref::<ReadPairError>(), Some(ReadPairError::TruncatedPair(_)));
    }

    #[test]
    fn test_interleaved_input() {
        let dir = tempdir().unwrap();
        let pairs = generate_pairs("x", ReadStatus::Ambiguous, 3);
        let file = dir.path().join("interleaved.fastq");
        write_pairs_interleaved(&pairs, &file);

        // read2 patterns are ignored for interleaved input
        let source = PairedReadSource::new(
            patterns(&[&file]),
            Some(vec!["does-not-exist.fq".to_string()]),
            true,
            false,
        )
        .unwrap();
        let read = source.collect::<anyhow::Result<Vec<_>>>().unwrap();
        assert_eq!(read.len(), 3);
        assert!(read.iter().all(|p| p.status == ReadStatus::Ambiguous));
        assert_eq!(read[0].read1_seq, Tagged::default().read1_seq.as_bytes());
        assert_eq!(read[0].read2_seq, Tagged::default().read2_seq.as_bytes());
    }

    #[test]
    fn test_interleaved_odd_number_of_records() {
        let dir = tempdir().unwrap();
        let pairs = generate_pairs("x", ReadStatus::Match, 2);
        let file = dir.path().join("interleaved.fastq");
        let records = vec![&pairs[0].0, &pairs[0].1, &pairs[1].0];
        write_reads_to_file(records.into_iter(), &file);

        let mut source = PairedReadSource::new(patterns(&[&file]), None, true, false).unwrap();
        assert!(source.next_pair().unwrap().is_some());
        let err = source.next_pair().unwrap_err();
        assert_matches!(err.downcast_ref::<ReadPairError>(), Some(ReadPairError::TruncatedPair(_)));
    }

    #[test]
    fn test_gzip_input() {
        let dir = tempdir().unwrap();
        let pairs = generate_pairs("gz", ReadStatus::Mismatch1, 5);
        let read1 = dir.path().join("s_R1_001.fastq.gz");
        write_pairs_to_files(&pairs, &read1, dir.path().join("s_R2_001.fastq.gz"));

        let source = PairedReadSource::new(patterns(&[&read1]), None, false, false).unwrap();
        assert_eq!(ids(source), vec!["gz:read:1", "gz:read:2", "gz:read:3", "gz:read:4", "gz:read:5"]);
    }

    #[test]
    fn test_read1_not_found() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("*_R1.fq");
        let result = PairedReadSource::new(patterns(&[&missing]), None, false, false);
        assert!(result.err().unwrap().to_string().contains("read1 file(s) not found"));
    }

    #[test]
    fn test_read2_cannot_be_inferred() {
        let dir = tempdir().unwrap();
        let read1 = dir.path().join("s_R1.fq");
        write_reads_to_file(generate_pairs("x", ReadStatus::Match, 1).iter().map(|(r1, _)| r1), &read1);
        let err = PairedReadSource::new(patterns(&[&read1]), None, false, false).err().unwrap();
        assert_matches!(
            err.downcast_ref::<InferenceError>(),
            Some(InferenceError::NotUnique { found: 0, .. })
        );
    }

    #[test]
    fn test_unequal_number_of_files() {
        let dir = tempdir().unwrap();
        let pairs = generate_pairs("x", ReadStatus::Match, 1);
        write_pairs_to_files(&pairs, dir.path().join("a_R1.fq"), dir.path().join("a_R2.fq"));
        write_pairs_to_files(&pairs, dir.path().join("b_R1.fq"), dir.path().join("b_R2.fq"));

        let result = PairedReadSource::new(
            patterns(&[&dir.path().join("*_R1.fq")]),
            Some(vec![dir.path().join("a_R2.fq").to_string_lossy().to_string()]),
            false,
            false,
        );
        assert!(result.err().unwrap().to_string().contains("2 read1 file(s) but 1 read2 file(s)"));
    }

    #[test]
    fn test_empty_files() {
        let dir = tempdir().unwrap();
        let read1 = dir.path().join("s_R1.fq");
        write_pairs_to_files(&[], &read1, dir.path().join("s_R2.fq"));
        let mut source = PairedReadSource::new(patterns(&[&read1]), None, false, false).unwrap();
        assert!(source.next_pair().unwrap().is_none());
        assert_eq!(source.pairs_read(), 0);
    }
}
