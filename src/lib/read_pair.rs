#![forbid(unsafe_code)]
//! The [`ReadPair`] is the unit that flows from the [`crate::pair_reader::PairedReadSource`]
//! through the [`crate::filter::ReadFilter`] to the [`crate::pair_writer::PairedReadSink`].

use std::{borrow::Cow, io::Write};

use bstr::{BString, ByteSlice};
use clap::{ArgEnum, PossibleValue};
use seq_io::fastq::Record;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::fastq_header::{Comment, Info, ReadName, TaggedHeader, TaggedHeaderError, Tags};

/// The library barcode used when the preprocessing step left it empty.
pub const DEFAULT_LIBRARY_BARCODE: &[u8] = b"1";

/// How well a read's gem barcode matched the reference whitelist during preprocessing.
#[derive(
    ArgEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[clap(rename_all = "UPPER")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ReadStatus {
    Match,
    Mismatch1,
    Ambiguous,
    Unknown,
}

impl ReadStatus {
    pub fn possible_values<'a>() -> impl Iterator<Item = PossibleValue<'a>> {
        ReadStatus::value_variants().iter().filter_map(ArgEnum::to_possible_value)
    }

    /// The status as it appears in a tagged FASTQ header.
    pub fn as_bytes(self) -> &'static [u8] {
        let name: &'static str = self.into();
        name.as_bytes()
    }
}

/// Errors raised while assembling a [`ReadPair`] from the records of each mate.
#[derive(Error, Debug)]
pub enum ReadPairError {
    #[error("Read {read_number} of {name} has {seq_len} bases but {qual_len} qualities")]
    UnequalLengths { name: BString, read_number: u8, seq_len: usize, qual_len: usize },

    #[error("Read names do not match between mates: {read1} != {read2}")]
    MateIdMismatch { read1: BString, read2: BString },

    #[error("Unable to parse header of {name}: {source}")]
    InvalidHeader { name: BString, source: TaggedHeaderError },

    #[error("Unknown status `{status}` for {name}")]
    UnknownStatus { name: BString, status: BString },

    #[error("{0}")]
    TruncatedPair(String),
}

/// A decoded pair of mates and the tags the preprocessing step added to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPair {
    /// The read identifier shared by both mates, without the gem barcode prefix.
    pub id: Vec<u8>,
    pub status: ReadStatus,
    /// The library barcode, `1` when the header carried none.
    pub library_bc: Vec<u8>,
    /// The raw gem barcode.
    pub gem_bc: Vec<u8>,
    /// The gem barcode as re-called during preprocessing.
    pub sgem_bc: Vec<u8>,
    pub sgem_qual: Vec<u8>,
    pub trim_seq: Vec<u8>,
    pub trim_qual: Vec<u8>,
    pub read1_seq: Vec<u8>,
    pub read1_qual: Vec<u8>,
    pub read2_seq: Vec<u8>,
    pub read2_qual: Vec<u8>,
}

/// The first whitespace delimited token of a FASTQ header.
fn read_name(head: &[u8]) -> &[u8] {
    head.fields().next().unwrap_or_default()
}

/// Ensures the sequence and quality of a record are the same length.
fn check_lengths<R: Record>(record: &R, read_number: u8) -> Result<(), ReadPairError> {
    if record.seq().len() == record.qual().len() {
        Ok(())
    } else {
        Err(ReadPairError::UnequalLengths {
            name: BString::from(read_name(record.head())),
            read_number,
            seq_len: record.seq().len(),
            qual_len: record.qual().len(),
        })
    }
}

impl ReadPair {
    /// Build a [`ReadPair`] from the records of each mate.
    ///
    /// The tags are taken from the mate 1 header.
    ///
    /// # Errors
    ///
    /// - [`ReadPairError::UnequalLengths`] if either mate's sequence and quality lengths differ
    /// - [`ReadPairError::MateIdMismatch`] if the read names differ between mates
    /// - [`ReadPairError::InvalidHeader`] if the mate 1 header is not a tagged header
    /// - [`ReadPairError::UnknownStatus`] if the status tag is not a [`ReadStatus`]
    pub fn from_records<R1: Record, R2: Record>(
        read1: &R1,
        read2: &R2,
    ) -> Result<Self, ReadPairError> {
        check_lengths(read1, 1)?;
        check_lengths(read2, 2)?;

        let name1 = read_name(read1.head());
        let name2 = read_name(read2.head());
        if name1 != name2 {
            return Err(ReadPairError::MateIdMismatch {
                read1: BString::from(name1),
                read2: BString::from(name2),
            });
        }

        let header = TaggedHeader::try_from(read1.head())
            .map_err(|source| ReadPairError::InvalidHeader { name: BString::from(name1), source })?;
        let status = header.status().to_str().ok().and_then(|s| s.parse::<ReadStatus>().ok());
        let status = status.ok_or_else(|| ReadPairError::UnknownStatus {
            name: BString::from(name1),
            status: BString::from(header.status()),
        })?;

        let library_bc = match header.comment.info.library_barcode.as_ref() {
            b"" => DEFAULT_LIBRARY_BARCODE.to_vec(),
            bc => bc.to_vec(),
        };
        let tags = &header.comment.tags;
        Ok(Self {
            id: header.read_id().to_vec(),
            status,
            library_bc,
            gem_bc: header.gem_barcode().to_vec(),
            sgem_bc: tags.sgem_barcode.to_vec(),
            sgem_qual: tags.sgem_quality.to_vec(),
            trim_seq: tags.trim_sequence.to_vec(),
            trim_qual: tags.trim_quality.to_vec(),
            read1_seq: read1.seq().to_vec(),
            read1_qual: read1.qual().to_vec(),
            read2_seq: read2.seq().to_vec(),
            read2_qual: read2.qual().to_vec(),
        })
    }

    /// Build the tagged header for the given mate (`1` or `2`).
    pub fn header(&self, read_number: u8) -> TaggedHeader<'_> {
        TaggedHeader {
            read_name: ReadName {
                gem_barcode: Cow::Borrowed(&self.gem_bc),
                read_id: Cow::Borrowed(&self.id),
            },
            comment: Comment {
                info: Info::new(b'0' + read_number, &self.library_bc),
                tags: Tags {
                    status: Cow::Borrowed(self.status.as_bytes()),
                    sgem_barcode: Cow::Borrowed(&self.sgem_bc),
                    sgem_quality: Cow::Borrowed(&self.sgem_qual),
                    trim_sequence: Cow::Borrowed(&self.trim_seq),
                    trim_quality: Cow::Borrowed(&self.trim_qual),
                },
                other: None,
            },
        }
    }

    /// Write one mate as a four line FASTQ record, reusing `head` as scratch space.
    pub fn write_mate<W: Write>(
        &self,
        read_number: u8,
        head: &mut Vec<u8>,
        writer: &mut W,
    ) -> std::io::Result<()> {
        head.clear();
        self.header(read_number).copy_to_vec(head);
        let (seq, qual) = if read_number == 1 {
            (&self.read1_seq, &self.read1_qual)
        } else {
            (&self.read2_seq, &self.read2_qual)
        };
        seq_io::fastq::write_to(writer, head, seq, qual)
    }
}
