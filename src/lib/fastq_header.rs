#![forbid(unsafe_code)]
#![allow(clippy::must_use_candidate)]
//! Convert a slice of bytes into a [`TaggedHeader`].
//!
//! The [`TaggedHeader`] internally holds all data as [`Cow`] types
//! which allow it to be very lightweight.
//!
//! **Note**: The number of fields and their structure is validated when parsing the bytes,
//! as is the length of each barcode/trimmed sequence against its quality string. The
//! contents of the fields are not validated.
//!
//! # Grammar
//!
//! The FASTQ headers written by the barcode preprocessing step are expected to conform to the
//! following grammar (the leading `@` is not part of the header bytes):
//!
//! ```text
//! <header>         ::= “<read-name> <comment>” | “<read-name> <comment> <other>”
//! <read-name>      ::= <gem-barcode>:<read-id>
//! <gem-barcode>    ::= [^:]*
//! <read-id>        ::= .*
//! <comment>        ::= <info>:<tags>
//! <info>           ::= <read-number>:<is-filtered>:<control-number>:<library-barcode>
//! <read-number>    ::= <digit>
//! <is-filtered>    ::= “Y” | “N”
//! <control-number> ::= “0” | <non-zero-digit>
//! <library-barcode>::= [^:]*
//! <tags>           ::= <status>_<sgem-barcode>_<sgem-quality>_<trim-seq>_<trim-quality>
//! <status>         ::= “MATCH” | “MISMATCH1” | “AMBIGUOUS” | “UNKNOWN”
//! <other>          ::= .*
//! ```
//!
//! # Usage
//!
//! ```rust
//! use bcfilter_lib::fastq_header::TaggedHeader;
//! let header = "AACCGGTTAACCGGTT:H00233:4:AAAFGW3HV:1:1101:59586:1000 1:N:0::MATCH_AACCGGTTAACCGGTT_FFFFFFFFFFFFFFFF_ACGTAC_FFFFFF";
//! let header = TaggedHeader::try_from(header.as_bytes()).unwrap();
//! assert_eq!(header.gem_barcode(), b"AACCGGTTAACCGGTT");
//! assert_eq!(header.status(), b"MATCH");
//! ```

use std::{borrow::Cow, error::Error, fmt::Display};

use bstr::ByteSlice;

/// A Set of errors that are returned when parsing a tagged FASTQ headers bytes
#[derive(Debug)]
pub enum TaggedHeaderError {
    // Errors from parsing ReadName
    MissingGemBarcode,
    MissingReadId,
    MissingComment,
    // Errors from parsing Info
    MissingReadNumber,
    MissingIsFiltered,
    MissingControlNumber,
    MissingLibraryBarcode,
    // Errors from parsing Tags
    MissingTags,
    MissingStatus,
    MissingSgemBarcode,
    MissingSgemQuality,
    MissingTrimSequence,
    MissingTrimQuality,
    ExtraTags,
    UnequalSgemLengths,
    UnequalTrimLengths,
}

impl Error for TaggedHeaderError {}
impl Display for TaggedHeaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A struct representing a parsed tagged FASTQ header.
#[derive(Debug)]
pub struct TaggedHeader<'a> {
    /// The required [`ReadName`] information.
    pub read_name: ReadName<'a>,
    /// The required [`Comment`] fields.
    pub comment: Comment<'a>,
}

impl<'a> TaggedHeader<'a> {
    /// The gem barcode prefixed to the read name.
    pub fn gem_barcode(&self) -> &[u8] {
        self.read_name.gem_barcode.as_ref()
    }

    /// The read name with the gem barcode prefix removed.
    pub fn read_id(&self) -> &[u8] {
        self.read_name.read_id.as_ref()
    }

    /// The raw status tag.
    pub fn status(&self) -> &[u8] {
        self.comment.tags.status.as_ref()
    }

    /// Copy the [`TaggedHeader`] to a [`Vec<u8>`].
    ///
    /// The optional `other` trailing field is not copied.
    pub fn copy_to_vec(&self, dest: &mut Vec<u8>) {
        self.read_name.copy_to_vec(dest);
        dest.push(b' ');
        self.comment.copy_to_vec(dest);
    }
}

/// The [`ReadName`] is the first whitespace delimited token of the header: the gem barcode
/// prepended to the original read identifier.
#[derive(Debug)]
pub struct ReadName<'a>
where
    [u8]: ToOwned<Owned = Vec<u8>>,
{
    /// The raw gem barcode.
    pub gem_barcode: Cow<'a, [u8]>,
    /// The original read identifier, which may itself contain `:`.
    pub read_id: Cow<'a, [u8]>,
}

impl<'a> ReadName<'a> {
    /// Copy the [`Self`] to a vec of bytes delimited by the `:` character.
    pub fn copy_to_vec(&self, dest: &mut Vec<u8>) {
        dest.extend(self.gem_barcode.as_ref());
        dest.push(b':');
        dest.extend(self.read_id.as_ref());
    }
}

/// A [`Comment`] holds the Illumina style [`Info`] and the preprocessing [`Tags`].
#[derive(Debug)]
pub struct Comment<'a>
where
    [u8]: ToOwned<Owned = Vec<u8>>,
{
    pub info: Info<'a>,
    pub tags: Tags<'a>,
    /// All bytes after the second space character (if present). These bytes are left unparsed.
    pub other: Option<Cow<'a, [u8]>>,
}

impl<'a> Comment<'a> {
    /// Copy a [`Comment`] into a vec of bytes delimited by the `:` character.
    pub fn copy_to_vec(&self, dest: &mut Vec<u8>) {
        self.info.copy_to_vec(dest);
        dest.push(b':');
        self.tags.copy_to_vec(dest);
    }
}

/// The [`Info`] field contains read and library information.
#[derive(Debug)]
pub struct Info<'a>
where
    [u8]: ToOwned<Owned = Vec<u8>>,
{
    /// What number read this is.
    pub read_number: Cow<'a, [u8]>,
    /// Indicator of whether the read is filtered.
    pub is_filtered: Cow<'a, [u8]>,
    /// Indicator of whether or not this read is a control
    pub control_number: Cow<'a, [u8]>,
    /// The library (sample index) barcode, possibly empty.
    pub library_barcode: Cow<'a, [u8]>,
}

impl<'a> Info<'a> {
    /// Create a new [`Info`] object for an unfiltered, non-control read.
    pub fn new(read_number: u8, library_barcode: &'a [u8]) -> Self {
        Self {
            read_number: Cow::Owned(vec![read_number]),
            is_filtered: Cow::Borrowed(&b"N"[..]),
            control_number: Cow::Borrowed(&b"0"[..]),
            library_barcode: Cow::Borrowed(library_barcode),
        }
    }

    /// Copy an [`Info`] into a vec of bytes delimited by the `:` character.
    pub fn copy_to_vec(&self, dest: &mut Vec<u8>) {
        dest.extend(self.read_number.as_ref());
        dest.push(b':');
        dest.extend(self.is_filtered.as_ref());
        dest.push(b':');
        dest.extend(self.control_number.as_ref());
        dest.push(b':');
        dest.extend(self.library_barcode.as_ref());
    }
}

/// The [`Tags`] added by the barcode preprocessing step.
#[derive(Debug)]
pub struct Tags<'a>
where
    [u8]: ToOwned<Owned = Vec<u8>>,
{
    /// How well the gem barcode matched the reference whitelist.
    pub status: Cow<'a, [u8]>,
    /// The gem barcode as re-called by preprocessing.
    pub sgem_barcode: Cow<'a, [u8]>,
    /// The quality string of the re-called gem barcode.
    pub sgem_quality: Cow<'a, [u8]>,
    /// The bases trimmed from the read.
    pub trim_sequence: Cow<'a, [u8]>,
    /// The qualities of the trimmed bases.
    pub trim_quality: Cow<'a, [u8]>,
}

impl<'a> Tags<'a> {
    /// Copy the [`Tags`] into a vec of bytes delimited by the `_` character.
    pub fn copy_to_vec(&self, dest: &mut Vec<u8>) {
        dest.extend(self.status.as_ref());
        dest.push(b'_');
        dest.extend(self.sgem_barcode.as_ref());
        dest.push(b'_');
        dest.extend(self.sgem_quality.as_ref());
        dest.push(b'_');
        dest.extend(self.trim_sequence.as_ref());
        dest.push(b'_');
        dest.extend(self.trim_quality.as_ref());
    }
}

impl<'a> TryFrom<&'a [u8]> for Tags<'a> {
    type Error = TaggedHeaderError;

    fn try_from(bytes: &'a [u8]) -> Result<Self, Self::Error> {
        let mut parts = bytes.split(|c| *c == b'_');
        let status = Cow::from(parts.next().ok_or(TaggedHeaderError::MissingStatus)?);
        let sgem_barcode = Cow::from(parts.next().ok_or(TaggedHeaderError::MissingSgemBarcode)?);
        let sgem_quality = Cow::from(parts.next().ok_or(TaggedHeaderError::MissingSgemQuality)?);
        let trim_sequence = Cow::from(parts.next().ok_or(TaggedHeaderError::MissingTrimSequence)?);
        let trim_quality = Cow::from(parts.next().ok_or(TaggedHeaderError::MissingTrimQuality)?);
        if parts.next().is_some() {
            return Err(TaggedHeaderError::ExtraTags);
        }
        if sgem_barcode.len() != sgem_quality.len() {
            return Err(TaggedHeaderError::UnequalSgemLengths);
        }
        if trim_sequence.len() != trim_quality.len() {
            return Err(TaggedHeaderError::UnequalTrimLengths);
        }
        Ok(Self { status, sgem_barcode, sgem_quality, trim_sequence, trim_quality })
    }
}

impl<'a> TryFrom<&'a [u8]> for TaggedHeader<'a> {
    type Error = TaggedHeaderError;

    /// Convert a slice of bytes into a [`TaggedHeader`].
    fn try_from(bytes: &'a [u8]) -> Result<Self, Self::Error> {
        let bytes = bytes.trim_end();
        let mut parts = bytes.splitn(3, |c| *c == b' ');

        // `splitn` always yields at least one item
        let read_name_part = parts.next().unwrap_or_default();
        let read_name = {
            let mut parts = read_name_part.splitn(2, |c| *c == b':');
            let gem_barcode = Cow::from(parts.next().ok_or(TaggedHeaderError::MissingGemBarcode)?);
            let read_id = Cow::from(parts.next().ok_or(TaggedHeaderError::MissingReadId)?);
            ReadName { gem_barcode, read_id }
        };

        let comment_part = parts.next().ok_or(TaggedHeaderError::MissingComment)?;
        let mut comment_parts = comment_part.splitn(5, |c| *c == b':');
        let read_number =
            Cow::from(comment_parts.next().ok_or(TaggedHeaderError::MissingReadNumber)?);
        let is_filtered =
            Cow::from(comment_parts.next().ok_or(TaggedHeaderError::MissingIsFiltered)?);
        let control_number =
            Cow::from(comment_parts.next().ok_or(TaggedHeaderError::MissingControlNumber)?);
        let library_barcode =
            Cow::from(comment_parts.next().ok_or(TaggedHeaderError::MissingLibraryBarcode)?);
        let info = Info { read_number, is_filtered, control_number, library_barcode };
        let tags = Tags::try_from(comment_parts.next().ok_or(TaggedHeaderError::MissingTags)?)?;

        let other = parts.next().map(Cow::from);
        Ok(Self { read_name, comment: Comment { info, tags, other } })
    }
}

#[cfg(test)]
mod tests {
    use matches::assert_matches;
    use rstest::rstest;

    use super::{TaggedHeader, TaggedHeaderError};

    const GOOD_HEADER: &str = "AACCGGTTAACCGGTT:H00233:4:AAAFGW3HV:1:1101:59586:1000 1:N:0:GCATAAGC:MATCH_AACCGGTTAACCGGTT_FFFFFFFFFFFFFFFF_ACGTAC_FFF:FF";

    #[test]
    fn test_all_fields() {
        let gem_barcode = "AACCGGTTAACCGGTA";
        let read_id = "H00233:4:AAAFGW3HV:1:1101:59586:1000";
        let read_number = "2";
        let is_filtered = "N";
        let control_number = "0";
        let library_barcode = "GCATAAGC";
        let status = "MISMATCH1";
        let sgem_barcode = "AACCGGTTAACCGGTT";
        let sgem_quality = "FFFFFFFFFFFFFFF#";
        let trim_sequence = "ACGTAC";
        let trim_quality = "FFFF:F";
        let other = "This is a long comment section for: other.";
        let header = format!(
            "{}:{} {}:{}:{}:{}:{}_{}_{}_{}_{} {}",
            gem_barcode,
            read_id,
            read_number,
            is_filtered,
            control_number,
            library_barcode,
            status,
            sgem_barcode,
            sgem_quality,
            trim_sequence,
            trim_quality,
            other
        );

        let header: TaggedHeader = header.as_bytes().try_into().unwrap();
        assert_eq!(gem_barcode.as_bytes(), header.gem_barcode());
        assert_eq!(read_id.as_bytes(), header.read_id());
        assert_eq!(read_number.as_bytes(), header.comment.info.read_number.as_ref());
        assert_eq!(is_filtered.as_bytes(), header.comment.info.is_filtered.as_ref());
        assert_eq!(control_number.as_bytes(), header.comment.info.control_number.as_ref());
        assert_eq!(library_barcode.as_bytes(), header.comment.info.library_barcode.as_ref());
        assert_eq!(status.as_bytes(), header.status());
        assert_eq!(sgem_barcode.as_bytes(), header.comment.tags.sgem_barcode.as_ref());
        assert_eq!(sgem_quality.as_bytes(), header.comment.tags.sgem_quality.as_ref());
        assert_eq!(trim_sequence.as_bytes(), header.comment.tags.trim_sequence.as_ref());
        assert_eq!(trim_quality.as_bytes(), header.comment.tags.trim_quality.as_ref());
        assert_eq!(other.as_bytes(), header.comment.other.as_ref().unwrap().as_ref());
    }

    #[test]
    fn test_good_header() {
        assert!(TaggedHeader::try_from(GOOD_HEADER.as_bytes()).is_ok());
    }

    #[test]
    fn test_empty_library_barcode_and_trim() {
        let header = "AACC:read1 1:N:0::UNKNOWN_AACC_FFFF__";
        let header = TaggedHeader::try_from(header.as_bytes()).unwrap();
        assert!(header.comment.info.library_barcode.is_empty());
        assert!(header.comment.tags.trim_sequence.is_empty());
        assert!(header.comment.tags.trim_quality.is_empty());
    }

    #[test]
    fn test_read_id_keeps_colons() {
        let header = TaggedHeader::try_from(GOOD_HEADER.as_bytes()).unwrap();
        assert_eq!(header.read_id(), b"H00233:4:AAAFGW3HV:1:1101:59586:1000");
    }

    #[rstest]
    #[case("AACCGGTT", TaggedHeaderError::MissingReadId)]
    #[case("AACC:read1", TaggedHeaderError::MissingComment)]
    #[case("AACC:read1 1:N:0", TaggedHeaderError::MissingLibraryBarcode)]
    #[case("AACC:read1 1:N:0:GCAT", TaggedHeaderError::MissingTags)]
    #[case("AACC:read1 1:N:0:GCAT:MATCH_AACC_FFFF_AC", TaggedHeaderError::MissingTrimQuality)]
    #[case("AACC:read1 1:N:0:GCAT:MATCH_AACC_FFFF_AC_FF_X", TaggedHeaderError::ExtraTags)]
    #[case("AACC:read1 1:N:0:GCAT:MATCH_AACC_FFF_AC_FF", TaggedHeaderError::UnequalSgemLengths)]
    #[case("AACC:read1 1:N:0:GCAT:MATCH_AACC_FFFF_AC_F", TaggedHeaderError::UnequalTrimLengths)]
    fn test_bad_headers(#[case] header: &str, #[case] expected: TaggedHeaderError) {
        let result = TaggedHeader::try_from(header.as_bytes());
        assert!(result.is_err());
        assert_eq!(format!("{}", result.unwrap_err()), format!("{}", expected));
    }

    #[test]
    fn test_plain_illumina_header_is_rejected() {
        let header = "H00233:4:AAAFGW3HV:1:1101:59586:1000 1:N:0:GCATAAGCTT+GGCGACGGAA";
        assert_matches!(
            TaggedHeader::try_from(header.as_bytes()),
            Err(TaggedHeaderError::MissingTags)
        );
    }

    #[test]
    fn test_round_trip_serialize() {
        let new_header = TaggedHeader::try_from(GOOD_HEADER.as_bytes()).unwrap();
        let mut dest = vec![];
        new_header.copy_to_vec(&mut dest);
        assert_eq!(GOOD_HEADER.as_bytes(), dest.as_slice());
    }

    #[test]
    fn test_serialize_drops_other() {
        let header = format!("{} trailing words", GOOD_HEADER);
        let new_header = TaggedHeader::try_from(header.as_bytes()).unwrap();
        let mut dest = vec![];
        new_header.copy_to_vec(&mut dest);
        assert_eq!(GOOD_HEADER.as_bytes(), dest.as_slice());
    }
}
