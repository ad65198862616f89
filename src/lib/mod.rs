//! A library of functionality for filtering barcode-tagged paired FASTQ files.
//!
//! # Overview
//!
//! The flow of data is as follows:
//!
//! - The [`pair_reader::PairedReadSource`] reads mate 1 and mate 2 records from each pair of input
//!   files in turn (or from interleaved input), checks the mates belong together and decodes the
//!   tags in the header ([`fastq_header::TaggedHeader`]) into a [`read_pair::ReadPair`].
//! - The [`filter::ReadFilter`] keeps the pairs whose status was selected and, when given a
//!   [`whitelist::BarcodeWhitelist`], whose gem barcode is in the whitelist.
//! - The [`pair_writer::PairedReadSink`] writes the kept pairs back out as tagged FASTQ, to a
//!   file per mate, a single interleaved file, or standard output.
//! - [`filter::FilterMetrics`] summarize the run.
#![deny(unsafe_code)]
#![allow(
    clippy::must_use_candidate,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]
pub mod fastq_header;
pub mod filter;
pub mod opts;
pub mod pair_reader;
pub mod pair_writer;
pub mod read_pair;
pub mod run;
pub mod utils;
pub mod whitelist;
