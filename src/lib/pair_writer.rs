//! Writing of [`ReadPair`]s as paired or interleaved FASTQ.
#![forbid(unsafe_code)]

use std::{
    convert::Infallible,
    ffi::OsString,
    fs::{self, File},
    io::{self, BufWriter, Stdout, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use gzp::{deflate::Gzip, Compression, ZBuilder, ZWriter, BUFSIZE};
use log::{info, warn};

use crate::{read_pair::ReadPair, utils::make_sure_parent_exists};

/// The name given on the command line to write to standard output.
pub static STDOUT_NAME: &str = "stdout";

/// The gzip compression level of compressed output.
pub const COMPRESSION_LEVEL: u32 = 6;

/// Anything that accepts filtered [`ReadPair`]s.
pub trait WritePair {
    /// Write a single pair.
    fn write_pair(&mut self, pair: &ReadPair) -> Result<()>;
}

#[cfg(test)]
impl WritePair for Vec<ReadPair> {
    fn write_pair(&mut self, pair: &ReadPair) -> Result<()> {
        self.push(pair.clone());
        Ok(())
    }
}

/// Where the output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Interleaved, uncompressed records on standard output.
    Stdout,
    /// A path prefix, `_R1_001.fastq` (and `_R2_001.fastq`) are appended to it.
    Prefix(PathBuf),
}

impl FromStr for OutputTarget {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == STDOUT_NAME {
            Ok(OutputTarget::Stdout)
        } else {
            Ok(OutputTarget::Prefix(PathBuf::from(s)))
        }
    }
}

/// A single output stream.
enum OutputStream {
    Plain(BufWriter<File>),
    Stdout(BufWriter<Stdout>),
    Compressed(Box<dyn ZWriter>),
}

impl OutputStream {
    /// Flush the stream, finishing the gzip stream if compressed.
    fn finish(self) -> Result<()> {
        match self {
            OutputStream::Plain(mut writer) => writer.flush()?,
            OutputStream::Stdout(mut writer) => writer.flush()?,
            OutputStream::Compressed(mut writer) => writer.finish()?,
        }
        Ok(())
    }
}

impl Write for OutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputStream::Plain(writer) => writer.write(buf),
            OutputStream::Stdout(writer) => writer.write(buf),
            OutputStream::Compressed(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputStream::Plain(writer) => writer.flush(),
            OutputStream::Stdout(writer) => writer.flush(),
            OutputStream::Compressed(writer) => writer.flush(),
        }
    }
}

struct OutputStreams {
    read1: OutputStream,
    read2: Option<OutputStream>,
}

/// Writes [`ReadPair`]s to one interleaved stream or to a stream per mate.
pub struct PairedReadSink {
    target: OutputTarget,
    uncompressed: bool,
    interleaved: bool,
    compressor_threads: usize,
    streams: Option<OutputStreams>,
    head: Vec<u8>,
    count: u64,
}

impl PairedReadSink {
    /// Create a sink, nothing is opened until [`PairedReadSink::open`] or the first write.
    ///
    /// Writing to [`OutputTarget::Stdout`] is always interleaved and uncompressed.
    pub fn new(
        target: OutputTarget,
        uncompressed: bool,
        interleaved: bool,
        compressor_threads: usize,
    ) -> Self {
        let to_stdout = target == OutputTarget::Stdout;
        Self {
            target,
            uncompressed: uncompressed || to_stdout,
            interleaved: interleaved || to_stdout,
            compressor_threads,
            streams: None,
            head: Vec::with_capacity(256),
            count: 0,
        }
    }

    /// The paths of the output files, empty when writing to standard output.
    pub fn output_paths(&self) -> Vec<PathBuf> {
        let prefix = match &self.target {
            OutputTarget::Stdout => return vec![],
            OutputTarget::Prefix(prefix) => prefix,
        };
        let suffix = if self.uncompressed { "" } else { ".gz" };
        let mates: &[u8] = if self.interleaved { &[1] } else { &[1, 2] };
        mates
            .iter()
            .map(|mate| {
                let mut name = OsString::from(prefix.as_os_str());
                name.push(format!("_R{}_001.fastq{}", mate, suffix));
                PathBuf::from(name)
            })
            .collect()
    }

    fn create(&self, path: &Path) -> Result<OutputStream> {
        if path.exists() {
            warn!("Removing existing output file {}", path.to_string_lossy());
            fs::remove_file(path)
                .with_context(|| format!("Unable to remove file: {}", path.to_string_lossy()))?;
        }
        let writer = File::create(path)
            .with_context(|| format!("Unable to create file: {}", path.to_string_lossy()))
            .map(|f| BufWriter::with_capacity(BUFSIZE, f))?;
        if self.uncompressed {
            Ok(OutputStream::Plain(writer))
        } else {
            Ok(OutputStream::Compressed(
                ZBuilder::<Gzip, _>::new()
                    .num_threads(self.compressor_threads.max(1))
                    .compression_level(Compression::new(COMPRESSION_LEVEL))
                    .from_writer(writer),
            ))
        }
    }

    /// Open the output stream(s), does nothing if they are already open.
    ///
    /// Missing parent directories are created and existing files of the same name are replaced.
    pub fn open(&mut self) -> Result<()> {
        if self.streams.is_some() {
            return Ok(());
        }
        let streams = match &self.target {
            OutputTarget::Stdout => OutputStreams {
                read1: OutputStream::Stdout(BufWriter::with_capacity(BUFSIZE, io::stdout())),
                read2: None,
            },
            OutputTarget::Prefix(prefix) => {
                make_sure_parent_exists(prefix)?;
                let mut streams = self
                    .output_paths()
                    .iter()
                    .map(|p| self.create(p))
                    .collect::<Result<Vec<_>>>()?;
                let read2 = if streams.len() > 1 { streams.pop() } else { None };
                let read1 = streams.pop().context("No output stream opened")?;
                OutputStreams { read1, read2 }
            }
        };
        self.streams = Some(streams);
        Ok(())
    }

    /// Flush and close the output stream(s), returning the number of pairs written.
    pub fn close(&mut self) -> Result<u64> {
        if let Some(streams) = self.streams.take() {
            streams.read1.finish().context("Failed to close output")?;
            if let Some(read2) = streams.read2 {
                read2.finish().context("Failed to close output")?;
            }
        }
        info!("Wrote {} reads to output", self.count);
        Ok(self.count)
    }

    /// The number of pairs written so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Whether both mates go to a single stream.
    pub fn is_interleaved(&self) -> bool {
        self.interleaved
    }

    /// Whether the output is gzip compressed.
    pub fn is_compressed(&self) -> bool {
        !self.uncompressed
    }
}

impl WritePair for PairedReadSink {
    /// Write mate 1 then mate 2, to the same stream when interleaved.
    fn write_pair(&mut self, pair: &ReadPair) -> Result<()> {
        self.open()?;
        if let Some(streams) = self.streams.as_mut() {
            pair.write_mate(1, &mut self.head, &mut streams.read1)
                .context("Failed writing read 1")?;
            let read2 = streams.read2.as_mut().unwrap_or(&mut streams.read1);
            pair.write_mate(2, &mut self.head, read2).context("Failed writing read 2")?;
            self.count += 1;
        }
        Ok(())
    }
}
