//! Utility functions.
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use glob::{glob_with, MatchOptions};
use lazy_static::lazy_static;
use path_absolutize::Absolutize;
use thiserror::Error;

lazy_static! {
    /// Return the number of cpus as a String
    pub static ref NUM_CPU: String = num_cpus::get().to_string();
}

pub mod built_info {
    use lazy_static::lazy_static;
    include!(concat!(env!("OUT_DIR"), "/built.rs"));

    /// Get a software version string including
    ///   - Git commit hash
    ///   - Git dirty info (whether the repo had uncommitted changes)
    ///   - Cargo package version if no git info found
    fn get_software_version() -> String {
        let prefix = if let Some(s) = GIT_COMMIT_HASH {
            format!("{}-{}", PKG_VERSION, s[0..8].to_owned())
        } else {
            // This shouldn't happen
            PKG_VERSION.to_string()
        };
        let suffix = match GIT_DIRTY {
            Some(true) => "-dirty",
            _ => "",
        };
        format!("{}{}", prefix, suffix)
    }

    lazy_static! {
        /// Version of the software with git hash
        pub static ref VERSION: String = get_software_version();
    }
}

/// The file suffix that marks an input as gzip compressed.
pub static GZIP_SUFFIX: &str = ".gz";

/// The mate 1 marker searched for when inferring mate 2 file names.
pub const READ1_MARKER: char = '1';

/// Returns true if the path names a gzip compressed file.
pub fn is_gzip_path<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().to_string_lossy().ends_with(GZIP_SUFFIX)
}

/// Returns true if any error in the chain is a broken pipe, i.e. a downstream consumer closed
/// its end of our output early.
pub fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause.downcast_ref::<io::Error>().map_or(false, |e| e.kind() == io::ErrorKind::BrokenPipe)
    })
}

/// Create the parent directory of `path` (and its parents) if it does not already exist.
pub fn make_sure_parent_exists<P: AsRef<Path>>(path: P) -> Result<()> {
    match path.as_ref().parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create directory: {}", parent.to_string_lossy())),
        _ => Ok(()),
    }
}

/// Expand a shell style path pattern into the matching paths, sorted by name.
///
/// Wildcards may appear in any path component. Hidden files and directories only match
/// patterns that spell out their leading `.`. A pattern without wildcards yields the path
/// itself when it exists, otherwise nothing.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let options = MatchOptions { require_literal_leading_dot: true, ..MatchOptions::new() };
    let mut paths = glob_with(pattern, options)
        .with_context(|| format!("Invalid file pattern: {}", pattern))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Unable to expand file pattern: {}", pattern))?;
    paths.sort();
    Ok(paths)
}

/// The error raised when a mate file name can't be inferred from the mate 1 file name.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Error inferring read {marker} from read 1 file {}, found {found} suitable matches.", read1.to_string_lossy())]
    NotUnique { read1: PathBuf, marker: char, found: usize },

    #[error("Unable to list the directory of {}", read1.to_string_lossy())]
    Io { read1: PathBuf, source: io::Error },
}

/// Returns true if `candidate` is `read1` with exactly one [`READ1_MARKER`] replaced by `marker`.
fn is_mate_name(read1: &str, candidate: &str, marker: char) -> bool {
    if read1.len() != candidate.len() || read1 == candidate {
        return false;
    }
    let mut differences = read1.chars().zip(candidate.chars()).filter(|(a, b)| a != b);
    match (differences.next(), differences.next()) {
        (Some((a, b)), None) => a == READ1_MARKER && b == marker,
        _ => false,
    }
}

/// Find the mate file of `read1` (e.g. `R2` for `R1`) among its sibling files.
///
/// A sibling qualifies when it shares the extension and name length of `read1` and its name
/// differs from `read1`'s at exactly one position, where `read1` has `1` and the sibling has
/// `marker`. Exactly one sibling must qualify.
pub fn infer_read_file_name<P: AsRef<Path>>(
    read1: P,
    marker: char,
) -> Result<PathBuf, InferenceError> {
    let read1 = read1.as_ref();
    let io_error = |source| InferenceError::Io { read1: read1.to_path_buf(), source };
    let absolute = read1.absolutize().map_err(io_error)?;
    let dir = absolute.parent().unwrap_or_else(|| Path::new("/"));
    let name = read1.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let extension = read1.extension();

    let mut candidates = vec![];
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let candidate = entry.map_err(io_error)?.path();
        if candidate.extension() != extension || !candidate.is_file() {
            continue;
        }
        let candidate_name =
            candidate.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        if is_mate_name(&name, &candidate_name, marker) {
            candidates.push(candidate);
        }
    }

    if candidates.len() == 1 {
        Ok(candidates.remove(0))
    } else {
        Err(InferenceError::NotUnique {
            read1: read1.to_path_buf(),
            marker,
            found: candidates.len(),
        })
    }
}
