use anyhow::Result;
use itertools::Itertools;
use log::info;

use crate::{
    filter::{FilterMetrics, ReadFilter},
    opts::Opts,
    pair_reader::PairedReadSource,
    pair_writer::{PairedReadSink, STDOUT_NAME},
    utils::built_info,
};

/// Run filtering.
pub fn run(opts: Opts) -> Result<FilterMetrics> {
    opts.validate()?;
    let verbose = opts.verbose();
    if verbose {
        info!("Running bcfilter version {}", built_info::VERSION.as_str());
        info!("Keeping read pairs with status {}", opts.status.iter().join(", "));
    }

    let whitelist = opts.whitelist()?;
    if let Some(whitelist) = &whitelist {
        if verbose {
            info!(
                "Loaded {} barcodes (min count: {:?}, max count: {:?})",
                whitelist.len(),
                whitelist.min(),
                whitelist.max()
            );
        }
    }

    let mut source = PairedReadSource::new(
        opts.read1_input(),
        opts.read2_patterns(),
        opts.interleaved_in,
        verbose,
    )?;
    let mut sink = PairedReadSink::new(
        opts.output.clone(),
        opts.nogzip,
        opts.interleaved_out,
        opts.compressor_threads,
    );
    if verbose {
        let destination = match sink.output_paths() {
            paths if paths.is_empty() => STDOUT_NAME.to_string(),
            paths => paths.iter().map(|p| p.to_string_lossy()).join(", "),
        };
        info!(
            "Writing {} {} output to {}",
            if sink.is_interleaved() { "interleaved" } else { "paired" },
            if sink.is_compressed() { "gzip compressed" } else { "uncompressed" },
            destination
        );
    }
    sink.open()?;

    let mut filter = ReadFilter::new(opts.status.iter().copied(), whitelist, verbose);
    let metrics = filter.run(&mut source, &mut sink)?;
    sink.close()?;

    if let Some(path) = &opts.metrics {
        metrics.write(path)?;
    }
    Ok(metrics)
}
