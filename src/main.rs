#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
use std::process::exit;

use bcfilter_lib::opts::setup;
use bcfilter_lib::run::run;
use bcfilter_lib::utils::is_broken_pipe;
use log::error;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[cfg(not(tarpaulin_include))]
fn main() {
    let opts = setup();

    if let Err(err) = run(opts) {
        // the consumer of our output went away, there is nothing left to report
        if is_broken_pipe(&err) {
            exit(0);
        }
        error!("{:#}", err);
        exit(1);
    }
}
