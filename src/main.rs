#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
use std::process::exit;

use clap::Parser;
use env_logger::Env;
use log::error;
use raidx_lib::bench::{run, Opts};

#[cfg(not(tarpaulin_include))]
fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();

    if let Err(err) = run(&opts) {
        error!("{:#}", err);
        exit(1);
    }
}
