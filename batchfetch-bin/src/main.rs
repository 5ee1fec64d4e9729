//! `batchfetch` fetches many URLs concurrently and reports which of them
//! returned a body.
//!
//! The batchfetch binary is a wrapper around batchfetch-lib, which provides
//! convenience functions for calling batchfetch from the command-line.
//!
//! Fetch a few URLs:
//! ```sh
//! batchfetch https://httpbin.org/get https://httpbin.org/delay/2
//! ```
//!
//! Fetch a list of URLs from a file, at most 20 at a time:
//! ```sh
//! batchfetch --concurrency 20 --input-file urls.txt
//! ```
//!
//! Read URLs from stdin and report the bodies as JSON:
//! ```sh
//! cat urls.txt | batchfetch --input-file - --format json
//! ```
//!
//! Log every request and retry to a file:
//! ```sh
//! batchfetch -vv --log-file logs/batch.log --input-file urls.txt
//! ```
#![warn(clippy::all, clippy::pedantic)]
#![warn(
    absolute_paths_not_starting_with_crate,
    rustdoc::invalid_html_tags,
    missing_copy_implementations,
    missing_debug_implementations,
    semicolon_in_expressions_from_macros,
    unreachable_pub,
    unused_extern_crates,
    variant_size_differences,
    clippy::missing_const_for_fn
)]
#![deny(anonymous_parameters, macro_use_extern_crate)]
#![deny(missing_docs)]

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Error, Result, bail};
use batchfetch_lib::{Client, timed};
use clap::Parser;
use formatters::{get_output_formatter, log::init_logging};
use log::error;

#[cfg(feature = "native-tls")]
use openssl_sys as _; // required for vendored-openssl feature
use ring as _; // required for apple silicon

mod client;
mod formatters;
mod input_file;
mod options;
mod report;
mod verbosity;

use crate::{
    options::{BATCHFETCH_CONFIG_FILE, BatchFetchOptions, Config},
    report::Report,
};

/// A C-like enum that can be cast to `i32` and used as process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitCode {
    Success = 0,
    // NOTE: exit code 1 is used for any `Result::Err` bubbled up to `main()`
    // using the `?` operator.
    #[allow(unused)]
    UnexpectedFailure = 1,
    FetchFailure = 2,
    ConfigFile = 3,
}

fn main() -> Result<()> {
    // std::process::exit doesn't guarantee that all destructors will be run,
    // therefore we wrap the main code in another function to ensure that.
    // See: https://doc.rust-lang.org/stable/std/process/fn.exit.html
    let exit_code = run_main()?;
    std::process::exit(exit_code);
}

/// Merge all provided config options into one.
/// This includes a potential config file, command-line- and environment variables
fn load_config() -> Result<BatchFetchOptions> {
    let mut opts = BatchFetchOptions::parse();

    // Load a potentially existing config file and merge it into the config from
    // the CLI
    if let Some(config_file) = &opts.config_file {
        match Config::load_from_file(config_file) {
            Ok(c) => opts.config.merge(c),
            Err(e) => {
                bail!(
                    "Cannot load configuration file `{}`: {e:?}",
                    config_file.display()
                );
            }
        }
    } else {
        // If no config file was explicitly provided, we try to load the default
        // config file from the current directory if the file exits. This will
        // raise an error if the file is invalid, just like the explicit provided
        // config file.
        let default_config = PathBuf::from(BATCHFETCH_CONFIG_FILE);
        if default_config.is_file() {
            match Config::load_from_file(&default_config) {
                Ok(c) => opts.config.merge(c),
                Err(e) => {
                    bail!(
                        "Cannot load default configuration file `{}`: {e:?}",
                        default_config.display()
                    );
                }
            }
        }
    }

    Ok(opts)
}

/// Set up logging and runtime, then run the batch
fn run_main() -> Result<i32> {
    use std::process::exit;

    // Logging can only be set up once the config file has been merged, so
    // errors up to here go straight to stderr.
    let opts = match load_config() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("Error while loading config: {e:#}");
            exit(ExitCode::ConfigFile as i32);
        }
    };

    if let Err(e) = init_logging(&opts.config.verbose, &opts.config.log) {
        eprintln!("Cannot set up logging: {e:#}");
        exit(ExitCode::ConfigFile as i32);
    }

    let client = match client::create(&opts.config) {
        Ok(client) => client,
        Err(e) => {
            error!("{e:#}");
            exit(ExitCode::ConfigFile as i32);
        }
    };

    let urls = opts.urls()?;

    // All requests are futures polled on this one thread; waiting for
    // responses and backoff sleeps never block it.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match runtime.block_on(run(&opts, &client, urls)) {
        Err(e) if Some(ErrorKind::BrokenPipe) == underlying_io_error_kind(&e) => {
            exit(ExitCode::Success as i32);
        }
        res => res,
    }
}

/// Check if the given error can be traced back to an `io::ErrorKind`
/// This is helpful for troubleshooting the root cause of an error.
/// Code is taken from the anyhow documentation.
fn underlying_io_error_kind(error: &Error) -> Option<io::ErrorKind> {
    for cause in error.chain() {
        if let Some(io_error) = cause.downcast_ref::<io::Error>() {
            return Some(io_error.kind());
        }
    }
    None
}

/// Fetch all URLs and report the results
async fn run(opts: &BatchFetchOptions, client: &Client, urls: Vec<String>) -> Result<i32> {
    let start = Instant::now();
    let bodies = timed("Batch", client.fetch_all(&urls)).await;
    let report = Report::new(urls, bodies, start.elapsed(), client.concurrency());

    let formatter = get_output_formatter(opts.config.format);
    let formatted = formatter.format(&report)?;
    write_output(opts.config.output.as_deref(), &formatted)?;

    let exit_code = if report.is_success() {
        ExitCode::Success
    } else {
        ExitCode::FetchFailure
    };
    Ok(exit_code as i32)
}

/// Write the formatted report to `path`, or to stdout if no path is given
fn write_output(path: Option<&Path>, formatted: &str) -> Result<()> {
    match path {
        Some(path) => fs::write(path, formatted)
            .with_context(|| format!("Cannot write results to `{}`", path.display())),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(formatted.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}
