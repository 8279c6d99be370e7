//! `hostgate` fetches URLs politely.
//!
//! Every request waits in the queue of its host, which caps how many
//! requests run at once (three by default) or how fast they start.
//! Responses can be cached in memory for the duration of a run, and every
//! failed request is reported with a curl command for reproducing it.
//!
//! The hostgate binary is a wrapper around hostgate-lib, which provides
//! the queues, the cache and the client.
//!
//! Fetch a few URLs:
//! ```sh
//! hostgate https://api.github.com/zen https://api.github.com/octocat
//! ```
//!
//! Start at most two requests per second per host:
//! ```sh
//! hostgate --rps 2 https://api.github.com/zen https://api.github.com/octocat
//! ```
//!
//! Send a JSON body and print the results as JSON:
//! ```sh
//! hostgate -X POST --json '{"name": "widget"}' --format json https://httpbin.org/post
//! ```
//!
//! Fetch a URL three times, answering the repeats from the cache:
//! ```sh
//! hostgate --cache --repeat 3 --queue-stats https://api.github.com/zen
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

use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;

use anyhow::{Error, Result, bail};
use clap::{Parser, crate_version};
use formatters::log::init_logging;
use log::{error, info};

mod client;
mod commands;
mod formatters;
mod options;
mod verbosity;

use crate::options::{Config, HOSTGATE_CONFIG_FILE, HostgateOptions};

/// A C-like enum that can be cast to `i32` and used as process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitCode {
    Success = 0,
    // NOTE: exit code 1 is used for any `Result::Err` bubbled up to `main()`
    // using the `?` operator, including invalid URLs and options.
    #[allow(unused)]
    UnexpectedFailure = 1,
    RequestFailure = 2,
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
fn load_config() -> Result<HostgateOptions> {
    let mut opts = HostgateOptions::parse();

    init_logging(&opts.config.verbose, &opts.config.mode);

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
        // Without an explicit config file, use `hostgate.toml` from the
        // current directory if it exists. An invalid default file is still
        // an error.
        let default_config = PathBuf::from(HOSTGATE_CONFIG_FILE);
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

/// Set up runtime and call hostgate entrypoint
fn run_main() -> Result<i32> {
    use std::process::exit;

    let opts = match load_config() {
        Ok(opts) => opts,
        Err(e) => {
            error!(
                "Error while loading config: {e}\n\
                See `hostgate --help` for the available keys (hostgate v{})",
                crate_version!()
            );
            exit(ExitCode::ConfigFile as i32);
        }
    };

    let runtime = tokio::runtime::Runtime::new()?;

    match runtime.block_on(run(&opts)) {
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

/// Fetch the given URLs and print the results
async fn run(opts: &HostgateOptions) -> Result<i32> {
    let urls = opts.urls()?;
    let cfg = &opts.config;

    let client = client::create(cfg)?;
    let results = commands::fetch(&client, urls, cfg).await?;

    let stats = cfg.queue_stats.then(|| client.registry().stats());
    let formatter = formatters::get_response_formatter(&cfg.format, &cfg.mode);
    let output = formatter.format(&results, stats.as_ref())?;
    writeln!(io::stdout(), "{output}")?;

    if cfg.cache {
        let cache = client.cache().stats();
        info!(
            "Cache: {} hits, {} misses, {} expired ({:.0}% hit rate)",
            cache.hits(),
            cache.misses(),
            cache.expired(),
            cache.hit_rate() * 100.0
        );
    }

    let exit_code = if results.iter().all(commands::FetchResult::is_success) {
        ExitCode::Success
    } else {
        ExitCode::RequestFailure
    };
    Ok(exit_code as i32)
}
