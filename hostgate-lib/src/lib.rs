//! `hostgate` is a library for sending outbound HTTP requests politely.
//!
//! Every request goes through a queue chosen by its host (or a key of your
//! choosing), which caps how many requests run at once or how fast they
//! start. Responses can be cached for a while, and failed requests come
//! with a ready-to-paste curl command.
//!
//! "Hello world" example:
//! ```no_run
//! use hostgate_lib::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let response = hostgate_lib::get("https://api.github.com/zen").await?;
//!   println!("{}", response.body);
//!   Ok(())
//! }
//! ```
//!
//! For anything beyond a single request, build one client and reuse it so
//! that all requests share its queues and cache:
//!
//! ```no_run
//! use hostgate_lib::{CacheParams, ClientBuilder, QueueParams, RequestOptions, Result};
//! use hostgate_lib::queue::PolicyParams;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let client = ClientBuilder::default().client()?;
//!   let url = hostgate_lib::parse_url("https://api.github.com/repos/rust-lang/rust")?;
//!
//!   let queue = QueueParams::default().policy(PolicyParams::rps(2));
//!   let cache = CacheParams::default().expire(Duration::from_secs(600));
//!   let response = client
//!       .request_cached(&url, &RequestOptions::new(), &queue, &cache)
//!       .await?;
//!   assert!(response.status.is_success());
//!   Ok(())
//! }
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
#![allow(clippy::module_name_repetitions)]

mod client;
mod dispatcher;
mod types;

pub mod cache;
pub mod diagnostic;
pub mod queue;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_utils;

pub use client::{Client, ClientBuilder, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, get, parse_url};
pub use dispatcher::Dispatcher;
pub use types::*;
