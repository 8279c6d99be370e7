use crate::options::Config;

use anyhow::{Context, Result};
use hostgate_lib::{Client, ClientBuilder};

/// Creates a client according to the command-line config
pub(crate) fn create(cfg: &Config) -> Result<Client> {
    ClientBuilder::builder()
        .user_agent(cfg.user_agent.clone())
        .timeout(cfg.timeout)
        .queue_config(cfg.queue.clone())
        .build()
        .client()
        .context("Failed to create request client")
}
