use anyhow::Result;
use futures::future::join_all;
use hostgate_lib::{CachedResponse, Client, ErrorKind};
use log::warn;
use url::Url;

use crate::options::Config;

/// The outcome of one request
#[derive(Debug)]
pub(crate) struct FetchResult {
    pub(crate) url: Url,
    pub(crate) outcome: Result<CachedResponse, ErrorKind>,
}

impl FetchResult {
    pub(crate) const fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Fetch every URL `cfg.repeat` times.
///
/// URLs are fetched concurrently and left to the client's queues to pace.
/// The repeats of one URL run one after the other, so with `--cache` all
/// but the first are answered from the cache. Results keep the order of
/// the URLs.
pub(crate) async fn fetch(client: &Client, urls: Vec<Url>, cfg: &Config) -> Result<Vec<FetchResult>> {
    let options = cfg.request_options()?;
    let queue = cfg.queue_params();
    let cache = cfg.cache_params();

    let tasks = urls.into_iter().map(|url| {
        let (options, queue, cache) = (&options, &queue, &cache);
        async move {
            let mut results = Vec::with_capacity(cfg.repeat);
            for _ in 0..cfg.repeat {
                let outcome = match cache {
                    Some(cache) => client.request_cached(&url, options, queue, cache).await,
                    None => client
                        .request(&url, options, queue)
                        .await
                        .map(|response| CachedResponse::from(&response)),
                };

                if let Some(diagnostic) = outcome.as_ref().err().and_then(ErrorKind::diagnostic) {
                    warn!("{diagnostic}");
                }
                results.push(FetchResult {
                    url: url.clone(),
                    outcome,
                });
            }
            results
        }
    });

    Ok(join_all(tasks).await.into_iter().flatten().collect())
}
