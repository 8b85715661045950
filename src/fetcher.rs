//! Batch fetching over two transports.

use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::config::RunConfig;
use crate::cookies::CookieStore;
use crate::error::Result;
use crate::transport::{EvasiveTransport, FetchResult, StandardTransport, Transport, TransportPolicy};

/// Routes each URL of a batch to its transport, owns the cookie store
/// and persists it after every batch.
pub struct Fetcher {
    standard: Box<dyn Transport>,
    evasive: Box<dyn Transport>,
    policy: TransportPolicy,
    cookies: CookieStore,
    cookie_path: Option<PathBuf>,
}

impl Fetcher {
    /// Load the cookie file and build both transports.
    pub fn new(config: &RunConfig) -> Result<Self> {
        let cookies = CookieStore::load(&config.cookie_path)?;
        debug!("Loaded {} cookies", cookies.len());

        Ok(Self::with_transports(
            Box::new(StandardTransport::new(config.request_timeout)?),
            Box::new(EvasiveTransport::new(config.request_timeout)),
            TransportPolicy::new(&config.evasive_hosts),
            cookies,
            Some(config.cookie_path.clone()),
        ))
    }

    /// Assemble a fetcher from explicit parts. Without a `cookie_path`
    /// cookies live only in memory.
    pub fn with_transports(
        standard: Box<dyn Transport>,
        evasive: Box<dyn Transport>,
        policy: TransportPolicy,
        cookies: CookieStore,
        cookie_path: Option<PathBuf>,
    ) -> Self {
        Self {
            standard,
            evasive,
            policy,
            cookies,
            cookie_path,
        }
    }

    pub fn cookies(&self) -> &CookieStore {
        &self.cookies
    }

    /// Fetch one batch. Returns `(url, result)` pairs in the order the
    /// URLs were actually sent: standard partition first, then evasive.
    /// Per-URL failures are results, never errors.
    pub async fn fetch_batch(&mut self, urls: &[String]) -> Vec<(String, FetchResult)> {
        let (standard, evasive) = self.policy.partition(urls);
        let mut pairs = Vec::with_capacity(urls.len());

        for (transport, partition) in [(&self.standard, standard), (&self.evasive, evasive)] {
            if partition.is_empty() {
                continue;
            }
            info!("Fetching {} urls via {} transport", partition.len(), transport.name());
            let results = transport.fetch_all(&partition, &mut self.cookies).await;
            pairs.extend(pair_up(transport.name(), partition, results));
        }

        self.persist_cookies();
        pairs
    }

    fn persist_cookies(&self) {
        let Some(path) = &self.cookie_path else {
            return;
        };
        if let Err(e) = self.cookies.save(path) {
            error!("Failed to save cookies to {}: {}", path.display(), e);
        }
    }
}

/// Zip a partition with its results; a transport that returned too few
/// results gets placeholders so no URL is silently dropped.
fn pair_up(transport: &str, urls: Vec<String>, results: Vec<FetchResult>) -> Vec<(String, FetchResult)> {
    if results.len() != urls.len() {
        warn!(
            "{} transport returned {} results for {} urls",
            transport,
            results.len(),
            urls.len()
        );
    }

    let mut results = results.into_iter();
    urls.into_iter()
        .map(|url| {
            let result = results
                .next()
                .unwrap_or_else(|| FetchResult::Failed("no response from transport".to_string()));
            (url, result)
        })
        .collect()
}
