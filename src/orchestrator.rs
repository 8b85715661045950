//! Batch loop: pop a batch, fetch it, extract every response in
//! parallel, merge, wait, repeat.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::{RunConfig, ScrapingConfig};
use crate::error::Result;
use crate::extractors::{scrape_page, Items};
use crate::fetcher::Fetcher;
use crate::scheduler::BatchQueue;
use crate::transport::FetchResult;
use crate::urls::website_name;

/// What a scraping run produced for one URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PageResult {
    Items(Items),
    Status { status: u16 },
    Redirect { redirect: String },
    Error { error: String },
}

/// Results of a run keyed by URL.
pub type ScrapingResult = HashMap<String, PageResult>;

/// Turn one fetch outcome into the result stored for its URL.
pub fn scrape_response(scraping: &ScrapingConfig, url: &str, response: FetchResult) -> PageResult {
    match response {
        FetchResult::Body(body) => match scraping.for_url(url) {
            Some(website) => PageResult::Items(scrape_page(&body.to_html(), website, url)),
            None => {
                warn!("No scraping config for ({})", url);
                PageResult::Error {
                    error: format!("no scraping config for website '{}'", website_name(url)),
                }
            }
        },
        FetchResult::StatusOnly(status) => PageResult::Status { status },
        FetchResult::Redirect(redirect) => PageResult::Redirect { redirect },
        FetchResult::Failed(reason) => PageResult::Error { error: reason },
    }
}

/// Run one page's extraction so that a panic becomes an error result for
/// that URL instead of unwinding through the whole batch.
fn isolate_panics<F: FnOnce() -> PageResult>(url: &str, extract: F) -> PageResult {
    match panic::catch_unwind(AssertUnwindSafe(extract)) {
        Ok(page) => page,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("Extraction of ({}) panicked: {}", url, reason);
            PageResult::Error {
                error: format!("extraction panicked: {reason}"),
            }
        }
    }
}

pub struct Orchestrator {
    config: RunConfig,
    scraping: Arc<ScrapingConfig>,
    fetcher: Fetcher,
    pool: Arc<rayon::ThreadPool>,
}

impl Orchestrator {
    pub fn new(config: RunConfig, scraping: ScrapingConfig) -> Result<Self> {
        let fetcher = Fetcher::new(&config)?;
        Self::with_fetcher(config, scraping, fetcher)
    }

    pub fn with_fetcher(config: RunConfig, scraping: ScrapingConfig, fetcher: Fetcher) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_count())
            .thread_name(|i| format!("extract-{i}"))
            .build()?;

        Ok(Self {
            config,
            scraping: Arc::new(scraping),
            fetcher,
            pool: Arc::new(pool),
        })
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Scrape `urls`. Ctrl-C stops the run after the batch in flight and
    /// returns what was collected so far.
    ///
    /// This installs a process-wide SIGINT handler that stays in place
    /// after the run: Ctrl-C no longer terminates the process by default.
    /// Hosts that manage signals themselves should call
    /// [`run_until_cancelled`](Self::run_until_cancelled) with their own
    /// token instead.
    pub async fn run<S: AsRef<str>>(&mut self, urls: &[S]) -> ScrapingResult {
        let token = CancellationToken::new();
        let listener = tokio::spawn({
            let token = token.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupt received, stopping after the current batch");
                    token.cancel();
                }
            }
        });

        let results = self.run_until_cancelled(urls, token).await;
        listener.abort();
        results
    }

    /// Scrape `urls` until done or until `token` is cancelled. The token
    /// is checked between batches and during the inter-batch delay, never
    /// in the middle of a fetch.
    pub async fn run_until_cancelled<S: AsRef<str>>(
        &mut self,
        urls: &[S],
        token: CancellationToken,
    ) -> ScrapingResult {
        let mut queue = BatchQueue::build(urls, self.config.batch_size);
        let span = info_span!("scrape_run", urls = urls.len(), batches = queue.total());

        async move {
            let mut results = ScrapingResult::new();

            while queue.remaining() > 0 {
                if token.is_cancelled() {
                    warn!("Run cancelled with {} batches left", queue.remaining());
                    break;
                }

                let index = queue.batch_index();
                let batch = match queue.pop() {
                    Ok(batch) => batch,
                    Err(e) => {
                        error!("{}", e);
                        break;
                    }
                };
                info!("Batch {}/{}: {} urls", index, queue.total(), batch.len());

                let responses = self.fetcher.fetch_batch(&batch).await;
                match self.extract_batch(responses).await {
                    Ok(pages) => results.extend(pages),
                    Err(e) => {
                        error!("Extraction of batch {} failed: {}", index, e);
                        break;
                    }
                }

                if queue.remaining() > 0 && !self.config.batch_delay.is_zero() {
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.batch_delay) => {}
                        _ = token.cancelled() => {}
                    }
                }
            }

            info!("Run finished with {} results", results.len());
            results
        }
        .instrument(span)
        .await
    }

    async fn extract_batch(&self, responses: Vec<(String, FetchResult)>) -> Result<Vec<(String, PageResult)>> {
        let pool = Arc::clone(&self.pool);
        let scraping = Arc::clone(&self.scraping);

        let pages = tokio::task::spawn_blocking(move || {
            pool.install(|| {
                responses
                    .into_par_iter()
                    .map(|(url, response)| {
                        let page = isolate_panics(&url, || scrape_response(&scraping, &url, response));
                        (url, page)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .await?;

        Ok(pages)
    }
}
