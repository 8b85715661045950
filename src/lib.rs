//! Batch web scraper
//!
//! Scrapes lists of URLs politely and extracts structured data from the
//! returned HTML:
//! - Host-interleaved batching with a delay between batches
//! - Two HTTP transports (rotating headers, or a fixed browser profile for
//!   hosts that block plain clients) sharing a persisted cookie store
//! - Recursive, config-driven item extraction
//! - FFI entry point for extracting a single page from C/C++

pub mod config;
pub mod cookies;
pub mod error;
pub mod extractors;
pub mod fetcher;
pub mod ffi;
pub mod headers;
pub mod logging;
pub mod orchestrator;
pub mod scheduler;
pub mod transport;
pub mod urls;

pub use config::{RunConfig, ScrapingConfig, WebsiteConfig};
pub use cookies::CookieStore;
pub use error::{Result, ScrapeError};
pub use extractors::{scrape_page, Items, ScrapedValue};
pub use fetcher::Fetcher;
pub use ffi::*;
pub use orchestrator::{scrape_response, Orchestrator, PageResult, ScrapingResult};
pub use scheduler::{order_urls, BatchQueue};
pub use transport::{FetchResult, Transport, TransportPolicy};
