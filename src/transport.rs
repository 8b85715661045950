//! HTTP transports.
//!
//! Both transports share one contract: fetch every URL of a partition,
//! return exactly one [`FetchResult`] per URL in the same order, and keep
//! the cookie store up to date. Redirects are never followed; a 302/303
//! with a `Location` surfaces as one resolved hop.

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::header::{COOKIE, LOCATION, SET_COOKIE};
use std::borrow::Cow;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use crate::cookies::CookieStore;
use crate::error::Result;
use crate::headers::HeaderRotation;
use crate::urls::{base_url, fix_url};

/// Response body: UTF-8 text, or raw bytes when decoding failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    Bytes(Vec<u8>),
}

impl Body {
    /// Body as HTML source, lossily decoding raw bytes.
    pub fn to_html(&self) -> Cow<'_, str> {
        match self {
            Self::Text(text) => Cow::Borrowed(text),
            Self::Bytes(bytes) => String::from_utf8_lossy(bytes),
        }
    }
}

pub fn decode_body(bytes: Vec<u8>) -> Body {
    match String::from_utf8(bytes) {
        Ok(text) => Body::Text(text),
        Err(e) => {
            debug!("Body is not valid UTF-8, keeping raw bytes: {}", e.utf8_error());
            Body::Bytes(e.into_bytes())
        }
    }
}

/// Outcome of fetching one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// 200 response
    Body(Body),
    /// Any other non-redirect status
    StatusOnly(u16),
    /// 302/303 target, resolved against the request origin
    Redirect(String),
    /// Transport-level failure (connection, timeout, body read)
    Failed(String),
}

/// Decide the outcome of a response from its status line. `None` means
/// the body should be read.
pub fn classify(request_url: &str, status: u16, location: Option<&str>) -> Option<FetchResult> {
    match status {
        200 => None,
        302 | 303 if location.is_some() => {
            let target = fix_url(location.unwrap_or_default(), &base_url(request_url));
            debug!("({}) redirects to {}", request_url, target);
            Some(FetchResult::Redirect(target))
        }
        301 | 308 | 400 | 404 | 410 => {
            warn!(
                "({}), Response Status Code {}: resource moved or bad request",
                request_url, status
            );
            Some(FetchResult::StatusOnly(status))
        }
        302 | 303 | 500 | 502 | 503 => {
            warn!("({}), Response Status Code {}: server-side condition", request_url, status);
            Some(FetchResult::StatusOnly(status))
        }
        _ => {
            warn!("({}), Response Status Code {}", request_url, status);
            Some(FetchResult::StatusOnly(status))
        }
    }
}

/// Capability shared by the standard and evasive clients.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch `urls`, returning one result per URL in the same order.
    async fn fetch_all(&self, urls: &[String], cookies: &mut CookieStore) -> Vec<FetchResult>;
}

/// reqwest-based client: all requests of a partition are in flight at
/// once, each with a fresh header set.
pub struct StandardTransport {
    client: reqwest::Client,
    headers: HeaderRotation,
}

impl StandardTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            headers: HeaderRotation::new(),
        })
    }

    async fn fetch_one(&self, url: &str, cookie: Option<String>) -> (FetchResult, Vec<String>) {
        let mut request = self.client.get(url);
        for (name, value) in self.headers.next_set() {
            request = request.header(name, value);
        }
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }

        debug!("GET {}", url);
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Failed request for ({}): {}", url, e);
                return (FetchResult::Failed(e.to_string()), Vec::new());
            }
        };

        let status = response.status().as_u16();
        let set_cookies: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(String::from)
            .collect();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        if let Some(outcome) = classify(url, status, location.as_deref()) {
            return (outcome, set_cookies);
        }

        match response.bytes().await {
            Ok(bytes) => (FetchResult::Body(decode_body(bytes.to_vec())), set_cookies),
            Err(e) => {
                error!("Failed reading body of ({}): {}", url, e);
                (FetchResult::Failed(e.to_string()), set_cookies)
            }
        }
    }
}

#[async_trait]
impl Transport for StandardTransport {
    fn name(&self) -> &'static str {
        "standard"
    }

    async fn fetch_all(&self, urls: &[String], cookies: &mut CookieStore) -> Vec<FetchResult> {
        let responses = join_all(
            urls.iter()
                .map(|url| self.fetch_one(url, cookies.cookie_header(url))),
        )
        .await;

        urls.iter()
            .zip(responses)
            .map(|(url, (outcome, set_cookies))| {
                cookies.absorb_set_cookie(url, set_cookies.iter().map(String::as_str));
                outcome
            })
            .collect()
    }
}

/// ureq-based client: one agent session per batch, requests issued one
/// after another with a fixed browser profile, on a blocking worker.
#[derive(Clone)]
pub struct EvasiveTransport {
    agent: ureq::Agent,
}

impl EvasiveTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::Agent::new_with_config(
            ureq::Agent::config_builder()
                .timeout_global(Some(timeout))
                .max_redirects(0)
                .http_status_as_error(false)
                .build(),
        );
        Self { agent }
    }

    fn fetch_blocking(&self, url: &str, cookies: &mut CookieStore) -> FetchResult {
        let mut request = self.agent.get(url);
        for (name, value) in HeaderRotation::firefox_profile() {
            request = request.header(name, value);
        }
        if let Some(cookie) = cookies.cookie_header(url) {
            request = request.header("Cookie", cookie);
        }

        debug!("GET {} (evasive)", url);
        let response = match request.call() {
            Ok(response) => response,
            Err(e) => {
                error!("Failed request for ({}): {}", url, e);
                return FetchResult::Failed(e.to_string());
            }
        };

        cookies.absorb_set_cookie(
            url,
            response
                .headers()
                .get_all("set-cookie")
                .iter()
                .filter_map(|v| v.to_str().ok()),
        );

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        if let Some(outcome) = classify(url, status, location.as_deref()) {
            return outcome;
        }

        match response.into_body().read_to_vec() {
            Ok(bytes) => FetchResult::Body(decode_body(bytes)),
            Err(e) => {
                error!("Failed reading body of ({}): {}", url, e);
                FetchResult::Failed(e.to_string())
            }
        }
    }
}

#[async_trait]
impl Transport for EvasiveTransport {
    fn name(&self) -> &'static str {
        "evasive"
    }

    async fn fetch_all(&self, urls: &[String], cookies: &mut CookieStore) -> Vec<FetchResult> {
        let session = self.clone();
        let owned_urls = urls.to_vec();
        let mut store = cookies.clone();

        let joined = tokio::task::spawn_blocking(move || {
            let results: Vec<FetchResult> = owned_urls
                .iter()
                .map(|url| session.fetch_blocking(url, &mut store))
                .collect();
            (results, store)
        })
        .await;

        match joined {
            Ok((results, store)) => {
                *cookies = store;
                results
            }
            Err(e) => {
                error!("Evasive session worker failed: {}", e);
                urls.iter().map(|_| FetchResult::Failed(e.to_string())).collect()
            }
        }
    }
}

/// Which transport a URL goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Standard,
    Evasive,
}

/// Static allow-list of hosts that need the evasive transport. A listed
/// host also covers its subdomains.
#[derive(Debug, Clone, Default)]
pub struct TransportPolicy {
    evasive_hosts: Vec<String>,
}

impl TransportPolicy {
    pub fn new<I, S>(evasive_hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            evasive_hosts: evasive_hosts
                .into_iter()
                .map(|h| h.as_ref().trim().to_lowercase())
                .collect(),
        }
    }

    pub fn route(&self, url: &str) -> Route {
        let Some(host) = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
        else {
            return Route::Standard;
        };

        let listed = self.evasive_hosts.iter().any(|listed| {
            host == *listed
                || host
                    .strip_suffix(listed.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        });
        if listed {
            Route::Evasive
        } else {
            Route::Standard
        }
    }

    /// Split a batch into `(standard, evasive)`, keeping relative order
    /// within each side.
    pub fn partition(&self, urls: &[String]) -> (Vec<String>, Vec<String>) {
        urls.iter()
            .cloned()
            .partition(|url| self.route(url) == Route::Standard)
    }
}
