//! Browser-like request headers.
//!
//! The standard transport draws a fresh header set for every request so
//! consecutive requests do not share a fingerprint. The evasive transport
//! pairs its TLS-level identity with one fixed Firefox profile.

use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Mutex;

pub type HeaderSet = Vec<(&'static str, String)>;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.4; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.2478.80",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:126.0) Gecko/20100101 Firefox/126.0",
];

const ACCEPT: &[&str] = &[
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
];

const ACCEPT_LANGUAGE: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.5",
    "en-US,en;q=0.5",
    "en-GB,en-US;q=0.9,en;q=0.8",
    "de-DE,de;q=0.9,en;q=0.6",
];

/// Rotating generator of browser-like header sets.
#[derive(Debug, Default)]
pub struct HeaderRotation {
    last: Mutex<Option<HeaderSet>>,
}

impl HeaderRotation {
    pub fn new() -> Self {
        Self::default()
    }

    /// A random header set that differs from the previous one handed out.
    pub fn next_set(&self) -> HeaderSet {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let mut rng = rand::thread_rng();
        let mut headers = random_set(&mut rng);
        while last.as_ref() == Some(&headers) {
            headers = random_set(&mut rng);
        }
        *last = Some(headers.clone());
        headers
    }

    /// The fixed Firefox profile sent by the evasive transport.
    pub fn firefox_profile() -> HeaderSet {
        vec![
            ("User-Agent", USER_AGENTS[1].to_string()),
            (
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/png,image/svg+xml,*/*;q=0.8".to_string(),
            ),
            ("Accept-Language", "en-GB,en;q=0.5".to_string()),
            ("DNT", "1".to_string()),
            ("Priority", "u=0, i".to_string()),
            ("Sec-Fetch-Dest", "document".to_string()),
            ("Sec-Fetch-Mode", "navigate".to_string()),
            ("Sec-Fetch-Site", "none".to_string()),
            ("Sec-Fetch-User", "?1".to_string()),
            ("Sec-GPC", "1".to_string()),
            ("Upgrade-Insecure-Requests", "1".to_string()),
        ]
    }
}

fn random_set<R: Rng>(rng: &mut R) -> HeaderSet {
    let pick = |rng: &mut R, pool: &[&str]| pool.choose(rng).copied().unwrap_or_default().to_string();

    let mut headers = vec![
        ("User-Agent", pick(rng, USER_AGENTS)),
        ("Accept", pick(rng, ACCEPT)),
        ("Accept-Language", pick(rng, ACCEPT_LANGUAGE)),
    ];
    if rng.gen_bool(0.5) {
        headers.push(("DNT", "1".to_string()));
    }
    if rng.gen_bool(0.5) {
        headers.push(("Upgrade-Insecure-Requests", "1".to_string()));
    }
    headers
}
