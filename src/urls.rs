//! URL helpers: host grouping keys, website identifiers, base URLs and
//! link fixing for scraped `href`/`src` values.

use std::collections::HashSet;

use tracing::warn;
use url::{form_urlencoded, Url};

/// Returned by [`fix_url`] when a link cannot be resolved.
pub const UNFIXABLE_URL: &str = "https://error-in-fixing-url";
/// Returned by [`base_url`] when the page URL cannot be parsed.
pub const UNKNOWN_BASE_URL: &str = "https://error-in-extracting-base-url";
/// Returned by [`website_name`] when the page URL cannot be parsed.
pub const UNKNOWN_WEBSITE: &str = "error-in-extracting-website-name";

/// Authority segment of a URL (`scheme://AUTHORITY/...`), used to group
/// URLs by host. Malformed URLs without one group under `""`.
pub fn host_of(url: &str) -> &str {
    url.split('/').nth(2).unwrap_or("")
}

/// Website identifier used to look up a scraping config: the first label
/// after stripping one subdomain level (`www.ebay.com` -> `ebay`).
pub fn website_name(url: &str) -> String {
    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(e) => {
            warn!("Cannot extract website name from {}: {}", url, e);
            return UNKNOWN_WEBSITE.to_string();
        }
    };

    let host = parsed.host_str().unwrap_or("");
    let main_domain = host.split_once('.').map(|(_, rest)| rest).unwrap_or("");
    main_domain.split('.').next().unwrap_or("").to_string()
}

/// `scheme://authority` of a page URL.
pub fn base_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(u) => format!("{}://{}", u.scheme(), u.authority()),
        Err(e) => {
            warn!("Cannot extract base URL from {}: {}", url, e);
            UNKNOWN_BASE_URL.to_string()
        }
    }
}

/// Resolve a scraped link against a base URL.
///
/// - links with both scheme and authority are returned unchanged
/// - `//host/path` takes the base's scheme
/// - `/path` and relative links are joined onto the base
///
/// When joining, the link's own query parameters win over the base's;
/// base parameters whose keys do not collide are kept after them.
/// Never fails: unresolvable input yields [`UNFIXABLE_URL`].
pub fn fix_url(raw: &str, base: &str) -> String {
    match try_fix_url(raw.trim(), base) {
        Ok(fixed) => fixed,
        Err(e) => {
            warn!("Cannot fix url '{}' against '{}': {}", raw, base, e);
            UNFIXABLE_URL.to_string()
        }
    }
}

fn try_fix_url(raw: &str, base: &str) -> Result<String, url::ParseError> {
    if let Ok(parsed) = Url::parse(raw) {
        if parsed.has_host() {
            return Ok(raw.to_string());
        }
    }

    let base = Url::parse(base)?;

    if let Some(rest) = raw.strip_prefix("//") {
        return Ok(Url::parse(&format!("{}://{}", base.scheme(), rest))?.to_string());
    }

    let joined = base.join(raw)?;
    Ok(merge_query(joined, &base).to_string())
}

fn merge_query(mut url: Url, base: &Url) -> Url {
    if base.query().is_none() {
        return url;
    }

    let own_keys: HashSet<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
    let inherited: Vec<(String, String)> = base
        .query_pairs()
        .into_owned()
        .filter(|(k, _)| !own_keys.contains(k))
        .collect();
    if inherited.is_empty() {
        return url;
    }

    // The link's own query is kept byte for byte; only base pairs are encoded.
    let appended = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(&inherited)
        .finish();
    let query = match url.query().filter(|q| !q.is_empty()) {
        Some(own) => format!("{own}&{appended}"),
        None => appended,
    };
    url.set_query(Some(&query));
    url
}
