//! Cookie jar shared by both transports, persisted as one file.
//!
//! Cookie semantics (domain and path matching, `Expires`/`Max-Age`,
//! removal through expired `Set-Cookie`) come from `cookie_store`. The
//! file holds every live cookie, session cookies included, and is
//! rewritten whole after each batch.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Result, ScrapeError};

#[derive(Debug, Clone, Default)]
pub struct CookieStore {
    jar: cookie_store::CookieStore,
}

impl CookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store written by [`save`](Self::save). A missing or empty
    /// file is an empty store; an unreadable format is logged and
    /// replaced by an empty store. Expired cookies are dropped. Other IO
    /// failures propagate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No cookie file at {}", path.display());
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::new());
        }

        match cookie_store::serde::json::load(BufReader::new(data.as_slice())) {
            Ok(jar) => Ok(Self { jar }),
            Err(e) => {
                warn!("Ignoring unreadable cookie file {}: {}", path.display(), e);
                Ok(Self::new())
            }
        }
    }

    /// Overwrite `path` with the full store.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("tmp");

        let mut writer = BufWriter::new(File::create(&tmp)?);
        cookie_store::serde::json::save_incl_expired_and_nonpersistent(&self.jar, &mut writer)
            .map_err(|e| ScrapeError::Cookies(e.to_string()))?;
        writer.flush()?;
        drop(writer);

        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Value of the cookie `name` that would be sent to `url`.
    pub fn get(&self, url: &str, name: &str) -> Option<String> {
        let url = Url::parse(url).ok()?;
        self.jar
            .get_request_values(&url)
            .find(|(n, _)| *n == name)
            .map(|(_, value)| value.to_string())
    }

    /// `Cookie` request header for `url`, if any cookie matches it.
    pub fn cookie_header(&self, url: &str) -> Option<String> {
        let url = Url::parse(url).ok()?;
        let header = self
            .jar
            .get_request_values(&url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        (!header.is_empty()).then_some(header)
    }

    /// Merge the `Set-Cookie` headers of a response to `url`. An expired
    /// cookie removes the stored one of the same name.
    pub fn absorb_set_cookie<'a>(&mut self, url: &str, headers: impl IntoIterator<Item = &'a str>) {
        let Ok(url) = Url::parse(url) else {
            return;
        };

        let cookies = headers.into_iter().filter_map(|header| {
            match cookie_store::RawCookie::parse(header.to_owned()) {
                Ok(cookie) => Some(cookie),
                Err(e) => {
                    debug!("Skipping malformed Set-Cookie from ({}): {}", url, e);
                    None
                }
            }
        });
        self.jar.store_response_cookies(cookies, &url);
    }

    /// Number of live cookies.
    pub fn len(&self) -> usize {
        self.jar.iter_unexpired().count()
    }

    pub fn is_empty(&self) -> bool {
        self.jar.iter_unexpired().next().is_none()
    }

    /// Live cookies as `(name, value)` pairs, sorted.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .jar
            .iter_unexpired()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();
        pairs.sort();
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb_and_header() {
        let mut store = CookieStore::new();
        store.absorb_set_cookie(
            "https://shop.com/login",
            ["session=abc; Path=/; HttpOnly", "theme=dark; Max-Age=3600", "broken"],
        );
        assert_eq!(store.get("https://shop.com/", "session").as_deref(), Some("abc"));
        assert_eq!(store.get("https://shop.com/cart", "theme").as_deref(), Some("dark"));
        let header = store.cookie_header("https://shop.com/").unwrap();
        assert!(header.contains("session=abc"));
        assert!(header.contains("theme=dark"));
        assert_eq!(store.cookie_header("https://other.com/"), None);

        store.absorb_set_cookie("https://shop.com/", ["session=; Max-Age=0; Path=/"]);
        assert_eq!(store.get("https://shop.com/", "session").as_deref(), None);
        assert_eq!(store.cookie_header("https://shop.com/").as_deref(), Some("theme=dark"));
    }

    #[test]
    fn test_expired_set_cookie_removes_cookie() {
        let mut store = CookieStore::new();
        store.absorb_set_cookie("https://shop.com/", ["session=abc; Path=/"]);
        assert_eq!(store.get("https://shop.com/", "session").as_deref(), Some("abc"));

        store.absorb_set_cookie(
            "https://shop.com/",
            ["session=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Path=/"],
        );
        assert_eq!(store.get("https://shop.com/", "session").as_deref(), None);
        assert_eq!(store.cookie_header("https://shop.com/"), None);
    }

    #[test]
    fn test_domain_and_path_matching() {
        let mut store = CookieStore::new();
        store.absorb_set_cookie(
            "https://www.shop.com/",
            ["region=eu; Domain=shop.com; Path=/", "cart=1; Path=/cart"],
        );

        assert_eq!(store.get("https://shop.com/", "region").as_deref(), Some("eu"));
        assert_eq!(store.get("https://img.shop.com/a.png", "region").as_deref(), Some("eu"));
        assert_eq!(store.get("https://www.shop.com/cart/items", "cart").as_deref(), Some("1"));
        assert_eq!(store.get("https://www.shop.com/", "cart").as_deref(), None);
        assert_eq!(store.get("https://shop.com/cart", "cart").as_deref(), None);
    }

    #[test]
    fn test_save_overwrites_and_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");

        let mut store = CookieStore::new();
        store.absorb_set_cookie("https://a.com/", ["k=1; Path=/"]);
        store.absorb_set_cookie("https://b.com/", ["k=2; Path=/; Max-Age=3600"]);
        store.save(&path).unwrap();

        let mut smaller = CookieStore::new();
        smaller.absorb_set_cookie("https://a.com/", ["k=3; Path=/"]);
        smaller.save(&path).unwrap();

        let loaded = CookieStore::load(&path).unwrap();
        assert_eq!(loaded.snapshot(), smaller.snapshot());
        assert_eq!(loaded.get("https://a.com/", "k").as_deref(), Some("3"));
        assert_eq!(loaded.get("https://b.com/", "k").as_deref(), None);
    }

    #[test]
    fn test_load_missing_or_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = CookieStore::load(dir.path().join("nope.json")).unwrap();
        assert!(missing.is_empty());

        let empty = dir.path().join("empty.json");
        std::fs::write(&empty, "").unwrap();
        assert!(CookieStore::load(&empty).unwrap().is_empty());

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, b"\x80\x04not json").unwrap();
        assert!(CookieStore::load(&garbage).unwrap().is_empty());
    }
}
