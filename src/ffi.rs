//! FFI interface for C/C++ hosts
//!
//! Exposes single-page extraction: the host fetches HTML itself and hands
//! it over together with a website config. Config and result both cross
//! the boundary as JSON.

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use crate::config::WebsiteConfig;
use crate::extractors::scrape_page;

/// Result struct returned to the host.
/// Both pointers are owned by Rust and must be freed via free_scrape_result
#[repr(C)]
pub struct ScrapeResultFFI {
    /// JSON-serialized items (null-terminated)
    pub json_ptr: *mut c_char,
    /// Error message if extraction failed (null-terminated), or null on success
    pub error_ptr: *mut c_char,
}

/// Extract the configured items from one HTML page.
///
/// # Arguments
/// * `html_ptr` - Pointer to HTML content (UTF-8, not necessarily null-terminated)
/// * `html_len` - Length of HTML content in bytes
/// * `page_url` - URL the page was fetched from (null-terminated), used to resolve links
/// * `website_config_json` - JSON object of one website's config (null-terminated)
///
/// # Returns
/// ScrapeResultFFI with either json_ptr set (success) or error_ptr set (failure)
///
/// # Safety
/// - `html_ptr` must point to valid memory of at least `html_len` bytes
/// - `page_url` and `website_config_json` must be valid null-terminated C strings
/// - Caller must free the result via `free_scrape_result`
#[no_mangle]
pub unsafe extern "C" fn scrape_html(
    html_ptr: *const c_char,
    html_len: usize,
    page_url: *const c_char,
    website_config_json: *const c_char,
) -> ScrapeResultFFI {
    let html = if html_ptr.is_null() || html_len == 0 {
        ""
    } else {
        let slice = std::slice::from_raw_parts(html_ptr as *const u8, html_len);
        match std::str::from_utf8(slice) {
            Ok(s) => s,
            Err(_) => return make_error_result("Invalid UTF-8 in HTML content"),
        }
    };

    let page_url = match read_c_str(page_url, "Page URL") {
        Ok(s) => s,
        Err(msg) => return make_error_result(&msg),
    };
    let config_str = match read_c_str(website_config_json, "Website config JSON") {
        Ok(s) => s,
        Err(msg) => return make_error_result(&msg),
    };

    let value: serde_json::Value = match serde_json::from_str(config_str) {
        Ok(v) => v,
        Err(e) => return make_error_result(&format!("Failed to parse website config JSON: {}", e)),
    };
    let website = match WebsiteConfig::from_value("website", &value) {
        Ok(w) => w,
        Err(e) => return make_error_result(&e.to_string()),
    };

    let items = scrape_page(html, &website, page_url);

    match serde_json::to_string(&items) {
        Ok(json) => match CString::new(json) {
            Ok(cstr) => ScrapeResultFFI {
                json_ptr: cstr.into_raw(),
                error_ptr: ptr::null_mut(),
            },
            Err(_) => make_error_result("Result JSON contains null bytes"),
        },
        Err(e) => make_error_result(&format!("Failed to serialize result: {}", e)),
    }
}

/// Free a ScrapeResultFFI returned by scrape_html
///
/// # Safety
/// - `result` must have been returned by `scrape_html`
/// - Must only be called once per result
#[no_mangle]
pub unsafe extern "C" fn free_scrape_result(result: ScrapeResultFFI) {
    if !result.json_ptr.is_null() {
        drop(CString::from_raw(result.json_ptr));
    }
    if !result.error_ptr.is_null() {
        drop(CString::from_raw(result.error_ptr));
    }
}

unsafe fn read_c_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, String> {
    if ptr.is_null() {
        return Err(format!("{} is null", what));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| format!("Invalid UTF-8 in {}", what.to_lowercase()))
}

fn make_error_result(msg: &str) -> ScrapeResultFFI {
    let error_cstr = CString::new(msg.replace('\0', " ")).unwrap_or_default();
    ScrapeResultFFI {
        json_ptr: ptr::null_mut(),
        error_ptr: error_cstr.into_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn call(html: &str, url: &str, config: &str) -> (Option<String>, Option<String>) {
        let url = CString::new(url).unwrap();
        let config = CString::new(config).unwrap();
        let result = scrape_html(html.as_ptr() as *const c_char, html.len(), url.as_ptr(), config.as_ptr());

        let read = |p: *mut c_char| (!p.is_null()).then(|| CStr::from_ptr(p).to_string_lossy().into_owned());
        let out = (read(result.json_ptr), read(result.error_ptr));
        free_scrape_result(result);
        out
    }

    #[test]
    fn test_scrape_html_returns_items() {
        let html = r#"<div class="p"><a href="/item/7">Shoe</a></div>"#;
        let config = r#"{"config": {
            "link": {"element-config": [{"tag": "div", "class": "p"}, {"tag": "a", "href": true}], "attr": "href"},
            "name": {"element-config": [{"tag": "a", "href": true}], "attr": ".text"}
        }}"#;

        let (json, error) = unsafe { call(html, "https://www.shop.com/search?q=x", config) };
        assert_eq!(error, None);
        let value: serde_json::Value = serde_json::from_str(&json.unwrap()).unwrap();
        assert_eq!(value["name"], "Shoe");
        assert_eq!(value["link"], "https://www.shop.com/item/7");
    }

    #[test]
    fn test_scrape_html_reports_bad_config() {
        let (json, error) = unsafe { call("<p></p>", "https://a.com/", r#"{"config": {"x": {}}}"#) };
        assert_eq!(json, None);
        assert!(error.unwrap().contains("x"));

        let (json, error) = unsafe { call("<p></p>", "https://a.com/", "not json") };
        assert_eq!(json, None);
        assert!(error.unwrap().starts_with("Failed to parse website config JSON"));
    }

    #[test]
    fn test_null_pointers() {
        let result = unsafe { scrape_html(ptr::null(), 0, ptr::null(), ptr::null()) };
        assert!(result.json_ptr.is_null());
        let msg = unsafe { CStr::from_ptr(result.error_ptr) }.to_str().unwrap().to_string();
        assert_eq!(msg, "Page URL is null");
        unsafe { free_scrape_result(result) };
    }
}
