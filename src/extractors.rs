//! Recursive item extraction.
//!
//! Walks an [`ItemConfig`] tree against a parsed document: each item's
//! location path narrows the current node step by step, then a leaf reads
//! one attribute while a branch evaluates its children once per matched
//! element. Items whose selectors match nothing resolve to `None` without
//! affecting their siblings.

mod matcher;
mod value;

pub use matcher::*;
pub use value::*;

use scraper::{ElementRef, Html};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::{AttrKind, ItemConfig, ItemKind, SelectorStep, WebsiteConfig};
use crate::urls::{base_url, fix_url};

/// Extract every configured item of a website from raw HTML.
///
/// Links are fixed against the website's `root` when configured, else
/// against the page origin.
pub fn scrape_page(html: &str, website: &WebsiteConfig, page_url: &str) -> Items {
    let document = Html::parse_document(html);
    let base = website
        .root
        .clone()
        .unwrap_or_else(|| base_url(page_url));

    extract_items(Scope::document(&document), &website.items, &base)
}

/// Evaluate sibling items against one context node.
pub fn extract_items(scope: Scope<'_>, items: &BTreeMap<String, ItemConfig>, base: &str) -> Items {
    items
        .iter()
        .map(|(name, item)| {
            let value = extract_item(scope, item, base);
            if value.is_none() {
                debug!("Item '{}' matched nothing", name);
            }
            (name.clone(), value)
        })
        .collect()
}

/// Evaluate one item against a context node.
pub fn extract_item(scope: Scope<'_>, item: &ItemConfig, base: &str) -> Option<ScrapedValue> {
    match locate(scope, &item.steps)? {
        Located::One(element) => resolve(element, &item.kind, base),
        Located::Many(elements) => {
            let values = elements
                .into_iter()
                .filter_map(|element| resolve(element, &item.kind, base))
                .collect();
            Some(ScrapedValue::List(values))
        }
    }
}

enum Located<'a> {
    One(ElementRef<'a>),
    Many(Vec<ElementRef<'a>>),
}

/// Follow the location path. Any step without a match short-circuits
/// to `None`.
fn locate<'a>(scope: Scope<'a>, steps: &[SelectorStep]) -> Option<Located<'a>> {
    let (last, path) = steps.split_last()?;

    let mut scope = scope;
    for step in path {
        scope = Scope::element(select_one(scope, step)?);
    }

    match last.max {
        Some(max) if last.element_index.is_none() => Some(Located::Many(scope.find_all(last, max))),
        _ => select_one(scope, last).map(Located::One),
    }
}

fn select_one<'a>(scope: Scope<'a>, step: &SelectorStep) -> Option<ElementRef<'a>> {
    match (step.max, step.element_index) {
        (Some(max), Some(index)) => scope.find_all(step, max).into_iter().nth(index),
        _ => scope.find_first(step),
    }
}

fn resolve(element: ElementRef<'_>, kind: &ItemKind, base: &str) -> Option<ScrapedValue> {
    match kind {
        ItemKind::Leaf { attr, alt_attr } => read_attr(element, attr, base)
            .or_else(|| alt_attr.as_ref().and_then(|alt| read_attr(element, alt, base)))
            .map(ScrapedValue::Text),
        ItemKind::Branch { children } => Some(ScrapedValue::Map(extract_items(
            Scope::element(element),
            children,
            base,
        ))),
    }
}

fn read_attr(element: ElementRef<'_>, attr: &AttrKind, base: &str) -> Option<String> {
    match attr {
        AttrKind::Text => Some(element.text().collect::<String>().trim().to_string()),
        AttrKind::Link(name) => element.value().attr(name).map(|raw| fix_url(raw, base)),
        AttrKind::Raw(name) => element.value().attr(name).map(String::from),
    }
}
