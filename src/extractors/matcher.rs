//! Tag + attribute element matching over a parsed document.

use scraper::{ElementRef, Html};

use crate::config::{AttrMatch, SelectorStep};

/// Where a selector step searches. Searching a document also considers
/// the root element itself; searching an element only its descendants.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    element: ElementRef<'a>,
    inclusive: bool,
}

impl<'a> Scope<'a> {
    pub fn document(document: &'a Html) -> Self {
        Self {
            element: document.root_element(),
            inclusive: true,
        }
    }

    pub fn element(element: ElementRef<'a>) -> Self {
        Self {
            element,
            inclusive: false,
        }
    }

    fn candidates(self) -> impl Iterator<Item = ElementRef<'a>> {
        let skip = usize::from(!self.inclusive);
        self.element
            .descendants()
            .skip(skip)
            .filter_map(ElementRef::wrap)
    }

    /// First matching element in document order.
    pub fn find_first(self, step: &SelectorStep) -> Option<ElementRef<'a>> {
        self.candidates().find(|el| matches_step(el, step))
    }

    /// Up to `limit` matching elements in document order; a limit of 0
    /// means no limit.
    pub fn find_all(self, step: &SelectorStep, limit: usize) -> Vec<ElementRef<'a>> {
        let limit = if limit == 0 { usize::MAX } else { limit };
        self.candidates()
            .filter(|el| matches_step(el, step))
            .take(limit)
            .collect()
    }
}

pub fn matches_step(element: &ElementRef<'_>, step: &SelectorStep) -> bool {
    element.value().name().eq_ignore_ascii_case(&step.tag) && matches_attr(element, &step.attr)
}

/// `class` matches the whole attribute or any single class token;
/// other attributes must match exactly.
fn matches_attr(element: &ElementRef<'_>, attr: &AttrMatch) -> bool {
    let Some(actual) = element.value().attr(&attr.name) else {
        return false;
    };
    let Some(expected) = attr.value.as_deref() else {
        return true;
    };

    if actual == expected {
        return true;
    }
    attr.name.eq_ignore_ascii_case("class") && actual.split_whitespace().any(|token| token == expected)
}
