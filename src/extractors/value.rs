//! Extracted values

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named items extracted from one context node. A `None` entry is an
/// item whose selectors matched nothing (serialized as `null`).
pub type Items = BTreeMap<String, Option<ScrapedValue>>;

/// Result of extracting one item: a scalar, a mapping of sub-items, or
/// an ordered sequence (document order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScrapedValue {
    Text(String),
    Map(Items),
    List(Vec<ScrapedValue>),
}

impl ScrapedValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Items> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ScrapedValue]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Text of a present scalar sub-item of a mapping.
    pub fn text_at(&self, key: &str) -> Option<&str> {
        self.as_map()?.get(key)?.as_ref()?.as_text()
    }
}

impl From<String> for ScrapedValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}
