//! Scraping configuration.
//!
//! The per-website selector config is authored as nested JSON mappings and
//! parsed once into a typed tree ([`ItemConfig`]), so a malformed config is
//! rejected at load time instead of surfacing halfway through a run.
//!
//! ```json
//! {
//!   "ebay": {
//!     "root": "https://www.ebay.com",
//!     "type": "item-locate",
//!     "config": {
//!       "listings": {
//!         "element-config": [
//!           {"tag": "ul", "class": "srp-results"},
//!           {"tag": "li", "class": "s-item", "max": 50}
//!         ],
//!         "title": {"element-config": [{"tag": "span", "role": "heading"}], "attr": ".text"},
//!         "link": {"element-config": [{"tag": "a", "class": "s-item__link"}], "attr": "href"}
//!       }
//!     }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, ScrapeError};
use crate::urls::website_name;

const TAG: &str = "tag";
const MAX: &str = "max";
const ELEMENT_INDEX: &str = "element-index";
const ELEMENT_CONFIG: &str = "element-config";
const ATTR: &str = "attr";
const ALT_ATTR: &str = "alt-attr";
const SUB_ITEMS: &str = "sub-items";
const ITEM_NAME: &str = "item";

/// Attribute predicate of a selector step. `value: None` only requires
/// the attribute to be present (authored as `true`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrMatch {
    pub name: String,
    pub value: Option<String>,
}

/// One tag + attribute match step of a location path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorStep {
    pub tag: String,
    pub attr: AttrMatch,
    /// Match up to `max` elements instead of the first one.
    pub max: Option<usize>,
    /// With `max`, keep only this element of the matched set.
    pub element_index: Option<usize>,
}

impl SelectorStep {
    /// Whether this step yields a sequence rather than a single node.
    pub fn is_multi(&self) -> bool {
        self.max.is_some() && self.element_index.is_none()
    }
}

/// What a leaf reads from its final node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrKind {
    /// `.text`: trimmed inner text
    Text,
    /// `href` / `src`: a link, fixed against the base URL
    Link(String),
    /// Any other attribute, returned raw
    Raw(String),
}

impl AttrKind {
    pub fn parse(name: &str) -> Self {
        match name {
            ".text" => Self::Text,
            "href" | "src" => Self::Link(name.to_string()),
            other => Self::Raw(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    Leaf {
        attr: AttrKind,
        alt_attr: Option<AttrKind>,
    },
    Branch {
        children: BTreeMap<String, ItemConfig>,
    },
}

/// One named item to extract: a location path plus either a terminal
/// attribute (leaf) or nested named items (branch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemConfig {
    pub steps: Vec<SelectorStep>,
    pub kind: ItemKind,
}

impl ItemConfig {
    /// Whether the location path ends in a multi-element step.
    pub fn yields_sequence(&self) -> bool {
        self.steps.last().is_some_and(SelectorStep::is_multi)
    }
}

/// Scraping config of a single website.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WebsiteConfig {
    /// Overrides the page origin as the base URL for `href`/`src` fixing.
    pub root: Option<String>,
    pub search_command: Option<String>,
    /// Free-form page type label (`item-locate`, `item-page`, ...).
    pub kind: Option<String>,
    pub items: BTreeMap<String, ItemConfig>,
}

impl WebsiteConfig {
    pub fn from_value(name: &str, value: &Value) -> Result<Self> {
        let obj = as_object(name, value)?;

        let items_value = obj
            .get("config")
            .or_else(|| obj.get("scraping-config"))
            .ok_or_else(|| ScrapeError::config(name, "missing 'config' mapping"))?;
        let items_path = format!("{name}.config");
        let mut items = BTreeMap::new();
        for (item_name, item) in as_object(&items_path, items_value)? {
            let path = format!("{items_path}.{item_name}");
            items.insert(item_name.clone(), ItemConfig::from_value(&path, item)?);
        }

        Ok(Self {
            root: optional_string(name, obj, "root")?,
            search_command: optional_string(name, obj, "search-command")?,
            kind: optional_string(name, obj, "type")?,
            items,
        })
    }
}

/// Scraping configs keyed by website identifier (see
/// [`website_name`](crate::urls::website_name)) or by bare host.
#[derive(Debug, Clone, Default)]
pub struct ScrapingConfig {
    websites: HashMap<String, Arc<WebsiteConfig>>,
}

impl ScrapingConfig {
    pub fn from_value(value: &Value) -> Result<Self> {
        let mut websites = HashMap::new();
        for (name, website) in as_object("<root>", value)? {
            websites.insert(name.clone(), Arc::new(WebsiteConfig::from_value(name, website)?));
        }
        Ok(Self { websites })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_value(&serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn insert(&mut self, name: impl Into<String>, website: WebsiteConfig) {
        self.websites.insert(name.into(), Arc::new(website));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<WebsiteConfig>> {
        self.websites.get(name)
    }

    /// Config for a page URL: by website identifier first, then by host.
    pub fn for_url(&self, url: &str) -> Option<&Arc<WebsiteConfig>> {
        self.websites.get(&website_name(url)).or_else(|| {
            let host = url::Url::parse(url).ok()?.host_str()?.to_lowercase();
            self.websites.get(&host)
        })
    }

    pub fn len(&self) -> usize {
        self.websites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.websites.is_empty()
    }
}

impl ItemConfig {
    pub fn from_value(path: &str, value: &Value) -> Result<Self> {
        let obj = as_object(path, value)?;

        let steps_value = obj
            .get(ELEMENT_CONFIG)
            .ok_or_else(|| ScrapeError::config(path, "missing 'element-config'"))?;
        let steps_value = steps_value
            .as_array()
            .ok_or_else(|| ScrapeError::config(path, "'element-config' must be a list"))?;
        if steps_value.is_empty() {
            return Err(ScrapeError::config(path, "'element-config' is empty"));
        }
        let last = steps_value.len() - 1;
        let steps = steps_value
            .iter()
            .enumerate()
            .map(|(i, step)| {
                let step_path = format!("{path}.{ELEMENT_CONFIG}[{i}]");
                let step = SelectorStep::from_value(&step_path, step)?;
                if i != last && step.is_multi() {
                    return Err(ScrapeError::config(
                        step_path,
                        "'max' without 'element-index' is only allowed on the last step",
                    ));
                }
                Ok(step)
            })
            .collect::<Result<Vec<_>>>()?;

        let attr = optional_string(path, obj, ATTR)?;
        let alt_attr = optional_string(path, obj, ALT_ATTR)?;
        let children = parse_children(path, obj)?;

        let kind = match (attr, children.is_empty()) {
            (Some(_), false) => {
                return Err(ScrapeError::config(
                    path,
                    "an item has either 'attr' or sub-items, not both",
                ))
            }
            (None, true) => {
                return Err(ScrapeError::config(path, "an item needs 'attr' or sub-items"))
            }
            (Some(attr), true) => ItemKind::Leaf {
                attr: AttrKind::parse(&attr),
                alt_attr: alt_attr.as_deref().map(AttrKind::parse),
            },
            (None, false) => {
                if alt_attr.is_some() {
                    return Err(ScrapeError::config(path, "'alt-attr' requires 'attr'"));
                }
                ItemKind::Branch { children }
            }
        };

        Ok(Self { steps, kind })
    }
}

fn parse_children(path: &str, obj: &Map<String, Value>) -> Result<BTreeMap<String, ItemConfig>> {
    let mut children = BTreeMap::new();

    for (key, value) in obj {
        match key.as_str() {
            ELEMENT_CONFIG | ATTR | ALT_ATTR | ITEM_NAME => {}
            SUB_ITEMS => match value {
                Value::Object(named) => {
                    for (name, item) in named {
                        let child_path = format!("{path}.{name}");
                        children.insert(name.clone(), ItemConfig::from_value(&child_path, item)?);
                    }
                }
                Value::Array(list) => {
                    for (i, item) in list.iter().enumerate() {
                        let name = item
                            .get(ITEM_NAME)
                            .and_then(Value::as_str)
                            .ok_or_else(|| {
                                ScrapeError::config(
                                    format!("{path}.{SUB_ITEMS}[{i}]"),
                                    "listed sub-item needs an 'item' name",
                                )
                            })?;
                        let child_path = format!("{path}.{name}");
                        children.insert(name.to_string(), ItemConfig::from_value(&child_path, item)?);
                    }
                }
                _ => {
                    return Err(ScrapeError::config(
                        path,
                        "'sub-items' must be a mapping or a list",
                    ))
                }
            },
            name => {
                let child_path = format!("{path}.{name}");
                if !value.is_object() {
                    return Err(ScrapeError::config(child_path, "unexpected non-item key"));
                }
                children.insert(name.to_string(), ItemConfig::from_value(&child_path, value)?);
            }
        }
    }

    Ok(children)
}

impl SelectorStep {
    pub fn from_value(path: &str, value: &Value) -> Result<Self> {
        let obj = as_object(path, value)?;

        let tag = obj
            .get(TAG)
            .and_then(Value::as_str)
            .ok_or_else(|| ScrapeError::config(path, "missing string 'tag'"))?
            .to_string();
        let max = optional_index(path, obj, MAX)?;
        let element_index = optional_index(path, obj, ELEMENT_INDEX)?;
        if element_index.is_some() && max.is_none() {
            return Err(ScrapeError::config(path, "'element-index' requires 'max'"));
        }

        let matchers: Vec<(&String, &Value)> = obj
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), TAG | MAX | ELEMENT_INDEX))
            .collect();
        let [(name, value)] = matchers.as_slice() else {
            return Err(ScrapeError::config(
                path,
                format!("expected exactly one attribute-match key, found {}", matchers.len()),
            ));
        };
        let value = match value {
            Value::String(s) => Some(s.clone()),
            Value::Bool(true) => None,
            Value::Number(n) => Some(n.to_string()),
            _ => {
                return Err(ScrapeError::config(
                    format!("{path}.{name}"),
                    "attribute match must be a string, number or true",
                ))
            }
        };

        Ok(Self {
            tag,
            attr: AttrMatch {
                name: (*name).clone(),
                value,
            },
            max,
            element_index,
        })
    }
}

fn as_object<'a>(path: &str, value: &'a Value) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ScrapeError::config(path, "expected a mapping"))
}

fn optional_string(path: &str, obj: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ScrapeError::config(format!("{path}.{key}"), "expected a string")),
    }
}

fn optional_index(path: &str, obj: &Map<String, Value>, key: &str) -> Result<Option<usize>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| ScrapeError::config(format!("{path}.{key}"), "expected a non-negative integer")),
    }
}

/// Settings of one scraping run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub request_timeout: Duration,
    pub cookie_path: PathBuf,
    /// Hosts routed to the browser-fingerprinted transport.
    pub evasive_hosts: Vec<String>,
    /// Extraction threads; `None` uses `min(batch_size, available cores)`.
    pub extraction_workers: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            cookie_path: PathBuf::from("cookies.json"),
            evasive_hosts: Vec::new(),
            extraction_workers: None,
        }
    }
}

impl RunConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_cookie_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookie_path = path.into();
        self
    }

    pub fn with_evasive_host(mut self, host: impl Into<String>) -> Self {
        self.evasive_hosts.push(host.into());
        self
    }

    pub fn with_extraction_workers(mut self, workers: usize) -> Self {
        self.extraction_workers = Some(workers);
        self
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.extraction_workers.unwrap_or_else(|| {
            let cores = std::thread::available_parallelism().map_or(1, usize::from);
            self.batch_size.clamp(1, cores)
        })
    }
}
