//! In-memory item catalog: the demonstration resource served over REST and
//! republished as MCP tools.

pub mod http;
pub mod operations;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::CascadeError;

/// A catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Item {
    pub fn new(id: i64, name: &str, description: &str, price: f64, tags: &[&str]) -> Self {
        Self {
            id,
            name: name.to_string(),
            description: Some(description.to_string()),
            price,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// True when `q` (already lowercased) occurs in the name or description.
    fn matches_text(&self, q: &str) -> bool {
        self.name.to_lowercase().contains(q)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(q))
    }

    /// True when every tag in `wanted` is present on the item.
    fn has_all_tags(&self, wanted: &[String]) -> bool {
        wanted.iter().all(|t| self.tags.contains(t))
    }
}

/// Pagination parameters for listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
        }
    }
}

fn default_limit() -> usize {
    10
}

/// Search filters. All supplied filters must match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SearchParams {
    /// Build from raw query pairs, where `tags` may repeat (`?tags=a&tags=b`).
    /// Unparsable prices are reported as `InvalidRequest`.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> crate::Result<Self> {
        let mut params = SearchParams::default();
        for (key, value) in pairs {
            match key.as_str() {
                "q" if !value.is_empty() => params.q = Some(value),
                "min_price" => params.min_price = Some(parse_price(&key, &value)?),
                "max_price" => params.max_price = Some(parse_price(&key, &value)?),
                "tags" => params.tags.push(value),
                _ => {}
            }
        }
        Ok(params)
    }
}

fn parse_price(key: &str, value: &str) -> crate::Result<f64> {
    value.parse::<f64>().map_err(|_| {
        CascadeError::InvalidRequest(format!("{key} must be a number"))
    })
}

/// The five hardware items the catalog starts with.
pub fn sample_items() -> Vec<Item> {
    vec![
        Item::new(1, "Hammer", "Tool for hammering nails", 9.99, &["tool", "hardware"]),
        Item::new(2, "Screwdriver", "Tool for driving screws", 7.99, &["tool", "hardware"]),
        Item::new(3, "Wrench", "Tool for tightening bolts", 12.99, &["tool", "hardware"]),
        Item::new(4, "Saw", "Tool for cutting wood", 19.99, &["tool", "hardware", "cutting"]),
        Item::new(5, "Drill", "Tool for drilling holes", 49.99, &["tool", "hardware", "power"]),
    ]
}

/// Shared in-memory item map. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct ItemStore {
    items: Arc<RwLock<HashMap<i64, Item>>>,
}

impl ItemStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with [`sample_items`].
    pub fn seeded() -> Self {
        let items = sample_items().into_iter().map(|i| (i.id, i)).collect();
        Self {
            items: Arc::new(RwLock::new(items)),
        }
    }

    /// Page of items ordered by id.
    pub async fn list(&self, params: &ListParams) -> Vec<Item> {
        let items = self.items.read().await;
        let mut all: Vec<Item> = items.values().cloned().collect();
        all.sort_by_key(|i| i.id);
        all.into_iter().skip(params.skip).take(params.limit).collect()
    }

    pub async fn get(&self, id: i64) -> crate::Result<Item> {
        self.items
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(CascadeError::ItemNotFound(id))
    }

    /// Insert `item` under its own id, replacing any existing item.
    pub async fn create(&self, item: Item) -> Item {
        tracing::debug!(item_id = item.id, "creating item");
        self.items.write().await.insert(item.id, item.clone());
        item
    }

    /// Replace the item at `id`. The stored item always carries `id`.
    pub async fn update(&self, id: i64, mut item: Item) -> crate::Result<Item> {
        let mut items = self.items.write().await;
        if !items.contains_key(&id) {
            return Err(CascadeError::ItemNotFound(id));
        }
        item.id = id;
        items.insert(id, item.clone());
        Ok(item)
    }

    pub async fn delete(&self, id: i64) -> crate::Result<()> {
        self.items
            .write()
            .await
            .remove(&id)
            .map(|_| tracing::debug!(item_id = id, "deleted item"))
            .ok_or(CascadeError::ItemNotFound(id))
    }

    /// Items matching every supplied filter, ordered by id.
    pub async fn search(&self, params: &SearchParams) -> Vec<Item> {
        let q = params.q.as_deref().map(str::to_lowercase);
        let items = self.items.read().await;
        let mut found: Vec<Item> = items
            .values()
            .filter(|i| q.as_deref().is_none_or(|q| i.matches_text(q)))
            .filter(|i| params.min_price.is_none_or(|min| i.price >= min))
            .filter(|i| params.max_price.is_none_or(|max| i.price <= max))
            .filter(|i| i.has_all_tags(&params.tags))
            .cloned()
            .collect();
        found.sort_by_key(|i| i.id);
        found
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}
