//! Selection of which declared operations are exposed as tools.
//!
//! Operation filters and tag filters each come in an include or exclude form;
//! the two forms of one kind cannot be combined. When an operation filter and
//! a tag filter are both present, an operation matching either is exposed.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::error::CascadeError;
use crate::items::operations::Operation;

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct OperationFilter {
    #[serde(default)]
    pub include_operations: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_operations: Option<Vec<String>>,
    #[serde(default)]
    pub include_tags: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_tags: Option<Vec<String>>,
}

impl OperationFilter {
    pub fn is_empty(&self) -> bool {
        self.include_operations.is_none()
            && self.exclude_operations.is_none()
            && self.include_tags.is_none()
            && self.exclude_tags.is_none()
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.include_operations.is_some() && self.exclude_operations.is_some() {
            return Err(CascadeError::InvalidConfig(
                "operation filter".to_string(),
                "cannot combine include_operations and exclude_operations".to_string(),
            ));
        }
        if self.include_tags.is_some() && self.exclude_tags.is_some() {
            return Err(CascadeError::InvalidConfig(
                "operation filter".to_string(),
                "cannot combine include_tags and exclude_tags".to_string(),
            ));
        }
        Ok(())
    }

    /// Ids of the operations in `ops` that pass this filter.
    pub fn select(&self, ops: &[Operation]) -> BTreeSet<&'static str> {
        let all: BTreeSet<&'static str> = ops.iter().map(|op| op.id).collect();
        if self.is_empty() {
            return all;
        }

        let mut selected = BTreeSet::new();

        if let Some(include) = &self.include_operations {
            selected.extend(all.iter().copied().filter(|id| include.iter().any(|i| i.as_str() == *id)));
        } else if let Some(exclude) = &self.exclude_operations {
            selected.extend(all.iter().copied().filter(|id| !exclude.iter().any(|e| e.as_str() == *id)));
        }

        let has_tag = |op: &Operation, tags: &[String]| {
            op.tags.iter().any(|t| tags.iter().any(|w| w.as_str() == *t))
        };
        if let Some(include) = &self.include_tags {
            selected.extend(ops.iter().filter(|op| has_tag(*op, include.as_slice())).map(|op| op.id));
        } else if let Some(exclude) = &self.exclude_tags {
            selected.extend(ops.iter().filter(|op| !has_tag(*op, exclude.as_slice())).map(|op| op.id));
        }

        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::operations::OPERATIONS;

    fn strings(list: &[&str]) -> Option<Vec<String>> {
        Some(list.iter().map(|s| s.to_string()).collect())
    }

    fn ids(set: BTreeSet<&'static str>) -> Vec<&'static str> {
        set.into_iter().collect()
    }

    #[test]
    fn test_empty_filter_selects_all() {
        let filter = OperationFilter::default();
        assert_eq!(filter.select(OPERATIONS).len(), OPERATIONS.len());
    }

    #[test]
    fn test_include_operations() {
        let filter = OperationFilter {
            include_operations: strings(&["get_item", "list_items"]),
            ..Default::default()
        };
        assert_eq!(ids(filter.select(OPERATIONS)), vec!["get_item", "list_items"]);
    }

    #[test]
    fn test_exclude_operations() {
        let filter = OperationFilter {
            exclude_operations: strings(&["create_item", "update_item", "delete_item"]),
            ..Default::default()
        };
        assert_eq!(
            ids(filter.select(OPERATIONS)),
            vec!["get_item", "list_items", "search_items"]
        );
    }

    #[test]
    fn test_exclude_tags() {
        let filter = OperationFilter {
            exclude_tags: strings(&["search"]),
            ..Default::default()
        };
        let selected = filter.select(OPERATIONS);
        assert_eq!(selected.len(), 5);
        assert!(!selected.contains("search_items"));
    }

    #[test]
    fn test_combined_include_is_union() {
        let filter = OperationFilter {
            include_operations: strings(&["delete_item"]),
            include_tags: strings(&["search"]),
            ..Default::default()
        };
        assert_eq!(ids(filter.select(OPERATIONS)), vec!["delete_item", "search_items"]);
    }

    #[test]
    fn test_conflicting_filters_rejected() {
        let ops = OperationFilter {
            include_operations: strings(&["a"]),
            exclude_operations: strings(&["b"]),
            ..Default::default()
        };
        assert!(ops.validate().is_err());

        let tags = OperationFilter {
            include_tags: strings(&["a"]),
            exclude_tags: strings(&["b"]),
            ..Default::default()
        };
        assert!(tags.validate().is_err());
    }
}
