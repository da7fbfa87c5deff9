//! Pagination helper for listing operations

use serde::{Deserialize, Serialize};

/// Offset/limit window applied to list results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub offset: usize,
    /// Unset means no limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Page {
    /// Everything, from the start
    pub fn all() -> Self {
        Page::default()
    }

    pub fn new(offset: usize, limit: usize) -> Self {
        Page {
            offset,
            limit: Some(limit),
        }
    }

    /// Apply the window to an already-ordered result set
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_page_is_identity() {
        let items = vec![1, 2, 3];
        assert_eq!(Page::all().apply(items.clone()), items);
    }

    #[test]
    fn offset_and_limit_window() {
        let items: Vec<i32> = (1..=10).collect();
        assert_eq!(Page::new(2, 3).apply(items.clone()), vec![3, 4, 5]);
        assert_eq!(Page::new(9, 5).apply(items.clone()), vec![10]);
        assert_eq!(Page::new(20, 5).apply(items), Vec::<i32>::new());
    }
}
