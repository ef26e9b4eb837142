//! Pagination result model.

use serde::Serialize;

/// One window of a paginated query plus the total number of matching rows.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Rows matching the base query, ignoring the window
    pub total_count: u64,
    /// 1-based page number actually used
    pub page_number: u64,
    pub page_size: u64,
}

impl<T> Page<T> {
    /// Number of pages needed to hold `total_count` rows.
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total_count.div_ceil(self.page_size)
    }

    pub fn has_next(&self) -> bool {
        self.page_number < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page_number > 1
    }

    /// Transform the items, keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page_number: self.page_number,
            page_size: self.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(total_count: u64, page_number: u64) -> Page<u8> {
        Page {
            items: Vec::new(),
            total_count,
            page_number,
            page_size: 10,
        }
    }

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(page(25, 1).total_pages(), 3);
        assert_eq!(page(20, 1).total_pages(), 2);
        assert_eq!(page(0, 1).total_pages(), 0);
    }

    #[test]
    fn test_navigation() {
        assert!(page(25, 2).has_next());
        assert!(!page(25, 3).has_next());
        assert!(page(25, 2).has_previous());
        assert!(!page(25, 1).has_previous());
    }
}
