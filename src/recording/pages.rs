//! Page metadata registry

use dashmap::DashMap;

use crate::har::Page;

/// Pages keyed by identifier; a later observation replaces an earlier one
#[derive(Default)]
pub struct PageRegistry {
    pages: DashMap<String, Page>,
}

impl PageRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite each page; returns how many identifiers were new
    pub fn merge<I>(&self, pages: I) -> usize
    where
        I: IntoIterator<Item = Page>,
    {
        let mut added = 0;
        for page in pages {
            if self.pages.insert(page.id.clone(), page).is_none() {
                added += 1;
            }
        }
        added
    }

    /// Look up one page
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Page> {
        self.pages.get(id).map(|page| page.value().clone())
    }

    /// Number of distinct pages
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether no page has been seen
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// All pages, ordered by start time then identifier
    #[must_use]
    pub fn snapshot(&self) -> Vec<Page> {
        let mut pages: Vec<Page> = self.pages.iter().map(|page| page.value().clone()).collect();
        pages.sort_by(|a, b| {
            a.started_date_time
                .cmp(&b.started_date_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        pages
    }

    /// Forget every page
    pub fn clear(&self) {
        self.pages.clear();
    }
}
