use serde::de::DeserializeOwned;

use crate::errors::Error;
use crate::query::builder::Query;

/// Converts a page number and page size into skip/limit on a privately
/// cloned query, clamping the page to the available range.
pub struct Paginator<M> {
    current_page: u64,
    items_on_page: u64,
    total_rows: Option<u64>,
    query: Query<M>,
}

impl<M: DeserializeOwned> Paginator<M> {
    pub const DEFAULT_ITEMS_ON_PAGE: u64 = 30;

    /// Wraps a clone of the caller's query; the caller's own builder stays
    /// untouched by pagination.
    #[must_use]
    pub fn new(query: Query<M>) -> Self {
        Self {
            current_page: 1,
            items_on_page: Self::DEFAULT_ITEMS_ON_PAGE,
            total_rows: None,
            query,
        }
    }

    /// # Errors
    /// Store-level failures from the lazily computed row count.
    pub fn set_items_on_page(&mut self, items_on_page: u64) -> Result<(), Error> {
        self.items_on_page = items_on_page.max(1);
        self.apply_limits()
    }

    /// # Errors
    /// Store-level failures from the lazily computed row count.
    pub fn set_current_page(&mut self, current_page: u64) -> Result<(), Error> {
        self.current_page = current_page.max(1);
        self.apply_limits()
    }

    /// The page number actually served: clamped to `[1, total_pages]`, and
    /// 1 when there are no rows at all.
    ///
    /// # Errors
    /// Store-level failures from the lazily computed row count.
    pub fn current_page(&mut self) -> Result<u64, Error> {
        let total_pages = self.total_pages_count()?;
        if total_pages == 0 {
            return Ok(1);
        }
        Ok(self.current_page.min(total_pages))
    }

    /// Computed once on first demand and cached for this paginator's
    /// lifetime; later store mutations are not reflected.
    ///
    /// # Errors
    /// Store-level failures from the count.
    pub fn total_rows_count(&mut self) -> Result<u64, Error> {
        if let Some(total) = self.total_rows {
            return Ok(total);
        }
        let total = self.query.count()?;
        self.total_rows = Some(total);
        Ok(total)
    }

    /// # Errors
    /// Store-level failures from the lazily computed row count.
    pub fn total_pages_count(&mut self) -> Result<u64, Error> {
        Ok(self.total_rows_count()?.div_ceil(self.items_on_page))
    }

    #[must_use]
    pub fn items_on_page(&self) -> u64 {
        self.items_on_page
    }

    /// The wrapped query, carrying the derived skip and limit.
    #[must_use]
    pub fn query(&self) -> &Query<M> {
        &self.query
    }

    // The clamped page drives skip/limit, not the raw input.
    fn apply_limits(&mut self) -> Result<(), Error> {
        let page = self.current_page()?;
        self.query.set_limit(self.items_on_page);
        self.query.set_skip((page - 1) * self.items_on_page);
        Ok(())
    }
}

impl<M: DeserializeOwned> Iterator for Paginator<M> {
    type Item = Result<M, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.query.next_record()
    }
}
