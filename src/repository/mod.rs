//! Persistence boundary for orders.
//!
//! Only implementations of [`OrderRepository`] write to storage. "Absent" is always a value
//! (`Ok(None)` or [`RepoError::NotFound`]), never a storage fault.

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    models::{CreateOrderEntity, OrderChangeset, OrderEntity},
    status::OrderStatus,
};

pub mod pg;

pub use pg::PgOrderRepository;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum RepoError {
    /// No live row matched the key (and, for updates, the expected status).
    #[error("order not found")]
    NotFound,

    #[error("order number {0} already exists")]
    Conflict(String),

    #[error("storage failure during {op} ({key})")]
    Storage {
        op: &'static str,
        key: String,
        #[source]
        source: BoxError,
    },
}

impl RepoError {
    pub fn storage(op: &'static str, key: impl ToString, source: impl Into<BoxError>) -> Self {
        RepoError::Storage {
            op,
            key: key.to_string(),
            source: source.into(),
        }
    }
}

/// A validated page request: `page >= 1`, `1 <= page_size <= MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: i64,
    page_size: i64,
}

impl PageRequest {
    pub const DEFAULT_PAGE_SIZE: i64 = 10;
    pub const MAX_PAGE_SIZE: i64 = 100;

    /// Normalises raw query values the way the app has always done: a page below 1 becomes 1,
    /// a page size below 1 falls back to the default and anything above the cap is clamped.
    pub fn normalize(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let page_size = match page_size.unwrap_or(Self::DEFAULT_PAGE_SIZE) {
            size if size < 1 => Self::DEFAULT_PAGE_SIZE,
            size => size.min(Self::MAX_PAGE_SIZE),
        };
        Self { page, page_size }
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::normalize(None, None)
    }
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts a new order. A duplicate `order_no` is a [`RepoError::Conflict`].
    async fn create(&self, order: CreateOrderEntity) -> Result<OrderEntity, RepoError>;

    async fn find_by_order_no(&self, order_no: &str) -> Result<Option<OrderEntity>, RepoError>;

    /// Orders owned by `user_id`, newest first, plus the total matching count.
    async fn find_by_user(
        &self,
        user_id: i64,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<(Vec<OrderEntity>, i64), RepoError>;

    /// Applies `changes` to the order only while it is still in `expected` status.
    /// Zero affected rows is reported as [`RepoError::NotFound`].
    async fn update_fields(
        &self,
        order_no: &str,
        expected: OrderStatus,
        changes: OrderChangeset,
    ) -> Result<(), RepoError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults() {
        let page = PageRequest::default();
        assert_eq!((page.page(), page.page_size(), page.offset()), (1, 10, 0));
    }

    #[test]
    fn test_page_normalisation() {
        assert_eq!(PageRequest::normalize(Some(0), Some(0)), PageRequest::default());
        assert_eq!(PageRequest::normalize(Some(-3), Some(-1)).page(), 1);
        assert_eq!(PageRequest::normalize(Some(2), Some(500)).page_size(), 100);

        let page = PageRequest::normalize(Some(3), Some(20));
        assert_eq!(page.offset(), 40);
    }
}
