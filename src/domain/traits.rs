//! Domain traits defining contracts for the persistence layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::AppError;
use super::types::{Book, User};

/// Storage of catalog books.
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Persist a newly created book.
    async fn insert_book(&self, book: &Book) -> Result<(), AppError>;

    /// Get a single book by ID
    async fn find_book_by_id(&self, id: &str) -> Result<Option<Book>, AppError>;

    /// Exact-match lookup by title. When several copies share a title the
    /// oldest one is returned.
    async fn find_book_by_title(&self, title: &str) -> Result<Option<Book>, AppError>;

    /// All books in storage order
    async fn list_books(&self) -> Result<Vec<Book>, AppError>;
}

/// Storage of library members.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<(), AppError>;

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, AppError>;

    async fn list_users(&self) -> Result<Vec<User>, AppError>;
}

/// Atomic persistence of lending transitions.
///
/// Implementations apply the book and user mutations of a transition as one
/// unit and re-check the lending rules against the stored state while doing
/// so. A rule that no longer holds (another request won the race) is reported
/// as the matching [`crate::domain::ConflictError`] and nothing is persisted.
#[async_trait]
pub trait LendingRepository: Send + Sync {
    /// Mark the book borrowed and append it to the user's list, provided the
    /// book is still available and the user holds fewer than `limit` books.
    async fn record_borrow(
        &self,
        book_id: &str,
        user_id: &str,
        limit: usize,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Mark the book available and drop it from the user's list, provided the
    /// book is not held by someone else.
    async fn record_return(
        &self,
        book_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;
}

/// Connectivity probe for the backing store.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;
}
