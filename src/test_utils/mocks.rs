//! Mock implementations for testing.
//!
//! [`MockProvider`] keeps books and users in memory and implements every
//! repository trait, so a single instance can back a whole [`AppState`].
//! It can be configured to fail, to report itself unhealthy, or to add
//! latency before each call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::app::AppState;
use crate::domain::{
    AppError, Book, BookRepository, ConflictError, DatabaseError, HealthCheck, LendingRepository,
    User, UserRepository,
};

/// Configuration for mock behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// If true, operations will fail.
    pub should_fail: bool,
    /// Custom error message for failures.
    pub error_message: Option<String>,
    /// Simulated latency in milliseconds.
    pub latency_ms: Option<u64>,
}

impl MockConfig {
    /// Creates a config that always succeeds.
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    /// Creates a config that always fails.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
            latency_ms: None,
        }
    }

    /// Adds simulated latency.
    #[must_use]
    pub fn with_latency(mut self, ms: u64) -> Self {
        self.latency_ms = Some(ms);
        self
    }
}

#[derive(Debug, Default)]
struct LibraryState {
    books: Vec<Book>,
    users: Vec<User>,
}

/// In-memory library store.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use library_lending::test_utils::{MockProvider, mock_repos, mocks::MockConfig};
///
/// let mock = Arc::new(MockProvider::new());
/// let (books, users, loans) = mock_repos(&mock);
///
/// let failing = MockProvider::with_config(MockConfig::failure("DB error"));
/// ```
pub struct MockProvider {
    state: Mutex<LibraryState>,
    config: MockConfig,
    call_count: AtomicU64,
    is_healthy: AtomicBool,
}

impl MockProvider {
    /// Creates a new mock with default (success) configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    /// Creates a new mock with the given configuration.
    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            state: Mutex::new(LibraryState::default()),
            config,
            call_count: AtomicU64::new(0),
            is_healthy: AtomicBool::new(true),
        }
    }

    /// Creates a mock that always fails.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    /// Gets the number of times any repository method was called.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Sets the health status.
    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Stores a book directly, bypassing the failure mode.
    pub fn seed_book(&self, book: Book) {
        self.state.lock().unwrap().books.push(book);
    }

    /// Stores a user directly, bypassing the failure mode.
    pub fn seed_user(&self, user: User) {
        self.state.lock().unwrap().users.push(user);
    }

    pub fn book(&self, id: &str) -> Option<Book> {
        let state = self.state.lock().unwrap();
        state.books.iter().find(|b| b.id == id).cloned()
    }

    pub fn user(&self, id: &str) -> Option<User> {
        let state = self.state.lock().unwrap();
        state.users.iter().find(|u| u.id == id).cloned()
    }

    /// Snapshot of every stored book, in insertion order.
    pub fn books(&self) -> Vec<Book> {
        self.state.lock().unwrap().books.clone()
    }

    /// Snapshot of every stored user, in insertion order.
    pub fn users(&self) -> Vec<User> {
        self.state.lock().unwrap().users.clone()
    }

    async fn enter(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);

        if let Some(ms) = self.config.latency_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock database error".to_string());
            return Err(AppError::Database(DatabaseError::Query(msg)));
        }
        Ok(())
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(kind: &str, id: &str) -> AppError {
    AppError::Database(DatabaseError::NotFound(format!("{kind} {id} not found")))
}

#[async_trait]
impl BookRepository for MockProvider {
    async fn insert_book(&self, book: &Book) -> Result<(), AppError> {
        self.enter().await?;

        let mut state = self.state.lock().unwrap();
        if state.books.iter().any(|b| b.id == book.id) {
            return Err(AppError::Database(DatabaseError::Duplicate(book.id.clone())));
        }
        state.books.push(book.clone());
        Ok(())
    }

    async fn find_book_by_id(&self, id: &str) -> Result<Option<Book>, AppError> {
        self.enter().await?;
        Ok(self.book(id))
    }

    async fn find_book_by_title(&self, title: &str) -> Result<Option<Book>, AppError> {
        self.enter().await?;

        let state = self.state.lock().unwrap();
        Ok(state.books.iter().find(|b| b.title == title).cloned())
    }

    async fn list_books(&self) -> Result<Vec<Book>, AppError> {
        self.enter().await?;
        Ok(self.books())
    }
}

#[async_trait]
impl UserRepository for MockProvider {
    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        self.enter().await?;

        let mut state = self.state.lock().unwrap();
        if state.users.iter().any(|u| u.id == user.id) {
            return Err(AppError::Database(DatabaseError::Duplicate(user.id.clone())));
        }
        state.users.push(user.clone());
        Ok(())
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        self.enter().await?;
        Ok(self.user(id))
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.enter().await?;
        Ok(self.users())
    }
}

#[async_trait]
impl LendingRepository for MockProvider {
    async fn record_borrow(
        &self,
        book_id: &str,
        user_id: &str,
        limit: usize,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.enter().await?;

        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let book = state
            .books
            .iter_mut()
            .find(|b| b.id == book_id)
            .ok_or_else(|| missing("book", book_id))?;
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| missing("user", user_id))?;

        // Re-check under the lock; another request may have won the race.
        if book.is_borrowed() || user.holds(book_id) {
            return Err(ConflictError::BookAlreadyBorrowed.into());
        }
        if user.borrowed_count() >= limit {
            return Err(ConflictError::BorrowLimitExceeded(limit).into());
        }

        book.borrow(at);
        user.add_borrowed_book(book_id);
        Ok(())
    }

    async fn record_return(
        &self,
        book_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.enter().await?;

        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let book = state
            .books
            .iter_mut()
            .find(|b| b.id == book_id)
            .ok_or_else(|| missing("book", book_id))?;
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| missing("user", user_id))?;

        if book.is_borrowed() && !user.holds(book_id) {
            return Err(ConflictError::NotBorrowedByUser.into());
        }

        user.remove_borrowed_book(book_id);
        book.mark_returned(at);
        Ok(())
    }
}

#[async_trait]
impl HealthCheck for MockProvider {
    async fn health_check(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);

        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Database(DatabaseError::Connection(
                "Mock database unhealthy".to_string(),
            )));
        }
        Ok(())
    }
}

/// Splits one provider into the repository trait objects the services expect.
pub fn mock_repos(
    mock: &Arc<MockProvider>,
) -> (
    Arc<dyn BookRepository>,
    Arc<dyn UserRepository>,
    Arc<dyn LendingRepository>,
) {
    (
        Arc::clone(mock) as Arc<dyn BookRepository>,
        Arc::clone(mock) as Arc<dyn UserRepository>,
        Arc::clone(mock) as Arc<dyn LendingRepository>,
    )
}

/// Builds a full application state backed by `mock`.
pub fn mock_state(mock: &Arc<MockProvider>) -> Arc<AppState> {
    let (books, users, loans) = mock_repos(mock);
    let health = Arc::clone(mock) as Arc<dyn HealthCheck>;
    Arc::new(AppState::new(books, users, loans, health))
}
