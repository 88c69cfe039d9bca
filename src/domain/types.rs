use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Opaque identifier of a book, e.g. `book_6f1c...`.
pub type BookId = String;

/// Opaque identifier of a library member, e.g. `user_91ad...`.
pub type UserId = String;

pub const BOOK_ADDED_MESSAGE: &str = "Book added successfully";
pub const BOOK_BORROWED_MESSAGE: &str = "Book borrowed successfully";
pub const BOOK_RETURNED_MESSAGE: &str = "Book returned successfully";

/// Generates a fresh book identifier.
#[must_use]
pub fn new_book_id() -> BookId {
    format!("book_{}", uuid::Uuid::new_v4())
}

/// Generates a fresh user identifier.
#[must_use]
pub fn new_user_id() -> UserId {
    format!("user_{}", uuid::Uuid::new_v4())
}

/// Book as held in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub borrowed: bool,
    pub borrowed_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Book {
    /// Creates an available book with a freshly generated id.
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: new_book_id(),
            title: title.into(),
            author: author.into(),
            borrowed: false,
            borrowed_at: None,
            returned_at: None,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_borrowed(&self) -> bool {
        self.borrowed
    }

    /// Marks the book as borrowed at `at`. The caller is responsible for the
    /// availability check; see [`crate::domain::LendingPolicy`].
    pub fn borrow(&mut self, at: DateTime<Utc>) {
        self.borrowed = true;
        self.borrowed_at = Some(at);
    }

    /// Marks the book as available again. `borrowed_at` keeps the last borrow time.
    pub fn mark_returned(&mut self, at: DateTime<Utc>) {
        self.borrowed = false;
        self.returned_at = Some(at);
    }
}

/// Library member and the books they currently hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub borrowed_book_ids: Vec<BookId>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_user_id(),
            name: name.into(),
            borrowed_book_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn borrowed_count(&self) -> usize {
        self.borrowed_book_ids.len()
    }

    #[must_use]
    pub fn holds(&self, book_id: &str) -> bool {
        self.borrowed_book_ids.iter().any(|id| id == book_id)
    }

    /// Appends `book_id` unless it is already held. Returns whether the list changed.
    pub fn add_borrowed_book(&mut self, book_id: &str) -> bool {
        if self.holds(book_id) {
            return false;
        }
        self.borrowed_book_ids.push(book_id.to_string());
        true
    }

    /// Removes `book_id`, preserving the order of the remaining ids.
    /// Returns whether the list changed.
    pub fn remove_borrowed_book(&mut self, book_id: &str) -> bool {
        let before = self.borrowed_book_ids.len();
        self.borrowed_book_ids.retain(|id| id != book_id);
        self.borrowed_book_ids.len() != before
    }
}

fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        let mut err = validator::ValidationError::new("blank");
        err.message = Some(Cow::Borrowed("must not be blank"));
        return Err(err);
    }
    Ok(())
}

/// Request payload for adding a book to the catalog.
///
/// Missing fields deserialize to empty strings so that they are reported as
/// validation errors rather than body rejections.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddBookRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"), length(max = 255))]
    pub title: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank"), length(max = 255))]
    pub author: String,
}

impl AddBookRequest {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
        }
    }
}

/// Request payload for registering a library member.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"), length(max = 255))]
    pub name: String,
}

impl CreateUserRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Request payload shared by the borrow and return operations.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LendingRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub book_title: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub user_id: UserId,
}

impl LendingRequest {
    pub fn new(book_title: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            book_title: book_title.into(),
            user_id: user_id.into(),
        }
    }
}

/// Serialized projection of a [`Book`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BookView {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub is_borrowed: bool,
    pub borrowed_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl From<Book> for BookView {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            is_borrowed: book.borrowed,
            borrowed_at: book.borrowed_at,
            returned_at: book.returned_at,
        }
    }
}

/// Serialized projection of a [`User`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub name: String,
    pub borrowed_books: Vec<BookId>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            borrowed_books: user.borrowed_book_ids,
        }
    }
}

/// `{ "message": ... }` body returned by command endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Health check status for services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Health check response for the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub database: HealthStatus,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn new(database: HealthStatus) -> Self {
        Self {
            status: database.clone(),
            database,
            timestamp: Utc::now(),
        }
    }
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub r#type: String,
    pub message: String,
    pub status: u16,
}

/// Body of a 429 response produced by the rate limiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitResponse {
    pub error: ErrorDetail,
    pub retry_after: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_creation() {
        let book = Book::new("Dune", "Herbert");

        assert!(book.id.starts_with("book_"));
        assert_eq!(book.title, "Dune");
        assert_eq!(book.author, "Herbert");
        assert!(!book.is_borrowed());
        assert!(book.borrowed_at.is_none());
        assert!(book.returned_at.is_none());
    }

    #[test]
    fn test_book_ids_are_unique() {
        let a = Book::new("Dune", "Herbert");
        let b = Book::new("Dune", "Herbert");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_book_borrow_and_return_stamps() {
        let mut book = Book::new("Dune", "Herbert");
        let borrowed_at = Utc::now();

        book.borrow(borrowed_at);
        assert!(book.is_borrowed());
        assert_eq!(book.borrowed_at, Some(borrowed_at));

        let returned_at = Utc::now();
        book.mark_returned(returned_at);
        assert!(!book.is_borrowed());
        assert_eq!(book.returned_at, Some(returned_at));
        // Last borrow time is kept for history
        assert_eq!(book.borrowed_at, Some(borrowed_at));
    }

    #[test]
    fn test_user_add_borrowed_book_rejects_duplicates() {
        let mut user = User::new("Alice");
        assert!(user.id.starts_with("user_"));

        assert!(user.add_borrowed_book("book_1"));
        assert!(!user.add_borrowed_book("book_1"));
        assert_eq!(user.borrowed_book_ids, vec!["book_1".to_string()]);
    }

    #[test]
    fn test_user_remove_borrowed_book_keeps_order() {
        let mut user = User::new("Alice");
        user.add_borrowed_book("book_1");
        user.add_borrowed_book("book_2");
        user.add_borrowed_book("book_3");

        assert!(user.remove_borrowed_book("book_2"));
        assert_eq!(
            user.borrowed_book_ids,
            vec!["book_1".to_string(), "book_3".to_string()]
        );

        // Removing something not held is a no-op
        assert!(!user.remove_borrowed_book("book_9"));
        assert_eq!(user.borrowed_count(), 2);
    }

    #[test]
    fn test_add_book_request_validation() {
        assert!(AddBookRequest::new("Dune", "Herbert").validate().is_ok());
        assert!(AddBookRequest::new("", "Herbert").validate().is_err());
        assert!(AddBookRequest::new("Dune", "   ").validate().is_err());
        assert!(AddBookRequest::new("x".repeat(256), "Herbert").validate().is_err());
    }

    #[test]
    fn test_add_book_request_missing_fields_deserialize_as_blank() {
        let request: AddBookRequest = serde_json::from_str(r#"{"title":"Dune"}"#).unwrap();
        assert_eq!(request.author, "");

        let errors = request.validate().unwrap_err().to_string();
        assert!(errors.contains("author"));
        assert!(!errors.contains("title"));
    }

    #[test]
    fn test_create_user_request_validation() {
        assert!(CreateUserRequest::new("Alice").validate().is_ok());
        assert!(CreateUserRequest::new("").validate().is_err());
    }

    #[test]
    fn test_lending_request_uses_camel_case() {
        let request: LendingRequest =
            serde_json::from_str(r#"{"bookTitle":"Dune","userId":"user_1"}"#).unwrap();
        assert_eq!(request.book_title, "Dune");
        assert_eq!(request.user_id, "user_1");
        assert!(request.validate().is_ok());

        let blank: LendingRequest = serde_json::from_str(r#"{"bookTitle":"Dune"}"#).unwrap();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_book_view_serialization() {
        let mut book = Book::new("Dune", "Herbert");
        book.borrow(Utc::now());

        let json = serde_json::to_value(BookView::from(book.clone())).unwrap();
        assert_eq!(json["id"], book.id);
        assert_eq!(json["title"], "Dune");
        assert_eq!(json["author"], "Herbert");
        assert_eq!(json["isBorrowed"], true);
        assert!(json["borrowedAt"].is_string());
        assert!(json["returnedAt"].is_null());
    }

    #[test]
    fn test_user_view_serialization() {
        let mut user = User::new("Alice");
        user.add_borrowed_book("book_1");

        let json = serde_json::to_value(UserView::from(user.clone())).unwrap();
        assert_eq!(json["id"], user.id);
        assert_eq!(json["name"], "Alice");
        assert_eq!(json["borrowedBooks"], serde_json::json!(["book_1"]));
    }

    #[test]
    fn test_health_response_follows_database() {
        let response = HealthResponse::new(HealthStatus::Healthy);
        assert_eq!(response.status, HealthStatus::Healthy);

        let response = HealthResponse::new(HealthStatus::Unhealthy);
        assert_eq!(response.status, HealthStatus::Unhealthy);
    }
}
