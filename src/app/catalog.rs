//! Catalog service: adding and looking up books.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::{AddBookRequest, AppError, Book, BookRepository, ValidationError};

/// Application service owning book records.
pub struct CatalogService {
    books: Arc<dyn BookRepository>,
}

impl CatalogService {
    #[must_use]
    pub fn new(books: Arc<dyn BookRepository>) -> Self {
        Self { books }
    }

    /// Validates the request and persists a new, available book.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` when the title or author is blank, or a
    /// database error if the insert fails.
    #[instrument(skip(self, request), fields(title = %request.title))]
    pub async fn add_book(&self, request: &AddBookRequest) -> Result<Book, AppError> {
        request.validate().map_err(|e| {
            warn!(error = %e, "Validation failed for add book request");
            AppError::Validation(ValidationError::Multiple(e.to_string()))
        })?;

        let book = Book::new(request.title.trim(), request.author.trim());
        self.books.insert_book(&book).await?;

        metrics::counter!("library_books_added").increment(1);
        info!(book_id = %book.id, "Book added to catalog");
        Ok(book)
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Book>, AppError> {
        self.books.find_book_by_id(id).await
    }

    #[instrument(skip(self))]
    pub async fn find_by_title(&self, title: &str) -> Result<Option<Book>, AppError> {
        self.books.find_book_by_title(title).await
    }

    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<Book>, AppError> {
        self.books.list_books().await
    }
}
