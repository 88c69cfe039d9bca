//! Lending service: borrow and return transitions.
//!
//! Each operation resolves the book by title and the member by id, runs the
//! [`LendingPolicy`] against the loaded snapshot and then asks the
//! [`LendingRepository`] to persist the transition. The repository re-checks
//! the rules atomically, so a request that loses a race still gets the same
//! error a sequential caller would have seen.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::{
    AppError, BOOK_BORROWED_MESSAGE, BOOK_RETURNED_MESSAGE, Book, BookRepository, ConflictError,
    LendingPolicy, LendingRepository, LendingRequest, MessageResponse, NotFoundError, User,
    UserRepository, ValidationError,
};

pub struct LendingService {
    books: Arc<dyn BookRepository>,
    users: Arc<dyn UserRepository>,
    loans: Arc<dyn LendingRepository>,
    policy: LendingPolicy,
}

impl LendingService {
    #[must_use]
    pub fn new(
        books: Arc<dyn BookRepository>,
        users: Arc<dyn UserRepository>,
        loans: Arc<dyn LendingRepository>,
    ) -> Self {
        Self {
            books,
            users,
            loans,
            policy: LendingPolicy::default(),
        }
    }

    /// Lends the book titled `request.book_title` to `request.user_id`.
    ///
    /// Checks run in a fixed order: book lookup, user lookup, availability,
    /// then the borrow limit.
    ///
    /// # Errors
    ///
    /// - `AppError::Validation` for a blank title or user id
    /// - `AppError::NotFound` when the book or user does not exist
    /// - `AppError::Conflict` when the book is taken or the user is at the limit
    #[instrument(skip(self, request), fields(book_title = %request.book_title, user_id = %request.user_id))]
    pub async fn borrow_book(&self, request: &LendingRequest) -> Result<MessageResponse, AppError> {
        let (book, user) = self.resolve(request).await?;

        if let Err(conflict) = self.policy.check_borrow(&book, &user) {
            return Err(reject(conflict));
        }

        self.loans
            .record_borrow(&book.id, &user.id, self.policy.max_borrowed(), Utc::now())
            .await
            .map_err(reject_app)?;

        metrics::counter!("library_books_borrowed").increment(1);
        info!(
            book_id = %book.id,
            remaining_capacity = self.policy.remaining_capacity(&user).saturating_sub(1),
            "Book borrowed"
        );
        Ok(MessageResponse::new(BOOK_BORROWED_MESSAGE))
    }

    /// Takes the book titled `request.book_title` back from `request.user_id`.
    ///
    /// A book that nobody holds is returned without error; a book held by a
    /// different member is rejected with `ConflictError::NotBorrowedByUser`.
    #[instrument(skip(self, request), fields(book_title = %request.book_title, user_id = %request.user_id))]
    pub async fn return_book(&self, request: &LendingRequest) -> Result<MessageResponse, AppError> {
        let (book, user) = self.resolve(request).await?;

        if let Err(conflict) = self.policy.check_return(&book, &user) {
            return Err(reject(conflict));
        }

        if !book.is_borrowed() {
            warn!(book_id = %book.id, "Returning a book that is not borrowed");
        }

        self.loans
            .record_return(&book.id, &user.id, Utc::now())
            .await
            .map_err(reject_app)?;

        metrics::counter!("library_books_returned").increment(1);
        info!(book_id = %book.id, "Book returned");
        Ok(MessageResponse::new(BOOK_RETURNED_MESSAGE))
    }

    async fn resolve(&self, request: &LendingRequest) -> Result<(Book, User), AppError> {
        request.validate().map_err(|e| {
            warn!(error = %e, "Validation failed for lending request");
            AppError::Validation(ValidationError::Multiple(e.to_string()))
        })?;

        let book = self
            .books
            .find_book_by_title(request.book_title.trim())
            .await?
            .ok_or(NotFoundError::Book)?;
        let user = self
            .users
            .find_user_by_id(request.user_id.trim())
            .await?
            .ok_or(NotFoundError::User)?;

        Ok((book, user))
    }
}

fn reject(conflict: ConflictError) -> AppError {
    warn!(reason = conflict.reason(), "Lending request rejected");
    metrics::counter!("library_lending_rejected", "reason" => conflict.reason()).increment(1);
    AppError::Conflict(conflict)
}

/// Counts conflicts raised by the repository the same way as policy rejections.
fn reject_app(err: AppError) -> AppError {
    match err {
        AppError::Conflict(conflict) => reject(conflict),
        other => other,
    }
}
