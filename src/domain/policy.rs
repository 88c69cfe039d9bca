//! Lending policy: which borrow and return transitions are allowed.
//!
//! The policy is pure. It inspects a [`Book`] and a [`User`] snapshot and
//! either allows the transition or names the rule that blocks it. Persisting
//! the transition is the job of [`crate::domain::LendingRepository`], which
//! re-checks the same rules atomically against the stored rows.

use super::error::ConflictError;
use super::types::{Book, User};

/// Maximum number of books a user may hold at the same time.
pub const BORROW_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LendingPolicy {
    max_borrowed: usize,
}

impl Default for LendingPolicy {
    fn default() -> Self {
        Self {
            max_borrowed: BORROW_LIMIT,
        }
    }
}

impl LendingPolicy {
    #[must_use]
    pub fn max_borrowed(&self) -> usize {
        self.max_borrowed
    }

    #[must_use]
    pub fn can_borrow(&self, user: &User) -> bool {
        user.borrowed_count() < self.max_borrowed
    }

    #[must_use]
    pub fn remaining_capacity(&self, user: &User) -> usize {
        self.max_borrowed.saturating_sub(user.borrowed_count())
    }

    /// Availability is checked before the limit, so a user at the limit who
    /// asks for an already borrowed book is told the book is taken.
    pub fn check_borrow(&self, book: &Book, user: &User) -> Result<(), ConflictError> {
        if book.is_borrowed() {
            return Err(ConflictError::BookAlreadyBorrowed);
        }
        if !self.can_borrow(user) {
            return Err(ConflictError::BorrowLimitExceeded(self.max_borrowed));
        }
        Ok(())
    }

    /// A borrowed book can only be returned by the member holding it. Returning
    /// a book nobody holds is allowed and changes nothing but `returned_at`.
    pub fn check_return(&self, book: &Book, user: &User) -> Result<(), ConflictError> {
        if book.is_borrowed() && !user.holds(&book.id) {
            return Err(ConflictError::NotBorrowedByUser);
        }
        Ok(())
    }
}
