//! Domain layer containing core business types, traits, and error definitions.

pub mod error;
pub mod policy;
pub mod traits;
pub mod types;

pub use error::{
    AppError, ConfigError, ConflictError, DatabaseError, NotFoundError, ValidationError,
};
pub use policy::{BORROW_LIMIT, LendingPolicy};
pub use traits::{BookRepository, HealthCheck, LendingRepository, UserRepository};
pub use types::{
    AddBookRequest, BOOK_ADDED_MESSAGE, BOOK_BORROWED_MESSAGE, BOOK_RETURNED_MESSAGE, Book,
    BookId, BookView, CreateUserRequest, ErrorDetail, ErrorResponse, HealthResponse,
    HealthStatus, LendingRequest, MessageResponse, RateLimitResponse, User, UserId, UserView,
};
