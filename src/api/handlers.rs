//! HTTP request handlers and the error-to-response mapping.

use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequest, Path, Request, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::app::AppState;
use crate::domain::{
    AddBookRequest, AppError, BOOK_ADDED_MESSAGE, BookView, CreateUserRequest, DatabaseError,
    ErrorDetail, ErrorResponse, HealthResponse, HealthStatus, LendingRequest, MessageResponse,
    NotFoundError, UserView,
};

/// JSON body extractor whose rejections use the application error envelope.
///
/// Syntax errors, wrong content types and type mismatches become a 400
/// `deserialization_error` instead of axum's plain-text rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| AppError::Deserialization(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// GET /api/books
pub async fn list_books_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BookView>>, AppError> {
    let books = state.catalog.list_all().await?;
    Ok(Json(books.into_iter().map(BookView::from).collect()))
}

/// GET /api/books/{id}
pub async fn get_book_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BookView>, AppError> {
    let book = state
        .catalog
        .find_by_id(&id)
        .await?
        .ok_or(AppError::NotFound(NotFoundError::Book))?;
    Ok(Json(book.into()))
}

/// POST /api/books
pub async fn add_book_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<AddBookRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.catalog.add_book(&payload).await?;
    Ok(Json(MessageResponse::new(BOOK_ADDED_MESSAGE)))
}

/// POST /api/books/borrow
pub async fn borrow_book_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<LendingRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let response = state.lending.borrow_book(&payload).await?;
    Ok(Json(response))
}

/// POST /api/books/return
pub async fn return_book_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<LendingRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let response = state.lending.return_book(&payload).await?;
    Ok(Json(response))
}

/// GET /api/users
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UserView>>, AppError> {
    let users = state.membership.list_all().await?;
    Ok(Json(users.into_iter().map(UserView::from).collect()))
}

/// GET /api/users/{id}
pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UserView>, AppError> {
    let user = state
        .membership
        .find_by_id(&id)
        .await?
        .ok_or(AppError::NotFound(NotFoundError::User))?;
    Ok(Json(user.into()))
}

/// POST /api/users
pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> Result<Json<UserView>, AppError> {
    let user = state.membership.create_user(&payload).await?;
    Ok(Json(user.into()))
}

/// Detailed health check
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(state.health_check().await)
}

/// Kubernetes liveness probe
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness probe
pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    let health = state.health_check().await;
    match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Prometheus scrape endpoint; 404 when no recorder is installed.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

impl AppError {
    /// HTTP status and stable error type for this error.
    #[must_use]
    pub fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Database(db_err) => match db_err {
                DatabaseError::Connection(_) | DatabaseError::PoolExhausted(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "database_error")
                }
                DatabaseError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                DatabaseError::Duplicate(_) => (StatusCode::CONFLICT, "duplicate"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            },
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::NotFound(NotFoundError::Book) => (StatusCode::NOT_FOUND, "book_not_found"),
            AppError::NotFound(NotFoundError::User) => (StatusCode::NOT_FOUND, "user_not_found"),
            AppError::Conflict(conflict) => (StatusCode::BAD_REQUEST, conflict.reason()),
            AppError::Deserialization(_) => (StatusCode::BAD_REQUEST, "deserialization_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();
        let message = self.to_string();

        if status.is_server_error() {
            error!(error_type = %error_type, message = %message, "Server error");
        }

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                r#type: error_type.to_string(),
                message,
                status: status.as_u16(),
            },
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConflictError, ValidationError};
    use http_body_util::BodyExt;

    async fn error_body(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_book_not_found_envelope() {
        let (status, body) = error_body(NotFoundError::Book.into()).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], "book_not_found");
        assert_eq!(body["error"]["message"], "Book not found");
        assert_eq!(body["error"]["status"], 404);
    }

    #[tokio::test]
    async fn test_user_not_found_envelope() {
        let (status, body) = error_body(NotFoundError::User.into()).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], "user_not_found");
        assert_eq!(body["error"]["message"], "User not found");
    }

    #[tokio::test]
    async fn test_conflicts_are_bad_requests() {
        let (status, body) = error_body(ConflictError::BookAlreadyBorrowed.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "book_already_borrowed");
        assert_eq!(body["error"]["message"], "Book is already borrowed");

        let (status, body) = error_body(ConflictError::BorrowLimitExceeded(3).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "borrow_limit_exceeded");
        assert_eq!(
            body["error"]["message"],
            "User cannot borrow more than 3 books"
        );

        let (status, body) = error_body(ConflictError::NotBorrowedByUser.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "not_borrowed_by_user");
    }

    #[tokio::test]
    async fn test_validation_error_envelope() {
        let err = AppError::Validation(ValidationError::Multiple("title: must not be blank".to_string()));
        let (status, body) = error_body(err).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "validation_error");
        assert_eq!(body["error"]["status"], 400);
    }

    #[test]
    fn test_database_status_mapping() {
        let connection = AppError::Database(DatabaseError::Connection("refused".to_string()));
        assert_eq!(
            connection.status_and_type(),
            (StatusCode::SERVICE_UNAVAILABLE, "database_error")
        );

        let query = AppError::Database(DatabaseError::Query("syntax".to_string()));
        assert_eq!(
            query.status_and_type(),
            (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
        );
    }

    #[test]
    fn test_misc_status_mapping() {
        assert_eq!(
            AppError::Deserialization("bad json".to_string())
                .status_and_type()
                .0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::RateLimited.status_and_type().0,
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::Internal("boom".to_string()).status_and_type().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
