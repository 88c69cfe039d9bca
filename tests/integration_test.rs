//! Integration tests for the API.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde::Serialize;
use tower::ServiceExt;

use library_lending::api::create_router;
use library_lending::domain::{
    AddBookRequest, Book, BookView, CreateUserRequest, HealthResponse, HealthStatus,
    LendingRequest, MessageResponse, User, UserView,
};
use library_lending::test_utils::{MockProvider, mock_state};

fn create_test_app() -> (Arc<MockProvider>, Router) {
    let mock = Arc::new(MockProvider::new());
    let router = create_router(mock_state(&mock));
    (mock, router)
}

fn post_json<T: Serialize>(uri: &str, payload: &T) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(payload).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body_bytes).unwrap()
}

#[tokio::test]
async fn test_add_book_success() {
    let (mock, router) = create_test_app();

    let response = router
        .oneshot(post_json("/api/books", &AddBookRequest::new("Dune", "Herbert")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let message: MessageResponse = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(message.message, "Book added successfully");

    let books = mock.books();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].title, "Dune");
    assert!(!books[0].borrowed);
}

#[tokio::test]
async fn test_add_book_missing_author() {
    let (mock, router) = create_test_app();

    let response = router
        .oneshot(post_json(
            "/api/books",
            &serde_json::json!({ "title": "Dune" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "validation_error");
    assert_eq!(body["error"]["status"], 400);
    assert!(mock.books().is_empty());
}

#[tokio::test]
async fn test_add_book_malformed_json() {
    let (_, router) = create_test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/books")
        .header("Content-Type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "deserialization_error");
}

#[tokio::test]
async fn test_add_book_without_content_type() {
    let (_, router) = create_test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/books")
        .body(Body::from(r#"{"title":"Dune","author":"Herbert"}"#))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_books_empty() {
    let (_, router) = create_test_app();

    let response = router.oneshot(get("/api/books")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let books: Vec<BookView> = serde_json::from_slice(&body_bytes).unwrap();
    assert!(books.is_empty());
}

#[tokio::test]
async fn test_get_book_view_shape() {
    let (mock, router) = create_test_app();
    let book = Book::new("Dune", "Herbert");
    let id = book.id.clone();
    mock.seed_book(book);

    let response = router.oneshot(get(&format!("/api/books/{id}"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["title"], "Dune");
    assert_eq!(body["author"], "Herbert");
    assert_eq!(body["isBorrowed"], false);
    assert!(body["borrowedAt"].is_null());
    assert!(body["returnedAt"].is_null());
}

#[tokio::test]
async fn test_get_book_not_found() {
    let (_, router) = create_test_app();

    let response = router.oneshot(get("/api/books/book_missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "book_not_found");
    assert_eq!(body["error"]["message"], "Book not found");
}

#[tokio::test]
async fn test_create_user_success() {
    let (mock, router) = create_test_app();

    let response = router
        .oneshot(post_json("/api/users", &CreateUserRequest::new("Alice")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let user: UserView = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(user.name, "Alice");
    assert!(user.id.starts_with("user_"));
    assert!(user.borrowed_books.is_empty());
    assert!(mock.user(&user.id).is_some());
}

#[tokio::test]
async fn test_create_user_blank_name() {
    let (_, router) = create_test_app();

    let response = router
        .oneshot(post_json("/api/users", &CreateUserRequest::new("   ")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_user_not_found() {
    let (_, router) = create_test_app();

    let response = router.oneshot(get("/api/users/user_missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "user_not_found");
}

#[tokio::test]
async fn test_list_users_returns_borrowed_books() {
    let (mock, router) = create_test_app();
    let mut user = User::new("Alice");
    user.add_borrowed_book("book_1");
    mock.seed_user(user);

    let response = router.oneshot(get("/api/users")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body[0]["name"], "Alice");
    assert_eq!(body[0]["borrowedBooks"][0], "book_1");
}

#[tokio::test]
async fn test_borrow_unknown_book() {
    let (mock, router) = create_test_app();
    let user = User::new("Alice");
    let user_id = user.id.clone();
    mock.seed_user(user);

    let response = router
        .oneshot(post_json(
            "/api/books/borrow",
            &LendingRequest::new("Missing", user_id),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "book_not_found");
}

#[tokio::test]
async fn test_borrow_unknown_user() {
    let (mock, router) = create_test_app();
    mock.seed_book(Book::new("Dune", "Herbert"));

    let response = router
        .oneshot(post_json(
            "/api/books/borrow",
            &LendingRequest::new("Dune", "user_missing"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "user_not_found");
    assert!(!mock.books()[0].borrowed);
}

#[tokio::test]
async fn test_borrow_request_uses_camel_case_keys() {
    let (mock, router) = create_test_app();
    let book = Book::new("Dune", "Herbert");
    let book_id = book.id.clone();
    mock.seed_book(book);
    let user = User::new("Alice");
    let user_id = user.id.clone();
    mock.seed_user(user);

    let response = router
        .oneshot(post_json(
            "/api/books/borrow",
            &serde_json::json!({ "bookTitle": "Dune", "userId": user_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["message"], "Book borrowed successfully");
    assert!(mock.book(&book_id).unwrap().borrowed);
    assert!(mock.user(&user_id).unwrap().holds(&book_id));
}

#[tokio::test]
async fn test_health_check_healthy() {
    let (_, router) = create_test_app();

    let response = router.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let health: HealthResponse = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.database, HealthStatus::Healthy);
}

#[tokio::test]
async fn test_health_check_unhealthy_database() {
    let (mock, router) = create_test_app();
    mock.set_healthy(false);

    let response = router.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let health: HealthResponse = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(health.status, HealthStatus::Unhealthy);
}

#[tokio::test]
async fn test_storage_failure_is_server_error() {
    let mock = Arc::new(MockProvider::failing("disk on fire"));
    let router = create_router(mock_state(&mock));

    let response = router.oneshot(get("/api/books")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "database_error");
    assert_eq!(body["error"]["status"], 500);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (_, router) = create_test_app();

    let response = router.oneshot(get("/library/add-book")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
