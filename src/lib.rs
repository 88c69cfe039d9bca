//! Library Lending Service
//!
//! An HTTP service that keeps a catalog of books, a roster of members and
//! the borrow/return transitions between them.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                   API Layer                  │
//! │   HTTP handlers, routing, error envelopes    │
//! ├─────────────────────────────────────────────┤
//! │               Application Layer              │
//! │   Catalog, membership and lending services   │
//! ├─────────────────────────────────────────────┤
//! │                 Domain Layer                 │
//! │  Entities, lending policy, traits and errors │
//! ├─────────────────────────────────────────────┤
//! │             Infrastructure Layer             │
//! │   PostgreSQL repositories, tracing, metrics  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Storage is reached only through the repository traits in [`domain`], so
//! the services run unchanged against PostgreSQL or the in-memory mock.
//!
//! # Lending rules
//!
//! - A book is held by at most one member at a time.
//! - A member holds at most [`domain::BORROW_LIMIT`] books.
//! - Borrow and return are atomic: they either fully apply or change nothing.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use library_lending::api::create_router;
//! use library_lending::app::AppState;
//! use library_lending::infra::PostgresClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(PostgresClient::with_defaults(&database_url).await?);
//!     db.run_migrations().await?;
//!
//!     let state = Arc::new(AppState::new(db.clone(), db.clone(), db.clone(), db));
//!     let router = create_router(state);
//!     axum::serve(listener, router).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod domain;
pub mod infra;

// Test utilities are available in tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
