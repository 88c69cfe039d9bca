//! PostgreSQL database client implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

use crate::domain::{
    AppError, Book, BookRepository, ConflictError, DatabaseError, HealthCheck, LendingRepository,
    User, UserRepository,
};

const BOOK_COLUMNS: &str = "id, title, author, borrowed, borrowed_at, returned_at, created_at";
const USER_COLUMNS: &str = "id, name, borrowed_book_ids, created_at";

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// PostgreSQL client backing every repository trait.
///
/// Lending transitions run in a single transaction and use guarded updates,
/// so two concurrent borrows of the same book cannot both succeed. Rows are
/// locked books first, then users, in both transitions.
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client with custom configuration
    pub async fn new(database_url: &str, config: PostgresConfig) -> Result<Self, AppError> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client with default configuration
    pub async fn with_defaults(database_url: &str) -> Result<Self, AppError> {
        Self::new(database_url, PostgresConfig::default()).await
    }

    /// Run database migrations using sqlx migrate
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying connection pool (for testing)
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_book(row: &sqlx::postgres::PgRow) -> Result<Book, AppError> {
        Ok(Book {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            author: row.try_get("author")?,
            borrowed: row.try_get("borrowed")?,
            borrowed_at: row.try_get("borrowed_at")?,
            returned_at: row.try_get("returned_at")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_user(row: &sqlx::postgres::PgRow) -> Result<User, AppError> {
        Ok(User {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            borrowed_book_ids: row.try_get("borrowed_book_ids")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl HealthCheck for PostgresClient {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        Ok(())
    }
}

#[async_trait]
impl BookRepository for PostgresClient {
    #[instrument(skip(self, book), fields(book_id = %book.id))]
    async fn insert_book(&self, book: &Book) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO books (id, title, author, borrowed, borrowed_at, returned_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.borrowed)
        .bind(book.borrowed_at)
        .bind(book.returned_at)
        .bind(book.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_book_by_id(&self, id: &str) -> Result<Option<Book>, AppError> {
        let row = sqlx::query(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_book).transpose()
    }

    #[instrument(skip(self))]
    async fn find_book_by_title(&self, title: &str) -> Result<Option<Book>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE title = $1 ORDER BY created_at, id LIMIT 1"
        ))
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_book).transpose()
    }

    #[instrument(skip(self))]
    async fn list_books(&self) -> Result<Vec<Book>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOK_COLUMNS} FROM books ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_book).collect()
    }
}

#[async_trait]
impl UserRepository for PostgresClient {
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, borrowed_book_ids, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.borrowed_book_ids)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    #[instrument(skip(self))]
    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_user).collect()
    }
}

#[async_trait]
impl LendingRepository for PostgresClient {
    #[instrument(skip(self))]
    async fn record_borrow(
        &self,
        book_id: &str,
        user_id: &str,
        limit: usize,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let max_held = i32::try_from(limit)
            .map_err(|_| AppError::Internal(format!("borrow limit {limit} out of range")))?;
        let mut tx = self.pool.begin().await?;

        // Books and users are never deleted, so an unmatched guarded update
        // means the rule in its WHERE clause failed. Dropping `tx` rolls back.
        let book = sqlx::query(
            r#"
            UPDATE books
            SET borrowed = TRUE, borrowed_at = $2
            WHERE id = $1 AND borrowed = FALSE
            "#,
        )
        .bind(book_id)
        .bind(at)
        .execute(&mut *tx)
        .await?;
        if book.rows_affected() == 0 {
            return Err(ConflictError::BookAlreadyBorrowed.into());
        }

        let user = sqlx::query(
            r#"
            UPDATE users
            SET borrowed_book_ids = array_append(borrowed_book_ids, $1)
            WHERE id = $2
              AND cardinality(borrowed_book_ids) < $3
              AND NOT ($1 = ANY(borrowed_book_ids))
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .bind(max_held)
        .execute(&mut *tx)
        .await?;
        if user.rows_affected() == 0 {
            return Err(ConflictError::BorrowLimitExceeded(limit).into());
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn record_return(
        &self,
        book_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let borrowed: bool = sqlx::query("SELECT borrowed FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("book {book_id} not found")))?
            .try_get("borrowed")?;

        let removed = sqlx::query(
            r#"
            UPDATE users
            SET borrowed_book_ids = array_remove(borrowed_book_ids, $1)
            WHERE id = $2 AND $1 = ANY(borrowed_book_ids)
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if borrowed && removed.rows_affected() == 0 {
            return Err(ConflictError::NotBorrowedByUser.into());
        }

        sqlx::query("UPDATE books SET borrowed = FALSE, returned_at = $2 WHERE id = $1")
            .bind(book_id)
            .bind(at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
