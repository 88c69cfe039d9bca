//! Application state management.
//!
//! This module provides the shared application state that is
//! accessible to all request handlers via Axum's State extractor.

use std::sync::Arc;

use tracing::{instrument, warn};

use crate::domain::{
    BookRepository, HealthCheck, HealthResponse, HealthStatus, LendingRepository, UserRepository,
};
use crate::infra::PrometheusHandle;

use super::{CatalogService, LendingService, MembershipService};

/// Shared application state for the Axum web server.
///
/// Holds the three application services plus the storage health probe.
/// Handlers never see the concrete repository implementations.
///
/// # Example
///
/// ```ignore
/// let db = Arc::new(PostgresClient::with_defaults(&database_url).await?);
/// let state = AppState::new(db.clone(), db.clone(), db.clone(), db);
///
/// let router = create_router(Arc::new(state));
/// ```
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub membership: Arc<MembershipService>,
    pub lending: Arc<LendingService>,
    pub health: Arc<dyn HealthCheck>,
    /// Prometheus recorder handle, when metrics are enabled.
    pub metrics: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    /// Wires the services to the given repositories.
    #[must_use]
    pub fn new(
        books: Arc<dyn BookRepository>,
        users: Arc<dyn UserRepository>,
        loans: Arc<dyn LendingRepository>,
        health: Arc<dyn HealthCheck>,
    ) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(Arc::clone(&books))),
            membership: Arc::new(MembershipService::new(Arc::clone(&users))),
            lending: Arc::new(LendingService::new(books, users, loans)),
            health,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, handle: Arc<PrometheusHandle>) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Performs a health check on the backing store.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthResponse {
        let database = match self.health.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => {
                warn!(error = ?e, "Database health check failed");
                HealthStatus::Unhealthy
            }
        };

        HealthResponse::new(database)
    }
}
