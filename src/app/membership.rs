//! Membership service: registering and looking up library members.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::{AppError, CreateUserRequest, User, UserRepository, ValidationError};

pub struct MembershipService {
    users: Arc<dyn UserRepository>,
}

impl MembershipService {
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Registers a member with an empty borrowed list.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<User, AppError> {
        request.validate().map_err(|e| {
            warn!(error = %e, "Validation failed for create user request");
            AppError::Validation(ValidationError::Multiple(e.to_string()))
        })?;

        let user = User::new(request.name.trim());
        self.users.insert_user(&user).await?;

        metrics::counter!("library_users_created").increment(1);
        info!(user_id = %user.id, "User created");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        self.users.find_user_by_id(id).await
    }

    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<User>, AppError> {
        self.users.list_users().await
    }
}
