use crate::{
    common::SharedClock,
    db::DbPool,
    entities::{
        user::{self, Entity as UserEntity},
        UserRole,
    },
    errors::ServiceError,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub const MIN_PASSWORD_LEN: usize = 10;

pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::InternalError(format!("password hashing failed: {}", e)))
}

/// `false` for a wrong password and for a hash that cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}

fn check_password_strength(password: &str) -> Result<(), ServiceError> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LEN;
    let has_letter = password.chars().any(char::is_alphabetic);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if long_enough && has_letter && has_digit {
        Ok(())
    } else {
        Err(ServiceError::ValidationError(format!(
            "password must be at least {} characters and contain letters and digits",
            MIN_PASSWORD_LEN
        )))
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub password: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

/// A user as shown to admins; the password hash never leaves the service.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            role: model.role,
            is_active: model.is_active,
            last_login_at: model.last_login_at,
            created_at: model.created_at,
        }
    }
}

#[derive(Clone)]
pub struct UserService {
    db: Arc<DbPool>,
    clock: SharedClock,
}

impl UserService {
    pub fn new(db: Arc<DbPool>, clock: SharedClock) -> Self {
        Self { db, clock }
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create(&self, request: CreateUserRequest) -> Result<UserResponse, ServiceError> {
        request.validate()?;
        check_password_strength(&request.password)?;
        let email = request.email.trim().to_lowercase();

        let taken = UserEntity::find()
            .filter(user::Column::Email.eq(email.clone()))
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!(
                "a user with email {} already exists",
                email
            )));
        }

        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            name: Set(request.name.trim().to_string()),
            password_hash: Set(hash_password(&request.password)?),
            role: Set(request.role),
            is_active: Set(true),
            last_login_at: Set(None),
            created_at: Set(self.clock.now()),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(user_id = %user.id, role = %user.role, "User created");
        Ok(user.into())
    }

    pub async fn list(&self) -> Result<Vec<UserResponse>, ServiceError> {
        Ok(UserEntity::find()
            .order_by_asc(user::Column::Email)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(UserResponse::from)
            .collect())
    }

    pub async fn find(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        UserEntity::find_by_id(user_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        user_id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<UserResponse, ServiceError> {
        request.validate()?;
        let user = self.find(user_id).await?;

        let mut active: user::ActiveModel = user.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(role) = request.role {
            active.role = Set(role);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(password) = request.password {
            check_password_strength(&password)?;
            active.password_hash = Set(hash_password(&password)?);
        }

        let user = active
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        info!(user_id = %user.id, "User updated");
        Ok(user.into())
    }

    /// Checks credentials of an active user and stamps the login time.
    /// Unknown email, wrong password and disabled account look the same.
    #[instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<user::Model, ServiceError> {
        let rejected = || ServiceError::Unauthorized("invalid email or password".to_string());

        let user = UserEntity::find()
            .filter(user::Column::Email.eq(email.trim().to_lowercase()))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(rejected)?;

        if !user.is_active || !verify_password(password, &user.password_hash) {
            return Err(rejected());
        }

        let mut active: user::ActiveModel = user.into();
        active.last_login_at = Set(Some(self.clock.now()));
        active
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_only_the_right_password() {
        let hash = hash_password("correct horse 42").unwrap();
        assert!(verify_password("correct horse 42", &hash));
        assert!(!verify_password("wrong horse 42", &hash));
        assert!(!verify_password("correct horse 42", "not-a-hash"));
    }

    #[test]
    fn weak_passwords_are_rejected() {
        assert!(check_password_strength("short1").is_err());
        assert!(check_password_strength("onlyletterss").is_err());
        assert!(check_password_strength("letters4andmore").is_ok());
    }
}
