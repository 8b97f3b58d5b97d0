//! Tenants, users and password credentials.

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use rand::rngs::OsRng;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::permissions::{Actor, Permission};
use bosun_common::types::{Tenant, User, UserRole};

const MIN_PASSWORD_LEN: usize = 8;

/// Hash a password with Argon2id and a random salt (PHC string format).
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check `password` against a stored PHC hash. Malformed hashes never verify.
pub fn verify_password(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Lowercase URL-safe slug of a tenant name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::Validation(format!("Invalid email address '{}'", email))),
    }
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Parameters for self-service tenant registration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterParams {
    pub tenant_name: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserParams {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserParams {
    pub display_name: Option<String>,
    pub role: Option<UserRole>,
    pub active: Option<bool>,
}

/// Tenant settings. An empty `webhook_url` removes the endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTenantParams {
    pub name: Option<String>,
    pub webhook_url: Option<String>,
}

pub struct AccountService;

impl AccountService {
    /// Create a tenant together with its first (admin) user.
    pub async fn register(pool: &PgPool, params: &RegisterParams) -> Result<(Tenant, User), AppError> {
        let name = params.tenant_name.trim();
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(AppError::Validation("Tenant name must not be empty".to_string()));
        }
        let email = normalize_email(&params.email)?;
        validate_password(&params.password)?;
        let password_hash = hash_password(&params.password)?;

        let mut tx = pool.begin().await?;

        let tenant: Tenant = sqlx::query_as(
            "INSERT INTO tenants (id, name, slug) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(&slug)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique_violation(e, format!("Tenant '{}' already exists", slug)))?;

        let user: User = sqlx::query_as(
            r#"
            INSERT INTO users (id, tenant_id, email, display_name, password_hash, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant.id)
        .bind(&email)
        .bind(params.display_name.trim())
        .bind(&password_hash)
        .bind(UserRole::Admin.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "Email already registered"))?;

        tx.commit().await?;

        tracing::info!(tenant_id = %tenant.id, slug = %tenant.slug, "Tenant registered");

        Ok((tenant, user))
    }

    /// Look up an active user by email and verify the password.
    pub async fn authenticate(pool: &PgPool, email: &str, password: &str) -> Result<User, AppError> {
        let email = email.trim().to_lowercase();
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(pool)
            .await?;

        match user {
            Some(user) if user.active && verify_password(&user.password_hash, password) => Ok(user),
            _ => {
                tracing::debug!(email = %email, "Login rejected");
                Err(AppError::Auth("Invalid email or password".to_string()))
            }
        }
    }

    /// Fetch a user regardless of tenant (token refresh path).
    pub async fn find_user(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    pub async fn get_user(pool: &PgPool, actor: &Actor, user_id: Uuid) -> Result<User, AppError> {
        sqlx::query_as("SELECT * FROM users WHERE id = $1 AND tenant_id = $2")
            .bind(user_id)
            .bind(actor.tenant_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    pub async fn list_users(pool: &PgPool, actor: &Actor) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as(
            "SELECT * FROM users WHERE tenant_id = $1 ORDER BY display_name, email",
        )
        .bind(actor.tenant_id)
        .fetch_all(pool)
        .await?;
        Ok(users)
    }

    pub async fn create_user(
        pool: &PgPool,
        actor: &Actor,
        params: &CreateUserParams,
    ) -> Result<User, AppError> {
        actor.require(Permission::ManageUsers)?;
        let email = normalize_email(&params.email)?;
        validate_password(&params.password)?;
        if params.display_name.trim().is_empty() {
            return Err(AppError::Validation("Display name must not be empty".to_string()));
        }
        let password_hash = hash_password(&params.password)?;

        let user: User = sqlx::query_as(
            r#"
            INSERT INTO users (id, tenant_id, email, display_name, password_hash, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.tenant_id)
        .bind(&email)
        .bind(params.display_name.trim())
        .bind(&password_hash)
        .bind(params.role.as_str())
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "Email already registered"))?;

        tracing::info!(user_id = %user.id, role = %user.role, "User created");

        Ok(user)
    }

    pub async fn update_user(
        pool: &PgPool,
        actor: &Actor,
        user_id: Uuid,
        params: &UpdateUserParams,
    ) -> Result<User, AppError> {
        actor.require(Permission::ManageUsers)?;
        let existing = Self::get_user(pool, actor, user_id).await?;

        if user_id == actor.user_id
            && (params.active == Some(false)
                || params.role.is_some_and(|r| r != existing.role))
        {
            return Err(AppError::Validation(
                "You cannot deactivate or change the role of your own account".to_string(),
            ));
        }

        let display_name = params
            .display_name
            .as_deref()
            .map(str::trim)
            .unwrap_or(&existing.display_name);
        if display_name.is_empty() {
            return Err(AppError::Validation("Display name must not be empty".to_string()));
        }

        let user: User = sqlx::query_as(
            r#"
            UPDATE users
            SET display_name = $1, role = $2, active = $3, updated_at = NOW()
            WHERE id = $4 AND tenant_id = $5
            RETURNING *
            "#,
        )
        .bind(display_name)
        .bind(params.role.unwrap_or(existing.role).as_str())
        .bind(params.active.unwrap_or(existing.active))
        .bind(user_id)
        .bind(actor.tenant_id)
        .fetch_one(pool)
        .await?;

        if !user.active {
            sqlx::query(
                "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
            )
            .bind(user.id)
            .execute(pool)
            .await?;
        }

        tracing::info!(user_id = %user.id, role = %user.role, active = user.active, "User updated");

        Ok(user)
    }

    pub async fn get_tenant(pool: &PgPool, actor: &Actor) -> Result<Tenant, AppError> {
        sqlx::query_as("SELECT * FROM tenants WHERE id = $1")
            .bind(actor.tenant_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Tenant not found".to_string()))
    }

    pub async fn update_tenant(
        pool: &PgPool,
        actor: &Actor,
        params: &UpdateTenantParams,
    ) -> Result<Tenant, AppError> {
        actor.require(Permission::ManageTenant)?;
        let existing = Self::get_tenant(pool, actor).await?;

        let name = params.name.as_deref().map(str::trim).unwrap_or(&existing.name);
        if name.is_empty() {
            return Err(AppError::Validation("Tenant name must not be empty".to_string()));
        }

        let webhook_url = match params.webhook_url.as_deref().map(str::trim) {
            None => existing.webhook_url,
            Some("") => None,
            Some(url) if url.starts_with("https://") || url.starts_with("http://") => {
                Some(url.to_string())
            }
            Some(url) => {
                return Err(AppError::Validation(format!(
                    "Webhook URL must be http(s): '{}'",
                    url
                )));
            }
        };

        let tenant: Tenant = sqlx::query_as(
            "UPDATE tenants SET name = $1, webhook_url = $2 WHERE id = $3 RETURNING *",
        )
        .bind(name)
        .bind(&webhook_url)
        .bind(actor.tenant_id)
        .fetch_one(pool)
        .await?;

        tracing::info!(tenant_id = %tenant.id, webhook = tenant.webhook_url.is_some(), "Tenant updated");

        Ok(tenant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "correct horse battery"));
        assert!(!verify_password(&hash, "wrong password"));
    }

    #[test]
    fn test_each_hash_gets_a_fresh_salt() {
        let first = hash_password("correct horse battery").unwrap();
        let second = hash_password("correct horse battery").unwrap();
        assert_ne!(first, second);
        let salt = |hash: &str| PasswordHash::new(hash).unwrap().salt.unwrap().to_string();
        assert_ne!(salt(&first), salt(&second));
        assert!(verify_password(&second, "correct horse battery"));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("not-a-hash", "anything"));
        assert!(!verify_password("", ""));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Blue Water Yachting Ltd."), "blue-water-yachting-ltd");
        assert_eq!(slugify("  M/Y  Aurora  "), "m-y-aurora");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Captain@Example.COM ").unwrap(),
            "captain@example.com"
        );
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("user@localhost").is_err());
    }

    #[test]
    fn test_password_policy() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("longenough").is_ok());
    }
}
