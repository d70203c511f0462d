//! Operator accounts and password hashing.

use anyhow::Context;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::UnknownValue;
use super::audit::{AuditAction, AuditEntry, NewAuditEntry};
use crate::error::{AppError, AppResult};
use crate::store::record::{Record, required_text};

/// Shortest password accepted for an account.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Account role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[default]
    #[serde(rename = "operador")]
    Operator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operador",
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "admin" => Ok(Role::Admin),
            "operador" => Ok(Role::Operator),
            _ => Err(UnknownValue::new("role", value)),
        }
    }
}

/// Account record. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub email: String,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    #[serde(rename = "ativo")]
    pub active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an account.
#[derive(Debug, Default, Deserialize)]
pub struct CreateAccount {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<Role>,
    pub ativo: Option<bool>,
}

/// Input for updating an account. A present `password` is re-hashed.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateAccount {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<Role>,
    pub ativo: Option<bool>,
}

impl Account {
    /// Find an account by username.
    pub async fn find_by_username(pool: &PgPool, username: &str) -> AppResult<Option<Self>> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(pool)
            .await?;

        Ok(account)
    }

    /// Record a successful login.
    pub async fn touch_login(pool: &PgPool, id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Create an administrator, or promote and reset an existing account
    /// with the same username. Input is validated like `POST /api/users`
    /// and the change is audited with no actor.
    pub async fn upsert_admin(
        pool: &PgPool,
        username: &str,
        password: &str,
        email: &str,
        name: &str,
    ) -> anyhow::Result<Self> {
        let username = required_text("username", Some(username.to_string()))?;
        let password = checked_password(Some(password.to_string()))?;
        let email = checked_email(Some(email.to_string()))?;
        let name = required_text("name", Some(name.to_string()))?;
        let hash = hash_password(&password)?;

        let mut tx = pool.begin().await?;

        let existing =
            sqlx::query_as::<_, Account>("SELECT * FROM users WHERE username = $1 FOR UPDATE")
                .bind(&username)
                .fetch_optional(&mut *tx)
                .await?;

        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO users (id, username, password_hash, email, name, role, active)
            VALUES ($1, $2, $3, $4, $5, 'admin', TRUE)
            ON CONFLICT (username) DO UPDATE
            SET password_hash = EXCLUDED.password_hash, email = EXCLUDED.email,
                name = EXCLUDED.name, role = 'admin', active = TRUE, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&username)
        .bind(&hash)
        .bind(&email)
        .bind(&name)
        .fetch_one(&mut *tx)
        .await
        .context("failed to create administrator")?;

        let action = if existing.is_some() {
            AuditAction::Update
        } else {
            AuditAction::Create
        };
        AuditEntry::append(
            &mut *tx,
            NewAuditEntry {
                actor_id: None,
                action,
                table_name: Self::TABLE,
                record_id: account.id,
                before: existing.map(|a| a.snapshot()),
                after: Some(account.snapshot()),
            },
        )
        .await?;

        tx.commit().await?;

        Ok(account)
    }

    /// Verify a password against the stored hash.
    pub fn verify_password(&self, password: &str) -> bool {
        if self.password_hash.is_empty() {
            return false;
        }

        let Ok(parsed_hash) = PasswordHash::new(&self.password_hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

fn checked_password(password: Option<String>) -> AppResult<String> {
    let password = password.filter(|p| !p.is_empty()).ok_or_else(|| AppError::required("password"))?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::invalid(
            "password",
            format!("must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok(password)
}

fn checked_email(email: Option<String>) -> AppResult<String> {
    let email = required_text("email", email)?;
    if !email.contains('@') {
        return Err(AppError::invalid("email", "must be an email address"));
    }
    Ok(email)
}

#[async_trait]
impl Record for Account {
    const TABLE: &'static str = "users";
    const SEARCH_COLUMNS: &'static [&'static str] = &["username", "name", "email"];

    type Create = CreateAccount;
    type Patch = UpdateAccount;

    fn id(&self) -> Uuid {
        self.id
    }

    async fn insert(conn: &mut PgConnection, input: CreateAccount) -> AppResult<Self> {
        let username = required_text("username", input.username)?;
        let password = checked_password(input.password)?;
        let email = checked_email(input.email)?;
        let name = required_text("name", input.name)?;
        let role = input.role.unwrap_or_default();
        let hash = hash_password(&password)?;

        let row = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO users (id, username, password_hash, email, name, role, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&username)
        .bind(&hash)
        .bind(&email)
        .bind(&name)
        .bind(role.as_str())
        .bind(input.ativo.unwrap_or(true))
        .fetch_one(conn)
        .await?;

        Ok(row)
    }

    async fn update(conn: &mut PgConnection, current: Self, patch: UpdateAccount) -> AppResult<Self> {
        let username = required_text("username", patch.username.or(Some(current.username)))?;
        let email = checked_email(patch.email.or(Some(current.email)))?;
        let name = required_text("name", patch.name.or(Some(current.name)))?;
        let role = patch.role.unwrap_or(current.role);
        let active = patch.ativo.unwrap_or(current.active);
        let hash = match patch.password {
            Some(password) => hash_password(&checked_password(Some(password))?)?,
            None => current.password_hash,
        };

        let row = sqlx::query_as::<_, Account>(
            r#"
            UPDATE users
            SET username = $1, password_hash = $2, email = $3, name = $4, role = $5,
                active = $6, updated_at = NOW()
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(&username)
        .bind(&hash)
        .bind(&email)
        .bind(&name)
        .bind(role.as_str())
        .bind(active)
        .bind(current.id)
        .fetch_one(conn)
        .await?;

        Ok(row)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn account(password_hash: String) -> Account {
        Account {
            id: Uuid::nil(),
            username: "joao".to_string(),
            password_hash,
            email: "joao@example.org".to_string(),
            name: "João".to_string(),
            role: Role::Operator,
            active: true,
            last_login: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn hash_and_verify_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id"));

        let account = account(hash);
        assert!(account.verify_password("correct horse"));
        assert!(!account.verify_password("wrong horse"));
    }

    #[test]
    fn empty_hash_never_verifies() {
        assert!(!account(String::new()).verify_password(""));
    }

    #[test]
    fn serialization_omits_password_hash() {
        let json = serde_json::to_value(account("$argon2id$secret".to_string())).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(!json.to_string().contains("argon2"));
        assert_eq!(json["role"], "operador");
        assert_eq!(json["ativo"], true);
    }

    #[test]
    fn role_wire_names() {
        assert_eq!(Role::try_from("admin".to_string()).unwrap(), Role::Admin);
        assert_eq!(Role::Operator.as_str(), "operador");
        assert!(Role::try_from("root".to_string()).is_err());
        let role: Role = serde_json::from_str("\"operador\"").unwrap();
        assert_eq!(role, Role::Operator);
    }

    #[test]
    fn password_rules() {
        assert!(checked_password(None).is_err());
        assert!(checked_password(Some("short".into())).is_err());
        assert_eq!(checked_password(Some("longenough".into())).unwrap(), "longenough");
        assert!(checked_email(Some("nobody".into())).is_err());
    }
}
