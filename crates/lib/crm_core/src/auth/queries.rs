//! PostgreSQL-backed credential store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::AuthError;
use super::store::CredentialStore;
use crate::models::auth::{
    Action, NewSession, NewUser, ProfileUpdate, Role, RolePermission, Session, User, UserUpdate,
    UserWithPassword,
};

const USER_COLUMNS: &str = "user_id, username, email, password_hash, role, first_name, \
                            last_name, is_active, created_at, last_login";

const SESSION_COLUMNS: &str = "session_id, user_id, token_hash, expires_at, created_at, is_active";

#[derive(FromRow)]
struct UserRow {
    user_id: i64,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    first_name: Option<String>,
    last_name: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for UserWithPassword {
    type Error = AuthError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(UserWithPassword {
            user: User {
                user_id: row.user_id,
                username: row.username,
                email: row.email,
                role,
                first_name: row.first_name,
                last_name: row.last_name,
                is_active: row.is_active,
                created_at: row.created_at,
                last_login: row.last_login,
            },
            password_hash: row.password_hash,
        })
    }
}

#[derive(FromRow)]
struct SessionRow {
    session_id: i64,
    user_id: i64,
    token_hash: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    is_active: bool,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            session_id: row.session_id,
            user_id: row.user_id,
            token_hash: row.token_hash,
            expires_at: row.expires_at,
            created_at: row.created_at,
            is_active: row.is_active,
        }
    }
}

/// Credential store over a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_active_user(
        &self,
        identifier: &str,
    ) -> Result<Option<UserWithPassword>, AuthError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE (username = $1 OR email = $1) AND is_active"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?;
        row.map(UserWithPassword::try_from).transpose()
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<UserWithPassword>, AuthError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(UserWithPassword::try_from).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, user_id DESC");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| UserWithPassword::try_from(r).map(|u| u.user))
            .collect()
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, AuthError> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, role, first_name, last_name) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(&user.first_name)
            .bind(&user.last_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(UserWithPassword::try_from(row)?.user)
    }

    async fn update_user(
        &self,
        user_id: i64,
        update: UserUpdate,
    ) -> Result<Option<User>, AuthError> {
        let sql = format!(
            "UPDATE users SET \
               username = COALESCE($2, username), \
               email = COALESCE($3, email), \
               role = COALESCE($4, role), \
               first_name = COALESCE($5, first_name), \
               last_name = COALESCE($6, last_name), \
               is_active = COALESCE($7, is_active) \
             WHERE user_id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .bind(update.username)
            .bind(update.email)
            .bind(update.role.map(|r| r.as_str()))
            .bind(update.first_name)
            .bind(update.last_name)
            .bind(update.is_active)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| UserWithPassword::try_from(r).map(|u| u.user))
            .transpose()
    }

    async fn update_profile(
        &self,
        user_id: i64,
        update: ProfileUpdate,
    ) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "UPDATE users SET \
               first_name = COALESCE($2, first_name), \
               last_name = COALESCE($3, last_name), \
               email = COALESCE($4, email) \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(update.first_name)
        .bind(update.last_name)
        .bind(update.email)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_password_hash(
        &self,
        user_id: i64,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, user_id: i64) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_login(&self, user_id: i64, at: DateTime<Utc>) -> Result<(), AuthError> {
        sqlx::query("UPDATE users SET last_login = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_session(&self, session: NewSession) -> Result<Session, AuthError> {
        let sql = format!(
            "INSERT INTO user_sessions (user_id, token_hash, expires_at) \
             VALUES ($1, $2, $3) RETURNING {SESSION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(session.user_id)
            .bind(&session.token_hash)
            .bind(session.expires_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, AuthError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM user_sessions WHERE token_hash = $1");
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Session::from))
    }

    async fn revoke_sessions(&self, user_id: i64) -> Result<u64, AuthError> {
        let result = sqlx::query(
            "UPDATE user_sessions SET is_active = FALSE WHERE user_id = $1 AND is_active",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn role_permissions(&self, role: Role) -> Result<Vec<RolePermission>, AuthError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT resource, action FROM role_permissions \
             WHERE role = $1 ORDER BY resource, action",
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(resource, action)| {
                let action = action
                    .parse::<Action>()
                    .map_err(|e| AuthError::Store(e.to_string()))?;
                Ok(RolePermission::new(role, resource, action))
            })
            .collect()
    }

    async fn seed_role_permissions(&self, rows: &[RolePermission]) -> Result<u64, AuthError> {
        let roles: Vec<&str> = rows.iter().map(|r| r.role.as_str()).collect();
        let resources: Vec<&str> = rows.iter().map(|r| r.resource.as_str()).collect();
        let actions: Vec<&str> = rows.iter().map(|r| r.action.as_str()).collect();
        let result = sqlx::query(
            "INSERT INTO role_permissions (role, resource, action) \
             SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[]) \
             ON CONFLICT (role, resource, action) DO NOTHING",
        )
        .bind(&roles)
        .bind(&resources)
        .bind(&actions)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
