/*
 * Responsibility
 * - "user" / role / sec_user_role / sec_user_device テーブル向け SQLx 操作
 * - IdentityStore (読み取り) と AccountStore (書き込み) の Postgres 実装
 * - 派生済み API key そのものは保存しない (seed と fingerprint のみ)
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::repos::error::{RepoError, RepoResult};
use crate::services::auth::identity::{
    AccountStore, IdentityStore, StoreResult, UserCredential, UserInfo,
};

#[derive(Debug, FromRow)]
struct CredentialRow {
    id: i64,
    username: String,
    is_active: Option<String>,
    password: Option<String>,
    apikey_data: Option<String>,
    apikey_hash: Option<String>,
    apikey_issued_on: Option<DateTime<Utc>>,
}

impl From<CredentialRow> for UserCredential {
    fn from(row: CredentialRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            is_active: row.is_active.as_deref() == Some("Y"),
            password_hash: row.password,
            apikey_data: row.apikey_data,
            apikey_hash: row.apikey_hash,
            apikey_issued_on: row.apikey_issued_on,
        }
    }
}

#[derive(Debug, FromRow)]
struct UserInfoRow {
    id: i64,
    username: String,
}

#[derive(Clone, Debug)]
pub struct IdentityRepo {
    pool: PgPool,
}

impl IdentityRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_credential(&self, username: &str) -> RepoResult<Option<UserCredential>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT
                CAST(id AS BIGINT) AS id,
                username,
                is_active,
                password,
                apikey_data,
                apikey_hash,
                apikey_issued_on
            FROM "user"
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserCredential::from))
    }

    pub async fn get_user_info(&self, username: &str) -> RepoResult<Option<UserInfo>> {
        let row = sqlx::query_as::<_, UserInfoRow>(
            r#"
            SELECT CAST(id AS BIGINT) AS id, username
            FROM "user"
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| UserInfo {
            id: r.id,
            username: r.username,
        }))
    }

    pub async fn get_username_by_apikey_hash(&self, apikey_hash: &str) -> RepoResult<Option<String>> {
        let username = sqlx::query_scalar::<_, String>(
            r#"
            SELECT username
            FROM "user"
            WHERE apikey_hash = $1
            "#,
        )
        .bind(apikey_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(username)
    }

    pub async fn get_rolenames(&self, username: &str) -> RepoResult<Vec<String>> {
        let rows = sqlx::query_scalar::<_, String>(
            r#"
            SELECT r.rolename
            FROM "user" u
            JOIN sec_user_role ur ON ur.user_id = u.id
            JOIN role r ON r.id = ur.role_id
            WHERE u.username = $1
            "#,
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_device_ids(&self, username: &str) -> RepoResult<Vec<i64>> {
        let rows = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT CAST(ud.device_id AS BIGINT)
            FROM "user" u
            JOIN sec_user_device ud ON ud.user_id = u.id
            WHERE u.username = $1
            "#,
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // apikey_hash / apikey_data は揃って設定 or 揃って NULL
    pub async fn set_apikey(
        &self,
        username: &str,
        apikey_hash: Option<&str>,
        apikey_data: Option<&str>,
    ) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE "user"
            SET
                apikey_hash = $2,
                apikey_data = $3,
                apikey_issued_on = CASE WHEN $3 IS NULL THEN NULL ELSE NOW() END
            WHERE username = $1
            "#,
        )
        .bind(username)
        .bind(apikey_hash)
        .bind(apikey_data)
        .execute(&self.pool)
        .await
        .map_err(RepoError::Db)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_password(&self, username: &str, password_hash: &str) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE "user"
            SET password = $2
            WHERE username = $1
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_is_active(&self, username: &str, is_active: bool) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE "user"
            SET is_active = $2
            WHERE username = $1
            "#,
        )
        .bind(username)
        .bind(if is_active { "Y" } else { "N" })
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl IdentityStore for IdentityRepo {
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<UserCredential>> {
        Ok(self.get_credential(username).await?)
    }

    async fn find_user_info(&self, username: &str) -> StoreResult<Option<UserInfo>> {
        Ok(self.get_user_info(username).await?)
    }

    async fn find_user_by_apikey_hash(&self, apikey_hash: &str) -> StoreResult<Option<String>> {
        Ok(self.get_username_by_apikey_hash(apikey_hash).await?)
    }

    async fn role_names_for(&self, username: &str) -> StoreResult<Vec<String>> {
        Ok(self.get_rolenames(username).await?)
    }

    async fn device_ids_for(&self, username: &str) -> StoreResult<Vec<i64>> {
        Ok(self.get_device_ids(username).await?)
    }
}

#[async_trait]
impl AccountStore for IdentityRepo {
    async fn update_user_apikey(
        &self,
        username: &str,
        apikey_hash: Option<&str>,
        apikey_data: Option<&str>,
    ) -> StoreResult<bool> {
        Ok(self.set_apikey(username, apikey_hash, apikey_data).await?)
    }

    async fn update_user_password(
        &self,
        username: &str,
        password_hash: &str,
    ) -> StoreResult<bool> {
        Ok(self.set_password(username, password_hash).await?)
    }

    async fn update_user_is_active(&self, username: &str, is_active: bool) -> StoreResult<bool> {
        Ok(self.set_is_active(username, is_active).await?)
    }
}
