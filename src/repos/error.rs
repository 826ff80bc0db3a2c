/**
 * Responsibility
 * - repo が上位に伝える意味の定義
 */
use thiserror::Error;

use crate::services::auth::identity::StoreError;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("db error")]
    Db(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

impl From<RepoError> for StoreError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Db(inner) => StoreError(inner.to_string()),
        }
    }
}
