/*
 * Responsibility
 * - ドメインロジック (security core / account 管理)
 * - HTTP / axum には依存しない
 */
pub mod account;
pub mod auth;
