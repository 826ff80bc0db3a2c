/*!
 * Authentication context extractor
 *
 * Responsibility:
 * - 解決済みの AuthContext を handler に明示的に渡す (ambient な global state は使わない)
 * - HTTP / axum 依存は core に閉じ込め、型定義は types に分離する
 *
 * Public API:
 * - AuthCtx
 * - AuthCtxExtractor (anonymous も通す)
 * - Authenticated (anonymous は 401)
 */

mod core;
mod types;

pub use core::{AuthCtxExtractor, Authenticated};
pub use types::AuthCtx;
