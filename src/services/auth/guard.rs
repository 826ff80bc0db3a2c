/*
 * Responsibility
 * - AuthContext と要求 (role / device / environment) の照合
 * - I/O も cache も持たない純粋関数
 * - 全次元を評価し、違反理由をすべて返す (最初の違反で打ち切らない)
 */
use std::collections::BTreeSet;

use thiserror::Error;
use tracing::warn;

use crate::config::AppEnv;
use crate::services::auth::context::AuthContext;
use crate::services::auth::error::AuthError;

/// Either "anything goes" or "at least one of these".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement<T> {
    Any,
    OneOf(BTreeSet<T>),
}

impl<T: Ord> Requirement<T> {
    pub fn one_of(items: impl IntoIterator<Item = T>) -> Self {
        Self::OneOf(items.into_iter().collect())
    }

    fn permits(&self, held: impl Fn(&T) -> bool) -> bool {
        match self {
            Self::Any => true,
            Self::OneOf(set) => set.iter().any(held),
        }
    }
}

impl<T> Default for Requirement<T> {
    fn default() -> Self {
        Self::Any
    }
}

/// What a route declares before running business logic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRequirement {
    pub roles: Requirement<String>,
    pub devices: Requirement<i64>,
    pub envs: Requirement<AppEnv>,
}

impl AccessRequirement {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn roles<S: Into<String>>(mut self, roles: impl IntoIterator<Item = S>) -> Self {
        self.roles = Requirement::one_of(roles.into_iter().map(Into::into));
        self
    }

    pub fn devices(mut self, devices: impl IntoIterator<Item = i64>) -> Self {
        self.devices = Requirement::one_of(devices);
        self
    }

    pub fn envs(mut self, envs: impl IntoIterator<Item = AppEnv>) -> Self {
        self.envs = Requirement::one_of(envs);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("User role mismatch")]
    RoleMismatch,
    #[error("User not allowed to work with this device")]
    DeviceNotAllowed,
    #[error("Environment mismatch")]
    EnvironmentMismatch,
}

/// Policy evaluator bound to the runtime environment of this process.
#[derive(Debug, Clone, Copy)]
pub struct AccessGuard {
    env: AppEnv,
}

impl AccessGuard {
    pub fn new(env: AppEnv) -> Self {
        Self { env }
    }

    pub fn env(&self) -> AppEnv {
        self.env
    }

    pub fn check(&self, ctx: &AuthContext, req: &AccessRequirement) -> Vec<Violation> {
        check(ctx, req, self.env)
    }

    pub fn enforce(&self, ctx: &AuthContext, req: &AccessRequirement) -> Result<(), AuthError> {
        enforce(ctx, req, self.env)
    }
}

pub fn check(ctx: &AuthContext, req: &AccessRequirement, current_env: AppEnv) -> Vec<Violation> {
    let mut violations = Vec::new();

    if !req.roles.permits(|r| ctx.has_role(r)) {
        warn!(ctx = ?ctx, required = ?req.roles, "security check, role mismatch");
        violations.push(Violation::RoleMismatch);
    }

    if !req.devices.permits(|d| ctx.has_device(*d)) {
        warn!(ctx = ?ctx, required = ?req.devices, "security check, device mismatch");
        violations.push(Violation::DeviceNotAllowed);
    }

    if !req.envs.permits(|e| *e == current_env) {
        warn!(
            ctx = ?ctx,
            required = ?req.envs,
            current = %current_env,
            "security check, environment mismatch"
        );
        violations.push(Violation::EnvironmentMismatch);
    }

    violations
}

pub fn enforce(
    ctx: &AuthContext,
    req: &AccessRequirement,
    current_env: AppEnv,
) -> Result<(), AuthError> {
    let violations = check(ctx, req, current_env);
    if violations.is_empty() {
        return Ok(());
    }

    Err(AuthError::AccessDenied {
        reasons: violations.iter().map(ToString::to_string).collect(),
    })
}
