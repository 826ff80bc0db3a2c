pub mod cache;
pub mod context;
pub mod error;
pub mod guard;
pub mod hasher;
pub mod identity;
pub mod manager;
pub mod token;

pub use context::{AuthContext, Rolename};
pub use error::{AuthError, UnauthorizedReason};
pub use guard::{AccessGuard, AccessRequirement, Requirement, Violation};
pub use hasher::{CredentialHasher, DerivedApiKey};
pub use identity::{AccountStore, IdentityStore, UserCredential, UserInfo};
pub use manager::{Credential, SecurityManager};
pub use token::{Token, TokenCodec, TokenError};
