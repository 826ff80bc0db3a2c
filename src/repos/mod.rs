pub mod error;
pub mod identity_repo;

pub use identity_repo::IdentityRepo;
