//! `benchledger-auth`: pure authorization boundary.
//!
//! Authentication happens elsewhere: the identity collaborator resolves a
//! session into a [`Principal`] and every core operation receives it
//! explicitly. This crate is intentionally decoupled from HTTP and storage.

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod user;

pub use authorize::{AuthzError, authorize, authorize_job_actor};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::Role;
pub use user::{NewUser, User, UserStatus};
