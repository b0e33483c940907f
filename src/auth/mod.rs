//! User accounts, login and role-based permissions.

mod rbac;
mod user_store;

pub use rbac::{has_permission, Permission, Role};
pub use user_store::{User, UserInfo, UserStore, DEFAULT_ROLE};
