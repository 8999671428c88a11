//! Role and user stores backed by the table access adapter.

mod projection;
mod role;
mod user;

pub use role::RoleTableStore;
pub use user::UserTableStore;
