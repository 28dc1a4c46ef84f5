//! User contracts

mod base;
mod create;
mod delete;
mod update;

pub use base::{UserBaseContract, UserData};
pub use create::CreateUserContract;
pub use delete::{DeleteUserContract, DeleteUserData};
pub use update::UpdateUserContract;
