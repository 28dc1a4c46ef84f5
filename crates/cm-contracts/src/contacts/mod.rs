//! Contact contracts

mod base;
mod create;
mod delete;
mod update;

pub use base::ContactBaseContract;
pub use create::CreateContactContract;
pub use delete::DeleteContactContract;
pub use update::UpdateContactContract;
