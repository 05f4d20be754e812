//! Sonar API resource types and their request builders.

mod alm;
mod permission;
mod project;
mod report;
mod user;

pub use alm::*;
pub use permission::*;
pub use project::*;
pub use report::*;
pub use user::*;
