pub mod action;
pub mod audit_log;
pub mod incident;
pub mod inspection;
pub mod notification;
pub mod user;

pub use action::*;
pub use audit_log::*;
pub use incident::*;
pub use inspection::*;
pub use notification::*;
pub use user::*;
