pub mod action;
pub mod base;
pub mod source;
pub mod user;

pub use base::BaseDao;
