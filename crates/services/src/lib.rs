pub mod actions;
pub mod audit;
pub mod auth;
pub mod dao;
pub mod notify;
pub mod policy;

pub use actions::ActionService;
pub use audit::AuditRecorder;
pub use auth::AuthService;
pub use dao::*;
pub use notify::NotificationDispatcher;
