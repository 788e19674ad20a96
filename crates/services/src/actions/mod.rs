pub mod changes;
pub mod service;
pub mod validation;

pub use service::{ActionService, ActionView, ListActions, UserRef};
pub use validation::{CreateAction, UpdateAction};
