//! Role-scoped access rules for actions.
//!
//! Every check is a pure function of the actor snapshot, the action snapshot
//! and (for updates) the set of fields the caller asked to change.

use bitflags::bitflags;
use bson::oid::ObjectId;
use safetrack_db::models::{Action, UserRole};

bitflags! {
    /// Updatable action fields.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ActionFields: u8 {
        const STATUS = 1 << 0;
        const TITLE = 1 << 1;
        const DESCRIPTION = 1 << 2;
        const ASSIGNED_TO = 1 << 3;
        const DUE_DATE = 1 << 4;
    }
}

/// The authenticated caller, as resolved from the user store at request time.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: ObjectId,
    pub tenant_id: ObjectId,
    pub role: UserRole,
    pub display_name: String,
}

impl Actor {
    pub fn is_manager(&self) -> bool {
        matches!(self.role, UserRole::Manager | UserRole::Admin)
    }
}

pub fn can_create(actor: &Actor) -> bool {
    actor.is_manager()
}

pub fn can_read(actor: &Actor, action: &Action) -> bool {
    actor.is_manager() || action.assigned_to == actor.id
}

/// Listing with `scope=all`.
pub fn can_list_all(actor: &Actor) -> bool {
    actor.is_manager()
}

/// Workers may only touch `status`, and only on their own actions. The check
/// covers the whole requested set: one disallowed field denies the request.
pub fn can_update(actor: &Actor, action: &Action, requested: ActionFields) -> bool {
    if actor.is_manager() {
        return true;
    }
    action.assigned_to == actor.id && ActionFields::STATUS.contains(requested)
}
