//! Capability checks for admin and sub-admin operators.
//!
//! Handlers build an [`Actor`] from the current session and ask
//! [`is_allowed`] before every mutation. The functions here are pure; an
//! unauthenticated request never reaches them because the auth middleware
//! rejects it first.

/// Grants carried by a sub-admin account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    pub can_add: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_manage_categories: bool,
    /// Category ids this account may touch. Empty grants all categories.
    pub assigned_categories: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Actor {
    Admin,
    SubAdmin(PermissionSet),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action<'a> {
    AddDonation,
    EditDonation,
    DeleteDonation,
    ManageCategories,
    AccessCategory(&'a str),
}

pub fn is_allowed(actor: &Actor, action: &Action) -> bool {
    match actor {
        Actor::Admin => true,
        Actor::SubAdmin(perms) => match action {
            Action::AddDonation => perms.can_add,
            Action::EditDonation => perms.can_edit,
            Action::DeleteDonation => perms.can_delete,
            Action::ManageCategories => perms.can_manage_categories,
            Action::AccessCategory(id) => {
                perms.assigned_categories.is_empty()
                    || perms.assigned_categories.iter().any(|c| c == id)
            }
        },
    }
}
