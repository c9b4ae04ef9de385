//! Permission checking and access control.
//!
//! A user's effective permissions are the permissions attached to their role. `super_admin` is a
//! wildcard and passes every permission check, including names that are not in the store.
//!
//! Three layers build on each other:
//!
//! - pure predicates ([`has_permission`], [`has_role`], [`can_access_lead`], [`can_access_user`]);
//! - route guards returning [`GuardViolation`] for business-rule refusals;
//! - the [`RequiresPermission`] and [`RequiresRole`] extractors that reject a request before
//!   the handler body runs.
//!
//! ```ignore
//! pub async fn delete_lead(
//!     State(state): State<AppState>,
//!     Path(id): Path<LeadId>,
//!     current_user: RequiresPermission<permission::LeadsDelete>,
//! ) -> Result<StatusCode> { ... }
//! ```

use std::marker::PhantomData;
use std::ops::Deref;

use axum::{extract::FromRequestParts, http::request::Parts};
use thiserror::Error as ThisError;

use crate::{
    AppState,
    api::models::users::CurrentUser,
    errors::{AuthFailure, Error, Result},
    types::UserId,
};

pub const SUPER_ADMIN: &str = "super_admin";
pub const ADMIN: &str = "admin";
pub const MANAGER: &str = "manager";
pub const SALES_REP: &str = "sales_rep";
pub const VIEWER: &str = "viewer";

/// Roles that can never be renamed or deleted.
pub const RESERVED_ROLES: &[&str] = &[SUPER_ADMIN, ADMIN];

pub fn is_reserved_role(name: &str) -> bool {
    RESERVED_ROLES.contains(&name)
}

/// `None` means the route requires no permission.
pub fn has_permission(user: &CurrentUser, permission: Option<&str>) -> bool {
    match permission {
        None => true,
        Some(_) if user.role == SUPER_ADMIN => true,
        Some(name) => user.permissions.iter().any(|p| p == name),
    }
}

pub fn has_role(user: &CurrentUser, allowed: &[&str]) -> bool {
    allowed.contains(&user.role.as_str())
}

/// Sales reps only reach leads that are theirs or unassigned. Unknown roles reach nothing.
pub fn can_access_lead(user: &CurrentUser, lead_owner: Option<UserId>) -> bool {
    match user.role.as_str() {
        SUPER_ADMIN | ADMIN | MANAGER | VIEWER => true,
        SALES_REP => lead_owner.is_none_or(|owner| owner == user.id),
        _ => false,
    }
}

/// Admins may act on any account, other admins included. Everyone else only on themselves.
pub fn can_access_user(user: &CurrentUser, target: UserId) -> bool {
    matches!(user.role.as_str(), SUPER_ADMIN | ADMIN) || target == user.id
}

/// Whether lead listings for this user must be restricted to owned and unassigned leads.
pub fn restricts_to_owned_leads(user: &CurrentUser) -> bool {
    user.role == SALES_REP
}

/// A route-level business rule refusal.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum GuardViolation {
    #[error("You cannot delete your own account")]
    SelfDeletion,

    #[error("The primary administrator account cannot be deleted")]
    ProtectedAccount,

    #[error("Only a super administrator can delete a super administrator")]
    SuperAdminTarget,

    #[error("Role '{name}' is reserved by the system and cannot be renamed or deleted")]
    ReservedRole { name: String },

    #[error("Role '{name}' is reserved by the system and cannot be deactivated")]
    ReservedRoleDeactivation { name: String },

    #[error("Role '{name}' is assigned to {user_count} user(s) and cannot be deleted")]
    RoleInUse { name: String, user_count: i64 },
}

impl GuardViolation {
    pub fn code(&self) -> &'static str {
        match self {
            GuardViolation::SelfDeletion => "CANNOT_DELETE_SELF",
            GuardViolation::ProtectedAccount | GuardViolation::SuperAdminTarget => "PROTECTED_ACCOUNT",
            GuardViolation::ReservedRole { .. } | GuardViolation::ReservedRoleDeactivation { .. } => "RESERVED_ROLE",
            GuardViolation::RoleInUse { .. } => "ROLE_IN_USE",
        }
    }
}

/// Rules applied before a user account is deleted. Email comparison ignores case.
pub fn check_user_deletion(
    actor: &CurrentUser,
    target_id: UserId,
    target_email: &str,
    target_role: Option<&str>,
    protected_email: &str,
) -> std::result::Result<(), GuardViolation> {
    if actor.id == target_id {
        return Err(GuardViolation::SelfDeletion);
    }
    if target_email.eq_ignore_ascii_case(protected_email) {
        return Err(GuardViolation::ProtectedAccount);
    }
    if target_role == Some(SUPER_ADMIN) && actor.role != SUPER_ADMIN {
        return Err(GuardViolation::SuperAdminTarget);
    }
    Ok(())
}

pub fn check_role_rename(current_name: &str, new_name: Option<&str>) -> std::result::Result<(), GuardViolation> {
    match new_name {
        Some(new_name) if new_name != current_name && is_reserved_role(current_name) => Err(GuardViolation::ReservedRole {
            name: current_name.to_string(),
        }),
        _ => Ok(()),
    }
}

/// A deactivated role grants nothing, so reserved roles always stay active.
pub fn check_role_deactivation(name: &str, is_active: Option<bool>) -> std::result::Result<(), GuardViolation> {
    match is_active {
        Some(false) if is_reserved_role(name) => Err(GuardViolation::ReservedRoleDeactivation { name: name.to_string() }),
        _ => Ok(()),
    }
}

pub fn check_role_deletion(name: &str, user_count: i64) -> std::result::Result<(), GuardViolation> {
    if is_reserved_role(name) {
        return Err(GuardViolation::ReservedRole { name: name.to_string() });
    }
    if user_count > 0 {
        return Err(GuardViolation::RoleInUse {
            name: name.to_string(),
            user_count,
        });
    }
    Ok(())
}

/// Fails with `INSUFFICIENT_PERMISSIONS` unless the user holds `permission`.
pub fn require_permission(user: &CurrentUser, permission: &str) -> Result<()> {
    if has_permission(user, Some(permission)) {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions {
            required: permission.to_string(),
        })
    }
}

/// Fails with `INSUFFICIENT_ROLE` unless the user's role is in `allowed`.
pub fn require_role(user: &CurrentUser, allowed: &[&str]) -> Result<()> {
    if has_role(user, allowed) {
        Ok(())
    } else {
        Err(Error::InsufficientRole {
            required: allowed.iter().map(|r| r.to_string()).collect(),
            current: user.role.clone(),
        })
    }
}

/// A permission name known at compile time.
pub trait PermissionRequirement: Send + Sync + 'static {
    const NAME: &'static str;
}

/// A set of acceptable role names known at compile time.
pub trait RoleRequirement: Send + Sync + 'static {
    const ALLOWED: &'static [&'static str];
}

macro_rules! permissions {
    ($($marker:ident => $name:literal),* $(,)?) => {
        $(
            #[derive(Debug)]
            pub struct $marker;

            impl super::PermissionRequirement for $marker {
                const NAME: &'static str = $name;
            }
        )*
    };
}

/// Marker types for the seeded permissions.
pub mod permission {
    permissions! {
        LeadsCreate => "leads.create",
        LeadsRead => "leads.read",
        LeadsUpdate => "leads.update",
        LeadsDelete => "leads.delete",
        InteractionsCreate => "interactions.create",
        InteractionsRead => "interactions.read",
        InteractionsUpdate => "interactions.update",
        InteractionsDelete => "interactions.delete",
        UsersCreate => "users.create",
        UsersRead => "users.read",
        UsersUpdate => "users.update",
        UsersDelete => "users.delete",
        UsersManageRoles => "users.manage_roles",
        AnalyticsRead => "analytics.read",
        AnalyticsExport => "analytics.export",
    }
}

/// Marker types for role sets.
pub mod role {
    use super::{ADMIN, MANAGER, SUPER_ADMIN};

    #[derive(Debug)]
    pub struct Administrators;

    impl super::RoleRequirement for Administrators {
        const ALLOWED: &'static [&'static str] = &[SUPER_ADMIN, ADMIN];
    }

    #[derive(Debug)]
    pub struct Supervisors;

    impl super::RoleRequirement for Supervisors {
        const ALLOWED: &'static [&'static str] = &[SUPER_ADMIN, ADMIN, MANAGER];
    }
}

/// The user resolved by [`require_authentication`](crate::auth::middleware::require_authentication).
///
/// Guards only trust that layer, so a guarded route mounted outside it fails with
/// `NOT_AUTHENTICATED` instead of running unchecked.
fn authenticated_user(parts: &Parts) -> Result<CurrentUser> {
    parts.extensions.get::<CurrentUser>().cloned().ok_or(Error::Unauthenticated {
        reason: AuthFailure::NotAuthenticated,
        message: None,
    })
}

/// Extracts the current user and rejects the request unless they hold `P`.
#[derive(Debug)]
pub struct RequiresPermission<P: PermissionRequirement> {
    user: CurrentUser,
    _marker: PhantomData<P>,
}

impl<P: PermissionRequirement> RequiresPermission<P> {
    pub fn into_inner(self) -> CurrentUser {
        self.user
    }
}

impl<P: PermissionRequirement> Deref for RequiresPermission<P> {
    type Target = CurrentUser;

    fn deref(&self) -> &CurrentUser {
        &self.user
    }
}

impl<P: PermissionRequirement> FromRequestParts<AppState> for RequiresPermission<P> {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self> {
        let user = authenticated_user(parts)?;
        require_permission(&user, P::NAME)?;
        Ok(Self {
            user,
            _marker: PhantomData,
        })
    }
}

/// Extracts the current user and rejects the request unless their role is in `R`.
#[derive(Debug)]
pub struct RequiresRole<R: RoleRequirement> {
    user: CurrentUser,
    _marker: PhantomData<R>,
}

impl<R: RoleRequirement> RequiresRole<R> {
    pub fn into_inner(self) -> CurrentUser {
        self.user
    }
}

impl<R: RoleRequirement> Deref for RequiresRole<R> {
    type Target = CurrentUser;

    fn deref(&self) -> &CurrentUser {
        &self.user
    }
}

impl<R: RoleRequirement> FromRequestParts<AppState> for RequiresRole<R> {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self> {
        let user = authenticated_user(parts)?;
        require_role(&user, R::ALLOWED)?;
        Ok(Self {
            user,
            _marker: PhantomData,
        })
    }
}
