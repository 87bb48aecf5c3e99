//! Pure access decisions: the role gate and the ownership gate.
//! Nothing here performs I/O or consults the user store.

use super::principal::{CallerIdentity, Role, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    /// Caller holds the required tier or higher.
    RoleSufficient,
    RoleInsufficient,
    /// Caller is the subject of the target resource.
    SelfAccess,
    AdminOverride,
    NotOwner,
    /// Non-admin attempted to change their own role.
    RoleChangeNotPermitted,
}

/// Transient per-request verdict, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub allow: bool,
    pub reason: DecisionReason,
}

impl AccessDecision {
    fn allow(reason: DecisionReason) -> Self { Self { allow: true, reason } }
    fn deny(reason: DecisionReason) -> Self { Self { allow: false, reason } }
}

/// Role gate: allow iff the caller's tier is at least `required`.
pub fn check_role(caller: &CallerIdentity, required: Role) -> AccessDecision {
    if caller.role >= required { AccessDecision::allow(DecisionReason::RoleSufficient) } else { AccessDecision::deny(DecisionReason::RoleInsufficient) }
}

/// Ownership gate: allow iff the caller is ADMIN or is the target.
pub fn evaluate(caller: &CallerIdentity, target: UserId) -> AccessDecision {
    if caller.role == Role::Admin {
        AccessDecision::allow(DecisionReason::AdminOverride)
    } else if caller.id == target {
        AccessDecision::allow(DecisionReason::SelfAccess)
    } else {
        AccessDecision::deny(DecisionReason::NotOwner)
    }
}

/// Ownership gate for updates. On top of [`evaluate`], a non-admin may not set
/// `role` to anything other than the target's current role.
pub fn evaluate_update(caller: &CallerIdentity, target: UserId, current_role: Role, requested_role: Option<Role>) -> AccessDecision {
    let base = evaluate(caller, target);
    if !base.allow { return base; }
    match requested_role {
        Some(r) if r != current_role && caller.role != Role::Admin => AccessDecision::deny(DecisionReason::RoleChangeNotPermitted),
        _ => base,
    }
}
