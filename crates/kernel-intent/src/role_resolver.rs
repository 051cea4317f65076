use kernel_types::{AccountId, CompiledPolicyPack, Role};
use std::collections::HashMap;

/// Maps a policy role to a concrete account id using the pack's role
/// bindings, plus caller-supplied context for dimension-aware bindings
/// (spec §4.9). Never performs I/O.
pub struct RoleResolver<'a> {
    pack: &'a CompiledPolicyPack,
}

impl<'a> RoleResolver<'a> {
    pub fn new(pack: &'a CompiledPolicyPack) -> Self {
        Self { pack }
    }

    /// Resolve one role. Returns `None` when no binding exists for the
    /// current context — the journal writer (C12) translates this into a
    /// `BLOCKED` outcome; this type never raises on its own.
    pub fn resolve(
        &self,
        role: &Role,
        _event_type: &str,
        dimensions: &HashMap<String, String>,
    ) -> Option<&'a AccountId> {
        self.pack.resolve_role_with_dimensions(role, dimensions)
    }

    /// Resolve every role in `roles`, partitioning into resolved pairs and
    /// the roles that failed to resolve.
    pub fn resolve_all(
        &self,
        roles: &[Role],
        event_type: &str,
        dimensions: &HashMap<String, String>,
    ) -> (Vec<(Role, AccountId)>, Vec<Role>) {
        let mut resolved = Vec::new();
        let mut unresolved = Vec::new();
        for role in roles {
            match self.resolve(role, event_type, dimensions) {
                Some(account) => resolved.push((role.clone(), account.clone())),
                None => unresolved.push(role.clone()),
            }
        }
        (resolved, unresolved)
    }
}
