use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{DeptId, RoleId, TenantId, UserId};

/// Authenticated actor attached to one request.
///
/// The authentication layer owns construction; permission checks only read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    user_id: UserId,
    username: String,
    dept_id: Option<DeptId>,
    #[serde(default)]
    sub_dept_ids: BTreeSet<DeptId>,
    #[serde(default)]
    role_ids: BTreeSet<RoleId>,
    #[serde(default)]
    role_codes: BTreeSet<String>,
    tenant_id: TenantId,
    #[serde(default)]
    row_permission_codes: BTreeSet<String>,
    #[serde(default)]
    super_admin: bool,
}

impl Principal {
    /// Creates a principal without roles or department hierarchy.
    #[must_use]
    pub fn new(
        user_id: UserId,
        username: impl Into<String>,
        dept_id: Option<DeptId>,
        tenant_id: TenantId,
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            dept_id,
            sub_dept_ids: BTreeSet::new(),
            role_ids: BTreeSet::new(),
            role_codes: BTreeSet::new(),
            tenant_id,
            row_permission_codes: BTreeSet::new(),
            super_admin: false,
        }
    }

    /// Adds a held role.
    #[must_use]
    pub fn with_role(mut self, role_id: RoleId, role_code: impl Into<String>) -> Self {
        self.role_ids.insert(role_id);
        self.role_codes.insert(role_code.into());
        self
    }

    /// Sets the departments below the principal's own department.
    #[must_use]
    pub fn with_sub_departments(mut self, sub_dept_ids: impl IntoIterator<Item = DeptId>) -> Self {
        self.sub_dept_ids = sub_dept_ids.into_iter().collect();
        self
    }

    /// Sets the row rule codes granted to the user at login.
    #[must_use]
    pub fn with_row_permission_codes(
        mut self,
        codes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.row_permission_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Flags the principal as a platform super administrator.
    #[must_use]
    pub fn as_platform_super_admin(mut self) -> Self {
        self.super_admin = true;
        self
    }

    /// Returns the user identifier.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the login name.
    #[must_use]
    pub fn username(&self) -> &str {
        self.username.as_str()
    }

    /// Returns the department the user belongs to, if any.
    #[must_use]
    pub fn dept_id(&self) -> Option<DeptId> {
        self.dept_id
    }

    /// Returns departments strictly below the user's department.
    #[must_use]
    pub fn sub_dept_ids(&self) -> &BTreeSet<DeptId> {
        &self.sub_dept_ids
    }

    /// Returns held role identifiers.
    #[must_use]
    pub fn role_ids(&self) -> &BTreeSet<RoleId> {
        &self.role_ids
    }

    /// Returns held role codes.
    #[must_use]
    pub fn role_codes(&self) -> &BTreeSet<String> {
        &self.role_codes
    }

    /// Returns the tenant the request runs in.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns row rule codes granted directly, regardless of rule subject.
    #[must_use]
    pub fn row_permission_codes(&self) -> &BTreeSet<String> {
        &self.row_permission_codes
    }

    /// Returns whether tenant isolation and data permissions are bypassed.
    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.super_admin
    }
}

#[cfg(test)]
mod tests {
    use crate::{DeptId, RoleId, TenantId, UserId};

    use super::Principal;

    #[test]
    fn principal_session_payload_roundtrip() {
        let principal = Principal::new(UserId::new(1), "alice", Some(DeptId::new(10)), TenantId::new(1))
            .with_role(RoleId::new(3), "ROLE_AUDITOR")
            .with_sub_departments([DeptId::new(11)]);

        let encoded = serde_json::to_value(&principal).unwrap_or_default();
        let decoded = serde_json::from_value::<Principal>(encoded);

        assert_eq!(decoded.ok(), Some(principal));
    }

    #[test]
    fn missing_optional_sets_default_to_empty() {
        let decoded = serde_json::from_str::<Principal>(
            r#"{"user_id":5,"username":"bob","dept_id":null,"tenant_id":2}"#,
        );

        let Ok(principal) = decoded else {
            panic!("principal payload without roles should decode");
        };
        assert!(principal.role_ids().is_empty());
        assert!(!principal.is_super_admin());
    }
}
