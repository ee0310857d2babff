use std::collections::BTreeSet;
use std::str::FromStr;

use breeze_core::{
    AppError, AppResult, DeptId, NonEmptyString, Principal, RoleId, TenantId, UserId,
};
use serde::{Deserialize, Serialize};

use crate::condition::{ConditionGroup, validate_identifier};
use crate::resource::ResourceKey;

/// Principals a row rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RuleSubject {
    /// Every principal in the tenant.
    Everyone,
    /// Principals holding any of the roles.
    Roles(BTreeSet<RoleId>),
    /// One explicit user.
    User(UserId),
    /// Principals whose department is in the set.
    Departments(BTreeSet<DeptId>),
}

impl RuleSubject {
    /// Returns whether the subject covers the principal.
    #[must_use]
    pub fn applies_to(&self, principal: &Principal) -> bool {
        match self {
            Self::Everyone => true,
            Self::Roles(role_ids) => !role_ids.is_disjoint(principal.role_ids()),
            Self::User(user_id) => *user_id == principal.user_id(),
            Self::Departments(dept_ids) => principal
                .dept_id()
                .is_some_and(|dept_id| dept_ids.contains(&dept_id)),
        }
    }

    /// Returns the stable storage value of the subject kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Everyone => "everyone",
            Self::Roles(_) => "roles",
            Self::User(_) => "user",
            Self::Departments(_) => "departments",
        }
    }
}

/// Rows a matching rule grants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RowFilter {
    /// Every row of the tenant.
    AllRows,
    /// Rows owned by the listed departments.
    Departments(BTreeSet<DeptId>),
    /// Rows owned by the principal's department.
    OwnDepartment,
    /// Rows owned by the principal's department or any department below it.
    OwnDepartmentAndBelow,
    /// Rows owned by the principal.
    OwnRecords,
    /// Rows matching a stored condition.
    Custom(ConditionGroup),
}

impl RowFilter {
    /// Returns the stable storage value of the filter kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AllRows => "all_rows",
            Self::Departments(_) => "departments",
            Self::OwnDepartment => "own_department",
            Self::OwnDepartmentAndBelow => "own_department_and_below",
            Self::OwnRecords => "own_records",
            Self::Custom(_) => "custom",
        }
    }
}

/// Administrator-defined row permission rule, owned by one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowPermissionRule {
    tenant_id: TenantId,
    code: NonEmptyString,
    resource_key: Option<ResourceKey>,
    subject: RuleSubject,
    filter: RowFilter,
}

impl RowPermissionRule {
    /// Creates a rule; `resource_key = None` binds it to every resource.
    pub fn new(
        tenant_id: TenantId,
        code: impl Into<String>,
        resource_key: Option<ResourceKey>,
        subject: RuleSubject,
        filter: RowFilter,
    ) -> AppResult<Self> {
        let rule = Self {
            tenant_id,
            code: NonEmptyString::new(code).map_err(|error| {
                AppError::Configuration(format!("invalid row rule code: {error}"))
            })?,
            resource_key,
            subject,
            filter,
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Returns the owning tenant.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the rule code, unique within its tenant.
    #[must_use]
    pub fn code(&self) -> &str {
        self.code.as_str()
    }

    /// Returns the bound resource, `None` meaning every resource.
    #[must_use]
    pub fn resource_key(&self) -> Option<&ResourceKey> {
        self.resource_key.as_ref()
    }

    /// Returns the principal scope.
    #[must_use]
    pub fn subject(&self) -> &RuleSubject {
        &self.subject
    }

    /// Returns the granted rows.
    #[must_use]
    pub fn filter(&self) -> &RowFilter {
        &self.filter
    }

    /// Returns whether the rule is bound to the resource.
    #[must_use]
    pub fn covers_resource(&self, resource_key: &ResourceKey) -> bool {
        self.resource_key
            .as_ref()
            .is_none_or(|bound| bound == resource_key)
    }

    /// Rejects rule data that cannot be turned into a predicate.
    ///
    /// Deserialized rules bypass [`RowPermissionRule::new`], so lookups call
    /// this again before using a rule.
    pub fn validate(&self) -> AppResult<()> {
        match &self.subject {
            RuleSubject::Roles(role_ids) if role_ids.is_empty() => {
                return Err(AppError::Configuration(format!(
                    "row rule '{}' has an empty role scope",
                    self.code
                )));
            }
            RuleSubject::Departments(dept_ids) if dept_ids.is_empty() => {
                return Err(AppError::Configuration(format!(
                    "row rule '{}' has an empty department scope",
                    self.code
                )));
            }
            _ => {}
        }

        match &self.filter {
            RowFilter::Departments(dept_ids) if dept_ids.is_empty() => {
                Err(AppError::Configuration(format!(
                    "row rule '{}' grants an empty department set",
                    self.code
                )))
            }
            RowFilter::Custom(condition) if condition.is_empty() => {
                Err(AppError::Configuration(format!(
                    "custom row rule '{}' has no condition",
                    self.code
                )))
            }
            RowFilter::Custom(condition) => condition.validate().map_err(|error| {
                AppError::Configuration(format!(
                    "custom row rule '{}' is malformed: {error}",
                    self.code
                ))
            }),
            _ => Ok(()),
        }
    }
}

/// Access level a column rule leaves to a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnAccess {
    /// Neither readable nor writable.
    Hidden,
    /// Readable but not writable.
    ReadOnly,
}

impl ColumnAccess {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hidden => "hidden",
            Self::ReadOnly => "read_only",
        }
    }
}

impl FromStr for ColumnAccess {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "hidden" => Ok(Self::Hidden),
            "read_only" => Ok(Self::ReadOnly),
            _ => Err(AppError::Configuration(format!(
                "unknown column access value '{value}'"
            ))),
        }
    }
}

/// Column restriction for one role of a tenant on one menu resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPermissionRule {
    tenant_id: TenantId,
    role_id: RoleId,
    resource_key: ResourceKey,
    column: String,
    access: ColumnAccess,
}

impl ColumnPermissionRule {
    /// Creates a validated column rule.
    pub fn new(
        tenant_id: TenantId,
        role_id: RoleId,
        resource_key: ResourceKey,
        column: impl Into<String>,
        access: ColumnAccess,
    ) -> AppResult<Self> {
        let rule = Self {
            tenant_id,
            role_id,
            resource_key,
            column: column.into(),
            access,
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Returns the owning tenant.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the restricted role.
    #[must_use]
    pub fn role_id(&self) -> RoleId {
        self.role_id
    }

    /// Returns the menu resource.
    #[must_use]
    pub fn resource_key(&self) -> &ResourceKey {
        &self.resource_key
    }

    /// Returns the restricted column.
    #[must_use]
    pub fn column(&self) -> &str {
        self.column.as_str()
    }

    /// Returns the access level.
    #[must_use]
    pub fn access(&self) -> ColumnAccess {
        self.access
    }

    /// Checks the column identifier.
    pub fn validate(&self) -> AppResult<()> {
        validate_identifier("column", self.column.as_str())
    }
}

/// Stable audit actions emitted by rule administration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a row rule is created or replaced.
    RowRuleSaved,
    /// Emitted when a row rule is deleted.
    RowRuleDeleted,
    /// Emitted when a column rule is created or replaced.
    ColumnRuleSaved,
    /// Emitted when a column rule is deleted.
    ColumnRuleDeleted,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RowRuleSaved => "permission.row_rule.saved",
            Self::RowRuleDeleted => "permission.row_rule.deleted",
            Self::ColumnRuleSaved => "permission.column_rule.saved",
            Self::ColumnRuleDeleted => "permission.column_rule.deleted",
        }
    }
}
