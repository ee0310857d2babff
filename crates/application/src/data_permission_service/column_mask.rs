use std::collections::{BTreeMap, BTreeSet};

use breeze_core::{AppError, AppResult, RoleId, TenantId};
use breeze_domain::{Cell, ColumnAccess, ColumnPermissionRule, MaskedRecord, Record, ResourceKey};

/// Effective column restrictions of one principal on one resource.
///
/// Grants are unioned across roles: a column stays hidden only when every held
/// role hides it, and stays unwritable only when every held role restricts it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMask {
    hidden: BTreeSet<String>,
    not_writable: BTreeSet<String>,
}

impl ColumnMask {
    /// Returns a mask that restricts nothing.
    #[must_use]
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Builds the mask from the tenant's column rules of the held roles.
    pub fn from_rules(
        tenant_id: TenantId,
        role_ids: &BTreeSet<RoleId>,
        resource_key: &ResourceKey,
        rules: &[ColumnPermissionRule],
    ) -> AppResult<Self> {
        let mut hiding_roles: BTreeMap<&str, BTreeSet<RoleId>> = BTreeMap::new();
        let mut restricting_roles: BTreeMap<&str, BTreeSet<RoleId>> = BTreeMap::new();

        for rule in rules {
            if rule.tenant_id() != tenant_id
                || rule.resource_key() != resource_key
                || !role_ids.contains(&rule.role_id())
            {
                continue;
            }
            rule.validate()?;

            if rule.access() == ColumnAccess::Hidden {
                hiding_roles
                    .entry(rule.column())
                    .or_default()
                    .insert(rule.role_id());
            }
            restricting_roles
                .entry(rule.column())
                .or_default()
                .insert(rule.role_id());
        }

        let covers_every_role =
            |roles: &BTreeSet<RoleId>| !role_ids.is_empty() && roles.len() == role_ids.len();

        Ok(Self {
            hidden: hiding_roles
                .into_iter()
                .filter(|(_, roles)| covers_every_role(roles))
                .map(|(column, _)| column.to_owned())
                .collect(),
            not_writable: restricting_roles
                .into_iter()
                .filter(|(_, roles)| covers_every_role(roles))
                .map(|(column, _)| column.to_owned())
                .collect(),
        })
    }

    /// Returns whether the column is redacted on read.
    #[must_use]
    pub fn is_hidden(&self, column: &str) -> bool {
        self.hidden.contains(column)
    }

    /// Returns whether the column may be written.
    #[must_use]
    pub fn is_writable(&self, column: &str) -> bool {
        !self.not_writable.contains(column)
    }

    /// Replaces hidden values with the redaction marker, keeping every key.
    #[must_use]
    pub fn apply(&self, record: Record) -> MaskedRecord {
        let cells = record
            .into_columns()
            .into_iter()
            .map(|(column, value)| {
                let cell = if self.is_hidden(column.as_str()) {
                    Cell::Redacted
                } else {
                    Cell::Visible(value)
                };
                (column, cell)
            })
            .collect();

        MaskedRecord::new(cells)
    }

    /// Fails with `Forbidden` listing every unwritable column among `columns`.
    pub fn check_writable<'a>(&self, columns: impl IntoIterator<Item = &'a str>) -> AppResult<()> {
        let denied: BTreeSet<&str> = columns
            .into_iter()
            .filter(|column| !self.is_writable(column))
            .collect();

        if denied.is_empty() {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "columns are not writable for this principal: {}",
            denied.into_iter().collect::<Vec<_>>().join(", ")
        )))
    }
}
