use super::*;

use std::collections::BTreeSet;

use breeze_domain::{ConditionGroup, ConditionNode, Predicate, RowFilter, RowPermissionRule};

enum RuleGrant {
    AllRows,
    Rows(ConditionNode),
}

impl DataPermissionService {
    /// Resolves the union of row grants applicable to the principal.
    ///
    /// Every applicable rule is validated before any grant is used, so a
    /// malformed rule fails the request even when another rule grants all rows.
    pub(super) async fn resolve_row_scope(
        &self,
        principal: &Principal,
        resource: &DataResource,
    ) -> AppResult<RowScope> {
        if principal.is_super_admin() {
            return Ok(RowScope::Unrestricted);
        }

        let resource_key = resource.key();
        let mut candidates = self
            .rule_store
            .row_rules_for(principal.tenant_id(), principal.role_ids(), resource_key)
            .await?;

        if !principal.row_permission_codes().is_empty() {
            let granted = self
                .rule_store
                .row_rules_by_codes(
                    principal.tenant_id(),
                    principal.row_permission_codes(),
                    resource_key,
                )
                .await?;
            candidates.extend(granted);
        }

        let mut seen_codes = BTreeSet::new();
        let applicable: Vec<RowPermissionRule> = candidates
            .into_iter()
            .filter(|rule| rule.tenant_id() == principal.tenant_id())
            .filter(|rule| rule.covers_resource(resource_key))
            .filter(|rule| {
                rule.subject().applies_to(principal)
                    || principal.row_permission_codes().contains(rule.code())
            })
            .filter(|rule| seen_codes.insert(rule.code().to_owned()))
            .collect();

        if applicable.is_empty() {
            return Ok(RowScope::DenyAll);
        }

        let mut grants = Vec::with_capacity(applicable.len());
        for rule in &applicable {
            rule.validate()?;
            grants.push(rule_grant(rule, resource, principal)?);
        }

        let scope = if grants.iter().any(|grant| matches!(grant, RuleGrant::AllRows)) {
            RowScope::Unrestricted
        } else {
            RowScope::Restricted(ConditionGroup::any(grants.into_iter().filter_map(
                |grant| match grant {
                    RuleGrant::Rows(node) => Some(node),
                    RuleGrant::AllRows => None,
                },
            )))
        };

        debug!(
            tenant_id = %principal.tenant_id(),
            resource_key = %resource_key,
            rule_count = applicable.len(),
            row_scope = scope.kind(),
            "resolved row scope"
        );

        Ok(scope)
    }
}

fn rule_grant(
    rule: &RowPermissionRule,
    resource: &DataResource,
    principal: &Principal,
) -> AppResult<RuleGrant> {
    let node = match rule.filter() {
        RowFilter::AllRows => return Ok(RuleGrant::AllRows),
        RowFilter::Departments(dept_ids) => Predicate::in_values(
            dept_column(rule, resource)?,
            dept_ids.iter().map(|dept_id| Value::from(dept_id.get())).collect(),
        )
        .into(),
        RowFilter::OwnDepartment => match principal.dept_id() {
            Some(dept_id) => Predicate::eq(dept_column(rule, resource)?, dept_id.get()).into(),
            None => {
                dept_column(rule, resource)?;
                Predicate::MatchNone.into()
            }
        },
        RowFilter::OwnDepartmentAndBelow => {
            let column = dept_column(rule, resource)?;
            let dept_ids: BTreeSet<_> = principal
                .dept_id()
                .into_iter()
                .chain(principal.sub_dept_ids().iter().copied())
                .collect();

            Predicate::in_values(
                column,
                dept_ids
                    .into_iter()
                    .map(|dept_id| Value::from(dept_id.get()))
                    .collect(),
            )
            .into()
        }
        RowFilter::OwnRecords => {
            let column = resource.user_column().ok_or_else(|| {
                AppError::Configuration(format!(
                    "row rule '{}' filters by owner but resource '{}' has no user column",
                    rule.code(),
                    resource.key()
                ))
            })?;
            Predicate::eq(column, principal.user_id().get()).into()
        }
        RowFilter::Custom(condition) => {
            if let Some(column) = condition
                .columns()
                .into_iter()
                .find(|column| !resource.has_column(column))
            {
                return Err(AppError::Configuration(format!(
                    "custom row rule '{}' references column '{column}' missing from resource '{}'",
                    rule.code(),
                    resource.key()
                )));
            }
            ConditionNode::Group(condition.clone())
        }
    };

    Ok(RuleGrant::Rows(node))
}

fn dept_column<'a>(rule: &RowPermissionRule, resource: &'a DataResource) -> AppResult<&'a str> {
    resource.dept_column().ok_or_else(|| {
        AppError::Configuration(format!(
            "row rule '{}' filters by department but resource '{}' has no department column",
            rule.code(),
            resource.key()
        ))
    })
}
