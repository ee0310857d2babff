use breeze_core::{AppError, AppResult, Principal, TenantId};
use breeze_domain::{
    ColumnAccess, PageRequest, ResourceKey, RowFilter, RowPermissionRule, RuleSubject,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ready: bool,
    pub postgres: HealthDependencyStatus,
}

/// One runtime dependency health status.
#[derive(Debug, Serialize)]
pub struct HealthDependencyStatus {
    pub status: &'static str,
    pub detail: Option<String>,
}

/// Declared query and paging for one data page.
#[derive(Debug, Default, Deserialize)]
pub struct DataPageRequest {
    #[serde(default)]
    pub query: Value,
    pub page: Option<u64>,
    pub size: Option<u64>,
}

impl DataPageRequest {
    pub fn page_request(&self) -> AppResult<PageRequest> {
        let defaults = PageRequest::default();
        PageRequest::new(
            self.page.unwrap_or(defaults.page()),
            self.size.unwrap_or(defaults.size()),
        )
    }
}

/// Tenant whose rules an admin request edits; defaults to the caller's tenant.
#[derive(Debug, Default, Deserialize)]
pub struct RuleTenantQuery {
    pub tenant_id: Option<i64>,
}

impl RuleTenantQuery {
    pub fn target_tenant(&self, principal: &Principal) -> TenantId {
        self.tenant_id
            .map(TenantId::new)
            .unwrap_or_else(|| principal.tenant_id())
    }
}

/// Incoming payload for row rule creation or replacement.
#[derive(Debug, Deserialize)]
pub struct SaveRowRuleRequest {
    pub resource_key: Option<String>,
    pub subject: RuleSubject,
    pub filter: RowFilter,
}

impl SaveRowRuleRequest {
    pub fn into_rule(self, tenant_id: TenantId, code: String) -> AppResult<RowPermissionRule> {
        let resource_key = self
            .resource_key
            .map(ResourceKey::new)
            .transpose()
            .map_err(|error| AppError::Validation(format!("invalid resource key: {error}")))?;

        RowPermissionRule::new(tenant_id, code, resource_key, self.subject, self.filter)
            .map_err(|error| AppError::Validation(error.to_string()))
    }
}

/// Incoming payload for column rule creation or replacement.
#[derive(Debug, Deserialize)]
pub struct SaveColumnRuleRequest {
    pub access: ColumnAccess,
}

/// Version of the rule snapshot serving requests after an edit.
#[derive(Debug, Serialize)]
pub struct RuleSnapshotResponse {
    pub version: u64,
}

#[cfg(test)]
mod tests {
    use breeze_core::{AppError, Principal, TenantId, UserId};
    use breeze_domain::{RowFilter, RuleSubject};
    use serde_json::json;

    use super::{DataPageRequest, RuleTenantQuery, SaveRowRuleRequest};

    #[test]
    fn page_request_defaults_and_bounds() {
        let Ok(page) = DataPageRequest::default().page_request() else {
            panic!("default page should be valid");
        };
        assert_eq!((page.page(), page.size()), (1, 10));

        let zero_page = DataPageRequest {
            page: Some(0),
            ..DataPageRequest::default()
        };
        assert!(matches!(
            zero_page.page_request(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn row_rule_payload_deserializes_tagged_subject_and_filter() {
        let payload = serde_json::from_value::<SaveRowRuleRequest>(json!({
            "resource_key": "user",
            "subject": {"kind": "roles", "value": [3]},
            "filter": {"kind": "departments", "value": [10, 11]}
        }));
        let Ok(payload) = payload else {
            panic!("payload should deserialize");
        };
        assert!(matches!(payload.subject, RuleSubject::Roles(_)));

        let Ok(rule) = payload.into_rule(TenantId::new(3), "R1".to_owned()) else {
            panic!("rule should be valid");
        };
        assert_eq!(rule.code(), "R1");
        assert_eq!(rule.tenant_id(), TenantId::new(3));
        assert!(matches!(rule.filter(), RowFilter::Departments(_)));
    }

    #[test]
    fn invalid_row_rules_are_rejected_as_validation_errors() {
        let payload = SaveRowRuleRequest {
            resource_key: Some("user".to_owned()),
            subject: RuleSubject::Everyone,
            filter: RowFilter::Departments(Default::default()),
        };

        assert!(matches!(
            payload.into_rule(TenantId::new(1), "EMPTY".to_owned()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn rule_tenant_defaults_to_the_caller() {
        let caller = Principal::new(UserId::new(1), "admin", None, TenantId::new(4));

        assert_eq!(
            RuleTenantQuery::default().target_tenant(&caller),
            TenantId::new(4)
        );
        assert_eq!(
            RuleTenantQuery { tenant_id: Some(9) }.target_tenant(&caller),
            TenantId::new(9)
        );
    }
}
