use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, oneshot};

use breeze_core::{AppError, AppResult, DeptId, Principal, RoleId, TenantId, UserId};
use breeze_domain::{
    AuditAction, ColumnAccess, ColumnPermissionRule, DataColumn, DataResource, ResourceKey,
    RowFilter, RowPermissionRule, RuleSubject,
};

use crate::data_ports::{
    AuditEvent, AuditRepository, RuleRepository, RuleSet, RuleSnapshotPublisher,
};
use crate::{QueryDeclaration, ResourceRegistry};

use super::PermissionRuleAdminService;

#[derive(Default)]
struct FakeRuleRepository {
    rules: Mutex<RuleSet>,
}

#[async_trait]
impl RuleRepository for FakeRuleRepository {
    async fn save_row_rule(&self, rule: RowPermissionRule) -> AppResult<()> {
        let mut rules = self.rules.lock().await;
        rules.row_rules.retain(|stored| {
            !(stored.tenant_id() == rule.tenant_id() && stored.code() == rule.code())
        });
        rules.row_rules.push(rule);
        Ok(())
    }

    async fn delete_row_rule(&self, tenant_id: TenantId, code: &str) -> AppResult<()> {
        let mut rules = self.rules.lock().await;
        let before = rules.row_rules.len();
        rules
            .row_rules
            .retain(|stored| !(stored.tenant_id() == tenant_id && stored.code() == code));
        if rules.row_rules.len() == before {
            return Err(AppError::NotFound(format!("row rule '{code}' does not exist")));
        }
        Ok(())
    }

    async fn save_column_rule(&self, rule: ColumnPermissionRule) -> AppResult<()> {
        let mut rules = self.rules.lock().await;
        rules.column_rules.retain(|stored| {
            !(stored.tenant_id() == rule.tenant_id()
                && stored.role_id() == rule.role_id()
                && stored.resource_key() == rule.resource_key()
                && stored.column() == rule.column())
        });
        rules.column_rules.push(rule);
        Ok(())
    }

    async fn delete_column_rule(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
        resource_key: &ResourceKey,
        column: &str,
    ) -> AppResult<()> {
        self.rules.lock().await.column_rules.retain(|stored| {
            !(stored.tenant_id() == tenant_id
                && stored.role_id() == role_id
                && stored.resource_key() == resource_key
                && stored.column() == column)
        });
        Ok(())
    }

    async fn load_rules(&self) -> AppResult<RuleSet> {
        Ok(self.rules.lock().await.clone())
    }
}

/// Publisher whose first publish waits until the gate is released.
#[derive(Default)]
struct FakePublisher {
    published: Mutex<Vec<RuleSet>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    waiting_at_gate: Notify,
}

impl FakePublisher {
    fn gated(gate: oneshot::Receiver<()>) -> Self {
        Self {
            gate: Mutex::new(Some(gate)),
            ..Self::default()
        }
    }
}

#[async_trait]
impl RuleSnapshotPublisher for FakePublisher {
    async fn publish(&self, rules: RuleSet) -> AppResult<u64> {
        let gate = self.gate.lock().await.take();
        if let Some(gate) = gate {
            self.waiting_at_gate.notify_one();
            gate.await.ok();
        }

        let mut published = self.published.lock().await;
        published.push(rules);
        Ok(published.len() as u64)
    }
}

#[derive(Default)]
struct FakeAuditRepository {
    events: Mutex<Vec<AuditEvent>>,
    fail_writes: bool,
}

#[async_trait]
impl AuditRepository for FakeAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        if self.fail_writes {
            return Err(AppError::Internal("audit store unavailable".to_owned()));
        }
        self.events.lock().await.push(event);
        Ok(())
    }
}

struct Harness {
    service: PermissionRuleAdminService,
    repository: Arc<FakeRuleRepository>,
    publisher: Arc<FakePublisher>,
    audit: Arc<FakeAuditRepository>,
}

fn harness() -> Harness {
    harness_with(FakePublisher::default(), FakeAuditRepository::default())
}

fn harness_with(publisher: FakePublisher, audit: FakeAuditRepository) -> Harness {
    let mut registry = ResourceRegistry::new();
    let user = DataResource::builder("user", "sys_user")
        .data_column(DataColumn::Dept)
        .build()
        .unwrap_or_else(|error| panic!("user resource should be valid: {error}"));
    registry
        .register(user, QueryDeclaration::empty())
        .unwrap_or_else(|error| panic!("user resource should register: {error}"));

    let repository = Arc::new(FakeRuleRepository::default());
    let publisher = Arc::new(publisher);
    let audit = Arc::new(audit);
    let service = PermissionRuleAdminService::new(
        Arc::new(registry),
        repository.clone(),
        publisher.clone(),
        audit.clone(),
    );

    Harness {
        service,
        repository,
        publisher,
        audit,
    }
}

fn admin() -> Principal {
    tenant_admin(1)
}

fn tenant_admin(tenant_id: i64) -> Principal {
    Principal::new(
        UserId::new(tenant_id * 100 + 1),
        "admin",
        Some(DeptId::new(1)),
        TenantId::new(tenant_id),
    )
    .with_role(RoleId::new(1), "ROLE_ADMIN")
}

fn key(value: &str) -> ResourceKey {
    ResourceKey::new(value).unwrap_or_else(|error| panic!("key should be valid: {error}"))
}

fn dept_rule(code: &str) -> RowPermissionRule {
    tenant_dept_rule(1, code)
}

fn tenant_dept_rule(tenant_id: i64, code: &str) -> RowPermissionRule {
    RowPermissionRule::new(
        TenantId::new(tenant_id),
        code,
        Some(key("user")),
        RuleSubject::Roles(BTreeSet::from([RoleId::new(2)])),
        RowFilter::Departments(BTreeSet::from([DeptId::new(10)])),
    )
    .unwrap_or_else(|error| panic!("row rule should be valid: {error}"))
}

#[tokio::test]
async fn saving_a_row_rule_publishes_a_new_snapshot() {
    let harness = harness();

    let first = harness.service.save_row_rule(&admin(), dept_rule("R1")).await;
    let second = harness.service.save_row_rule(&admin(), dept_rule("R2")).await;

    assert_eq!(first.ok(), Some(1));
    assert_eq!(second.ok(), Some(2));

    let published = harness.publisher.published.lock().await;
    let Some(latest) = published.last() else {
        panic!("a snapshot should be published");
    };
    let codes: Vec<_> = latest.row_rules.iter().map(RowPermissionRule::code).collect();
    assert_eq!(codes, vec!["R1", "R2"]);
}

#[tokio::test]
async fn rule_edits_are_audited() {
    let harness = harness();
    let Ok(column_rule) = ColumnPermissionRule::new(
        TenantId::new(1),
        RoleId::new(2),
        key("user"),
        "phone",
        ColumnAccess::Hidden,
    ) else {
        panic!("column rule should be valid");
    };

    assert!(harness.service.save_column_rule(&admin(), column_rule).await.is_ok());
    assert!(
        harness
            .service
            .delete_column_rule(
                &admin(),
                TenantId::new(1),
                RoleId::new(2),
                &key("user"),
                "phone"
            )
            .await
            .is_ok()
    );

    let events = harness.audit.events.lock().await;
    let actions: Vec<_> = events.iter().map(|event| event.action).collect();
    assert_eq!(
        actions,
        vec![AuditAction::ColumnRuleSaved, AuditAction::ColumnRuleDeleted]
    );
    assert_eq!(
        events.first().map(|event| event.resource_id.as_str()),
        Some("2:user:phone")
    );
}

#[tokio::test]
async fn non_admin_cannot_edit_rules() {
    let harness = harness();
    let member = Principal::new(UserId::new(2), "member", None, TenantId::new(1))
        .with_role(RoleId::new(2), "ROLE_MEMBER");

    let result = harness.service.save_row_rule(&member, dept_rule("R1")).await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert!(harness.publisher.published.lock().await.is_empty());
}

#[tokio::test]
async fn platform_super_admin_may_edit_rules() {
    let harness = harness();
    let root = Principal::new(UserId::new(3), "root", None, TenantId::new(1))
        .as_platform_super_admin();

    let result = harness.service.save_row_rule(&root, dept_rule("R1")).await;

    assert_eq!(result.ok(), Some(1));
}

#[tokio::test]
async fn rules_for_unregistered_resources_are_rejected() {
    let harness = harness();
    let Ok(rule) = RowPermissionRule::new(
        TenantId::new(1),
        "R1",
        Some(key("warehouse")),
        RuleSubject::Everyone,
        RowFilter::OwnRecords,
    ) else {
        panic!("row rule should be valid");
    };

    let result = harness.service.save_row_rule(&admin(), rule).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn failed_delete_keeps_the_current_snapshot() {
    let harness = harness();

    let result = harness
        .service
        .delete_row_rule(&admin(), TenantId::new(1), "missing")
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(harness.publisher.published.lock().await.is_empty());
    assert!(harness.audit.events.lock().await.is_empty());
}

#[tokio::test]
async fn tenant_admin_cannot_edit_other_tenants_rules() {
    let harness = harness();
    harness
        .repository
        .rules
        .lock()
        .await
        .row_rules
        .push(dept_rule("T1_DEPT"));

    let saved = harness
        .service
        .save_row_rule(&tenant_admin(2), tenant_dept_rule(1, "T1_OVERRIDE"))
        .await;
    let deleted = harness
        .service
        .delete_row_rule(&tenant_admin(2), TenantId::new(1), "T1_DEPT")
        .await;

    assert!(matches!(saved, Err(AppError::Forbidden(_))));
    assert!(matches!(deleted, Err(AppError::Forbidden(_))));
    assert!(harness.publisher.published.lock().await.is_empty());
    assert_eq!(harness.repository.rules.lock().await.row_rules.len(), 1);
}

#[tokio::test]
async fn same_code_in_two_tenants_are_separate_rules() {
    let harness = harness();

    assert!(
        harness
            .service
            .save_row_rule(&tenant_admin(1), tenant_dept_rule(1, "DEPT"))
            .await
            .is_ok()
    );
    assert!(
        harness
            .service
            .save_row_rule(&tenant_admin(2), tenant_dept_rule(2, "DEPT"))
            .await
            .is_ok()
    );

    let rules = harness.repository.rules.lock().await;
    let owners: Vec<_> = rules
        .row_rules
        .iter()
        .map(|rule| rule.tenant_id().get())
        .collect();
    assert_eq!(owners, vec![1, 2]);
}

#[tokio::test]
async fn super_admin_edits_are_audited_under_the_rule_tenant() {
    let harness = harness();
    let root = Principal::new(UserId::new(3), "root", None, TenantId::new(1))
        .as_platform_super_admin();

    let result = harness
        .service
        .save_row_rule(&root, tenant_dept_rule(2, "T2_DEPT"))
        .await;

    assert_eq!(result.ok(), Some(1));
    let events = harness.audit.events.lock().await;
    assert_eq!(
        events.first().map(|event| event.tenant_id),
        Some(TenantId::new(2))
    );
}

#[tokio::test]
async fn concurrent_edits_publish_in_commit_order() {
    let (release, gate) = oneshot::channel();
    let harness = harness_with(FakePublisher::gated(gate), FakeAuditRepository::default());
    harness
        .repository
        .rules
        .lock()
        .await
        .row_rules
        .push(dept_rule("X"));

    let service = harness.service.clone();
    let saving =
        tokio::spawn(async move { service.save_row_rule(&admin(), dept_rule("Y")).await });
    harness.publisher.waiting_at_gate.notified().await;

    let service = harness.service.clone();
    let deleting = tokio::spawn(async move {
        service
            .delete_row_rule(&admin(), TenantId::new(1), "X")
            .await
    });
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
    release.send(()).ok();

    assert!(matches!(saving.await, Ok(Ok(1))));
    assert!(matches!(deleting.await, Ok(Ok(2))));

    let published = harness.publisher.published.lock().await;
    let Some(latest) = published.last() else {
        panic!("a snapshot should be published");
    };
    let codes: Vec<_> = latest.row_rules.iter().map(RowPermissionRule::code).collect();
    assert_eq!(codes, vec!["Y"]);
}

#[tokio::test]
async fn failed_audit_write_still_publishes_the_committed_edit() {
    let harness = harness_with(
        FakePublisher::default(),
        FakeAuditRepository {
            fail_writes: true,
            ..FakeAuditRepository::default()
        },
    );

    let result = harness.service.save_row_rule(&admin(), dept_rule("R1")).await;

    assert!(matches!(result, Err(AppError::Internal(_))));
    let published = harness.publisher.published.lock().await;
    let Some(latest) = published.last() else {
        panic!("the committed edit should be published");
    };
    let codes: Vec<_> = latest.row_rules.iter().map(RowPermissionRule::code).collect();
    assert_eq!(codes, vec!["R1"]);
}
