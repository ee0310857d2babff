use std::fmt::{Display, Formatter};

use breeze_core::TenantId;
use breeze_domain::{ConditionGroup, ConditionNode, DataResource, Predicate, PredicateList};

/// Row visibility resolved for one principal on one resource.
#[derive(Debug, Clone, PartialEq)]
pub enum RowScope {
    /// No row restriction beyond tenant isolation.
    Unrestricted,
    /// Rows matching the OR-combined rule conditions.
    Restricted(ConditionGroup),
    /// No applicable rule; nothing is visible.
    DenyAll,
}

impl RowScope {
    /// Returns whether the scope can never return rows.
    #[must_use]
    pub fn is_deny_all(&self) -> bool {
        match self {
            Self::DenyAll => true,
            Self::Restricted(group) => group.matches_nothing(),
            Self::Unrestricted => false,
        }
    }

    /// Returns a short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unrestricted => "unrestricted",
            Self::Restricted(_) => "restricted",
            Self::DenyAll => "deny_all",
        }
    }
}

/// Query handed to a record mapper after permission rewriting.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalQuery {
    /// Target resource.
    pub resource: DataResource,
    /// Tenant isolation filter; `None` only for platform super administrators.
    pub tenant_id: Option<TenantId>,
    /// Row permission scope.
    pub row_scope: RowScope,
    /// Caller predicates from the declared query.
    pub filters: PredicateList,
}

impl FinalQuery {
    /// Returns the merged where clause: tenant AND row scope AND caller predicates.
    #[must_use]
    pub fn where_clause(&self) -> ConditionGroup {
        let mut nodes = Vec::with_capacity(self.filters.len() + 2);

        if let Some(tenant_id) = self.tenant_id {
            nodes.push(ConditionNode::from(Predicate::eq(
                self.resource.tenant_column(),
                tenant_id.get(),
            )));
        }

        match &self.row_scope {
            RowScope::Unrestricted => {}
            RowScope::Restricted(group) => nodes.push(ConditionNode::Group(group.clone())),
            RowScope::DenyAll => nodes.push(ConditionNode::Predicate(Predicate::MatchNone)),
        }

        nodes.extend(
            self.filters
                .as_slice()
                .iter()
                .cloned()
                .map(ConditionNode::Predicate),
        );

        ConditionGroup::all(nodes)
    }
}

impl Display for FinalQuery {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "SELECT * FROM {} WHERE {}",
            self.resource.table(),
            self.where_clause()
        )
    }
}
