use std::fmt::{Display, Formatter};

use breeze_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const MAX_IDENTIFIER_SEGMENT_LENGTH: usize = 63;

/// Validates a table or column identifier used in generated SQL.
///
/// Accepts `name` or `alias.name` segments made of ASCII letters, digits and
/// underscores that do not start with a digit.
pub fn validate_identifier(kind: &str, value: &str) -> AppResult<()> {
    let segments: Vec<&str> = value.split('.').collect();
    if segments.len() > 2 {
        return Err(AppError::Configuration(format!(
            "{kind} identifier '{value}' has too many segments"
        )));
    }

    for segment in segments {
        let mut chars = segment.chars();
        let Some(first) = chars.next() else {
            return Err(AppError::Configuration(format!(
                "{kind} identifier '{value}' must not be empty"
            )));
        };

        if !(first.is_ascii_alphabetic() || first == '_')
            || !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
            || segment.len() > MAX_IDENTIFIER_SEGMENT_LENGTH
        {
            return Err(AppError::Configuration(format!(
                "{kind} identifier '{value}' is not a valid SQL identifier"
            )));
        }
    }

    Ok(())
}

/// Logical mode for predicate groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalMode {
    /// All nodes must match. An empty group matches every row.
    And,
    /// Any node may match. An empty group matches no row.
    Or,
}

impl LogicalMode {
    /// Returns the SQL keyword.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// One column comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// `column = value`.
    Eq {
        /// Target column.
        column: String,
        /// Compared value.
        value: Value,
    },
    /// `column > value`.
    Gt {
        /// Target column.
        column: String,
        /// Compared value.
        value: Value,
    },
    /// `column >= value`.
    Gte {
        /// Target column.
        column: String,
        /// Compared value.
        value: Value,
    },
    /// `column < value`.
    Lt {
        /// Target column.
        column: String,
        /// Compared value.
        value: Value,
    },
    /// `column <= value`.
    Lte {
        /// Target column.
        column: String,
        /// Compared value.
        value: Value,
    },
    /// `column LIKE %value%`; the needle is stored unescaped.
    Like {
        /// Target column.
        column: String,
        /// Substring to search for.
        value: String,
    },
    /// `column IN (values)`; an empty list matches nothing.
    In {
        /// Target column.
        column: String,
        /// Accepted values.
        values: Vec<Value>,
    },
    /// Matches no row.
    MatchNone,
}

impl Predicate {
    /// Creates an equality predicate.
    #[must_use]
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Creates a membership predicate, or [`Predicate::MatchNone`] for an empty list.
    #[must_use]
    pub fn in_values(column: impl Into<String>, values: Vec<Value>) -> Self {
        if values.is_empty() {
            return Self::MatchNone;
        }

        Self::In {
            column: column.into(),
            values,
        }
    }

    /// Returns the target column, if the predicate has one.
    #[must_use]
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::Eq { column, .. }
            | Self::Gt { column, .. }
            | Self::Gte { column, .. }
            | Self::Lt { column, .. }
            | Self::Lte { column, .. }
            | Self::Like { column, .. }
            | Self::In { column, .. } => Some(column.as_str()),
            Self::MatchNone => None,
        }
    }

    /// Returns whether the predicate can never match.
    #[must_use]
    pub fn matches_nothing(&self) -> bool {
        match self {
            Self::MatchNone => true,
            Self::In { values, .. } => values.is_empty(),
            _ => false,
        }
    }

    /// Checks the column identifier.
    pub fn validate(&self) -> AppResult<()> {
        match self.column() {
            Some(column) => validate_identifier("column", column),
            None => Ok(()),
        }
    }
}

impl Display for Predicate {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Eq { column, value } => write!(formatter, "{column} = {}", SqlLiteral(value)),
            Self::Gt { column, value } => write!(formatter, "{column} > {}", SqlLiteral(value)),
            Self::Gte { column, value } => write!(formatter, "{column} >= {}", SqlLiteral(value)),
            Self::Lt { column, value } => write!(formatter, "{column} < {}", SqlLiteral(value)),
            Self::Lte { column, value } => write!(formatter, "{column} <= {}", SqlLiteral(value)),
            Self::Like { column, value } => {
                write!(formatter, "{column} LIKE '%{}%'", value.replace('\'', "''"))
            }
            Self::In { values, .. } if values.is_empty() => formatter.write_str("FALSE"),
            Self::In { column, values } => {
                write!(formatter, "{column} IN (")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        formatter.write_str(",")?;
                    }
                    write!(formatter, "{}", SqlLiteral(value))?;
                }
                formatter.write_str(")")
            }
            Self::MatchNone => formatter.write_str("FALSE"),
        }
    }
}

struct SqlLiteral<'a>(&'a Value);

impl Display for SqlLiteral<'_> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Value::String(value) => write!(formatter, "'{}'", value.replace('\'', "''")),
            Value::Null => formatter.write_str("NULL"),
            other => write!(formatter, "{other}"),
        }
    }
}

/// Recursive condition tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionNode {
    /// One predicate.
    Predicate(Predicate),
    /// Nested logical group.
    Group(ConditionGroup),
}

impl From<Predicate> for ConditionNode {
    fn from(value: Predicate) -> Self {
        Self::Predicate(value)
    }
}

impl From<ConditionGroup> for ConditionNode {
    fn from(value: ConditionGroup) -> Self {
        Self::Group(value)
    }
}

impl Display for ConditionNode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Predicate(predicate) => write!(formatter, "{predicate}"),
            Self::Group(group) => write!(formatter, "({group})"),
        }
    }
}

/// Logical group of condition nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    /// Logical mode for evaluating child nodes.
    pub logical_mode: LogicalMode,
    /// Child nodes.
    pub nodes: Vec<ConditionNode>,
}

impl ConditionGroup {
    /// Creates a group where every node must match.
    #[must_use]
    pub fn all(nodes: impl IntoIterator<Item = ConditionNode>) -> Self {
        Self {
            logical_mode: LogicalMode::And,
            nodes: nodes.into_iter().collect(),
        }
    }

    /// Creates a group where any node may match.
    #[must_use]
    pub fn any(nodes: impl IntoIterator<Item = ConditionNode>) -> Self {
        Self {
            logical_mode: LogicalMode::Or,
            nodes: nodes.into_iter().collect(),
        }
    }

    /// Returns whether the group has no child nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns whether the group can never match, judged structurally.
    #[must_use]
    pub fn matches_nothing(&self) -> bool {
        let node_matches_nothing = |node: &ConditionNode| match node {
            ConditionNode::Predicate(predicate) => predicate.matches_nothing(),
            ConditionNode::Group(group) => group.matches_nothing(),
        };

        match self.logical_mode {
            LogicalMode::And => self.nodes.iter().any(node_matches_nothing),
            LogicalMode::Or => self.nodes.iter().all(node_matches_nothing),
        }
    }

    /// Validates every predicate in the tree.
    pub fn validate(&self) -> AppResult<()> {
        for node in &self.nodes {
            match node {
                ConditionNode::Predicate(predicate) => predicate.validate()?,
                ConditionNode::Group(group) => group.validate()?,
            }
        }

        Ok(())
    }

    /// Returns every column referenced in the tree.
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        let mut columns = Vec::new();
        for node in &self.nodes {
            match node {
                ConditionNode::Predicate(predicate) => columns.extend(predicate.column()),
                ConditionNode::Group(group) => columns.extend(group.columns()),
            }
        }
        columns
    }
}

impl Display for ConditionGroup {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        if self.nodes.is_empty() {
            return match self.logical_mode {
                LogicalMode::And => formatter.write_str("TRUE"),
                LogicalMode::Or => formatter.write_str("FALSE"),
            };
        }

        for (index, node) in self.nodes.iter().enumerate() {
            if index > 0 {
                write!(formatter, " {} ", self.logical_mode.as_str())?;
            }
            write!(formatter, "{node}")?;
        }

        Ok(())
    }
}

/// Ordered predicates produced from one declared query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicateList(Vec<Predicate>);

impl PredicateList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a predicate.
    pub fn push(&mut self, predicate: Predicate) {
        self.0.push(predicate);
    }

    /// Returns the number of predicates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether no predicate was produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns predicates in emission order.
    #[must_use]
    pub fn as_slice(&self) -> &[Predicate] {
        self.0.as_slice()
    }

    /// Converts the list into an AND group.
    #[must_use]
    pub fn into_group(self) -> ConditionGroup {
        ConditionGroup::all(self.0.into_iter().map(ConditionNode::Predicate))
    }
}

impl From<Vec<Predicate>> for PredicateList {
    fn from(value: Vec<Predicate>) -> Self {
        Self(value)
    }
}

impl IntoIterator for PredicateList {
    type Item = Predicate;
    type IntoIter = std::vec::IntoIter<Predicate>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ConditionGroup, ConditionNode, Predicate, validate_identifier};

    #[test]
    fn empty_in_list_collapses_to_match_none() {
        let predicate = Predicate::in_values("dept_id", Vec::new());
        assert_eq!(predicate, Predicate::MatchNone);
        assert!(predicate.matches_nothing());
    }

    #[test]
    fn or_group_renders_union_of_department_scopes() {
        let group = ConditionGroup::any([
            ConditionNode::from(Predicate::in_values("dept_id", vec![json!(10), json!(11)])),
            ConditionNode::from(Predicate::in_values("dept_id", vec![json!(20)])),
        ]);

        assert_eq!(group.to_string(), "dept_id IN (10,11) OR dept_id IN (20)");
    }

    #[test]
    fn empty_groups_render_their_identity() {
        assert_eq!(ConditionGroup::all([]).to_string(), "TRUE");
        assert_eq!(ConditionGroup::any([]).to_string(), "FALSE");
        assert!(ConditionGroup::any([]).matches_nothing());
        assert!(!ConditionGroup::all([]).matches_nothing());
    }

    #[test]
    fn string_literals_are_quoted() {
        let predicate = Predicate::eq("username", "o'neil");
        assert_eq!(predicate.to_string(), "username = 'o''neil'");
    }

    #[test]
    fn identifiers_reject_injection_attempts() {
        assert!(validate_identifier("column", "dept_id").is_ok());
        assert!(validate_identifier("column", "u.dept_id").is_ok());
        assert!(validate_identifier("column", "dept_id; DROP TABLE x").is_err());
        assert!(validate_identifier("column", "1abc").is_err());
        assert!(validate_identifier("column", "a.b.c").is_err());
        assert!(validate_identifier("column", "").is_err());
    }

    #[test]
    fn custom_condition_json_roundtrip() {
        let group = ConditionGroup::all([
            ConditionNode::from(Predicate::eq("status", 1)),
            ConditionNode::from(ConditionGroup::any([ConditionNode::from(Predicate::Like {
                column: "title".to_owned(),
                value: "notice".to_owned(),
            })])),
        ]);

        let encoded = serde_json::to_value(&group).unwrap_or_default();
        let decoded = serde_json::from_value::<ConditionGroup>(encoded);
        assert_eq!(decoded.ok(), Some(group));
    }
}
