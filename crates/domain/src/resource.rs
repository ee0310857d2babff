use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use breeze_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::condition::validate_identifier;

/// Logical key of a data-permission resource (menu or mapper).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(NonEmptyString);

impl ResourceKey {
    /// Creates a validated resource key.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        Ok(Self(NonEmptyString::new(value)?))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ResourceKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Ownership column a resource exposes to row rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataColumn {
    /// Department ownership, stored in `dept_id` by convention.
    Dept,
    /// User ownership, stored in `user_id` by convention.
    User,
}

impl DataColumn {
    /// Returns the conventional column name.
    #[must_use]
    pub fn default_column(&self) -> &'static str {
        match self {
            Self::Dept => "dept_id",
            Self::User => "user_id",
        }
    }

    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dept => "DEPT",
            Self::User => "USER",
        }
    }
}

/// Table-backed resource protected by row and column rules.
///
/// The column set holds every column conditions may reference: the declared
/// columns plus the id, tenant and ownership columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataResource {
    key: ResourceKey,
    table: String,
    id_column: String,
    tenant_column: String,
    dept_column: Option<String>,
    user_column: Option<String>,
    columns: BTreeSet<String>,
}

impl DataResource {
    /// Starts a resource definition with conventional `id`/`tenant_id` columns.
    pub fn builder(key: impl Into<String>, table: impl Into<String>) -> DataResourceBuilder {
        DataResourceBuilder {
            key: key.into(),
            table: table.into(),
            id_column: "id".to_owned(),
            tenant_column: "tenant_id".to_owned(),
            dept_column: None,
            user_column: None,
            columns: BTreeSet::new(),
        }
    }

    /// Returns the logical key.
    #[must_use]
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Returns the backing table.
    #[must_use]
    pub fn table(&self) -> &str {
        self.table.as_str()
    }

    /// Returns the primary key column used for stable ordering.
    #[must_use]
    pub fn id_column(&self) -> &str {
        self.id_column.as_str()
    }

    /// Returns the tenant partition column.
    #[must_use]
    pub fn tenant_column(&self) -> &str {
        self.tenant_column.as_str()
    }

    /// Returns the department ownership column, if row rules may scope by department.
    #[must_use]
    pub fn dept_column(&self) -> Option<&str> {
        self.dept_column.as_deref()
    }

    /// Returns the user ownership column, if row rules may scope by owner.
    #[must_use]
    pub fn user_column(&self) -> Option<&str> {
        self.user_column.as_deref()
    }

    /// Returns whether conditions may reference the column.
    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    /// Returns the known columns in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }
}

/// Builder validating a [`DataResource`] once at setup.
#[derive(Debug, Clone)]
pub struct DataResourceBuilder {
    key: String,
    table: String,
    id_column: String,
    tenant_column: String,
    dept_column: Option<String>,
    user_column: Option<String>,
    columns: BTreeSet<String>,
}

impl DataResourceBuilder {
    /// Overrides the primary key column.
    #[must_use]
    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    /// Overrides the tenant column.
    #[must_use]
    pub fn tenant_column(mut self, column: impl Into<String>) -> Self {
        self.tenant_column = column.into();
        self
    }

    /// Exposes an ownership column under its conventional name.
    #[must_use]
    pub fn data_column(self, data_column: DataColumn) -> Self {
        match data_column {
            DataColumn::Dept => self.dept_column(data_column.default_column()),
            DataColumn::User => self.user_column(data_column.default_column()),
        }
    }

    /// Exposes a department ownership column.
    #[must_use]
    pub fn dept_column(mut self, column: impl Into<String>) -> Self {
        self.dept_column = Some(column.into());
        self
    }

    /// Exposes a user ownership column.
    #[must_use]
    pub fn user_column(mut self, column: impl Into<String>) -> Self {
        self.user_column = Some(column.into());
        self
    }

    /// Declares table columns that conditions may reference.
    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Validates identifiers and builds the resource.
    pub fn build(self) -> AppResult<DataResource> {
        let key = ResourceKey::new(self.key).map_err(|error| {
            breeze_core::AppError::Configuration(format!("invalid resource key: {error}"))
        })?;
        validate_identifier("table", self.table.as_str())?;

        let mut columns = self.columns;
        columns.insert(self.id_column.clone());
        columns.insert(self.tenant_column.clone());
        columns.extend(self.dept_column.iter().cloned());
        columns.extend(self.user_column.iter().cloned());
        for column in &columns {
            validate_identifier("column", column)?;
        }

        Ok(DataResource {
            key,
            table: self.table,
            id_column: self.id_column,
            tenant_column: self.tenant_column,
            dept_column: self.dept_column,
            user_column: self.user_column,
            columns,
        })
    }
}
