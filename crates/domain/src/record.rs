use std::collections::BTreeMap;

use breeze_core::{AppError, AppResult};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Key of the object that replaces a redacted cell in JSON output.
pub const REDACTED_MARKER_KEY: &str = "$redacted";

/// Largest page size accepted from callers.
pub const MAX_PAGE_SIZE: u64 = 500;

/// One row returned by a record mapper, keyed by column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Creates a record from a JSON object.
    pub fn new(data: Value) -> AppResult<Self> {
        match data {
            Value::Object(columns) => Ok(Self(columns)),
            _ => Err(AppError::Validation(
                "record data must be a JSON object".to_owned(),
            )),
        }
    }

    /// Returns the value of a column, if present.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Returns every column.
    #[must_use]
    pub fn columns(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the record into its columns.
    #[must_use]
    pub fn into_columns(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

/// Column value after masking.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Visible value, possibly `null`.
    Visible(Value),
    /// Value withheld by a column rule.
    Redacted,
}

impl Cell {
    /// Returns whether the value was withheld.
    #[must_use]
    pub fn is_redacted(&self) -> bool {
        matches!(self, Self::Redacted)
    }

    /// Returns the visible value.
    #[must_use]
    pub fn visible(&self) -> Option<&Value> {
        match self {
            Self::Visible(value) => Some(value),
            Self::Redacted => None,
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Visible(value) => value.serialize(serializer),
            Self::Redacted => {
                let mut marker = serializer.serialize_map(Some(1))?;
                marker.serialize_entry(REDACTED_MARKER_KEY, &true)?;
                marker.end()
            }
        }
    }
}

/// Record with column rules applied; every original key is kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MaskedRecord(BTreeMap<String, Cell>);

impl MaskedRecord {
    /// Creates a masked record from cells.
    #[must_use]
    pub fn new(cells: BTreeMap<String, Cell>) -> Self {
        Self(cells)
    }

    /// Returns the cell of a column, if present.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.0.get(column)
    }

    /// Returns every cell.
    #[must_use]
    pub fn cells(&self) -> &BTreeMap<String, Cell> {
        &self.0
    }
}

/// One-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PageRequestParts")]
pub struct PageRequest {
    page: u64,
    size: u64,
}

#[derive(Deserialize)]
struct PageRequestParts {
    page: u64,
    size: u64,
}

impl TryFrom<PageRequestParts> for PageRequest {
    type Error = AppError;

    fn try_from(parts: PageRequestParts) -> Result<Self, Self::Error> {
        Self::new(parts.page, parts.size)
    }
}

impl PageRequest {
    /// Creates a validated page request.
    pub fn new(page: u64, size: u64) -> AppResult<Self> {
        if page == 0 {
            return Err(AppError::Validation(
                "page number starts at 1".to_owned(),
            ));
        }

        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(AppError::Validation(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        Ok(Self { page, size })
    }

    /// Returns the one-based page number.
    #[must_use]
    pub fn page(&self) -> u64 {
        self.page
    }

    /// Returns the page size.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the number of rows skipped.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, size: 10 }
    }
}

/// One page of results with the unpaginated total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// Rows of the requested page.
    pub records: Vec<T>,
    /// Rows matching the query across all pages.
    pub total: u64,
    /// One-based page number.
    pub page: u64,
    /// Page size.
    pub size: u64,
}

impl<T> Page<T> {
    /// Returns an empty page for the request.
    #[must_use]
    pub fn empty(request: PageRequest) -> Self {
        Self {
            records: Vec::new(),
            total: 0,
            page: request.page(),
            size: request.size(),
        }
    }

    /// Maps every record, keeping paging metadata.
    pub fn try_map<U>(self, mut map: impl FnMut(T) -> AppResult<U>) -> AppResult<Page<U>> {
        let records = self
            .records
            .into_iter()
            .map(&mut map)
            .collect::<AppResult<Vec<U>>>()?;

        Ok(Page {
            records,
            total: self.total,
            page: self.page,
            size: self.size,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::{Value, json};

    use super::{Cell, MaskedRecord, PageRequest, Record};

    #[test]
    fn redacted_cells_differ_from_null() {
        let masked = MaskedRecord::new(BTreeMap::from([
            ("phone".to_owned(), Cell::Redacted),
            ("email".to_owned(), Cell::Visible(Value::Null)),
        ]));

        let encoded = serde_json::to_value(&masked).unwrap_or_default();
        assert_eq!(encoded, json!({"phone": {"$redacted": true}, "email": null}));
    }

    #[test]
    fn record_requires_object() {
        assert!(Record::new(json!([1, 2])).is_err());
        assert!(Record::new(json!({"id": 1})).is_ok());
    }

    #[test]
    fn page_request_bounds() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 0).is_err());
        assert!(PageRequest::new(1, 501).is_err());
        assert_eq!(PageRequest::new(3, 20).map(|page| page.offset()).ok(), Some(40));
    }

    #[test]
    fn deserialized_page_requests_are_bounds_checked() {
        let zero_page = serde_json::from_value::<PageRequest>(json!({"page": 0, "size": 10}));
        assert!(zero_page.is_err());

        let oversized = serde_json::from_value::<PageRequest>(json!({"page": 1, "size": 501}));
        assert!(oversized.is_err());

        let valid = serde_json::from_value::<PageRequest>(json!({"page": 2, "size": 25}));
        assert_eq!(valid.map(|page| page.offset()).ok(), Some(25));
    }
}
