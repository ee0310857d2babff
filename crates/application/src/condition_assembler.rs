use std::collections::BTreeSet;
use std::str::FromStr;

use breeze_core::{AppError, AppResult};
use breeze_domain::{Predicate, PredicateList, validate_identifier};
use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use serde_json::{Map, Value};

/// Comparison mode of a declared query field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionMode {
    /// `column = value`.
    Equal,
    /// `column LIKE %value%`.
    Like,
    /// `column IN (values)`.
    In,
    /// `column > value`.
    Gt,
    /// `column < value`.
    Lt,
    /// Inclusive bounds taken from two fields.
    Range,
}

impl ConditionMode {
    /// Returns the stable configuration value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "EQUAL",
            Self::Like => "LIKE",
            Self::In => "IN",
            Self::Gt => "GT",
            Self::Lt => "LT",
            Self::Range => "RANGE",
        }
    }
}

impl FromStr for ConditionMode {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "EQUAL" => Ok(Self::Equal),
            "LIKE" => Ok(Self::Like),
            "IN" => Ok(Self::In),
            "GT" => Ok(Self::Gt),
            "LT" => Ok(Self::Lt),
            "RANGE" => Ok(Self::Range),
            _ => Err(AppError::Configuration(format!(
                "unknown condition mode '{value}'"
            ))),
        }
    }
}

/// Value type a declared field is coerced to before it reaches a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldType {
    /// Strings; numbers and booleans are taken in their text form.
    #[default]
    Text,
    /// 64-bit integers, also accepted as numeric strings.
    Integer,
    /// Floating point numbers, also accepted as numeric strings.
    Decimal,
    /// Booleans, also accepted as `"true"`/`"false"`.
    Boolean,
    /// RFC 3339 timestamps or `YYYY-MM-DD` dates.
    Timestamp,
}

impl FieldType {
    /// Returns the stable configuration value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Decimal => "DECIMAL",
            Self::Boolean => "BOOLEAN",
            Self::Timestamp => "TIMESTAMP",
        }
    }

    fn coerce(self, field: &str, value: Value) -> AppResult<Value> {
        let coerced = match (self, value) {
            (_, Value::Null) => Some(Value::Null),
            (Self::Text, Value::String(text)) => Some(Value::String(text)),
            (Self::Text, Value::Number(number)) => Some(Value::String(number.to_string())),
            (Self::Text, Value::Bool(flag)) => Some(Value::String(flag.to_string())),
            (Self::Integer, Value::Number(number)) => number.as_i64().map(Value::from),
            (Self::Integer, Value::String(text)) => {
                text.trim().parse::<i64>().ok().map(Value::from)
            }
            (Self::Decimal, Value::Number(number)) => Some(Value::Number(number)),
            (Self::Decimal, Value::String(text)) => text
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            (Self::Boolean, Value::Bool(flag)) => Some(Value::Bool(flag)),
            (Self::Boolean, Value::String(text)) => match text.trim() {
                value if value.eq_ignore_ascii_case("true") => Some(Value::Bool(true)),
                value if value.eq_ignore_ascii_case("false") => Some(Value::Bool(false)),
                _ => None,
            },
            (Self::Timestamp, Value::String(text)) => {
                let text = text.trim();
                let parses = DateTime::parse_from_rfc3339(text).is_ok()
                    || NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok();
                parses.then(|| Value::String(text.to_owned()))
            }
            _ => None,
        };

        coerced.ok_or_else(|| {
            AppError::Validation(format!(
                "field '{field}' requires a {} value",
                self.as_str().to_ascii_lowercase()
            ))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BindingKind {
    Single { field: String, mode: ConditionMode },
    Range { from_field: String, to_field: String },
}

/// Binding of declared query field(s) to one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    column: String,
    kind: BindingKind,
    value_type: FieldType,
}

impl FieldBinding {
    /// Binds one field with a single-field mode.
    ///
    /// `ConditionMode::Range` is rejected when the declaration is built; use
    /// [`FieldBinding::range`] instead.
    #[must_use]
    pub fn new(field: impl Into<String>, column: impl Into<String>, mode: ConditionMode) -> Self {
        Self {
            column: column.into(),
            kind: BindingKind::Single {
                field: field.into(),
                mode,
            },
            value_type: FieldType::default(),
        }
    }

    /// Binds an equality field.
    #[must_use]
    pub fn equal(field: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(field, column, ConditionMode::Equal)
    }

    /// Binds a substring field.
    #[must_use]
    pub fn like(field: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(field, column, ConditionMode::Like)
    }

    /// Binds a membership field.
    #[must_use]
    pub fn in_list(field: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(field, column, ConditionMode::In)
    }

    /// Binds two fields as inclusive lower and upper bounds of one column.
    #[must_use]
    pub fn range(
        from_field: impl Into<String>,
        to_field: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            kind: BindingKind::Range {
                from_field: from_field.into(),
                to_field: to_field.into(),
            },
            value_type: FieldType::default(),
        }
    }

    /// Sets the type field values are coerced to; bindings default to text.
    #[must_use]
    pub fn of_type(mut self, value_type: FieldType) -> Self {
        self.value_type = value_type;
        self
    }

    /// Returns the target column.
    #[must_use]
    pub fn column(&self) -> &str {
        self.column.as_str()
    }

    /// Returns the value type.
    #[must_use]
    pub fn value_type(&self) -> FieldType {
        self.value_type
    }

    /// Returns the comparison mode.
    #[must_use]
    pub fn mode(&self) -> ConditionMode {
        match &self.kind {
            BindingKind::Single { mode, .. } => *mode,
            BindingKind::Range { .. } => ConditionMode::Range,
        }
    }

    fn source_fields(&self) -> Vec<&str> {
        match &self.kind {
            BindingKind::Single { field, .. } => vec![field.as_str()],
            BindingKind::Range {
                from_field,
                to_field,
            } => vec![from_field.as_str(), to_field.as_str()],
        }
    }
}

/// Validated set of field bindings for one query object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDeclaration {
    bindings: Vec<FieldBinding>,
}

impl QueryDeclaration {
    /// Validates bindings once at setup.
    pub fn new(bindings: Vec<FieldBinding>) -> AppResult<Self> {
        let mut seen_fields = BTreeSet::new();

        for binding in &bindings {
            validate_identifier("column", binding.column())?;

            if let BindingKind::Single {
                mode: ConditionMode::Range,
                field,
            } = &binding.kind
            {
                return Err(AppError::Configuration(format!(
                    "field '{field}' uses RANGE mode without from/to fields"
                )));
            }

            let mode = binding.mode();
            let type_fits_mode = match binding.value_type {
                FieldType::Text => true,
                FieldType::Boolean => matches!(mode, ConditionMode::Equal | ConditionMode::In),
                _ => mode != ConditionMode::Like,
            };
            if !type_fits_mode {
                return Err(AppError::Configuration(format!(
                    "column '{}' cannot use {} mode with {} values",
                    binding.column(),
                    mode.as_str(),
                    binding.value_type.as_str()
                )));
            }

            for field in binding.source_fields() {
                if field.trim().is_empty() {
                    return Err(AppError::Configuration(format!(
                        "binding for column '{}' has a blank field name",
                        binding.column()
                    )));
                }

                if !seen_fields.insert(field) {
                    return Err(AppError::Configuration(format!(
                        "field '{field}' is bound more than once"
                    )));
                }
            }
        }

        Ok(Self { bindings })
    }

    /// Returns a declaration without bindings.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Returns bindings in declaration order.
    #[must_use]
    pub fn bindings(&self) -> &[FieldBinding] {
        self.bindings.as_slice()
    }

    /// Builds predicates from the active fields of a JSON query object.
    ///
    /// Fields without a binding are ignored. Predicates follow declaration order.
    pub fn assemble(&self, declared_query: &Value) -> AppResult<PredicateList> {
        let empty = Map::new();
        let fields = match declared_query {
            Value::Object(fields) => fields,
            Value::Null => &empty,
            _ => {
                return Err(AppError::Validation(
                    "declared query must be a JSON object".to_owned(),
                ));
            }
        };

        let mut predicates = PredicateList::new();
        for binding in &self.bindings {
            match &binding.kind {
                BindingKind::Single { field, mode } => {
                    if let Some(predicate) = single_field_predicate(
                        binding.column(),
                        field,
                        *mode,
                        binding.value_type,
                        fields.get(field),
                    )? {
                        predicates.push(predicate);
                    }
                }
                BindingKind::Range {
                    from_field,
                    to_field,
                } => {
                    if let Some(from) =
                        typed_scalar(from_field, binding.value_type, fields.get(from_field))?
                    {
                        predicates.push(Predicate::Gte {
                            column: binding.column.clone(),
                            value: from,
                        });
                    }
                    if let Some(to) =
                        typed_scalar(to_field, binding.value_type, fields.get(to_field))?
                    {
                        predicates.push(Predicate::Lte {
                            column: binding.column.clone(),
                            value: to,
                        });
                    }
                }
            }
        }

        Ok(predicates)
    }

    /// Serializes a typed query object and assembles its predicates.
    pub fn assemble_from<T: Serialize>(&self, declared_query: &T) -> AppResult<PredicateList> {
        let value = serde_json::to_value(declared_query).map_err(|error| {
            AppError::Validation(format!("declared query is not serializable: {error}"))
        })?;
        self.assemble(&value)
    }
}

fn single_field_predicate(
    column: &str,
    field: &str,
    mode: ConditionMode,
    value_type: FieldType,
    value: Option<&Value>,
) -> AppResult<Option<Predicate>> {
    let column = column.to_owned();

    let predicate = match mode {
        ConditionMode::Equal => typed_scalar(field, value_type, value)?
            .map(|value| Predicate::Eq { column, value }),
        ConditionMode::Gt => typed_scalar(field, value_type, value)?
            .map(|value| Predicate::Gt { column, value }),
        ConditionMode::Lt => typed_scalar(field, value_type, value)?
            .map(|value| Predicate::Lt { column, value }),
        ConditionMode::Like => match typed_scalar(field, value_type, value)? {
            Some(Value::String(needle)) => Some(Predicate::Like {
                column,
                value: needle.trim().to_owned(),
            }),
            Some(_) => {
                return Err(AppError::Validation(format!(
                    "field '{field}' requires a string value for LIKE matching"
                )));
            }
            None => None,
        },
        ConditionMode::In => match value {
            None | Some(Value::Null) => None,
            Some(Value::Array(values)) => {
                if let Some(nested) = values
                    .iter()
                    .find(|value| value.is_array() || value.is_object())
                {
                    return Err(AppError::Validation(format!(
                        "field '{field}' contains a non-scalar value '{nested}'"
                    )));
                }
                let values = values
                    .iter()
                    .map(|value| value_type.coerce(field, value.clone()))
                    .collect::<AppResult<Vec<_>>>()?;
                Some(Predicate::in_values(column, values))
            }
            Some(_) => typed_scalar(field, value_type, value)?
                .map(|value| Predicate::in_values(column, vec![value])),
        },
        ConditionMode::Range => {
            return Err(AppError::Configuration(format!(
                "field '{field}' uses RANGE mode without from/to fields"
            )));
        }
    };

    Ok(predicate)
}

fn typed_scalar(
    field: &str,
    value_type: FieldType,
    value: Option<&Value>,
) -> AppResult<Option<Value>> {
    active_scalar(field, value)?
        .map(|value| value_type.coerce(field, value))
        .transpose()
}

/// Returns the value when present, non-null and not a blank string.
fn active_scalar(field: &str, value: Option<&Value>) -> AppResult<Option<Value>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::Array(_)) | Some(Value::Object(_)) => Err(AppError::Validation(format!(
            "field '{field}' requires a scalar value"
        ))),
        Some(value) => Ok(Some(value.clone())),
    }
}

#[cfg(test)]
mod tests {
    use breeze_core::AppError;
    use breeze_domain::Predicate;
    use serde::Serialize;
    use serde_json::json;

    use super::{ConditionMode, FieldBinding, FieldType, QueryDeclaration};

    fn user_query_declaration() -> QueryDeclaration {
        QueryDeclaration::new(vec![
            FieldBinding::equal("username", "username"),
            FieldBinding::equal("userId", "user_id").of_type(FieldType::Integer),
            FieldBinding::like("displayName", "display_name"),
            FieldBinding::in_list("deptIds", "dept_id").of_type(FieldType::Integer),
            FieldBinding::range("createTimeFrom", "createTimeTo", "create_time")
                .of_type(FieldType::Timestamp),
            FieldBinding::new("minAge", "age", ConditionMode::Gt).of_type(FieldType::Integer),
            FieldBinding::equal("isLock", "is_lock").of_type(FieldType::Boolean),
        ])
        .unwrap_or_else(|error| panic!("user query declaration should be valid: {error}"))
    }

    #[test]
    fn blank_equal_field_is_inactive() {
        let predicates = user_query_declaration()
            .assemble(&json!({"username": "", "userId": 5}))
            .unwrap_or_default();

        assert_eq!(predicates.as_slice(), &[Predicate::eq("user_id", 5)]);
    }

    #[test]
    fn like_trims_and_skips_blank_values() {
        let declaration = user_query_declaration();

        let blank = declaration
            .assemble(&json!({"displayName": "   "}))
            .unwrap_or_default();
        assert!(blank.is_empty());

        let active = declaration
            .assemble(&json!({"displayName": " ali "}))
            .unwrap_or_default();
        assert_eq!(
            active.as_slice(),
            &[Predicate::Like {
                column: "display_name".to_owned(),
                value: "ali".to_owned(),
            }]
        );
    }

    #[test]
    fn empty_in_collection_matches_nothing() {
        let predicates = user_query_declaration()
            .assemble(&json!({"deptIds": []}))
            .unwrap_or_default();

        assert_eq!(predicates.as_slice(), &[Predicate::MatchNone]);
    }

    #[test]
    fn in_accepts_scalar_as_single_value() {
        let predicates = user_query_declaration()
            .assemble(&json!({"deptIds": 10}))
            .unwrap_or_default();

        assert_eq!(
            predicates.as_slice(),
            &[Predicate::In {
                column: "dept_id".to_owned(),
                values: vec![json!(10)],
            }]
        );
    }

    #[test]
    fn range_emits_only_present_bounds() {
        let declaration = user_query_declaration();

        let lower_only = declaration
            .assemble(&json!({"createTimeFrom": "2024-01-01"}))
            .unwrap_or_default();
        assert_eq!(
            lower_only.as_slice(),
            &[Predicate::Gte {
                column: "create_time".to_owned(),
                value: json!("2024-01-01"),
            }]
        );

        let both = declaration
            .assemble(&json!({"createTimeFrom": "2024-01-01", "createTimeTo": "2024-12-31"}))
            .unwrap_or_default();
        assert_eq!(both.len(), 2);
    }

    #[test]
    fn predicates_follow_declaration_order() {
        let predicates = user_query_declaration()
            .assemble(&json!({"minAge": 18, "userId": 1, "username": "root"}))
            .unwrap_or_default();

        let columns: Vec<_> = predicates
            .as_slice()
            .iter()
            .filter_map(Predicate::column)
            .collect();
        assert_eq!(columns, vec!["username", "user_id", "age"]);
    }

    #[test]
    fn typed_query_objects_are_supported() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct UserQuery {
            username: Option<String>,
            user_id: Option<i64>,
        }

        let predicates = user_query_declaration()
            .assemble_from(&UserQuery {
                username: None,
                user_id: Some(5),
            })
            .unwrap_or_default();

        assert_eq!(predicates.as_slice(), &[Predicate::eq("user_id", 5)]);
    }

    #[test]
    fn non_object_query_is_rejected() {
        let result = user_query_declaration().assemble(&json!([1, 2, 3]));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn structured_value_for_scalar_mode_is_rejected() {
        let result = user_query_declaration().assemble(&json!({"userId": [1, 2]}));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn malformed_declarations_fail_at_setup() {
        let duplicate = QueryDeclaration::new(vec![
            FieldBinding::equal("userId", "user_id"),
            FieldBinding::like("userId", "username"),
        ]);
        assert!(matches!(duplicate, Err(AppError::Configuration(_))));

        let bad_column = QueryDeclaration::new(vec![FieldBinding::equal("userId", "user id")]);
        assert!(matches!(bad_column, Err(AppError::Configuration(_))));

        let bare_range = QueryDeclaration::new(vec![FieldBinding::new(
            "createTime",
            "create_time",
            ConditionMode::Range,
        )]);
        assert!(matches!(bare_range, Err(AppError::Configuration(_))));

        let same_bounds = QueryDeclaration::new(vec![FieldBinding::range(
            "createTime",
            "createTime",
            "create_time",
        )]);
        assert!(matches!(same_bounds, Err(AppError::Configuration(_))));
    }

    #[test]
    fn numeric_strings_are_coerced_for_integer_fields() {
        let predicates = user_query_declaration()
            .assemble(&json!({"userId": " 5 ", "deptIds": ["10", 11], "isLock": "false"}))
            .unwrap_or_default();

        assert_eq!(
            predicates.as_slice(),
            &[
                Predicate::eq("user_id", 5),
                Predicate::In {
                    column: "dept_id".to_owned(),
                    values: vec![json!(10), json!(11)],
                },
                Predicate::eq("is_lock", false),
            ]
        );
    }

    #[test]
    fn text_fields_take_numbers_in_text_form() {
        let predicates = user_query_declaration()
            .assemble(&json!({"username": 42}))
            .unwrap_or_default();

        assert_eq!(predicates.as_slice(), &[Predicate::eq("username", "42")]);
    }

    #[test]
    fn values_that_do_not_fit_the_field_type_are_rejected() {
        let declaration = user_query_declaration();

        for query in [
            json!({"userId": "five"}),
            json!({"userId": 5.5}),
            json!({"deptIds": [10, "ten"]}),
            json!({"isLock": "maybe"}),
            json!({"createTimeFrom": "yesterday"}),
        ] {
            let result = declaration.assemble(&query);
            assert!(
                matches!(result, Err(AppError::Validation(_))),
                "{query} should be rejected"
            );
        }
    }

    #[test]
    fn like_on_a_non_text_field_fails_at_setup() {
        let declaration = QueryDeclaration::new(vec![
            FieldBinding::like("userId", "user_id").of_type(FieldType::Integer),
        ]);
        assert!(matches!(declaration, Err(AppError::Configuration(_))));

        let ordered_flag = QueryDeclaration::new(vec![
            FieldBinding::new("isLock", "is_lock", ConditionMode::Gt).of_type(FieldType::Boolean),
        ]);
        assert!(matches!(ordered_flag, Err(AppError::Configuration(_))));
    }

    #[test]
    fn unknown_mode_is_a_configuration_error() {
        let parsed = "BETWEEN".parse::<ConditionMode>();
        assert!(matches!(parsed, Err(AppError::Configuration(_))));
    }
}
