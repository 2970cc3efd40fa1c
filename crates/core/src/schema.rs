//! Declarative record schemas for mirrored rows.
//!
//! Remote rows arrive as loosely-shaped JSON objects. Each entity kind states,
//! as data, which remote column feeds which local field, what type the field
//! holds, and how a missing optional value is filled. Normalisation never
//! fails on a missing optional field; only required fields can reject a row.

use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

use crate::error::{DomainError, DomainResult};
use crate::kind::EntityKind;

/// Value used when an optional field is absent or null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    EmptyString,
    False,
    True,
    Zero,
    Null,
}

impl FieldDefault {
    pub fn value(self) -> Value {
        match self {
            FieldDefault::EmptyString => Value::String(String::new()),
            FieldDefault::False => Value::Bool(false),
            FieldDefault::True => Value::Bool(true),
            FieldDefault::Zero => Value::Number(Number::from(0)),
            FieldDefault::Null => Value::Null,
        }
    }
}

/// Shape of a local field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Text; numbers and booleans are stringified (remote ids are often integers).
    Text,
    /// Boolean; accepts `"true"`/`"false"` and `0`/`1`.
    Bool,
    /// Any JSON number; numeric strings are parsed.
    Number,
    /// RFC 3339 timestamp kept as text.
    Timestamp,
}

impl FieldType {
    fn name(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Bool => "boolean",
            FieldType::Number => "number",
            FieldType::Timestamp => "timestamp",
        }
    }

    /// Coerce a non-null remote value, or `None` if it does not fit.
    fn coerce(self, value: &Value) -> Option<Value> {
        match (self, value) {
            (FieldType::Text, Value::String(_)) => Some(value.clone()),
            (FieldType::Timestamp, Value::String(s)) => chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|_| value.clone()),
            (FieldType::Text, Value::Number(n)) => Some(Value::String(n.to_string())),
            (FieldType::Text, Value::Bool(b)) => Some(Value::String(b.to_string())),
            (FieldType::Bool, Value::Bool(_)) => Some(value.clone()),
            (FieldType::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Some(Value::Bool(true)),
                "false" | "f" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            (FieldType::Bool, Value::Number(n)) => match n.as_i64() {
                Some(0) => Some(Value::Bool(false)),
                Some(1) => Some(Value::Bool(true)),
                _ => None,
            },
            (FieldType::Number, Value::Number(_)) => Some(value.clone()),
            (FieldType::Number, Value::String(s)) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    Some(Value::Number(Number::from(i)))
                } else {
                    s.parse::<f64>()
                        .ok()
                        .and_then(Number::from_f64)
                        .map(Value::Number)
                }
            }
            _ => None,
        }
    }
}

/// Whether a field must be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional(FieldDefault),
}

/// One column mapping: remote name → local name, type, presence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub remote: &'static str,
    pub local: &'static str,
    pub ty: FieldType,
    pub presence: Presence,
}

impl FieldSpec {
    pub const fn required(remote: &'static str, local: &'static str, ty: FieldType) -> Self {
        Self {
            remote,
            local,
            ty,
            presence: Presence::Required,
        }
    }

    pub const fn optional(
        remote: &'static str,
        local: &'static str,
        ty: FieldType,
        default: FieldDefault,
    ) -> Self {
        Self {
            remote,
            local,
            ty,
            presence: Presence::Optional(default),
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self.presence, Presence::Required)
    }
}

/// Full mapping for one entity kind.
#[derive(Debug, Clone, Copy)]
pub struct RecordSchema {
    pub kind: EntityKind,
    pub fields: &'static [FieldSpec],
}

impl RecordSchema {
    pub const fn new(kind: EntityKind, fields: &'static [FieldSpec]) -> Self {
        Self { kind, fields }
    }

    /// Map a remote row onto the local field layout.
    ///
    /// The remote column name is looked up first, then the local one, so an
    /// already-normalised row passes through unchanged. Columns not named by
    /// the schema are dropped.
    pub fn normalize(&self, row: &Value) -> DomainResult<Map<String, Value>> {
        let object = row.as_object().ok_or_else(|| {
            DomainError::validation(format!("{} row is not a JSON object", self.kind))
        })?;

        let mut out = Map::with_capacity(self.fields.len());
        for field in self.fields {
            let raw = object
                .get(field.remote)
                .or_else(|| object.get(field.local))
                .filter(|v| !v.is_null());

            let value = match (raw, field.presence) {
                (Some(v), presence) => match field.ty.coerce(v) {
                    Some(coerced) => coerced,
                    None => match presence {
                        Presence::Required => {
                            return Err(DomainError::field_type(field.remote, field.ty.name()));
                        }
                        Presence::Optional(default) => {
                            tracing::debug!(
                                kind = %self.kind,
                                field = field.remote,
                                "optional field has unexpected type; using default"
                            );
                            default.value()
                        }
                    },
                },
                (None, Presence::Required) => {
                    return Err(DomainError::missing_field(field.remote));
                }
                (None, Presence::Optional(default)) => default.value(),
            };

            out.insert(field.local.to_string(), value);
        }

        Ok(out)
    }

    /// Normalise a row and deserialize it into the kind's record type.
    pub fn decode<T: DeserializeOwned>(&self, row: &Value) -> DomainResult<T> {
        let normalized = self.normalize(row)?;
        serde_json::from_value(Value::Object(normalized))
            .map_err(|e| DomainError::validation(format!("{} row: {e}", self.kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    const FIELDS: &[FieldSpec] = &[
        FieldSpec::required("id", "id", FieldType::Text),
        FieldSpec::optional("contact_name", "contact", FieldType::Text, FieldDefault::EmptyString),
        FieldSpec::optional("active", "is_active", FieldType::Bool, FieldDefault::True),
        FieldSpec::optional("stock", "stock", FieldType::Number, FieldDefault::Zero),
        FieldSpec::optional("created_at", "created_at", FieldType::Timestamp, FieldDefault::Null),
    ];

    const SCHEMA: RecordSchema = RecordSchema::new(EntityKind::Customers, FIELDS);

    #[test]
    fn missing_optional_fields_are_default_filled() {
        let out = SCHEMA.normalize(&json!({ "id": "c-1" })).unwrap();
        assert_eq!(out["id"], json!("c-1"));
        assert_eq!(out["contact"], json!(""));
        assert_eq!(out["is_active"], json!(true));
        assert_eq!(out["stock"], json!(0));
        assert_eq!(out["created_at"], Value::Null);
    }

    #[test]
    fn remote_columns_are_renamed_and_unknown_ones_dropped() {
        let out = SCHEMA
            .normalize(&json!({ "id": 7, "contact_name": "Ana", "active": "false", "extra": 1 }))
            .unwrap();
        assert_eq!(out["id"], json!("7"));
        assert_eq!(out["contact"], json!("Ana"));
        assert_eq!(out["is_active"], json!(false));
        assert!(!out.contains_key("extra"));
        assert!(!out.contains_key("contact_name"));
    }

    #[test]
    fn missing_required_field_rejects_row() {
        let err = SCHEMA.normalize(&json!({ "contact_name": "Ana" })).unwrap_err();
        assert_eq!(err, DomainError::MissingField("id".to_string()));

        let err = SCHEMA.normalize(&json!({ "id": null })).unwrap_err();
        assert_eq!(err, DomainError::MissingField("id".to_string()));
    }

    #[test]
    fn wrongly_typed_optional_field_falls_back_to_default() {
        let out = SCHEMA
            .normalize(&json!({ "id": "x", "stock": { "nested": true } }))
            .unwrap();
        assert_eq!(out["stock"], json!(0));
    }

    #[test]
    fn wrongly_typed_required_field_is_an_error() {
        let err = SCHEMA.normalize(&json!({ "id": ["x"] })).unwrap_err();
        assert!(matches!(err, DomainError::FieldType { .. }));
    }

    #[test]
    fn normalised_rows_pass_through_unchanged() {
        let first = SCHEMA
            .normalize(&json!({ "id": "c-9", "contact_name": "Bo", "stock": "12" }))
            .unwrap();
        let second = SCHEMA.normalize(&Value::Object(first.clone())).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn non_object_rows_are_rejected() {
        assert!(matches!(
            SCHEMA.normalize(&json!([1, 2])),
            Err(DomainError::Validation(_))
        ));
    }

    proptest! {
        #[test]
        fn any_subset_of_optional_fields_normalises(
            contact in proptest::option::of("[a-zA-Z ]{0,12}"),
            active in proptest::option::of(any::<bool>()),
            stock in proptest::option::of(any::<i32>()),
        ) {
            let mut row = Map::new();
            row.insert("id".into(), json!("r"));
            if let Some(c) = contact { row.insert("contact_name".into(), json!(c)); }
            if let Some(a) = active { row.insert("active".into(), json!(a)); }
            if let Some(s) = stock { row.insert("stock".into(), json!(s)); }

            let out = SCHEMA.normalize(&Value::Object(row)).unwrap();
            prop_assert_eq!(out.len(), FIELDS.len());
        }
    }
}
