use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salesdesk_core::{
    DomainResult, EntityKind, FieldDefault, FieldSpec, FieldType, RecordId, RecordSchema,
};

/// Remote → local column mapping for customers.
///
/// `id` and `name` are required; everything else is default-filled.
pub const CUSTOMER_SCHEMA: RecordSchema = RecordSchema::new(
    EntityKind::Customers,
    &[
        FieldSpec::required("id", "id", FieldType::Text),
        FieldSpec::required("name", "name", FieldType::Text),
        FieldSpec::optional("contact_name", "contact_person", FieldType::Text, FieldDefault::EmptyString),
        FieldSpec::optional("phone", "phone", FieldType::Text, FieldDefault::EmptyString),
        FieldSpec::optional("email", "email", FieldType::Text, FieldDefault::EmptyString),
        FieldSpec::optional("address", "address", FieldType::Text, FieldDefault::EmptyString),
        FieldSpec::optional("city", "city", FieldType::Text, FieldDefault::EmptyString),
        FieldSpec::optional("notes", "notes", FieldType::Text, FieldDefault::EmptyString),
        FieldSpec::optional("active", "is_active", FieldType::Bool, FieldDefault::True),
        FieldSpec::optional("created_at", "created_at", FieldType::Timestamp, FieldDefault::Null),
    ],
);

/// A customer row in the local mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: RecordId,
    pub name: String,
    pub contact_person: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub notes: String,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl CustomerRecord {
    /// Build a record from a remote row, applying the customer schema.
    pub fn from_remote(row: &serde_json::Value) -> DomainResult<Self> {
        CUSTOMER_SCHEMA.decode(row)
    }

    /// Minimal record with every optional field at its default.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(id),
            name: name.into(),
            contact_person: String::new(),
            phone: String::new(),
            email: String::new(),
            address: String::new(),
            city: String::new(),
            notes: String::new(),
            is_active: true,
            created_at: None,
        }
    }

    /// Inactive customers stay in the mirror but are hidden from order entry.
    pub fn can_order(&self) -> bool {
        self.is_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sparse_remote_row_decodes_with_defaults() {
        let record = CustomerRecord::from_remote(&json!({ "id": 42, "name": "Kiosk Ana" })).unwrap();
        assert_eq!(record, CustomerRecord::new("42", "Kiosk Ana"));
    }

    #[test]
    fn full_remote_row_is_renamed() {
        let record = CustomerRecord::from_remote(&json!({
            "id": "c-1",
            "name": "Ferretería Sol",
            "contact_name": "Luis",
            "phone": "555-0101",
            "email": "luis@sol.example",
            "address": "Av. Central 12",
            "city": "Cartago",
            "notes": "visit on mondays",
            "active": false,
            "created_at": "2024-03-01T09:30:00+00:00",
            "user_id": "ignored"
        }))
        .unwrap();

        assert_eq!(record.contact_person, "Luis");
        assert!(!record.is_active);
        assert!(!record.can_order());
        assert_eq!(record.city, "Cartago");
        assert_eq!(
            record.created_at.unwrap().to_rfc3339(),
            "2024-03-01T09:30:00+00:00"
        );
    }

    #[test]
    fn unparseable_created_at_becomes_none() {
        let record = CustomerRecord::from_remote(&json!({
            "id": "c-2",
            "name": "X",
            "created_at": "yesterday"
        }))
        .unwrap();
        assert_eq!(record.created_at, None);
    }

    #[test]
    fn row_without_name_is_rejected() {
        assert!(CustomerRecord::from_remote(&json!({ "id": "c-3" })).is_err());
    }
}
