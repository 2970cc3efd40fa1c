use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salesdesk_core::{
    DomainResult, EntityKind, FieldDefault, FieldSpec, FieldType, RecordId, RecordSchema,
};

/// Remote → local column mapping for products.
pub const PRODUCT_SCHEMA: RecordSchema = RecordSchema::new(
    EntityKind::Products,
    &[
        FieldSpec::required("id", "id", FieldType::Text),
        FieldSpec::required("name", "name", FieldType::Text),
        FieldSpec::optional("code", "sku", FieldType::Text, FieldDefault::EmptyString),
        // Unpriced products exist (quoted per order), so no numeric default.
        FieldSpec::optional("unit_price", "price", FieldType::Number, FieldDefault::Null),
        FieldSpec::optional("unit", "unit", FieldType::Text, FieldDefault::EmptyString),
        FieldSpec::optional("category", "category", FieldType::Text, FieldDefault::EmptyString),
        FieldSpec::optional("stock", "stock_quantity", FieldType::Number, FieldDefault::Zero),
        FieldSpec::optional("active", "is_active", FieldType::Bool, FieldDefault::True),
        FieldSpec::optional("created_at", "created_at", FieldType::Timestamp, FieldDefault::Null),
    ],
);

/// A product row in the local mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: RecordId,
    pub name: String,
    pub sku: String,
    pub price: Option<f64>,
    pub unit: String,
    pub category: String,
    pub stock_quantity: f64,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl ProductRecord {
    /// Build a record from a remote row, applying the product schema.
    pub fn from_remote(row: &serde_json::Value) -> DomainResult<Self> {
        PRODUCT_SCHEMA.decode(row)
    }

    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(id),
            name: name.into(),
            sku: String::new(),
            price: None,
            unit: String::new(),
            category: String::new(),
            stock_quantity: 0.0,
            is_active: true,
            created_at: None,
        }
    }

    /// Check if product can be sold (active and priced).
    pub fn can_be_sold(&self) -> bool {
        self.is_active && self.price.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn sparse_remote_row_decodes_with_defaults() {
        let record = ProductRecord::from_remote(&json!({ "id": 3, "name": "Arroz 1kg" })).unwrap();
        assert_eq!(record, ProductRecord::new("3", "Arroz 1kg"));
        assert!(!record.can_be_sold());
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let record = ProductRecord::from_remote(&json!({
            "id": "p-1",
            "name": "Café 500g",
            "code": "CAF-500",
            "unit_price": "4.25",
            "stock": "18"
        }))
        .unwrap();
        assert_eq!(record.sku, "CAF-500");
        assert_eq!(record.price, Some(4.25));
        assert_eq!(record.stock_quantity, 18.0);
        assert!(record.can_be_sold());
    }

    #[test]
    fn garbage_price_falls_back_to_unpriced() {
        let record = ProductRecord::from_remote(&json!({
            "id": "p-2",
            "name": "Azúcar",
            "unit_price": "ask"
        }))
        .unwrap();
        assert_eq!(record.price, None);
    }

    proptest! {
        #[test]
        fn integer_prices_survive_decoding(price in 0i64..1_000_000) {
            let record = ProductRecord::from_remote(&json!({
                "id": "p",
                "name": "n",
                "unit_price": price
            })).unwrap();
            prop_assert_eq!(record.price, Some(price as f64));
        }
    }
}
