use core::str::FromStr;
use serde::{Deserialize, Serialize};

use salesdesk_core::{DomainError, EntityKind, UserId};

/// Which backend dataset an account works against.
///
/// Demo accounts read from separate tables so trial users never see (or
/// pollute) production rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetProfile {
    #[default]
    Standard,
    Demo,
}

impl FromStr for DatasetProfile {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "" => Ok(DatasetProfile::Standard),
            "demo" => Ok(DatasetProfile::Demo),
            other => Err(DomainError::validation(format!("unknown dataset profile: {other}"))),
        }
    }
}

/// Identity used to scope remote queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityContext {
    pub user_id: UserId,
    pub email: String,
    pub dataset: DatasetProfile,
}

impl IdentityContext {
    pub fn new(user_id: UserId, email: impl Into<String>, dataset: DatasetProfile) -> Self {
        Self {
            user_id,
            email: email.into(),
            dataset,
        }
    }

    /// Remote tables this identity syncs from.
    pub fn tables(&self) -> TableSet {
        TableSet::for_profile(self.dataset)
    }
}

/// Remote table names backing each mirrored kind, plus the owner column used
/// to filter rows down to the signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSet {
    pub customers: &'static str,
    pub products: &'static str,
    pub owner_column: &'static str,
}

impl TableSet {
    pub const fn for_profile(profile: DatasetProfile) -> Self {
        match profile {
            DatasetProfile::Standard => Self {
                customers: "customers",
                products: "products",
                owner_column: "user_id",
            },
            DatasetProfile::Demo => Self {
                customers: "demo_customers",
                products: "demo_products",
                owner_column: "user_id",
            },
        }
    }

    pub fn table_for(&self, kind: EntityKind) -> &'static str {
        match kind {
            EntityKind::Customers => self.customers,
            EntityKind::Products => self.products,
        }
    }

    /// Reverse lookup used to route realtime change events.
    pub fn kind_for(&self, table: &str) -> Option<EntityKind> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| self.table_for(*kind) == table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_identity_uses_production_tables() {
        let identity = IdentityContext::new(UserId::new(), "a@b.c", DatasetProfile::Standard);
        let tables = identity.tables();
        assert_eq!(tables.table_for(EntityKind::Customers), "customers");
        assert_eq!(tables.table_for(EntityKind::Products), "products");
    }

    #[test]
    fn demo_identity_uses_demo_tables() {
        let tables = TableSet::for_profile(DatasetProfile::Demo);
        assert_eq!(tables.customers, "demo_customers");
        assert_eq!(tables.products, "demo_products");
        assert_eq!(tables.owner_column, "user_id");
    }

    #[test]
    fn kind_for_is_scoped_to_the_profile() {
        let standard = TableSet::for_profile(DatasetProfile::Standard);
        assert_eq!(standard.kind_for("products"), Some(EntityKind::Products));
        assert_eq!(standard.kind_for("demo_products"), None);
        assert_eq!(standard.kind_for("orders"), None);
    }

    #[test]
    fn dataset_profile_parses_case_insensitively() {
        assert_eq!("DEMO".parse::<DatasetProfile>().unwrap(), DatasetProfile::Demo);
        assert_eq!("".parse::<DatasetProfile>().unwrap(), DatasetProfile::Standard);
        assert!("sandbox".parse::<DatasetProfile>().is_err());
    }
}
