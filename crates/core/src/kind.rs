//! Entity kinds kept in the local mirror.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The two catalogs mirrored on-device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Customers,
    Products,
}

impl EntityKind {
    /// Sync order: customers are fetched and written before products.
    pub const ALL: [EntityKind; 2] = [EntityKind::Customers, EntityKind::Products];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Customers => "customers",
            EntityKind::Products => "products",
        }
    }
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customers" => Ok(EntityKind::Customers),
            "products" => Ok(EntityKind::Products),
            other => Err(DomainError::validation(format!("unknown entity kind: {other}"))),
        }
    }
}
