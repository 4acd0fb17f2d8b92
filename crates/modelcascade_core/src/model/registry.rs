//! Flat reference taxonomies shared by models and objects.

use super::{DataAreaId, DomainId, SystemId};
use serde::{Deserialize, Serialize};

/// Business domain, e.g. "Sales".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub id: DomainId,
    pub name: String,
    pub description: Option<String>,
    pub color_hex: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Sub-area of exactly one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataArea {
    pub id: DataAreaId,
    pub domain_id: DomainId,
    pub name: String,
    pub description: Option<String>,
    pub color_hex: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Source or target platform, e.g. "Data Lake".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct System {
    pub id: SystemId,
    pub name: String,
    pub category: String,
    pub system_type: String,
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDomain {
    pub name: String,
    pub description: Option<String>,
    pub color_hex: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDataArea {
    pub domain_id: DomainId,
    pub name: String,
    pub description: Option<String>,
    pub color_hex: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSystem {
    pub name: String,
    /// Defaults to `other` when blank.
    pub category: String,
    /// Defaults to `database` when blank.
    pub system_type: String,
    pub description: Option<String>,
}

impl NewSystem {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: String::new(),
            system_type: String::new(),
            description: None,
        }
    }
}
