use super::layer::Layer;
use super::{DataAreaId, DataModelId, DomainId, SystemId};
use serde::{Deserialize, Serialize};

/// One layer of a model family.
///
/// Conceptual models are family roots (`parent_model_id = None`); logical and
/// physical models of one family point at the same conceptual root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataModel {
    pub id: DataModelId,
    pub name: String,
    pub layer: Layer,
    pub parent_model_id: Option<DataModelId>,
    pub target_system_id: Option<SystemId>,
    pub domain_id: Option<DomainId>,
    pub data_area_id: Option<DataAreaId>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DataModel {
    /// Id of the conceptual root of this model's family.
    pub fn family_root_id(&self) -> DataModelId {
        self.parent_model_id.unwrap_or(self.id)
    }
}

/// Input for a standalone model outside family creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDataModel {
    pub name: String,
    pub layer: Layer,
    pub parent_model_id: Option<DataModelId>,
    pub target_system_id: Option<SystemId>,
    pub domain_id: Option<DomainId>,
    pub data_area_id: Option<DataAreaId>,
}

impl NewDataModel {
    pub fn new(name: impl Into<String>, layer: Layer) -> Self {
        Self {
            name: name.into(),
            layer,
            parent_model_id: None,
            target_system_id: None,
            domain_id: None,
            data_area_id: None,
        }
    }
}
