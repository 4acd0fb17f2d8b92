//! Layer-to-layer type cascade.
//!
//! # Responsibility
//! - Expose the pure mapping tables (`type_mapping`).
//! - Derive the type of one layer from the layer above it.
//!
//! # Invariants
//! - Derivation never fails: missing source types yield `None` (no-op).

pub mod type_mapping;

use crate::model::attribute::Attribute;
use crate::model::layer::Layer;
use type_mapping::{conceptual_to_logical, default_length, logical_to_physical};

/// Type and default length derived for one target layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedType {
    pub type_name: String,
    pub length: Option<i64>,
}

/// Full per-layer type set of one attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerTypes {
    pub conceptual: Option<String>,
    pub logical: Option<String>,
    pub physical: Option<String>,
    pub length: Option<i64>,
}

/// Derives the `target` layer type from `source_type`, the type one layer up.
///
/// Returns `None` for the conceptual layer and when the source is absent.
pub fn derive_layer_type(source_type: Option<&str>, target: Layer) -> Option<DerivedType> {
    let source = source_type.map(str::trim).filter(|value| !value.is_empty())?;
    let type_name = match target {
        Layer::Conceptual => return None,
        Layer::Logical => conceptual_to_logical(source),
        Layer::Physical => logical_to_physical(source),
    };
    let length = default_length(&type_name);
    Some(DerivedType { type_name, length })
}

/// Strict cascade used when populating a new family.
///
/// Logical derives from conceptual and physical from logical; a layer keeps
/// the canonical value only when nothing upstream exists to derive it from.
pub fn cascade_types(attribute: &Attribute) -> LayerTypes {
    let conceptual = attribute.conceptual_type.clone();
    let logical = derive_layer_type(conceptual.as_deref(), Layer::Logical)
        .map(|derived| derived.type_name)
        .or_else(|| attribute.logical_type.clone());
    let physical = derive_layer_type(logical.as_deref(), Layer::Physical);
    let length = physical
        .as_ref()
        .and_then(|derived| derived.length)
        .or(attribute.length);

    LayerTypes {
        conceptual,
        logical,
        physical: physical
            .map(|derived| derived.type_name)
            .or_else(|| attribute.physical_type.clone()),
        length,
    }
}

/// Fills blank downstream types, keeping caller-provided overrides.
pub fn fill_missing_types(types: &mut LayerTypes) {
    if types.logical.is_none() {
        types.logical = derive_layer_type(types.conceptual.as_deref(), Layer::Logical)
            .map(|derived| derived.type_name);
    }
    if types.physical.is_none() {
        if let Some(derived) = derive_layer_type(types.logical.as_deref(), Layer::Physical) {
            if types.length.is_none() {
                types.length = derived.length;
            }
            types.physical = Some(derived.type_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{derive_layer_type, fill_missing_types, LayerTypes};
    use crate::model::layer::Layer;

    #[test]
    fn conceptual_target_is_never_derived() {
        assert_eq!(derive_layer_type(Some("Text"), Layer::Conceptual), None);
    }

    #[test]
    fn blank_source_is_a_no_op() {
        assert_eq!(derive_layer_type(None, Layer::Physical), None);
        assert_eq!(derive_layer_type(Some("  "), Layer::Logical), None);
    }

    #[test]
    fn fill_keeps_overrides() {
        let mut types = LayerTypes {
            conceptual: Some("Text".to_string()),
            logical: Some("TEXT".to_string()),
            physical: None,
            length: None,
        };
        fill_missing_types(&mut types);
        assert_eq!(types.logical.as_deref(), Some("TEXT"));
        assert_eq!(types.physical.as_deref(), Some("text"));
        assert_eq!(types.length, None);
    }
}
