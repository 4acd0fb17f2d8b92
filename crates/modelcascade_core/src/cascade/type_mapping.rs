//! Type derivation between conceptual, logical and physical layers.
//!
//! # Responsibility
//! - Map conceptual business types to logical types.
//! - Map logical types to physical (PostgreSQL-flavoured) types.
//! - Provide default lengths for length-bearing types.
//!
//! # Invariants
//! - Every function here is pure and total.
//! - Unknown conceptual types fall back to the generic `VARCHAR`.
//! - Unknown logical types pass through unchanged.
//! - Explicit parameters such as `VARCHAR(100)` survive mapping and win over
//!   default lengths.

use once_cell::sync::Lazy;
use regex::Regex;

/// Logical type used when a conceptual type has no table entry.
pub const FALLBACK_LOGICAL_TYPE: &str = "VARCHAR";

static TYPE_WITH_PARAMS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z][A-Za-z0-9_ ]*?)\s*\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\)\s*$")
        .expect("valid type parameter regex")
});

const CONCEPTUAL_TO_LOGICAL: &[(&str, &str)] = &[
    ("identifier", "UUID"),
    ("id", "UUID"),
    ("text", "VARCHAR"),
    ("string", "VARCHAR"),
    ("name", "VARCHAR"),
    ("email", "VARCHAR"),
    ("phone", "VARCHAR"),
    ("url", "VARCHAR"),
    ("code", "CHAR"),
    ("long text", "TEXT"),
    ("longtext", "TEXT"),
    ("number", "DECIMAL"),
    ("decimal", "DECIMAL"),
    ("money", "DECIMAL"),
    ("currency", "DECIMAL"),
    ("percentage", "DECIMAL"),
    ("integer", "INTEGER"),
    ("count", "INTEGER"),
    ("quantity", "INTEGER"),
    ("big integer", "BIGINT"),
    ("boolean", "BOOLEAN"),
    ("flag", "BOOLEAN"),
    ("date", "DATE"),
    ("datetime", "TIMESTAMP"),
    ("timestamp", "TIMESTAMP"),
    ("time", "TIME"),
    ("binary", "BLOB"),
    ("document", "JSON"),
    ("json", "JSON"),
];

const LOGICAL_TO_PHYSICAL: &[(&str, &str)] = &[
    ("UUID", "uuid"),
    ("VARCHAR", "varchar"),
    ("NVARCHAR", "varchar"),
    ("CHAR", "char"),
    ("TEXT", "text"),
    ("DECIMAL", "numeric"),
    ("NUMERIC", "numeric"),
    ("INTEGER", "integer"),
    ("INT", "integer"),
    ("SMALLINT", "smallint"),
    ("BIGINT", "bigint"),
    ("FLOAT", "double precision"),
    ("DOUBLE", "double precision"),
    ("BOOLEAN", "boolean"),
    ("DATE", "date"),
    ("TIMESTAMP", "timestamp"),
    ("TIME", "time"),
    ("BLOB", "bytea"),
    ("BINARY", "bytea"),
    ("JSON", "jsonb"),
];

const DEFAULT_LENGTHS: &[(&str, i64)] = &[
    ("VARCHAR", 255),
    ("NVARCHAR", 255),
    ("CHAR", 10),
    ("NCHAR", 10),
    ("VARBINARY", 255),
    ("DECIMAL", 18),
    ("NUMERIC", 18),
];

/// A type name split from its optional `(length[, scale])` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpec {
    pub base: String,
    pub length: Option<i64>,
    pub scale: Option<i64>,
}

/// Splits `VARCHAR(100)` into base `VARCHAR` and length `100`.
///
/// Types without parameters come back trimmed with no length.
pub fn split_type_length(value: &str) -> TypeSpec {
    if let Some(caps) = TYPE_WITH_PARAMS_RE.captures(value) {
        let number = |index: usize| caps.get(index).and_then(|m| m.as_str().parse::<i64>().ok());
        return TypeSpec {
            base: caps[1].trim().to_string(),
            length: number(2),
            scale: number(3),
        };
    }
    TypeSpec {
        base: value.trim().to_string(),
        length: None,
        scale: None,
    }
}

/// Maps a conceptual type to its logical type.
pub fn conceptual_to_logical(conceptual_type: &str) -> String {
    let spec = split_type_length(conceptual_type);
    let key = spec.base.to_ascii_lowercase();
    let base = CONCEPTUAL_TO_LOGICAL
        .iter()
        .find(|(from, _)| *from == key)
        .map_or(FALLBACK_LOGICAL_TYPE, |(_, to)| *to);
    with_params(base, &spec)
}

/// Maps a logical type to its physical type; unknown types pass through.
pub fn logical_to_physical(logical_type: &str) -> String {
    let spec = split_type_length(logical_type);
    let key = spec.base.to_ascii_uppercase();
    match LOGICAL_TO_PHYSICAL.iter().find(|(from, _)| *from == key) {
        Some((_, to)) => with_params(to, &spec),
        None => logical_type.to_string(),
    }
}

/// Default length for length-bearing types, matched case-insensitively.
///
/// An explicit parameter in the type string takes precedence.
pub fn default_length(type_name: &str) -> Option<i64> {
    let spec = split_type_length(type_name);
    if spec.length.is_some() {
        return spec.length;
    }
    let key = spec.base.to_ascii_uppercase();
    DEFAULT_LENGTHS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, length)| *length)
}

fn with_params(base: &str, spec: &TypeSpec) -> String {
    match (spec.length, spec.scale) {
        (Some(length), Some(scale)) => format!("{base}({length},{scale})"),
        (Some(length), None) => format!("{base}({length})"),
        _ => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        conceptual_to_logical, default_length, logical_to_physical, split_type_length,
        FALLBACK_LOGICAL_TYPE,
    };

    #[test]
    fn conceptual_types_map_case_insensitively() {
        assert_eq!(conceptual_to_logical("Identifier"), "UUID");
        assert_eq!(conceptual_to_logical("TEXT"), "VARCHAR");
        assert_eq!(conceptual_to_logical("Money"), "DECIMAL");
    }

    #[test]
    fn unknown_conceptual_type_falls_back_to_generic_string() {
        assert_eq!(conceptual_to_logical("Hologram"), FALLBACK_LOGICAL_TYPE);
        assert_eq!(conceptual_to_logical(""), FALLBACK_LOGICAL_TYPE);
    }

    #[test]
    fn unknown_logical_type_passes_through() {
        assert_eq!(logical_to_physical("GEOGRAPHY"), "GEOGRAPHY");
        assert_eq!(logical_to_physical("custom(3)"), "custom(3)");
    }

    #[test]
    fn explicit_parameters_survive_mapping() {
        assert_eq!(logical_to_physical("VARCHAR(100)"), "varchar(100)");
        assert_eq!(logical_to_physical("decimal(12, 2)"), "numeric(12,2)");
        assert_eq!(conceptual_to_logical("Text(40)"), "VARCHAR(40)");
    }

    #[test]
    fn default_length_prefers_explicit_parameter() {
        assert_eq!(default_length("VARCHAR"), Some(255));
        assert_eq!(default_length("varchar"), Some(255));
        assert_eq!(default_length("VARCHAR(64)"), Some(64));
        assert_eq!(default_length("uuid"), None);
    }

    #[test]
    fn split_keeps_plain_types_intact() {
        let spec = split_type_length("  double precision ");
        assert_eq!(spec.base, "double precision");
        assert_eq!(spec.length, None);
        assert_eq!(spec.scale, None);
    }

    #[test]
    fn full_chain_matches_documented_examples() {
        assert_eq!(logical_to_physical(&conceptual_to_logical("Identifier")), "uuid");
        let email = logical_to_physical(&conceptual_to_logical("Text"));
        assert_eq!(email, "varchar");
        assert_eq!(default_length(&email), Some(255));
    }
}
