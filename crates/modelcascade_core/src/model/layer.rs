use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One of the three representations of the same business data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// Business-level entities and relationships.
    Conceptual,
    /// Platform-neutral technical structure.
    Logical,
    /// Platform-specific storage structure.
    Physical,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Conceptual, Layer::Logical, Layer::Physical];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conceptual => "conceptual",
            Self::Logical => "logical",
            Self::Physical => "physical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "conceptual" => Some(Self::Conceptual),
            "logical" => Some(Self::Logical),
            "physical" => Some(Self::Physical),
            _ => None,
        }
    }

    /// Returns the layer one step closer to the business view.
    ///
    /// `None` for conceptual, which has nothing above it.
    pub fn upstream(self) -> Option<Self> {
        match self {
            Self::Conceptual => None,
            Self::Logical => Some(Self::Conceptual),
            Self::Physical => Some(Self::Logical),
        }
    }
}

impl Display for Layer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Layer;

    #[test]
    fn parse_is_case_insensitive_and_round_trips() {
        for layer in Layer::ALL {
            assert_eq!(Layer::parse(&layer.as_str().to_uppercase()), Some(layer));
        }
        assert_eq!(Layer::parse("staging"), None);
    }

    #[test]
    fn upstream_walks_towards_conceptual() {
        assert_eq!(Layer::Physical.upstream(), Some(Layer::Logical));
        assert_eq!(Layer::Logical.upstream(), Some(Layer::Conceptual));
        assert_eq!(Layer::Conceptual.upstream(), None);
    }
}
