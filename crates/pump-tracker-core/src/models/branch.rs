//! Branch locations.

use serde::{Deserialize, Serialize};

use crate::lifecycle::normalize_text;

/// One of the three fixed branch sites ("filiais").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Branch {
    Brasilia,
    Goiania,
    Cuiaba,
}

impl Branch {
    pub const ALL: [Branch; 3] = [Branch::Brasilia, Branch::Goiania, Branch::Cuiaba];

    /// Canonical (normalized) name, as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Brasilia => "BRASILIA",
            Branch::Goiania => "GOIANIA",
            Branch::Cuiaba => "CUIABA",
        }
    }

    /// Parse a branch name, ignoring case, accents and padding.
    pub fn parse(name: &str) -> Option<Self> {
        let key = normalize_text(name);
        Self::ALL.into_iter().find(|b| b.as_str() == key)
    }

    /// Whether a free-text branch field refers to this branch.
    pub fn matches(&self, raw: &str) -> bool {
        normalize_text(raw) == self.as_str()
    }
}

impl std::fmt::Display for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_accents() {
        assert_eq!(Branch::parse("Goiânia"), Some(Branch::Goiania));
        assert_eq!(Branch::parse(" brasília "), Some(Branch::Brasilia));
        assert_eq!(Branch::parse("CUIABÁ"), Some(Branch::Cuiaba));
        assert_eq!(Branch::parse("Recife"), None);
    }

    #[test]
    fn test_serde_uses_canonical_name() {
        let json = serde_json::to_string(&Branch::Goiania).unwrap();
        assert_eq!(json, "\"GOIANIA\"");
    }
}
