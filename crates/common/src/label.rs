//! Receipt region labels

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw label spellings that map onto a canonical label, matched after
/// trimming and upper-casing.
pub const LABEL_ALIASES: &[(&str, &str)] = &[("SHOP", "STORE"), ("DATE_TIME", "DATE")];

/// Category of a detected receipt region
///
/// Labels outside the fixed vocabulary are carried through untouched as
/// [`Label::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Label {
    /// Merchant name
    Store,
    /// Transaction date (and time)
    Date,
    /// One purchased line item
    Item,
    /// Receipt grand total
    Total,
    /// Any label not in the vocabulary
    Other(String),
}

impl Label {
    /// Map an exact canonical name to its label, anything else passes through
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            "STORE" => Label::Store,
            "DATE" => Label::Date,
            "ITEM" => Label::Item,
            "TOTAL" => Label::Total,
            other => Label::Other(other.to_string()),
        }
    }

    /// Trim, upper-case and resolve aliases before parsing
    ///
    /// Idempotent: normalizing the string form of a normalized label returns
    /// the same label.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        let upper = raw.trim().to_uppercase();
        let canonical = LABEL_ALIASES
            .iter()
            .find(|(alias, _)| *alias == upper)
            .map_or(upper.as_str(), |&(_, canonical)| canonical);
        Self::parse(canonical)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Label::Store => "STORE",
            Label::Date => "DATE",
            Label::Item => "ITEM",
            Label::Total => "TOTAL",
            Label::Other(name) => name,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl From<String> for Label {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        match label {
            Label::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
