//! Translation units: one source file's constructs, and their mapped form.

use crate::construct::{ConstructKind, ConstructNode, Location};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An import of another package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Import {
    pub path: String,
    /// Local name the package is referred to by (`strings`, or an explicit alias).
    pub name: String,
}

impl Import {
    pub fn new(path: impl Into<String>, alias: Option<&str>) -> Self {
        let path = path.into();
        let name = alias
            .map(str::to_string)
            .unwrap_or_else(|| path.rsplit('/').next().unwrap_or(&path).to_string());
        Self { path, name }
    }
}

/// One source file's ordered constructs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub path: String,
    pub package: String,
    pub imports: Vec<Import>,
    pub nodes: Vec<ConstructNode>,
}

impl TranslationUnit {
    pub fn new(path: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            package: package.into(),
            imports: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn find(&self, name: &str) -> Option<&ConstructNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn is_package(&self, name: &str) -> bool {
        self.imports.iter().any(|i| i.name == name)
    }
}

/// Confidence that a mapping preserves source semantics. Ordered best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Confidence {
    Exact,
    IdiomaticEquivalent,
    Lossy,
    Unsupported,
}

impl Confidence {
    pub const ALL: [Confidence; 4] = [
        Confidence::Exact,
        Confidence::IdiomaticEquivalent,
        Confidence::Lossy,
        Confidence::Unsupported,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Exact => "EXACT",
            Confidence::IdiomaticEquivalent => "IDIOMATIC-EQUIVALENT",
            Confidence::Lossy => "LOSSY",
            Confidence::Unsupported => "UNSUPPORTED",
        }
    }

    /// Whether a reviewer has to look at this entry.
    pub fn needs_review(&self) -> bool {
        matches!(self, Confidence::Lossy | Confidence::Unsupported)
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "exact" => Ok(Confidence::Exact),
            "idiomatic-equivalent" | "idiomatic" => Ok(Confidence::IdiomaticEquivalent),
            "lossy" => Ok(Confidence::Lossy),
            "unsupported" => Ok(Confidence::Unsupported),
            other => Err(format!("unknown confidence tag: {other}")),
        }
    }
}

/// A construct rule as selected for an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRule {
    pub id: String,
    pub kind: ConstructKind,
    /// Type pattern text, e.g. `unsigned<_>` or `slice<uint8>`.
    pub pattern: String,
    pub template: String,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// No rule matched; needs manual translation.
    Unsupported,
    /// More than one rule matched with equal specificity.
    Ambiguous,
    /// Translation changes observable behavior; needs sign-off.
    Lossy,
}

/// Something a reviewer must look at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub construct: ConstructKind,
    pub identifier: String,
    pub location: Location,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
}

/// A node, the rule chosen for it, and the rendered target text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedEntry {
    pub node: ConstructNode,
    pub rule: Option<MappingRule>,
    pub confidence: Confidence,
    pub rendered: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
}

/// Mapping Engine output for one translation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedUnit {
    pub path: String,
    pub package: String,
    /// Target namespace the entries are grouped under.
    pub module: String,
    pub entries: Vec<MappedEntry>,
}

impl MappedUnit {
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.entries.iter().flat_map(|e| e.findings.iter())
    }

    pub fn entry(&self, name: &str) -> Option<&MappedEntry> {
        self.entries.iter().find(|e| e.node.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_local_name() {
        assert_eq!(Import::new("encoding/binary", None).name, "binary");
        assert_eq!(Import::new("strings", Some("str")).name, "str");
    }

    #[test]
    fn test_confidence_order_and_parse() {
        assert!(Confidence::Exact < Confidence::Lossy);
        assert_eq!(
            Confidence::Exact.max(Confidence::IdiomaticEquivalent),
            Confidence::IdiomaticEquivalent
        );
        assert_eq!("IDIOMATIC-EQUIVALENT".parse(), Ok(Confidence::IdiomaticEquivalent));
        assert_eq!("lossy".parse(), Ok(Confidence::Lossy));
        assert!("maybe".parse::<Confidence>().is_err());
    }
}
