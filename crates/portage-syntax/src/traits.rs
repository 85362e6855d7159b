//! Traits for source readers and target writers.

use portage_model::{Location, MappedUnit, TranslationUnit};
use serde::{Deserialize, Serialize};

/// Malformed source. Fatal for the file, never for a batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{location}: {reason}")]
pub struct ParseError {
    pub location: Location,
    pub reason: String,
}

impl ParseError {
    pub fn new(location: Location, reason: impl Into<String>) -> Self {
        Self {
            location,
            reason: reason.into(),
        }
    }
}

/// Rendering defect. A rule-table bug, not a runtime condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    #[error("{identifier}: rendered text still contains template markers: {fragment}")]
    MalformedTemplate { identifier: String, fragment: String },
}

/// Target line span of one emitted entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpan {
    pub identifier: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// Emitter output: the file text plus where each entry landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedUnit {
    pub path: String,
    pub text: String,
    pub spans: Vec<TargetSpan>,
}

/// A reader parses one source file into a translation unit.
pub trait Reader: Send + Sync {
    /// Language identifier (e.g., "go").
    fn language(&self) -> &'static str;

    /// File extensions this reader handles (e.g., &["go"]).
    fn extensions(&self) -> &'static [&'static str];

    /// Parse source text. `path` is only used for locations.
    fn read(&self, path: &str, source: &str) -> Result<TranslationUnit, ParseError>;
}

/// A writer renders a mapped unit as target-language source.
pub trait Writer: Send + Sync {
    /// Language identifier (e.g., "crystal").
    fn language(&self) -> &'static str;

    /// File extension for output (e.g., "cr").
    fn extension(&self) -> &'static str;

    /// Render the unit. Never alters rendered fragments.
    fn write(&self, unit: &MappedUnit) -> Result<EmittedUnit, EmitError>;
}
