use crate::pattern::PatternError;
use portage_model::Location;
use std::path::PathBuf;

/// Defects in a rule table, detected when it is loaded.
#[derive(Debug, thiserror::Error)]
pub enum RuleTableError {
    #[error("failed to read rule table {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{origin}: invalid rule table: {source}")]
    Toml {
        origin: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("duplicate rule id `{id}`")]
    DuplicateId { id: String },
    #[error("symbol `{symbol}` has more than one rule")]
    DuplicateSymbol { symbol: String },
    #[error("rule `{id}`: {source}")]
    Pattern {
        id: String,
        #[source]
        source: PatternError,
    },
    #[error("rule `{id}`: {message}")]
    Template { id: String, message: String },
    #[error("rule `{id}`: unknown result type `{spelling}`")]
    ResultType { id: String, spelling: String },
    #[error("rule `{id}`: unknown placeholder `{{{{{placeholder}}}}}`")]
    UnknownPlaceholder { id: String, placeholder: String },
}

/// Two or more rules match a construct with the same specificity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "ambiguous mapping for `{identifier}` at {location}: rules {} match with equal specificity",
    rules.join(", ")
)]
pub struct AmbiguousMappingError {
    pub identifier: String,
    pub location: Location,
    pub rules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error(transparent)]
    Ambiguous(#[from] AmbiguousMappingError),
}
