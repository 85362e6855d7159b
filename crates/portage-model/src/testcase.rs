//! Ported test cases and verification outcomes.

use crate::body::Expr;
use crate::construct::Location;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A source test assertion captured as input fixture plus expected output.
///
/// Captured once and never edited: the expected literal is the one the source
/// test asserts, even if it looks wrong.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// `TestName` or `TestName/<row>` for table-driven tests.
    pub id: String,
    /// Source-language name of the function under test.
    pub function: String,
    pub inputs: Vec<Expr>,
    pub expected: Expr,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Source,
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => f.write_str("source"),
            Side::Target => f.write_str("target"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ErrorReason {
    Timeout { millis: u64 },
    Failed { message: String },
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorReason::Timeout { millis } => write!(f, "timed out after {millis}ms"),
            ErrorReason::Failed { message } => f.write_str(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Match,
    /// Source and target disagree; both values kept for diff review.
    Mismatch {
        expected: serde_json::Value,
        actual: serde_json::Value,
    },
    Error {
        side: Side,
        #[serde(flatten)]
        reason: ErrorReason,
    },
    /// No target implementation exists yet.
    Pending {
        message: String,
    },
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Match => "MATCH",
            Verdict::Mismatch { .. } => "MISMATCH",
            Verdict::Error { .. } => "ERROR",
            Verdict::Pending { .. } => "PENDING",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub case_id: String,
    pub function: String,
    pub location: Location,
    #[serde(flatten)]
    pub verdict: Verdict,
}
