//! Source-side expected values.

use crate::value::{LiteralEvaluator, values_equal};
use portage_model::{ErrorReason, TestCase, TypeSig};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Where a case's expected value comes from.
pub trait SourceReference: Send + Sync {
    /// Expected value for `case`, read as the function's result type.
    fn expected(
        &self,
        case: &TestCase,
        result: Option<&TypeSig>,
        literals: &LiteralEvaluator<'_>,
    ) -> Result<Value, ErrorReason>;
}

/// Trusts the literal the source test asserts.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralReference;

impl SourceReference for LiteralReference {
    fn expected(
        &self,
        case: &TestCase,
        result: Option<&TypeSig>,
        literals: &LiteralEvaluator<'_>,
    ) -> Result<Value, ErrorReason> {
        literals
            .evaluate(&case.expected, result)
            .map_err(|e| ErrorReason::Failed {
                message: e.to_string(),
            })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("failed to read recorded outputs {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid recorded outputs: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Recorded {
    Error { error: String },
    Value(Value),
}

/// Outputs captured by running the source tests, keyed by case id.
///
/// ```json
/// { "TestUpper/0": "A", "TestParse/2": { "error": "invalid syntax" } }
/// ```
///
/// A recorded value must agree with the test literal; cases without a
/// recording fall back to the literal.
#[derive(Debug, Clone, Default)]
pub struct RecordedOutputs {
    outputs: HashMap<String, Recorded>,
}

impl RecordedOutputs {
    pub fn from_json(text: &str) -> Result<Self, RecordError> {
        let outputs = serde_json::from_str(text)?;
        Ok(Self { outputs })
    }

    pub fn load(path: &Path) -> Result<Self, RecordError> {
        let text = std::fs::read_to_string(path).map_err(|source| RecordError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

impl SourceReference for RecordedOutputs {
    fn expected(
        &self,
        case: &TestCase,
        result: Option<&TypeSig>,
        literals: &LiteralEvaluator<'_>,
    ) -> Result<Value, ErrorReason> {
        let literal = LiteralReference.expected(case, result, literals)?;
        match self.outputs.get(&case.id) {
            None => Ok(literal),
            Some(Recorded::Error { error }) => Err(ErrorReason::Failed {
                message: format!("source run failed: {error}"),
            }),
            Some(Recorded::Value(recorded)) if values_equal(recorded, &literal) => Ok(literal),
            Some(Recorded::Value(recorded)) => Err(ErrorReason::Failed {
                message: format!(
                    "recorded source output {recorded} disagrees with the test literal {literal}"
                ),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portage_mapping::UnitIndex;
    use portage_model::{Expr, Location, TranslationUnit};
    use serde_json::json;

    fn case(id: &str, expected: Expr) -> TestCase {
        TestCase {
            id: id.into(),
            function: "Upper".into(),
            inputs: vec![Expr::Rune { text: "'a'".into() }],
            expected,
            location: Location::new("ascii_test.go", 5, 5),
        }
    }

    fn expected(reference: &dyn SourceReference, case: &TestCase) -> Result<Value, ErrorReason> {
        let unit = TranslationUnit::new("ascii.go", "ascii");
        let index = UnitIndex::build(&unit);
        let literals = LiteralEvaluator::new(&unit, &index);
        reference.expected(case, None, &literals)
    }

    #[test]
    fn test_literal_reference_uses_the_assertion() {
        let c = case("TestUpper", Expr::Rune { text: "'A'".into() });
        assert_eq!(expected(&LiteralReference, &c), Ok(json!(65)));
    }

    #[test]
    fn test_recorded_outputs_cross_check() {
        let recorded = RecordedOutputs::from_json(
            r#"{"TestUpper/0": 65, "TestUpper/1": 66, "TestUpper/2": {"error": "index out of range"}}"#,
        )
        .unwrap();
        assert_eq!(recorded.len(), 3);

        let agree = case("TestUpper/0", Expr::Rune { text: "'A'".into() });
        assert_eq!(expected(&recorded, &agree), Ok(json!(65)));

        let disagree = case("TestUpper/1", Expr::Rune { text: "'A'".into() });
        let Err(ErrorReason::Failed { message }) = expected(&recorded, &disagree) else {
            panic!("expected a source failure");
        };
        assert!(message.contains("66"), "{message}");

        let failed = case("TestUpper/2", Expr::int("0"));
        assert_eq!(
            expected(&recorded, &failed),
            Err(ErrorReason::Failed {
                message: "source run failed: index out of range".into()
            })
        );

        let missing = case("TestOther", Expr::int("7"));
        assert_eq!(expected(&recorded, &missing), Ok(json!(7)));
    }

    #[test]
    fn test_malformed_recording_is_rejected() {
        assert!(matches!(
            RecordedOutputs::from_json("[1, 2"),
            Err(RecordError::Json(_))
        ));
    }
}
