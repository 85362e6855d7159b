//! Case-by-case comparison of source expectations with target behavior.

use crate::harness::{Harness, HarnessError, RAISED_EXIT, RAISED_MARKER};
use crate::reference::SourceReference;
use crate::runner::{RunError, RunOutput, TargetRunner};
use crate::value::{LiteralEvaluator, values_equal};
use portage_mapping::{RuleTable, UnitIndex};
use portage_model::{
    Confidence, ErrorReason, MappedUnit, Side, TestCase, TranslationUnit, VerificationResult,
    Verdict,
};
use rayon::prelude::*;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The translation under test.
#[derive(Clone, Copy)]
pub struct Artifact<'a> {
    pub unit: &'a TranslationUnit,
    pub mapped: &'a MappedUnit,
    pub table: &'a RuleTable,
    /// Emitted target source.
    pub text: &'a str,
}

pub struct VerifyOptions<'a> {
    pub reference: &'a dyn SourceReference,
    pub runner: &'a dyn TargetRunner,
    /// Bound on each target run.
    pub timeout: Duration,
}

/// Run every case; results come back in input order.
pub fn verify(
    cases: &[TestCase],
    artifact: Artifact<'_>,
    options: &VerifyOptions<'_>,
) -> Vec<VerificationResult> {
    let index = UnitIndex::build(artifact.unit);
    let harness = Harness::new(artifact.unit, &index, artifact.table);
    let literals = LiteralEvaluator::new(artifact.unit, &index);

    let results: Vec<VerificationResult> = cases
        .par_iter()
        .map(|case| {
            let verdict = verify_case(case, artifact, &harness, &literals, options);
            tracing::debug!(case = %case.id, verdict = verdict.label(), "verified case");
            VerificationResult {
                case_id: case.id.clone(),
                function: case.function.clone(),
                location: case.location.clone(),
                verdict,
            }
        })
        .collect();

    let failed = results
        .iter()
        .filter(|r| matches!(r.verdict, Verdict::Mismatch { .. } | Verdict::Error { .. }))
        .count();
    tracing::info!(
        path = %artifact.unit.path,
        cases = results.len(),
        failed,
        "verified unit"
    );
    results
}

fn verify_case(
    case: &TestCase,
    artifact: Artifact<'_>,
    harness: &Harness<'_>,
    literals: &LiteralEvaluator<'_>,
    options: &VerifyOptions<'_>,
) -> Verdict {
    let result_ty = harness.result_type(&case.function);
    let expected = match options.reference.expected(case, result_ty, literals) {
        Ok(value) => value,
        Err(reason) => {
            return Verdict::Error {
                side: Side::Source,
                reason,
            };
        }
    };

    match artifact.mapped.entry(&case.function) {
        None => {
            return Verdict::Pending {
                message: format!("`{}` is not declared in {}", case.function, artifact.unit.path),
            };
        }
        Some(entry) if entry.confidence == Confidence::Unsupported => {
            return Verdict::Pending {
                message: format!("`{}` has no translation yet", case.function),
            };
        }
        Some(_) => {}
    }

    let program = match harness.program(case, artifact.text) {
        Ok(program) => program,
        Err(err @ HarnessError::Untranslatable { .. }) => {
            return Verdict::Pending {
                message: err.to_string(),
            };
        }
        Err(err) => return target_failure(err.to_string()),
    };

    match options.runner.run(&program, options.timeout) {
        Ok(output) => judge(expected, &output),
        Err(RunError::Timeout { millis }) => Verdict::Error {
            side: Side::Target,
            reason: ErrorReason::Timeout { millis },
        },
        Err(err) => target_failure(err.to_string()),
    }
}

fn judge(expected: serde_json::Value, output: &RunOutput) -> Verdict {
    if !output.success {
        let message = if output.code == Some(RAISED_EXIT)
            && let Some(line) = output.stderr.lines().find(|l| l.starts_with(RAISED_MARKER))
        {
            format!("raised {}", &line[RAISED_MARKER.len()..])
        } else {
            let tail: Vec<&str> = output.stderr.lines().rev().take(5).collect();
            let tail: Vec<&str> = tail.into_iter().rev().collect();
            format!(
                "target program exited with {}: {}",
                output
                    .code
                    .map_or_else(|| "a signal".to_string(), |c| format!("status {c}")),
                tail.join("\n")
            )
        };
        return target_failure(message);
    }
    let Some(line) = output.stdout.lines().rev().find(|l| !l.trim().is_empty()) else {
        return target_failure("target program printed nothing".to_string());
    };
    match serde_json::from_str::<serde_json::Value>(line) {
        Ok(actual) if values_equal(&expected, &actual) => Verdict::Match,
        Ok(actual) => Verdict::Mismatch { expected, actual },
        Err(err) => target_failure(format!("unreadable target output `{line}`: {err}")),
    }
}

fn target_failure(message: String) -> Verdict {
    Verdict::Error {
        side: Side::Target,
        reason: ErrorReason::Failed { message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn output(success: bool, code: i32, stdout: &str, stderr: &str) -> RunOutput {
        RunOutput {
            success,
            code: Some(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    #[test]
    fn test_last_stdout_line_is_the_result() {
        let out = output(true, 0, "debug noise\n[1,2]\n", "");
        assert_eq!(judge(json!([1, 2]), &out), Verdict::Match);
        assert_eq!(
            judge(json!([1, 3]), &out),
            Verdict::Mismatch {
                expected: json!([1, 3]),
                actual: json!([1, 2]),
            }
        );
    }

    #[test]
    fn test_float_rounding_difference_is_a_mismatch() {
        let out = output(true, 0, "0.30000000000000004\n", "");
        assert_eq!(
            judge(json!(0.3), &out),
            Verdict::Mismatch {
                expected: json!(0.3),
                actual: json!(0.30000000000000004),
            }
        );
        let exact = output(true, 0, "0.3\n", "");
        assert_eq!(judge(json!(0.3), &exact), Verdict::Match);
    }

    #[test]
    fn test_raise_is_a_target_error() {
        let out = output(false, 3, "", "portage: raised IndexError: Index out of bounds\n");
        assert_eq!(
            judge(json!(1), &out),
            Verdict::Error {
                side: Side::Target,
                reason: ErrorReason::Failed {
                    message: "raised IndexError: Index out of bounds".into()
                },
            }
        );
    }

    #[test]
    fn test_compile_failure_keeps_stderr_tail() {
        let out = output(false, 1, "", "Error: undefined method 'foo'\n");
        let Verdict::Error {
            side: Side::Target,
            reason: ErrorReason::Failed { message },
        } = judge(json!(1), &out)
        else {
            panic!("expected a target failure");
        };
        assert!(message.contains("status 1"));
        assert!(message.contains("undefined method 'foo'"));
    }
}
