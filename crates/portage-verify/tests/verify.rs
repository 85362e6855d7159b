use portage_mapping::{RuleTable, map};
use portage_model::{ErrorReason, Side, VerificationResult, Verdict};
use portage_syntax::input::{extract_go, port_go_tests};
use portage_syntax::output::CrystalWriter;
use portage_verify::{
    Artifact, LiteralReference, Program, RecordedOutputs, RunError, RunOutput, SourceReference,
    TargetRunner, VerifyOptions, verify,
};
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;

const SOURCE: &str = r#"package ascii

// Upper returns the upper-case form of an ASCII letter.
func Upper(c byte) byte {
	if c >= 'a' && c <= 'z' {
		return c - 32
	}
	return c
}
"#;

const TESTS: &str = r#"package ascii

import "testing"

func TestUpper(t *testing.T) {
	if got := Upper('a'); got != 'A' {
		t.Errorf("got %c", got)
	}
	if got := Lower('A'); got != 'a' {
		t.Errorf("got %c", got)
	}
}
"#;

/// Answers every run with the same output and keeps the programs it saw.
struct FakeRunner {
    answer: Result<RunOutput, u64>,
    seen: Mutex<Vec<Program>>,
}

impl FakeRunner {
    fn printing(stdout: &str) -> Self {
        Self {
            answer: Ok(RunOutput {
                success: true,
                code: Some(0),
                stdout: stdout.into(),
                stderr: String::new(),
            }),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn timing_out(millis: u64) -> Self {
        Self {
            answer: Err(millis),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl TargetRunner for FakeRunner {
    fn run(&self, program: &Program, _timeout: Duration) -> Result<RunOutput, RunError> {
        self.seen.lock().unwrap().push(program.clone());
        match &self.answer {
            Ok(output) => Ok(output.clone()),
            Err(millis) => Err(RunError::Timeout { millis: *millis }),
        }
    }
}

fn run(runner: &FakeRunner, recorded: Option<&RecordedOutputs>) -> Vec<VerificationResult> {
    let unit = extract_go("ascii.go", SOURCE).unwrap();
    let table = RuleTable::builtin().unwrap();
    let mapped = map(&unit, &table).unwrap();
    let emitted = CrystalWriter::emit(&mapped).unwrap();
    let cases = port_go_tests("ascii_test.go", TESTS).unwrap();
    let artifact = Artifact {
        unit: &unit,
        mapped: &mapped,
        table: &table,
        text: &emitted.text,
    };
    let reference: &dyn SourceReference = match recorded {
        Some(r) => r,
        None => &LiteralReference,
    };
    let options = VerifyOptions {
        reference,
        runner,
        timeout: Duration::from_secs(5),
    };
    verify(&cases, artifact, &options)
}

#[test]
fn test_differing_target_output_is_a_mismatch() {
    let runner = FakeRunner::printing("66\n");
    let results = run(&runner, None);
    assert_eq!(results[0].case_id, "TestUpper");
    assert_eq!(
        results[0].verdict,
        Verdict::Mismatch {
            expected: json!(65),
            actual: json!(66),
        }
    );
}

#[test]
fn test_matching_output_and_pending_function() {
    let runner = FakeRunner::printing("65\n");
    let results = run(&runner, None);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].verdict, Verdict::Match);
    assert_eq!(results[1].case_id, "TestUpper#2");
    assert!(matches!(results[1].verdict, Verdict::Pending { .. }));
    // Only the declared function reaches the runner.
    let seen = runner.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].files[0].1.contains("module Ascii"));
}

#[test]
fn test_timeout_is_a_target_error() {
    let runner = FakeRunner::timing_out(250);
    let results = run(&runner, None);
    assert_eq!(
        results[0].verdict,
        Verdict::Error {
            side: Side::Target,
            reason: ErrorReason::Timeout { millis: 250 },
        }
    );
}

#[test]
fn test_recorded_source_failure_is_a_source_error() {
    let recorded = RecordedOutputs::from_json(r#"{"TestUpper": {"error": "panic"}}"#).unwrap();
    let runner = FakeRunner::printing("65\n");
    let results = run(&runner, Some(&recorded));
    assert!(matches!(
        results[0].verdict,
        Verdict::Error {
            side: Side::Source,
            ..
        }
    ));
}

#[test]
fn test_verification_is_deterministic() {
    let runner = FakeRunner::printing("65\n");
    assert_eq!(run(&runner, None), run(&runner, None));
}
