//! Equivalence verification of translated units.
//!
//! Ported source test cases ([`TestCase`](portage_model::TestCase)) are run
//! against the emitted target code. The source side supplies the expected
//! value ([`SourceReference`]); the target side runs a generated harness on
//! the target toolchain ([`TargetRunner`]). Both values are compared as JSON.
//!
//! Verification results are data: a failing case never affects emission.

mod harness;
mod reference;
mod runner;
mod value;
mod verifier;

pub use harness::{Harness, HarnessError};
pub use reference::{LiteralReference, RecordError, RecordedOutputs, SourceReference};
pub use runner::{CrystalRunner, Program, RunError, RunOutput, TargetRunner, run_with_timeout};
pub use value::{LiteralEvaluator, ValueError, values_equal};
pub use verifier::{Artifact, DEFAULT_TIMEOUT, VerifyOptions, verify};
