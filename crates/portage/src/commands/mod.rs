//! Subcommand implementations.
//!
//! Each command returns its process exit code; hard failures (unreadable
//! input, invalid rule table) propagate as errors.

pub mod emit;
pub mod extract;
pub mod map;
pub mod report;
pub mod rules;
pub mod translate;
pub mod verify;

use crate::Session;
use crate::cli::Command;
use crate::pipeline::VerifySettings;
use anyhow::Context as _;
use portage_report::{TranslationReport, output_schema};
use portage_verify::{CrystalRunner, LiteralReference, RecordedOutputs, SourceReference};
use std::path::Path;
use std::time::Duration;

pub fn dispatch(command: Command, session: &Session) -> anyhow::Result<i32> {
    match command {
        Command::Extract { file } => extract::run(&file, session),
        Command::Map { file, lenient } => map::run(&file, lenient, session),
        Command::Emit { file, output } => emit::run(&file, output.as_deref(), session),
        Command::Verify(args) => verify::run(&args, session),
        Command::Report {
            files,
            tests_dir,
            strict,
        } => report::run(&files, tests_dir.as_deref(), strict, session),
        Command::Translate {
            files,
            out_dir,
            strict,
            tests_dir,
        } => translate::run(&files, out_dir.as_deref(), strict, tests_dir.as_deref(), session),
        Command::Rules { check } => rules::run(check, session),
    }
}

/// JSON schema of what `command` prints with `--json`.
pub fn schema(command: &Command) -> String {
    match command {
        Command::Extract { .. } => output_schema::<extract::ExtractOutput>(),
        Command::Map { .. } => output_schema::<map::MapOutput>(),
        Command::Emit { .. } => output_schema::<emit::EmitOutput>(),
        Command::Verify(_) | Command::Report { .. } => output_schema::<TranslationReport>(),
        Command::Translate { .. } => output_schema::<translate::TranslateOutput>(),
        Command::Rules { .. } => output_schema::<rules::RulesOutput>(),
    }
}

/// Source reference, runner, and timeout for verification.
pub struct VerifierParts {
    pub reference: Box<dyn SourceReference>,
    pub runner: CrystalRunner,
    pub timeout: Duration,
}

impl VerifierParts {
    /// Resolve from CLI overrides on top of `[verify]`.
    pub fn resolve(
        session: &Session,
        recorded: Option<&Path>,
        crystal: Option<&Path>,
        timeout_ms: Option<u64>,
    ) -> anyhow::Result<Self> {
        let config = &session.config.verify;
        let reference: Box<dyn SourceReference> =
            match recorded.or(config.recorded.as_deref()) {
                Some(path) => {
                    let outputs = RecordedOutputs::load(path)
                        .with_context(|| format!("failed to load recorded outputs {}", path.display()))?;
                    tracing::debug!(path = %path.display(), cases = outputs.len(), "loaded recorded outputs");
                    Box::new(outputs)
                }
                None => Box::new(LiteralReference),
            };
        Ok(Self {
            reference,
            runner: CrystalRunner::new(crystal.unwrap_or(&config.crystal)),
            timeout: Duration::from_millis(timeout_ms.unwrap_or(config.timeout_ms)),
        })
    }

    /// Batch settings verifying against `<name>_test.go` files in `tests_dir`.
    pub fn settings<'a>(&'a self, tests_dir: &'a Path) -> VerifySettings<'a> {
        VerifySettings {
            tests_dir,
            reference: self.reference.as_ref(),
            runner: &self.runner,
            timeout: self.timeout,
        }
    }
}

/// Read and parse one source file.
pub(crate) fn extract_file(path: &Path) -> anyhow::Result<portage_model::TranslationUnit> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let reader = crate::pipeline::reader_for(path).map_err(anyhow::Error::msg)?;
    let unit = reader.read(&path.display().to_string(), &source)?;
    tracing::info!(path = %path.display(), nodes = unit.nodes.len(), "extracted");
    Ok(unit)
}
