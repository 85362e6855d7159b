//! `portage report`: translate files without writing them and print the report.

use super::VerifierParts;
use crate::Session;
use crate::pipeline::{BatchOptions, translate_batch};
use portage_report::ReportVerdict;
use std::path::{Path, PathBuf};

pub fn run(
    files: &[PathBuf],
    tests_dir: Option<&Path>,
    strict: bool,
    session: &Session,
) -> anyhow::Result<i32> {
    let table = session.table()?;
    let parts = tests_dir
        .map(|_| VerifierParts::resolve(session, None, None, None))
        .transpose()?;
    let verify = tests_dir
        .zip(parts.as_ref())
        .map(|(dir, parts)| parts.settings(dir));
    let options = BatchOptions {
        table: &table,
        strict: strict || session.config.translate.strict,
        out_dir: None,
        verify,
    };
    let outcome = translate_batch(files, &options);
    let report = outcome.report();
    session.print(&report);
    let failed = report.verdict() == ReportVerdict::Failed;
    Ok(outcome.exit_code().max(i32::from(failed)))
}
