//! `portage verify`: run one file's Go tests against its Crystal translation.

use super::VerifierParts;
use crate::Session;
use crate::cli::VerifyArgs;
use crate::pipeline::{load_cases, writer};
use portage_mapping::{MapOptions, map_with};
use portage_report::{ReportVerdict, UnitInput, report};
use portage_verify::{Artifact, VerifyOptions, verify};

pub fn run(args: &VerifyArgs, session: &Session) -> anyhow::Result<i32> {
    let table = session.table()?;
    let unit = super::extract_file(&args.file)?;
    let lenient = !session.config.translate.strict;
    let mapped = map_with(&unit, &table, MapOptions { lenient })?;
    let emitted = writer().map_err(anyhow::Error::msg)?.write(&mapped)?;
    let cases = load_cases(&args.tests).map_err(anyhow::Error::msg)?;
    tracing::info!(tests = %args.tests.display(), cases = cases.len(), "ported test cases");

    let parts = VerifierParts::resolve(
        session,
        args.recorded.as_deref(),
        args.crystal.as_deref(),
        args.timeout_ms,
    )?;
    let options = VerifyOptions {
        reference: parts.reference.as_ref(),
        runner: &parts.runner,
        timeout: parts.timeout,
    };
    let artifact = Artifact {
        unit: &unit,
        mapped: &mapped,
        table: &table,
        text: &emitted.text,
    };
    let results = verify(&cases, artifact, &options);

    let units = [UnitInput::Translated {
        mapped: &mapped,
        emitted: Some(&emitted),
    }];
    let report = report(&units, &results);
    session.print(&report);
    Ok(match report.verdict() {
        ReportVerdict::Passed => 0,
        ReportVerdict::Failed => 1,
    })
}
