//! `portage translate`: write a Crystal file per Go file and report on the batch.

use super::VerifierParts;
use crate::Session;
use crate::pipeline::{BatchOptions, FileStatus, translate_batch};
use portage_report::{OutputFormatter, TranslationReport};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

#[derive(Serialize, schemars::JsonSchema)]
pub struct WrittenFile {
    pub source: String,
    pub target: String,
}

#[derive(Serialize, schemars::JsonSchema)]
pub struct TranslateOutput {
    pub written: Vec<WrittenFile>,
    pub report: TranslationReport,
}

impl TranslateOutput {
    fn listing(&self) -> String {
        let mut out = String::new();
        for file in &self.written {
            let _ = writeln!(out, "wrote {} -> {}", file.source, file.target);
        }
        out
    }
}

impl OutputFormatter for TranslateOutput {
    fn format_text(&self) -> String {
        self.listing() + &self.report.format_text()
    }

    fn format_pretty(&self, colors: bool) -> String {
        self.listing() + &self.report.format_pretty(colors)
    }
}

pub fn run(
    files: &[PathBuf],
    out_dir: Option<&Path>,
    strict: bool,
    tests_dir: Option<&Path>,
    session: &Session,
) -> anyhow::Result<i32> {
    let Some(out_dir) = out_dir.or(session.config.translate.out_dir.as_deref()) else {
        anyhow::bail!("no output directory: pass --out-dir or set [translate] out_dir");
    };
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
        out_dir: Some(out_dir),
        verify,
    };

    let outcome = translate_batch(files, &options);
    let written = outcome
        .files
        .iter()
        .filter_map(|f| match &f.status {
            FileStatus::Translated(t) => t.written.as_ref().map(|target| WrittenFile {
                source: f.path.clone(),
                target: target.display().to_string(),
            }),
            _ => None,
        })
        .collect();
    session.print(&TranslateOutput {
        written,
        report: outcome.report(),
    });
    Ok(outcome.exit_code())
}
