//! `portage emit`: translate one file and print or write the Crystal source.

use crate::Session;
use crate::pipeline::{write_atomic, writer};
use anyhow::Context as _;
use portage_mapping::{MapOptions, map_with};
use portage_report::OutputFormatter;
use portage_syntax::TargetSpan;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize, schemars::JsonSchema)]
pub struct EmitOutput {
    pub source: String,
    /// Set when the text went to a file.
    pub written: Option<String>,
    pub text: String,
    #[schemars(with = "Vec<serde_json::Value>")]
    pub spans: Vec<TargetSpan>,
}

impl OutputFormatter for EmitOutput {
    fn format_text(&self) -> String {
        match &self.written {
            Some(path) => format!("wrote {path}"),
            None => self.text.trim_end().to_string(),
        }
    }
}

pub fn run(file: &Path, output: Option<&Path>, session: &Session) -> anyhow::Result<i32> {
    let table = session.table()?;
    let unit = super::extract_file(file)?;
    let lenient = !session.config.translate.strict;
    let mapped = map_with(&unit, &table, MapOptions { lenient })?;
    for finding in mapped.findings() {
        tracing::warn!(location = %finding.location, "{}", finding.message);
    }
    let emitted = writer().map_err(anyhow::Error::msg)?.write(&mapped)?;

    let written = match output {
        Some(path) => {
            write_atomic(path, &emitted.text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            Some(path.display().to_string())
        }
        None => None,
    };
    session.print(&EmitOutput {
        source: file.display().to_string(),
        written,
        text: emitted.text,
        spans: emitted.spans,
    });
    Ok(0)
}
