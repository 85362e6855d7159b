//! `portage map`: show the rule chosen for each construct and what it renders.

use crate::Session;
use portage_mapping::{MapOptions, map_with};
use portage_model::MappedUnit;
use portage_report::OutputFormatter;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

#[derive(Serialize, schemars::JsonSchema)]
#[serde(transparent)]
pub struct MapOutput {
    #[schemars(with = "serde_json::Value")]
    pub unit: MappedUnit,
}

impl OutputFormatter for MapOutput {
    fn format_text(&self) -> String {
        let mut out = format!("module {} ({})\n", self.unit.module, self.unit.path);
        for entry in &self.unit.entries {
            let rule = entry.rule.as_ref().map_or("-", |r| r.id.as_str());
            let _ = writeln!(
                out,
                "{:<22} {} {} [{}] {}",
                entry.confidence.as_str(),
                entry.node.kind(),
                entry.node.display_name(),
                rule,
                entry.node.location
            );
            for line in entry.rendered.lines() {
                let _ = writeln!(out, "    {line}");
            }
            for finding in &entry.findings {
                let _ = writeln!(out, "  ! {}", finding.message);
            }
        }
        out.truncate(out.trim_end().len());
        out
    }
}

pub fn run(file: &Path, lenient: bool, session: &Session) -> anyhow::Result<i32> {
    let table = session.table()?;
    let unit = super::extract_file(file)?;
    let unit = map_with(&unit, &table, MapOptions { lenient })?;
    session.print(&MapOutput { unit });
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use portage_mapping::{RuleTable, map};
    use portage_syntax::input::extract_go;

    #[test]
    fn test_text_shows_rule_and_rendering() {
        let unit = extract_go("ascii.go", "package ascii\n\nconst NUL byte = 0x00\n").unwrap();
        let table = RuleTable::builtin().unwrap();
        let unit = map(&unit, &table).unwrap();
        let text = MapOutput { unit }.format_text();
        insta::assert_snapshot!(text, @r"
        module Ascii (ascii.go)
        EXACT                  constant NUL [const] ascii.go:3
            NUL = 0x00_u8
        ");
    }
}
