//! `portage rules`: list or validate the rule table.

use crate::Session;
use portage_mapping::RuleTable;
use portage_report::OutputFormatter;
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Serialize, schemars::JsonSchema)]
pub struct RuleRow {
    pub id: String,
    /// Construct kind, for construct rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Type pattern or qualified symbol.
    pub matches: String,
    pub template: String,
    pub confidence: String,
}

#[derive(Serialize, schemars::JsonSchema)]
pub struct RulesOutput {
    pub origin: String,
    /// Counts only; set by `--check`.
    pub check: bool,
    pub types: Vec<RuleRow>,
    pub constructs: Vec<RuleRow>,
    pub symbols: Vec<RuleRow>,
}

impl RulesOutput {
    pub fn new(table: &RuleTable, check: bool) -> Self {
        let types = table
            .type_rules()
            .iter()
            .map(|r| RuleRow {
                id: r.id.clone(),
                kind: None,
                matches: r.pattern.to_string(),
                template: r.target.source().to_string(),
                confidence: r.confidence.as_str().to_string(),
            })
            .collect();
        let constructs = table
            .construct_rules()
            .iter()
            .map(|r| RuleRow {
                id: r.rule.id.clone(),
                kind: Some(r.rule.kind.to_string()),
                matches: r.pattern.to_string(),
                template: r.template.source().to_string(),
                confidence: r.rule.confidence.as_str().to_string(),
            })
            .collect();
        let symbols = table
            .symbol_rules()
            .iter()
            .map(|r| RuleRow {
                id: r.id.clone(),
                kind: None,
                matches: r.symbol.clone(),
                template: r.template.source().to_string(),
                confidence: r.confidence.as_str().to_string(),
            })
            .collect();
        Self {
            origin: table.origin().to_string(),
            check,
            types,
            constructs,
            symbols,
        }
    }
}

impl OutputFormatter for RulesOutput {
    fn format_text(&self) -> String {
        let summary = format!(
            "{}: {} type rules, {} construct rules, {} symbol rules",
            self.origin,
            self.types.len(),
            self.constructs.len(),
            self.symbols.len()
        );
        if self.check {
            return format!("ok {summary}");
        }
        let mut out = summary;
        for (title, rows) in [
            ("types", &self.types),
            ("constructs", &self.constructs),
            ("symbols", &self.symbols),
        ] {
            let _ = write!(out, "\n\n{title}:");
            for row in rows {
                let matches = match &row.kind {
                    Some(kind) => format!("{kind} {}", row.matches),
                    None => row.matches.clone(),
                };
                let _ = write!(
                    out,
                    "\n  {:<24} {:<32} {:<22} {}",
                    row.id, matches, row.confidence, row.template
                );
            }
        }
        out
    }
}

pub fn run(check: bool, session: &Session) -> anyhow::Result<i32> {
    let table = session.table()?;
    session.print(&RulesOutput::new(&table, check));
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_lists_every_section() {
        let table = RuleTable::builtin().unwrap();
        let output = RulesOutput::new(&table, false);
        assert!(!output.types.is_empty());
        assert!(output.constructs.iter().any(|r| r.id == "const"));
        let text = output.format_text();
        assert!(text.starts_with("<builtin>: "));
        assert!(text.contains("\n\nconstructs:"));
    }

    #[test]
    fn test_check_prints_counts_only() {
        let table = RuleTable::builtin().unwrap();
        let text = RulesOutput::new(&table, true).format_text();
        assert!(text.starts_with("ok <builtin>: "));
        assert_eq!(text.lines().count(), 1);
    }
}
