//! `portage extract`: print the constructs of one source file.

use crate::Session;
use portage_model::TranslationUnit;
use portage_report::OutputFormatter;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

#[derive(Serialize, schemars::JsonSchema)]
#[serde(transparent)]
pub struct ExtractOutput {
    #[schemars(with = "serde_json::Value")]
    pub unit: TranslationUnit,
}

impl OutputFormatter for ExtractOutput {
    fn format_text(&self) -> String {
        let unit = &self.unit;
        let mut out = format!("package {} ({})\n", unit.package, unit.path);
        for import in &unit.imports {
            let _ = writeln!(out, "import {} as {}", import.path, import.name);
        }
        for node in &unit.nodes {
            let _ = writeln!(
                out,
                "{:<14} {:<24} {:<28} {}",
                node.kind().as_str(),
                node.display_name(),
                node.signature.to_string(),
                node.location
            );
        }
        out.truncate(out.trim_end().len());
        out
    }
}

pub fn run(file: &Path, session: &Session) -> anyhow::Result<i32> {
    let unit = super::extract_file(file)?;
    session.print(&ExtractOutput { unit });
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use portage_syntax::input::extract_go;

    #[test]
    fn test_text_lists_each_node() {
        let unit = extract_go(
            "ascii.go",
            "package ascii\n\nconst NUL byte = 0x00\n\nfunc Len(data []byte) int { return len(data) }\n",
        )
        .unwrap();
        let text = ExtractOutput { unit }.format_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "package ascii (ascii.go)");
        assert!(lines[1].starts_with("constant"));
        assert!(lines[1].contains("NUL"));
        assert!(lines[2].starts_with("function"));
        assert!(lines[2].ends_with("ascii.go:5"));
    }
}
