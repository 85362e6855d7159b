//! Crystal writer for mapped units.
//!
//! Assembles rendered entries into one Crystal file: a `module` wrapper named
//! after the source package, doc comments, review notes, and indentation.
//! Rendered fragments are copied as-is.

use crate::traits::{EmitError, EmittedUnit, TargetSpan, Writer};
use portage_model::{MappedEntry, MappedUnit};

/// Static instance of the Crystal writer for registry.
pub static CRYSTAL_WRITER: CrystalWriterImpl = CrystalWriterImpl;

/// Crystal writer implementing the Writer trait.
pub struct CrystalWriterImpl;

impl Writer for CrystalWriterImpl {
    fn language(&self) -> &'static str {
        "crystal"
    }

    fn extension(&self) -> &'static str {
        "cr"
    }

    fn write(&self, unit: &MappedUnit) -> Result<EmittedUnit, EmitError> {
        CrystalWriter::emit(unit)
    }
}

/// Emits a mapped unit as Crystal source.
pub struct CrystalWriter {
    output: String,
    indent: usize,
    line: usize,
    spans: Vec<TargetSpan>,
}

impl Default for CrystalWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl CrystalWriter {
    pub fn new() -> Self {
        Self {
            output: String::new(),
            indent: 0,
            line: 1,
            spans: Vec::new(),
        }
    }

    /// Emit a mapped unit to Crystal source.
    pub fn emit(unit: &MappedUnit) -> Result<EmittedUnit, EmitError> {
        let mut writer = Self::new();
        writer.write_unit(unit)?;
        tracing::debug!(
            path = %unit.path,
            lines = writer.line - 1,
            entries = writer.spans.len(),
            "emitted crystal unit"
        );
        Ok(EmittedUnit {
            path: unit.path.clone(),
            text: writer.output,
            spans: writer.spans,
        })
    }

    fn write_unit(&mut self, unit: &MappedUnit) -> Result<(), EmitError> {
        self.write_line(&format!("# Translated from {} (package {}).", unit.path, unit.package));
        self.write_line("");
        self.write_line(&format!("module {}", unit.module));
        self.indent += 1;
        for (i, entry) in unit.entries.iter().enumerate() {
            if i > 0 {
                self.write_line("");
            }
            self.write_entry(entry)?;
        }
        self.indent -= 1;
        self.write_line("end");
        Ok(())
    }

    fn write_entry(&mut self, entry: &MappedEntry) -> Result<(), EmitError> {
        let identifier = entry.node.display_name();
        if let Some(fragment) = leftover_placeholder(&entry.rendered) {
            return Err(EmitError::MalformedTemplate {
                identifier,
                fragment: fragment.to_string(),
            });
        }

        let start_line = self.line;
        if let Some(docs) = &entry.node.docs {
            for line in docs.lines() {
                self.write_comment(line);
            }
        }
        if entry.confidence.needs_review() {
            let reason = entry
                .findings
                .first()
                .map(|f| f.message.as_str())
                .unwrap_or("needs review");
            self.write_comment(&format!("portage: {} ({reason})", entry.confidence));
        }
        for line in entry.rendered.lines() {
            self.write_line(line);
        }
        self.spans.push(TargetSpan {
            identifier,
            start_line,
            end_line: self.line.saturating_sub(1).max(start_line),
        });
        Ok(())
    }

    fn write_comment(&mut self, text: &str) {
        if text.is_empty() {
            self.write_line("#");
        } else {
            self.write_line(&format!("# {text}"));
        }
    }

    fn write_line(&mut self, text: &str) {
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.output.push_str("  ");
            }
            self.output.push_str(text);
        }
        self.output.push('\n');
        self.line += 1;
    }
}

/// First `{{name}}` placeholder left in `text`, if any.
pub fn leftover_placeholder(text: &str) -> Option<&str> {
    let mut rest = text;
    let mut offset = 0;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == ' '))
            .unwrap_or(after.len());
        if after[name_len..].starts_with("}}") && !after[..name_len].trim().is_empty() {
            let begin = offset + start;
            let end = begin + 2 + name_len + 2;
            return Some(&text[begin..end]);
        }
        offset += start + 2;
        rest = after;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use portage_model::{
        Confidence, Construct, ConstructNode, Expr, Finding, FindingKind, Location, TypeOrigin,
        TypeSig, Visibility,
    };

    fn entry(name: &str, rendered: &str, confidence: Confidence) -> MappedEntry {
        MappedEntry {
            node: ConstructNode {
                name: name.to_string(),
                construct: Construct::Constant {
                    value: Expr::int("0x00"),
                    iota: None,
                    folded: Some(0),
                },
                signature: TypeSig::named("T"),
                visibility: Visibility::Exported,
                location: Location::new("a.go", 3, 3),
                docs: None,
                type_origin: TypeOrigin::Declared,
            },
            rule: None,
            confidence,
            rendered: rendered.to_string(),
            findings: Vec::new(),
        }
    }

    fn unit(entries: Vec<MappedEntry>) -> MappedUnit {
        MappedUnit {
            path: "a.go".into(),
            package: "ascii".into(),
            module: "Ascii".into(),
            entries,
        }
    }

    #[test]
    fn test_wraps_module_and_records_spans() {
        let mut first = entry("NUL", "NUL = 0x00_u8", Confidence::Exact);
        first.node.docs = Some("NUL terminates strings.".into());
        let second = entry("f", "def self.f\n  1\nend", Confidence::Exact);
        let emitted = CrystalWriter::emit(&unit(vec![first, second])).unwrap();
        assert_eq!(
            emitted.text,
            "# Translated from a.go (package ascii).\n\
             \n\
             module Ascii\n  \
             # NUL terminates strings.\n  \
             NUL = 0x00_u8\n\
             \n  \
             def self.f\n    \
             1\n  \
             end\n\
             end\n"
        );
        assert_eq!(emitted.spans[0].start_line, 4);
        assert_eq!(emitted.spans[0].end_line, 5);
        assert_eq!(emitted.spans[1].start_line, 7);
        assert_eq!(emitted.spans[1].end_line, 9);
    }

    #[test]
    fn test_review_note_for_lossy_entry() {
        let mut lossy = entry("Shape", "alias Shape = Int32", Confidence::Lossy);
        lossy.findings.push(Finding {
            kind: FindingKind::Lossy,
            construct: lossy.node.kind(),
            identifier: "Shape".into(),
            location: Location::new("a.go", 3, 3),
            message: "defined type becomes an alias".into(),
            candidates: Vec::new(),
        });
        let emitted = CrystalWriter::emit(&unit(vec![lossy])).unwrap();
        assert!(emitted
            .text
            .contains("# portage: LOSSY (defined type becomes an alias)\n  alias Shape = Int32"));
    }

    #[test]
    fn test_malformed_template_is_rejected() {
        let broken = entry("X", "X = {{value}}", Confidence::Exact);
        let err = CrystalWriter::emit(&unit(vec![broken])).unwrap_err();
        assert_eq!(
            err,
            EmitError::MalformedTemplate {
                identifier: "X".into(),
                fragment: "{{value}}".into(),
            }
        );
    }

    #[test]
    fn test_nested_hash_literal_is_not_a_placeholder() {
        assert_eq!(leftover_placeholder(r#"{"a" => {"b" => 1}}"#), None);
        assert_eq!(leftover_placeholder("x {{ zero }} y"), Some("{{ zero }}"));
    }
}
