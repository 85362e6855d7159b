//! Translation reports: per-construct confidence, findings, parse failures,
//! and verification outcomes for a batch of files.

use crate::output::OutputFormatter;
use nu_ansi_term::{Color, Style};
use portage_model::{
    Confidence, ConstructKind, FindingKind, Location, MappedUnit, VerificationResult, Verdict,
};
use portage_syntax::EmittedUnit;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// One file as it came out of the pipeline.
#[derive(Debug, Clone, Copy)]
pub enum UnitInput<'a> {
    Translated {
        mapped: &'a MappedUnit,
        emitted: Option<&'a EmittedUnit>,
    },
    Failed {
        path: &'a str,
        error: &'a str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Span {
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl From<&Location> for Span {
    fn from(location: &Location) -> Self {
        Self {
            file: location.file.clone(),
            start_line: location.start_line,
            end_line: location.end_line,
        }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start_line == self.end_line {
            write!(f, "{}:{}", self.file, self.start_line)
        } else {
            write!(f, "{}:{}-{}", self.file, self.start_line, self.end_line)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ConstructRecord {
    #[schemars(with = "String")]
    pub kind: ConstructKind,
    pub identifier: String,
    #[schemars(with = "String")]
    pub confidence: Confidence,
    pub rule: Option<String>,
    pub source: Span,
    /// Target line range, when the unit was emitted.
    pub target: Option<(usize, usize)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FindingRecord {
    #[schemars(with = "String")]
    pub kind: FindingKind,
    #[schemars(with = "String")]
    pub construct: ConstructKind,
    pub identifier: String,
    pub location: Span,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ConfidenceCounts {
    pub exact: usize,
    pub idiomatic_equivalent: usize,
    pub lossy: usize,
    pub unsupported: usize,
}

impl ConfidenceCounts {
    fn add(&mut self, confidence: Confidence) {
        match confidence {
            Confidence::Exact => self.exact += 1,
            Confidence::IdiomaticEquivalent => self.idiomatic_equivalent += 1,
            Confidence::Lossy => self.lossy += 1,
            Confidence::Unsupported => self.unsupported += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.exact + self.idiomatic_equivalent + self.lossy + self.unsupported
    }

    fn merge(&mut self, other: &ConfidenceCounts) {
        self.exact += other.exact;
        self.idiomatic_equivalent += other.idiomatic_equivalent;
        self.lossy += other.lossy;
        self.unsupported += other.unsupported;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FileReport {
    pub path: String,
    pub module: String,
    pub counts: ConfidenceCounts,
    pub constructs: Vec<ConstructRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ParseFailure {
    pub path: String,
    pub message: String,
}

/// A case whose verdict is not a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CaseRecord {
    pub case_id: String,
    pub function: String,
    pub location: Span,
    /// `MISMATCH`, `ERROR`, or `PENDING`.
    pub verdict: String,
    pub detail: String,
    pub expected: Option<serde_json::Value>,
    pub actual: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct VerificationSummary {
    pub total: usize,
    pub matched: usize,
    pub mismatched: usize,
    pub errors: usize,
    pub pending: usize,
    pub cases: Vec<CaseRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportVerdict {
    Passed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TranslationReport {
    pub files: Vec<FileReport>,
    pub counts: ConfidenceCounts,
    pub findings: Vec<FindingRecord>,
    pub parse_failures: Vec<ParseFailure>,
    pub verification: VerificationSummary,
}

/// Aggregate a batch into a report.
pub fn report(units: &[UnitInput<'_>], results: &[VerificationResult]) -> TranslationReport {
    let mut files = Vec::new();
    let mut counts = ConfidenceCounts::default();
    let mut findings = Vec::new();
    let mut parse_failures = Vec::new();

    for unit in units {
        match *unit {
            UnitInput::Translated { mapped, emitted } => {
                let file = file_report(mapped, emitted);
                counts.merge(&file.counts);
                findings.extend(mapped.findings().map(|f| FindingRecord {
                    kind: f.kind,
                    construct: f.construct,
                    identifier: f.identifier.clone(),
                    location: Span::from(&f.location),
                    message: f.message.clone(),
                    candidates: f.candidates.clone(),
                }));
                files.push(file);
            }
            UnitInput::Failed { path, error } => parse_failures.push(ParseFailure {
                path: path.to_string(),
                message: error.to_string(),
            }),
        }
    }

    TranslationReport {
        files,
        counts,
        findings,
        parse_failures,
        verification: summarize(results),
    }
}

fn file_report(mapped: &MappedUnit, emitted: Option<&EmittedUnit>) -> FileReport {
    let mut counts = ConfidenceCounts::default();
    let constructs = mapped
        .entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            counts.add(entry.confidence);
            // spans are recorded one per entry, in entry order
            let target = emitted
                .and_then(|e| e.spans.get(i))
                .map(|s| (s.start_line, s.end_line));
            ConstructRecord {
                kind: entry.node.kind(),
                identifier: entry.node.display_name(),
                confidence: entry.confidence,
                rule: entry.rule.as_ref().map(|r| r.id.clone()),
                source: Span::from(&entry.node.location),
                target,
            }
        })
        .collect();
    FileReport {
        path: mapped.path.clone(),
        module: mapped.module.clone(),
        counts,
        constructs,
    }
}

fn summarize(results: &[VerificationResult]) -> VerificationSummary {
    let mut summary = VerificationSummary {
        total: results.len(),
        ..Default::default()
    };
    for result in results {
        let (detail, expected, actual) = match &result.verdict {
            Verdict::Match => {
                summary.matched += 1;
                continue;
            }
            Verdict::Mismatch { expected, actual } => {
                summary.mismatched += 1;
                (
                    format!("expected {expected}, got {actual}"),
                    Some(expected.clone()),
                    Some(actual.clone()),
                )
            }
            Verdict::Error { side, reason } => {
                summary.errors += 1;
                (format!("{side}: {reason}"), None, None)
            }
            Verdict::Pending { message } => {
                summary.pending += 1;
                (message.clone(), None, None)
            }
        };
        summary.cases.push(CaseRecord {
            case_id: result.case_id.clone(),
            function: result.function.clone(),
            location: Span::from(&result.location),
            verdict: result.verdict.label().to_string(),
            detail,
            expected,
            actual,
        });
    }
    summary
}

impl TranslationReport {
    /// Failed when any case mismatched or errored, or a file did not parse.
    pub fn verdict(&self) -> ReportVerdict {
        let v = &self.verification;
        if v.mismatched > 0 || v.errors > 0 || !self.parse_failures.is_empty() {
            ReportVerdict::Failed
        } else {
            ReportVerdict::Passed
        }
    }

    /// Constructs a reviewer must sign off: lossy or unsupported.
    pub fn needs_review(&self) -> impl Iterator<Item = (&FileReport, &ConstructRecord)> {
        self.files.iter().flat_map(|file| {
            file.constructs
                .iter()
                .filter(|c| c.confidence.needs_review())
                .map(move |c| (file, c))
        })
    }

    fn render(&self, paint: &dyn Fn(Style, &str) -> String) -> String {
        let mut out = String::new();
        let c = &self.counts;
        let _ = writeln!(
            out,
            "{} {} files, {} constructs ({} exact, {} idiomatic, {} lossy, {} unsupported)",
            paint(Style::new().bold(), "translation report:"),
            self.files.len() + self.parse_failures.len(),
            c.total(),
            c.exact,
            c.idiomatic_equivalent,
            c.lossy,
            c.unsupported
        );

        for file in &self.files {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "{} -> {}",
                paint(Style::new().bold(), &file.path),
                file.module
            );
            for record in &file.constructs {
                let label = format!("{:<20}", record.confidence.as_str());
                let target = record
                    .target
                    .map(|(s, e)| format!("  -> {s}-{e}"))
                    .unwrap_or_default();
                let _ = writeln!(
                    out,
                    "  {} {} {}  {}{target}",
                    paint(confidence_style(record.confidence), &label),
                    record.kind,
                    record.identifier,
                    record.source
                );
            }
        }

        if !self.findings.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", paint(Style::new().bold(), "findings:"));
            for f in &self.findings {
                let _ = writeln!(
                    out,
                    "  {} {} {}: {}",
                    paint(finding_style(f.kind), finding_label(f.kind)),
                    f.location,
                    f.identifier,
                    f.message
                );
            }
        }

        if !self.parse_failures.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", paint(Style::new().bold(), "parse failures:"));
            for failure in &self.parse_failures {
                let _ = writeln!(
                    out,
                    "  {} {}",
                    paint(Color::Red.normal(), &failure.path),
                    failure.message
                );
            }
        }

        let v = &self.verification;
        if v.total > 0 {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "{} {} cases: {} match, {} mismatch, {} error, {} pending",
                paint(Style::new().bold(), "verification:"),
                v.total,
                v.matched,
                v.mismatched,
                v.errors,
                v.pending
            );
            for case in &v.cases {
                let style = match case.verdict.as_str() {
                    "PENDING" => Color::Yellow.normal(),
                    _ => Color::Red.normal(),
                };
                let _ = writeln!(
                    out,
                    "  {} {} {}: {}",
                    paint(style, &case.verdict),
                    case.case_id,
                    case.location,
                    case.detail
                );
            }
        }

        let _ = writeln!(out);
        let verdict = match self.verdict() {
            ReportVerdict::Passed => paint(Color::Green.bold(), "PASSED"),
            ReportVerdict::Failed => paint(Color::Red.bold(), "FAILED"),
        };
        let _ = write!(out, "verdict: {verdict}");
        out
    }
}

fn confidence_style(confidence: Confidence) -> Style {
    match confidence {
        Confidence::Exact => Color::Green.normal(),
        Confidence::IdiomaticEquivalent => Color::Cyan.normal(),
        Confidence::Lossy => Color::Yellow.normal(),
        Confidence::Unsupported => Color::Red.normal(),
    }
}

fn finding_label(kind: FindingKind) -> &'static str {
    match kind {
        FindingKind::Unsupported => "unsupported",
        FindingKind::Ambiguous => "ambiguous",
        FindingKind::Lossy => "lossy",
    }
}

fn finding_style(kind: FindingKind) -> Style {
    match kind {
        FindingKind::Unsupported | FindingKind::Ambiguous => Color::Red.normal(),
        FindingKind::Lossy => Color::Yellow.normal(),
    }
}

impl OutputFormatter for TranslationReport {
    fn format_text(&self) -> String {
        self.render(&|_, text| text.to_string())
    }

    fn format_pretty(&self, colors: bool) -> String {
        if colors {
            self.render(&|style, text| style.paint(text).to_string())
        } else {
            self.format_text()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portage_model::{
        Construct, ConstructNode, Expr, Finding, IntWidth, MappedEntry, MappingRule, Side,
        ErrorReason, TypeOrigin, TypeSig, Visibility,
    };
    use serde_json::json;

    fn entry(name: &str, confidence: Confidence, line: usize) -> MappedEntry {
        let location = Location::new("ascii.go", line, line);
        let findings = if confidence == Confidence::Lossy {
            vec![Finding {
                kind: FindingKind::Lossy,
                construct: ConstructKind::Constant,
                identifier: name.into(),
                location: location.clone(),
                message: "platform int assumed 64-bit".into(),
                candidates: vec![],
            }]
        } else {
            vec![]
        };
        MappedEntry {
            node: ConstructNode {
                name: name.into(),
                construct: Construct::Constant {
                    value: Expr::int("0"),
                    iota: None,
                    folded: None,
                },
                signature: TypeSig::int(IntWidth::W8, false),
                visibility: Visibility::Exported,
                location,
                docs: None,
                type_origin: TypeOrigin::Declared,
            },
            rule: Some(MappingRule {
                id: "const".into(),
                kind: ConstructKind::Constant,
                pattern: "_".into(),
                template: "{{name}} = {{value}}".into(),
                confidence: Confidence::Exact,
                note: None,
            }),
            confidence,
            rendered: format!("{name} = 0_u8"),
            findings,
        }
    }

    fn unit() -> MappedUnit {
        MappedUnit {
            path: "ascii.go".into(),
            package: "ascii".into(),
            module: "Ascii".into(),
            entries: vec![
                entry("NUL", Confidence::Exact, 3),
                entry("SOH", Confidence::Lossy, 4),
            ],
        }
    }

    fn result(id: &str, verdict: Verdict) -> VerificationResult {
        VerificationResult {
            case_id: id.into(),
            function: "Upper".into(),
            location: Location::new("ascii_test.go", 7, 7),
            verdict,
        }
    }

    #[test]
    fn test_counts_and_findings() {
        let mapped = unit();
        let report = report(
            &[
                UnitInput::Translated {
                    mapped: &mapped,
                    emitted: None,
                },
                UnitInput::Failed {
                    path: "broken.go",
                    error: "broken.go:2: expected declaration",
                },
            ],
            &[],
        );
        assert_eq!(report.counts.exact, 1);
        assert_eq!(report.counts.lossy, 1);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].location.start_line, 4);
        assert_eq!(report.parse_failures[0].path, "broken.go");
        assert_eq!(report.needs_review().count(), 1);
        assert_eq!(report.verdict(), ReportVerdict::Failed);
    }

    #[test]
    fn test_verification_counts_drive_the_verdict() {
        let mapped = unit();
        let units = [UnitInput::Translated {
            mapped: &mapped,
            emitted: None,
        }];
        let passing = report(
            &units,
            &[
                result("TestUpper", Verdict::Match),
                result(
                    "TestLower",
                    Verdict::Pending {
                        message: "`Lower` has no translation yet".into(),
                    },
                ),
            ],
        );
        assert_eq!(passing.verification.matched, 1);
        assert_eq!(passing.verification.pending, 1);
        assert_eq!(passing.verdict(), ReportVerdict::Passed);

        let failing = report(
            &units,
            &[
                result(
                    "TestUpper",
                    Verdict::Mismatch {
                        expected: json!(65),
                        actual: json!(66),
                    },
                ),
                result(
                    "TestSlow",
                    Verdict::Error {
                        side: Side::Target,
                        reason: ErrorReason::Timeout { millis: 100 },
                    },
                ),
            ],
        );
        assert_eq!(failing.verdict(), ReportVerdict::Failed);
        let mismatch = &failing.verification.cases[0];
        assert_eq!(mismatch.detail, "expected 65, got 66");
        assert_eq!(mismatch.expected, Some(json!(65)));
        assert_eq!(
            failing.verification.cases[1].detail,
            "target: timed out after 100ms"
        );
    }

    #[test]
    fn test_compact_text() {
        let mapped = unit();
        let report = report(
            &[UnitInput::Translated {
                mapped: &mapped,
                emitted: None,
            }],
            &[result("TestUpper", Verdict::Match)],
        );
        insta::assert_snapshot!(report.format_text(), @r"
        translation report: 1 files, 2 constructs (1 exact, 0 idiomatic, 1 lossy, 0 unsupported)

        ascii.go -> Ascii
          EXACT                constant NUL  ascii.go:3
          LOSSY                constant SOH  ascii.go:4

        findings:
          lossy ascii.go:4 SOH: platform int assumed 64-bit

        verification: 1 cases: 1 match, 0 mismatch, 0 error, 0 pending

        verdict: PASSED
        ");
    }
}
