//! Translation reports and the output-format layer.
//!
//! [`report`] aggregates mapped units, parse failures, and verification
//! results into a [`TranslationReport`]. Command results print through
//! [`OutputFormatter`] as compact text, pretty text, JSON, or JSON Lines.

mod output;
mod report;

pub use output::{ColorMode, OutputFormat, OutputFormatter, PrettyConfig, output_schema};
pub use report::{
    CaseRecord, ConfidenceCounts, ConstructRecord, FileReport, FindingRecord, ParseFailure,
    ReportVerdict, Span, TranslationReport, UnitInput, VerificationSummary, report,
};
