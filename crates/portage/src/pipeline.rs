//! Batch translation: extract, map, emit, write, and verify files in parallel.

use portage_mapping::{AmbiguousMappingError, MapOptions, MappingError, RuleTable, map_with};
use portage_model::{
    ErrorReason, Location, MappedUnit, Side, TestCase, TranslationUnit, VerificationResult,
    Verdict,
};
use portage_report::{TranslationReport, UnitInput};
use portage_syntax::{EmittedUnit, Reader, Writer, reader_for_extension, writer_for_language};
use portage_verify::{Artifact, CrystalRunner, SourceReference, VerifyOptions, verify};
use rayon::prelude::*;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub const TARGET_LANGUAGE: &str = "crystal";

pub struct VerifySettings<'a> {
    pub tests_dir: &'a Path,
    pub reference: &'a dyn SourceReference,
    pub runner: &'a CrystalRunner,
    pub timeout: Duration,
}

pub struct BatchOptions<'a> {
    pub table: &'a RuleTable,
    pub strict: bool,
    /// Where `.cr` files go; `None` translates without writing.
    pub out_dir: Option<&'a Path>,
    pub verify: Option<VerifySettings<'a>>,
}

#[derive(Debug)]
pub struct Translated {
    pub unit: TranslationUnit,
    pub mapped: MappedUnit,
    pub emitted: EmittedUnit,
    pub written: Option<PathBuf>,
    pub results: Vec<VerificationResult>,
}

#[derive(Debug)]
pub enum FileStatus {
    Translated(Box<Translated>),
    ParseFailed(String),
    Ambiguous(AmbiguousMappingError),
    /// Another file hit a strict-mode ambiguity before this one finished.
    Cancelled,
    Failed(String),
}

#[derive(Debug)]
pub struct FileOutcome {
    pub path: String,
    pub status: FileStatus,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub files: Vec<FileOutcome>,
}

impl BatchOutcome {
    /// 1 when any file failed to parse, write, or map in strict mode.
    /// Unsupported, lossy, and mismatching constructs do not fail a batch.
    pub fn exit_code(&self) -> i32 {
        let failed = self
            .files
            .iter()
            .any(|f| !matches!(f.status, FileStatus::Translated(_)));
        i32::from(failed)
    }

    pub fn report(&self) -> TranslationReport {
        let messages: Vec<Option<String>> = self
            .files
            .iter()
            .map(|f| match &f.status {
                FileStatus::Translated(_) => None,
                FileStatus::ParseFailed(message) | FileStatus::Failed(message) => {
                    Some(message.clone())
                }
                FileStatus::Ambiguous(err) => Some(err.to_string()),
                FileStatus::Cancelled => {
                    Some("not translated: another file hit an ambiguous mapping".to_string())
                }
            })
            .collect();
        let units: Vec<UnitInput<'_>> = self
            .files
            .iter()
            .zip(&messages)
            .map(|(f, message)| match (&f.status, message) {
                (FileStatus::Translated(t), _) => UnitInput::Translated {
                    mapped: &t.mapped,
                    emitted: Some(&t.emitted),
                },
                (_, message) => UnitInput::Failed {
                    path: &f.path,
                    error: message.as_deref().unwrap_or_default(),
                },
            })
            .collect();
        let results: Vec<VerificationResult> = self
            .files
            .iter()
            .filter_map(|f| match &f.status {
                FileStatus::Translated(t) => Some(t.results.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect();
        portage_report::report(&units, &results)
    }
}

/// Translate `paths` in parallel. Outcomes keep the input order.
pub fn translate_batch(paths: &[PathBuf], options: &BatchOptions<'_>) -> BatchOutcome {
    let cancel = AtomicBool::new(false);
    let files = paths
        .par_iter()
        .map(|path| {
            let status = translate_file(path, options, &cancel);
            if let FileStatus::Ambiguous(err) = &status {
                tracing::warn!(path = %path.display(), %err, "ambiguous mapping");
            }
            FileOutcome {
                path: path.display().to_string(),
                status,
            }
        })
        .collect();
    BatchOutcome { files }
}

fn translate_file(path: &Path, options: &BatchOptions<'_>, cancel: &AtomicBool) -> FileStatus {
    let cancelled = || options.strict && cancel.load(Ordering::SeqCst);
    let shown = path.display().to_string();

    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => return FileStatus::Failed(format!("failed to read {shown}: {err}")),
    };
    let reader = match reader_for(path) {
        Ok(reader) => reader,
        Err(message) => return FileStatus::Failed(message),
    };
    if cancelled() {
        return FileStatus::Cancelled;
    }
    let unit = match reader.read(&shown, &source) {
        Ok(unit) => unit,
        Err(err) => {
            tracing::warn!(path = %shown, %err, "parse failed");
            return FileStatus::ParseFailed(err.to_string());
        }
    };

    if cancelled() {
        return FileStatus::Cancelled;
    }
    let mapped = match map_with(
        &unit,
        options.table,
        MapOptions {
            lenient: !options.strict,
        },
    ) {
        Ok(mapped) => mapped,
        Err(MappingError::Ambiguous(err)) => {
            cancel.store(true, Ordering::SeqCst);
            return FileStatus::Ambiguous(err);
        }
    };
    for finding in mapped.findings() {
        tracing::warn!(
            location = %finding.location,
            identifier = %finding.identifier,
            "{}",
            finding.message
        );
    }

    if cancelled() {
        return FileStatus::Cancelled;
    }
    let emitted = match writer().and_then(|w| w.write(&mapped).map_err(|e| e.to_string())) {
        Ok(emitted) => emitted,
        Err(message) => return FileStatus::Failed(message),
    };

    let written = match options.out_dir {
        Some(dir) => {
            let target = dir.join(target_file_name(path));
            if let Err(err) = write_atomic(&target, &emitted.text) {
                return FileStatus::Failed(format!("failed to write {}: {err}", target.display()));
            }
            tracing::info!(source = %shown, target = %target.display(), "wrote translation");
            Some(target)
        }
        None => None,
    };

    let results = match &options.verify {
        Some(settings) => verify_file(path, &unit, &mapped, &emitted, options.table, settings),
        None => Vec::new(),
    };

    FileStatus::Translated(Box::new(Translated {
        unit,
        mapped,
        emitted,
        written,
        results,
    }))
}

/// Verification problems become results; they never fail the file.
fn verify_file(
    path: &Path,
    unit: &TranslationUnit,
    mapped: &MappedUnit,
    emitted: &EmittedUnit,
    table: &RuleTable,
    settings: &VerifySettings<'_>,
) -> Vec<VerificationResult> {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return Vec::new();
    };
    let tests = settings.tests_dir.join(format!("{stem}_test.go"));
    if !tests.is_file() {
        tracing::debug!(path = %tests.display(), "no test file");
        return Vec::new();
    }
    let cases = match port_cases(&tests) {
        Ok(cases) => cases,
        Err((location, message)) => {
            tracing::warn!(path = %tests.display(), %message, "test file not ported");
            return vec![VerificationResult {
                case_id: tests
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                function: String::new(),
                location,
                verdict: Verdict::Error {
                    side: Side::Source,
                    reason: ErrorReason::Failed { message },
                },
            }];
        }
    };
    let artifact = Artifact {
        unit,
        mapped,
        table,
        text: &emitted.text,
    };
    let options = VerifyOptions {
        reference: settings.reference,
        runner: settings.runner,
        timeout: settings.timeout,
    };
    verify(&cases, artifact, &options)
}

/// Port a test file, keeping where it went wrong.
fn port_cases(path: &Path) -> Result<Vec<TestCase>, (Location, String)> {
    let shown = path.display().to_string();
    let source = std::fs::read_to_string(path).map_err(|err| {
        (
            Location::new(shown.clone(), 1, 1),
            format!("failed to read {shown}: {err}"),
        )
    })?;
    portage_syntax::input::port_go_tests(&shown, &source)
        .map_err(|err| (err.location.clone(), err.to_string()))
}

/// Port the assertions of a Go test file.
pub fn load_cases(path: &Path) -> Result<Vec<TestCase>, String> {
    port_cases(path).map_err(|(_, message)| message)
}

pub fn reader_for(path: &Path) -> Result<&'static dyn Reader, String> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    reader_for_extension(ext).ok_or_else(|| {
        format!(
            "no reader for {}: unsupported extension `{ext}`",
            path.display()
        )
    })
}

pub fn writer() -> Result<&'static dyn Writer, String> {
    writer_for_language(TARGET_LANGUAGE)
        .ok_or_else(|| format!("no writer for language `{TARGET_LANGUAGE}`"))
}

/// `ascii_table.go` → `ascii_table.cr`.
pub fn target_file_name(source: &Path) -> PathBuf {
    let ext = writer().map(|w| w.extension()).unwrap_or("cr");
    let stem = source.file_stem().unwrap_or(source.as_os_str());
    PathBuf::from(stem).with_extension(ext)
}

/// Replace `path` with `text`, or leave it untouched.
pub fn write_atomic(path: &Path, text: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(text.as_bytes())?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ASCII: &str = "package ascii\n\nconst NUL byte = 0x00\n";

    fn options<'a>(table: &'a RuleTable, out_dir: Option<&'a Path>, strict: bool) -> BatchOptions<'a> {
        BatchOptions {
            table,
            strict,
            out_dir,
            verify: None,
        }
    }

    #[test]
    fn test_parse_failure_does_not_stop_siblings() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("ascii.go");
        let bad = dir.path().join("broken.go");
        std::fs::write(&good, ASCII).unwrap();
        std::fs::write(&bad, "package broken\n\nfunc (\n").unwrap();
        let out = dir.path().join("out");
        let table = RuleTable::builtin().unwrap();

        let outcome = translate_batch(&[bad, good], &options(&table, Some(&out), false));
        assert!(matches!(outcome.files[0].status, FileStatus::ParseFailed(_)));
        assert!(matches!(outcome.files[1].status, FileStatus::Translated(_)));
        assert_eq!(outcome.exit_code(), 1);

        let written = std::fs::read_to_string(out.join("ascii.cr")).unwrap();
        assert!(written.contains("NUL = 0x00_u8"));
        assert!(!out.join("broken.cr").exists());

        let report = outcome.report();
        assert_eq!(report.parse_failures.len(), 1);
        assert_eq!(report.files.len(), 1);
    }

    #[test]
    fn test_malformed_test_file_is_a_source_error() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("ascii.go");
        std::fs::write(&file, ASCII).unwrap();
        std::fs::write(
            dir.path().join("ascii_test.go"),
            "package ascii\n\nfunc TestNul(t *testing.T) {\n",
        )
        .unwrap();
        let out = dir.path().join("out");
        let table = RuleTable::builtin().unwrap();
        let runner = CrystalRunner::default();
        let reference = portage_verify::LiteralReference;
        let options = BatchOptions {
            table: &table,
            strict: false,
            out_dir: Some(&out),
            verify: Some(VerifySettings {
                tests_dir: dir.path(),
                reference: &reference,
                runner: &runner,
                timeout: Duration::from_secs(1),
            }),
        };

        let outcome = translate_batch(&[file], &options);
        let FileStatus::Translated(translated) = &outcome.files[0].status else {
            panic!("file should still translate: {:?}", outcome.files[0].status);
        };
        assert!(translated.written.is_some());
        assert_eq!(translated.results.len(), 1);
        assert_eq!(translated.results[0].case_id, "ascii_test.go");
        assert!(matches!(
            translated.results[0].verdict,
            Verdict::Error {
                side: Side::Source,
                ..
            }
        ));
        assert_eq!(outcome.exit_code(), 0);

        let report = outcome.report();
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.verification.errors, 1);
        assert_eq!(report.verdict(), portage_report::ReportVerdict::Failed);
    }

    #[test]
    fn test_strict_ambiguity_fails_the_batch() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("ascii.go");
        std::fs::write(&file, ASCII).unwrap();
        let tied = RuleTable::from_toml(
            "[[construct]]\nid = \"a\"\nkind = \"constant\"\npattern = \"_\"\ntemplate = \"{{name}}\"\nconfidence = \"exact\"\n\n\
             [[construct]]\nid = \"b\"\nkind = \"constant\"\npattern = \"_\"\ntemplate = \"{{name}}\"\nconfidence = \"exact\"\n",
            "tied.toml",
        )
        .unwrap();

        let strict = translate_batch(std::slice::from_ref(&file), &options(&tied, None, true));
        let FileStatus::Ambiguous(err) = &strict.files[0].status else {
            panic!("expected an ambiguity");
        };
        assert_eq!(err.rules, vec!["a", "b"]);
        assert_eq!(strict.exit_code(), 1);

        let lenient = translate_batch(&[file], &options(&tied, None, false));
        assert_eq!(lenient.exit_code(), 0);
    }

    #[test]
    fn test_target_file_name() {
        assert_eq!(
            target_file_name(Path::new("src/ascii_table.go")),
            PathBuf::from("ascii_table.cr")
        );
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out.cr");
        write_atomic(&path, "a").unwrap();
        write_atomic(&path, "b").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "b");
    }
}
