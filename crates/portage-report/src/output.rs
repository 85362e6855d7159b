//! Output formatting shared by all commands.
//!
//! Every command result implements [`OutputFormatter`] and is printed in the
//! [`OutputFormat`] resolved from CLI flags and configuration.

use serde::{Deserialize, Serialize};
use std::io::IsTerminal;

/// Color output mode.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Auto-detect based on TTY (default)
    #[default]
    Auto,
    Always,
    Never,
}

/// `[output]` section of `portage.toml`.
///
/// ```toml
/// [output]
/// pretty = true      # auto-enable when TTY (default: auto)
/// colors = "auto"    # "auto", "always", or "never"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(default)]
pub struct PrettyConfig {
    /// None = auto (true when stdout is a TTY)
    pub pretty: Option<bool>,
    pub colors: Option<ColorMode>,
}

impl PrettyConfig {
    pub fn enabled(&self) -> bool {
        self.pretty.unwrap_or_else(|| std::io::stdout().is_terminal())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text, no colors.
    #[default]
    Compact,
    /// Human-oriented text, with colors if available.
    Pretty { colors: bool },
    Json,
    /// One JSON object per line; arrays emit each element.
    JsonLines,
}

impl OutputFormat {
    /// Resolve from CLI flags and config. JSON flags win over text modes.
    pub fn from_cli(json: bool, jsonl: bool, pretty: bool, compact: bool, config: &PrettyConfig) -> Self {
        if jsonl {
            return OutputFormat::JsonLines;
        }
        if json {
            return OutputFormat::Json;
        }
        let is_pretty = !compact && (pretty || config.enabled());
        if !is_pretty {
            return OutputFormat::Compact;
        }
        let colors = if std::env::var_os("NO_COLOR").is_some() {
            false
        } else {
            match config.colors.unwrap_or_default() {
                ColorMode::Never => false,
                ColorMode::Always => true,
                // explicit --pretty overrides the TTY check
                ColorMode::Auto => pretty || std::io::stdout().is_terminal(),
            }
        };
        OutputFormat::Pretty { colors }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::JsonLines)
    }

    pub fn use_colors(&self) -> bool {
        matches!(self, OutputFormat::Pretty { colors: true })
    }
}

/// Types that print as text or JSON.
///
/// JSON goes through serde; text is custom. The schema backs
/// `--output-schema`.
pub trait OutputFormatter: Serialize + schemars::JsonSchema {
    fn format_text(&self) -> String;

    /// Defaults to [`format_text`](Self::format_text).
    fn format_pretty(&self, colors: bool) -> String {
        let _ = colors;
        self.format_text()
    }

    fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Compact => self.format_text(),
            OutputFormat::Pretty { colors } => self.format_pretty(colors),
            OutputFormat::Json => serde_json::to_string(self).unwrap_or_default(),
            OutputFormat::JsonLines => {
                let json = serde_json::to_value(self).unwrap_or_default();
                json_lines(&json)
            }
        }
    }

    fn print(&self, format: OutputFormat) {
        println!("{}", self.render(format));
    }
}

fn json_lines(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| serde_json::to_string(item).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\n"),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// JSON schema of `T`, for `--output-schema`.
pub fn output_schema<T: OutputFormatter>() -> String {
    let schema = schemars::schema_for!(T);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, schemars::JsonSchema)]
    struct Sample {
        name: String,
        items: Vec<u32>,
    }

    impl OutputFormatter for Sample {
        fn format_text(&self) -> String {
            format!("{}: {}", self.name, self.items.len())
        }
    }

    #[derive(Serialize, schemars::JsonSchema)]
    #[serde(transparent)]
    struct Rows(Vec<Sample>);

    impl OutputFormatter for Rows {
        fn format_text(&self) -> String {
            String::new()
        }
    }

    #[test]
    fn test_output_format_from_cli() {
        let config = PrettyConfig {
            pretty: Some(false),
            colors: None,
        };
        assert_eq!(
            OutputFormat::from_cli(false, false, false, true, &config),
            OutputFormat::Compact
        );
        assert_eq!(
            OutputFormat::from_cli(true, false, true, false, &config),
            OutputFormat::Json
        );
        assert_eq!(
            OutputFormat::from_cli(true, true, false, false, &config),
            OutputFormat::JsonLines
        );
        let never = PrettyConfig {
            pretty: None,
            colors: Some(ColorMode::Never),
        };
        assert_eq!(
            OutputFormat::from_cli(false, false, true, false, &never),
            OutputFormat::Pretty { colors: false }
        );
    }

    #[test]
    fn test_render_formats() {
        let sample = Sample {
            name: "ascii".into(),
            items: vec![1, 2],
        };
        assert_eq!(sample.render(OutputFormat::Compact), "ascii: 2");
        assert_eq!(
            sample.render(OutputFormat::Json),
            r#"{"name":"ascii","items":[1,2]}"#
        );
        let rows = Rows(vec![
            Sample {
                name: "a".into(),
                items: vec![],
            },
            Sample {
                name: "b".into(),
                items: vec![3],
            },
        ]);
        assert_eq!(
            rows.render(OutputFormat::JsonLines),
            // keys come out sorted: each line goes through serde_json::Value
            "{\"items\":[],\"name\":\"a\"}\n{\"items\":[3],\"name\":\"b\"}"
        );
    }

    #[test]
    fn test_schema_names_fields() {
        let schema = output_schema::<Sample>();
        assert!(schema.contains("\"items\""));
    }
}
