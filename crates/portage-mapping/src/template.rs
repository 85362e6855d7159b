//! `{{name}}` templates for rule right-hand sides.
//!
//! Rendering is line-aware: a multi-line value inherits the indentation of
//! the line its placeholder sits on, and a line holding nothing but a
//! placeholder that renders empty is dropped.

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Var(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    lines: Vec<Vec<Segment>>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unterminated placeholder on template line {line}")]
pub struct TemplateError {
    pub line: usize,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut lines = Vec::new();
        for (n, line) in source.split('\n').enumerate() {
            let mut segments = Vec::new();
            let mut rest = line;
            while let Some(start) = rest.find("{{") {
                let Some(len) = rest[start + 2..].find("}}") else {
                    return Err(TemplateError { line: n + 1 });
                };
                if start > 0 {
                    segments.push(Segment::Text(rest[..start].to_string()));
                }
                let name = rest[start + 2..start + 2 + len].trim();
                segments.push(Segment::Var(name.to_string()));
                rest = &rest[start + 2 + len + 2..];
            }
            if !rest.is_empty() {
                segments.push(Segment::Text(rest.to_string()));
            }
            lines.push(segments);
        }
        Ok(Self {
            source: source.to_string(),
            lines,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().flatten().filter_map(|seg| match seg {
            Segment::Var(name) => Some(name.as_str()),
            Segment::Text(_) => None,
        })
    }

    pub fn uses(&self, name: &str) -> bool {
        self.placeholders().any(|p| p == name)
    }

    /// Render with `lookup`; unknown names render empty.
    pub fn render<'v>(&self, lookup: impl Fn(&str) -> Option<&'v str>) -> String {
        let mut out: Vec<String> = Vec::new();
        for segments in &self.lines {
            let indent: String = match segments.first() {
                Some(Segment::Text(text)) => {
                    text.chars().take_while(|c| c.is_whitespace()).collect()
                }
                _ => String::new(),
            };
            let mut line = String::new();
            let mut only_empty_vars = true;
            let mut has_var = false;
            for segment in segments {
                match segment {
                    Segment::Text(text) => {
                        if !text.trim().is_empty() {
                            only_empty_vars = false;
                        }
                        line.push_str(text);
                    }
                    Segment::Var(name) => {
                        has_var = true;
                        let value = lookup(name).unwrap_or("");
                        if !value.is_empty() {
                            only_empty_vars = false;
                        }
                        line.push_str(&value.replace('\n', &format!("\n{indent}")));
                    }
                }
            }
            if has_var && only_empty_vars {
                continue;
            }
            out.extend(line.split('\n').map(|l| l.trim_end().to_string()));
        }
        let mut text = out.join("\n");
        text.truncate(text.trim_end_matches('\n').len());
        text
    }

    /// Render from `(name, value)` pairs.
    pub fn render_with(&self, vars: &[(&str, &str)]) -> String {
        self.render(|name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| *value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_placeholders() {
        let t = Template::parse("{{ name }} = {{value}}").unwrap();
        assert_eq!(t.render_with(&[("name", "NUL"), ("value", "0x00_u8")]), "NUL = 0x00_u8");
        assert_eq!(t.placeholders().collect::<Vec<_>>(), vec!["name", "value"]);
    }

    #[test]
    fn test_multiline_value_is_indented() {
        let t = Template::parse("def f\n  {{body}}\nend").unwrap();
        assert_eq!(
            t.render_with(&[("body", "if x\n  y\nend")]),
            "def f\n  if x\n    y\n  end\nend"
        );
    }

    #[test]
    fn test_empty_placeholder_line_is_dropped() {
        let t = Template::parse("struct P\n  {{members}}\nend").unwrap();
        assert_eq!(t.render_with(&[("members", "")]), "struct P\nend");
    }

    #[test]
    fn test_blank_lines_in_values_carry_no_indent() {
        let t = Template::parse("  {{body}}").unwrap();
        assert_eq!(t.render_with(&[("body", "a\n\nb")]), "  a\n\n  b");
    }

    #[test]
    fn test_unterminated_placeholder() {
        assert_eq!(
            Template::parse("ok\nX = {{value").unwrap_err(),
            TemplateError { line: 2 }
        );
    }
}
