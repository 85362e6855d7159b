//! Identifier conventions on the Crystal side.

const KEYWORDS: &[&str] = &[
    "abstract", "alias", "annotation", "as", "asm", "begin", "break", "case", "class", "def", "do",
    "else", "elsif", "end", "ensure", "enum", "extend", "false", "for", "fun", "if", "in",
    "include", "instance_sizeof", "is_a", "lib", "macro", "module", "next", "nil", "of",
    "offsetof", "out", "pointerof", "private", "protected", "require", "rescue", "responds_to",
    "return", "select", "self", "sizeof", "struct", "super", "then", "true", "type", "typeof",
    "uninitialized", "union", "unless", "until", "verbatim", "when", "while", "with", "yield",
];

/// `parseHTTPRequest` → `parse_http_request`.
pub fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Locals, parameters, fields, and method names.
pub fn local_name(name: &str) -> String {
    if name == "_" {
        return name.to_string();
    }
    escape(snake_case(name))
}

/// `maxSize` → `MAX_SIZE`.
pub fn constant_name(name: &str) -> String {
    snake_case(name).to_uppercase()
}

/// Types keep their spelling but must start uppercase.
pub fn type_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Package name → module name: `text_util` → `TextUtil`.
pub fn module_name(package: &str) -> String {
    package
        .split(['_', '-'])
        .filter(|part| !part.is_empty())
        .map(type_name)
        .collect()
}

fn escape(name: String) -> String {
    if KEYWORDS.contains(&name.as_str()) {
        format!("{name}_")
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case_acronyms() {
        assert_eq!(snake_case("ToUpper"), "to_upper");
        assert_eq!(snake_case("parseHTTPRequest"), "parse_http_request");
        assert_eq!(snake_case("ID"), "id");
        assert_eq!(snake_case("utf8Len"), "utf8_len");
        assert_eq!(snake_case("x"), "x");
    }

    #[test]
    fn test_keywords_are_escaped() {
        assert_eq!(local_name("end"), "end_");
        assert_eq!(local_name("next"), "next_");
        assert_eq!(local_name("_"), "_");
    }

    #[test]
    fn test_constant_and_module_names() {
        assert_eq!(constant_name("NUL"), "NUL");
        assert_eq!(constant_name("maxSize"), "MAX_SIZE");
        assert_eq!(module_name("ascii"), "Ascii");
        assert_eq!(module_name("text_util"), "TextUtil");
        assert_eq!(type_name("point"), "Point");
    }
}
