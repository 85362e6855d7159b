//! Literal spelling and small text helpers.

use portage_model::{BinaryOp, Expr, UnaryOp};

/// Go integer literal → Crystal spelling with `suffix` appended.
///
/// Bases are kept; legacy octal (`017`) gains the `0o` prefix.
pub fn int_literal(text: &str, suffix: &str) -> String {
    let lower = text.to_ascii_lowercase();
    let body = if let Some(rest) = prefixed(&lower, "0x") {
        format!("0x{rest}")
    } else if let Some(rest) = prefixed(&lower, "0o") {
        format!("0o{rest}")
    } else if let Some(rest) = prefixed(&lower, "0b") {
        format!("0b{rest}")
    } else if lower.len() > 1 && lower.starts_with('0') && lower.chars().all(|c| c.is_ascii_digit() || c == '_') {
        format!("0o{}", lower[1..].trim_start_matches('_'))
    } else {
        text.to_string()
    };
    format!("{body}{suffix}")
}

fn prefixed<'t>(text: &'t str, prefix: &str) -> Option<&'t str> {
    text.strip_prefix(prefix).map(|rest| rest.trim_start_matches('_'))
}

/// Integer literal used where a float is expected: `2` → `2.0`.
pub fn int_as_float(text: &str, suffix: &str) -> String {
    let value = parse_int(text);
    match value {
        Some(v) => format!("{v}.0{suffix}"),
        None => format!("{text}.0{suffix}"),
    }
}

pub fn parse_int(text: &str) -> Option<i128> {
    let clean: String = text.chars().filter(|&c| c != '_').collect::<String>().to_ascii_lowercase();
    let (digits, radix) = if let Some(rest) = clean.strip_prefix("0x") {
        (rest.to_string(), 16)
    } else if let Some(rest) = clean.strip_prefix("0o") {
        (rest.to_string(), 8)
    } else if let Some(rest) = clean.strip_prefix("0b") {
        (rest.to_string(), 2)
    } else if clean.len() > 1 && clean.starts_with('0') {
        (clean[1..].to_string(), 8)
    } else {
        (clean, 10)
    };
    i128::from_str_radix(&digits, radix).ok()
}

/// Go float literal → Crystal spelling: `.5` → `0.5`, `1.` → `1.0`.
pub fn float_literal(text: &str, suffix: &str) -> String {
    let mut body = text.to_string();
    if body.starts_with('.') {
        body.insert(0, '0');
    }
    if let Some(dot) = body.find('.') {
        let after = &body[dot + 1..];
        if after.is_empty() || after.starts_with(['e', 'E']) {
            body.insert(dot + 1, '0');
        }
    }
    format!("{body}{suffix}")
}

/// Crystal character literal for a code point.
pub fn char_literal(code: u32) -> String {
    match char::from_u32(code) {
        Some('\'') => r"'\''".to_string(),
        Some('\\') => r"'\\'".to_string(),
        Some('\n') => r"'\n'".to_string(),
        Some('\t') => r"'\t'".to_string(),
        Some('\r') => r"'\r'".to_string(),
        Some('\0') => r"'\0'".to_string(),
        Some(c) if !c.is_control() => format!("'{c}'"),
        _ => format!("'\\u{{{code:X}}}'"),
    }
}

/// Crystal string literal holding exactly `bytes`.
pub fn string_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('"');
    let mut rest = bytes;
    while !rest.is_empty() {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                push_escaped(&mut out, valid);
                break;
            }
            Err(err) => {
                let (good, bad) = rest.split_at(err.valid_up_to());
                // valid_up_to guarantees `good` is UTF-8
                push_escaped(&mut out, &String::from_utf8_lossy(good));
                let skip = err.error_len().unwrap_or(bad.len()).max(1);
                for b in &bad[..skip] {
                    out.push_str(&format!("\\x{b:02X}"));
                }
                rest = &bad[skip..];
            }
        }
    }
    out.push('"');
    out
}

fn push_escaped(out: &mut String, text: &str) {
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '#' if chars.peek() == Some(&'{') => out.push_str("\\#"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:X}}}", c as u32)),
            c => out.push(c),
        }
    }
}

/// Whether `text` can take a method call or operator without parentheses.
pub fn is_atomic(text: &str) -> bool {
    if text.starts_with(['-', '!', '~', '&', '*']) {
        return false;
    }
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in text.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            c if depth == 0 && c.is_whitespace() => return false,
            _ => {}
        }
    }
    true
}

/// Wrap `text` in parentheses unless it is atomic.
pub fn atom(text: String) -> String {
    if is_atomic(&text) {
        text
    } else {
        format!("({text})")
    }
}

fn binary_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
        BinaryOp::BitAnd => "&",
        BinaryOp::BitOr => "|",
        BinaryOp::BitXor => "^",
        BinaryOp::AndNot => "&^",
        BinaryOp::Shl => "<<",
        BinaryOp::Shr => ">>",
        BinaryOp::And => "&&",
        BinaryOp::Or => "||",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
    }
}

/// Go-like rendering of an expression, for comments and messages.
pub fn source_text(expr: &Expr) -> String {
    match expr {
        Expr::Ident { name } => name.clone(),
        Expr::Int { text }
        | Expr::Float { text }
        | Expr::Imaginary { text }
        | Expr::Rune { text }
        | Expr::Str { text } => text.clone(),
        Expr::Bool { value } => value.to_string(),
        Expr::Nil => "nil".to_string(),
        Expr::Iota => "iota".to_string(),
        Expr::Binary { op, left, right } => format!(
            "{} {} {}",
            source_text(left),
            binary_symbol(*op),
            source_text(right)
        ),
        Expr::Unary { op, operand } => {
            let symbol = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Pos => "+",
                UnaryOp::Not => "!",
                UnaryOp::BitNot => "^",
                UnaryOp::Deref => "*",
                UnaryOp::Addr => "&",
                UnaryOp::Recv => "<-",
            };
            format!("{symbol}{}", source_text(operand))
        }
        Expr::Call { func, args, spread } => {
            let args: Vec<String> = args.iter().map(source_text).collect();
            let dots = if *spread { "..." } else { "" };
            format!("{}({}{dots})", source_text(func), args.join(", "))
        }
        Expr::Selector { operand, field } => format!("{}.{field}", source_text(operand)),
        Expr::Index { operand, index } => {
            format!("{}[{}]", source_text(operand), source_text(index))
        }
        Expr::Slice { operand, low, high } => format!(
            "{}[{}:{}]",
            source_text(operand),
            low.as_deref().map(source_text).unwrap_or_default(),
            high.as_deref().map(source_text).unwrap_or_default()
        ),
        Expr::Composite { ty, elems } => {
            let elems: Vec<String> = elems
                .iter()
                .map(|e| match &e.key {
                    Some(key) => format!("{}: {}", source_text(key), source_text(&e.value)),
                    None => source_text(&e.value),
                })
                .collect();
            let ty = ty.as_ref().map(|t| t.to_string()).unwrap_or_default();
            format!("{ty}{{{}}}", elems.join(", "))
        }
        Expr::Paren { inner } => format!("({})", source_text(inner)),
        Expr::FuncLit { .. } => "func literal".to_string(),
        Expr::Type { ty } => ty.to_string(),
        Expr::Unsupported { text, .. } => text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_bases() {
        assert_eq!(int_literal("0x00", "_u8"), "0x00_u8");
        assert_eq!(int_literal("0XFF", ""), "0xff");
        assert_eq!(int_literal("017", "_i64"), "0o17_i64");
        assert_eq!(int_literal("0", "_i64"), "0_i64");
        assert_eq!(int_literal("1_000", "_i32"), "1_000_i32");
        assert_eq!(parse_int("0x_ff"), Some(255));
        assert_eq!(parse_int("017"), Some(15));
    }

    #[test]
    fn test_float_forms() {
        assert_eq!(float_literal(".5", ""), "0.5");
        assert_eq!(float_literal("1.", "_f32"), "1.0_f32");
        assert_eq!(float_literal("1.e3", ""), "1.0e3");
        assert_eq!(float_literal("2.5e-3", ""), "2.5e-3");
        assert_eq!(int_as_float("0x10", ""), "16.0");
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(string_literal(b"a\"b\\c\n"), r#""a\"b\\c\n""#);
        assert_eq!(string_literal(b"#{x}"), r##""\#{x}""##);
        assert_eq!(string_literal(b"\xffA"), r#""\xFFA""#);
        assert_eq!(string_literal("é".as_bytes()), "\"é\"");
    }

    #[test]
    fn test_char_literals() {
        assert_eq!(char_literal('a' as u32), "'a'");
        assert_eq!(char_literal('\'' as u32), r"'\''");
        assert_eq!(char_literal(7), r"'\u{7}'");
    }

    #[test]
    fn test_atomicity() {
        assert!(is_atomic("foo.bar(a, b)"));
        assert!(is_atomic("\"a b\""));
        assert!(!is_atomic("a &+ b"));
        assert!(!is_atomic("-x"));
        assert!(!is_atomic("x ? y : z"));
        assert_eq!(atom("a == b".into()), "(a == b)");
    }
}
