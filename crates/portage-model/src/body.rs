//! Statement and expression IR for function bodies.

use crate::types::TypeSig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    AndNot,
    Shl,
    Shr,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn from_go(op: &str) -> Option<Self> {
        let op = match op {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            "&" => BinaryOp::BitAnd,
            "|" => BinaryOp::BitOr,
            "^" => BinaryOp::BitXor,
            "&^" => BinaryOp::AndNot,
            "<<" => BinaryOp::Shl,
            ">>" => BinaryOp::Shr,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            _ => return None,
        };
        Some(op)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
    BitNot,
    Deref,
    Addr,
    Recv,
}

impl UnaryOp {
    pub fn from_go(op: &str) -> Option<Self> {
        let op = match op {
            "-" => UnaryOp::Neg,
            "+" => UnaryOp::Pos,
            "!" => UnaryOp::Not,
            "^" => UnaryOp::BitNot,
            "*" => UnaryOp::Deref,
            "&" => UnaryOp::Addr,
            "<-" => UnaryOp::Recv,
            _ => return None,
        };
        Some(op)
    }
}

/// Element of a composite literal (`{key: value}` or `{value}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Expr>,
    pub value: Expr,
}

/// A function or closure parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Param {
    pub name: Option<String>,
    pub ty: TypeSig,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum Expr {
    Ident {
        name: String,
    },
    /// Integer literal, source spelling.
    Int {
        text: String,
    },
    Float {
        text: String,
    },
    Imaginary {
        text: String,
    },
    /// Rune literal including quotes.
    Rune {
        text: String,
    },
    /// String literal including quotes or backticks.
    Str {
        text: String,
    },
    Bool {
        value: bool,
    },
    Nil,
    Iota,
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        spread: bool,
    },
    Selector {
        operand: Box<Expr>,
        field: String,
    },
    Index {
        operand: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        operand: Box<Expr>,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
    },
    Composite {
        ty: Option<TypeSig>,
        elems: Vec<Element>,
    },
    Paren {
        inner: Box<Expr>,
    },
    FuncLit {
        params: Vec<Param>,
        result: TypeSig,
        body: Vec<Stmt>,
    },
    /// A type in expression position (`make([]int, n)`, `[]byte(s)`).
    Type {
        ty: TypeSig,
    },
    Unsupported {
        construct: String,
        text: String,
    },
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident { name: name.into() }
    }

    pub fn int(text: impl Into<String>) -> Self {
        Expr::Int { text: text.into() }
    }

    pub fn string(text: impl Into<String>) -> Self {
        Expr::Str { text: text.into() }
    }

    pub fn call(func: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            func: Box::new(func),
            args,
            spread: false,
        }
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn selector(operand: Expr, field: impl Into<String>) -> Self {
        Expr::Selector {
            operand: Box::new(operand),
            field: field.into(),
        }
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident { name } => Some(name),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Expr::Nil)
    }

    /// Strip redundant parentheses.
    pub fn unparen(&self) -> &Expr {
        match self {
            Expr::Paren { inner } => inner.unparen(),
            other => other,
        }
    }

    /// `pkg.Name` as a qualified path, when the operand is a bare identifier.
    pub fn qualified_name(&self) -> Option<(&str, &str)> {
        match self {
            Expr::Selector { operand, field } => operand.as_ident().map(|pkg| (pkg, field.as_str())),
            _ => None,
        }
    }

    /// Visit this expression and every sub-expression, pre-order, including
    /// closure bodies.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::Binary { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Expr::Unary { operand, .. } => operand.walk(visit),
            Expr::Call { func, args, .. } => {
                func.walk(visit);
                for arg in args {
                    arg.walk(visit);
                }
            }
            Expr::Selector { operand, .. } => operand.walk(visit),
            Expr::Index { operand, index } => {
                operand.walk(visit);
                index.walk(visit);
            }
            Expr::Slice { operand, low, high } => {
                operand.walk(visit);
                if let Some(low) = low {
                    low.walk(visit);
                }
                if let Some(high) = high {
                    high.walk(visit);
                }
            }
            Expr::Composite { elems, .. } => {
                for elem in elems {
                    if let Some(key) = &elem.key {
                        key.walk(visit);
                    }
                    elem.value.walk(visit);
                }
            }
            Expr::Paren { inner } => inner.walk(visit),
            Expr::FuncLit { body, .. } => {
                for stmt in body {
                    stmt.walk_exprs(&mut |expr| expr.walk(visit));
                }
            }
            _ => {}
        }
    }

    /// Visit every identifier in this expression, including nested bodies.
    pub fn walk_idents<'a>(&'a self, visit: &mut dyn FnMut(&'a str)) {
        self.walk(&mut |expr| {
            if let Expr::Ident { name } = expr {
                visit(name);
            }
        });
    }
}

/// Decode a Go string literal (interpreted or raw) into its value.
///
/// Returns `None` for malformed escapes. Byte escapes that do not form valid
/// UTF-8 are replaced, so callers comparing binary data should use
/// [`decode_go_string_bytes`].
pub fn decode_go_string(text: &str) -> Option<String> {
    decode_go_string_bytes(text).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// Decode a Go string literal into raw bytes.
pub fn decode_go_string_bytes(text: &str) -> Option<Vec<u8>> {
    if let Some(raw) = text.strip_prefix('`').and_then(|t| t.strip_suffix('`')) {
        return Some(raw.replace('\r', "").into_bytes());
    }
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    decode_escapes(inner, '"')
}

/// Decode a Go rune literal (`'a'`, `'\n'`, `'é'`) into its code point.
pub fn decode_go_rune(text: &str) -> Option<u32> {
    let inner = text.strip_prefix('\'')?.strip_suffix('\'')?;
    if !inner.starts_with('\\') {
        let mut chars = inner.chars();
        let ch = chars.next()?;
        return chars.next().is_none().then_some(ch as u32);
    }
    let mut chars = inner.chars().peekable();
    chars.next();
    let code = decode_escape(&mut chars, '\'')?;
    match code {
        Escaped::Char(ch) => Some(ch as u32),
        Escaped::Byte(b) => Some(b as u32),
    }
}

enum Escaped {
    Char(char),
    Byte(u8),
}

fn decode_escapes(inner: &str, quote: char) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match decode_escape(&mut chars, quote)? {
            Escaped::Char(ch) => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
            Escaped::Byte(b) => out.push(b),
        }
    }
    Some(out)
}

fn decode_escape(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    quote: char,
) -> Option<Escaped> {
    let take_hex = |chars: &mut std::iter::Peekable<std::str::Chars<'_>>, n: usize| {
        let digits: String = (0..n).filter_map(|_| chars.next()).collect();
        if digits.len() != n {
            return None;
        }
        u32::from_str_radix(&digits, 16).ok()
    };
    let escaped = match chars.next()? {
        'a' => Escaped::Char('\u{07}'),
        'b' => Escaped::Char('\u{08}'),
        'f' => Escaped::Char('\u{0c}'),
        'n' => Escaped::Char('\n'),
        'r' => Escaped::Char('\r'),
        't' => Escaped::Char('\t'),
        'v' => Escaped::Char('\u{0b}'),
        '\\' => Escaped::Char('\\'),
        c if c == quote => Escaped::Char(c),
        'x' => Escaped::Byte(take_hex(chars, 2)? as u8),
        'u' => Escaped::Char(char::from_u32(take_hex(chars, 4)?)?),
        'U' => Escaped::Char(char::from_u32(take_hex(chars, 8)?)?),
        d @ '0'..='7' => {
            let mut value = d.to_digit(8)?;
            for _ in 0..2 {
                value = value * 8 + chars.next()?.to_digit(8)?;
            }
            Escaped::Byte(u8::try_from(value).ok()?)
        }
        _ => return None,
    };
    Some(escaped)
}

/// Assignment operator: plain `=` or compound (`+=`, `<<=`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignOp {
    Plain,
    Compound(BinaryOp),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    /// Empty for `default:`.
    pub values: Vec<Expr>,
    pub is_default: bool,
    pub body: Vec<Stmt>,
}

/// A statement with its 1-based source line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub line: usize,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub enum StmtKind {
    Expr {
        expr: Expr,
    },
    /// Short variable declaration (`a, b := ...`).
    Define {
        names: Vec<String>,
        values: Vec<Expr>,
    },
    Var {
        names: Vec<String>,
        ty: Option<TypeSig>,
        values: Vec<Expr>,
    },
    Assign {
        targets: Vec<Expr>,
        op: AssignOp,
        values: Vec<Expr>,
    },
    IncDec {
        target: Expr,
        increment: bool,
    },
    Return {
        values: Vec<Expr>,
    },
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        then: Vec<Stmt>,
        /// Either a `Block` or a nested `If`.
        otherwise: Option<Box<Stmt>>,
    },
    Block {
        body: Vec<Stmt>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Vec<Stmt>,
    },
    Range {
        key: Option<String>,
        value: Option<String>,
        expr: Expr,
        body: Vec<Stmt>,
    },
    Switch {
        init: Option<Box<Stmt>>,
        tag: Option<Expr>,
        cases: Vec<SwitchCase>,
    },
    Break,
    Continue,
    Defer {
        call: Expr,
    },
    Unsupported {
        construct: String,
        text: String,
    },
}

impl Stmt {
    pub fn new(line: usize, kind: StmtKind) -> Self {
        Self { line, kind }
    }

    /// Nested statement lists, in source order.
    pub fn children(&self) -> Vec<&Stmt> {
        let mut out = Vec::new();
        match &self.kind {
            StmtKind::If {
                init,
                then,
                otherwise,
                ..
            } => {
                out.extend(init.as_deref());
                out.extend(then.iter());
                out.extend(otherwise.as_deref());
            }
            StmtKind::Block { body } | StmtKind::Range { body, .. } => out.extend(body.iter()),
            StmtKind::For {
                init, post, body, ..
            } => {
                out.extend(init.as_deref());
                out.extend(body.iter());
                out.extend(post.as_deref());
            }
            StmtKind::Switch { init, cases, .. } => {
                out.extend(init.as_deref());
                for case in cases {
                    out.extend(case.body.iter());
                }
            }
            _ => {}
        }
        out
    }

    /// Visit every expression directly owned by this statement and its children.
    pub fn walk_exprs<'a>(&'a self, visit: &mut dyn FnMut(&'a Expr)) {
        match &self.kind {
            StmtKind::Expr { expr } => visit(expr),
            StmtKind::Define { values, .. } | StmtKind::Var { values, .. } => {
                values.iter().for_each(&mut *visit)
            }
            StmtKind::Assign {
                targets, values, ..
            } => {
                targets.iter().for_each(&mut *visit);
                values.iter().for_each(&mut *visit);
            }
            StmtKind::IncDec { target, .. } => visit(target),
            StmtKind::Return { values } => values.iter().for_each(&mut *visit),
            StmtKind::If { cond, .. } => visit(cond),
            StmtKind::For { cond, .. } => {
                if let Some(cond) = cond {
                    visit(cond);
                }
            }
            StmtKind::Range { expr, .. } => visit(expr),
            StmtKind::Switch { tag, cases, .. } => {
                if let Some(tag) = tag {
                    visit(tag);
                }
                for case in cases {
                    case.values.iter().for_each(&mut *visit);
                }
            }
            StmtKind::Defer { call } => visit(call),
            StmtKind::Block { .. }
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Unsupported { .. } => {}
        }
        for child in self.children() {
            child.walk_exprs(visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_interpreted_string() {
        assert_eq!(decode_go_string(r#""a\tb\n""#).as_deref(), Some("a\tb\n"));
        assert_eq!(decode_go_string(r#""é""#).as_deref(), Some("é"));
        assert_eq!(decode_go_string_bytes(r#""\x00\xff""#), Some(vec![0, 0xff]));
        assert_eq!(decode_go_string_bytes(r#""\101""#), Some(b"A".to_vec()));
    }

    #[test]
    fn test_decode_raw_string() {
        assert_eq!(decode_go_string("`a\\nb`").as_deref(), Some("a\\nb"));
    }

    #[test]
    fn test_decode_rune() {
        assert_eq!(decode_go_rune("'a'"), Some('a' as u32));
        assert_eq!(decode_go_rune(r"'\n'"), Some(10));
        assert_eq!(decode_go_rune(r"'\x41'"), Some(0x41));
    }

    #[test]
    fn test_walk_idents_reaches_nested_calls() {
        let expr = Expr::call(
            Expr::ident("append"),
            vec![Expr::ident("buf"), Expr::binary(Expr::ident("x"), BinaryOp::Add, Expr::int("1"))],
        );
        let mut seen = Vec::new();
        expr.walk_idents(&mut |name| seen.push(name));
        assert_eq!(seen, vec!["append", "buf", "x"]);
    }
}
