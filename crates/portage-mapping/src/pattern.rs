//! Type patterns: the left-hand side of type and construct rules.
//!
//! ```text
//! _                       any type
//! int8 uint string ...    a concrete scalar
//! signed<_> unsigned<_>   any signed / unsigned integer
//! float<_>                any float
//! slice<P>                slice<P, grow>  slice<P, fixed>
//! array<P, 16>            array<P, _>
//! map<P, P>  chan<P>  optional<P>
//! result<P, error>        result<P, flag>  result<P, _>
//! tuple func struct interface param
//! named<_>  named<Point>  named<strings.Builder>
//! ```
//!
//! Specificity counts constructors and qualifiers that are not wildcards.

use portage_model::{Failure, IntWidth, TypeSig};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypePattern {
    Any,
    Int {
        signed: bool,
        width: Option<IntWidth>,
    },
    Float {
        bits: Option<u8>,
    },
    Complex {
        bits: Option<u8>,
    },
    Bool,
    String,
    Error,
    Unit,
    Slice {
        elem: Box<TypePattern>,
        growable: Option<bool>,
    },
    Array {
        elem: Box<TypePattern>,
        len: Option<u64>,
    },
    Map {
        key: Box<TypePattern>,
        value: Box<TypePattern>,
    },
    Chan {
        elem: Box<TypePattern>,
    },
    Optional {
        inner: Box<TypePattern>,
    },
    Result {
        value: Box<TypePattern>,
        failure: Option<Failure>,
    },
    Tuple,
    Func,
    Struct,
    Interface,
    Named {
        package: Option<String>,
        name: Option<String>,
    },
    Param,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid type pattern `{pattern}`: {message}")]
pub struct PatternError {
    pub pattern: String,
    pub message: String,
}

impl TypePattern {
    pub fn parse(text: &str) -> Result<Self, PatternError> {
        let tokens = tokenize(text);
        let mut parser = PatternParser {
            text,
            tokens,
            pos: 0,
        };
        let pattern = parser.pattern()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error("trailing input"));
        }
        Ok(pattern)
    }

    pub fn specificity(&self) -> usize {
        match self {
            TypePattern::Any => 0,
            TypePattern::Int { width, .. } => 1 + usize::from(width.is_some()),
            TypePattern::Float { bits } | TypePattern::Complex { bits } => {
                1 + usize::from(bits.is_some())
            }
            TypePattern::Bool
            | TypePattern::String
            | TypePattern::Error
            | TypePattern::Unit
            | TypePattern::Tuple
            | TypePattern::Func
            | TypePattern::Struct
            | TypePattern::Interface
            | TypePattern::Param => 1,
            TypePattern::Slice { elem, growable } => {
                1 + elem.specificity() + usize::from(growable.is_some())
            }
            TypePattern::Array { elem, len } => 1 + elem.specificity() + usize::from(len.is_some()),
            TypePattern::Map { key, value } => 1 + key.specificity() + value.specificity(),
            TypePattern::Chan { elem } => 1 + elem.specificity(),
            TypePattern::Optional { inner } => 1 + inner.specificity(),
            TypePattern::Result { value, failure } => {
                1 + value.specificity() + usize::from(failure.is_some())
            }
            TypePattern::Named { name, .. } => 1 + usize::from(name.is_some()),
        }
    }

    pub fn matches(&self, ty: &TypeSig) -> bool {
        match (self, ty) {
            (TypePattern::Any, _) => true,
            (
                TypePattern::Int { signed, width },
                TypeSig::Int {
                    signed: s,
                    width: w,
                },
            ) => signed == s && width.is_none_or(|width| width == *w),
            (TypePattern::Float { bits }, TypeSig::Float { bits: b })
            | (TypePattern::Complex { bits }, TypeSig::Complex { bits: b }) => {
                bits.is_none_or(|bits| bits == *b)
            }
            (TypePattern::Bool, TypeSig::Bool)
            | (TypePattern::String, TypeSig::String)
            | (TypePattern::Error, TypeSig::Error)
            | (TypePattern::Unit, TypeSig::Unit)
            | (TypePattern::Tuple, TypeSig::Tuple { .. })
            | (TypePattern::Func, TypeSig::Func { .. })
            | (TypePattern::Struct, TypeSig::Struct { .. })
            | (TypePattern::Interface, TypeSig::Interface { .. })
            | (TypePattern::Param, TypeSig::Param { .. }) => true,
            (
                TypePattern::Slice { elem, growable },
                TypeSig::Slice {
                    elem: e,
                    growable: g,
                },
            ) => growable.is_none_or(|growable| growable == *g) && elem.matches(e),
            (TypePattern::Array { elem, len }, TypeSig::Array { elem: e, len: l }) => {
                len.is_none_or(|len| len == *l) && elem.matches(e)
            }
            (TypePattern::Map { key, value }, TypeSig::Map { key: k, value: v }) => {
                key.matches(k) && value.matches(v)
            }
            (TypePattern::Chan { elem }, TypeSig::Chan { elem: e }) => elem.matches(e),
            (TypePattern::Optional { inner }, TypeSig::Optional { inner: i }) => inner.matches(i),
            (
                TypePattern::Result { value, failure },
                TypeSig::ErrorUnion {
                    value: v,
                    failure: f,
                },
            ) => failure.is_none_or(|failure| failure == *f) && value.matches(v),
            (
                TypePattern::Named { package, name },
                TypeSig::Named {
                    name: n,
                    package: p,
                    ..
                },
            ) => match name {
                // `named<_>` only covers types declared in the unit's own package.
                None => p.is_none(),
                Some(name) => name == n && package == p,
            },
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Open,
    Close,
    Comma,
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    for ch in text.chars() {
        let punct = match ch {
            '<' => Some(Token::Open),
            '>' => Some(Token::Close),
            ',' => Some(Token::Comma),
            c if c.is_whitespace() => None,
            c => {
                word.push(c);
                continue;
            }
        };
        if !word.is_empty() {
            tokens.push(Token::Word(std::mem::take(&mut word)));
        }
        tokens.extend(punct);
    }
    if !word.is_empty() {
        tokens.push(Token::Word(word));
    }
    tokens
}

struct PatternParser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl PatternParser<'_> {
    fn error(&self, message: impl Into<String>) -> PatternError {
        PatternError {
            pattern: self.text.to_string(),
            message: message.into(),
        }
    }

    fn word(&mut self) -> Result<String, PatternError> {
        match self.tokens.get(self.pos) {
            Some(Token::Word(w)) => {
                self.pos += 1;
                Ok(w.clone())
            }
            _ => Err(self.error("expected a name")),
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), PatternError> {
        if self.tokens.get(self.pos) == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected {token:?}")))
        }
    }

    /// Parse `<a, b, ...>` after a constructor: patterns, then qualifier words.
    fn args(&mut self) -> Result<Vec<Arg>, PatternError> {
        self.expect(Token::Open)?;
        let mut args = vec![self.arg()?];
        while self.tokens.get(self.pos) == Some(&Token::Comma) {
            self.pos += 1;
            args.push(self.arg()?);
        }
        self.expect(Token::Close)?;
        Ok(args)
    }

    fn arg(&mut self) -> Result<Arg, PatternError> {
        let start = self.pos;
        let word = self.word()?;
        if self.tokens.get(self.pos) == Some(&Token::Open) {
            self.pos = start;
            return Ok(Arg::Pattern(self.pattern()?));
        }
        Ok(Arg::Word(word))
    }

    fn pattern(&mut self) -> Result<TypePattern, PatternError> {
        let head = self.word()?;
        let has_args = self.tokens.get(self.pos) == Some(&Token::Open);
        if !has_args {
            return scalar(&head).ok_or_else(|| self.error(format!("unknown type `{head}`")));
        }
        let args = self.args()?;
        let pattern = match (head.as_str(), args.as_slice()) {
            ("signed", [q]) | ("unsigned", [q]) => TypePattern::Int {
                signed: head == "signed",
                width: self.width(q)?,
            },
            ("float", [q]) => TypePattern::Float {
                bits: self.bits(q, &[32, 64])?,
            },
            ("complex", [q]) => TypePattern::Complex {
                bits: self.bits(q, &[64, 128])?,
            },
            ("slice", [elem]) => TypePattern::Slice {
                elem: Box::new(self.nested(elem)?),
                growable: None,
            },
            ("slice", [elem, q]) => TypePattern::Slice {
                elem: Box::new(self.nested(elem)?),
                growable: match self.qualifier(q)? {
                    None => None,
                    Some("grow") => Some(true),
                    Some("fixed") => Some(false),
                    Some(other) => return Err(self.error(format!("unknown slice qualifier `{other}`"))),
                },
            },
            ("array", [elem, q]) => TypePattern::Array {
                elem: Box::new(self.nested(elem)?),
                len: match self.qualifier(q)? {
                    None => None,
                    Some(n) => Some(
                        n.parse()
                            .map_err(|_| self.error(format!("invalid array length `{n}`")))?,
                    ),
                },
            },
            ("map", [key, value]) => TypePattern::Map {
                key: Box::new(self.nested(key)?),
                value: Box::new(self.nested(value)?),
            },
            ("chan", [elem]) => TypePattern::Chan {
                elem: Box::new(self.nested(elem)?),
            },
            ("optional", [inner]) => TypePattern::Optional {
                inner: Box::new(self.nested(inner)?),
            },
            ("result", [value, q]) => TypePattern::Result {
                value: Box::new(self.nested(value)?),
                failure: match self.qualifier(q)? {
                    None => None,
                    Some("error") => Some(Failure::Error),
                    Some("flag") => Some(Failure::Flag),
                    Some(other) => {
                        return Err(self.error(format!("unknown result qualifier `{other}`")));
                    }
                },
            },
            ("named", [q]) => match self.qualifier(q)? {
                None => TypePattern::Named {
                    package: None,
                    name: None,
                },
                Some(path) => match path.rsplit_once('.') {
                    Some((pkg, name)) => TypePattern::Named {
                        package: Some(pkg.to_string()),
                        name: Some(name.to_string()),
                    },
                    None => TypePattern::Named {
                        package: None,
                        name: Some(path.to_string()),
                    },
                },
            },
            (other, _) => {
                return Err(self.error(format!(
                    "`{other}` does not take {} argument(s)",
                    args.len()
                )));
            }
        };
        Ok(pattern)
    }

    fn nested(&self, arg: &Arg) -> Result<TypePattern, PatternError> {
        match arg {
            Arg::Pattern(p) => Ok(p.clone()),
            Arg::Word(w) => scalar(w).ok_or_else(|| self.error(format!("unknown type `{w}`"))),
        }
    }

    /// A qualifier word; `_` is the wildcard.
    fn qualifier<'b>(&self, arg: &'b Arg) -> Result<Option<&'b str>, PatternError> {
        match arg {
            Arg::Word(w) if w == "_" => Ok(None),
            Arg::Word(w) => Ok(Some(w)),
            Arg::Pattern(_) => Err(self.error("expected a qualifier, found a type")),
        }
    }

    fn width(&self, arg: &Arg) -> Result<Option<IntWidth>, PatternError> {
        match self.qualifier(arg)? {
            None => Ok(None),
            Some("word") => Ok(Some(IntWidth::Word)),
            Some(bits) => bits
                .parse()
                .ok()
                .and_then(IntWidth::from_bits)
                .map(Some)
                .ok_or_else(|| self.error(format!("invalid integer width `{bits}`"))),
        }
    }

    fn bits(&self, arg: &Arg, allowed: &[u8]) -> Result<Option<u8>, PatternError> {
        match self.qualifier(arg)? {
            None => Ok(None),
            Some(bits) => bits
                .parse()
                .ok()
                .filter(|b| allowed.contains(b))
                .map(Some)
                .ok_or_else(|| self.error(format!("invalid width `{bits}`"))),
        }
    }
}

enum Arg {
    Pattern(TypePattern),
    Word(String),
}

fn scalar(word: &str) -> Option<TypePattern> {
    let pattern = match word {
        "_" => TypePattern::Any,
        "tuple" => TypePattern::Tuple,
        "func" => TypePattern::Func,
        "struct" => TypePattern::Struct,
        "interface" => TypePattern::Interface,
        "param" => TypePattern::Param,
        "unit" => TypePattern::Unit,
        // `any` would read as an empty interface here, which is not what a
        // pattern author means by it.
        "any" => return None,
        other => match TypeSig::from_basic_name(other)? {
            TypeSig::Int { width, signed } => TypePattern::Int {
                signed,
                width: Some(width),
            },
            TypeSig::Float { bits } => TypePattern::Float { bits: Some(bits) },
            TypeSig::Complex { bits } => TypePattern::Complex { bits: Some(bits) },
            TypeSig::Bool => TypePattern::Bool,
            TypeSig::String => TypePattern::String,
            TypeSig::Error => TypePattern::Error,
            _ => return None,
        },
    };
    Some(pattern)
}

impl fmt::Display for TypePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opt = |v: Option<String>| v.unwrap_or_else(|| "_".to_string());
        match self {
            TypePattern::Any => f.write_str("_"),
            TypePattern::Int { signed, width } => match width {
                Some(width) => write!(f, "{}", TypeSig::int(*width, *signed)),
                None => write!(f, "{}<_>", if *signed { "signed" } else { "unsigned" }),
            },
            TypePattern::Float { bits } => match bits {
                Some(b) => write!(f, "float{b}"),
                None => f.write_str("float<_>"),
            },
            TypePattern::Complex { bits } => match bits {
                Some(b) => write!(f, "complex{b}"),
                None => f.write_str("complex<_>"),
            },
            TypePattern::Bool => f.write_str("bool"),
            TypePattern::String => f.write_str("string"),
            TypePattern::Error => f.write_str("error"),
            TypePattern::Unit => f.write_str("unit"),
            TypePattern::Slice { elem, growable } => match growable {
                None => write!(f, "slice<{elem}>"),
                Some(true) => write!(f, "slice<{elem}, grow>"),
                Some(false) => write!(f, "slice<{elem}, fixed>"),
            },
            TypePattern::Array { elem, len } => {
                write!(f, "array<{elem}, {}>", opt(len.map(|l| l.to_string())))
            }
            TypePattern::Map { key, value } => write!(f, "map<{key}, {value}>"),
            TypePattern::Chan { elem } => write!(f, "chan<{elem}>"),
            TypePattern::Optional { inner } => write!(f, "optional<{inner}>"),
            TypePattern::Result { value, failure } => {
                let q = match failure {
                    None => "_",
                    Some(Failure::Error) => "error",
                    Some(Failure::Flag) => "flag",
                };
                write!(f, "result<{value}, {q}>")
            }
            TypePattern::Tuple => f.write_str("tuple"),
            TypePattern::Func => f.write_str("func"),
            TypePattern::Struct => f.write_str("struct"),
            TypePattern::Interface => f.write_str("interface"),
            TypePattern::Param => f.write_str("param"),
            TypePattern::Named { package, name } => match (package, name) {
                (Some(p), Some(n)) => write!(f, "named<{p}.{n}>"),
                (None, Some(n)) => write!(f, "named<{n}>"),
                _ => f.write_str("named<_>"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(text: &str) -> TypePattern {
        TypePattern::parse(text).unwrap()
    }

    #[test]
    fn test_byte_slice_beats_growth_qualifier() {
        let bytes = p("slice<uint8>");
        let grow = p("slice<_, grow>");
        let growing_bytes = TypeSig::growable_slice(TypeSig::int(IntWidth::W8, false));
        assert!(bytes.matches(&TypeSig::bytes()));
        assert!(bytes.matches(&growing_bytes));
        assert!(grow.matches(&growing_bytes));
        assert!(!grow.matches(&TypeSig::bytes()));
        assert!(bytes.specificity() > grow.specificity());
        assert!(p("slice<uint8, grow>").specificity() > bytes.specificity());
    }

    #[test]
    fn test_integer_families() {
        let unsigned = p("unsigned<_>");
        assert!(unsigned.matches(&TypeSig::int(IntWidth::W16, false)));
        assert!(!unsigned.matches(&TypeSig::int(IntWidth::W16, true)));
        assert!(p("uint16").specificity() > unsigned.specificity());
        assert_eq!(p("signed<32>"), p("int32"));
        assert_eq!(p("unsigned<word>"), p("uint"));
    }

    #[test]
    fn test_named_wildcard_excludes_qualified_types() {
        let local = TypeSig::named("Point");
        let external = TypeSig::Named {
            name: "Builder".into(),
            package: Some("strings".into()),
            args: Vec::new(),
        };
        assert!(p("named<_>").matches(&local));
        assert!(!p("named<_>").matches(&external));
        assert!(p("named<strings.Builder>").matches(&external));
    }

    #[test]
    fn test_result_qualifiers() {
        let flag = TypeSig::ErrorUnion {
            value: Box::new(TypeSig::String),
            failure: Failure::Flag,
        };
        assert!(p("result<_, flag>").matches(&flag));
        assert!(p("result<string, _>").matches(&flag));
        assert!(!p("result<_, error>").matches(&flag));
    }

    #[test]
    fn test_parse_errors() {
        assert!(TypePattern::parse("slice<").is_err());
        assert!(TypePattern::parse("slice<_, sometimes>").is_err());
        assert!(TypePattern::parse("gadget").is_err());
        assert!(TypePattern::parse("signed<7>").is_err());
    }

    #[test]
    fn test_display_is_canonical() {
        assert_eq!(p("slice< uint8 ,grow>").to_string(), "slice<uint8, grow>");
        assert_eq!(p("signed<_>").to_string(), "signed<_>");
        assert_eq!(p("int64").to_string(), "int64");
    }
}
