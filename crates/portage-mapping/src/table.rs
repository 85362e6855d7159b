//! The rule table: type, construct, and symbol rules loaded from TOML.
//!
//! ```toml
//! [[type]]
//! id = "uint-fixed"
//! pattern = "unsigned<_>"
//! target = "UInt{{bits}}"
//! zero = "0_u{{bits}}"
//! literal_suffix = "_u{{bits}}"
//! confidence = "exact"
//!
//! [[construct]]
//! id = "const"
//! kind = "constant"
//! pattern = "_"
//! template = "{{name}} = {{value}}"
//! confidence = "exact"
//!
//! [[symbol]]
//! id = "strings-to-upper"
//! symbol = "strings.ToUpper"
//! template = "{{0}}.upcase"
//! confidence = "exact"
//! ```
//!
//! A table is validated as a whole when it is loaded; after that it is
//! immutable and shared read-only by every mapping.

use crate::error::RuleTableError;
use crate::pattern::TypePattern;
use crate::template::Template;
use portage_model::{Confidence, ConstructKind, Failure, MappingRule, TypeSig};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Source of the built-in Go → Crystal table.
pub const DEFAULT_RULES: &str = include_str!("../rules/go-crystal.toml");

const TYPE_PLACEHOLDERS: &[&str] = &[
    "bits", "elem", "key", "value", "len", "inner", "name", "args", "items", "proc", "elem_zero",
];

fn construct_placeholders(kind: ConstructKind) -> &'static [&'static str] {
    const FUNCTION: &[&str] = &[
        "visibility", "name", "params", "return", "free", "body", "module",
    ];
    const METHOD: &[&str] = &[
        "visibility", "name", "params", "return", "free", "body", "module", "receiver",
    ];
    match kind {
        ConstructKind::Constant | ConstructKind::Variable => &["name", "value", "type", "zero"],
        ConstructKind::Function => FUNCTION,
        ConstructKind::Method | ConstructKind::PointerMethod => METHOD,
        ConstructKind::Struct => &["name", "type_params", "fields", "init", "members"],
        ConstructKind::Interface => &["name", "methods"],
        ConstructKind::Alias | ConstructKind::Defined => &["name", "type", "type_params"],
        ConstructKind::Statement | ConstructKind::Expression => &["code"],
    }
}

fn symbol_placeholder_ok(name: &str) -> bool {
    name == "args" || name == "rest" || name.parse::<usize>().is_ok()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTable {
    #[serde(default, rename = "type")]
    types: Vec<RawTypeRule>,
    #[serde(default, rename = "construct")]
    constructs: Vec<MappingRule>,
    #[serde(default, rename = "symbol")]
    symbols: Vec<RawSymbolRule>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTypeRule {
    id: String,
    pattern: String,
    target: String,
    zero: Option<String>,
    literal_suffix: Option<String>,
    confidence: Confidence,
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSymbolRule {
    id: String,
    symbol: String,
    template: String,
    confidence: Confidence,
    note: Option<String>,
    result: Option<String>,
    failure: Option<Failure>,
}

/// Maps a type pattern to a target type, its zero value, and the suffix
/// that types an integer or float literal.
#[derive(Debug, Clone)]
pub struct TypeRule {
    pub id: String,
    pub pattern: TypePattern,
    pub target: Template,
    pub zero: Option<Template>,
    pub literal_suffix: Option<Template>,
    pub confidence: Confidence,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConstructRule {
    pub rule: MappingRule,
    pub pattern: TypePattern,
    pub template: Template,
}

/// Maps an external package symbol (`strings.ToUpper`) to a target expression.
///
/// `result` and `failure` describe the symbol's Go result so that callers
/// can type the call site.
#[derive(Debug, Clone)]
pub struct SymbolRule {
    pub id: String,
    pub symbol: String,
    pub template: Template,
    pub confidence: Confidence,
    pub note: Option<String>,
    pub result: Option<TypeSig>,
    pub failure: Option<Failure>,
}

impl SymbolRule {
    /// Go result type of a call to this symbol, when known.
    pub fn result_type(&self) -> Option<TypeSig> {
        match (&self.result, self.failure) {
            (Some(ty), Some(failure)) => Some(TypeSig::ErrorUnion {
                value: Box::new(ty.clone()),
                failure,
            }),
            (None, Some(failure)) => Some(TypeSig::ErrorUnion {
                value: Box::new(TypeSig::Unit),
                failure,
            }),
            (ty, None) => ty.clone(),
        }
    }
}

/// `int`, `[]string`, `[]byte`: the basic spellings symbol results use.
fn parse_result_type(spelling: &str) -> Option<TypeSig> {
    match spelling.strip_prefix("[]") {
        Some(elem) => parse_result_type(elem).map(TypeSig::slice),
        None => TypeSig::from_basic_name(spelling),
    }
}

/// Outcome of selecting the most specific rule.
#[derive(Debug)]
pub enum Selection<'a, R> {
    None,
    One(&'a R),
    /// Every rule sharing the highest specificity, in declaration order.
    Tie(Vec<&'a R>),
}

#[derive(Debug, Clone)]
pub struct RuleTable {
    origin: String,
    types: Vec<TypeRule>,
    constructs: Vec<ConstructRule>,
    symbols: Vec<SymbolRule>,
    by_symbol: HashMap<String, usize>,
}

impl RuleTable {
    /// The built-in Go → Crystal table.
    pub fn builtin() -> Result<Self, RuleTableError> {
        Self::from_toml(DEFAULT_RULES, "<builtin>")
    }

    pub fn from_path(path: &Path) -> Result<Self, RuleTableError> {
        let text = std::fs::read_to_string(path).map_err(|source| RuleTableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, &path.display().to_string())
    }

    pub fn from_toml(text: &str, origin: &str) -> Result<Self, RuleTableError> {
        let raw: RawTable = toml::from_str(text).map_err(|source| RuleTableError::Toml {
            origin: origin.to_string(),
            source,
        })?;

        let mut ids = HashSet::new();
        let mut claim = |id: &str| {
            if ids.insert(id.to_string()) {
                Ok(())
            } else {
                Err(RuleTableError::DuplicateId { id: id.to_string() })
            }
        };

        let mut types = Vec::with_capacity(raw.types.len());
        for rule in raw.types {
            claim(&rule.id)?;
            let pattern = parse_pattern(&rule.id, &rule.pattern)?;
            let target = parse_template(&rule.id, &rule.target, |p| TYPE_PLACEHOLDERS.contains(&p))?;
            let zero = rule
                .zero
                .as_deref()
                .map(|z| parse_template(&rule.id, z, |p| TYPE_PLACEHOLDERS.contains(&p)))
                .transpose()?;
            let literal_suffix = rule
                .literal_suffix
                .as_deref()
                .map(|s| parse_template(&rule.id, s, |p| TYPE_PLACEHOLDERS.contains(&p)))
                .transpose()?;
            types.push(TypeRule {
                id: rule.id,
                pattern,
                target,
                zero,
                literal_suffix,
                confidence: rule.confidence,
                note: rule.note,
            });
        }

        let mut constructs = Vec::with_capacity(raw.constructs.len());
        for rule in raw.constructs {
            claim(&rule.id)?;
            let pattern = parse_pattern(&rule.id, &rule.pattern)?;
            let allowed = construct_placeholders(rule.kind);
            let template = parse_template(&rule.id, &rule.template, |p| allowed.contains(&p))?;
            constructs.push(ConstructRule {
                rule,
                pattern,
                template,
            });
        }

        let mut symbols = Vec::with_capacity(raw.symbols.len());
        let mut by_symbol = HashMap::new();
        for rule in raw.symbols {
            claim(&rule.id)?;
            let template = parse_template(&rule.id, &rule.template, symbol_placeholder_ok)?;
            let result = match rule.result {
                Some(spelling) => Some(parse_result_type(&spelling).ok_or_else(|| {
                    RuleTableError::ResultType {
                        id: rule.id.clone(),
                        spelling,
                    }
                })?),
                None => None,
            };
            if by_symbol.insert(rule.symbol.clone(), symbols.len()).is_some() {
                return Err(RuleTableError::DuplicateSymbol {
                    symbol: rule.symbol,
                });
            }
            symbols.push(SymbolRule {
                id: rule.id,
                symbol: rule.symbol,
                template,
                confidence: rule.confidence,
                note: rule.note,
                result,
                failure: rule.failure,
            });
        }

        tracing::debug!(
            origin,
            types = types.len(),
            constructs = constructs.len(),
            symbols = symbols.len(),
            "loaded rule table"
        );
        Ok(Self {
            origin: origin.to_string(),
            types,
            constructs,
            symbols,
            by_symbol,
        })
    }

    /// Where the table was loaded from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn type_rules(&self) -> &[TypeRule] {
        &self.types
    }

    pub fn construct_rules(&self) -> &[ConstructRule] {
        &self.constructs
    }

    pub fn symbol_rules(&self) -> &[SymbolRule] {
        &self.symbols
    }

    pub fn symbol(&self, qualified: &str) -> Option<&SymbolRule> {
        self.by_symbol.get(qualified).map(|&i| &self.symbols[i])
    }

    pub fn select_type(&self, ty: &TypeSig) -> Selection<'_, TypeRule> {
        select(
            self.types
                .iter()
                .filter(|r| r.pattern.matches(ty))
                .map(|r| (r.pattern.specificity(), r)),
        )
    }

    pub fn select_construct(&self, kind: ConstructKind, signature: &TypeSig) -> Selection<'_, ConstructRule> {
        select(
            self.constructs
                .iter()
                .filter(|r| r.rule.kind == kind && r.pattern.matches(signature))
                .map(|r| (r.pattern.specificity(), r)),
        )
    }
}

fn select<'a, R>(candidates: impl Iterator<Item = (usize, &'a R)>) -> Selection<'a, R> {
    let mut best: Vec<&R> = Vec::new();
    let mut best_score = 0;
    for (score, rule) in candidates {
        if best.is_empty() || score > best_score {
            best = vec![rule];
            best_score = score;
        } else if score == best_score {
            best.push(rule);
        }
    }
    match best.len() {
        0 => Selection::None,
        1 => Selection::One(best[0]),
        _ => Selection::Tie(best),
    }
}

fn parse_pattern(id: &str, text: &str) -> Result<TypePattern, RuleTableError> {
    TypePattern::parse(text).map_err(|source| RuleTableError::Pattern {
        id: id.to_string(),
        source,
    })
}

fn parse_template(
    id: &str,
    text: &str,
    allowed: impl Fn(&str) -> bool,
) -> Result<Template, RuleTableError> {
    let template = Template::parse(text).map_err(|e| RuleTableError::Template {
        id: id.to_string(),
        message: e.to_string(),
    })?;
    if let Some(unknown) = template.placeholders().find(|p| !allowed(p)) {
        return Err(RuleTableError::UnknownPlaceholder {
            id: id.to_string(),
            placeholder: unknown.to_string(),
        });
    }
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use portage_model::IntWidth;

    #[test]
    fn test_builtin_table_loads() {
        let table = RuleTable::builtin().unwrap();
        assert!(!table.type_rules().is_empty());
        assert!(table.symbol("strings.ToUpper").is_some());
        for kind in ConstructKind::ALL {
            assert!(
                table.construct_rules().iter().any(|r| r.rule.kind == kind),
                "no construct rule for {kind}"
            );
        }
    }

    #[test]
    fn test_most_specific_type_rule_wins() {
        let table = RuleTable::builtin().unwrap();
        let pick = |ty: &TypeSig| match table.select_type(ty) {
            Selection::One(rule) => rule.id.clone(),
            other => panic!("expected one rule for {ty}, got {other:?}"),
        };
        assert_eq!(pick(&TypeSig::bytes()), "bytes");
        assert_eq!(pick(&TypeSig::growable_slice(TypeSig::String)), "slice-grow");
        assert_eq!(pick(&TypeSig::int(IntWidth::Word, true)), "int");
        assert_eq!(pick(&TypeSig::int(IntWidth::W16, true)), "int-fixed");
    }

    #[test]
    fn test_unknown_placeholder_is_a_load_error() {
        let text = r#"
[[construct]]
id = "const"
kind = "constant"
pattern = "_"
template = "{{name}} = {{body}}"
confidence = "exact"
"#;
        let err = RuleTable::from_toml(text, "t.toml").unwrap_err();
        assert!(matches!(
            err,
            RuleTableError::UnknownPlaceholder { ref id, ref placeholder } if id == "const" && placeholder == "body"
        ));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let text = r#"
[[type]]
id = "b"
pattern = "bool"
target = "Bool"
confidence = "exact"

[[symbol]]
id = "b"
symbol = "strings.ToLower"
template = "{{0}}.downcase"
confidence = "exact"
"#;
        let err = RuleTable::from_toml(text, "t.toml").unwrap_err();
        assert_eq!(err.to_string(), "duplicate rule id `b`");
    }

    #[test]
    fn test_bad_pattern_names_rule() {
        let text = r#"
[[type]]
id = "odd"
pattern = "slice<_, sometimes>"
target = "X"
confidence = "exact"
"#;
        let err = RuleTable::from_toml(text, "t.toml").unwrap_err();
        assert!(err.to_string().starts_with("rule `odd`:"));
    }
}
