//! Declaration mapping: one [`MappedEntry`] per construct node.

use crate::error::{AmbiguousMappingError, MappingError};
use crate::index::UnitIndex;
use crate::lower::{Lowerer, Origin, literal};
use crate::naming;
use crate::table::{ConstructRule, RuleTable, Selection};
use portage_model::{
    Confidence, Construct, ConstructKind, ConstructNode, Expr, MappedEntry, MappedUnit, Param,
    TranslationUnit, TypeDeclKind, TypeParam, TypeSig, UnaryOp, Visibility,
};

/// How a mapping run treats rule-table ambiguity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapOptions {
    /// Resolve equal-specificity ties to the first-declared rule and record
    /// an Ambiguous finding instead of failing.
    pub lenient: bool,
}

/// Map a unit in strict mode: a rule tie is an error.
pub fn map(unit: &TranslationUnit, table: &RuleTable) -> Result<MappedUnit, MappingError> {
    map_with(unit, table, MapOptions::default())
}

pub fn map_with(
    unit: &TranslationUnit,
    table: &RuleTable,
    options: MapOptions,
) -> Result<MappedUnit, MappingError> {
    let index = UnitIndex::build(unit);
    let entries = unit
        .nodes
        .iter()
        .map(|node| map_node(node, table, &index, options))
        .collect::<Result<Vec<_>, _>>()?;

    let findings: usize = entries.iter().map(|e| e.findings.len()).sum();
    tracing::info!(
        path = %unit.path,
        module = %index.module,
        entries = entries.len(),
        findings,
        "mapped unit"
    );
    Ok(MappedUnit {
        path: unit.path.clone(),
        package: unit.package.clone(),
        module: index.module.clone(),
        entries,
    })
}

fn map_node(
    node: &ConstructNode,
    table: &RuleTable,
    index: &UnitIndex,
    options: MapOptions,
) -> Result<MappedEntry, MappingError> {
    let kind = node.kind();
    let mut lower = Lowerer::new(table, index, Origin::of(node), options.lenient);

    let rule = match table.select_construct(kind, &node.signature) {
        Selection::None => return Ok(unsupported_entry(node, lower)),
        Selection::One(rule) => rule,
        Selection::Tie(rules) => {
            let ids: Vec<String> = rules.iter().map(|r| r.rule.id.clone()).collect();
            if !options.lenient {
                return Err(AmbiguousMappingError {
                    identifier: node.display_name(),
                    location: node.location.clone(),
                    rules: ids,
                }
                .into());
            }
            lower.ambiguous(format!("{kind} `{}`", node.display_name()), ids);
            rules[0]
        }
    };
    tracing::debug!(
        identifier = %node.display_name(),
        rule = %rule.rule.id,
        "selected construct rule"
    );
    lower.adopt_rule(&rule.rule);

    let rendered = render(node, rule, &mut lower);
    let outcome = lower.finish();
    if !options.lenient
        && let Some(error) = outcome.ambiguity
    {
        return Err(error.into());
    }
    let rendered = if outcome.broken {
        comment_out(&rendered)
    } else {
        rendered
    };
    Ok(MappedEntry {
        node: node.clone(),
        rule: Some(rule.rule.clone()),
        confidence: outcome.confidence,
        rendered,
        findings: outcome.findings,
    })
}

fn unsupported_entry(node: &ConstructNode, mut lower: Lowerer<'_>) -> MappedEntry {
    let kind = node.kind();
    lower.unsupported(format!(
        "no {kind} rule matches signature `{}`",
        node.signature
    ));
    let outcome = lower.finish();
    MappedEntry {
        node: node.clone(),
        rule: None,
        confidence: Confidence::Unsupported,
        rendered: format!(
            "# {kind} {} : {} (not translated)",
            node.display_name(),
            node.signature
        ),
        findings: outcome.findings,
    }
}

fn comment_out(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                "#".to_string()
            } else {
                format!("# {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fill the rule's template. Only placeholders the template uses are
/// computed, so unused parts leave no findings behind.
fn render(node: &ConstructNode, rule: &ConstructRule, lower: &mut Lowerer<'_>) -> String {
    let mut vars: Vec<(&str, String)> = Vec::new();
    for name in rule.template.placeholders() {
        if vars.iter().any(|(n, _)| *n == name) {
            continue;
        }
        let value = construct_var(node, name, lower);
        vars.push((name, value));
    }
    rule.template.render(|name| {
        vars.iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    })
}

fn construct_var(node: &ConstructNode, var: &str, lower: &mut Lowerer<'_>) -> String {
    let sig = &node.signature;
    match (&node.construct, var) {
        (Construct::Constant { .. }, "name") => naming::constant_name(&node.name),
        (Construct::Constant { value, folded, .. }, "value") => {
            constant_value(lower, value, *folded, sig)
        }
        (Construct::Variable { .. }, "name") => naming::local_name(&node.name),
        (Construct::Variable { value }, "value") => match value {
            Some(value) => lower.lower_expr(value, Some(sig)),
            None => lower.zero_value(sig),
        },
        (Construct::Constant { .. } | Construct::Variable { .. }, "type") => lower.type_text(sig),
        (Construct::Constant { .. } | Construct::Variable { .. }, "zero") => lower.zero_value(sig),

        (Construct::Function { .. }, "name") => naming::local_name(&node.name),
        (Construct::Function { receiver, .. }, "visibility") => {
            let hidden = receiver.is_none()
                && node.visibility == Visibility::Unexported
                && !lower.index().called_from_methods.contains(&node.name);
            if hidden { "private " } else { "" }.to_string()
        }
        (Construct::Function { params, .. }, "params") => lower.param_list(params),
        (Construct::Function { .. }, "return") => match sig {
            TypeSig::Func { result, .. } => lower.return_annotation(result),
            _ => String::new(),
        },
        (Construct::Function { type_params, .. }, "free") => free_vars(type_params),
        (Construct::Function { .. }, "module") => lower.module().to_string(),
        (
            Construct::Function {
                receiver,
                params,
                results,
                body,
                ..
            },
            "body",
        ) => lower.lower_function(params, results, sig, receiver.as_ref(), body),
        (
            Construct::Function {
                receiver: Some(receiver),
                ..
            },
            "receiver",
        ) => receiver_type(lower, &receiver.type_name),

        (Construct::TypeDecl { .. }, "name") => naming::type_name(&node.name),
        (Construct::TypeDecl { type_params, .. }, "type_params") => {
            if type_params.is_empty() {
                String::new()
            } else {
                let names: Vec<&str> = type_params.iter().map(|p| p.name.as_str()).collect();
                format!("({})", names.join(", "))
            }
        }
        (Construct::TypeDecl { decl, type_params }, "type") => {
            if !type_params.is_empty() {
                lower.reject("generic type aliases have no target equivalent");
            }
            if *decl == TypeDeclKind::Defined {
                tracing::debug!(name = %node.name, "defined type becomes an alias");
            }
            lower.type_text(sig)
        }
        (Construct::TypeDecl { .. }, "fields") => struct_members(node, lower).0,
        (Construct::TypeDecl { .. }, "init") => struct_members(node, lower).1,
        (Construct::TypeDecl { .. }, "members") => {
            let (fields, init) = struct_members(node, lower);
            match (fields.is_empty(), init.is_empty()) {
                (true, _) => String::new(),
                (false, true) => fields,
                (false, false) => format!("{fields}\n\n{init}"),
            }
        }
        (Construct::TypeDecl { .. }, "methods") => interface_methods(sig, lower),

        (Construct::Statement { stmt }, "code") => lower.lower_statement(stmt),
        (Construct::Expression { expr }, "code") => lower.lower_expr(expr, None),
        _ => String::new(),
    }
}

/// A plain literal keeps its spelling; other constant expressions that fold
/// to an integer are written as the value with the source as a comment.
fn constant_value(
    lower: &mut Lowerer<'_>,
    value: &Expr,
    folded: Option<i128>,
    sig: &TypeSig,
) -> String {
    let plain = match value.unparen() {
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => is_plain_literal(operand),
        other => is_plain_literal(other),
    };
    if plain {
        return lower.lower_expr(value, Some(sig));
    }
    let index = lower.index();
    match folded {
        Some(v) if index.underlying(sig).is_integer() => {
            let suffix = lower.literal_suffix(sig);
            format!("{v}{suffix} # {}", literal::source_text(value))
        }
        _ => lower.lower_expr(value, Some(sig)),
    }
}

fn is_plain_literal(expr: &Expr) -> bool {
    matches!(
        expr.unparen(),
        Expr::Int { .. }
            | Expr::Float { .. }
            | Expr::Rune { .. }
            | Expr::Str { .. }
            | Expr::Bool { .. }
    )
}

fn free_vars(type_params: &[TypeParam]) -> String {
    if type_params.is_empty() {
        return String::new();
    }
    let names: Vec<&str> = type_params.iter().map(|p| p.name.as_str()).collect();
    format!(" forall {}", names.join(", "))
}

/// The type a method's `struct` reopening names.
fn receiver_type(lower: &mut Lowerer<'_>, type_name: &str) -> String {
    let index = lower.index();
    match index.types.get(type_name) {
        Some(info) => match info.decl {
            TypeDeclKind::Struct if info.type_params.is_empty() => naming::type_name(type_name),
            TypeDeclKind::Struct => {
                let names: Vec<&str> = info.type_params.iter().map(|p| p.name.as_str()).collect();
                format!("{}({})", naming::type_name(type_name), names.join(", "))
            }
            TypeDeclKind::Alias | TypeDeclKind::Defined => {
                lower.lossy(format!(
                    "method on `{type_name}` is added to its underlying type `{}`",
                    info.signature
                ));
                lower.type_text(&info.signature)
            }
            TypeDeclKind::Interface => {
                lower.reject(format!("method on interface type `{type_name}`"));
                naming::type_name(type_name)
            }
        },
        None => {
            lower.lossy(format!(
                "receiver type `{type_name}` is declared in another file; assumed to be a struct"
            ));
            naming::type_name(type_name)
        }
    }
}

/// `property` lines and the initializer of a struct declaration.
fn struct_members(node: &ConstructNode, lower: &mut Lowerer<'_>) -> (String, String) {
    let TypeSig::Struct { fields } = &node.signature else {
        return (String::new(), String::new());
    };
    let mut lines = Vec::new();
    let mut args = Vec::new();
    for field in fields {
        if refers_to(&field.ty, &node.name) {
            lower.reject(format!(
                "field `{}` makes `{}` recursive; structs cannot contain themselves",
                field.name, node.name
            ));
        }
        if field.embedded {
            lower.lossy(format!(
                "embedded field `{}` becomes a plain property; its methods are not promoted",
                field.name
            ));
        }
        let name = naming::local_name(&field.name);
        if let Some(docs) = &field.docs {
            for line in docs.lines() {
                lines.push(format!("# {line}").trim_end().to_string());
            }
        }
        let ty = lower.type_text(&field.ty);
        let zero = lower.zero_value(&field.ty);
        lines.push(format!("property {name} : {ty}"));
        args.push(format!("@{name} : {ty} = {zero}"));
    }
    let init = if args.is_empty() {
        String::new()
    } else {
        format!("def initialize({})\nend", args.join(", "))
    };
    (lines.join("\n"), init)
}

fn refers_to(ty: &TypeSig, name: &str) -> bool {
    match ty {
        TypeSig::Named {
            name: n,
            package: None,
            ..
        } => n == name,
        TypeSig::Optional { inner } => refers_to(inner, name),
        TypeSig::Array { elem, .. } => refers_to(elem, name),
        _ => false,
    }
}

fn interface_methods(sig: &TypeSig, lower: &mut Lowerer<'_>) -> String {
    let TypeSig::Interface { methods } = sig else {
        return String::new();
    };
    let mut lines = Vec::with_capacity(methods.len());
    for method in methods {
        let TypeSig::Func {
            params,
            variadic,
            result,
        } = &method.sig
        else {
            continue;
        };
        let count = params.len();
        let params: Vec<Param> = params
            .iter()
            .enumerate()
            .map(|(i, ty)| Param {
                name: None,
                ty: ty.clone(),
                variadic: *variadic && i + 1 == count,
            })
            .collect();
        let list = lower.param_list(&params);
        let ret = lower.return_annotation(result);
        lines.push(format!(
            "abstract def {}{list}{ret}",
            naming::local_name(&method.name)
        ));
    }
    lines.join("\n")
}

/// Render a Go value as a target expression of type `ty`, for test harnesses.
///
/// Returns `None` when the value cannot be translated.
pub fn render_value(
    unit: &TranslationUnit,
    table: &RuleTable,
    expr: &Expr,
    ty: &TypeSig,
) -> Option<String> {
    let index = UnitIndex::build(unit);
    let origin = Origin {
        identifier: "value".to_string(),
        kind: ConstructKind::Expression,
        location: portage_model::Location::new(unit.path.clone(), 1, 1),
    };
    let mut lower = Lowerer::new(table, &index, origin, true);
    let text = lower.lower_expr(expr, Some(ty));
    let outcome = lower.finish();
    (outcome.confidence != Confidence::Unsupported && !outcome.broken).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use portage_model::{FindingKind, IntWidth, Location, TypeOrigin};

    fn constant(name: &str, value: Expr, signature: TypeSig) -> ConstructNode {
        ConstructNode {
            name: name.into(),
            construct: Construct::Constant {
                value,
                iota: None,
                folded: None,
            },
            signature,
            visibility: Visibility::from_go_name(name),
            location: Location::new("ascii.go", 3, 3),
            docs: None,
            type_origin: TypeOrigin::Declared,
        }
    }

    #[test]
    fn test_comment_out_keeps_blank_lines_marked() {
        assert_eq!(comment_out("a\n\n  b"), "# a\n#\n#   b");
    }

    #[test]
    fn test_unmatched_kind_is_unsupported_with_location() {
        let table = RuleTable::from_toml("", "empty.toml").unwrap();
        let mut unit = TranslationUnit::new("ascii.go", "ascii");
        unit.nodes.push(constant(
            "NUL",
            Expr::int("0x00"),
            TypeSig::int(IntWidth::W8, false),
        ));
        let mapped = map(&unit, &table).unwrap();
        let entry = &mapped.entries[0];
        assert_eq!(entry.confidence, Confidence::Unsupported);
        assert!(entry.rule.is_none());
        assert_eq!(entry.rendered, "# constant NUL : uint8 (not translated)");
        assert_eq!(entry.findings[0].kind, FindingKind::Unsupported);
        assert_eq!(entry.findings[0].location, Location::new("ascii.go", 3, 3));
    }

    #[test]
    fn test_folded_constant_keeps_source_as_comment() {
        let table = RuleTable::builtin().unwrap();
        let mut unit = TranslationUnit::new("size.go", "size");
        let mut node = constant(
            "KB",
            Expr::binary(Expr::int("1"), portage_model::BinaryOp::Shl, Expr::int("10")),
            TypeSig::int(IntWidth::W32, true),
        );
        node.construct = Construct::Constant {
            value: Expr::binary(Expr::int("1"), portage_model::BinaryOp::Shl, Expr::int("10")),
            iota: None,
            folded: Some(1024),
        };
        unit.nodes.push(node);
        let mapped = map(&unit, &table).unwrap();
        assert_eq!(mapped.entries[0].rendered, "KB = 1024_i32 # 1 << 10");
        assert_eq!(mapped.entries[0].confidence, Confidence::Exact);
    }

    #[test]
    fn test_render_value_uses_expected_type() {
        let table = RuleTable::builtin().unwrap();
        let unit = TranslationUnit::new("a.go", "a");
        let bytes = Expr::Call {
            func: Box::new(Expr::Type {
                ty: TypeSig::bytes(),
            }),
            args: vec![Expr::string("\"hi\"")],
            spread: false,
        };
        assert_eq!(
            render_value(&unit, &table, &bytes, &TypeSig::bytes()).as_deref(),
            Some("\"hi\".to_slice.dup")
        );
        assert_eq!(
            render_value(&unit, &table, &Expr::int("7"), &TypeSig::int(IntWidth::W16, false))
                .as_deref(),
            Some("7_u16")
        );
    }
}
