//! Tree-sitter based Go extractor.
//!
//! Reads one Go file into a [`TranslationUnit`]: package-level constants,
//! variables, types, functions, and methods, each with a resolved type
//! signature, visibility, location, and attached doc comment.

mod analysis;
mod body;
mod types;

pub(crate) use analysis::fold_int;

use crate::traits::{ParseError, Reader};
use portage_model::{
    Construct, ConstructNode, Expr, Import, Location, Param, Receiver, TranslationUnit,
    TypeDeclKind, TypeOrigin, TypeParam, TypeSig, Visibility,
};
use std::collections::HashMap;
use tree_sitter::{Node, Parser, Tree};

/// Static instance of the Go reader for registry.
pub static GO_READER: GoReader = GoReader;

/// Go reader using tree-sitter.
pub struct GoReader;

impl Reader for GoReader {
    fn language(&self) -> &'static str {
        "go"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["go"]
    }

    fn read(&self, path: &str, source: &str) -> Result<TranslationUnit, ParseError> {
        extract_go(path, source)
    }
}

/// Parse Go source into a translation unit.
pub fn extract_go(path: &str, source: &str) -> Result<TranslationUnit, ParseError> {
    let tree = parse_go(path, source)?;
    let mut ctx = ReadContext::new(path, source);
    let mut unit = ctx.read_unit(&tree)?;

    analysis::mark_growable_slices(&mut unit);
    analysis::resolve_untyped_constants(&mut unit);

    tracing::debug!(
        path,
        package = %unit.package,
        nodes = unit.nodes.len(),
        "extracted translation unit"
    );
    Ok(unit)
}

/// Parse Go text, rejecting trees that contain syntax errors.
pub(crate) fn parse_go(path: &str, source: &str) -> Result<Tree, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(&arborium_go::language().into())
        .map_err(|err| ParseError::new(Location::new(path, 1, 1), err.to_string()))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ParseError::new(Location::new(path, 1, 1), "failed to parse"))?;

    let root = tree.root_node();
    if root.has_error() {
        let bad = first_error(root).unwrap_or(root);
        let line = bad.start_position().row + 1;
        let reason = if bad.is_missing() {
            format!("missing {}", bad.kind())
        } else {
            let text = bad.utf8_text(source.as_bytes()).unwrap_or("");
            let snippet: String = text.lines().next().unwrap_or("").chars().take(40).collect();
            format!("syntax error near `{snippet}`")
        };
        return Err(ParseError::new(
            Location::new(path, line, bad.end_position().row + 1),
            reason,
        ));
    }
    Ok(tree)
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() || child.is_missing() {
            if let Some(found) = first_error(child) {
                return Some(found);
            }
        }
    }
    None
}

pub(crate) struct ReadContext<'a> {
    path: &'a str,
    source: &'a str,
    /// Folded integer constants, for array lengths and `iota` groups.
    consts: HashMap<String, i128>,
    /// Types of constants read so far, for untyped constant expressions.
    const_types: HashMap<String, (TypeSig, TypeOrigin)>,
    /// Generic type parameters in scope.
    scope: Vec<String>,
}

impl<'a> ReadContext<'a> {
    pub(crate) fn new(path: &'a str, source: &'a str) -> Self {
        Self {
            path,
            source,
            consts: HashMap::new(),
            const_types: HashMap::new(),
            scope: Vec::new(),
        }
    }

    fn node_text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn location(&self, node: Node) -> Location {
        Location::new(
            self.path,
            node.start_position().row + 1,
            node.end_position().row + 1,
        )
    }

    fn error(&self, node: Node, reason: impl Into<String>) -> ParseError {
        ParseError::new(self.location(node), reason)
    }

    fn field<'t>(&self, node: Node<'t>, name: &str) -> Result<Node<'t>, ParseError> {
        node.child_by_field_name(name)
            .ok_or_else(|| self.error(node, format!("{} missing {name}", node.kind())))
    }

    fn field_texts(&self, node: Node, name: &str) -> Vec<String> {
        let mut cursor = node.walk();
        node.children_by_field_name(name, &mut cursor)
            .map(|n| self.node_text(n).to_string())
            .collect()
    }

    /// Comments directly preceding `node`, joined as doc text.
    fn leading_docs(&self, node: Node) -> Option<String> {
        let mut lines = Vec::new();
        let mut current = node.prev_named_sibling();
        while let Some(comment) = current.filter(|n| n.kind() == "comment") {
            let previous = comment.prev_named_sibling();
            // A comment on the same line as the previous declaration trails it.
            if previous
                .is_some_and(|p| p.end_position().row == comment.start_position().row)
            {
                break;
            }
            lines.push(clean_comment(self.node_text(comment)));
            current = previous;
        }
        if lines.is_empty() {
            return None;
        }
        lines.reverse();
        Some(lines.join("\n"))
    }

    fn read_unit(&mut self, tree: &Tree) -> Result<TranslationUnit, ParseError> {
        let root = tree.root_node();
        let mut unit = TranslationUnit::new(self.path, "main");

        // Constants first: array lengths and other declarations may refer to them.
        let mut const_nodes: HashMap<usize, Vec<ConstructNode>> = HashMap::new();
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            if child.kind() == "const_declaration" {
                let nodes = self.read_const_decl(child)?;
                const_nodes.insert(child.id(), nodes);
            }
        }

        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            match child.kind() {
                "package_clause" => {
                    let mut inner = child.walk();
                    if let Some(name) = child
                        .named_children(&mut inner)
                        .find(|n| n.kind() == "package_identifier")
                    {
                        unit.package = self.node_text(name).to_string();
                    }
                }
                "import_declaration" => unit.imports.extend(self.read_imports(child)),
                "const_declaration" => {
                    unit.nodes
                        .extend(const_nodes.remove(&child.id()).unwrap_or_default());
                }
                "var_declaration" => unit.nodes.extend(self.read_var_decl(child)?),
                "type_declaration" => unit.nodes.extend(self.read_type_decl(child)?),
                "function_declaration" | "method_declaration" => {
                    unit.nodes.push(self.read_function(child)?)
                }
                _ => {}
            }
        }

        Ok(unit)
    }

    fn read_imports(&self, node: Node) -> Vec<Import> {
        let mut specs = Vec::new();
        collect_kind(node, "import_spec", &mut specs);
        specs
            .into_iter()
            .filter_map(|spec| {
                let path = spec.child_by_field_name("path")?;
                let path = self.node_text(path).trim_matches(|c| c == '"' || c == '`');
                let alias = spec.child_by_field_name("name").map(|n| self.node_text(n));
                Some(Import::new(path, alias))
            })
            .collect()
    }

    fn read_const_decl(&mut self, node: Node) -> Result<Vec<ConstructNode>, ParseError> {
        let mut cursor = node.walk();
        let specs: Vec<Node> = node
            .named_children(&mut cursor)
            .filter(|n| n.kind() == "const_spec")
            .collect();
        let grouped = specs.len() > 1 || {
            let mut cursor = node.walk();
            let has_paren = node.children(&mut cursor).any(|n| n.kind() == "(");
            has_paren
        };

        let mut out = Vec::new();
        let mut previous: Option<(Option<TypeSig>, Vec<Expr>)> = None;
        for (iota, spec) in specs.into_iter().enumerate() {
            let names = self.field_texts(spec, "name");
            let declared = spec
                .child_by_field_name("type")
                .map(|t| self.read_type(t))
                .transpose()?;
            let values = match spec.child_by_field_name("value") {
                Some(list) => self.read_expr_list(list)?,
                None => Vec::new(),
            };
            // Implicit repetition: an empty spec repeats the previous type and expressions.
            let (declared, values) = if values.is_empty() {
                previous
                    .clone()
                    .ok_or_else(|| self.error(spec, "constant declaration without value"))?
            } else {
                (declared, values)
            };
            previous = Some((declared.clone(), values.clone()));

            let docs = if grouped {
                self.leading_docs(spec)
            } else {
                self.leading_docs(node)
            };

            for (i, name) in names.iter().enumerate() {
                let value = values
                    .get(i)
                    .cloned()
                    .ok_or_else(|| self.error(spec, format!("missing value for constant {name}")))?;
                if name == "_" {
                    continue;
                }
                let folded = fold_int(&value, iota as i128, &self.consts);
                if let Some(v) = folded {
                    self.consts.insert(name.clone(), v);
                }
                let (signature, type_origin) = match &declared {
                    Some(ty) => (ty.clone(), TypeOrigin::Declared),
                    None => analysis::constant_type(&value, &self.const_types),
                };
                self.const_types
                    .insert(name.clone(), (signature.clone(), type_origin));
                out.push(ConstructNode {
                    name: name.clone(),
                    construct: Construct::Constant {
                        value,
                        iota: grouped.then_some(iota as u64),
                        folded,
                    },
                    signature,
                    visibility: Visibility::from_go_name(name),
                    location: self.location(spec),
                    docs: docs.clone(),
                    type_origin,
                });
            }
        }
        Ok(out)
    }

    fn read_var_decl(&mut self, node: Node) -> Result<Vec<ConstructNode>, ParseError> {
        let mut specs = Vec::new();
        collect_kind(node, "var_spec", &mut specs);
        let grouped = specs.len() > 1;

        let mut out = Vec::new();
        for spec in specs {
            let names = self.field_texts(spec, "name");
            let declared = spec
                .child_by_field_name("type")
                .map(|t| self.read_type(t))
                .transpose()?;
            let values = match spec.child_by_field_name("value") {
                Some(list) => self.read_expr_list(list)?,
                None => Vec::new(),
            };
            let paired = values.len() == names.len();
            let docs = if grouped {
                self.leading_docs(spec)
            } else {
                self.leading_docs(node)
            };

            for (i, name) in names.iter().enumerate() {
                if name == "_" {
                    continue;
                }
                let value = if paired { values.get(i).cloned() } else { None };
                let inferred = value.as_ref().and_then(analysis::literal_type);
                let (signature, type_origin) = match (&declared, inferred) {
                    (Some(ty), _) => (ty.clone(), TypeOrigin::Declared),
                    (None, Some(ty)) => (ty, TypeOrigin::Default),
                    (None, None) => (
                        TypeSig::Interface {
                            methods: Vec::new(),
                        },
                        TypeOrigin::Default,
                    ),
                };
                out.push(ConstructNode {
                    name: name.clone(),
                    construct: Construct::Variable { value },
                    signature,
                    visibility: Visibility::from_go_name(name),
                    location: self.location(spec),
                    docs: docs.clone(),
                    type_origin,
                });
            }
        }
        Ok(out)
    }

    fn read_type_decl(&mut self, node: Node) -> Result<Vec<ConstructNode>, ParseError> {
        let mut cursor = node.walk();
        let specs: Vec<Node> = node
            .named_children(&mut cursor)
            .filter(|n| matches!(n.kind(), "type_spec" | "type_alias"))
            .collect();
        let grouped = specs.len() > 1;

        let mut out = Vec::new();
        for spec in specs {
            let name = self.node_text(self.field(spec, "name")?).to_string();
            let type_params = spec
                .child_by_field_name("type_parameters")
                .map(|list| self.read_type_params(list))
                .unwrap_or_default();
            self.scope = type_params.iter().map(|p| p.name.clone()).collect();
            let type_node = self.field(spec, "type")?;
            let signature = self.read_type(type_node);
            self.scope.clear();
            let signature = signature?;

            let decl = if spec.kind() == "type_alias" {
                TypeDeclKind::Alias
            } else {
                match type_node.kind() {
                    "struct_type" => TypeDeclKind::Struct,
                    "interface_type" => TypeDeclKind::Interface,
                    _ => TypeDeclKind::Defined,
                }
            };
            let docs = if grouped {
                self.leading_docs(spec)
            } else {
                self.leading_docs(node)
            };
            out.push(ConstructNode {
                visibility: Visibility::from_go_name(&name),
                name,
                construct: Construct::TypeDecl { decl, type_params },
                signature,
                location: self.location(spec),
                docs,
                type_origin: TypeOrigin::Declared,
            });
        }
        Ok(out)
    }

    fn read_type_params(&self, list: Node) -> Vec<TypeParam> {
        let mut out = Vec::new();
        let mut cursor = list.walk();
        for decl in list
            .named_children(&mut cursor)
            .filter(|n| n.kind() == "type_parameter_declaration")
        {
            // Constraints only bound the parameter; unreadable ones widen to `any`.
            let constraint = decl
                .child_by_field_name("type")
                .and_then(|t| self.read_type(t).ok())
                .unwrap_or(TypeSig::Interface {
                    methods: Vec::new(),
                });
            for name in self.field_texts(decl, "name") {
                out.push(TypeParam {
                    name,
                    constraint: constraint.clone(),
                });
            }
        }
        out
    }

    fn read_function(&mut self, node: Node) -> Result<ConstructNode, ParseError> {
        let name = self.node_text(self.field(node, "name")?).to_string();
        let receiver = match node.child_by_field_name("receiver") {
            Some(list) => Some(self.read_receiver(list)?),
            None => None,
        };
        let type_params = node
            .child_by_field_name("type_parameters")
            .map(|list| self.read_type_params(list))
            .unwrap_or_default();

        self.scope = type_params.iter().map(|p| p.name.clone()).collect();
        let signature = self.read_signature(node);
        let body = match node.child_by_field_name("body") {
            Some(block) => self.read_block(block),
            None => Ok(Vec::new()),
        };
        self.scope.clear();
        let (params, results, signature) = signature?;
        let body = body?;

        Ok(ConstructNode {
            visibility: Visibility::from_go_name(&name),
            name,
            construct: Construct::Function {
                receiver,
                type_params,
                params,
                results,
                body,
            },
            signature,
            location: self.location(node),
            docs: self.leading_docs(node),
            type_origin: TypeOrigin::Declared,
        })
    }

    fn read_receiver(&self, list: Node) -> Result<Receiver, ParseError> {
        let mut cursor = list.walk();
        let decl = list
            .named_children(&mut cursor)
            .find(|n| n.kind() == "parameter_declaration")
            .ok_or_else(|| self.error(list, "method without receiver"))?;
        let name = decl
            .child_by_field_name("name")
            .map(|n| self.node_text(n).to_string());
        let mut ty = self.field(decl, "type")?;
        let pointer = ty.kind() == "pointer_type";
        if pointer {
            ty = ty
                .named_child(0)
                .ok_or_else(|| self.error(ty, "pointer receiver without type"))?;
        }
        if ty.kind() == "generic_type" {
            ty = self.field(ty, "type")?;
        }
        Ok(Receiver {
            name,
            type_name: self.node_text(ty).to_string(),
            pointer,
        })
    }

    /// Parameters, results, and folded function signature of a declaration or literal.
    fn read_signature(&self, node: Node) -> Result<(Vec<Param>, Vec<Param>, TypeSig), ParseError> {
        let params = match node.child_by_field_name("parameters") {
            Some(list) => self.read_params(list)?,
            None => Vec::new(),
        };
        let results = match node.child_by_field_name("result") {
            Some(result) if result.kind() == "parameter_list" => self.read_params(result)?,
            Some(result) => vec![Param {
                name: None,
                ty: self.read_type(result)?,
                variadic: false,
            }],
            None => Vec::new(),
        };
        let signature = analysis::function_signature(&params, &results);
        Ok((params, results, signature))
    }

    fn read_params(&self, list: Node) -> Result<Vec<Param>, ParseError> {
        let mut out = Vec::new();
        let mut cursor = list.walk();
        for decl in list.named_children(&mut cursor) {
            let variadic = match decl.kind() {
                "parameter_declaration" => false,
                "variadic_parameter_declaration" => true,
                _ => continue,
            };
            let ty = self.read_type(self.field(decl, "type")?)?;
            let names = self.field_texts(decl, "name");
            if names.is_empty() {
                out.push(Param {
                    name: None,
                    ty,
                    variadic,
                });
            } else {
                for name in names {
                    out.push(Param {
                        name: Some(name),
                        ty: ty.clone(),
                        variadic,
                    });
                }
            }
        }
        Ok(out)
    }
}

/// Collect descendants of `kind`, in source order, without descending into matches.
fn collect_kind<'t>(node: Node<'t>, kind: &str, out: &mut Vec<Node<'t>>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == kind {
            out.push(child);
        } else {
            collect_kind(child, kind, out);
        }
    }
}

fn clean_comment(text: &str) -> String {
    if let Some(line) = text.strip_prefix("//") {
        return line.strip_prefix(' ').unwrap_or(line).trim_end().to_string();
    }
    let inner = text
        .strip_prefix("/*")
        .and_then(|t| t.strip_suffix("*/"))
        .unwrap_or(text);
    inner
        .lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests;
