//! Function bodies: Go statements and expressions → `Stmt`/`Expr`.

use super::ReadContext;
use crate::traits::ParseError;
use portage_model::{AssignOp, BinaryOp, Element, Expr, Stmt, StmtKind, SwitchCase, TypeSig, UnaryOp};
use tree_sitter::Node;

/// Node kinds that denote a type rather than a value.
const TYPE_KINDS: &[&str] = &[
    "slice_type",
    "array_type",
    "implicit_length_array_type",
    "map_type",
    "channel_type",
    "pointer_type",
    "struct_type",
    "interface_type",
    "function_type",
    "qualified_type",
    "generic_type",
    "type_identifier",
];

impl<'a> ReadContext<'a> {
    pub(super) fn read_block(&self, block: Node) -> Result<Vec<Stmt>, ParseError> {
        let mut out = Vec::new();
        self.read_statements(block, &mut out)?;
        Ok(out)
    }

    /// Read every statement child of `node`, looking through `statement_list` wrappers.
    fn read_statements(&self, node: Node, out: &mut Vec<Stmt>) -> Result<(), ParseError> {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "statement_list" {
                self.read_statements(child, out)?;
            } else {
                self.read_stmt(child, out)?;
            }
        }
        Ok(())
    }

    fn unsupported_stmt(&self, node: Node, construct: &str) -> Stmt {
        Stmt::new(
            line_of(node),
            StmtKind::Unsupported {
                construct: construct.to_string(),
                text: first_line(self.node_text(node)),
            },
        )
    }

    fn read_stmt(&self, node: Node, out: &mut Vec<Stmt>) -> Result<(), ParseError> {
        let line = line_of(node);
        let kind = match node.kind() {
            "comment" | "empty_statement" => return Ok(()),
            "expression_statement" => {
                let expr = node
                    .named_child(0)
                    .ok_or_else(|| self.error(node, "empty expression statement"))?;
                StmtKind::Expr {
                    expr: self.read_expr(expr)?,
                }
            }
            "short_var_declaration" => StmtKind::Define {
                names: self.read_names(self.field(node, "left")?),
                values: self.read_expr_list(self.field(node, "right")?)?,
            },
            "assignment_statement" => {
                let op_text = self.node_text(self.field(node, "operator")?);
                let op = match op_text.strip_suffix('=') {
                    Some("") => AssignOp::Plain,
                    Some(bin) => match BinaryOp::from_go(bin) {
                        Some(op) => AssignOp::Compound(op),
                        None => {
                            out.push(self.unsupported_stmt(node, "assignment operator"));
                            return Ok(());
                        }
                    },
                    None => AssignOp::Plain,
                };
                StmtKind::Assign {
                    targets: self.read_expr_list(self.field(node, "left")?)?,
                    op,
                    values: self.read_expr_list(self.field(node, "right")?)?,
                }
            }
            "inc_statement" | "dec_statement" => {
                let target = node
                    .named_child(0)
                    .ok_or_else(|| self.error(node, "increment without operand"))?;
                StmtKind::IncDec {
                    target: self.read_expr(target)?,
                    increment: node.kind() == "inc_statement",
                }
            }
            "return_statement" => {
                let values = match node.named_child(0) {
                    Some(list) if list.kind() == "expression_list" => self.read_expr_list(list)?,
                    Some(single) => vec![self.read_expr(single)?],
                    None => Vec::new(),
                };
                StmtKind::Return { values }
            }
            "if_statement" => self.read_if(node)?,
            "for_statement" => self.read_for(node)?,
            "expression_switch_statement" => self.read_switch(node)?,
            "block" => StmtKind::Block {
                body: self.read_block(node)?,
            },
            "defer_statement" => {
                let call = node
                    .named_child(0)
                    .ok_or_else(|| self.error(node, "defer without call"))?;
                StmtKind::Defer {
                    call: self.read_expr(call)?,
                }
            }
            "break_statement" | "continue_statement" => {
                if node.named_child(0).is_some() {
                    out.push(self.unsupported_stmt(node, "labeled branch"));
                    return Ok(());
                }
                if node.kind() == "break_statement" {
                    StmtKind::Break
                } else {
                    StmtKind::Continue
                }
            }
            "var_declaration" | "const_declaration" => {
                let spec_kind = if node.kind() == "var_declaration" {
                    "var_spec"
                } else {
                    "const_spec"
                };
                let mut specs = Vec::new();
                super::collect_kind(node, spec_kind, &mut specs);
                for spec in specs {
                    let ty = spec
                        .child_by_field_name("type")
                        .map(|t| self.read_type(t))
                        .transpose()?;
                    let values = match spec.child_by_field_name("value") {
                        Some(list) => self.read_expr_list(list)?,
                        None => Vec::new(),
                    };
                    out.push(Stmt::new(
                        line_of(spec),
                        StmtKind::Var {
                            names: self.field_texts(spec, "name"),
                            ty,
                            values,
                        },
                    ));
                }
                return Ok(());
            }
            "go_statement" => {
                out.push(self.unsupported_stmt(node, "go statement"));
                return Ok(());
            }
            "select_statement" => {
                out.push(self.unsupported_stmt(node, "select statement"));
                return Ok(());
            }
            "goto_statement" => {
                out.push(self.unsupported_stmt(node, "goto"));
                return Ok(());
            }
            "labeled_statement" => {
                out.push(self.unsupported_stmt(node, "labeled statement"));
                return Ok(());
            }
            "fallthrough_statement" => {
                out.push(self.unsupported_stmt(node, "fallthrough"));
                return Ok(());
            }
            "type_switch_statement" => {
                out.push(self.unsupported_stmt(node, "type switch"));
                return Ok(());
            }
            "send_statement" => {
                out.push(self.unsupported_stmt(node, "channel send"));
                return Ok(());
            }
            "type_declaration" => {
                out.push(self.unsupported_stmt(node, "local type declaration"));
                return Ok(());
            }
            other => {
                out.push(self.unsupported_stmt(node, other));
                return Ok(());
            }
        };
        out.push(Stmt::new(line, kind));
        Ok(())
    }

    /// Read a simple statement in an `if`/`for`/`switch` header.
    fn read_header_stmt(&self, node: Option<Node>) -> Result<Option<Box<Stmt>>, ParseError> {
        let Some(node) = node else {
            return Ok(None);
        };
        let mut out = Vec::new();
        self.read_stmt(node, &mut out)?;
        Ok(out.into_iter().next().map(Box::new))
    }

    fn read_if(&self, node: Node) -> Result<StmtKind, ParseError> {
        let init = self.read_header_stmt(node.child_by_field_name("initializer"))?;
        let cond = self.read_expr(self.field(node, "condition")?)?;
        let then = self.read_block(self.field(node, "consequence")?)?;
        let otherwise = match node.child_by_field_name("alternative") {
            Some(alt) => {
                let mut out = Vec::new();
                self.read_stmt(alt, &mut out)?;
                out.into_iter().next().map(Box::new)
            }
            None => None,
        };
        Ok(StmtKind::If {
            init,
            cond,
            then,
            otherwise,
        })
    }

    fn read_for(&self, node: Node) -> Result<StmtKind, ParseError> {
        let body = self.read_block(self.field(node, "body")?)?;
        let mut cursor = node.walk();
        let header = node
            .named_children(&mut cursor)
            .find(|n| n.kind() != "block" && n.kind() != "comment");

        let Some(header) = header else {
            return Ok(StmtKind::For {
                init: None,
                cond: None,
                post: None,
                body,
            });
        };

        match header.kind() {
            "for_clause" => Ok(StmtKind::For {
                init: self.read_header_stmt(header.child_by_field_name("initializer"))?,
                cond: header
                    .child_by_field_name("condition")
                    .map(|c| self.read_expr(c))
                    .transpose()?,
                post: self.read_header_stmt(header.child_by_field_name("update"))?,
                body,
            }),
            "range_clause" => {
                let names = header
                    .child_by_field_name("left")
                    .map(|left| self.read_names(left))
                    .unwrap_or_default();
                let key = names.first().cloned();
                let value = names.get(1).cloned();
                Ok(StmtKind::Range {
                    key,
                    value,
                    expr: self.read_expr(self.field(header, "right")?)?,
                    body,
                })
            }
            // `for cond { ... }`
            _ => Ok(StmtKind::For {
                init: None,
                cond: Some(self.read_expr(header)?),
                post: None,
                body,
            }),
        }
    }

    fn read_switch(&self, node: Node) -> Result<StmtKind, ParseError> {
        let init = self.read_header_stmt(node.child_by_field_name("initializer"))?;
        let tag = node
            .child_by_field_name("value")
            .map(|v| self.read_expr(v))
            .transpose()?;

        let mut cases = Vec::new();
        let mut cursor = node.walk();
        for case in node.named_children(&mut cursor) {
            let is_default = match case.kind() {
                "expression_case" => false,
                "default_case" => true,
                _ => continue,
            };
            let value_node = case.child_by_field_name("value");
            let values = match value_node {
                Some(list) => self.read_expr_list(list)?,
                None => Vec::new(),
            };
            let mut body = Vec::new();
            let mut inner = case.walk();
            for child in case.named_children(&mut inner) {
                if Some(child.id()) == value_node.map(|v| v.id()) {
                    continue;
                }
                if child.kind() == "statement_list" {
                    self.read_statements(child, &mut body)?;
                } else {
                    self.read_stmt(child, &mut body)?;
                }
            }
            cases.push(SwitchCase {
                values,
                is_default,
                body,
            });
        }
        Ok(StmtKind::Switch { init, tag, cases })
    }

    fn read_names(&self, list: Node) -> Vec<String> {
        if list.kind() != "expression_list" {
            return vec![self.node_text(list).to_string()];
        }
        let mut cursor = list.walk();
        list.named_children(&mut cursor)
            .filter(|n| n.kind() != "comment")
            .map(|n| self.node_text(n).to_string())
            .collect()
    }

    pub(super) fn read_expr_list(&self, list: Node) -> Result<Vec<Expr>, ParseError> {
        if list.kind() != "expression_list" {
            return Ok(vec![self.read_expr(list)?]);
        }
        let mut cursor = list.walk();
        list.named_children(&mut cursor)
            .filter(|n| n.kind() != "comment")
            .map(|n| self.read_expr(n))
            .collect()
    }

    pub(super) fn read_expr(&self, node: Node) -> Result<Expr, ParseError> {
        let text = || self.node_text(node).to_string();
        let expr = match node.kind() {
            "identifier" | "field_identifier" | "package_identifier" => Expr::Ident { name: text() },
            "int_literal" => Expr::Int { text: text() },
            "float_literal" => Expr::Float { text: text() },
            "imaginary_literal" => Expr::Imaginary { text: text() },
            "rune_literal" => Expr::Rune { text: text() },
            "interpreted_string_literal" | "raw_string_literal" => Expr::Str { text: text() },
            "true" => Expr::Bool { value: true },
            "false" => Expr::Bool { value: false },
            "nil" => Expr::Nil,
            "iota" => Expr::Iota,
            "parenthesized_expression" => {
                let inner = node
                    .named_child(0)
                    .ok_or_else(|| self.error(node, "empty parentheses"))?;
                Expr::Paren {
                    inner: Box::new(self.read_expr(inner)?),
                }
            }
            "binary_expression" => {
                let op_text = self.node_text(self.field(node, "operator")?);
                let op = BinaryOp::from_go(op_text)
                    .ok_or_else(|| self.error(node, format!("unknown operator {op_text}")))?;
                Expr::Binary {
                    op,
                    left: Box::new(self.read_expr(self.field(node, "left")?)?),
                    right: Box::new(self.read_expr(self.field(node, "right")?)?),
                }
            }
            "unary_expression" => {
                let op_text = self.node_text(self.field(node, "operator")?);
                let op = UnaryOp::from_go(op_text)
                    .ok_or_else(|| self.error(node, format!("unknown operator {op_text}")))?;
                Expr::Unary {
                    op,
                    operand: Box::new(self.read_expr(self.field(node, "operand")?)?),
                }
            }
            "call_expression" => self.read_call(node)?,
            "selector_expression" => Expr::Selector {
                operand: Box::new(self.read_expr(self.field(node, "operand")?)?),
                field: self.node_text(self.field(node, "field")?).to_string(),
            },
            "index_expression" => Expr::Index {
                operand: Box::new(self.read_expr(self.field(node, "operand")?)?),
                index: Box::new(self.read_expr(self.field(node, "index")?)?),
            },
            "slice_expression" => {
                if node.child_by_field_name("capacity").is_some() {
                    return Ok(unsupported_expr("full slice expression", self.node_text(node)));
                }
                let bound = |name: &str| -> Result<Option<Box<Expr>>, ParseError> {
                    node.child_by_field_name(name)
                        .map(|n| self.read_expr(n).map(Box::new))
                        .transpose()
                };
                Expr::Slice {
                    operand: Box::new(self.read_expr(self.field(node, "operand")?)?),
                    low: bound("start")?,
                    high: bound("end")?,
                }
            }
            "composite_literal" => {
                let mut ty = self.read_type(self.field(node, "type")?)?;
                let elems = self.read_literal_value(self.field(node, "body")?)?;
                if let TypeSig::Array { len, .. } = &mut ty
                    && *len == 0
                {
                    *len = elems.len() as u64;
                }
                Expr::Composite {
                    ty: Some(ty),
                    elems,
                }
            }
            "literal_value" => Expr::Composite {
                ty: None,
                elems: self.read_literal_value(node)?,
            },
            "literal_element" => {
                let inner = node
                    .named_child(0)
                    .ok_or_else(|| self.error(node, "empty literal element"))?;
                self.read_expr(inner)?
            }
            "func_literal" => {
                let (params, _, signature) = self.read_signature(node)?;
                let result = match signature {
                    TypeSig::Func { result, .. } => *result,
                    _ => TypeSig::Unit,
                };
                Expr::FuncLit {
                    params,
                    result,
                    body: self.read_block(self.field(node, "body")?)?,
                }
            }
            "type_conversion_expression" => Expr::Call {
                func: Box::new(Expr::Type {
                    ty: self.read_type(self.field(node, "type")?)?,
                }),
                args: vec![self.read_expr(self.field(node, "operand")?)?],
                spread: false,
            },
            "type_assertion_expression" => {
                unsupported_expr("type assertion", self.node_text(node))
            }
            "type_instantiation_expression" => {
                unsupported_expr("explicit instantiation", self.node_text(node))
            }
            kind if TYPE_KINDS.contains(&kind) => Expr::Type {
                ty: self.read_type(node)?,
            },
            other => unsupported_expr(other, self.node_text(node)),
        };
        Ok(expr)
    }

    fn read_call(&self, node: Node) -> Result<Expr, ParseError> {
        let func = self.read_expr(self.field(node, "function")?)?;
        let list = self.field(node, "arguments")?;
        let mut args = Vec::new();
        let mut spread = false;
        let mut cursor = list.walk();
        for arg in list.children(&mut cursor) {
            match arg.kind() {
                "..." => spread = true,
                "variadic_argument" => {
                    spread = true;
                    if let Some(inner) = arg.named_child(0) {
                        args.push(self.read_expr(inner)?);
                    }
                }
                _ if arg.is_named() && arg.kind() != "comment" => args.push(self.read_expr(arg)?),
                _ => {}
            }
        }
        Ok(Expr::Call {
            func: Box::new(func),
            args,
            spread,
        })
    }

    fn read_literal_value(&self, node: Node) -> Result<Vec<Element>, ParseError> {
        let mut elems = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "keyed_element" => {
                    let mut inner = child.walk();
                    let parts: Vec<Node> = child
                        .named_children(&mut inner)
                        .filter(|n| n.kind() != "comment")
                        .collect();
                    let [key, value] = parts.as_slice() else {
                        return Err(self.error(child, "malformed keyed element"));
                    };
                    elems.push(Element {
                        key: Some(self.read_expr(*key)?),
                        value: self.read_expr(*value)?,
                    });
                }
                "comment" => {}
                _ => elems.push(Element {
                    key: None,
                    value: self.read_expr(child)?,
                }),
            }
        }
        Ok(elems)
    }
}

fn unsupported_expr(construct: &str, text: &str) -> Expr {
    Expr::Unsupported {
        construct: construct.to_string(),
        text: first_line(text),
    }
}

fn line_of(node: Node) -> usize {
    node.start_position().row + 1
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or("").trim().to_string()
}
