//! Go type syntax → [`TypeSig`].

use super::{ReadContext, fold_int};
use crate::traits::ParseError;
use portage_model::{Field, MethodSig, TypeSig};
use tree_sitter::Node;

impl<'a> ReadContext<'a> {
    pub(super) fn read_type(&self, node: Node) -> Result<TypeSig, ParseError> {
        match node.kind() {
            "type_identifier" | "identifier" => Ok(self.resolve_type_name(self.node_text(node))),
            "qualified_type" => {
                let package = self.node_text(self.field(node, "package")?).to_string();
                let name = self.node_text(self.field(node, "name")?).to_string();
                Ok(TypeSig::Named {
                    name,
                    package: Some(package),
                    args: Vec::new(),
                })
            }
            "generic_type" => {
                let base = self.read_type(self.field(node, "type")?)?;
                let mut args = Vec::new();
                if let Some(list) = node.child_by_field_name("type_arguments") {
                    let mut cursor = list.walk();
                    for arg in list.named_children(&mut cursor) {
                        args.push(self.read_type(arg)?);
                    }
                }
                Ok(match base {
                    TypeSig::Named { name, package, .. } => TypeSig::Named {
                        name,
                        package,
                        args,
                    },
                    other => other,
                })
            }
            "pointer_type" => {
                let inner = node
                    .named_child(0)
                    .ok_or_else(|| self.error(node, "pointer type without element"))?;
                Ok(TypeSig::Optional {
                    inner: Box::new(self.read_type(inner)?),
                })
            }
            "slice_type" => Ok(TypeSig::slice(
                self.read_type(self.field(node, "element")?)?,
            )),
            "array_type" => {
                let elem = self.read_type(self.field(node, "element")?)?;
                let length = self.field(node, "length")?;
                let folded = self
                    .read_expr(length)
                    .ok()
                    .and_then(|expr| fold_int(&expr, 0, &self.consts))
                    .and_then(|n| u64::try_from(n).ok());
                match folded {
                    Some(len) => Ok(TypeSig::Array {
                        elem: Box::new(elem),
                        len,
                    }),
                    // Length depends on something outside this file.
                    None => Ok(TypeSig::named(self.node_text(node))),
                }
            }
            "implicit_length_array_type" => Ok(TypeSig::Array {
                elem: Box::new(self.read_type(self.field(node, "element")?)?),
                len: 0,
            }),
            "map_type" => Ok(TypeSig::Map {
                key: Box::new(self.read_type(self.field(node, "key")?)?),
                value: Box::new(self.read_type(self.field(node, "value")?)?),
            }),
            "channel_type" => Ok(TypeSig::Chan {
                elem: Box::new(self.read_type(self.field(node, "value")?)?),
            }),
            "function_type" => {
                let (_, _, signature) = self.read_signature(node)?;
                Ok(signature)
            }
            "struct_type" => self.read_struct(node),
            "interface_type" => self.read_interface(node),
            "parenthesized_type" | "type_elem" | "type_constraint" => {
                let mut cursor = node.walk();
                let parts: Vec<Node> = node.named_children(&mut cursor).collect();
                match parts.as_slice() {
                    [only] => self.read_type(*only),
                    // Union constraint (`~int | ~uint`).
                    _ => Ok(TypeSig::Interface {
                        methods: Vec::new(),
                    }),
                }
            }
            "negated_type" => match node.named_child(0) {
                Some(inner) => self.read_type(inner),
                None => Err(self.error(node, "empty approximation constraint")),
            },
            other => Err(self.error(node, format!("unsupported type syntax `{other}`"))),
        }
    }

    fn resolve_type_name(&self, name: &str) -> TypeSig {
        if self.scope.iter().any(|p| p == name) {
            return TypeSig::Param {
                name: name.to_string(),
            };
        }
        TypeSig::from_basic_name(name).unwrap_or_else(|| TypeSig::named(name))
    }

    fn read_struct(&self, node: Node) -> Result<TypeSig, ParseError> {
        let mut fields = Vec::new();
        let mut decls = Vec::new();
        super::collect_kind(node, "field_declaration", &mut decls);
        for decl in decls {
            let ty = self.read_type(self.field(decl, "type")?)?;
            let docs = self.leading_docs(decl);
            let names = self.field_texts(decl, "name");
            if names.is_empty() {
                // Embedded field: named after its type.
                let name = match &ty {
                    TypeSig::Named { name, .. } => name.clone(),
                    TypeSig::Optional { inner } => inner.to_string(),
                    other => other.to_string(),
                };
                fields.push(Field {
                    name,
                    ty,
                    embedded: true,
                    docs,
                });
                continue;
            }
            for name in names {
                fields.push(Field {
                    name,
                    ty: ty.clone(),
                    embedded: false,
                    docs: docs.clone(),
                });
            }
        }
        Ok(TypeSig::Struct { fields })
    }

    fn read_interface(&self, node: Node) -> Result<TypeSig, ParseError> {
        let mut methods = Vec::new();
        let mut cursor = node.walk();
        for elem in node.named_children(&mut cursor) {
            if elem.kind() != "method_elem" && elem.kind() != "method_spec" {
                continue;
            }
            let name = self.node_text(self.field(elem, "name")?).to_string();
            let (_, _, sig) = self.read_signature(elem)?;
            methods.push(MethodSig { name, sig });
        }
        Ok(TypeSig::Interface { methods })
    }
}
