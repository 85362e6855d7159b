//! Package-level symbols of a unit, for name resolution during lowering.

use crate::naming;
use portage_model::{
    Construct, ConstructNode, Expr, Field, Param, TranslationUnit, TypeDeclKind, TypeParam,
    TypeSig,
};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct FuncInfo {
    pub signature: TypeSig,
    pub params: Vec<Param>,
    pub exported: bool,
}

#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub decl: TypeDeclKind,
    /// Struct or interface signature, or the aliased/underlying type.
    pub signature: TypeSig,
    pub type_params: Vec<TypeParam>,
}

impl TypeInfo {
    pub fn fields(&self) -> &[Field] {
        match &self.signature {
            TypeSig::Struct { fields } => fields,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UnitIndex {
    pub package: String,
    pub module: String,
    /// Local import name → import path.
    pub imports: HashMap<String, String>,
    pub consts: HashMap<String, TypeSig>,
    pub vars: HashMap<String, TypeSig>,
    pub funcs: HashMap<String, FuncInfo>,
    /// `(receiver type, method)` → signature.
    pub methods: HashMap<(String, String), FuncInfo>,
    pub types: HashMap<String, TypeInfo>,
    /// Package functions called from inside a method body.
    pub called_from_methods: HashSet<String>,
}

impl UnitIndex {
    pub fn build(unit: &TranslationUnit) -> Self {
        let mut index = UnitIndex {
            package: unit.package.clone(),
            module: naming::module_name(&unit.package),
            imports: unit
                .imports
                .iter()
                .map(|i| (i.name.clone(), i.path.clone()))
                .collect(),
            ..Default::default()
        };
        for node in &unit.nodes {
            index.add(node);
        }
        for node in &unit.nodes {
            if let Construct::Function {
                receiver: Some(_),
                body,
                ..
            } = &node.construct
            {
                for stmt in body {
                    stmt.walk_exprs(&mut |expr| {
                        expr.walk(&mut |e| {
                            if let Expr::Call { func, .. } = e
                                && let Some(name) = func.as_ident()
                                && index.funcs.contains_key(name)
                            {
                                index.called_from_methods.insert(name.to_string());
                            }
                        })
                    });
                }
            }
        }
        index
    }

    fn add(&mut self, node: &ConstructNode) {
        let name = node.name.clone();
        match &node.construct {
            Construct::Constant { .. } => {
                self.consts.insert(name, node.signature.clone());
            }
            Construct::Variable { .. } => {
                self.vars.insert(name, node.signature.clone());
            }
            Construct::Function {
                receiver, params, ..
            } => {
                let info = FuncInfo {
                    signature: node.signature.clone(),
                    params: params.clone(),
                    exported: node.visibility == portage_model::Visibility::Exported,
                };
                match receiver {
                    Some(r) => {
                        self.methods.insert((r.type_name.clone(), name), info);
                    }
                    None => {
                        self.funcs.insert(name, info);
                    }
                }
            }
            Construct::TypeDecl { decl, type_params } => {
                self.types.insert(
                    name,
                    TypeInfo {
                        decl: *decl,
                        signature: node.signature.clone(),
                        type_params: type_params.clone(),
                    },
                );
            }
            Construct::Statement { .. } | Construct::Expression { .. } => {}
        }
    }

    pub fn import_path(&self, local: &str) -> Option<&str> {
        self.imports.get(local).map(String::as_str)
    }

    pub fn struct_info(&self, name: &str) -> Option<&TypeInfo> {
        self.types
            .get(name)
            .filter(|info| info.decl == TypeDeclKind::Struct)
    }

    /// Follow local aliases and defined types to the underlying signature.
    pub fn underlying<'a>(&'a self, ty: &'a TypeSig) -> &'a TypeSig {
        let mut current = ty;
        for _ in 0..16 {
            match current {
                TypeSig::Named {
                    name,
                    package: None,
                    ..
                } => match self.types.get(name) {
                    Some(info)
                        if matches!(info.decl, TypeDeclKind::Alias | TypeDeclKind::Defined) =>
                    {
                        current = &info.signature;
                    }
                    _ => return current,
                },
                _ => return current,
            }
        }
        current
    }

    /// Field type of a local struct, through pointers.
    pub fn field_type(&self, owner: &TypeSig, field: &str) -> Option<TypeSig> {
        let owner = match self.underlying(owner) {
            TypeSig::Optional { inner } => self.underlying(inner),
            other => other,
        };
        let fields = match owner {
            TypeSig::Named { name, .. } => self.struct_info(name)?.fields(),
            TypeSig::Struct { fields } => fields.as_slice(),
            _ => return None,
        };
        fields
            .iter()
            .find(|f| f.name == field)
            .map(|f| f.ty.clone())
    }

    /// Method signature on a local type, through pointers.
    pub fn method(&self, owner: &TypeSig, method: &str) -> Option<&FuncInfo> {
        let name = match owner {
            TypeSig::Named { name, .. } => name,
            TypeSig::Optional { inner } => match inner.as_ref() {
                TypeSig::Named { name, .. } => name,
                _ => return None,
            },
            _ => return None,
        };
        self.methods.get(&(name.clone(), method.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portage_model::{IntWidth, Location, TypeOrigin, Visibility};

    fn node(name: &str, construct: Construct, signature: TypeSig) -> ConstructNode {
        ConstructNode {
            name: name.into(),
            construct,
            signature,
            visibility: Visibility::from_go_name(name),
            location: Location::new("a.go", 1, 1),
            docs: None,
            type_origin: TypeOrigin::Declared,
        }
    }

    #[test]
    fn test_underlying_follows_defined_types() {
        let mut unit = TranslationUnit::new("a.go", "temp");
        unit.nodes.push(node(
            "Celsius",
            Construct::TypeDecl {
                decl: TypeDeclKind::Defined,
                type_params: Vec::new(),
            },
            TypeSig::Float { bits: 64 },
        ));
        unit.nodes.push(node(
            "Temp",
            Construct::TypeDecl {
                decl: TypeDeclKind::Alias,
                type_params: Vec::new(),
            },
            TypeSig::named("Celsius"),
        ));
        let index = UnitIndex::build(&unit);
        assert_eq!(index.module, "Temp");
        assert_eq!(
            index.underlying(&TypeSig::named("Temp")),
            &TypeSig::Float { bits: 64 }
        );
        let int = TypeSig::int(IntWidth::W8, false);
        assert_eq!(index.underlying(&int), &int);
    }
}
