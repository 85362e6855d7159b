//! Construct nodes: the declarations, statements, and expressions of a unit.

use crate::body::{Expr, Param, Stmt};
use crate::types::TypeSig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source location: file plus 1-based inclusive line range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl Location {
    pub fn new(file: impl Into<String>, start_line: usize, end_line: usize) -> Self {
        Self {
            file: file.into(),
            start_line,
            end_line,
        }
    }

    /// Same file, single line.
    pub fn at_line(&self, line: usize) -> Self {
        Self::new(self.file.clone(), line, line)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start_line == self.end_line {
            write!(f, "{}:{}", self.file, self.start_line)
        } else {
            write!(f, "{}:{}-{}", self.file, self.start_line, self.end_line)
        }
    }
}

/// Symbol visibility, preserved from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Exported,
    Unexported,
}

impl Visibility {
    /// Go rule: an identifier is exported when it starts with an uppercase letter.
    pub fn from_go_name(name: &str) -> Self {
        match name.chars().next() {
            Some(c) if c.is_uppercase() => Visibility::Exported,
            _ => Visibility::Unexported,
        }
    }
}

/// How a node's type signature was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeOrigin {
    /// Spelled out in the source.
    #[default]
    Declared,
    /// Untyped constant resolved by a typed use elsewhere in the file.
    Usage,
    /// Untyped constant given the default type of its literal.
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeParam {
    pub name: String,
    pub constraint: TypeSig,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Receiver {
    pub name: Option<String>,
    pub type_name: String,
    pub pointer: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeDeclKind {
    Struct,
    Interface,
    /// `type A = B`: same type, second name.
    Alias,
    /// `type A B` with a non-aggregate underlying type: a distinct type.
    Defined,
}

/// Construct payload. The set of kinds is closed; adding one means updating
/// [`ConstructKind`] and every exhaustive match over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "construct", rename_all = "snake_case")]
pub enum Construct {
    Constant {
        value: Expr,
        /// Value of `iota` when this spec was declared inside a group.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        iota: Option<u64>,
        /// Integer value, when the expression folds to a constant.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        folded: Option<i128>,
    },
    Variable {
        value: Option<Expr>,
    },
    Function {
        receiver: Option<Receiver>,
        type_params: Vec<TypeParam>,
        params: Vec<Param>,
        results: Vec<Param>,
        body: Vec<Stmt>,
    },
    TypeDecl {
        decl: TypeDeclKind,
        type_params: Vec<TypeParam>,
    },
    Statement {
        stmt: Stmt,
    },
    Expression {
        expr: Expr,
    },
}

/// Rule-table key for a construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructKind {
    Constant,
    Variable,
    Function,
    Method,
    PointerMethod,
    Struct,
    Interface,
    Alias,
    Defined,
    Statement,
    Expression,
}

impl ConstructKind {
    pub const ALL: [ConstructKind; 11] = [
        ConstructKind::Constant,
        ConstructKind::Variable,
        ConstructKind::Function,
        ConstructKind::Method,
        ConstructKind::PointerMethod,
        ConstructKind::Struct,
        ConstructKind::Interface,
        ConstructKind::Alias,
        ConstructKind::Defined,
        ConstructKind::Statement,
        ConstructKind::Expression,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConstructKind::Constant => "constant",
            ConstructKind::Variable => "variable",
            ConstructKind::Function => "function",
            ConstructKind::Method => "method",
            ConstructKind::PointerMethod => "pointer_method",
            ConstructKind::Struct => "struct",
            ConstructKind::Interface => "interface",
            ConstructKind::Alias => "alias",
            ConstructKind::Defined => "defined",
            ConstructKind::Statement => "statement",
            ConstructKind::Expression => "expression",
        }
    }
}

impl fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown construct kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for ConstructKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConstructKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// One construct extracted from a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructNode {
    /// Source identifier (empty for statements and expressions).
    pub name: String,
    #[serde(flatten)]
    pub construct: Construct,
    pub signature: TypeSig,
    pub visibility: Visibility,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs: Option<String>,
    #[serde(default)]
    pub type_origin: TypeOrigin,
}

impl ConstructNode {
    pub fn kind(&self) -> ConstructKind {
        match &self.construct {
            Construct::Constant { .. } => ConstructKind::Constant,
            Construct::Variable { .. } => ConstructKind::Variable,
            Construct::Function { receiver, .. } => match receiver {
                None => ConstructKind::Function,
                Some(r) if r.pointer => ConstructKind::PointerMethod,
                Some(_) => ConstructKind::Method,
            },
            Construct::TypeDecl { decl, .. } => match decl {
                TypeDeclKind::Struct => ConstructKind::Struct,
                TypeDeclKind::Interface => ConstructKind::Interface,
                TypeDeclKind::Alias => ConstructKind::Alias,
                TypeDeclKind::Defined => ConstructKind::Defined,
            },
            Construct::Statement { .. } => ConstructKind::Statement,
            Construct::Expression { .. } => ConstructKind::Expression,
        }
    }

    /// Qualified display name: `Type.Method` for methods.
    pub fn display_name(&self) -> String {
        match &self.construct {
            Construct::Function {
                receiver: Some(r), ..
            } => format!("{}.{}", r.type_name, self.name),
            _ => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrips_through_str() {
        for kind in ConstructKind::ALL {
            assert_eq!(kind.as_str().parse::<ConstructKind>(), Ok(kind));
        }
        assert!("class".parse::<ConstructKind>().is_err());
    }

    #[test]
    fn test_visibility_from_go_name() {
        assert_eq!(Visibility::from_go_name("Parse"), Visibility::Exported);
        assert_eq!(Visibility::from_go_name("parse"), Visibility::Unexported);
        assert_eq!(Visibility::from_go_name("_x"), Visibility::Unexported);
    }

    #[test]
    fn test_location_display() {
        assert_eq!(Location::new("a.go", 3, 3).to_string(), "a.go:3");
        assert_eq!(Location::new("a.go", 3, 9).to_string(), "a.go:3-9");
    }
}
