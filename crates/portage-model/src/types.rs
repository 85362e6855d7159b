//! Language-neutral type signatures.
//!
//! Every construct carries exactly one [`TypeSig`]. The vocabulary is closed:
//! source-language spellings (`byte`, `rune`, `any`, ...) are normalized by the
//! extractor so that two spellings of the same type compare equal.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer width. `Word` is the platform-sized integer (`int`/`uint`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
    Word,
}

impl IntWidth {
    /// Fixed bit count, `None` for the platform word.
    pub fn bits(self) -> Option<u8> {
        match self {
            IntWidth::W8 => Some(8),
            IntWidth::W16 => Some(16),
            IntWidth::W32 => Some(32),
            IntWidth::W64 => Some(64),
            IntWidth::Word => None,
        }
    }

    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            8 => Some(IntWidth::W8),
            16 => Some(IntWidth::W16),
            32 => Some(IntWidth::W32),
            64 => Some(IntWidth::W64),
            _ => None,
        }
    }

    pub const FIXED: [IntWidth; 4] = [IntWidth::W8, IntWidth::W16, IntWidth::W32, IntWidth::W64];
}

/// How an error-union result signals failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Failure {
    /// A diagnostic error value (`(T, error)`): exceptional.
    Error,
    /// A boolean presence flag (`(T, bool)`): expected and recoverable.
    Flag,
}

/// A struct field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: TypeSig,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub embedded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs: Option<String>,
}

/// An interface method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodSig {
    pub name: String,
    pub sig: TypeSig,
}

/// Canonical type signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypeSig {
    Int {
        width: IntWidth,
        signed: bool,
    },
    Float {
        bits: u8,
    },
    Complex {
        bits: u8,
    },
    Bool,
    String,
    Unit,
    Error,
    Slice {
        elem: Box<TypeSig>,
        growable: bool,
    },
    Array {
        elem: Box<TypeSig>,
        len: u64,
    },
    Map {
        key: Box<TypeSig>,
        value: Box<TypeSig>,
    },
    Chan {
        elem: Box<TypeSig>,
    },
    Optional {
        inner: Box<TypeSig>,
    },
    Func {
        params: Vec<TypeSig>,
        variadic: bool,
        result: Box<TypeSig>,
    },
    ErrorUnion {
        value: Box<TypeSig>,
        failure: Failure,
    },
    Tuple {
        items: Vec<TypeSig>,
    },
    Struct {
        fields: Vec<Field>,
    },
    Interface {
        methods: Vec<MethodSig>,
    },
    Named {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        package: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<TypeSig>,
    },
    Param {
        name: String,
    },
}

impl TypeSig {
    pub fn int(width: IntWidth, signed: bool) -> Self {
        TypeSig::Int { width, signed }
    }

    pub fn slice(elem: TypeSig) -> Self {
        TypeSig::Slice {
            elem: Box::new(elem),
            growable: false,
        }
    }

    pub fn growable_slice(elem: TypeSig) -> Self {
        TypeSig::Slice {
            elem: Box::new(elem),
            growable: true,
        }
    }

    pub fn bytes() -> Self {
        TypeSig::slice(TypeSig::int(IntWidth::W8, false))
    }

    pub fn named(name: impl Into<String>) -> Self {
        TypeSig::Named {
            name: name.into(),
            package: None,
            args: Vec::new(),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, TypeSig::Int { .. })
    }

    pub fn is_float(&self) -> bool {
        matches!(self, TypeSig::Float { .. })
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// `slice<uint8>`: ordered bytes, not text.
    pub fn is_byte_slice(&self) -> bool {
        matches!(
            self,
            TypeSig::Slice { elem, .. } if **elem == TypeSig::int(IntWidth::W8, false)
        )
    }

    /// Source type name for basic types as spelled in Go, used to recognize conversions.
    pub fn from_basic_name(name: &str) -> Option<Self> {
        let ty = match name {
            "int8" => TypeSig::int(IntWidth::W8, true),
            "int16" => TypeSig::int(IntWidth::W16, true),
            "int32" | "rune" => TypeSig::int(IntWidth::W32, true),
            "int64" => TypeSig::int(IntWidth::W64, true),
            "int" => TypeSig::int(IntWidth::Word, true),
            "uint8" | "byte" => TypeSig::int(IntWidth::W8, false),
            "uint16" => TypeSig::int(IntWidth::W16, false),
            "uint32" => TypeSig::int(IntWidth::W32, false),
            "uint64" => TypeSig::int(IntWidth::W64, false),
            "uint" | "uintptr" => TypeSig::int(IntWidth::Word, false),
            "float32" => TypeSig::Float { bits: 32 },
            "float64" => TypeSig::Float { bits: 64 },
            "complex64" => TypeSig::Complex { bits: 64 },
            "complex128" => TypeSig::Complex { bits: 128 },
            "bool" => TypeSig::Bool,
            "string" => TypeSig::String,
            "error" => TypeSig::Error,
            "any" => TypeSig::Interface {
                methods: Vec::new(),
            },
            _ => return None,
        };
        Some(ty)
    }

    /// Fold a result list into one signature.
    ///
    /// `(T, error)` and `error` become error unions carrying a diagnostic;
    /// `(T, bool)` becomes a flag union when the flag is unnamed or named `ok`.
    pub fn from_results(results: &[(Option<&str>, TypeSig)]) -> Self {
        match results {
            [] => TypeSig::Unit,
            [(_, TypeSig::Error)] => TypeSig::ErrorUnion {
                value: Box::new(TypeSig::Unit),
                failure: Failure::Error,
            },
            [(_, only)] => only.clone(),
            [init @ .., (_, TypeSig::Error)] => TypeSig::ErrorUnion {
                value: Box::new(Self::tuple_of(init)),
                failure: Failure::Error,
            },
            [(_, value), (name, TypeSig::Bool)] if matches!(name, None | Some("ok")) => {
                TypeSig::ErrorUnion {
                    value: Box::new(value.clone()),
                    failure: Failure::Flag,
                }
            }
            _ => Self::tuple_of(results),
        }
    }

    fn tuple_of(items: &[(Option<&str>, TypeSig)]) -> Self {
        match items {
            [(_, only)] => only.clone(),
            _ => TypeSig::Tuple {
                items: items.iter().map(|(_, ty)| ty.clone()).collect(),
            },
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[TypeSig]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for TypeSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSig::Int { width, signed } => {
                let prefix = if *signed { "int" } else { "uint" };
                match width.bits() {
                    Some(bits) => write!(f, "{prefix}{bits}"),
                    None => f.write_str(prefix),
                }
            }
            TypeSig::Float { bits } => write!(f, "float{bits}"),
            TypeSig::Complex { bits } => write!(f, "complex{bits}"),
            TypeSig::Bool => f.write_str("bool"),
            TypeSig::String => f.write_str("string"),
            TypeSig::Unit => f.write_str("unit"),
            TypeSig::Error => f.write_str("error"),
            TypeSig::Slice { elem, growable } => {
                if *growable {
                    write!(f, "slice<{elem}, grow>")
                } else {
                    write!(f, "slice<{elem}>")
                }
            }
            TypeSig::Array { elem, len } => write!(f, "array<{elem}, {len}>"),
            TypeSig::Map { key, value } => write!(f, "map<{key}, {value}>"),
            TypeSig::Chan { elem } => write!(f, "chan<{elem}>"),
            TypeSig::Optional { inner } => write!(f, "optional<{inner}>"),
            TypeSig::Func {
                params,
                variadic,
                result,
            } => {
                f.write_str("func(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if *variadic && i + 1 == params.len() {
                        f.write_str("...")?;
                    }
                    write!(f, "{param}")?;
                }
                f.write_str(")")?;
                if **result != TypeSig::Unit {
                    write!(f, " -> {result}")?;
                }
                Ok(())
            }
            TypeSig::ErrorUnion { value, failure } => match failure {
                Failure::Error => write!(f, "result<{value}, error>"),
                Failure::Flag => write!(f, "result<{value}, flag>"),
            },
            TypeSig::Tuple { items } => {
                f.write_str("tuple<")?;
                write_list(f, items)?;
                f.write_str(">")
            }
            TypeSig::Struct { fields } => {
                f.write_str("struct{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{}: {}", field.name, field.ty)?;
                }
                f.write_str("}")
            }
            TypeSig::Interface { methods } => {
                f.write_str("interface{")?;
                for (i, method) in methods.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{}: {}", method.name, method.sig)?;
                }
                f.write_str("}")
            }
            TypeSig::Named {
                name,
                package,
                args,
            } => {
                if let Some(pkg) = package {
                    write!(f, "{pkg}.")?;
                }
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    write_list(f, args)?;
                    f.write_str(">")?;
                }
                Ok(())
            }
            TypeSig::Param { name } => write!(f, "param<{name}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_text() {
        assert_eq!(TypeSig::int(IntWidth::W8, false).to_string(), "uint8");
        assert_eq!(TypeSig::int(IntWidth::Word, true).to_string(), "int");
        assert_eq!(TypeSig::bytes().to_string(), "slice<uint8>");
        assert_eq!(
            TypeSig::growable_slice(TypeSig::String).to_string(),
            "slice<string, grow>"
        );
        let func = TypeSig::Func {
            params: vec![TypeSig::String, TypeSig::int(IntWidth::Word, true)],
            variadic: true,
            result: Box::new(TypeSig::Bool),
        };
        assert_eq!(func.to_string(), "func(string, ...int) -> bool");
    }

    #[test]
    fn test_aliases_normalize() {
        assert_eq!(
            TypeSig::from_basic_name("byte"),
            TypeSig::from_basic_name("uint8")
        );
        assert_eq!(
            TypeSig::from_basic_name("rune"),
            TypeSig::from_basic_name("int32")
        );
    }

    #[test]
    fn test_result_folding() {
        let int = TypeSig::int(IntWidth::Word, true);
        assert_eq!(TypeSig::from_results(&[]), TypeSig::Unit);
        assert_eq!(
            TypeSig::from_results(&[(None, int.clone()), (None, TypeSig::Error)]).to_string(),
            "result<int, error>"
        );
        assert_eq!(
            TypeSig::from_results(&[(None, int.clone()), (Some("ok"), TypeSig::Bool)])
                .to_string(),
            "result<int, flag>"
        );
        assert_eq!(
            TypeSig::from_results(&[(Some("q"), int.clone()), (Some("exact"), TypeSig::Bool)])
                .to_string(),
            "tuple<int, bool>"
        );
        assert_eq!(
            TypeSig::from_results(&[(None, TypeSig::Error)]).to_string(),
            "result<unit, error>"
        );
    }
}
