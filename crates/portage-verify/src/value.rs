//! Go literals as JSON values, and the comparison both sides share.
//!
//! Target programs print their results as JSON (see [`crate::harness`]), so
//! expected literals are brought into the same shape: integers and runes
//! become numbers, byte slices become arrays of numbers, structs become
//! objects keyed by Go field names, map keys become strings.

use portage_mapping::UnitIndex;
use portage_model::{
    Construct, Expr, IntWidth, TranslationUnit, TypeSig, UnaryOp, decode_go_rune,
    decode_go_string_bytes,
};
use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot evaluate `{text}`: {reason}")]
pub struct ValueError {
    pub text: String,
    pub reason: String,
}

impl ValueError {
    fn new(expr: &Expr, reason: impl Into<String>) -> Self {
        Self {
            text: format!("{expr:?}"),
            reason: reason.into(),
        }
    }
}

/// Evaluates literal expressions in the context of one source unit.
pub struct LiteralEvaluator<'a> {
    unit: &'a TranslationUnit,
    index: &'a UnitIndex,
}

impl<'a> LiteralEvaluator<'a> {
    pub fn new(unit: &'a TranslationUnit, index: &'a UnitIndex) -> Self {
        Self { unit, index }
    }

    /// Value of `expr`, read as type `ty` when the literal does not say.
    pub fn evaluate(&self, expr: &Expr, ty: Option<&TypeSig>) -> Result<Value, ValueError> {
        let ty = ty.map(|t| self.index.underlying(t));
        match expr {
            Expr::Paren { inner } => self.evaluate(inner, ty),
            Expr::Nil => Ok(Value::Null),
            Expr::Bool { value } => Ok(Value::Bool(*value)),
            Expr::Int { text } => match ty {
                Some(t) if t.is_float() => float(expr, text),
                _ => integer(expr, text, false),
            },
            Expr::Float { text } => float(expr, text),
            Expr::Rune { text } => decode_go_rune(text)
                .map(|code| Value::Number(code.into()))
                .ok_or_else(|| ValueError::new(expr, "malformed rune literal")),
            Expr::Str { text } => {
                let bytes = decode_go_string_bytes(text)
                    .ok_or_else(|| ValueError::new(expr, "malformed string literal"))?;
                if ty.is_some_and(is_bytes) {
                    Ok(byte_array(&bytes))
                } else {
                    Ok(Value::String(String::from_utf8_lossy(&bytes).into_owned()))
                }
            }
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => match operand.unparen() {
                Expr::Int { text } if !ty.is_some_and(TypeSig::is_float) => {
                    integer(expr, text, true)
                }
                _ => negate(expr, self.evaluate(operand, ty)?),
            },
            Expr::Unary {
                op: UnaryOp::Pos,
                operand,
            } => self.evaluate(operand, ty),
            Expr::Call { func, args, .. } => self.conversion(expr, func, args),
            Expr::Composite { ty: own, elems } => {
                let resolved = own.as_ref().map(|t| self.index.underlying(t)).or(ty);
                let Some(resolved) = resolved else {
                    return Err(ValueError::new(expr, "composite literal without a type"));
                };
                self.composite(expr, resolved, elems)
            }
            Expr::Ident { name } => self.constant(expr, name),
            _ => Err(ValueError::new(expr, "not a literal")),
        }
    }

    fn conversion(&self, expr: &Expr, func: &Expr, args: &[Expr]) -> Result<Value, ValueError> {
        let [arg] = args else {
            return Err(ValueError::new(expr, "conversion takes one argument"));
        };
        let target = match func.unparen() {
            Expr::Type { ty } => ty.clone(),
            Expr::Ident { name } => TypeSig::from_basic_name(name)
                .ok_or_else(|| ValueError::new(expr, "call is not a conversion"))?,
            _ => return Err(ValueError::new(expr, "call is not a conversion")),
        };
        let target = self.index.underlying(&target);
        let value = self.evaluate(arg, Some(target))?;
        match (target, value) {
            (TypeSig::String, Value::Number(n)) => {
                let c = n
                    .as_u64()
                    .and_then(|code| char::from_u32(code as u32))
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                Ok(Value::String(c.to_string()))
            }
            (t, Value::String(s)) if is_bytes(t) => Ok(byte_array(s.as_bytes())),
            (TypeSig::Slice { elem, .. }, Value::String(s))
                if **elem == TypeSig::int(IntWidth::W32, true) =>
            {
                Ok(Value::Array(
                    s.chars().map(|c| Value::Number((c as u32).into())).collect(),
                ))
            }
            (_, value) => Ok(value),
        }
    }

    fn composite(
        &self,
        expr: &Expr,
        ty: &TypeSig,
        elems: &[portage_model::Element],
    ) -> Result<Value, ValueError> {
        match ty {
            TypeSig::Slice { elem, .. } | TypeSig::Array { elem, .. } => elems
                .iter()
                .map(|e| self.evaluate(&e.value, Some(elem)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            TypeSig::Map { key, value } => {
                let mut map = Map::new();
                for e in elems {
                    let Some(k) = &e.key else {
                        return Err(ValueError::new(expr, "map element without a key"));
                    };
                    let k = key_string(self.evaluate(k, Some(key))?);
                    map.insert(k, self.evaluate(&e.value, Some(value))?);
                }
                Ok(Value::Object(map))
            }
            TypeSig::Named { name, .. } => match self.index.struct_info(name) {
                Some(info) => self.struct_value(expr, info.fields(), elems),
                None => Err(ValueError::new(expr, format!("unknown type `{name}`"))),
            },
            TypeSig::Struct { fields } => self.struct_value(expr, fields, elems),
            other => Err(ValueError::new(
                expr,
                format!("composite literal of type `{other}`"),
            )),
        }
    }

    fn struct_value(
        &self,
        expr: &Expr,
        fields: &[portage_model::Field],
        elems: &[portage_model::Element],
    ) -> Result<Value, ValueError> {
        let mut map = Map::new();
        for (i, e) in elems.iter().enumerate() {
            let field = match e.key.as_ref().and_then(Expr::as_ident) {
                Some(name) => fields.iter().find(|f| f.name == name),
                None => fields.get(i),
            };
            let Some(field) = field else {
                return Err(ValueError::new(expr, "element does not name a field"));
            };
            map.insert(field.name.clone(), self.evaluate(&e.value, Some(&field.ty))?);
        }
        // Unset fields hold their zero value on both sides.
        for field in fields {
            if !map.contains_key(&field.name) {
                map.insert(field.name.clone(), self.zero(&field.ty));
            }
        }
        Ok(Value::Object(map))
    }

    fn zero(&self, ty: &TypeSig) -> Value {
        match self.index.underlying(ty) {
            TypeSig::Int { .. } => Value::Number(0.into()),
            TypeSig::Float { .. } => Number::from_f64(0.0).map_or(Value::Null, Value::Number),
            TypeSig::Bool => Value::Bool(false),
            TypeSig::String => Value::String(String::new()),
            TypeSig::Array { elem, len } => {
                Value::Array((0..*len).map(|_| self.zero(elem)).collect())
            }
            TypeSig::Slice { .. } => Value::Array(Vec::new()),
            TypeSig::Map { .. } => Value::Object(Map::new()),
            TypeSig::Named { name, .. } => match self.index.struct_info(name) {
                Some(info) => Value::Object(
                    info.fields()
                        .iter()
                        .map(|f| (f.name.clone(), self.zero(&f.ty)))
                        .collect(),
                ),
                None => Value::Null,
            },
            _ => Value::Null,
        }
    }

    /// Package constants resolve to their folded or literal value.
    fn constant(&self, expr: &Expr, name: &str) -> Result<Value, ValueError> {
        let node = self
            .unit
            .nodes
            .iter()
            .find(|n| n.name == name && matches!(n.construct, Construct::Constant { .. }));
        match node.map(|n| (&n.construct, &n.signature)) {
            Some((Construct::Constant { folded: Some(v), .. }, _)) => Ok(number_i128(*v)),
            Some((Construct::Constant { value, .. }, sig)) => self.evaluate(value, Some(sig)),
            _ => Err(ValueError::new(expr, format!("`{name}` is not a constant"))),
        }
    }
}

fn is_bytes(ty: &TypeSig) -> bool {
    matches!(ty, TypeSig::Slice { elem, .. } if **elem == TypeSig::int(IntWidth::W8, false))
}

fn byte_array(bytes: &[u8]) -> Value {
    Value::Array(bytes.iter().map(|b| Value::Number((*b).into())).collect())
}

fn key_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn integer(expr: &Expr, text: &str, negative: bool) -> Result<Value, ValueError> {
    let clean: String = text
        .chars()
        .filter(|&c| c != '_')
        .collect::<String>()
        .to_ascii_lowercase();
    let (digits, radix) = if let Some(rest) = clean.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = clean.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = clean.strip_prefix("0b") {
        (rest, 2)
    } else if clean.len() > 1 && clean.starts_with('0') {
        (&clean[1..], 8)
    } else {
        (clean.as_str(), 10)
    };
    let magnitude = i128::from_str_radix(digits, radix)
        .map_err(|e| ValueError::new(expr, e.to_string()))?;
    Ok(number_i128(if negative { -magnitude } else { magnitude }))
}

fn number_i128(v: i128) -> Value {
    if let Ok(n) = i64::try_from(v) {
        Value::Number(n.into())
    } else if let Ok(n) = u64::try_from(v) {
        Value::Number(n.into())
    } else {
        Number::from_f64(v as f64).map_or(Value::Null, Value::Number)
    }
}

fn float(expr: &Expr, text: &str) -> Result<Value, ValueError> {
    let clean: String = text.chars().filter(|&c| c != '_').collect();
    let v: f64 = clean
        .parse()
        .map_err(|_| ValueError::new(expr, "unsupported float literal"))?;
    Number::from_f64(v)
        .map(Value::Number)
        .ok_or_else(|| ValueError::new(expr, "float literal is not finite"))
}

fn negate(expr: &Expr, value: Value) -> Result<Value, ValueError> {
    let Value::Number(n) = value else {
        return Err(ValueError::new(expr, "negation of a non-number"));
    };
    if let Some(i) = n.as_i64() {
        return Ok(Value::Number((-i).into()));
    }
    n.as_f64()
        .and_then(|f| Number::from_f64(-f))
        .map(Value::Number)
        .ok_or_else(|| ValueError::new(expr, "negation out of range"))
}

/// Structural equality where numbers compare exactly by value: `3` equals
/// `3.0`, but `0.30000000000000004` does not equal `0.3`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

fn numbers_equal(x: &Number, y: &Number) -> bool {
    match (number_as_i128(x), number_as_i128(y)) {
        (Some(a), Some(b)) => a == b,
        (Some(i), None) => y.as_f64().is_some_and(|f| float_is_integer(f, i)),
        (None, Some(i)) => x.as_f64().is_some_and(|f| float_is_integer(f, i)),
        (None, None) => match (x.as_f64(), y.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn number_as_i128(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

/// No rounding: the float must hold exactly `i`.
fn float_is_integer(f: f64, i: i128) -> bool {
    f.fract() == 0.0 && f.abs() < 2f64.powi(127) && f as i128 == i
}

#[cfg(test)]
mod tests {
    use super::*;
    use portage_model::Element;
    use serde_json::json;

    fn eval(expr: &Expr, ty: Option<&TypeSig>) -> Value {
        let unit = TranslationUnit::new("a.go", "a");
        let index = UnitIndex::build(&unit);
        LiteralEvaluator::new(&unit, &index).evaluate(expr, ty).unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(eval(&Expr::int("0x41"), None), json!(65));
        assert_eq!(eval(&Expr::Rune { text: "'a'".into() }, None), json!(97));
        assert_eq!(eval(&Expr::string("\"hi\""), None), json!("hi"));
        assert_eq!(
            eval(
                &Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(Expr::int("5")),
                },
                None
            ),
            json!(-5)
        );
        assert_eq!(eval(&Expr::int("2"), Some(&TypeSig::Float { bits: 64 })), json!(2.0));
    }

    #[test]
    fn test_byte_slices_are_numbers() {
        let conv = Expr::Call {
            func: Box::new(Expr::Type {
                ty: TypeSig::bytes(),
            }),
            args: vec![Expr::string("\"AB\"")],
            spread: false,
        };
        assert_eq!(eval(&conv, None), json!([65, 66]));

        let lit = Expr::Composite {
            ty: Some(TypeSig::bytes()),
            elems: vec![
                Element {
                    key: None,
                    value: Expr::int("1"),
                },
                Element {
                    key: None,
                    value: Expr::Rune { text: "'z'".into() },
                },
            ],
        };
        assert_eq!(eval(&lit, None), json!([1, 122]));
    }

    #[test]
    fn test_map_keys_are_strings() {
        let ty = TypeSig::Map {
            key: Box::new(TypeSig::int(IntWidth::Word, true)),
            value: Box::new(TypeSig::String),
        };
        let lit = Expr::Composite {
            ty: Some(ty),
            elems: vec![Element {
                key: Some(Expr::int("1")),
                value: Expr::string("\"one\""),
            }],
        };
        assert_eq!(eval(&lit, None), json!({"1": "one"}));
    }

    #[test]
    fn test_numbers_compare_exactly() {
        assert!(values_equal(&json!(3), &json!(3.0)));
        assert!(values_equal(&json!([0.1]), &json!([0.1])));
        assert!(!values_equal(&json!(0.30000000000000004), &json!(0.3)));
        assert!(!values_equal(&json!(9007199254740993i64), &json!(9007199254740992.0)));
        assert!(values_equal(&json!(u64::MAX), &json!(u64::MAX)));
        assert!(!values_equal(&json!(-1), &json!(u64::MAX)));
        assert!(!values_equal(&json!(1), &json!(2)));
        assert!(!values_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
        assert!(!values_equal(&json!("1"), &json!(1)));
    }
}
