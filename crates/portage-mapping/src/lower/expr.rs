//! Expression lowering, builtins, conversions, and type inference.

use super::Lowerer;
use super::literal::{self, atom, source_text};
use crate::naming;
use portage_model::{
    BinaryOp, Element, Expr, Failure, IntWidth, Param, Stmt, TypeSig, UnaryOp,
    decode_go_rune, decode_go_string_bytes,
};

const SLICE_END_CLAMPED: &str =
    "string slice: an end past the string is clamped instead of panicking";

const BUILTINS: &[&str] = &[
    "len", "cap", "append", "make", "new", "delete", "panic", "min", "max", "copy", "recover",
    "print", "println", "close", "clear", "complex", "real", "imag",
];

fn int() -> TypeSig {
    TypeSig::int(IntWidth::Word, true)
}

impl<'a> Lowerer<'a> {
    // --------------------------------------------------------------- inference

    /// Static type of `expr`, or `None` for untyped constants and unknowns.
    pub(super) fn type_of(&self, expr: &Expr) -> Option<TypeSig> {
        let index = self.index;
        match expr {
            Expr::Ident { name } => {
                if let Some(ty) = self.local(name) {
                    return Some(ty.clone());
                }
                if self.is_receiver(name) {
                    return self.receiver.as_ref().map(|(_, ty)| ty.clone());
                }
                if let Some(ty) = index.consts.get(name).or_else(|| index.vars.get(name)) {
                    return Some(ty.clone());
                }
                index.funcs.get(name).map(|f| f.signature.clone())
            }
            Expr::Str { .. } => Some(TypeSig::String),
            Expr::Bool { .. } => Some(TypeSig::Bool),
            Expr::Int { .. } | Expr::Float { .. } | Expr::Rune { .. } | Expr::Nil => None,
            Expr::Binary { op, left, right } => {
                if op.is_comparison() || op.is_logical() {
                    return Some(TypeSig::Bool);
                }
                if matches!(op, BinaryOp::Shl | BinaryOp::Shr) {
                    return self.type_of(left);
                }
                self.type_of(left).or_else(|| self.type_of(right))
            }
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => Some(TypeSig::Bool),
                UnaryOp::Deref => match self.type_of(operand)? {
                    TypeSig::Optional { inner } => Some(*inner),
                    _ => None,
                },
                UnaryOp::Addr => self.type_of(operand).map(|inner| TypeSig::Optional {
                    inner: Box::new(inner),
                }),
                UnaryOp::Recv => None,
                _ => self.type_of(operand),
            },
            Expr::Call { func, args, .. } => self.call_type(func, args),
            Expr::Selector { operand, field } => {
                if let Some((pkg, name)) = expr.qualified_name()
                    && self.is_package(pkg)
                {
                    let path = index.import_path(pkg)?;
                    return self.table.symbol(&format!("{path}.{name}"))?.result_type();
                }
                let owner = self.type_of(operand)?;
                index.field_type(&owner, field)
            }
            Expr::Index { operand, .. } => match index.underlying(&self.type_of(operand)?) {
                TypeSig::Slice { elem, .. } | TypeSig::Array { elem, .. } => Some(*elem.clone()),
                TypeSig::Map { value, .. } => Some(*value.clone()),
                TypeSig::String => Some(TypeSig::int(IntWidth::W8, false)),
                _ => None,
            },
            Expr::Slice { operand, .. } => match self.type_of(operand)? {
                TypeSig::Array { elem, .. } => Some(TypeSig::slice(*elem)),
                other => Some(other),
            },
            Expr::Composite { ty, .. } => ty.clone(),
            Expr::Paren { inner } => self.type_of(inner),
            Expr::FuncLit { params, result, .. } => Some(TypeSig::Func {
                params: params.iter().map(|p| p.ty.clone()).collect(),
                variadic: params.last().is_some_and(|p| p.variadic),
                result: Box::new(result.clone()),
            }),
            Expr::Imaginary { .. } | Expr::Iota | Expr::Type { .. } | Expr::Unsupported { .. } => {
                None
            }
        }
    }

    /// Type for a new binding: untyped constants take their Go default type.
    pub(super) fn binding_type(&self, expr: &Expr) -> Option<TypeSig> {
        if let Some(ty) = self.type_of(expr) {
            return Some(ty);
        }
        match expr.unparen() {
            Expr::Int { .. } => Some(int()),
            Expr::Float { .. } => Some(TypeSig::Float { bits: 64 }),
            Expr::Rune { .. } => Some(TypeSig::int(IntWidth::W32, true)),
            Expr::Binary { left, right, .. } => {
                self.binding_type(left).or_else(|| self.binding_type(right))
            }
            Expr::Unary { operand, .. } => self.binding_type(operand),
            _ => None,
        }
    }

    fn call_type(&self, func: &Expr, args: &[Expr]) -> Option<TypeSig> {
        let index = self.index;
        match func.unparen() {
            Expr::Type { ty } => Some(ty.clone()),
            Expr::Ident { name } if self.local(name).is_none() && !self.is_receiver(name) => {
                match name.as_str() {
                    "len" | "cap" | "copy" => return Some(int()),
                    "append" | "min" | "max" => return args.first().and_then(|a| self.type_of(a)),
                    "make" => {
                        return match args.first()? {
                            Expr::Type { ty } => Some(ty.clone()),
                            _ => None,
                        };
                    }
                    "new" => {
                        return match args.first()? {
                            Expr::Type { ty } => Some(TypeSig::Optional {
                                inner: Box::new(ty.clone()),
                            }),
                            _ => None,
                        };
                    }
                    _ => {}
                }
                if let Some(ty) = TypeSig::from_basic_name(name) {
                    return Some(ty);
                }
                if index.types.contains_key(name) {
                    return Some(TypeSig::named(name.clone()));
                }
                func_result(&index.funcs.get(name)?.signature)
            }
            Expr::Selector { operand, field } => {
                if let Some((pkg, name)) = func.unparen().qualified_name()
                    && self.is_package(pkg)
                {
                    let path = index.import_path(pkg)?;
                    return self.table.symbol(&format!("{path}.{name}"))?.result_type();
                }
                let owner = self.type_of(operand)?;
                func_result(&index.method(&owner, field)?.signature)
            }
            other => func_result(&self.type_of(other)?),
        }
    }

    fn is_package(&self, name: &str) -> bool {
        self.local(name).is_none() && self.index.imports.contains_key(name)
    }

    // ----------------------------------------------------------------- entries

    /// Lower `expr` where a value of type `expected` is wanted.
    pub(crate) fn lower_expr(&mut self, expr: &Expr, expected: Option<&TypeSig>) -> String {
        match expr {
            Expr::Ident { name } => self.lower_ident(name),
            Expr::Int { text } => self.int_literal(text, expected),
            Expr::Float { text } => {
                let suffix = match expected {
                    Some(ty) if self.index.underlying(ty).is_float() => self.literal_suffix(ty),
                    _ => String::new(),
                };
                literal::float_literal(text, &suffix)
            }
            Expr::Imaginary { text } => self.unsupported_expr("complex literal", text),
            Expr::Rune { text } => self.rune_literal(text, expected),
            Expr::Str { text } => match decode_go_string_bytes(text) {
                Some(bytes) => literal::string_literal(&bytes),
                None => self.unsupported_expr("string literal", text),
            },
            Expr::Bool { value } => value.to_string(),
            Expr::Nil => "nil".to_string(),
            Expr::Iota => self.unsupported_expr("iota outside a constant", "iota"),
            Expr::Binary { op, left, right } => self.lower_binary(*op, left, right, expected),
            Expr::Unary { op, operand } => self.lower_unary(*op, operand, expected),
            Expr::Call { func, args, spread } => self.lower_call(func, args, *spread, expected),
            Expr::Selector { operand, field } => self.lower_selector(expr, operand, field),
            Expr::Index { operand, index } => self.lower_index_expr(operand, index),
            Expr::Slice { operand, low, high } => {
                self.lower_slice(operand, low.as_deref(), high.as_deref())
            }
            Expr::Composite { ty, elems } => {
                let ty = ty.clone().or_else(|| expected.cloned());
                self.lower_composite(ty.as_ref(), elems, expr)
            }
            Expr::Paren { inner } => {
                let inner = self.lower_expr(inner, expected);
                if literal::is_atomic(&inner) {
                    inner
                } else {
                    format!("({inner})")
                }
            }
            Expr::FuncLit {
                params,
                result,
                body,
            } => self.lower_func_lit(params, result, body),
            Expr::Type { ty } => {
                let text = ty.to_string();
                self.unsupported_expr("type in value position", &text)
            }
            Expr::Unsupported { construct, text } => self.unsupported_expr(construct, text),
        }
    }

    /// Lower an index, length, or count: integer literals stay bare.
    pub(super) fn lower_count(&mut self, expr: &Expr) -> String {
        match expr.unparen() {
            Expr::Int { text } => literal::int_literal(text, ""),
            other => self.lower_expr(other, Some(&int())),
        }
    }

    pub(super) fn unsupported_expr(&mut self, construct: &str, text: &str) -> String {
        self.unsupported(format!("unsupported {construct}: {text}"));
        let message = literal::string_literal(format!("{construct}: {text}").as_bytes());
        format!("(raise NotImplementedError.new({message}))")
    }

    fn int_literal(&mut self, text: &str, expected: Option<&TypeSig>) -> String {
        let fallback = int();
        let ty = expected.unwrap_or(&fallback);
        let index = self.index;
        let underlying = index.underlying(ty);
        if underlying.is_float() {
            let suffix = self.literal_suffix(ty);
            return literal::int_as_float(text, &suffix);
        }
        let suffix = if underlying.is_integer() {
            self.literal_suffix(ty)
        } else {
            self.literal_suffix(&fallback)
        };
        literal::int_literal(text, &suffix)
    }

    fn rune_literal(&mut self, text: &str, expected: Option<&TypeSig>) -> String {
        let Some(code) = decode_go_rune(text) else {
            return self.unsupported_expr("rune literal", text);
        };
        let index = self.index;
        match expected.map(|ty| (ty, index.underlying(ty))) {
            Some((ty, TypeSig::Int { width, signed })) if !(*width == IntWidth::W32 && *signed) => {
                let suffix = self.literal_suffix(ty);
                format!("{code}{suffix}")
            }
            Some((ty, TypeSig::Float { .. })) => {
                let suffix = self.literal_suffix(ty);
                format!("{code}.0{suffix}")
            }
            _ => format!("{}.ord", literal::char_literal(code)),
        }
    }

    fn lower_ident(&mut self, name: &str) -> String {
        let index = self.index;
        if self.local(name).is_some() {
            return naming::local_name(name);
        }
        if self.is_receiver(name) {
            return "self".to_string();
        }
        if index.consts.contains_key(name) {
            return naming::constant_name(name);
        }
        if index.vars.contains_key(name) {
            if self.receiver.is_some() {
                self.lossy(format!(
                    "package variable `{name}` read from a method resolves to the struct's class variable"
                ));
            }
            return format!("@@{}", naming::local_name(name));
        }
        if let Some(func) = index.funcs.get(name) {
            let types: Vec<String> = func.params.iter().map(|p| self.type_text(&p.ty)).collect();
            self.degrade(portage_model::Confidence::IdiomaticEquivalent);
            return format!(
                "->{}.{}({})",
                self.module(),
                naming::local_name(name),
                types.join(", ")
            );
        }
        naming::local_name(name)
    }

    // --------------------------------------------------------------- operators

    fn lower_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        expected: Option<&TypeSig>,
    ) -> String {
        let shift = matches!(op, BinaryOp::Shl | BinaryOp::Shr);
        let left_ty = self.type_of(left);
        let operand_ty = if op.is_logical() {
            Some(TypeSig::Bool)
        } else if shift {
            left_ty.or_else(|| expected.cloned())
        } else if op.is_comparison() {
            left_ty.or_else(|| self.type_of(right))
        } else {
            left_ty
                .or_else(|| self.type_of(right))
                .or_else(|| expected.cloned())
        };
        let l = self.operand(left, op, operand_ty.as_ref());
        let r = if shift {
            match right.unparen() {
                Expr::Int { text } => literal::int_literal(text, ""),
                other => self.operand(other, op, None),
            }
        } else {
            self.operand(right, op, operand_ty.as_ref())
        };

        let index = self.index;
        let kind = operand_ty.as_ref().map(|ty| index.underlying(ty));
        let integer = match kind {
            Some(ty) => ty.is_integer(),
            None => is_int_literal(left) || is_int_literal(right),
        };
        if integer {
            match op {
                BinaryOp::Add => return format!("{l} &+ {r}"),
                BinaryOp::Sub => return format!("{l} &- {r}"),
                BinaryOp::Mul => return format!("{l} &* {r}"),
                BinaryOp::Div => {
                    if matches!(kind, Some(TypeSig::Int { signed: true, .. })) {
                        self.lossy(
                            "signed division: `MIN / -1` raises OverflowError instead of wrapping",
                        );
                    }
                    return format!("{}.tdiv({r})", atom(l));
                }
                BinaryOp::Rem => return format!("{}.remainder({r})", atom(l)),
                _ => {}
            }
        }
        let symbol = match op {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::AndNot => return format!("{l} & ~{}", atom(r)),
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        };
        format!("{l} {symbol} {r}")
    }

    /// Lower a binary operand, parenthesized unless precedence is shared.
    fn operand(&mut self, expr: &Expr, parent: BinaryOp, expected: Option<&TypeSig>) -> String {
        let text = self.lower_expr(expr, expected);
        if let Expr::Binary { op, .. } = expr
            && parent.is_logical()
            && (op.is_comparison() || *op == parent)
        {
            return text;
        }
        atom(text)
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &Expr, expected: Option<&TypeSig>) -> String {
        match op {
            UnaryOp::Neg => {
                let literal = matches!(operand.unparen(), Expr::Int { .. } | Expr::Float { .. });
                let ty = self.type_of(operand).or_else(|| expected.cloned());
                let text = self.lower_expr(operand, ty.as_ref());
                let index = self.index;
                let integer = ty.as_ref().is_some_and(|t| index.underlying(t).is_integer());
                if literal || !integer {
                    format!("-{}", atom(text))
                } else {
                    format!("&-{}", atom(text))
                }
            }
            UnaryOp::Pos => self.lower_expr(operand, expected),
            UnaryOp::Not => format!("!{}", atom(self.lower_expr(operand, Some(&TypeSig::Bool)))),
            UnaryOp::BitNot => {
                let ty = self.type_of(operand).or_else(|| expected.cloned());
                format!("~{}", atom(self.lower_expr(operand, ty.as_ref())))
            }
            UnaryOp::Deref => {
                let text = self.lower_expr(operand, None);
                format!("{}.not_nil!", atom(text))
            }
            UnaryOp::Addr => {
                if !matches!(operand.unparen(), Expr::Composite { .. }) {
                    self.lossy(format!(
                        "`{}` takes an address; the value is copied instead",
                        source_text(operand)
                    ));
                } else {
                    self.degrade(portage_model::Confidence::IdiomaticEquivalent);
                }
                let inner = match expected {
                    Some(TypeSig::Optional { inner }) => Some(inner.as_ref()),
                    other => other,
                };
                self.lower_expr(operand, inner)
            }
            UnaryOp::Recv => self.unsupported_expr("channel receive", &source_text(operand)),
        }
    }

    // ------------------------------------------------------------------- calls

    fn lower_call(
        &mut self,
        func: &Expr,
        args: &[Expr],
        spread: bool,
        expected: Option<&TypeSig>,
    ) -> String {
        let call_text = || {
            source_text(&Expr::Call {
                func: Box::new(func.clone()),
                args: args.to_vec(),
                spread,
            })
        };
        match func.unparen() {
            Expr::Type { ty } => match args {
                [arg] => self.lower_conversion(ty, arg),
                _ => self.unsupported_expr("conversion", &call_text()),
            },
            Expr::Ident { name } if self.local(name).is_none() && !self.is_receiver(name) => {
                let index = self.index;
                if BUILTINS.contains(&name.as_str()) && !index.funcs.contains_key(name) {
                    return self.lower_builtin(name, args, spread, expected, &call_text());
                }
                if let Some(ty) = TypeSig::from_basic_name(name) {
                    return match args {
                        [arg] => self.lower_conversion(&ty, arg),
                        _ => self.unsupported_expr("conversion", &call_text()),
                    };
                }
                if index.types.contains_key(name) {
                    return match args {
                        [arg] => self.lower_conversion(&TypeSig::named(name.clone()), arg),
                        _ => self.unsupported_expr("conversion", &call_text()),
                    };
                }
                if let Some(info) = index.funcs.get(name) {
                    if spread {
                        return self.unsupported_expr("spread arguments", &call_text());
                    }
                    let args = self.lower_args(args, &info.params);
                    let target = if self.receiver.is_some() {
                        format!("{}.{}", self.module(), naming::local_name(name))
                    } else {
                        naming::local_name(name)
                    };
                    return call(&target, &args);
                }
                self.unsupported_expr("call to unknown function", &call_text())
            }
            Expr::Selector { operand, field } => {
                if let Some((pkg, symbol)) = func.unparen().qualified_name()
                    && self.is_package(pkg)
                {
                    if spread {
                        return self.unsupported_expr("spread arguments", &call_text());
                    }
                    return self.lower_symbol(pkg, symbol, args, &call_text());
                }
                if spread {
                    return self.unsupported_expr("spread arguments", &call_text());
                }
                let owner = self.type_of(operand);
                let index = self.index;
                let params: Vec<Param> = owner
                    .as_ref()
                    .and_then(|o| index.method(o, field))
                    .map(|m| m.params.clone())
                    .unwrap_or_default();
                let receiver = self.lower_receiver(operand, owner.as_ref());
                let args = self.lower_args(args, &params);
                call(&format!("{receiver}.{}", naming::local_name(field)), &args)
            }
            other => {
                if spread {
                    return self.unsupported_expr("spread arguments", &call_text());
                }
                let params = match self.type_of(other) {
                    Some(TypeSig::Func { params, .. }) => params,
                    _ => Vec::new(),
                };
                let params: Vec<Param> = params
                    .into_iter()
                    .map(|ty| Param {
                        name: None,
                        ty,
                        variadic: false,
                    })
                    .collect();
                let target = atom(self.lower_expr(other, None));
                let args = self.lower_args(args, &params);
                format!("{target}.call({})", args.join(", "))
            }
        }
    }

    /// A method receiver: `self`, a value, or an unwrapped pointer.
    fn lower_receiver(&mut self, operand: &Expr, owner: Option<&TypeSig>) -> String {
        let text = atom(self.lower_expr(operand, None));
        match owner {
            Some(TypeSig::Optional { .. }) if text != "self" => format!("{text}.not_nil!"),
            _ => text,
        }
    }

    fn lower_args(&mut self, args: &[Expr], params: &[Param]) -> Vec<String> {
        args.iter()
            .enumerate()
            .map(|(i, arg)| {
                let param = params.get(i).or_else(|| params.last().filter(|p| p.variadic));
                let ty = param.map(|p| p.ty.clone());
                self.lower_expr(arg, ty.as_ref())
            })
            .collect()
    }

    fn lower_symbol(&mut self, pkg: &str, symbol: &str, args: &[Expr], text: &str) -> String {
        let index = self.index;
        let table = self.table;
        let path = index.import_path(pkg).unwrap_or(pkg);
        let qualified = format!("{path}.{symbol}");
        let Some(rule) = table.symbol(&qualified) else {
            return self.unsupported_expr("external symbol", text);
        };
        let what = format!("`{qualified}`");
        self.apply(rule.confidence, &what, rule.note.as_deref());
        let mut lowered: Vec<String> = args.iter().map(|a| self.lower_expr(a, None)).collect();
        // Positional placeholders become method receivers, so keep them atomic.
        for arg in &mut lowered {
            *arg = atom(std::mem::take(arg));
        }
        let all = lowered.join(", ");
        let rest = lowered.get(1..).map(|r| r.join(", ")).unwrap_or_default();
        rule.template.render(|name| match name {
            "args" => Some(all.as_str()),
            "rest" => Some(rest.as_str()),
            n => n.parse::<usize>().ok().and_then(|i| lowered.get(i)).map(String::as_str),
        })
    }

    fn lower_selector(&mut self, expr: &Expr, operand: &Expr, field: &str) -> String {
        if let Some((pkg, symbol)) = expr.qualified_name()
            && self.is_package(pkg)
        {
            return self.lower_symbol(pkg, symbol, &[], &source_text(expr));
        }
        if let Expr::Ident { name } = operand.unparen()
            && self.is_receiver(name)
        {
            return format!("@{}", naming::local_name(field));
        }
        let owner = self.type_of(operand);
        let index = self.index;
        if let Some(owner_ty) = &owner
            && index.method(owner_ty, field).is_some()
            && index.field_type(owner_ty, field).is_none()
        {
            return self.unsupported_expr("method value", &source_text(expr));
        }
        let receiver = self.lower_receiver(operand, owner.as_ref());
        format!("{receiver}.{}", naming::local_name(field))
    }

    fn lower_index_expr(&mut self, operand: &Expr, key: &Expr) -> String {
        let index = self.index;
        let owner = self.type_of(operand);
        let target = atom(self.lower_expr(operand, None));
        match owner.as_ref().map(|t| index.underlying(t)) {
            Some(TypeSig::Map { key: key_ty, value }) => {
                let key = self.lower_expr(key, Some(key_ty));
                let zero = self.zero_value(value);
                format!("{target}.fetch({key}, {zero})")
            }
            Some(TypeSig::String) => {
                let i = self.lower_count(key);
                format!("{target}.byte_at({i})")
            }
            _ => {
                let i = self.lower_count(key);
                format!("{target}[{i}]")
            }
        }
    }

    /// An assignable place: indexes and fields without read defaults.
    pub(super) fn lower_place(&mut self, expr: &Expr) -> String {
        match expr.unparen() {
            Expr::Index { operand, index } => {
                let owner = self.type_of(operand);
                let target = atom(self.lower_expr(operand, None));
                let idx = self.index;
                match owner.as_ref().map(|t| idx.underlying(t)) {
                    Some(TypeSig::Map { key, .. }) => {
                        let key = self.lower_expr(index, Some(key));
                        format!("{target}[{key}]")
                    }
                    _ => {
                        let i = self.lower_count(index);
                        format!("{target}[{i}]")
                    }
                }
            }
            Expr::Unary {
                op: UnaryOp::Deref,
                operand,
            } => self.unsupported_expr("assignment through a pointer", &source_text(operand)),
            other => self.lower_expr(other, None),
        }
    }

    fn lower_slice(&mut self, operand: &Expr, low: Option<&Expr>, high: Option<&Expr>) -> String {
        let index = self.index;
        let owner = self.type_of(operand);
        let target = atom(self.lower_expr(operand, None));
        let lo = low.map(|l| self.lower_count(l));
        let hi = high.map(|h| self.lower_count(h));
        match owner.as_ref().map(|t| index.underlying(t)) {
            Some(TypeSig::String) => match (lo, hi) {
                (None, None) => target,
                (Some(lo), None) => format!("{target}.byte_slice({lo})"),
                (None, Some(hi)) => {
                    self.lossy(SLICE_END_CLAMPED);
                    format!("{target}.byte_slice(0, {hi})")
                }
                (Some(lo), Some(hi)) => {
                    self.lossy(SLICE_END_CLAMPED);
                    format!("{target}.byte_slice({lo}, {} - {})", atom(hi), atom(lo.clone()))
                }
            },
            other => {
                let base = match other {
                    Some(TypeSig::Array { .. }) => format!("{target}.to_slice"),
                    Some(TypeSig::Slice { growable: true, .. }) => {
                        self.degrade(portage_model::Confidence::IdiomaticEquivalent);
                        target
                    }
                    _ => target,
                };
                match (lo, hi) {
                    (None, None) => base,
                    (Some(lo), None) => format!("{base}[{lo}..]"),
                    (None, Some(hi)) => format!("{base}[...{hi}]"),
                    (Some(lo), Some(hi)) => format!("{base}[{lo}...{hi}]"),
                }
            }
        }
    }

    // ------------------------------------------------------------ conversions

    fn lower_conversion(&mut self, target: &TypeSig, arg: &Expr) -> String {
        let index = self.index;
        let to = index.underlying(target);
        let untyped = matches!(
            arg.unparen(),
            Expr::Int { .. } | Expr::Float { .. } | Expr::Rune { .. }
        ) || matches!(arg.unparen(), Expr::Unary { op: UnaryOp::Neg, operand } if matches!(operand.unparen(), Expr::Int { .. } | Expr::Float { .. }));
        if untyped && to.is_numeric() {
            return self.lower_expr(arg, Some(target));
        }
        let from = self.type_of(arg);
        let from_under = from.as_ref().map(|f| index.underlying(f).clone());
        let value = self.lower_expr(arg, from.as_ref().or(Some(target)));
        if from_under.as_ref() == Some(to) {
            return value;
        }
        match to {
            TypeSig::Int { width, signed } => {
                let bits = width.bits().unwrap_or(64);
                let prefix = if *signed { "i" } else { "u" };
                format!("{}.to_{prefix}{bits}!", atom(value))
            }
            TypeSig::Float { bits } => format!("{}.to_f{bits}", atom(value)),
            TypeSig::String => match from_under {
                Some(TypeSig::Int { .. }) => format!("{}.chr.to_s", atom(value)),
                Some(TypeSig::Slice {
                    elem,
                    growable: false,
                }) if *elem == TypeSig::int(IntWidth::W8, false) => {
                    format!("String.new({value})")
                }
                Some(TypeSig::Slice { elem, .. })
                    if *elem == TypeSig::int(IntWidth::W8, false) =>
                {
                    let v = atom(value);
                    format!("String.new({v}.to_unsafe, {v}.size)")
                }
                Some(TypeSig::Slice { elem, .. }) if *elem == TypeSig::int(IntWidth::W32, true) => {
                    format!("{}.map(&.chr).join", atom(value))
                }
                _ => {
                    self.degrade(portage_model::Confidence::IdiomaticEquivalent);
                    value
                }
            },
            TypeSig::Slice { elem, growable } if from_under == Some(TypeSig::String) => {
                let v = atom(value);
                match (&**elem, *growable) {
                    (TypeSig::Int { width: IntWidth::W8, signed: false }, true) => {
                        format!("{v}.bytes")
                    }
                    (TypeSig::Int { width: IntWidth::W8, signed: false }, false) => {
                        format!("{v}.to_slice.dup")
                    }
                    (TypeSig::Int { width: IntWidth::W32, signed: true }, true) => {
                        format!("{v}.chars.map(&.ord)")
                    }
                    (TypeSig::Int { width: IntWidth::W32, signed: true }, false) => format!(
                        "{v}.chars.map(&.ord).try {{ |runes| Slice.new(runes.size) {{ |i| runes[i] }} }}"
                    ),
                    _ => self.unsupported_expr("conversion", &source_text(arg)),
                }
            }
            _ => {
                self.degrade(portage_model::Confidence::IdiomaticEquivalent);
                value
            }
        }
    }

    // ---------------------------------------------------------------- builtins

    fn lower_builtin(
        &mut self,
        name: &str,
        args: &[Expr],
        spread: bool,
        expected: Option<&TypeSig>,
        text: &str,
    ) -> String {
        let index = self.index;
        match (name, args) {
            ("len", [arg]) => {
                let string = match self.type_of(arg) {
                    Some(ty) => *index.underlying(&ty) == TypeSig::String,
                    None => matches!(arg.unparen(), Expr::Str { .. }),
                };
                let value = atom(self.lower_expr(arg, None));
                if string {
                    format!("{value}.bytesize.to_i64")
                } else {
                    format!("{value}.size.to_i64")
                }
            }
            ("cap", [arg]) => {
                self.degrade(portage_model::Confidence::IdiomaticEquivalent);
                format!("{}.size.to_i64", atom(self.lower_expr(arg, None)))
            }
            ("append", [first, rest @ ..]) => {
                let ty = self.type_of(first).or_else(|| expected.cloned());
                let elem = match ty.as_ref().map(|t| index.underlying(t)) {
                    Some(TypeSig::Slice { elem, .. }) => Some(elem.as_ref().clone()),
                    _ => None,
                };
                let base = atom(self.lower_expr(first, ty.as_ref()));
                if rest.is_empty() {
                    return base;
                }
                if spread {
                    let extra = self.spread_source(&rest[0]);
                    return format!("{base}.dup.concat({extra})");
                }
                let items: Vec<String> = rest
                    .iter()
                    .map(|r| self.lower_expr(r, elem.as_ref()))
                    .collect();
                self.degrade(portage_model::Confidence::IdiomaticEquivalent);
                format!("{base}.dup.push({})", items.join(", "))
            }
            ("make", [Expr::Type { ty }, sizes @ ..]) => self.lower_make(ty, sizes, text),
            ("new", [Expr::Type { ty }]) => {
                self.degrade(portage_model::Confidence::IdiomaticEquivalent);
                self.zero_value(ty)
            }
            ("delete", [map, key]) => {
                let key_ty = match self.type_of(map).as_ref().map(|t| index.underlying(t)) {
                    Some(TypeSig::Map { key, .. }) => Some(key.as_ref().clone()),
                    _ => None,
                };
                let target = atom(self.lower_expr(map, None));
                let key = self.lower_expr(key, key_ty.as_ref());
                format!("{target}.delete({key})")
            }
            ("panic", [arg]) => {
                let ty = self.type_of(arg);
                let value = self.lower_expr(arg, None);
                match ty.as_ref().map(|t| index.underlying(t)) {
                    Some(TypeSig::String) => format!("raise {value}"),
                    Some(TypeSig::Error) => format!("raise {}.not_nil!", atom(value)),
                    _ => {
                        self.degrade(portage_model::Confidence::IdiomaticEquivalent);
                        format!("raise {}.to_s", atom(value))
                    }
                }
            }
            ("min" | "max", [_, _, ..]) => {
                let ty = args.iter().find_map(|a| self.type_of(a)).or_else(|| expected.cloned());
                let values: Vec<String> = args
                    .iter()
                    .map(|a| self.lower_expr(a, ty.as_ref()))
                    .collect();
                if values.len() == 2 {
                    format!("Math.{name}({})", values.join(", "))
                } else {
                    format!("[{}].{name}", values.join(", "))
                }
            }
            ("min" | "max", [only]) => self.lower_expr(only, expected),
            _ => self.unsupported_expr(&format!("builtin `{name}`"), text),
        }
    }

    /// The spread operand of `append(xs, ys...)`; strings spread as bytes.
    pub(super) fn spread_source(&mut self, expr: &Expr) -> String {
        let index = self.index;
        let string = self
            .type_of(expr)
            .is_some_and(|t| *index.underlying(&t) == TypeSig::String)
            || matches!(expr.unparen(), Expr::Str { .. });
        let value = atom(self.lower_expr(expr, None));
        if string { format!("{value}.bytes") } else { value }
    }

    fn lower_make(&mut self, ty: &TypeSig, sizes: &[Expr], text: &str) -> String {
        let index = self.index;
        match index.underlying(ty) {
            TypeSig::Slice { elem, growable } => {
                let elem_text = self.type_text(elem);
                let len = match sizes.first() {
                    Some(n) => self.lower_count(n),
                    None => return self.unsupported_expr("make without length", text),
                };
                let zero_len = matches!(sizes.first().map(Expr::unparen), Some(Expr::Int { text }) if literal::parse_int(text) == Some(0));
                if *growable {
                    if let (true, Some(cap)) = (zero_len, sizes.get(1)) {
                        let cap = self.lower_count(cap);
                        return format!("Array({elem_text}).new({cap})");
                    }
                    if zero_len {
                        return format!("[] of {elem_text}");
                    }
                    let zero = self.zero_value(elem);
                    return format!("Array({elem_text}).new({len}, {zero})");
                }
                if index.underlying(ty).is_byte_slice() {
                    return format!("Bytes.new({len})");
                }
                let zero = self.zero_value(elem);
                format!("Slice({elem_text}).new({len}, {zero})")
            }
            TypeSig::Map { .. } => self.zero_value(ty),
            _ => self.unsupported_expr("make", text),
        }
    }

    // -------------------------------------------------------------- composites

    fn lower_composite(&mut self, ty: Option<&TypeSig>, elems: &[Element], expr: &Expr) -> String {
        let Some(ty) = ty else {
            return self.unsupported_expr("untyped composite literal", &source_text(expr));
        };
        let index = self.index;
        let under = index.underlying(ty);
        match under {
            TypeSig::Named {
                name,
                package: None,
                ..
            } if index.struct_info(name).is_some() => {
                let fields = index.struct_info(name).map(|i| i.fields()).unwrap_or(&[]);
                let type_text = self.type_text(under);
                let mut args = Vec::new();
                for (i, elem) in elems.iter().enumerate() {
                    let field = match &elem.key {
                        Some(Expr::Ident { name }) => fields.iter().find(|f| &f.name == name),
                        Some(_) => None,
                        None => fields.get(i),
                    };
                    let Some(field) = field else {
                        return self.unsupported_expr("struct literal field", &source_text(expr));
                    };
                    let value = self.lower_expr(&elem.value, Some(&field.ty));
                    args.push(format!("{}: {value}", naming::local_name(&field.name)));
                }
                call(&format!("{type_text}.new"), &args)
            }
            TypeSig::Slice { elem, growable } => {
                let values = match self.positional(elems, elem, None) {
                    Some(values) => values,
                    None => return self.unsupported_expr("keyed slice literal", &source_text(expr)),
                };
                let elem_text = self.type_text(elem);
                if *growable {
                    if values.is_empty() {
                        format!("[] of {elem_text}")
                    } else {
                        format!("[{}] of {elem_text}", values.join(", "))
                    }
                } else if values.is_empty() {
                    self.zero_value(under)
                } else if under.is_byte_slice() {
                    format!("Bytes[{}]", values.join(", "))
                } else {
                    format!("Slice[{}]", values.join(", "))
                }
            }
            TypeSig::Array { elem, len } => {
                let len = if *len == 0 { elems.len() as u64 } else { *len };
                let Some(values) = self.positional(elems, elem, Some(len)) else {
                    return self.unsupported_expr("keyed array literal", &source_text(expr));
                };
                format!("StaticArray[{}]", values.join(", "))
            }
            TypeSig::Map { key, value } => {
                let key_text = self.type_text(key);
                let value_text = self.type_text(value);
                let mut pairs = Vec::new();
                for elem in elems {
                    let Some(k) = &elem.key else {
                        return self.unsupported_expr("map literal without keys", &source_text(expr));
                    };
                    let k = self.lower_expr(k, Some(key));
                    let v = self.lower_expr(&elem.value, Some(value));
                    pairs.push(format!("{k} => {v}"));
                }
                format!("{{{}}} of {key_text} => {value_text}", pairs.join(", "))
            }
            _ => self.unsupported_expr("composite literal", &source_text(expr)),
        }
    }

    /// Element values in index order; keys must fold to integer positions.
    /// `pad_to` fills the remaining positions with zero values.
    fn positional(
        &mut self,
        elems: &[Element],
        elem_ty: &TypeSig,
        pad_to: Option<u64>,
    ) -> Option<Vec<String>> {
        let mut slots: Vec<Option<String>> = Vec::new();
        let mut next = 0usize;
        for elem in elems {
            if let Some(key) = &elem.key {
                let Expr::Int { text } = key.unparen() else {
                    return None;
                };
                next = usize::try_from(literal::parse_int(text)?).ok()?;
            }
            let value = self.lower_expr(&elem.value, Some(elem_ty));
            if slots.len() <= next {
                slots.resize(next + 1, None);
            }
            slots[next] = Some(value);
            next += 1;
        }
        let total = pad_to.map_or(slots.len(), |n| n as usize).max(slots.len());
        let mut out = Vec::with_capacity(total);
        for i in 0..total {
            match slots.get(i).cloned().flatten() {
                Some(v) => out.push(v),
                None => out.push(self.zero_value(elem_ty)),
            }
        }
        Some(out)
    }

    // ---------------------------------------------------------------- closures

    fn lower_func_lit(&mut self, params: &[Param], result: &TypeSig, body: &[Stmt]) -> String {
        let list = self.param_list(params);
        let lines = self.capture(|this| this.lower_func_body(params, &[], result.clone(), body));
        let mut text = format!("->{list} {{");
        for line in lines {
            text.push('\n');
            if !line.is_empty() {
                text.push_str("  ");
                text.push_str(&line);
            }
        }
        text.push_str("\n}");
        text
    }
}

fn func_result(sig: &TypeSig) -> Option<TypeSig> {
    match sig {
        TypeSig::Func { result, .. } => Some(result.as_ref().clone()),
        _ => None,
    }
}

fn is_int_literal(expr: &Expr) -> bool {
    match expr.unparen() {
        Expr::Int { .. } | Expr::Rune { .. } => true,
        Expr::Unary { operand, .. } => is_int_literal(operand),
        _ => false,
    }
}

fn call(target: &str, args: &[String]) -> String {
    if args.is_empty() {
        target.to_string()
    } else {
        format!("{target}({})", args.join(", "))
    }
}

/// Whether `ty` is an error union with a diagnostic error.
pub(super) fn raises(ty: Option<&TypeSig>) -> bool {
    matches!(
        ty,
        Some(TypeSig::ErrorUnion {
            failure: Failure::Error,
            ..
        })
    )
}
