//! File-level passes over an extracted unit: constant folding, untyped
//! constant typing, and slice growth detection.

use portage_model::{
    BinaryOp, Construct, ConstructNode, Expr, IntWidth, Param, Stmt, StmtKind,
    TranslationUnit, TypeDeclKind, TypeOrigin, TypeSig, UnaryOp, decode_go_rune,
};
use std::collections::{HashMap, HashSet};

/// Parse a Go integer literal (`0x1F`, `0o17`, `017`, `0b1`, `1_000`).
pub fn parse_int_literal(text: &str) -> Option<i128> {
    let digits: String = text.chars().filter(|c| *c != '_').collect();
    let lower = digits.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        return i128::from_str_radix(hex, 16).ok();
    }
    if let Some(oct) = lower.strip_prefix("0o") {
        return i128::from_str_radix(oct, 8).ok();
    }
    if let Some(bin) = lower.strip_prefix("0b") {
        return i128::from_str_radix(bin, 2).ok();
    }
    if lower.len() > 1 && lower.starts_with('0') {
        return i128::from_str_radix(&lower[1..], 8).ok();
    }
    lower.parse().ok()
}

/// Fold an integer constant expression. `consts` holds earlier folded constants.
pub fn fold_int(expr: &Expr, iota: i128, consts: &HashMap<String, i128>) -> Option<i128> {
    match expr {
        Expr::Int { text } => parse_int_literal(text),
        Expr::Rune { text } => decode_go_rune(text).map(i128::from),
        Expr::Iota => Some(iota),
        Expr::Ident { name } => consts.get(name).copied(),
        Expr::Paren { inner } => fold_int(inner, iota, consts),
        Expr::Unary { op, operand } => {
            let v = fold_int(operand, iota, consts)?;
            match op {
                UnaryOp::Neg => v.checked_neg(),
                UnaryOp::Pos => Some(v),
                UnaryOp::BitNot => Some(!v),
                _ => None,
            }
        }
        Expr::Binary { op, left, right } => {
            let l = fold_int(left, iota, consts)?;
            let r = fold_int(right, iota, consts)?;
            match op {
                BinaryOp::Add => l.checked_add(r),
                BinaryOp::Sub => l.checked_sub(r),
                BinaryOp::Mul => l.checked_mul(r),
                BinaryOp::Div => l.checked_div(r),
                BinaryOp::Rem => l.checked_rem(r),
                BinaryOp::BitAnd => Some(l & r),
                BinaryOp::BitOr => Some(l | r),
                BinaryOp::BitXor => Some(l ^ r),
                BinaryOp::AndNot => Some(l & !r),
                BinaryOp::Shl => u32::try_from(r).ok().and_then(|r| l.checked_shl(r)),
                BinaryOp::Shr => u32::try_from(r).ok().and_then(|r| l.checked_shr(r)),
                _ => None,
            }
        }
        // Conversions of constants (`uint8(1 << 3)`).
        Expr::Call { func, args, .. } if args.len() == 1 => {
            let is_conversion = match func.as_ref() {
                Expr::Ident { name } => TypeSig::from_basic_name(name).is_some_and(|t| t.is_integer()),
                Expr::Type { ty } => ty.is_integer(),
                _ => false,
            };
            if is_conversion {
                fold_int(&args[0], iota, consts)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Fold parameter and result lists into a function signature.
pub(super) fn function_signature(params: &[Param], results: &[Param]) -> TypeSig {
    let folded: Vec<(Option<&str>, TypeSig)> = results
        .iter()
        .map(|r| (r.name.as_deref(), r.ty.clone()))
        .collect();
    TypeSig::Func {
        params: params.iter().map(|p| p.ty.clone()).collect(),
        variadic: params.last().is_some_and(|p| p.variadic),
        result: Box::new(TypeSig::from_results(&folded)),
    }
}

fn default_int() -> TypeSig {
    TypeSig::int(IntWidth::Word, true)
}

fn default_rune() -> TypeSig {
    TypeSig::int(IntWidth::W32, true)
}

fn default_float() -> TypeSig {
    TypeSig::Float { bits: 64 }
}

/// Type of a constant declared without one: inherited from typed operands
/// and conversions, otherwise the default type of its literal kind.
pub(super) fn constant_type(
    value: &Expr,
    known: &HashMap<String, (TypeSig, TypeOrigin)>,
) -> (TypeSig, TypeOrigin) {
    match value {
        Expr::Int { .. } | Expr::Iota => (default_int(), TypeOrigin::Default),
        Expr::Float { .. } => (default_float(), TypeOrigin::Default),
        Expr::Imaginary { .. } => (TypeSig::Complex { bits: 128 }, TypeOrigin::Default),
        Expr::Rune { .. } => (default_rune(), TypeOrigin::Default),
        Expr::Str { .. } => (TypeSig::String, TypeOrigin::Default),
        Expr::Bool { .. } => (TypeSig::Bool, TypeOrigin::Default),
        Expr::Ident { name } => known
            .get(name)
            .cloned()
            .unwrap_or((default_int(), TypeOrigin::Default)),
        Expr::Paren { inner } => constant_type(inner, known),
        Expr::Unary { op: UnaryOp::Not, .. } => (TypeSig::Bool, TypeOrigin::Default),
        Expr::Unary { operand, .. } => constant_type(operand, known),
        Expr::Binary { op, left, right } => {
            if op.is_comparison() || op.is_logical() {
                return (TypeSig::Bool, TypeOrigin::Default);
            }
            let l = constant_type(left, known);
            if matches!(op, BinaryOp::Shl | BinaryOp::Shr) {
                return l;
            }
            let r = constant_type(right, known);
            match (l.1, r.1) {
                (TypeOrigin::Default, TypeOrigin::Default) => {
                    // Untyped kinds combine to the later kind: int < rune < float.
                    let rank = |t: &TypeSig| match t {
                        TypeSig::Float { .. } => 2,
                        t if *t == default_rune() => 1,
                        _ => 0,
                    };
                    if rank(&r.0) > rank(&l.0) { r } else { l }
                }
                (TypeOrigin::Default, _) => r,
                _ => l,
            }
        }
        Expr::Call { func, args, .. } => match func.as_ref() {
            Expr::Ident { name } if name == "len" => (default_int(), TypeOrigin::Default),
            Expr::Ident { name } => match TypeSig::from_basic_name(name) {
                Some(ty) => (ty, TypeOrigin::Declared),
                None if args.len() == 1 => (TypeSig::named(name.as_str()), TypeOrigin::Declared),
                None => (default_int(), TypeOrigin::Default),
            },
            Expr::Type { ty } => (ty.clone(), TypeOrigin::Declared),
            _ => (default_int(), TypeOrigin::Default),
        },
        _ => (default_int(), TypeOrigin::Default),
    }
}

/// Type of a variable initializer whose type is evident from its spelling.
pub(super) fn literal_type(value: &Expr) -> Option<TypeSig> {
    match value {
        Expr::Int { .. } => Some(default_int()),
        Expr::Float { .. } => Some(default_float()),
        Expr::Rune { .. } => Some(default_rune()),
        Expr::Str { .. } => Some(TypeSig::String),
        Expr::Bool { .. } => Some(TypeSig::Bool),
        Expr::Composite { ty, .. } => ty.clone(),
        Expr::Paren { inner } => literal_type(inner),
        Expr::Unary {
            op: UnaryOp::Addr,
            operand,
        } => literal_type(operand).map(|inner| TypeSig::Optional {
            inner: Box::new(inner),
        }),
        Expr::Call { func, args, .. } => match func.as_ref() {
            Expr::Ident { name } if name == "make" => match args.first() {
                Some(Expr::Type { ty }) => Some(ty.clone()),
                _ => None,
            },
            Expr::Ident { name } => TypeSig::from_basic_name(name),
            Expr::Type { ty } => Some(ty.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Whether an untyped constant of `default` kind may take `candidate` as its type.
fn compatible(default: &TypeSig, candidate: &TypeSig) -> bool {
    if matches!(candidate, TypeSig::Named { .. }) {
        return true;
    }
    match default {
        TypeSig::Float { .. } => candidate.is_float(),
        TypeSig::Int { .. } if *default == default_rune() => candidate.is_integer(),
        TypeSig::Int { .. } => candidate.is_numeric(),
        TypeSig::String => *candidate == TypeSig::String,
        TypeSig::Bool => *candidate == TypeSig::Bool,
        _ => false,
    }
}

/// Give untyped constants the type of their first typed use in the file.
pub(super) fn resolve_untyped_constants(unit: &mut TranslationUnit) {
    let untyped: HashMap<String, TypeSig> = unit
        .nodes
        .iter()
        .filter(|n| {
            matches!(n.construct, Construct::Constant { .. }) && n.type_origin == TypeOrigin::Default
        })
        .map(|n| (n.name.clone(), n.signature.clone()))
        .collect();
    if untyped.is_empty() {
        return;
    }

    let mut inference = Inference::new(untyped, &unit.nodes);
    for node in &unit.nodes {
        inference.visit_node(node);
    }
    let found = inference.found;

    for node in &mut unit.nodes {
        if let Some(ty) = found.get(&node.name)
            && matches!(node.construct, Construct::Constant { .. })
            && node.type_origin == TypeOrigin::Default
        {
            tracing::debug!(name = %node.name, ty = %ty, "untyped constant resolved by usage");
            node.signature = ty.clone();
            node.type_origin = TypeOrigin::Usage;
        }
    }

    // Constants defined in terms of a resolved constant follow it.
    let mut resolved: HashMap<String, TypeSig> = found;
    for node in &mut unit.nodes {
        let Construct::Constant { value, .. } = &node.construct else {
            continue;
        };
        if node.type_origin != TypeOrigin::Default {
            continue;
        }
        let mut inherited = None;
        value.walk_idents(&mut |name| {
            if inherited.is_none() {
                inherited = resolved.get(name).cloned();
            }
        });
        if let Some(ty) = inherited.filter(|ty| compatible(&node.signature, ty)) {
            node.signature = ty.clone();
            node.type_origin = TypeOrigin::Usage;
            resolved.insert(node.name.clone(), ty);
        }
    }
}

/// Usage-context scan for untyped constants, in source order.
struct Inference {
    untyped: HashMap<String, TypeSig>,
    globals: HashMap<String, TypeSig>,
    functions: HashMap<String, TypeSig>,
    found: HashMap<String, TypeSig>,
}

impl Inference {
    fn new(untyped: HashMap<String, TypeSig>, nodes: &[ConstructNode]) -> Self {
        let mut globals = HashMap::new();
        let mut functions = HashMap::new();
        for node in nodes {
            match &node.construct {
                Construct::Constant { .. } | Construct::Variable { .. }
                    if node.type_origin == TypeOrigin::Declared =>
                {
                    globals.insert(node.name.clone(), node.signature.clone());
                }
                Construct::Function { receiver: None, .. } => {
                    functions.insert(node.name.clone(), node.signature.clone());
                }
                _ => {}
            }
        }
        Self {
            untyped,
            globals,
            functions,
            found: HashMap::new(),
        }
    }

    fn visit_node(&mut self, node: &ConstructNode) {
        let env = HashMap::new();
        match &node.construct {
            Construct::Constant { value, .. } | Construct::Variable { value: Some(value) } => {
                if node.type_origin == TypeOrigin::Declared {
                    self.expect(value, &node.signature);
                }
                self.visit_expr(value, &env);
            }
            Construct::Function {
                params, body, ..
            } => {
                let mut env: HashMap<String, TypeSig> = params
                    .iter()
                    .filter_map(|p| {
                        let ty = if p.variadic {
                            TypeSig::slice(p.ty.clone())
                        } else {
                            p.ty.clone()
                        };
                        p.name.clone().map(|name| (name, ty))
                    })
                    .collect();
                let result = match &node.signature {
                    TypeSig::Func { result, .. } => (**result).clone(),
                    _ => TypeSig::Unit,
                };
                for stmt in body {
                    self.visit_stmt(stmt, &mut env, &result);
                }
            }
            _ => {}
        }
    }

    fn note(&mut self, name: &str, ty: &TypeSig) {
        let Some(default) = self.untyped.get(name) else {
            return;
        };
        if !self.found.contains_key(name) && compatible(default, ty) {
            self.found.insert(name.to_string(), ty.clone());
        }
    }

    /// `expr` appears where a value of type `ty` is required.
    fn expect(&mut self, expr: &Expr, ty: &TypeSig) {
        match expr {
            Expr::Ident { name } => self.note(name, ty),
            Expr::Paren { inner } => self.expect(inner, ty),
            Expr::Unary { operand, .. } => self.expect(operand, ty),
            Expr::Binary { op, left, right } if !op.is_comparison() && !op.is_logical() => {
                self.expect(left, ty);
                if !matches!(op, BinaryOp::Shl | BinaryOp::Shr) {
                    self.expect(right, ty);
                }
            }
            _ => {}
        }
    }

    fn type_of(&self, expr: &Expr, env: &HashMap<String, TypeSig>) -> Option<TypeSig> {
        match expr {
            Expr::Ident { name } => env
                .get(name)
                .or_else(|| self.globals.get(name))
                .or_else(|| self.found.get(name))
                .cloned(),
            Expr::Paren { inner } => self.type_of(inner, env),
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => Some(TypeSig::Bool),
                UnaryOp::Neg | UnaryOp::Pos | UnaryOp::BitNot => self.type_of(operand, env),
                _ => None,
            },
            Expr::Binary { op, left, right } => {
                if op.is_comparison() || op.is_logical() {
                    Some(TypeSig::Bool)
                } else if matches!(op, BinaryOp::Shl | BinaryOp::Shr) {
                    self.type_of(left, env)
                } else {
                    self.type_of(left, env).or_else(|| self.type_of(right, env))
                }
            }
            Expr::Index { operand, .. } => match self.type_of(operand, env)? {
                TypeSig::Slice { elem, .. } | TypeSig::Array { elem, .. } => Some(*elem),
                TypeSig::Map { value, .. } => Some(*value),
                TypeSig::String => Some(TypeSig::int(IntWidth::W8, false)),
                _ => None,
            },
            Expr::Call { func, .. } => match func.as_ref() {
                Expr::Ident { name } if name == "len" || name == "cap" => Some(default_int()),
                Expr::Ident { name } => {
                    if let Some(ty) = TypeSig::from_basic_name(name) {
                        return Some(ty);
                    }
                    match self.functions.get(name)? {
                        TypeSig::Func { result, .. } => match result.as_ref() {
                            TypeSig::Unit | TypeSig::Tuple { .. } => None,
                            TypeSig::ErrorUnion { value, .. } => Some((**value).clone()),
                            other => Some(other.clone()),
                        },
                        _ => None,
                    }
                }
                Expr::Type { ty } => Some(ty.clone()),
                _ => None,
            },
            Expr::Composite { ty, .. } => ty.clone(),
            _ => None,
        }
    }

    fn visit_expr(&mut self, expr: &Expr, env: &HashMap<String, TypeSig>) {
        let mut contexts: Vec<(&Expr, TypeSig)> = Vec::new();
        expr.walk(&mut |sub| match sub {
            Expr::Binary { op, left, right } => {
                if matches!(op, BinaryOp::Shl | BinaryOp::Shr) || op.is_logical() {
                    return;
                }
                if let Some(ty) = self.type_of(left, env) {
                    contexts.push((right.as_ref(), ty));
                }
                if let Some(ty) = self.type_of(right, env) {
                    contexts.push((left.as_ref(), ty));
                }
            }
            Expr::Call { func, args, .. } => match func.as_ref() {
                Expr::Ident { name } => {
                    if let Some(ty) = TypeSig::from_basic_name(name)
                        && let [arg] = args.as_slice()
                    {
                        contexts.push((arg, ty));
                    } else if let Some(TypeSig::Func {
                        params, variadic, ..
                    }) = self.functions.get(name)
                    {
                        for (i, arg) in args.iter().enumerate() {
                            let param = if *variadic && i + 1 >= params.len() {
                                params.last()
                            } else {
                                params.get(i)
                            };
                            if let Some(param) = param {
                                contexts.push((arg, param.clone()));
                            }
                        }
                    }
                }
                Expr::Type { ty } => {
                    if let [arg] = args.as_slice() {
                        contexts.push((arg, ty.clone()));
                    }
                }
                _ => {}
            },
            _ => {}
        });
        for (expr, ty) in contexts {
            self.expect(expr, &ty);
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt, env: &mut HashMap<String, TypeSig>, result: &TypeSig) {
        match &stmt.kind {
            StmtKind::Var { names, ty, values } => {
                for value in values {
                    self.visit_expr(value, env);
                }
                if let Some(ty) = ty {
                    for value in values {
                        self.expect(value, ty);
                    }
                    for name in names {
                        env.insert(name.clone(), ty.clone());
                    }
                }
            }
            StmtKind::Define { names, values } => {
                for value in values {
                    self.visit_expr(value, env);
                }
                if names.len() == values.len() {
                    for (name, value) in names.iter().zip(values) {
                        if let Some(ty) = self.type_of(value, env) {
                            env.insert(name.clone(), ty);
                        }
                    }
                }
            }
            StmtKind::Assign {
                targets, values, ..
            } => {
                for value in values {
                    self.visit_expr(value, env);
                }
                if targets.len() == values.len() {
                    for (target, value) in targets.iter().zip(values) {
                        if let Some(ty) = self.type_of(target, env) {
                            self.expect(value, &ty);
                        }
                    }
                }
            }
            StmtKind::Return { values } => {
                for value in values {
                    self.visit_expr(value, env);
                }
                match (result, values.as_slice()) {
                    (TypeSig::ErrorUnion { value: ty, .. }, [value, _]) => self.expect(value, ty),
                    (TypeSig::Tuple { items }, values) if items.len() == values.len() => {
                        for (value, ty) in values.iter().zip(items) {
                            self.expect(value, ty);
                        }
                    }
                    (TypeSig::Unit | TypeSig::ErrorUnion { .. } | TypeSig::Tuple { .. }, _) => {}
                    (ty, [value]) => self.expect(value, ty),
                    _ => {}
                }
            }
            _ => {
                let mut exprs = Vec::new();
                direct_exprs(stmt, &mut exprs);
                for expr in exprs {
                    self.visit_expr(expr, env);
                }
                for child in stmt.children() {
                    self.visit_stmt(child, env, result);
                }
            }
        }
    }
}

/// Expressions owned by `stmt` itself, excluding nested statements.
fn direct_exprs<'a>(stmt: &'a Stmt, out: &mut Vec<&'a Expr>) {
    match &stmt.kind {
        StmtKind::Expr { expr } | StmtKind::Defer { call: expr } => out.push(expr),
        StmtKind::IncDec { target, .. } => out.push(target),
        StmtKind::If { cond, .. } => out.push(cond),
        StmtKind::For { cond: Some(cond), .. } => out.push(cond),
        StmtKind::Range { expr, .. } => out.push(expr),
        StmtKind::Switch { tag, cases, .. } => {
            out.extend(tag.iter());
            for case in cases {
                out.extend(case.values.iter());
            }
        }
        _ => {}
    }
}

/// Names that are the first argument of `append`, or assigned its result.
fn appended_names(nodes: &[ConstructNode]) -> HashSet<String> {
    let mut names = HashSet::new();
    let mut scan = |expr: &Expr| {
        expr.walk(&mut |sub| {
            if let Expr::Call { func, args, .. } = sub
                && func.as_ident() == Some("append")
                && let Some(first) = args.first()
                && let Some(name) = target_name(first)
            {
                names.insert(name.to_string());
            }
        });
    };
    for node in nodes {
        match &node.construct {
            Construct::Function { body, .. } => {
                for stmt in body {
                    stmt.walk_exprs(&mut |expr| scan(expr));
                }
            }
            Construct::Variable { value: Some(value) } => scan(value),
            _ => {}
        }
    }

    // `x = append(y, ...)` and `x := append(...)` grow `x` as well.
    fn assigned(stmt: &Stmt, grown: &mut HashSet<String>) {
        let pairs: Vec<(Option<&str>, &Expr)> = match &stmt.kind {
            StmtKind::Assign {
                targets, values, ..
            } => targets.iter().map(target_name).zip(values).collect(),
            StmtKind::Define { names, values } => {
                names.iter().map(|n| Some(n.as_str())).zip(values).collect()
            }
            _ => Vec::new(),
        };
        for (name, value) in pairs {
            if let (Some(name), Expr::Call { func, .. }) = (name, value.unparen())
                && func.as_ident() == Some("append")
            {
                grown.insert(name.to_string());
            }
        }
        for child in stmt.children() {
            assigned(child, grown);
        }
    }
    for node in nodes {
        if let Construct::Function { body, .. } = &node.construct {
            for stmt in body {
                assigned(stmt, &mut names);
            }
        }
    }
    names
}

/// `x` for `x`, field name for `s.x`.
fn target_name(expr: &Expr) -> Option<&str> {
    match expr.unparen() {
        Expr::Ident { name } => Some(name),
        Expr::Selector { field, .. } => Some(field),
        _ => None,
    }
}

fn grow(ty: &mut TypeSig) {
    if let TypeSig::Slice { growable, .. } = ty {
        *growable = true;
    }
}

/// Mark slices that are appended to as growable.
pub(super) fn mark_growable_slices(unit: &mut TranslationUnit) {
    let grown = appended_names(&unit.nodes);
    if grown.is_empty() {
        return;
    }
    tracing::debug!(count = grown.len(), "growable slice names");

    for node in &mut unit.nodes {
        let is_grown = grown.contains(&node.name);
        match &mut node.construct {
            Construct::Function {
                params,
                results,
                body,
                ..
            } => {
                for param in params.iter_mut() {
                    if param.name.as_ref().is_some_and(|n| grown.contains(n)) {
                        grow(&mut param.ty);
                    }
                }
                let returned = returned_names(body, results.len());
                for (i, result) in results.iter_mut().enumerate() {
                    let named = result.name.as_ref().is_some_and(|n| grown.contains(n));
                    let local = returned.get(i).is_some_and(|names| names.iter().any(|n| grown.contains(n)));
                    if named || local {
                        grow(&mut result.ty);
                    }
                }
                visit_stmts_mut(body, &mut |kind| grow_locals(kind, &grown));
                node.signature = function_signature(params, results);
            }
            Construct::Variable { value } => {
                if is_grown {
                    grow(&mut node.signature);
                    if let Some(value) = value {
                        grow_initializer(value);
                    }
                }
            }
            Construct::TypeDecl {
                decl: TypeDeclKind::Struct,
                ..
            } => {
                if let TypeSig::Struct { fields } = &mut node.signature {
                    for field in fields.iter_mut().filter(|f| grown.contains(&f.name)) {
                        grow(&mut field.ty);
                    }
                }
            }
            _ => {}
        }
    }
}

fn grow_initializer(value: &mut Expr) {
    match value {
        Expr::Composite { ty: Some(ty), .. } => grow(ty),
        Expr::Call { func, args, .. } if func.as_ident() == Some("make") => {
            if let Some(Expr::Type { ty }) = args.first_mut() {
                grow(ty);
            }
        }
        _ => {}
    }
}

fn grow_locals(kind: &mut StmtKind, grown: &HashSet<String>) {
    match kind {
        StmtKind::Var { names, ty, values } => {
            for (i, name) in names.iter().enumerate() {
                if !grown.contains(name) {
                    continue;
                }
                if let Some(ty) = ty.as_mut() {
                    grow(ty);
                }
                if let Some(value) = values.get_mut(i) {
                    grow_initializer(value);
                }
            }
        }
        StmtKind::Define { names, values } => {
            for (name, value) in names.iter().zip(values.iter_mut()) {
                if grown.contains(name) {
                    grow_initializer(value);
                }
            }
        }
        _ => {}
    }
}

/// Identifiers returned at each result position.
fn returned_names(body: &[Stmt], arity: usize) -> Vec<Vec<String>> {
    fn collect(stmt: &Stmt, out: &mut Vec<Vec<String>>) {
        if let StmtKind::Return { values } = &stmt.kind
            && values.len() == out.len()
        {
            for (slot, value) in out.iter_mut().zip(values) {
                if let Some(name) = value.unparen().as_ident() {
                    slot.push(name.to_string());
                }
            }
        }
        for child in stmt.children() {
            collect(child, out);
        }
    }
    let mut out = vec![Vec::new(); arity];
    for stmt in body {
        collect(stmt, &mut out);
    }
    out
}

fn visit_stmts_mut(stmts: &mut [Stmt], visit: &mut dyn FnMut(&mut StmtKind)) {
    for stmt in stmts {
        visit(&mut stmt.kind);
        match &mut stmt.kind {
            StmtKind::If {
                init,
                then,
                otherwise,
                ..
            } => {
                if let Some(init) = init {
                    visit_stmts_mut(std::slice::from_mut(init.as_mut()), visit);
                }
                visit_stmts_mut(then, visit);
                if let Some(otherwise) = otherwise {
                    visit_stmts_mut(std::slice::from_mut(otherwise.as_mut()), visit);
                }
            }
            StmtKind::For {
                init, post, body, ..
            } => {
                if let Some(init) = init {
                    visit_stmts_mut(std::slice::from_mut(init.as_mut()), visit);
                }
                visit_stmts_mut(body, visit);
                if let Some(post) = post {
                    visit_stmts_mut(std::slice::from_mut(post.as_mut()), visit);
                }
            }
            StmtKind::Block { body } | StmtKind::Range { body, .. } => visit_stmts_mut(body, visit),
            StmtKind::Switch { init, cases, .. } => {
                if let Some(init) = init {
                    visit_stmts_mut(std::slice::from_mut(init.as_mut()), visit);
                }
                for case in cases {
                    visit_stmts_mut(&mut case.body, visit);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_literal_bases() {
        assert_eq!(parse_int_literal("0x1F"), Some(31));
        assert_eq!(parse_int_literal("0o17"), Some(15));
        assert_eq!(parse_int_literal("017"), Some(15));
        assert_eq!(parse_int_literal("0b101"), Some(5));
        assert_eq!(parse_int_literal("1_000"), Some(1000));
        assert_eq!(parse_int_literal("0"), Some(0));
    }

    #[test]
    fn test_fold_shift_and_iota() {
        let consts = HashMap::from([("KB".to_string(), 1024)]);
        let expr = Expr::binary(Expr::int("1"), BinaryOp::Shl, Expr::Iota);
        assert_eq!(fold_int(&expr, 3, &consts), Some(8));
        let expr = Expr::binary(Expr::ident("KB"), BinaryOp::Mul, Expr::int("4"));
        assert_eq!(fold_int(&expr, 0, &consts), Some(4096));
        let expr = Expr::binary(Expr::int("1"), BinaryOp::Div, Expr::int("0"));
        assert_eq!(fold_int(&expr, 0, &consts), None);
    }

    #[test]
    fn test_constant_type_defaults() {
        let known = HashMap::new();
        assert_eq!(
            constant_type(&Expr::Float { text: "1.5".into() }, &known),
            (default_float(), TypeOrigin::Default)
        );
        let mixed = Expr::binary(Expr::int("1"), BinaryOp::Add, Expr::Float { text: "0.5".into() });
        assert_eq!(constant_type(&mixed, &known).0, default_float());
        let conv = Expr::call(Expr::ident("uint16"), vec![Expr::int("7")]);
        assert_eq!(
            constant_type(&conv, &known),
            (TypeSig::int(IntWidth::W16, false), TypeOrigin::Declared)
        );
    }
}
