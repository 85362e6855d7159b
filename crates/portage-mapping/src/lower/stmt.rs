//! Statement lowering.
//!
//! Go's `(value, error)` convention becomes exceptions: a call whose error is
//! immediately returned is lowered to the bare call, and other error checks go
//! through `begin`/`rescue`. `(value, bool)` results become nilable values.

use super::expr::raises;
use super::literal::{atom, source_text};
use super::{Frame, Lowerer};
use crate::naming;
use portage_model::{
    AssignOp, BinaryOp, Confidence, Expr, Failure, IntWidth, Stmt, StmtKind, SwitchCase, TypeSig,
};

/// Left-hand side of an assignment.
struct Target {
    text: String,
    /// Name to bind when the statement declares it.
    name: Option<String>,
    blank: bool,
    /// Static type of an existing target.
    ty: Option<TypeSig>,
}

/// `v, err := f()` whose error is checked right away.
struct CheckedCall<'s> {
    value: Option<String>,
    value_ty: TypeSig,
    call: &'s Expr,
    err: String,
    declare: bool,
}

fn define_targets(names: &[String]) -> Vec<Target> {
    names
        .iter()
        .map(|name| {
            let blank = name == "_";
            Target {
                text: naming::local_name(name),
                name: (!blank).then(|| name.clone()),
                blank,
                ty: None,
            }
        })
        .collect()
}

fn joined(targets: &[Target]) -> String {
    targets
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `err != nil` (or `nil != err`) guarding a lone `return ..., err`.
fn is_error_check(cond: &Expr, then: &[Stmt], err: &str) -> bool {
    let Expr::Binary {
        op: BinaryOp::Ne,
        left,
        right,
    } = cond.unparen()
    else {
        return false;
    };
    let guards = (left.as_ident() == Some(err) && right.unparen().is_nil())
        || (right.as_ident() == Some(err) && left.unparen().is_nil());
    guards
        && matches!(
            then,
            [Stmt { kind: StmtKind::Return { values }, .. }]
                if values.last().and_then(Expr::as_ident) == Some(err)
        )
}

fn without_trailing_break(body: &[Stmt]) -> &[Stmt] {
    match body.split_last() {
        Some((last, rest)) if matches!(last.kind, StmtKind::Break) => rest,
        _ => body,
    }
}

impl<'a> Lowerer<'a> {
    /// Lower a statement list; `top` marks a function body.
    pub(super) fn lower_block(&mut self, stmts: &[Stmt], top: bool) {
        let mut i = 0;
        while i < stmts.len() {
            let stmt = &stmts[i];
            self.line_no = Some(stmt.line);
            if let StmtKind::Defer { call } = &stmt.kind {
                self.lower_defer(call, &stmts[i + 1..], top);
                return;
            }
            if let Some(next) = stmts.get(i + 1)
                && let StmtKind::If {
                    init: None,
                    cond,
                    then,
                    otherwise: None,
                } = &next.kind
                && let Some(checked) = self.checked_call(stmt)
                && is_error_check(cond, then, &checked.err)
            {
                self.emit_checked(checked);
                i += 2;
                continue;
            }
            self.lower_stmt(stmt);
            i += 1;
        }
    }

    /// Lower a nested block in its own scope.
    fn lower_nested(&mut self, body: &[Stmt]) {
        self.push_scope();
        self.lower_block(body, false);
        self.pop_scope();
    }

    pub(super) fn lower_stmt(&mut self, stmt: &Stmt) {
        self.line_no = Some(stmt.line);
        match &stmt.kind {
            StmtKind::Expr { expr } => self.lower_expr_stmt(expr),
            StmtKind::Define { names, values } => self.lower_bindings(define_targets(names), values),
            StmtKind::Var { names, ty, values } => self.lower_var(names, ty.as_ref(), values),
            StmtKind::Assign {
                targets,
                op: AssignOp::Plain,
                values,
            } => self.lower_assign(targets, values),
            StmtKind::Assign {
                targets,
                op: AssignOp::Compound(op),
                values,
            } => match (targets.as_slice(), values.as_slice()) {
                ([target], [value]) => self.lower_compound(target, *op, value),
                _ => self.unsupported_stmt("compound assignment", "multiple operands"),
            },
            StmtKind::IncDec { target, increment } => {
                let op = if *increment {
                    BinaryOp::Add
                } else {
                    BinaryOp::Sub
                };
                self.lower_compound(target, op, &Expr::int("1"));
            }
            StmtKind::Return { values } => self.lower_return(values),
            StmtKind::If {
                init,
                cond,
                then,
                otherwise,
            } => self.lower_if(init.as_deref(), cond, then, otherwise.as_deref()),
            StmtKind::Block { body } => self.lower_nested(body),
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => self.lower_for(init.as_deref(), cond.as_ref(), post.as_deref(), body),
            StmtKind::Range {
                key,
                value,
                expr,
                body,
            } => self.lower_range(key.as_deref(), value.as_deref(), expr, body),
            StmtKind::Switch { init, tag, cases } => {
                self.lower_switch(init.as_deref(), tag.as_ref(), cases)
            }
            StmtKind::Break => match self.frames.last() {
                Some(Frame::Loop { .. }) => self.line("break"),
                Some(Frame::Switch) => self.unsupported_stmt("break out of a switch", "break"),
                None => self.unsupported_stmt("break outside a loop", "break"),
            },
            StmtKind::Continue => {
                let post = self.frames.iter().rev().find_map(|frame| match frame {
                    Frame::Loop { post } => Some(post.clone()),
                    Frame::Switch => None,
                });
                match post {
                    Some(post) => {
                        for line in post {
                            self.line(line);
                        }
                        self.line("next");
                    }
                    None => self.unsupported_stmt("continue outside a loop", "continue"),
                }
            }
            StmtKind::Defer { call } => self.lower_defer(call, &[], false),
            StmtKind::Unsupported { construct, text } => self.unsupported_stmt(construct, text),
        }
    }

    fn unsupported_stmt(&mut self, construct: &str, text: &str) {
        let first = text.lines().next().unwrap_or_default();
        self.line(format!("# portage: unsupported {construct}: {first}"));
        let raise = self.unsupported_expr(construct, first);
        self.line(raise);
    }

    fn lower_expr_stmt(&mut self, expr: &Expr) {
        if raises(self.type_of(expr).as_ref()) {
            self.lossy(format!(
                "ignored error from `{}` now raises",
                source_text(expr)
            ));
        }
        let text = self.lower_expr(expr, None);
        self.line(text);
    }

    // ------------------------------------------------------------------- defer

    /// `defer f()` wraps the rest of the block so that `f` runs on every exit.
    fn lower_defer(&mut self, call: &Expr, rest: &[Stmt], top: bool) {
        if !top {
            self.lossy("deferred call runs when its block exits, not when the function returns");
        }
        if let Expr::Call { args, .. } = call.unparen()
            && !args.is_empty()
        {
            self.lossy(format!(
                "arguments of deferred `{}` are evaluated on exit",
                source_text(call)
            ));
        }
        self.line("begin");
        self.indented(|this| this.lower_block(rest, top));
        self.line("ensure");
        self.indented(|this| match call.unparen() {
            Expr::Call { func, args, .. } if args.is_empty() => match func.unparen() {
                Expr::FuncLit { params, body, .. } if params.is_empty() => this.lower_nested(body),
                _ => this.lower_expr_stmt(call),
            },
            _ => this.lower_expr_stmt(call),
        });
        self.line("end");
    }

    // -------------------------------------------------------------- assignment

    fn bind_target(&mut self, target: &Target, ty: TypeSig) {
        if let Some(name) = &target.name {
            self.bind(name, ty);
        }
    }

    fn lower_var(&mut self, names: &[String], ty: Option<&TypeSig>, values: &[Expr]) {
        let Some(ty) = ty else {
            return self.lower_bindings(define_targets(names), values);
        };
        if !values.is_empty() && values.len() != names.len() {
            return self.lower_bindings(define_targets(names), values);
        }
        for (i, name) in names.iter().enumerate() {
            let value = match values.get(i) {
                Some(v) => self.lower_expr(v, Some(ty)),
                None => self.zero_value(ty),
            };
            if name == "_" {
                if values.get(i).is_some() {
                    self.line(value);
                }
                continue;
            }
            let type_text = self.type_text(ty);
            self.line(format!("{} : {type_text} = {value}", naming::local_name(name)));
            self.bind(name, ty.clone());
        }
    }

    fn lower_assign(&mut self, targets: &[Expr], values: &[Expr]) {
        if let ([target], [value]) = (targets, values)
            && self.lower_append_in_place(target, value)
        {
            return;
        }
        let targets: Vec<Target> = targets
            .iter()
            .map(|t| {
                let blank = t.as_ident() == Some("_");
                Target {
                    text: if blank {
                        "_".to_string()
                    } else {
                        self.lower_place(t)
                    },
                    name: None,
                    blank,
                    ty: self.type_of(t),
                }
            })
            .collect();
        self.lower_bindings(targets, values);
    }

    /// `xs = append(xs, ...)` on a growable slice mutates in place.
    fn lower_append_in_place(&mut self, target: &Expr, value: &Expr) -> bool {
        let Expr::Call { func, args, spread } = value.unparen() else {
            return false;
        };
        if func.as_ident() != Some("append")
            || self.local("append").is_some()
            || self.index.funcs.contains_key("append")
        {
            return false;
        }
        let Some((first, rest)) = args.split_first() else {
            return false;
        };
        if source_text(first) != source_text(target) || rest.is_empty() {
            return false;
        }
        let index = self.index;
        let elem = match self.type_of(target).map(|t| index.underlying(&t).clone()) {
            Some(TypeSig::Slice {
                elem,
                growable: true,
            }) => *elem,
            _ => return false,
        };
        let place = self.lower_place(target);
        if *spread {
            let extra = self.spread_source(&rest[0]);
            self.line(format!("{place}.concat({extra})"));
        } else {
            let items: Vec<String> = rest
                .iter()
                .map(|item| atom(self.lower_expr(item, Some(&elem))))
                .collect();
            self.line(format!("{place} << {}", items.join(" << ")));
        }
        true
    }

    fn lower_bindings(&mut self, targets: Vec<Target>, values: &[Expr]) {
        match values {
            [] => {}
            [value] if targets.len() > 1 => self.lower_destructure(targets, value),
            _ if values.len() == targets.len() => {
                let mut texts = Vec::with_capacity(values.len());
                let mut types = Vec::with_capacity(values.len());
                for (target, value) in targets.iter().zip(values) {
                    let ty = target.ty.clone().or_else(|| self.binding_type(value));
                    texts.push(self.lower_expr(value, ty.as_ref()));
                    types.push(ty);
                }
                if let ([target], [text]) = (targets.as_slice(), texts.as_slice()) {
                    if target.blank {
                        self.line(text);
                    } else {
                        self.line(format!("{} = {text}", target.text));
                    }
                } else {
                    self.line(format!("{} = {}", joined(&targets), texts.join(", ")));
                }
                for (target, ty) in targets.iter().zip(types) {
                    if let Some(ty) = ty {
                        self.bind_target(target, ty);
                    }
                }
            }
            _ => self.unsupported_stmt(
                "assignment",
                &format!("{} targets for {} values", targets.len(), values.len()),
            ),
        }
    }

    /// One multi-valued expression assigned to several targets.
    fn lower_destructure(&mut self, targets: Vec<Target>, value: &Expr) {
        let index = self.index;
        match self.type_of(value) {
            Some(TypeSig::ErrorUnion {
                value: value_ty,
                failure,
            }) => self.lower_union_destructure(&targets, value, &value_ty, failure),
            Some(TypeSig::Tuple { items }) if items.len() == targets.len() => {
                let call = self.lower_expr(value, None);
                self.line(format!("{} = {call}", joined(&targets)));
                for (target, ty) in targets.iter().zip(items) {
                    self.bind_target(target, ty);
                }
            }
            _ => {
                let map = match value.unparen() {
                    Expr::Index { operand, index: key } if targets.len() == 2 => {
                        match self.type_of(operand).map(|t| index.underlying(&t).clone()) {
                            Some(TypeSig::Map {
                                key: key_ty,
                                value: value_ty,
                            }) => Some((operand, key, *key_ty, *value_ty)),
                            _ => None,
                        }
                    }
                    _ => None,
                };
                let Some((operand, key, key_ty, value_ty)) = map else {
                    return self.unsupported_stmt("multi-value assignment", &source_text(value));
                };
                let map_text = atom(self.lower_expr(operand, None));
                let key_text = self.lower_expr(key, Some(&key_ty));
                let (found, ok) = (&targets[0], &targets[1]);
                if !ok.blank {
                    self.line(format!("{} = {map_text}.has_key?({key_text})", ok.text));
                }
                if !found.blank {
                    let zero = self.zero_value(&value_ty);
                    self.line(format!(
                        "{} = {map_text}.fetch({key_text}, {zero})",
                        found.text
                    ));
                }
                self.bind_target(found, value_ty);
                self.bind_target(ok, TypeSig::Bool);
            }
        }
    }

    fn lower_union_destructure(
        &mut self,
        targets: &[Target],
        call: &Expr,
        value_ty: &TypeSig,
        failure: Failure,
    ) {
        let (value, flag) = match (targets, *value_ty == TypeSig::Unit) {
            ([flag], true) => (None, flag),
            ([value, flag], false) => (Some(value), flag),
            _ => return self.unsupported_stmt("multi-value assignment", &source_text(call)),
        };
        let text = self.lower_expr(call, None);
        match failure {
            Failure::Error if flag.blank => {
                self.lossy(format!("ignored error from `{}` now raises", source_text(call)));
                match value {
                    Some(v) if !v.blank => self.line(format!("{} = {text}", v.text)),
                    _ => self.line(text),
                }
            }
            Failure::Error => {
                self.degrade(Confidence::IdiomaticEquivalent);
                match value {
                    Some(v) => {
                        let zero = self.zero_value(value_ty);
                        self.line(format!(
                            "{}, {} = begin\n  {{{text}, nil.as(Exception?)}}\nrescue __ex\n  {{{zero}, __ex.as(Exception?)}}\nend",
                            v.text, flag.text
                        ));
                    }
                    None => self.line(format!(
                        "{} = begin\n  {text}\n  nil.as(Exception?)\nrescue __ex\n  __ex.as(Exception?)\nend",
                        flag.text
                    )),
                }
                self.bind_target(flag, TypeSig::Error);
            }
            Failure::Flag => {
                let tmp = self.temp();
                self.line(format!("{tmp} = {text}"));
                if !flag.blank {
                    self.line(format!("{} = !{tmp}.nil?", flag.text));
                }
                self.bind_target(flag, TypeSig::Bool);
                if let Some(v) = value
                    && !v.blank
                {
                    let zero = self.zero_value(value_ty);
                    self.line(format!("{} = {tmp}.nil? ? {zero} : {tmp}", v.text));
                }
            }
        }
        if let Some(v) = value {
            self.bind_target(v, value_ty.clone());
        }
    }

    fn lower_compound(&mut self, target: &Expr, op: BinaryOp, value: &Expr) {
        let index = self.index;
        let ty = self.type_of(target);
        let integer = ty.as_ref().is_some_and(|t| index.underlying(t).is_integer());
        let map_target = match target.unparen() {
            Expr::Index { operand, .. } => matches!(
                self.type_of(operand).map(|t| index.underlying(&t).clone()),
                Some(TypeSig::Map { .. })
            ),
            _ => false,
        };
        let place = self.lower_place(target);
        if !map_target {
            let assign_op = match op {
                BinaryOp::Add if integer => Some("&+="),
                BinaryOp::Sub if integer => Some("&-="),
                BinaryOp::Mul if integer => Some("&*="),
                BinaryOp::Add => Some("+="),
                BinaryOp::Sub => Some("-="),
                BinaryOp::Mul => Some("*="),
                BinaryOp::Div if !integer => Some("/="),
                BinaryOp::BitAnd => Some("&="),
                BinaryOp::BitOr => Some("|="),
                BinaryOp::BitXor => Some("^="),
                BinaryOp::Shl => Some("<<="),
                BinaryOp::Shr => Some(">>="),
                _ => None,
            };
            if let Some(assign_op) = assign_op {
                let rhs = if matches!(op, BinaryOp::Shl | BinaryOp::Shr) {
                    self.lower_count(value)
                } else {
                    self.lower_expr(value, ty.as_ref())
                };
                self.line(format!("{place} {assign_op} {rhs}"));
                return;
            }
        }
        let combined = Expr::Binary {
            op,
            left: Box::new(target.clone()),
            right: Box::new(value.clone()),
        };
        let rhs = self.lower_expr(&combined, ty.as_ref());
        self.line(format!("{place} = {rhs}"));
    }

    // ----------------------------------------------------------- error checks

    fn returns_error_union(&self) -> bool {
        matches!(
            self.funcs.last().map(|f| &f.result),
            Some(TypeSig::ErrorUnion {
                failure: Failure::Error,
                ..
            })
        )
    }

    fn checked_call<'s>(&self, stmt: &'s Stmt) -> Option<CheckedCall<'s>> {
        if !self.returns_error_union() {
            return None;
        }
        let (names, call, declare) = match &stmt.kind {
            StmtKind::Define { names, values } if values.len() == 1 => {
                (names.clone(), &values[0], true)
            }
            StmtKind::Assign {
                targets,
                op: AssignOp::Plain,
                values,
            } if values.len() == 1 => {
                let names = targets
                    .iter()
                    .map(|t| t.as_ident().map(str::to_string))
                    .collect::<Option<Vec<_>>>()?;
                (names, &values[0], false)
            }
            _ => return None,
        };
        let TypeSig::ErrorUnion {
            value: value_ty,
            failure: Failure::Error,
        } = self.type_of(call)?
        else {
            return None;
        };
        let (value, err) = match (names.as_slice(), *value_ty == TypeSig::Unit) {
            ([err], true) => (None, err.clone()),
            ([value, err], false) => (Some(value.clone()), err.clone()),
            _ => return None,
        };
        if err == "_" {
            return None;
        }
        Some(CheckedCall {
            value,
            value_ty: *value_ty,
            call,
            err,
            declare,
        })
    }

    fn emit_checked(&mut self, checked: CheckedCall<'_>) {
        let text = self.lower_expr(checked.call, None);
        match &checked.value {
            Some(name) if name != "_" => {
                let target = if checked.declare {
                    naming::local_name(name)
                } else {
                    self.lower_place(&Expr::ident(name.clone()))
                };
                self.line(format!("{target} = {text}"));
                if checked.declare {
                    self.bind(name, checked.value_ty);
                }
            }
            _ => self.line(text),
        }
    }

    // ----------------------------------------------------------------- returns

    fn lower_return(&mut self, values: &[Expr]) {
        let Some(scope) = self.funcs.last().cloned() else {
            return self.unsupported_stmt("return outside a function", "return");
        };
        if values.is_empty() {
            if scope.named.is_empty() {
                self.line("return");
                return;
            }
            let named: Vec<Expr> = scope
                .named
                .iter()
                .map(|(name, _)| Expr::ident(name.clone()))
                .collect();
            return self.lower_return(&named);
        }
        match &scope.result {
            TypeSig::ErrorUnion { value, failure } => {
                self.lower_union_return(value, *failure, &scope.result, values)
            }
            TypeSig::Tuple { items } if items.len() == values.len() => {
                let texts: Vec<String> = values
                    .iter()
                    .zip(items)
                    .map(|(v, ty)| self.lower_expr(v, Some(ty)))
                    .collect();
                self.line(format!("return {}", texts.join(", ")));
            }
            TypeSig::Tuple { .. } if values.len() == 1 => {
                let text = self.lower_expr(&values[0], None);
                self.line(format!("return {text}"));
            }
            result if values.len() == 1 => {
                let text = self.lower_expr(&values[0], Some(result));
                self.line(format!("return {text}"));
            }
            _ => self.unsupported_stmt(
                "return",
                &values.iter().map(source_text).collect::<Vec<_>>().join(", "),
            ),
        }
    }

    fn lower_union_return(
        &mut self,
        value_ty: &TypeSig,
        failure: Failure,
        result: &TypeSig,
        values: &[Expr],
    ) {
        if let [single] = values
            && self.type_of(single).as_ref() == Some(result)
        {
            let text = self.lower_expr(single, None);
            self.line(format!("return {text}"));
            return;
        }
        let (value, flag) = match (values, *value_ty == TypeSig::Unit) {
            ([flag], true) => (None, flag),
            ([value, flag], false) => (Some(value), flag),
            _ => {
                let text = values.iter().map(source_text).collect::<Vec<_>>().join(", ");
                return self.unsupported_stmt("return", &text);
            }
        };
        let value_text = value.map(|v| self.lower_expr(v, Some(value_ty)));
        let ret = match &value_text {
            Some(text) => format!("return {text}"),
            None => "return".to_string(),
        };
        match failure {
            Failure::Error => match flag.unparen() {
                Expr::Nil => self.line(ret),
                err => {
                    let err_ty = self.type_of(err);
                    let external = matches!(err, Expr::Call { func, .. }
                        if func.qualified_name().is_some_and(|(pkg, _)| self.local(pkg).is_none() && self.index.imports.contains_key(pkg)));
                    let err_text = self.lower_expr(err, Some(&TypeSig::Error));
                    if raises(err_ty.as_ref()) {
                        self.line(err_text);
                        self.line(ret);
                    } else if external {
                        self.line(format!("raise {err_text}"));
                    } else {
                        self.line(format!("if __ex = {err_text}\n  raise __ex\nend"));
                        self.line(ret);
                    }
                }
            },
            Failure::Flag => match (flag.unparen(), value_text) {
                (Expr::Bool { value: true }, _) => self.line(ret),
                (Expr::Bool { value: false }, _) => self.line("return nil"),
                (_, Some(text)) => {
                    let cond = atom(self.lower_expr(flag, Some(&TypeSig::Bool)));
                    self.line(format!("return {cond} ? {text} : nil"));
                }
                (_, None) => self.unsupported_stmt("return", &source_text(flag)),
            },
        }
    }

    // ------------------------------------------------------------ control flow

    fn lower_if(
        &mut self,
        init: Option<&Stmt>,
        cond: &Expr,
        then: &[Stmt],
        otherwise: Option<&Stmt>,
    ) {
        self.push_scope();
        if let Some(init) = init {
            if let Some(checked) = self.checked_call(init)
                && is_error_check(cond, then, &checked.err)
            {
                self.emit_checked(checked);
                match otherwise.map(|s| (s, &s.kind)) {
                    Some((_, StmtKind::Block { body })) => self.lower_block(body, false),
                    Some((stmt, _)) => self.lower_stmt(stmt),
                    None => {}
                }
                self.pop_scope();
                return;
            }
            self.lower_stmt(init);
        }
        self.lower_if_chain("if", cond, then, otherwise);
        self.line("end");
        self.pop_scope();
    }

    fn lower_if_chain(
        &mut self,
        keyword: &str,
        cond: &Expr,
        then: &[Stmt],
        otherwise: Option<&Stmt>,
    ) {
        let cond_text = self.lower_expr(cond, Some(&TypeSig::Bool));
        self.line(format!("{keyword} {cond_text}"));
        self.indented(|this| this.lower_nested(then));
        let Some(stmt) = otherwise else {
            return;
        };
        match &stmt.kind {
            StmtKind::If {
                init: None,
                cond,
                then,
                otherwise,
            } => {
                self.line_no = Some(stmt.line);
                self.lower_if_chain("elsif", cond, then, otherwise.as_deref());
            }
            StmtKind::Block { body } => {
                self.line("else");
                self.indented(|this| this.lower_nested(body));
            }
            _ => {
                self.line("else");
                self.indented(|this| this.lower_stmt(stmt));
            }
        }
    }

    fn lower_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        post: Option<&Stmt>,
        body: &[Stmt],
    ) {
        self.push_scope();
        if let Some(init) = init {
            self.lower_stmt(init);
        }
        let post_lines = match post {
            Some(post) => self.capture(|this| this.lower_stmt(post)),
            None => Vec::new(),
        };
        match cond {
            Some(cond) => {
                let cond = self.lower_expr(cond, Some(&TypeSig::Bool));
                self.line(format!("while {cond}"));
            }
            None => self.line("loop do"),
        }
        self.frames.push(Frame::Loop {
            post: post_lines.clone(),
        });
        self.indented(|this| {
            this.lower_nested(body);
            for line in &post_lines {
                this.line(line);
            }
        });
        self.frames.pop();
        self.line("end");
        self.pop_scope();
    }

    fn lower_range(&mut self, key: Option<&str>, value: Option<&str>, expr: &Expr, body: &[Stmt]) {
        let key = key.filter(|k| *k != "_");
        let value = value.filter(|v| *v != "_");
        let index = self.index;
        let int = TypeSig::int(IntWidth::Word, true);
        let ty = match expr.unparen() {
            Expr::Int { .. } => Some(int.clone()),
            other => self.type_of(other),
        };
        let under = ty.as_ref().map(|t| index.underlying(t).clone());
        let target = atom(self.lower_expr(expr, ty.as_ref()));
        let k = key.map(naming::local_name);
        let v = value.map(naming::local_name);

        let mut prologue = Vec::new();
        let mut bindings: Vec<(&str, TypeSig)> = Vec::new();
        let header = match &under {
            Some(TypeSig::Int { .. }) => {
                if let Some(key) = key {
                    bindings.push((key, ty.clone().unwrap_or(int.clone())));
                }
                match &k {
                    Some(k) => format!("{target}.times do |{k}|"),
                    None => format!("{target}.times do"),
                }
            }
            Some(TypeSig::Slice { elem, .. } | TypeSig::Array { elem, .. }) => {
                if let Some(key) = key {
                    bindings.push((key, int.clone()));
                }
                if let Some(value) = value {
                    bindings.push((value, *elem.clone()));
                }
                if let Some(k) = &k {
                    prologue.push(format!("{k} = {k}.to_i64"));
                }
                match (&k, &v) {
                    (Some(k), Some(v)) => format!("{target}.each_with_index do |{v}, {k}|"),
                    (Some(k), None) => format!("{target}.each_index do |{k}|"),
                    (None, Some(v)) => format!("{target}.each do |{v}|"),
                    (None, None) => format!("{target}.size.times do"),
                }
            }
            Some(TypeSig::String) => {
                if let Some(key) = key {
                    bindings.push((key, int.clone()));
                }
                if let Some(value) = value {
                    bindings.push((value, TypeSig::int(IntWidth::W32, true)));
                }
                if let Some(v) = &v {
                    prologue.push(format!("{v} = __ch.ord"));
                }
                match &k {
                    Some(k) => {
                        self.lossy("range over a string yields character indexes, not byte offsets");
                        prologue.insert(0, format!("{k} = {k}.to_i64"));
                        format!("{target}.each_char_with_index do |__ch, {k}|")
                    }
                    None => format!("{target}.each_char do |__ch|"),
                }
            }
            Some(TypeSig::Map {
                key: key_ty,
                value: value_ty,
            }) => {
                if let Some(key) = key {
                    bindings.push((key, *key_ty.clone()));
                }
                if let Some(value) = value {
                    bindings.push((value, *value_ty.clone()));
                }
                match (&k, &v) {
                    (Some(k), Some(v)) => format!("{target}.each do |{k}, {v}|"),
                    (Some(k), None) => format!("{target}.each_key do |{k}|"),
                    (None, Some(v)) => format!("{target}.each_value do |{v}|"),
                    (None, None) => format!("{target}.size.times do"),
                }
            }
            _ => {
                return self.unsupported_stmt("range", &source_text(expr));
            }
        };

        self.push_scope();
        for (name, ty) in bindings {
            self.bind(name, ty);
        }
        self.line(header);
        self.frames.push(Frame::Loop { post: Vec::new() });
        self.indented(|this| {
            for line in &prologue {
                this.line(line);
            }
            this.lower_nested(body);
        });
        self.frames.pop();
        self.line("end");
        self.pop_scope();
    }

    fn lower_switch(&mut self, init: Option<&Stmt>, tag: Option<&Expr>, cases: &[SwitchCase]) {
        self.push_scope();
        if let Some(init) = init {
            self.lower_stmt(init);
        }
        let (defaults, matching): (Vec<&SwitchCase>, Vec<&SwitchCase>) =
            cases.iter().partition(|c| c.is_default);

        self.frames.push(Frame::Switch);
        if matching.is_empty() {
            for case in defaults {
                self.lower_nested(without_trailing_break(&case.body));
            }
        } else {
            let tag_ty = tag.and_then(|t| self.binding_type(t));
            match tag {
                Some(tag) => {
                    let text = self.lower_expr(tag, tag_ty.as_ref());
                    self.line(format!("case {text}"));
                }
                None => self.line("case"),
            }
            for case in matching {
                let values: Vec<String> = case
                    .values
                    .iter()
                    .map(|v| match tag {
                        Some(_) => self.lower_expr(v, tag_ty.as_ref()),
                        None => self.lower_expr(v, Some(&TypeSig::Bool)),
                    })
                    .collect();
                let when = match tag {
                    Some(_) => values.join(", "),
                    None => values.join(" || "),
                };
                self.line(format!("when {when}"));
                self.indented(|this| this.lower_nested(without_trailing_break(&case.body)));
            }
            if let Some(default) = defaults.first() {
                self.line("else");
                self.indented(|this| this.lower_nested(without_trailing_break(&default.body)));
            }
            self.line("end");
        }
        self.frames.pop();
        self.pop_scope();
    }
}
