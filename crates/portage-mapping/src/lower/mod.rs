//! Lowering of Go bodies, values, and types to Crystal source text.
//!
//! A [`Lowerer`] is created per construct. It resolves types through the rule
//! table, renders statements and expressions, and accumulates the worst
//! confidence seen together with the findings that explain it.

mod expr;
pub(crate) mod literal;
mod stmt;

use crate::error::AmbiguousMappingError;
use crate::index::UnitIndex;
use crate::naming;
use crate::table::{RuleTable, Selection, TypeRule};
use crate::template::Template;
use portage_model::{
    Confidence, ConstructKind, ConstructNode, Finding, FindingKind, Location, MappingRule, Param,
    Receiver, Stmt, TypeDeclKind, TypeSig,
};
use std::collections::HashMap;

/// The construct a lowering belongs to, for findings.
#[derive(Debug, Clone)]
pub(crate) struct Origin {
    pub identifier: String,
    pub kind: ConstructKind,
    pub location: Location,
}

impl Origin {
    pub fn of(node: &ConstructNode) -> Self {
        Self {
            identifier: node.display_name(),
            kind: node.kind(),
            location: node.location.clone(),
        }
    }
}

/// Loop or switch the current statement is nested in.
#[derive(Debug, Clone)]
enum Frame {
    /// Lines re-emitted before `next` (a `for` clause's post statement).
    Loop { post: Vec<String> },
    Switch,
}

/// Result shape of the function being lowered.
#[derive(Debug, Clone)]
struct FuncScope {
    result: TypeSig,
    named: Vec<(String, TypeSig)>,
}

pub(crate) struct Lowerer<'a> {
    table: &'a RuleTable,
    index: &'a UnitIndex,
    lenient: bool,
    origin: Origin,
    confidence: Confidence,
    findings: Vec<Finding>,
    ambiguity: Option<AmbiguousMappingError>,
    /// Some type had no rule, so the rendered text cannot compile.
    broken: bool,
    line_no: Option<usize>,
    scopes: Vec<HashMap<String, TypeSig>>,
    receiver: Option<(String, TypeSig)>,
    funcs: Vec<FuncScope>,
    frames: Vec<Frame>,
    temps: usize,
    out: Vec<String>,
    indent: usize,
}

/// What a lowering produced besides its text.
pub(crate) struct Outcome {
    pub confidence: Confidence,
    pub findings: Vec<Finding>,
    pub ambiguity: Option<AmbiguousMappingError>,
    pub broken: bool,
}

impl<'a> Lowerer<'a> {
    pub fn new(table: &'a RuleTable, index: &'a UnitIndex, origin: Origin, lenient: bool) -> Self {
        Self {
            table,
            index,
            lenient,
            origin,
            confidence: Confidence::Exact,
            findings: Vec::new(),
            ambiguity: None,
            broken: false,
            line_no: None,
            scopes: vec![HashMap::new()],
            receiver: None,
            funcs: Vec::new(),
            frames: Vec::new(),
            temps: 0,
            out: Vec::new(),
            indent: 0,
        }
    }

    pub fn finish(self) -> Outcome {
        Outcome {
            confidence: self.confidence,
            findings: self.findings,
            ambiguity: self.ambiguity,
            broken: self.broken,
        }
    }

    pub fn index(&self) -> &'a UnitIndex {
        self.index
    }

    pub fn module(&self) -> &'a str {
        &self.index.module
    }

    // ---------------------------------------------------------------- findings

    fn location(&self) -> Location {
        match self.line_no {
            Some(line) => self.origin.location.at_line(line),
            None => self.origin.location.clone(),
        }
    }

    pub fn degrade(&mut self, confidence: Confidence) {
        self.confidence = self.confidence.max(confidence);
    }

    fn finding(&mut self, kind: FindingKind, message: String, candidates: Vec<String>) {
        let location = self.location();
        if self
            .findings
            .iter()
            .any(|f| f.kind == kind && f.message == message && f.location == location)
        {
            return;
        }
        tracing::warn!(
            identifier = %self.origin.identifier,
            %location,
            kind = ?kind,
            "{message}"
        );
        self.findings.push(Finding {
            kind,
            construct: self.origin.kind,
            identifier: self.origin.identifier.clone(),
            location,
            message,
            candidates,
        });
    }

    pub fn lossy(&mut self, message: impl Into<String>) {
        self.degrade(Confidence::Lossy);
        self.finding(FindingKind::Lossy, message.into(), Vec::new());
    }

    pub fn unsupported(&mut self, message: impl Into<String>) {
        self.degrade(Confidence::Unsupported);
        self.finding(FindingKind::Unsupported, message.into(), Vec::new());
    }

    /// Account for a rule's confidence tag.
    fn apply(&mut self, confidence: Confidence, what: &str, note: Option<&str>) {
        match confidence {
            Confidence::Exact | Confidence::IdiomaticEquivalent => self.degrade(confidence),
            Confidence::Lossy => self.lossy(match note {
                Some(note) => format!("{what}: {note}"),
                None => what.to_string(),
            }),
            Confidence::Unsupported => self.unsupported(match note {
                Some(note) => format!("{what}: {note}"),
                None => what.to_string(),
            }),
        }
    }

    pub fn adopt_rule(&mut self, rule: &MappingRule) {
        let what = format!("rule `{}`", rule.id);
        self.apply(rule.confidence, &what, rule.note.as_deref());
    }

    /// The construct cannot be translated; its text is kept only as a comment.
    pub fn reject(&mut self, message: impl Into<String>) {
        self.broken = true;
        self.unsupported(message);
    }

    pub fn ambiguous(&mut self, what: String, rules: Vec<String>) {
        let error = AmbiguousMappingError {
            identifier: self.origin.identifier.clone(),
            location: self.location(),
            rules: rules.clone(),
        };
        tracing::debug!(lenient = self.lenient, %error, "ambiguous rules");
        self.finding(
            FindingKind::Ambiguous,
            format!("{what}: rules {} tie; using `{}`", rules.join(", "), rules[0]),
            rules,
        );
        self.ambiguity.get_or_insert(error);
    }

    // ------------------------------------------------------------------- types

    fn type_rule(&mut self, ty: &TypeSig) -> Option<&'a TypeRule> {
        let table = self.table;
        match table.select_type(ty) {
            Selection::None => None,
            Selection::One(rule) => Some(rule),
            Selection::Tie(rules) => {
                let ids = rules.iter().map(|r| r.id.clone()).collect();
                self.ambiguous(format!("type `{ty}`"), ids);
                Some(rules[0])
            }
        }
    }

    fn unsupported_type(&mut self, ty: &TypeSig) {
        self.broken = true;
        self.unsupported(format!("no type rule for `{ty}`"));
    }

    /// Target spelling of `ty`.
    pub fn type_text(&mut self, ty: &TypeSig) -> String {
        match self.type_rule(ty) {
            Some(rule) => {
                let what = format!("type `{ty}`");
                self.apply(rule.confidence, &what, rule.note.as_deref());
                self.render_type(&rule.target, ty)
            }
            None => {
                self.unsupported_type(ty);
                ty.to_string()
            }
        }
    }

    /// Zero value of `ty`.
    pub fn zero_value(&mut self, ty: &TypeSig) -> String {
        let index = self.index;
        if let TypeSig::Named {
            name,
            package: None,
            ..
        } = ty
            && let Some(info) = index.types.get(name)
        {
            match info.decl {
                TypeDeclKind::Alias | TypeDeclKind::Defined => {
                    return self.zero_value(&info.signature);
                }
                TypeDeclKind::Interface => return "nil".to_string(),
                TypeDeclKind::Struct => {}
            }
        }
        match self.type_rule(ty) {
            Some(rule) => match &rule.zero {
                Some(zero) => self.render_type(zero, ty),
                None => {
                    self.lossy(format!("`{ty}` has no zero value; using nil"));
                    "nil".to_string()
                }
            },
            None => {
                self.unsupported_type(ty);
                "nil".to_string()
            }
        }
    }

    /// Suffix that gives a numeric literal the type `ty`.
    pub fn literal_suffix(&mut self, ty: &TypeSig) -> String {
        let index = self.index;
        let ty = index.underlying(ty);
        let Some(rule) = self.type_rule(ty) else {
            return String::new();
        };
        let what = format!("type `{ty}`");
        self.apply(rule.confidence, &what, rule.note.as_deref());
        match &rule.literal_suffix {
            Some(suffix) => self.render_type(suffix, ty),
            None => String::new(),
        }
    }

    fn render_type(&mut self, template: &Template, ty: &TypeSig) -> String {
        let mut vars: Vec<(&str, String)> = Vec::new();
        for name in template.placeholders() {
            if vars.iter().any(|(n, _)| *n == name) {
                continue;
            }
            let value = self.type_var(name, ty);
            vars.push((name, value));
        }
        template.render(|name| {
            vars.iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| v.as_str())
        })
    }

    fn type_var(&mut self, name: &str, ty: &TypeSig) -> String {
        match (name, ty) {
            ("bits", TypeSig::Int { width, .. }) => width.bits().unwrap_or(64).to_string(),
            ("bits", TypeSig::Float { bits } | TypeSig::Complex { bits }) => bits.to_string(),
            (
                "elem",
                TypeSig::Slice { elem, .. } | TypeSig::Array { elem, .. } | TypeSig::Chan { elem },
            ) => self.type_text(elem),
            (
                "elem_zero",
                TypeSig::Slice { elem, .. } | TypeSig::Array { elem, .. } | TypeSig::Chan { elem },
            ) => self.zero_value(elem),
            ("len", TypeSig::Array { len, .. }) => len.to_string(),
            ("key", TypeSig::Map { key, .. }) => self.type_text(key),
            ("value", TypeSig::Map { value, .. } | TypeSig::ErrorUnion { value, .. }) => {
                self.type_text(value)
            }
            ("inner", TypeSig::Optional { inner }) => self.type_text(inner),
            ("name", TypeSig::Named { name, args, .. }) => {
                let base = naming::type_name(name);
                if args.is_empty() {
                    base
                } else {
                    let args: Vec<String> = args.iter().map(|a| self.type_text(a)).collect();
                    format!("{base}({})", args.join(", "))
                }
            }
            ("name", TypeSig::Param { name }) => name.clone(),
            ("args", TypeSig::Named { args, .. }) => {
                let args: Vec<String> = args.iter().map(|a| self.type_text(a)).collect();
                args.join(", ")
            }
            ("items", TypeSig::Tuple { items }) => {
                let items: Vec<String> = items.iter().map(|i| self.type_text(i)).collect();
                items.join(", ")
            }
            ("proc", TypeSig::Func { params, result, .. }) => {
                let mut parts: Vec<String> = params.iter().map(|p| self.type_text(p)).collect();
                parts.push(self.type_text(result));
                parts.join(", ")
            }
            _ => String::new(),
        }
    }

    // ------------------------------------------------------------------ scopes

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn bind(&mut self, name: &str, ty: TypeSig) {
        if name == "_" {
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), ty);
        }
    }

    fn local(&self, name: &str) -> Option<&TypeSig> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn is_receiver(&self, name: &str) -> bool {
        self.local(name).is_none() && self.receiver.as_ref().is_some_and(|(r, _)| r == name)
    }

    fn temp(&mut self) -> String {
        self.temps += 1;
        format!("__tmp{}", self.temps)
    }

    // -------------------------------------------------------------------- code

    fn line(&mut self, text: impl AsRef<str>) {
        for line in text.as_ref().split('\n') {
            if line.trim().is_empty() {
                self.out.push(String::new());
            } else {
                self.out.push(format!("{}{line}", "  ".repeat(self.indent)));
            }
        }
    }

    /// Run `f` against an empty buffer and return what it wrote.
    fn capture(&mut self, f: impl FnOnce(&mut Self)) -> Vec<String> {
        let saved = std::mem::take(&mut self.out);
        let indent = std::mem::replace(&mut self.indent, 0);
        f(self);
        self.indent = indent;
        std::mem::replace(&mut self.out, saved)
    }

    fn indented(&mut self, f: impl FnOnce(&mut Self)) {
        self.indent += 1;
        f(self);
        self.indent -= 1;
    }

    // --------------------------------------------------------------- functions

    /// Lower a function body; returns the body text at indentation zero.
    pub fn lower_function(
        &mut self,
        params: &[Param],
        results: &[Param],
        signature: &TypeSig,
        receiver: Option<&Receiver>,
        body: &[Stmt],
    ) -> String {
        let result = match signature {
            TypeSig::Func { result, .. } => result.as_ref().clone(),
            _ => TypeSig::Unit,
        };
        if let Some(r) = receiver
            && let Some(name) = &r.name
        {
            self.receiver = Some((name.clone(), TypeSig::named(r.type_name.clone())));
        }
        let lines = self.capture(|this| this.lower_func_body(params, results, result, body));
        self.line_no = None;
        lines.join("\n")
    }

    /// Lower a package-level statement outside any function.
    pub fn lower_statement(&mut self, stmt: &Stmt) -> String {
        let lines = self.capture(|this| this.lower_block(std::slice::from_ref(stmt), false));
        self.line_no = None;
        lines.join("\n")
    }

    fn lower_func_body(&mut self, params: &[Param], results: &[Param], result: TypeSig, body: &[Stmt]) {
        self.push_scope();
        for param in params {
            if let Some(name) = &param.name {
                let ty = if param.variadic {
                    TypeSig::slice(param.ty.clone())
                } else {
                    param.ty.clone()
                };
                self.bind(name, ty);
            }
        }
        let named: Vec<(String, TypeSig)> = results
            .iter()
            .filter_map(|r| r.name.clone().map(|n| (n, r.ty.clone())))
            .filter(|(n, _)| n != "_")
            .collect();
        for (name, ty) in &named {
            let zero = self.zero_value(ty);
            self.line(format!("{} = {zero}", naming::local_name(name)));
            self.bind(name, ty.clone());
        }
        self.funcs.push(FuncScope { result, named });
        let frames = std::mem::take(&mut self.frames);
        self.lower_block(body, true);
        self.frames = frames;
        self.funcs.pop();
        self.pop_scope();
    }

    /// Render a parameter list: `(a : Int64, *rest : String)`, or empty.
    pub fn param_list(&mut self, params: &[Param]) -> String {
        if params.is_empty() {
            return String::new();
        }
        let mut parts = Vec::with_capacity(params.len());
        for (i, param) in params.iter().enumerate() {
            let name = match param.name.as_deref() {
                Some(name) if name != "_" => naming::local_name(name),
                _ => format!("_arg{i}"),
            };
            let ty = self.type_text(&param.ty);
            let splat = if param.variadic { "*" } else { "" };
            parts.push(format!("{splat}{name} : {ty}"));
        }
        format!("({})", parts.join(", "))
    }

    /// Render ` : T` for a result type, or empty for no result.
    pub fn return_annotation(&mut self, result: &TypeSig) -> String {
        match result {
            TypeSig::Unit => String::new(),
            other => format!(" : {}", self.type_text(other)),
        }
    }
}
