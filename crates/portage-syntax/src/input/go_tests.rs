//! Port Go `_test.go` assertions into [`TestCase`]s.
//!
//! Recognized shapes:
//!
//! ```text
//! if got := F(args); got != want { ... }
//! got := F(args); if got != want { ... }
//! if !reflect.DeepEqual(F(args), want) { ... }
//! if !bytes.Equal(got, want) { ... }
//! for _, tt := range tests { ... }   // tests: []struct{...}{ {...}, ... }
//! ```
//!
//! Expected values are captured as written. Assertions whose inputs or
//! expectation are not literals are skipped.

use super::go::extract_go;
use crate::traits::ParseError;
use portage_model::{
    BinaryOp, Construct, Element, Expr, Location, Stmt, StmtKind, TestCase, TypeSig, UnaryOp,
    decode_go_string,
};
use std::collections::HashMap;

/// Builtins never treated as the function under test.
const BUILTINS: &[&str] = &[
    "len", "cap", "append", "make", "new", "copy", "delete", "panic", "string", "min", "max",
];

/// Extract test cases from Go test source.
pub fn port_go_tests(path: &str, source: &str) -> Result<Vec<TestCase>, ParseError> {
    let unit = extract_go(path, source)?;
    let mut cases = Vec::new();
    for node in &unit.nodes {
        let Construct::Function {
            receiver: None,
            body,
            ..
        } = &node.construct
        else {
            continue;
        };
        if !node.name.starts_with("Test") {
            continue;
        }
        let mut porter = Porter::new(&node.name, path);
        porter.scan(body);
        tracing::debug!(test = %node.name, cases = porter.cases.len(), "ported test");
        cases.extend(porter.cases);
    }
    tracing::info!(path, cases = cases.len(), "ported test cases");
    Ok(cases)
}

/// A table of anonymous-struct rows (`tests := []struct{...}{...}`).
#[derive(Clone)]
struct Table {
    fields: Vec<String>,
    rows: Vec<Vec<Element>>,
}

/// The row currently bound to the range variable.
struct Row {
    var: String,
    fields: Vec<String>,
    elems: Vec<Element>,
    label: String,
}

impl Row {
    fn field(&self, name: &str) -> Option<&Expr> {
        let keyed = self.elems.iter().find(|e| {
            e.key
                .as_ref()
                .and_then(|k| k.as_ident())
                .is_some_and(|k| k == name)
        });
        if let Some(elem) = keyed {
            return Some(&elem.value);
        }
        let index = self.fields.iter().position(|f| f == name)?;
        self.elems
            .get(index)
            .filter(|e| e.key.is_none())
            .map(|e| &e.value)
    }
}

struct Porter<'a> {
    test: &'a str,
    path: &'a str,
    bindings: HashMap<String, Expr>,
    tables: HashMap<String, Table>,
    row: Option<Row>,
    plain: usize,
    cases: Vec<TestCase>,
}

impl<'a> Porter<'a> {
    fn new(test: &'a str, path: &'a str) -> Self {
        Self {
            test,
            path,
            bindings: HashMap::new(),
            tables: HashMap::new(),
            row: None,
            plain: 0,
            cases: Vec::new(),
        }
    }

    fn scan(&mut self, body: &[Stmt]) {
        for stmt in body {
            match &stmt.kind {
                StmtKind::Define { names, values } | StmtKind::Var { names, values, .. } => {
                    self.bind(names, values)
                }
                StmtKind::If { init, cond, .. } => {
                    if let Some(init) = init {
                        self.scan(std::slice::from_ref(init.as_ref()));
                    }
                    self.assertion(cond, stmt.line);
                }
                StmtKind::Range {
                    value: Some(var),
                    expr,
                    body,
                    ..
                } => {
                    let table = expr.as_ident().and_then(|name| self.tables.get(name)).cloned();
                    if let Some(table) = table {
                        self.scan_table(var, &table, body);
                    }
                }
                StmtKind::Block { body } => self.scan(body),
                // t.Run("name", func(t *testing.T) { ... })
                StmtKind::Expr {
                    expr: Expr::Call { func, args, .. },
                } if matches!(func.as_ref(), Expr::Selector { field, .. } if field == "Run") => {
                    if let Some(Expr::FuncLit { body, .. }) = args.get(1) {
                        self.scan(body);
                    }
                }
                _ => {}
            }
        }
    }

    fn scan_table(&mut self, var: &str, table: &Table, body: &[Stmt]) {
        for (index, elems) in table.rows.iter().enumerate() {
            let probe = Row {
                var: var.to_string(),
                fields: table.fields.clone(),
                elems: elems.clone(),
                label: String::new(),
            };
            let label = ["name", "desc", "description"]
                .iter()
                .find_map(|f| match probe.field(f) {
                    Some(Expr::Str { text }) => decode_go_string(text),
                    _ => None,
                })
                .map(|name| name.replace(' ', "_"))
                .unwrap_or_else(|| index.to_string());
            self.row = Some(Row { label, ..probe });
            self.scan(body);
        }
        self.row = None;
    }

    fn bind(&mut self, names: &[String], values: &[Expr]) {
        if names.len() != values.len() {
            for name in names {
                self.bindings.remove(name);
            }
            return;
        }
        for (name, value) in names.iter().zip(values) {
            if let Expr::Composite {
                ty: Some(TypeSig::Slice { elem, .. }),
                elems,
            } = value
                && let TypeSig::Struct { fields } = elem.as_ref()
            {
                let rows = elems
                    .iter()
                    .filter_map(|e| match &e.value {
                        Expr::Composite { elems, .. } => Some(elems.clone()),
                        _ => None,
                    })
                    .collect();
                self.tables.insert(
                    name.clone(),
                    Table {
                        fields: fields.iter().map(|f| f.name.clone()).collect(),
                        rows,
                    },
                );
                continue;
            }
            let resolved = self.resolve(value);
            self.bindings.insert(name.clone(), resolved);
        }
    }

    /// Substitute bound locals and row fields.
    fn resolve(&self, expr: &Expr) -> Expr {
        match expr.unparen() {
            Expr::Ident { name } => self
                .bindings
                .get(name)
                .cloned()
                .unwrap_or_else(|| expr.clone()),
            Expr::Selector { operand, field } => {
                if let (Some(row), Some(var)) = (&self.row, operand.as_ident())
                    && row.var == var
                    && let Some(value) = row.field(field)
                {
                    return value.clone();
                }
                expr.clone()
            }
            Expr::Call { func, args, spread } => Expr::Call {
                func: func.clone(),
                args: args.iter().map(|a| self.resolve(a)).collect(),
                spread: *spread,
            },
            _ => expr.clone(),
        }
    }

    fn assertion(&mut self, cond: &Expr, line: usize) {
        let (a, b) = match cond.unparen() {
            Expr::Binary {
                op: BinaryOp::Ne,
                left,
                right,
            } => (left.as_ref(), right.as_ref()),
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => match operand.unparen() {
                Expr::Call { func, args, .. }
                    if matches!(
                        func.qualified_name(),
                        Some(("reflect", "DeepEqual")) | Some(("bytes", "Equal"))
                    ) && args.len() == 2 =>
                {
                    (&args[0], &args[1])
                }
                _ => return,
            },
            _ => return,
        };

        let (a, b) = (self.resolve(a), self.resolve(b));
        let (call, expected) = if under_test(&a).is_some() {
            (a, b)
        } else if under_test(&b).is_some() {
            (b, a)
        } else {
            return;
        };
        let Some((function, inputs)) = under_test(&call) else {
            return;
        };
        if !is_literal(&expected) || !inputs.iter().all(is_literal) {
            tracing::debug!(test = self.test, line, "skipping assertion with non-literal values");
            return;
        }

        let id = match &self.row {
            Some(row) => format!("{}/{}", self.test, row.label),
            None => {
                self.plain += 1;
                if self.plain == 1 {
                    self.test.to_string()
                } else {
                    format!("{}#{}", self.test, self.plain)
                }
            }
        };
        self.cases.push(TestCase {
            id,
            function: function.to_string(),
            inputs: inputs.to_vec(),
            expected,
            location: Location::new(self.path, line, line),
        });
    }
}

/// A call to a package-level function: its name and arguments.
fn under_test(expr: &Expr) -> Option<(&str, &[Expr])> {
    match expr.unparen() {
        Expr::Call {
            func,
            args,
            spread: false,
        } => {
            let name = func.as_ident()?;
            let is_function = !BUILTINS.contains(&name) && TypeSig::from_basic_name(name).is_none();
            is_function.then_some((name, args.as_slice()))
        }
        _ => None,
    }
}

/// Whether `expr` is a self-contained value the verifier can compare.
pub fn is_literal(expr: &Expr) -> bool {
    match expr {
        Expr::Int { .. }
        | Expr::Float { .. }
        | Expr::Rune { .. }
        | Expr::Str { .. }
        | Expr::Bool { .. }
        | Expr::Nil => true,
        Expr::Paren { inner } => is_literal(inner),
        Expr::Unary {
            op: UnaryOp::Neg | UnaryOp::Pos,
            operand,
        } => is_literal(operand),
        Expr::Composite { elems, .. } => elems
            .iter()
            .all(|e| is_literal(&e.value) && e.key.as_ref().is_none_or(is_literal_key)),
        Expr::Call { func, args, .. } => {
            let conversion = match func.as_ref() {
                Expr::Ident { name } => TypeSig::from_basic_name(name).is_some(),
                Expr::Type { .. } => true,
                _ => false,
            };
            conversion && args.len() == 1 && is_literal(&args[0])
        }
        _ => false,
    }
}

fn is_literal_key(key: &Expr) -> bool {
    // Struct field names are identifiers.
    matches!(key, Expr::Ident { .. }) || is_literal(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TESTS: &str = r#"package conv

import (
	"bytes"
	"reflect"
	"testing"
)

func TestAdd(t *testing.T) {
	if got := Add(2, 3); got != 5 {
		t.Errorf("got %d", got)
	}
	got := Add(-1, 1)
	if got != 0 {
		t.Errorf("got %d", got)
	}
}

func TestSplit(t *testing.T) {
	want := []string{"a", "b"}
	if !reflect.DeepEqual(Split("a,b"), want) {
		t.Fail()
	}
}

func TestEncode(t *testing.T) {
	got := Encode("hi")
	if !bytes.Equal(got, []byte{104, 105}) {
		t.Fail()
	}
}

func TestScale(t *testing.T) {
	tests := []struct {
		name string
		in   uint8
		want uint8
	}{
		{"double one", 1, 2},
		{name: "overflow", in: 200, want: 144},
	}
	for _, tt := range tests {
		t.Run(tt.name, func(t *testing.T) {
			if got := Scale(tt.in); got != tt.want {
				t.Errorf("got %d", got)
			}
		})
	}
}

func TestSkipped(t *testing.T) {
	x := compute()
	if got := Add(x, 1); got != 2 {
		t.Fail()
	}
}
"#;

    #[test]
    fn test_ports_recognized_shapes() {
        let cases = port_go_tests("conv_test.go", TESTS).unwrap();
        let ids: Vec<&str> = cases.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "TestAdd",
                "TestAdd#2",
                "TestSplit",
                "TestEncode",
                "TestScale/double_one",
                "TestScale/overflow",
            ]
        );
    }

    #[test]
    fn test_expected_literals_are_verbatim() {
        let cases = port_go_tests("conv_test.go", TESTS).unwrap();
        let add = &cases[0];
        assert_eq!(add.function, "Add");
        assert_eq!(add.inputs, vec![Expr::int("2"), Expr::int("3")]);
        assert_eq!(add.expected, Expr::int("5"));
        assert_eq!(add.location, Location::new("conv_test.go", 10, 10));

        let overflow = &cases[5];
        assert_eq!(overflow.function, "Scale");
        assert_eq!(overflow.inputs, vec![Expr::int("200")]);
        assert_eq!(overflow.expected, Expr::int("144"));
    }

    #[test]
    fn test_negative_input_is_literal() {
        let cases = port_go_tests("conv_test.go", TESTS).unwrap();
        assert!(matches!(
            cases[1].inputs[0],
            Expr::Unary {
                op: UnaryOp::Neg,
                ..
            }
        ));
    }
}
