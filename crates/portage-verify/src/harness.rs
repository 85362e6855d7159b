//! Per-case target programs.
//!
//! A harness reopens the translated module, calls the function under test
//! with the case's inputs, and prints the result as one line of JSON. A
//! raised exception exits with [`RAISED_EXIT`] and a marker on stderr.

use crate::runner::Program;
use portage_mapping::{RuleTable, UnitIndex, local_name, render_value, type_name};
use portage_model::{TestCase, TranslationUnit, TypeDeclKind, TypeSig};
use std::fmt::Write;

/// Name the translated unit is written under next to the harness.
pub const TARGET_FILE: &str = "target.cr";
pub const HARNESS_FILE: &str = "harness.cr";
pub const RAISED_EXIT: i32 = 3;
pub const RAISED_MARKER: &str = "portage: raised ";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HarnessError {
    #[error("`{0}` is not a package function of the translated unit")]
    UnknownFunction(String),
    #[error("`{function}` takes {expected} arguments, the case passes {actual}")]
    Arity {
        function: String,
        expected: usize,
        actual: usize,
    },
    #[error("input {position} of `{function}` has no target rendering")]
    Untranslatable { function: String, position: usize },
}

const DUMPERS: &str = r#"
  def self.dump(json : JSON::Builder, value : Nil)
    json.null
  end

  def self.dump(json : JSON::Builder, value : Bool)
    json.bool(value)
  end

  def self.dump(json : JSON::Builder, value : String)
    json.string(value)
  end

  def self.dump(json : JSON::Builder, value : Char)
    json.number(value.ord)
  end

  def self.dump(json : JSON::Builder, value : Int | Float)
    json.number(value)
  end

  def self.dump(json : JSON::Builder, value : Hash)
    json.object do
      value.each { |k, v| json.field(k.to_s) { dump(json, v) } }
    end
  end

  def self.dump(json : JSON::Builder, value : Indexable)
    json.array do
      value.each { |v| dump(json, v) }
    end
  end
"#;

/// Builds harness programs for the cases of one translated unit.
pub struct Harness<'a> {
    unit: &'a TranslationUnit,
    index: &'a UnitIndex,
    table: &'a RuleTable,
    dumpers: String,
}

impl<'a> Harness<'a> {
    pub fn new(unit: &'a TranslationUnit, index: &'a UnitIndex, table: &'a RuleTable) -> Self {
        let dumpers = struct_dumpers(index);
        Self {
            unit,
            index,
            table,
            dumpers,
        }
    }

    /// Declared result type of `function`.
    pub fn result_type(&self, function: &str) -> Option<&'a TypeSig> {
        match &self.index.funcs.get(function)?.signature {
            TypeSig::Func { result, .. } => Some(&**result),
            _ => None,
        }
    }

    /// The translated unit plus a harness running `case`.
    pub fn program(&self, case: &TestCase, target: &str) -> Result<Program, HarnessError> {
        let call = self.call(case)?;
        let module = &self.index.module;
        let mut text = String::new();
        let _ = writeln!(text, "require \"json\"");
        let _ = writeln!(text, "require \"./{TARGET_FILE}\"");
        let _ = writeln!(text);
        let _ = writeln!(text, "module {module}");
        let _ = writeln!(text, "  def self.__portage_case");
        let _ = writeln!(text, "    {call}");
        let _ = writeln!(text, "  end");
        let _ = writeln!(text, "end");
        let _ = writeln!(text);
        let _ = writeln!(text, "module PortageHarness{DUMPERS}{}end", self.dumpers);
        let _ = writeln!(text);
        let _ = writeln!(text, "begin");
        let _ = writeln!(text, "  result = {module}.__portage_case");
        let _ = writeln!(
            text,
            "  puts(JSON.build {{ |json| PortageHarness.dump(json, result) }})"
        );
        let _ = writeln!(text, "rescue ex");
        let _ = writeln!(
            text,
            "  STDERR.puts(\"{RAISED_MARKER}#{{ex.class}}: #{{ex.message}}\")"
        );
        let _ = writeln!(text, "  exit {RAISED_EXIT}");
        let _ = writeln!(text, "end");
        Ok(Program {
            files: vec![
                (TARGET_FILE.to_string(), target.to_string()),
                (HARNESS_FILE.to_string(), text),
            ],
        })
    }

    fn call(&self, case: &TestCase) -> Result<String, HarnessError> {
        let info = self
            .index
            .funcs
            .get(&case.function)
            .ok_or_else(|| HarnessError::UnknownFunction(case.function.clone()))?;
        let variadic = info.params.last().is_some_and(|p| p.variadic);
        let fixed = info.params.len() - usize::from(variadic);
        if case.inputs.len() < fixed || (!variadic && case.inputs.len() > fixed) {
            return Err(HarnessError::Arity {
                function: case.function.clone(),
                expected: info.params.len(),
                actual: case.inputs.len(),
            });
        }
        let mut args = Vec::with_capacity(case.inputs.len());
        for (position, input) in case.inputs.iter().enumerate() {
            let param = &info.params[position.min(info.params.len() - 1)];
            let rendered = render_value(self.unit, self.table, input, &param.ty).ok_or_else(
                || HarnessError::Untranslatable {
                    function: case.function.clone(),
                    position,
                },
            )?;
            args.push(rendered);
        }
        let name = local_name(&case.function);
        Ok(if args.is_empty() {
            name
        } else {
            format!("{name}({})", args.join(", "))
        })
    }
}

/// `dump` overloads for the unit's non-generic structs, keyed by Go field names.
fn struct_dumpers(index: &UnitIndex) -> String {
    let mut names: Vec<&String> = index
        .types
        .iter()
        .filter(|(_, info)| info.decl == TypeDeclKind::Struct && info.type_params.is_empty())
        .map(|(name, _)| name)
        .collect();
    names.sort();
    let mut out = String::new();
    for name in names {
        let Some(info) = index.struct_info(name) else {
            continue;
        };
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "  def self.dump(json : JSON::Builder, value : {}::{})",
            index.module,
            type_name(name)
        );
        let _ = writeln!(out, "    json.object do");
        for field in info.fields() {
            let _ = writeln!(
                out,
                "      json.field({:?}) {{ dump(json, value.{}) }}",
                field.name,
                local_name(&field.name)
            );
        }
        let _ = writeln!(out, "    end");
        let _ = writeln!(out, "  end");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use portage_model::{Expr, Location};
    use portage_syntax::input::extract_go;

    const SOURCE: &str = "package ascii\n\n\
        type Point struct {\n\tX int\n\tY int\n}\n\n\
        func Upper(c byte) byte {\n\treturn c - 32\n}\n\n\
        func join(parts ...string) string {\n\treturn \"\"\n}\n";

    fn case(function: &str, inputs: Vec<Expr>) -> TestCase {
        TestCase {
            id: format!("Test{function}"),
            function: function.into(),
            inputs,
            expected: Expr::int("0"),
            location: Location::new("ascii_test.go", 1, 1),
        }
    }

    #[test]
    fn test_program_calls_inside_the_module() {
        let unit = extract_go("ascii.go", SOURCE).unwrap();
        let index = UnitIndex::build(&unit);
        let table = RuleTable::builtin().unwrap();
        let harness = Harness::new(&unit, &index, &table);
        let program = harness
            .program(&case("Upper", vec![Expr::Rune { text: "'a'".into() }]), "# target")
            .unwrap();
        assert_eq!(program.entry(), Some(HARNESS_FILE));
        assert_eq!(program.files[0], (TARGET_FILE.to_string(), "# target".to_string()));
        let text = &program.files[1].1;
        assert!(text.contains("module Ascii\n  def self.__portage_case\n    upper("), "{text}");
        assert!(text.contains("value : Ascii::Point"), "{text}");
        assert!(text.contains("json.field(\"X\") { dump(json, value.x) }"), "{text}");
        assert!(text.contains("exit 3"));
    }

    #[test]
    fn test_variadic_and_arity() {
        let unit = extract_go("ascii.go", SOURCE).unwrap();
        let index = UnitIndex::build(&unit);
        let table = RuleTable::builtin().unwrap();
        let harness = Harness::new(&unit, &index, &table);
        let many = case(
            "join",
            vec![Expr::string("\"a\""), Expr::string("\"b\"")],
        );
        let program = harness.program(&many, "").unwrap();
        assert!(program.files[1].1.contains("join(\"a\", \"b\")"));

        let none = case("Upper", vec![]);
        assert_eq!(
            harness.program(&none, ""),
            Err(HarnessError::Arity {
                function: "Upper".into(),
                expected: 1,
                actual: 0
            })
        );
        assert_eq!(
            harness.program(&case("Lower", vec![]), ""),
            Err(HarnessError::UnknownFunction("Lower".into()))
        );
    }
}
