use super::*;
use portage_model::{ConstructKind, IntWidth, StmtKind};

fn extract(source: &str) -> TranslationUnit {
    extract_go("lib.go", source).expect("extract failed")
}

#[test]
fn test_typed_byte_constant() {
    let unit = extract("package ascii\n\nconst NUL byte = 0x00\n");
    assert_eq!(unit.package, "ascii");
    let nul = unit.find("NUL").unwrap();
    assert_eq!(nul.kind(), ConstructKind::Constant);
    assert_eq!(nul.signature, TypeSig::int(IntWidth::W8, false));
    assert_eq!(nul.type_origin, TypeOrigin::Declared);
    assert_eq!(nul.visibility, Visibility::Exported);
    assert_eq!(nul.location, Location::new("lib.go", 3, 3));
    assert_eq!(
        nul.construct,
        Construct::Constant {
            value: Expr::int("0x00"),
            iota: None,
            folded: Some(0),
        }
    );
}

#[test]
fn test_iota_group_repeats_and_folds() {
    let unit = extract(
        r#"package size

const (
	// KB is a kilobyte.
	KB = 1 << (10 * (iota + 1))
	MB
	GB
)
"#,
    );
    let folded: Vec<(String, Option<i128>, Option<u64>)> = unit
        .nodes
        .iter()
        .map(|n| match &n.construct {
            Construct::Constant { iota, folded, .. } => (n.name.clone(), *folded, *iota),
            _ => panic!("expected constant"),
        })
        .collect();
    assert_eq!(
        folded,
        vec![
            ("KB".to_string(), Some(1 << 10), Some(0)),
            ("MB".to_string(), Some(1 << 20), Some(1)),
            ("GB".to_string(), Some(1 << 30), Some(2)),
        ]
    );
    assert_eq!(unit.nodes[0].docs.as_deref(), Some("KB is a kilobyte."));
    assert_eq!(unit.nodes[1].docs, None);
}

#[test]
fn test_untyped_constant_takes_usage_type() {
    let unit = extract(
        r#"package clamp

const Limit = 10

const Ratio = 1.5

func Clamp(x uint16) uint16 {
	if x > Limit {
		return Limit
	}
	return x
}
"#,
    );
    let limit = unit.find("Limit").unwrap();
    assert_eq!(limit.signature, TypeSig::int(IntWidth::W16, false));
    assert_eq!(limit.type_origin, TypeOrigin::Usage);

    let ratio = unit.find("Ratio").unwrap();
    assert_eq!(ratio.signature, TypeSig::Float { bits: 64 });
    assert_eq!(ratio.type_origin, TypeOrigin::Default);
}

#[test]
fn test_error_union_and_flag_results() {
    let unit = extract(
        r#"package parse

func Parse(s string) (int, error) {
	return 0, nil
}

func Lookup(key string) (value string, ok bool) {
	return "", false
}
"#,
    );
    assert_eq!(
        unit.find("Parse").unwrap().signature.to_string(),
        "func(string) -> result<int, error>"
    );
    assert_eq!(
        unit.find("Lookup").unwrap().signature.to_string(),
        "func(string) -> result<string, flag>"
    );
}

#[test]
fn test_generics_and_variadics() {
    let unit = extract(
        r#"package seq

func First[T any](xs ...T) T {
	return xs[0]
}
"#,
    );
    let first = unit.find("First").unwrap();
    let Construct::Function {
        type_params,
        params,
        ..
    } = &first.construct
    else {
        panic!("expected function");
    };
    assert_eq!(type_params.len(), 1);
    assert_eq!(type_params[0].name, "T");
    assert_eq!(params.len(), 1);
    assert!(params[0].variadic);
    assert_eq!(params[0].ty, TypeSig::Param { name: "T".into() });
    assert_eq!(first.signature.to_string(), "func(...param<T>) -> param<T>");
}

#[test]
fn test_appended_slices_are_growable() {
    let unit = extract(
        r#"package collect

func Collect(n int) []int {
	var out []int
	for i := 0; i < n; i++ {
		out = append(out, i)
	}
	return out
}

func Sum(xs []int) int {
	total := 0
	for _, x := range xs {
		total += x
	}
	return total
}
"#,
    );
    assert_eq!(
        unit.find("Collect").unwrap().signature.to_string(),
        "func(int) -> slice<int, grow>"
    );
    assert_eq!(
        unit.find("Sum").unwrap().signature.to_string(),
        "func(slice<int>) -> int"
    );
}

#[test]
fn test_struct_fields_and_methods() {
    let unit = extract(
        r#"package buf

// Buffer accumulates bytes.
type Buffer struct {
	// data holds the contents.
	data []byte
	size int
}

func (b *Buffer) Reset() {
	b.size = 0
}

func (b Buffer) Len() int {
	return b.size
}
"#,
    );
    let buffer = unit.find("Buffer").unwrap();
    assert_eq!(buffer.kind(), ConstructKind::Struct);
    assert_eq!(buffer.docs.as_deref(), Some("Buffer accumulates bytes."));
    let TypeSig::Struct { fields } = &buffer.signature else {
        panic!("expected struct signature");
    };
    assert_eq!(fields[0].name, "data");
    assert!(fields[0].ty.is_byte_slice());
    assert_eq!(fields[0].docs.as_deref(), Some("data holds the contents."));

    let reset = unit.find("Reset").unwrap();
    assert_eq!(reset.kind(), ConstructKind::PointerMethod);
    assert_eq!(reset.display_name(), "Buffer.Reset");
    assert_eq!(unit.find("Len").unwrap().kind(), ConstructKind::Method);
}

#[test]
fn test_unsupported_statements_keep_location() {
    let unit = extract(
        r#"package worker

func Start(f func()) {
	go f()
}
"#,
    );
    let Construct::Function { body, .. } = &unit.find("Start").unwrap().construct else {
        panic!("expected function");
    };
    assert_eq!(body.len(), 1);
    assert_eq!(body[0].line, 4);
    assert!(matches!(
        &body[0].kind,
        StmtKind::Unsupported { construct, text } if construct == "go statement" && text == "go f()"
    ));
}

#[test]
fn test_imports() {
    let unit = extract(
        r#"package text

import (
	"strings"
	enc "encoding/binary"
)
"#,
    );
    assert!(unit.is_package("strings"));
    assert!(unit.is_package("enc"));
    assert_eq!(unit.imports[1].path, "encoding/binary");
}

#[test]
fn test_syntax_error_reports_location() {
    let err = extract_go("bad.go", "package bad\n\nfunc broken( {\n").unwrap_err();
    assert_eq!(err.location.file, "bad.go");
    assert!(err.location.start_line >= 3);
}
