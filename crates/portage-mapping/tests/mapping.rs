use portage_mapping::{MapOptions, MappingError, RuleTable, map, map_with};
use portage_model::{Confidence, FindingKind, IntWidth, MappedUnit};
use portage_syntax::input::extract_go;

fn map_source(source: &str) -> MappedUnit {
    let unit = extract_go("ascii.go", source).unwrap();
    let table = RuleTable::builtin().unwrap();
    map(&unit, &table).unwrap()
}

#[test]
fn test_byte_constant_is_exact() {
    let mapped = map_source("package ascii\n\nconst NUL byte = 0x00\n");
    let entry = mapped.entry("NUL").unwrap();
    assert_eq!(entry.rendered, "NUL = 0x00_u8");
    assert_eq!(entry.confidence, Confidence::Exact);
    assert_eq!(entry.rule.as_ref().unwrap().id, "const");
    assert!(entry.findings.is_empty());
}

#[test]
fn test_byte_slice_parameter_maps_to_bytes() {
    let mapped = map_source(
        "package ascii\n\nfunc Len(data []byte) int {\n\treturn len(data)\n}\n",
    );
    let entry = mapped.entry("Len").unwrap();
    assert!(
        entry
            .rendered
            .starts_with("def self.len(data : Bytes) : Int64"),
        "{}",
        entry.rendered
    );
    assert!(!entry.rendered.contains("String"));
}

#[test]
fn test_fixed_width_integers_keep_their_width() {
    let mut source = String::from("package ascii\n\n");
    let mut expect = Vec::new();
    for width in IntWidth::FIXED {
        let Some(bits) = width.bits() else {
            unreachable!("fixed widths have a bit count");
        };
        for (go, crystal, suffix) in [("int", "Int", 'i'), ("uint", "UInt", 'u')] {
            let name = format!("{suffix}{bits}");
            source.push_str(&format!("var {name} {go}{bits}\n"));
            expect.push((name.clone(), format!("@@{name} : {crystal}{bits} = 0_{suffix}{bits}")));
        }
    }
    let mapped = map_source(&source);
    assert_eq!(expect.len(), 8);
    for (name, rendered) in expect {
        assert_eq!(mapped.entry(&name).unwrap().rendered, rendered);
    }
}

#[test]
fn test_byte_slice_converts_to_string() {
    let mapped = map_source(
        "package ascii\n\nfunc Text(data []byte) string {\n\treturn string(data)\n}\n",
    );
    let entry = mapped.entry("Text").unwrap();
    assert!(entry.rendered.contains("String.new(data)"), "{}", entry.rendered);
}

#[test]
fn test_byte_slice_variable_is_never_a_string() {
    let mapped = map_source("package ascii\n\nvar buf []byte\n");
    let entry = mapped.entry("buf").unwrap();
    assert_eq!(entry.rendered, "@@buf : Bytes = Bytes.empty");
}

#[test]
fn test_every_node_has_exactly_one_entry() {
    let source = "package ascii\n\n\
        const (\n\tA = iota\n\tB\n)\n\n\
        type Pair struct {\n\tLeft  int\n\tRight int\n}\n\n\
        func (p Pair) Sum() int {\n\treturn p.Left + p.Right\n}\n\n\
        var ch = make(chan int)\n";
    let unit = extract_go("ascii.go", source).unwrap();
    let table = RuleTable::builtin().unwrap();
    let mapped = map(&unit, &table).unwrap();
    assert_eq!(mapped.entries.len(), unit.nodes.len());
    for (entry, node) in mapped.entries.iter().zip(&unit.nodes) {
        assert_eq!(&entry.node, node);
    }
}

#[test]
fn test_every_type_maps_to_a_rule_or_unsupported() {
    let source = "package ascii\n\n\
        import \"strings\"\n\n\
        var c complex128\n\
        var ch chan int\n\
        var f func(int) int\n\
        var sb strings.Builder\n\n\
        func Split(s string) (int, string) {\n\treturn len(s), s\n}\n\n\
        func Id[T any](x T) T {\n\treturn x\n}\n";
    let unit = extract_go("ascii.go", source).unwrap();
    let table = RuleTable::builtin().unwrap();
    let mapped = map(&unit, &table).unwrap();
    assert_eq!(mapped.entries.len(), unit.nodes.len());
    for entry in &mapped.entries {
        if entry.confidence == Confidence::Unsupported {
            assert!(
                entry
                    .findings
                    .iter()
                    .any(|f| f.kind == FindingKind::Unsupported),
                "{} is unsupported without a finding",
                entry.node.name
            );
        } else {
            assert!(entry.rule.is_some(), "{} has no rule", entry.node.name);
        }
    }
    for name in ["c", "ch"] {
        assert_eq!(mapped.entry(name).unwrap().confidence, Confidence::Unsupported);
    }
}

#[test]
fn test_mapping_is_deterministic() {
    let source = "package ascii\n\nconst Max = 1 << 7\n\nfunc Upper(c byte) byte {\n\tif c >= 'a' && c <= 'z' {\n\t\treturn c - 32\n\t}\n\treturn c\n}\n";
    let unit = extract_go("ascii.go", source).unwrap();
    let table = RuleTable::builtin().unwrap();
    let first = map(&unit, &table).unwrap();
    let second = map(&unit, &table).unwrap();
    assert_eq!(first, second);
}

const TIED: &str = r#"
[[construct]]
id = "const-a"
kind = "constant"
pattern = "_"
template = "{{name}} = {{value}}"
confidence = "exact"

[[construct]]
id = "const-b"
kind = "constant"
pattern = "_"
template = "{{name}} = {{value}}"
confidence = "exact"
"#;

#[test]
fn test_tied_rules_fail_in_strict_mode() {
    let unit = extract_go("ascii.go", "package ascii\n\nconst NUL byte = 0\n").unwrap();
    let table = RuleTable::from_toml(TIED, "tied.toml").unwrap();
    let err = map(&unit, &table).unwrap_err();
    let MappingError::Ambiguous(err) = err;
    assert_eq!(err.identifier, "NUL");
    assert_eq!(err.rules, vec!["const-a", "const-b"]);
    assert_eq!(err.location.start_line, 3);
}

#[test]
fn test_tied_rules_become_a_finding_when_lenient() {
    let unit = extract_go("ascii.go", "package ascii\n\nconst NUL byte = 0\n").unwrap();
    let table = RuleTable::from_toml(TIED, "tied.toml").unwrap();
    let mapped = map_with(&unit, &table, MapOptions { lenient: true }).unwrap();
    let entry = mapped.entry("NUL").unwrap();
    assert_eq!(entry.rule.as_ref().unwrap().id, "const-a");
    let finding = entry
        .findings
        .iter()
        .find(|f| f.kind == FindingKind::Ambiguous)
        .unwrap();
    assert_eq!(finding.candidates, vec!["const-a", "const-b"]);
}

#[test]
fn test_missing_rule_is_unsupported_and_located() {
    let unit = extract_go("ascii.go", "package ascii\n\n\nvar Count int\n").unwrap();
    let table = RuleTable::from_toml("", "empty.toml").unwrap();
    let mapped = map(&unit, &table).unwrap();
    let entry = mapped.entry("Count").unwrap();
    assert_eq!(entry.confidence, Confidence::Unsupported);
    assert!(entry.rendered.starts_with('#'));
    let finding = &entry.findings[0];
    assert_eq!(finding.kind, FindingKind::Unsupported);
    assert_eq!(finding.location.file, "ascii.go");
    assert_eq!(finding.location.start_line, 4);
}

#[test]
fn test_signed_division_is_lossy() {
    let mapped = map_source(
        "package ascii\n\nfunc Half(a int8, b int8) int8 {\n\treturn a / b\n}\n\n\
         func Share(a uint8, b uint8) uint8 {\n\treturn a / b\n}\n",
    );
    let half = mapped.entry("Half").unwrap();
    assert!(half.rendered.contains("a.tdiv(b)"), "{}", half.rendered);
    assert_eq!(half.confidence, Confidence::Lossy);
    assert!(
        half.findings
            .iter()
            .any(|f| f.kind == FindingKind::Lossy && f.message.contains("OverflowError"))
    );

    let share = mapped.entry("Share").unwrap();
    assert!(share.rendered.contains("a.tdiv(b)"), "{}", share.rendered);
    assert!(share.findings.iter().all(|f| f.kind != FindingKind::Lossy));
}

#[test]
fn test_bounded_string_slice_is_lossy() {
    let mapped = map_source(
        "package ascii\n\nfunc Mid(s string) string {\n\treturn s[1:3]\n}\n\n\
         func Tail(s string) string {\n\treturn s[1:]\n}\n",
    );
    let mid = mapped.entry("Mid").unwrap();
    assert!(mid.rendered.contains("s.byte_slice(1, 3 - 1)"), "{}", mid.rendered);
    assert_eq!(mid.confidence, Confidence::Lossy);
    assert!(
        mid.findings
            .iter()
            .any(|f| f.kind == FindingKind::Lossy && f.message.contains("clamped"))
    );

    let tail = mapped.entry("Tail").unwrap();
    assert!(tail.rendered.contains("s.byte_slice(1)"), "{}", tail.rendered);
    assert!(tail.findings.iter().all(|f| f.kind != FindingKind::Lossy));
}
