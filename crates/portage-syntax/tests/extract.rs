//! Reader tests through the registry.
//! Run `cargo insta review` to update snapshots after intentional changes.

use portage_syntax::{reader_for_extension, reader_for_language};

#[test]
fn package_variable_snapshot() {
    let reader = reader_for_extension("go").expect("go reader");
    let unit = reader
        .read("greet.go", "package greet\n\nvar Greeting = \"hi\"\n")
        .expect("parse failed");
    insta::assert_json_snapshot!(unit, @r###"
    {
      "path": "greet.go",
      "package": "greet",
      "imports": [],
      "nodes": [
        {
          "name": "Greeting",
          "construct": "variable",
          "value": {
            "expr": "str",
            "text": "\"hi\""
          },
          "signature": {
            "type": "string"
          },
          "visibility": "exported",
          "location": {
            "file": "greet.go",
            "start_line": 3,
            "end_line": 3
          },
          "type_origin": "default"
        }
      ]
    }
    "###);
}

#[test]
fn parse_failure_names_file_and_line() {
    let reader = reader_for_language("go").expect("go reader");
    let err = reader
        .read("broken.go", "package broken\n\nvar x = \n")
        .unwrap_err();
    assert!(err.to_string().starts_with("broken.go:"));
}
