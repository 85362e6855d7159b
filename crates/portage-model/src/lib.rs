//! Construct model for Go → Crystal translation.
//!
//! `portage-model` is the language-neutral intermediate representation shared
//! by every stage of the translator:
//!
//! ```text
//! Source text ──extract──> TranslationUnit ──map──> MappedUnit ──emit──> target text
//!                               (nodes)              (entries)
//! Source tests ──port──> TestCase ──verify──> VerificationResult
//! ```
//!
//! All artifacts are plain values. Each stage borrows its input and produces a
//! new artifact; nothing here is mutated after construction.

pub mod body;
pub mod construct;
pub mod testcase;
pub mod types;
pub mod unit;

pub use body::{
    AssignOp, BinaryOp, Element, Expr, Param, Stmt, StmtKind, SwitchCase, UnaryOp,
    decode_go_rune, decode_go_string, decode_go_string_bytes,
};
pub use construct::{
    Construct, ConstructKind, ConstructNode, Location, Receiver, TypeDeclKind, TypeOrigin,
    TypeParam, Visibility,
};
pub use testcase::{ErrorReason, Side, TestCase, Verdict, VerificationResult};
pub use types::{Failure, Field, IntWidth, MethodSig, TypeSig};
pub use unit::{
    Confidence, Finding, FindingKind, Import, MappedEntry, MappedUnit, MappingRule,
    TranslationUnit,
};
