//! Source extraction and target emission for Go → Crystal translation.
//!
//! # Architecture
//!
//! ```text
//! Go source ──input::go──> TranslationUnit        (portage-model)
//! Go tests  ──input::go_tests──> [TestCase]
//! MappedUnit ──output::crystal──> EmittedUnit     (text + target spans)
//! ```
//!
//! Readers and writers are looked up by language through [`registry`], so
//! the pipeline names a language pair instead of concrete types.

pub mod input;
pub mod output;
pub mod registry;
pub mod traits;

pub use registry::{
    reader_for_extension, reader_for_language, readers, register_reader, register_writer,
    writer_for_language, writers,
};
pub use traits::{EmitError, EmittedUnit, ParseError, Reader, TargetSpan, Writer};
