//! Rule-driven mapping of Go constructs to Crystal.
//!
//! A [`RuleTable`] declares how types, constructs, and library symbols
//! translate. [`map`] selects the most specific rule for every node of a
//! [`TranslationUnit`](portage_model::TranslationUnit), lowers bodies and
//! values, and attaches a confidence plus the findings behind it.
//!
//! ```ignore
//! let table = RuleTable::builtin()?;
//! let mapped = portage_mapping::map(&unit, &table)?;
//! for entry in &mapped.entries {
//!     println!("{} {}", entry.confidence, entry.node.display_name());
//! }
//! ```

mod engine;
mod error;
mod index;
mod lower;
mod naming;
mod pattern;
mod table;
mod template;

pub use engine::{MapOptions, map, map_with, render_value};
pub use error::{AmbiguousMappingError, MappingError, RuleTableError};
pub use index::UnitIndex;
pub use naming::{local_name, module_name, type_name};
pub use pattern::{PatternError, TypePattern};
pub use table::{ConstructRule, RuleTable, Selection, SymbolRule, TypeRule};
pub use template::{Template, TemplateError};
