//! Source readers.

#[cfg(feature = "read-go")]
pub mod go;
#[cfg(feature = "read-go")]
pub mod go_tests;

#[cfg(feature = "read-go")]
pub use go::{GO_READER, GoReader, extract_go};
#[cfg(feature = "read-go")]
pub use go_tests::port_go_tests;
