//! Target writers.

#[cfg(feature = "write-crystal")]
pub mod crystal;

#[cfg(feature = "write-crystal")]
pub use crystal::{CRYSTAL_WRITER, CrystalWriter, CrystalWriterImpl};
