//! Loading and saving tabular files.

pub mod reader;
pub mod writer;

pub use reader::{parse_file, FileFormat, ParseOptions};
pub use writer::write_file;
