pub mod errors;
pub mod format;
pub mod formats;
pub mod model;
mod registry;

pub use errors::ParserError;
pub use format::detect_format;
pub use model::{FileFormat, RawCell, RawRow, RawTable, SourceFile};
pub use registry::{load_raw_table, load_with_loader, LoaderOptions, RawTableLoader};

#[cfg(test)]
mod tests;
