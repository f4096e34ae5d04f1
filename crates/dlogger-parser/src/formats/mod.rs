mod common;
mod delimited;
mod spreadsheet;

pub use delimited::DelimitedTextLoader;
pub use spreadsheet::SpreadsheetLoader;

pub(crate) use common::{decode_text, normalize_header};
