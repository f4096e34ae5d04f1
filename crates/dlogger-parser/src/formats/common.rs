use std::borrow::Cow;
use std::collections::HashMap;

use crate::errors::ParserError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// UTF-8 when valid, otherwise Windows-1252 (what the vendor desktop tools emit).
pub(crate) fn decode_text(contents: &[u8]) -> Cow<'_, str> {
    let contents = contents.strip_prefix(UTF8_BOM).unwrap_or(contents);
    match std::str::from_utf8(contents) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let (decoded, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(contents);
            decoded
        }
    }
}

/// Trims header names, names blank columns `Unnamed: N` and suffixes repeats with `.1`, `.2`, ...
pub(crate) fn normalize_header(
    parser: &'static str,
    row_index: usize,
    names: Vec<String>,
) -> Result<Vec<String>, ParserError> {
    if names.iter().all(|name| name.trim().is_empty()) {
        return Err(ParserError::InvalidHeader {
            parser,
            row_index,
            message: "header row has no column names".to_string(),
        });
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut columns = Vec::with_capacity(names.len());
    for (idx, name) in names.into_iter().enumerate() {
        let trimmed = name.trim();
        let base = if trimmed.is_empty() {
            format!("Unnamed: {idx}")
        } else {
            trimmed.to_string()
        };

        let count = seen.entry(base.clone()).or_insert(0);
        let column = if *count == 0 {
            base
        } else {
            format!("{base}.{count}")
        };
        *count += 1;
        columns.push(column);
    }

    Ok(columns)
}
