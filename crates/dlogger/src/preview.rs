use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, ContentArrangement, Table};
use dlogger_core::{DroppedRow, SummaryStats, VendorProfile};
use polars::prelude::*;

fn styled_table(headers: Vec<Cell>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers);
    table
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label).add_attribute(Attribute::Bold)
}

fn display_value(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(text) => text.to_string(),
        AnyValue::Float64(number) => format!("{number:.2}"),
        other => other.to_string(),
    }
}

fn is_number(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64 | DataType::Float32 | DataType::Int64 | DataType::Int32
    )
}

/// First `limit` rows of the normalized table.
pub fn preview_table(df: &DataFrame, limit: usize) -> PolarsResult<Table> {
    let head = df.head(Some(limit));
    let mut table = styled_table(
        head.get_column_names()
            .iter()
            .map(|name| header_cell(name.as_str()))
            .collect(),
    );

    for row in 0..head.height() {
        let cells = head
            .get_columns()
            .iter()
            .map(|column| {
                let cell = Cell::new(display_value(column.get(row)?));
                Ok(if is_number(column.dtype()) {
                    cell.set_alignment(CellAlignment::Right)
                } else {
                    cell
                })
            })
            .collect::<PolarsResult<Vec<Cell>>>()?;
        table.add_row(cells);
    }

    if df.height() > limit {
        let mut more = vec![Cell::new(format!("… {} more rows", df.height() - limit))];
        more.extend((1..head.width()).map(|_| Cell::new("")));
        table.add_row(more);
    }
    Ok(table)
}

pub fn statistics_table(field: &str, stats: &SummaryStats) -> Table {
    let mut table = styled_table(vec![
        header_cell("Field"),
        header_cell("Min"),
        header_cell("Mean"),
        header_cell("Max"),
        header_cell("Values"),
    ]);
    table.add_row(vec![
        Cell::new(field),
        Cell::new(stats.min_display()).set_alignment(CellAlignment::Right),
        Cell::new(stats.mean_display()).set_alignment(CellAlignment::Right),
        Cell::new(stats.max_display()).set_alignment(CellAlignment::Right),
        Cell::new(stats.count).set_alignment(CellAlignment::Right),
    ]);
    table
}

pub fn dropped_rows_table(rows: &[DroppedRow]) -> Table {
    let mut table = styled_table(vec![header_cell("Row"), header_cell("Reason")]);
    for dropped in rows {
        table.add_row(vec![
            Cell::new(dropped.row).set_alignment(CellAlignment::Right),
            Cell::new(&dropped.reason),
        ]);
    }
    table
}

pub fn vendors_table(profiles: &[VendorProfile]) -> Table {
    let mut table = styled_table(vec![
        header_cell("Id"),
        header_cell("Name"),
        header_cell("Timestamp rule"),
        header_cell("Required columns"),
        header_cell("Primary metrics"),
    ]);
    for profile in profiles {
        table.add_row(vec![
            Cell::new(&profile.id),
            Cell::new(&profile.display_name),
            Cell::new(&profile.timestamp_rule),
            Cell::new(profile.required_columns.join(", ")),
            Cell::new(profile.primary_metrics().join(", ")),
        ]);
    }
    table
}
