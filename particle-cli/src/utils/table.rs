//! Table formatting utilities

use prettytable::{Cell, Row, Table};

/// Create a table with bold headers
pub fn create_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_format(*prettytable::format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(Row::new(
        headers
            .iter()
            .map(|h| Cell::new(h).style_spec("b"))
            .collect(),
    ));
    table
}

/// Add a row; every column after the first is right-aligned
pub fn add_numeric_row(table: &mut Table, label: String, values: Vec<String>) {
    let mut cells = Vec::with_capacity(values.len() + 1);
    cells.push(Cell::new(&label));
    cells.extend(values.iter().map(|value| Cell::new(value).style_spec("r")));
    table.add_row(Row::new(cells));
}
