use anyhow::Result;
use comfy_table::{ContentArrangement, Table};

/// Table with the header set and columns wrapped to the terminal width.
pub fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn print_table(table: Table) -> Result<()> {
    println!("{table}");
    Ok(())
}
