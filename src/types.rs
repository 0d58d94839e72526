/// Stable positional row identifier assigned at load time.
/// Example: `0` for the first data row below the header.
pub type RowIndex = usize;
/// Column (header) name as it appears in the input table.
/// Examples: `Branch`, `Invoice Date`, `Customer Name`
pub type ColumnName = String;
