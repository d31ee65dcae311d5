//! Import direction: shared strings, cell values and row extraction

pub mod cell;
pub mod rows;
pub mod shared_strings;

pub use cell::{CellContent, CellValue, CorruptSharedStringRef, parse_decimal, read_cell};
pub use rows::{ExtractOptions, RowExtractor, RowRecord};
pub use shared_strings::SharedStringTable;
