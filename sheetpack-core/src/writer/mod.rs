//! Export direction: cell writes, worksheet cloning and the workbook edits
//! that keep the package consistent afterwards

pub mod cell;
pub mod clone;
pub mod workbook;

pub use cell::{find_cell, set_cell};
pub use clone::{
    MAX_SHEET_NAME_LEN, RESERVED_NAME_CHARS, SheetAllocator, clone_worksheet_for_record,
    legalize_sheet_name,
};
pub use workbook::{clear_tab_selected, drop_calc_chain, remove_sheet, request_full_recalc};
