//! sheetpack-core: template-preserving reader/writer for OOXML spreadsheet
//! packages
//!
//! The import side walks one worksheet into records keyed by field name. The
//! export side writes record values into template cells, optionally cloning
//! the template sheet once per record, and leaves the rest of the package
//! (styles, formulas, merged ranges, drawings) as it was.

pub mod address;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod export;
pub mod import;
pub mod package;
pub mod reader;
pub mod writer;
pub mod xml;

pub use address::CellAddress;
pub use config::{ExportProfile, FieldKind, FieldSpec, ImportProfile, Profile};
pub use diagnostic::{Diagnostic, DiagnosticKind, Location};
pub use error::{PackageError, Result};
pub use export::{ExportReport, export_record, export_records, fill_per_record_sheets, fill_template};
pub use import::{ImportOutcome, Record, convert_field, import_from_package, import_table};
pub use package::{Package, SheetDescriptor, SheetState};
pub use reader::{CellValue, RowExtractor, RowRecord, SharedStringTable};
pub use writer::SheetAllocator;
