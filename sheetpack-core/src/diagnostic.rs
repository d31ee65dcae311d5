//! Non-fatal problems found while reading or writing a package

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// What went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// None of the preferred sheet names exist; the first sheet was used
    UsedFallbackSheet,
    /// A shared-string cell points outside the shared string table
    CorruptSharedStringRef,
    /// A row number or cell reference could not be parsed; the item was skipped
    MalformedReference,
}

impl DiagnosticKind {
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::UsedFallbackSheet => "used-fallback-sheet",
            DiagnosticKind::CorruptSharedStringRef => "corrupt-shared-string-ref",
            DiagnosticKind::MalformedReference => "malformed-reference",
        }
    }
}

/// Where it went wrong
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    /// Package-level
    Package,
    /// A whole sheet
    Sheet(String),
    /// One row of a sheet (1-based; implied from the previous row when the
    /// row's own number cannot be read)
    Row(String, u32),
    /// One cell of a sheet
    Cell(String, String),
}

impl Location {
    /// Get the sheet name if this is a sheet, row or cell location
    pub fn sheet_name(&self) -> Option<&str> {
        match self {
            Location::Package => None,
            Location::Sheet(name) | Location::Row(name, _) | Location::Cell(name, _) => Some(name),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Location::Package => 0,
            Location::Sheet(_) => 1,
            Location::Row(..) => 2,
            Location::Cell(..) => 3,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Package => write!(f, "package"),
            Location::Sheet(sheet) => write!(f, "'{}'", sheet),
            Location::Row(sheet, row) => write!(f, "'{}' row {}", sheet, row),
            Location::Cell(sheet, cell) => write!(f, "'{}'!{}", sheet, cell),
        }
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Location::Sheet(a), Location::Sheet(b)) => a.cmp(b),
            (Location::Row(sa, ra), Location::Row(sb, rb)) => sa.cmp(sb).then_with(|| ra.cmp(rb)),
            (Location::Cell(sa, ca), Location::Cell(sb, cb)) => sa.cmp(sb).then_with(|| ca.cmp(cb)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// A problem that was reported and skipped over
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub location: Location,
    /// Human-readable message
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, location: Location, message: impl Into<String>) -> Self {
        Self {
            kind,
            location,
            message: message.into(),
        }
    }

    pub(crate) fn log(&self) {
        log::warn!("{}: {}", self.location, self.message);
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind.code(), self.location, self.message)
    }
}

impl PartialOrd for Diagnostic {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Diagnostic {
    fn cmp(&self, other: &Self) -> Ordering {
        self.location
            .cmp(&other.location)
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.message.cmp(&other.message))
    }
}
