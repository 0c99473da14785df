use serde::{Deserialize, Serialize};

/// Terminal dimensions in rows and columns.
///
/// Default is 24 rows by 80 columns (standard VT100 size).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    /// Number of rows (height).
    pub rows: u16,
    /// Number of columns (width).
    pub cols: u16,
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}
