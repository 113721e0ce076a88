use std::fmt;

//
// ─── CELLS ─────────────────────────────────────────────────────────────────────
//

/// A single value in a loaded workbook or CSV-like table.
///
/// Loaders hand banks to the engine in this shape so the normalization
/// rules live in one place, independent of which backend produced the
/// bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// Returns true for cells with no usable content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Best-effort integer coercion.
    ///
    /// Numeric cells truncate; text cells parse after trimming, accepting
    /// both integer and decimal renderings ("3", "3.0"). Anything else
    /// yields `None` so callers can apply their default.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Cell::Int(v) => Some(*v),
            Cell::Float(v) if v.is_finite() => Some(*v as i64),
            Cell::Text(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| trimmed.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v as i64))
            }
            _ => None,
        }
    }

    /// Text rendering of the cell; `Empty` becomes the empty string.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Bool(v) => v.to_string(),
            Cell::Int(v) => v.to_string(),
            Cell::Float(v) => {
                // Whole floats render without the trailing ".0" so answer
                // tokens and numbers read the way the sheet shows them.
                if v.fract() == 0.0 && v.is_finite() {
                    format!("{}", *v as i64)
                } else {
                    v.to_string()
                }
            }
            Cell::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

//
// ─── TABLE ─────────────────────────────────────────────────────────────────────
//

/// Rows of named fields, as produced by a bank loader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl RawTable {
    #[must_use]
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { headers, rows }
    }

    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by exact header name (after trimming).
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    /// Fetch a cell by row slice and column index, tolerant of ragged rows.
    #[must_use]
    pub fn cell<'a>(row: &'a [Cell], index: Option<usize>) -> Option<&'a Cell> {
        index.and_then(|i| row.get(i))
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_coercion_accepts_numeric_strings() {
        assert_eq!(Cell::Int(7).as_int(), Some(7));
        assert_eq!(Cell::Float(3.0).as_int(), Some(3));
        assert_eq!(Cell::Text(" 5 ".into()).as_int(), Some(5));
        assert_eq!(Cell::Text("5.0".into()).as_int(), Some(5));
    }

    #[test]
    fn int_coercion_rejects_non_numeric() {
        assert_eq!(Cell::Text("N/A".into()).as_int(), None);
        assert_eq!(Cell::Empty.as_int(), None);
        assert_eq!(Cell::Bool(true).as_int(), None);
    }

    #[test]
    fn empty_detection_covers_blank_text() {
        assert!(Cell::Empty.is_empty());
        assert!(Cell::Text("   ".into()).is_empty());
        assert!(!Cell::Int(0).is_empty());
    }

    #[test]
    fn whole_floats_render_without_fraction() {
        assert_eq!(Cell::Float(4.0).as_text(), "4");
        assert_eq!(Cell::Text("B".into()).as_text(), "B");
        assert_eq!(Cell::Empty.as_text(), "");
    }

    #[test]
    fn column_lookup_trims_headers() {
        let table = RawTable::new(
            vec!["Topic ".into(), "Numero".into()],
            vec![vec![Cell::Int(1), Cell::Int(2)]],
        );
        assert_eq!(table.column_index("Topic"), Some(0));
        assert_eq!(table.column_index("Numero"), Some(1));
        assert_eq!(table.column_index("Link"), None);
    }
}
