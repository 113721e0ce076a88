use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};

use quiz_core::model::{Cell, RawTable};

use crate::store::StoreError;

/// Parse workbook bytes into a raw table.
///
/// The first sheet is the bank; its first row is the header row. Cell
/// types map onto the loader-facing `Cell` enum; formula errors and
/// date-like values degrade rather than fail, per the normalization
/// policy.
pub(crate) fn parse_workbook(bytes: &[u8]) -> Result<RawTable, StoreError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| StoreError::Malformed(format!("not a readable workbook: {e}")))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| StoreError::Malformed("workbook has no sheets".to_string()))?
        .map_err(|e| StoreError::Malformed(format!("unreadable sheet: {e}")))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(|c| c.to_string().trim().to_string()).collect(),
        None => return Ok(RawTable::default()),
    };

    let body: Vec<Vec<Cell>> = rows.map(|row| row.iter().map(convert).collect()).collect();

    Ok(RawTable::new(headers, body))
}

fn convert(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Bool(v) => Cell::Bool(*v),
        Data::Int(v) => Cell::Int(*v),
        Data::Float(v) => Cell::Float(*v),
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(dt) => Cell::Float(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) => Cell::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_malformed() {
        let err = parse_workbook(b"definitely not a zip archive").unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[test]
    fn cell_conversion_covers_the_loader_types() {
        assert_eq!(convert(&Data::Empty), Cell::Empty);
        assert_eq!(convert(&Data::Int(3)), Cell::Int(3));
        assert_eq!(convert(&Data::Float(2.5)), Cell::Float(2.5));
        assert_eq!(convert(&Data::String("B".into())), Cell::Text("B".into()));
        assert_eq!(convert(&Data::Bool(true)), Cell::Bool(true));
    }
}
