// Primitives for reading the reviews from Excel files.

use calamine::{open_workbook, DataType, Reader, Xlsx};
use std::collections::HashMap;

use crate::scoring::{io_common::read_cell_text, *};

/// Reads the reviews from the given worksheet, or from the first worksheet.
///
/// The first row is the header. The columns are found by name and may come in any order.
pub fn read_reviews(
    path: &str,
    worksheet_name: Option<&str>,
    columns: &ReviewColumns,
) -> NsResult<Vec<ReviewRecord>> {
    let wrange = get_range(path, worksheet_name)?;

    let header = wrange.rows().next().context(EmptyExcelSnafu { path })?;
    debug!("read_reviews: header: {:?}", header);

    let nominee_idx = get_col_index(&columns.nominee, header, path)?;
    let attribute_idx = get_col_index(&columns.attribute, header, path)?;
    let summary_idx = get_col_index(&columns.summary, header, path)?;

    let mut res: Vec<ReviewRecord> = Vec::new();
    // The header is the first line, the data starts at line 2 in Excel.
    for (idx, row) in wrange.rows().enumerate().skip(1) {
        let lineno = (idx + 1) as u64;
        let nominee = read_text(row, nominee_idx, lineno)?;
        let attribute = read_text(row, attribute_idx, lineno)?;
        let summary = read_text(row, summary_idx, lineno)?;
        if nominee.is_empty() && attribute.is_empty() && summary.is_empty() {
            debug!("read_reviews: line {}: skipping empty row", lineno);
            continue;
        }
        res.push(ReviewRecord {
            nominee,
            attribute,
            summary,
        });
    }
    Ok(res)
}

fn read_text(row: &[DataType], col_idx: usize, lineno: u64) -> NsResult<String> {
    match row.get(col_idx) {
        None => Ok("".to_string()),
        Some(cell) => read_cell_text(cell).context(ExcelWrongCellTypeSnafu {
            lineno,
            content: format!("{:?}", cell),
        }),
    }
}

/// Finds the position of a column in the header.
fn get_col_index(column_name: &str, header: &[DataType], path: &str) -> NsResult<usize> {
    let col_names: HashMap<String, usize> = header
        .iter()
        .enumerate()
        .filter_map(|(idx, x)| match x {
            DataType::String(s) => Some((s.trim().to_string(), idx)),
            _ => None,
        })
        .collect();
    col_names
        .get(column_name)
        .cloned()
        .context(ExcelMissingColumnSnafu { column_name, path })
}

fn get_range(path: &str, worksheet_name: Option<&str>) -> NsResult<calamine::Range<DataType>> {
    debug!(
        "get_range: path: {:?} worksheet: {:?}",
        path, worksheet_name
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(name) = worksheet_name {
        workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { name, path })?
            .context(OpeningExcelSnafu { path })
    } else {
        workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })
    }
}
