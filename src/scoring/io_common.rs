use std::error::Error;
use std::path::Path;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// The message of an error followed by the messages of all its sources.
pub fn error_chain(e: &dyn Error) -> String {
    let mut msgs: Vec<String> = vec![e.to_string()];
    let mut cur = e.source();
    while let Some(s) = cur {
        msgs.push(s.to_string());
        cur = s.source();
    }
    msgs.join(": ")
}

/// Reads a cell as text. Numbers are written without a trailing `.0` when they are integers.
pub fn read_cell_text(cell: &calamine::DataType) -> Option<String> {
    match cell {
        calamine::DataType::String(s) => Some(s.clone()),
        calamine::DataType::Empty => Some("".to_string()),
        calamine::DataType::Int(i) => Some(i.to_string()),
        calamine::DataType::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => {
            Some(format!("{}", *f as i64))
        }
        calamine::DataType::Float(f) => Some(f.to_string()),
        calamine::DataType::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
