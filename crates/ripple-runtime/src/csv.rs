//! CSV loading for `load_csv` / `csv_header` and the file watcher.
//!
//! RFC-4180-style: comma separation, `"`-quoted fields with `""` escapes,
//! CRLF tolerated. Cell coercion: int if it parses, else float, else
//! `true`/`false` (case-insensitive) become booleans, empty cells become
//! null, everything else stays a string.

use crate::value::{Table, Value};
use std::fmt;
use std::path::{Path, PathBuf};

/// CSV load failure.
#[derive(Debug, Clone)]
pub struct CsvError {
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for CsvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

impl std::error::Error for CsvError {}

/// Load a CSV file as a table. When `has_header` is set the first record
/// becomes the table header instead of a row.
pub fn load(path: &Path, has_header: bool) -> Result<Table, CsvError> {
    let text = read(path)?;
    let mut records = parse_records(&text, path)?;

    let header = if has_header && !records.is_empty() {
        Some(records.remove(0))
    } else {
        None
    };

    Ok(Table {
        header,
        rows: records
            .into_iter()
            .map(|record| record.iter().map(|cell| coerce(cell)).collect())
            .collect(),
    })
}

/// Read just the header row of a CSV file.
pub fn header(path: &Path) -> Result<Vec<String>, CsvError> {
    let text = read(path)?;
    let mut records = parse_records(&text, path)?;
    if records.is_empty() {
        return Err(CsvError {
            path: path.to_path_buf(),
            message: "empty file has no header row".to_string(),
        });
    }
    Ok(records.remove(0))
}

fn read(path: &Path) -> Result<String, CsvError> {
    std::fs::read_to_string(path).map_err(|e| CsvError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Split text into records of raw string fields.
fn parse_records(text: &str, path: &Path) -> Result<Vec<Vec<String>>, CsvError> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                if !(record.len() == 1 && record[0].is_empty()) {
                    records.push(std::mem::take(&mut record));
                } else {
                    record.clear();
                }
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(CsvError {
            path: path.to_path_buf(),
            message: "unterminated quoted field".to_string(),
        });
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    Ok(records)
}

/// Coerce a raw cell into a value.
fn coerce(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(n) = cell.parse::<i64>() {
        return Value::Int(n);
    }
    if let Ok(f) = cell.parse::<f64>() {
        return Value::Float(f);
    }
    if cell.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if cell.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    Value::Str(cell.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn loads_with_header_and_coercion() {
        let file = write_csv("name,salary,active\nalice,100,true\nbob,2.5,FALSE\ncarol,,maybe\n");
        let table = load(file.path(), true).unwrap();
        assert_eq!(
            table.header,
            Some(vec![
                "name".to_string(),
                "salary".to_string(),
                "active".to_string()
            ])
        );
        assert_eq!(table.rows.len(), 3);
        assert_eq!(
            table.rows[0],
            vec![
                Value::Str("alice".into()),
                Value::Int(100),
                Value::Bool(true)
            ]
        );
        assert_eq!(table.rows[1][1], Value::Float(2.5));
        assert_eq!(table.rows[1][2], Value::Bool(false));
        assert_eq!(table.rows[2][1], Value::Null);
        assert_eq!(table.rows[2][2], Value::Str("maybe".into()));
    }

    #[test]
    fn no_header_keeps_first_row() {
        let file = write_csv("1,2\n3,4\n");
        let table = load(file.path(), false).unwrap();
        assert_eq!(table.header, None);
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn quoted_fields_with_commas_and_escapes() {
        let file = write_csv("a,b\n\"x, y\",\"he said \"\"hi\"\"\"\n");
        let table = load(file.path(), true).unwrap();
        assert_eq!(table.rows[0][0], Value::Str("x, y".into()));
        assert_eq!(table.rows[0][1], Value::Str("he said \"hi\"".into()));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let file = write_csv("a\n\n1\n\n");
        let table = load(file.path(), true).unwrap();
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn crlf_line_endings() {
        let file = write_csv("a,b\r\n1,2\r\n");
        let table = load(file.path(), true).unwrap();
        assert_eq!(table.rows, vec![vec![Value::Int(1), Value::Int(2)]]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load(Path::new("/nonexistent/definitely-missing.csv"), true).unwrap_err();
        assert!(err.to_string().contains("missing.csv"));
    }

    #[test]
    fn header_of_file() {
        let file = write_csv("x,y\n1,2\n");
        assert_eq!(header(file.path()).unwrap(), vec!["x", "y"]);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let file = write_csv("a\n\"unclosed\n");
        assert!(load(file.path(), false).is_err());
    }
}
