//! CSV user loader.
//!
//! Expected header: `id,first_name,last_name,email,gender,ip_address` (any order,
//! extra columns ignored). Fields follow RFC 4180: quoted fields may contain the
//! delimiter, doubled quotes and line breaks.

use std::path::Path;

use crate::user::User;

const DELIMITER: char = ',';

const COLUMNS: [&str; 6] = [
    "id",
    "first_name",
    "last_name",
    "email",
    "gender",
    "ip_address",
];

#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("csv has no header row")]
    MissingHeader,

    #[error("csv header is missing column {0:?}")]
    MissingColumn(&'static str),

    #[error("csv row {row}: {message}")]
    InvalidRow { row: usize, message: String },
}

/// Read every user from the CSV file at `path`.
pub fn read_users(path: impl AsRef<Path>) -> Result<Vec<User>, CsvError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| CsvError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_users(&text)
}

/// Parse users from CSV text.
pub fn parse_users(text: &str) -> Result<Vec<User>, CsvError> {
    let mut records = parse_records(text.strip_prefix('\u{feff}').unwrap_or(text))
        .into_iter()
        .enumerate()
        .filter(|(_, fields)| !is_blank(fields));

    let (_, header) = records.next().ok_or(CsvError::MissingHeader)?;
    let columns = ColumnIndex::from_header(&header)?;

    records
        .map(|(row, fields)| columns.user(row, &fields))
        .collect()
}

/// Positions of the required columns within a row.
struct ColumnIndex([usize; COLUMNS.len()]);

impl ColumnIndex {
    fn from_header(header: &[String]) -> Result<Self, CsvError> {
        let mut index = [0; COLUMNS.len()];
        for (slot, name) in index.iter_mut().zip(COLUMNS) {
            *slot = header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or(CsvError::MissingColumn(name))?;
        }
        Ok(Self(index))
    }

    fn user(&self, row: usize, fields: &[String]) -> Result<User, CsvError> {
        let field = |i: usize| -> Result<String, CsvError> {
            fields
                .get(self.0[i])
                .map(|f| f.trim().to_string())
                .ok_or_else(|| CsvError::InvalidRow {
                    row,
                    message: format!("missing value for {}", COLUMNS[i]),
                })
        };

        let raw_id = field(0)?;
        let id = raw_id.parse::<u64>().map_err(|e| CsvError::InvalidRow {
            row,
            message: format!("invalid id {raw_id:?}: {e}"),
        })?;

        Ok(User {
            id,
            first_name: field(1)?,
            last_name: field(2)?,
            email: field(3)?,
            gender: field(4)?,
            ip_address: field(5)?,
        })
    }
}

fn is_blank(fields: &[String]) -> bool {
    fields.iter().all(|f| f.trim().is_empty())
}

/// Split CSV text into records of fields.
///
/// Unterminated quotes run to the end of input rather than failing.
fn parse_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if field.is_empty() => {
                // Quoted field: runs to the matching quote, `""` is a literal quote.
                loop {
                    match chars.next() {
                        Some('"') if chars.peek() == Some(&'"') => {
                            chars.next();
                            field.push('"');
                        }
                        Some('"') | None => break,
                        Some(c) => field.push(c),
                    }
                }
                // Anything between the closing quote and the next delimiter is dropped.
                while let Some(&c) = chars.peek() {
                    if c == DELIMITER || c == '\n' || c == '\r' {
                        break;
                    }
                    chars.next();
                }
            }
            DELIMITER => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            c => field.push(c),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "id,first_name,last_name,email,gender,ip_address";

    #[test]
    fn parses_plain_rows() {
        let text = format!(
            "{HEADER}\n\
             1,Ada,Lovelace,ada@example.com,Female,10.0.0.1\n\
             2,Alan,Turing,alan@example.com,Male,32.241.244.236\n"
        );
        let users = parse_users(&text).unwrap();

        assert_eq!(users.len(), 2);
        assert_eq!(users[0].first_name, "Ada");
        assert_eq!(users[1].ip_address, "32.241.244.236");
    }

    #[test]
    fn quoted_fields_may_hold_commas_quotes_and_newlines() {
        let text = format!(
            "{HEADER}\r\n3,\"O\"\"Brien, Jr.\",\"Multi\nLine\",x@y.z,Male,1.2.3.4\r\n"
        );
        let users = parse_users(&text).unwrap();

        assert_eq!(users[0].first_name, "O\"Brien, Jr.");
        assert_eq!(users[0].last_name, "Multi\nLine");
        assert_eq!(users[0].ip_address, "1.2.3.4");
    }

    #[test]
    fn header_order_is_free_and_blank_lines_are_skipped() {
        let text = "ip_address,id,email,gender,last_name,first_name,extra\n\n\
                    5.6.7.8,9,e@f.g,Female,Doe,Jane,ignored\n\n";
        let users = parse_users(text).unwrap();

        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, 9);
        assert_eq!(users[0].first_name, "Jane");
        assert_eq!(users[0].ip_address, "5.6.7.8");
    }

    #[test]
    fn reports_missing_columns_and_bad_rows() {
        assert!(matches!(
            parse_users("id,first_name\n1,A\n"),
            Err(CsvError::MissingColumn("last_name"))
        ));
        assert!(matches!(parse_users(""), Err(CsvError::MissingHeader)));

        let err = parse_users(&format!("{HEADER}\nabc,A,B,c@d.e,Male,1.1.1.1\n")).unwrap_err();
        assert!(matches!(err, CsvError::InvalidRow { row: 1, .. }));

        let err = parse_users(&format!("{HEADER}\n1,A,B\n")).unwrap_err();
        assert!(err.to_string().contains("missing value for email"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            read_users("/definitely/not/here.csv"),
            Err(CsvError::Io { .. })
        ));
    }
}
