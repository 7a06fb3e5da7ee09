//! The tab-delimited record table living inside the decrypted envelope
//! plaintext: one header line of column names, then zero or more record
//! lines, each `\n`-terminated. Passwords are stored as Base64 ciphertext in
//! this table (see `inner.rs`); this module never encrypts or decrypts
//! anything, it only knows about tabs and newlines.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("missing header line")]
    MissingHeader,

    #[error("line {line}: expected {expected} fields, found {found}")]
    WrongFieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: field contains a tab or newline character")]
    IllegalCharacter { line: usize },

    #[error("record line {line} is missing its trailing newline")]
    MissingTerminator { line: usize },
}

/// Reject any value that could not survive round-tripping through a
/// tab-separated, newline-terminated line.
pub fn validate_field(value: &str) -> Result<(), ()> {
    if value.contains('\t') || value.contains('\n') {
        Err(())
    } else {
        Ok(())
    }
}

/// Parsed table: header column order plus each record's values in that
/// same order.
pub struct ParsedTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Parse table plaintext into a header and rows. Every record line must
/// have exactly `header.len()` tab-separated fields and end in `\n`.
pub fn parse(plaintext: &str) -> Result<ParsedTable, TableError> {
    if plaintext.is_empty() {
        return Err(TableError::MissingHeader);
    }

    let mut lines = plaintext.split_inclusive('\n');
    let header_line = lines.next().ok_or(TableError::MissingHeader)?;
    if !header_line.ends_with('\n') {
        return Err(TableError::MissingTerminator { line: 1 });
    }
    let header: Vec<String> = header_line
        .trim_end_matches('\n')
        .split('\t')
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (idx, line) in lines.enumerate() {
        let line_no = idx + 2;
        if line.is_empty() {
            continue;
        }
        if !line.ends_with('\n') {
            return Err(TableError::MissingTerminator { line: line_no });
        }
        let content = line.trim_end_matches('\n');
        let fields: Vec<String> = content.split('\t').map(str::to_string).collect();
        if fields.len() != header.len() {
            return Err(TableError::WrongFieldCount {
                line: line_no,
                expected: header.len(),
                found: fields.len(),
            });
        }
        rows.push(fields);
    }

    Ok(ParsedTable { header, rows })
}

/// Encode a header + rows back into table plaintext. Callers must have
/// already validated every field with `validate_field`; this function
/// panics (a programmer error, not a data error) if it finds a tab or
/// newline, since that would silently corrupt the table.
pub fn encode(header: &[String], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    out.push_str(&encode_line(header));
    for row in rows {
        out.push_str(&encode_line(row));
    }
    out
}

fn encode_line(fields: &[String]) -> String {
    let mut line = String::new();
    for (i, field) in fields.iter().enumerate() {
        debug_assert!(
            validate_field(field).is_ok(),
            "field contains a tab or newline: {field:?}"
        );
        if i > 0 {
            line.push('\t');
        }
        line.push_str(field);
    }
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_rows() {
        let text = "site\tuser\tpassword\nExample\tjohny\tZm9v\n";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.header, vec!["site", "user", "password"]);
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0], vec!["Example", "johny", "Zm9v"]);
    }

    #[test]
    fn empty_table_has_header_only() {
        let text = "site\tuser\turl\ttags\tmtime\tnote\tpassword\n";
        let parsed = parse(text).unwrap();
        assert!(parsed.rows.is_empty());
    }

    #[test]
    fn wrong_field_count_reports_line_number() {
        let text = "site\tuser\nExample\tjohny\textra\n";
        let err = parse(text).unwrap_err();
        assert!(matches!(
            err,
            TableError::WrongFieldCount {
                line: 2,
                expected: 2,
                found: 3
            }
        ));
    }

    #[test]
    fn missing_trailing_newline_is_rejected() {
        let text = "site\tuser\nExample\tjohny";
        let err = parse(text).unwrap_err();
        assert!(matches!(err, TableError::MissingTerminator { line: 2 }));
    }

    #[test]
    fn header_column_order_is_preserved() {
        let header = vec!["user".to_string(), "site".to_string()];
        let rows = vec![vec!["johny".to_string(), "Example".to_string()]];
        let encoded = encode(&header, &rows);
        let reparsed = parse(&encoded).unwrap();
        assert_eq!(reparsed.header, header);
        assert_eq!(reparsed.rows, rows);
    }

    #[test]
    fn validate_field_rejects_tab_and_newline() {
        assert!(validate_field("plain").is_ok());
        assert!(validate_field("has\ttab").is_err());
        assert!(validate_field("has\nnewline").is_err());
    }
}
