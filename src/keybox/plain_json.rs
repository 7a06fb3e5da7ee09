//! Plain-text and JSON import/export codecs (C7). Neither format touches
//! the filesystem directly; callers hand these functions a reader/writer
//! and a `RecordStore` to merge into or dump from.
//!
//! "Plain" means fully decrypted: passwords appear in the clear, C-escaped
//! (`\\`, `\t`, `\n`) so a password itself can't break the tab/newline
//! framing of the export. All other fields are written verbatim (they're
//! already forbidden from containing tabs or newlines).

use crate::keybox::store::{RecordStore, StoreError};
use crate::keybox::table;
use serde_json::{Map, Value};
use std::io::{self, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlainJsonError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Table(#[from] table::TableError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("json import expected an array of objects")]
    NotAnArray,
}

fn escape_plain(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out
}

fn unescape_plain(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('\\') => out.push('\\'),
                Some('t') => out.push('\t'),
                Some('n') => out.push('\n'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Write every record, with its password decrypted and escaped, as a table
/// in the store's current column order.
pub fn export_plain(store: &RecordStore, passwords: &[(usize, String)], mut out: impl Write) -> Result<(), PlainJsonError> {
    let header = store.header();
    let mut rows = Vec::with_capacity(store.len());
    for (row_index, (_, record)) in store.iter().enumerate() {
        let mut values = record.ordered_values(header);
        if let Some(col) = header.iter().position(|c| c == "password") {
            let plaintext = passwords
                .iter()
                .find(|(idx, _)| *idx == row_index)
                .map(|(_, pw)| pw.as_str())
                .unwrap_or("");
            values[col] = escape_plain(plaintext);
        }
        rows.push(values);
    }
    out.write_all(table::encode(header, &rows).as_bytes())?;
    Ok(())
}

/// Parsed plain-text import: header, and each row's fields with `password`
/// already unescaped to real plaintext (the caller must re-encrypt before
/// inserting it into a store).
pub struct PlainImport {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub fn import_plain(text: &str) -> Result<PlainImport, PlainJsonError> {
    let parsed = table::parse(text)?;
    let password_col = parsed.header.iter().position(|c| c == "password");

    let rows = parsed
        .rows
        .into_iter()
        .map(|mut row| {
            if let Some(col) = password_col {
                row[col] = unescape_plain(&row[col]);
            }
            row
        })
        .collect();

    Ok(PlainImport {
        header: parsed.header,
        rows,
    })
}

/// Write every record as a JSON array of objects, keyed by the store's
/// current column names, with `password` decrypted to plaintext.
pub fn export_json(store: &RecordStore, passwords: &[(usize, String)], mut out: impl Write) -> Result<(), PlainJsonError> {
    let header = store.header();
    let mut items = Vec::with_capacity(store.len());
    for (row_index, (_, record)) in store.iter().enumerate() {
        let mut obj = Map::new();
        for col in header {
            let value = if col == "password" {
                passwords
                    .iter()
                    .find(|(idx, _)| *idx == row_index)
                    .map(|(_, pw)| pw.clone())
                    .unwrap_or_default()
            } else {
                record.get(col).to_string()
            };
            obj.insert(col.clone(), Value::String(value));
        }
        items.push(Value::Object(obj));
    }
    serde_json::to_writer_pretty(&mut out, &Value::Array(items))?;
    out.write_all(b"\n")?;
    Ok(())
}

/// Parsed JSON import: each object's keys become that row's columns; key
/// order is irrelevant on read (unlike the plain/table format, where
/// column order *is* the header).
pub struct JsonImport {
    pub rows: Vec<Vec<(String, String)>>,
}

pub fn import_json(text: &str) -> Result<JsonImport, PlainJsonError> {
    let value: Value = serde_json::from_str(text)?;
    let array = value.as_array().ok_or(PlainJsonError::NotAnArray)?;

    let mut rows = Vec::with_capacity(array.len());
    for item in array {
        let obj = item.as_object().ok_or(PlainJsonError::NotAnArray)?;
        let mut fields = Vec::with_capacity(obj.len());
        for (key, value) in obj {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            fields.push((key.clone(), value));
        }
        rows.push(fields);
    }
    Ok(JsonImport { rows })
}
