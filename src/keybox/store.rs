//! The in-memory record store (C5): an ordered column header plus a list of
//! records, each an open string-to-string mapping so unknown columns
//! round-trip untouched (see spec DESIGN NOTES). Record identity is an
//! opaque arena handle, not field equality — two records with identical
//! field values are still distinct records.

use crate::keybox::mtime;
use crate::keybox::table;
use std::collections::HashSet;
use thiserror::Error;

/// The full set of columns this crate understands semantically. Any other
/// column name found in a file's header is still carried (see `Record`),
/// just without special handling.
pub const KNOWN_COLUMNS: &[&str] = &["site", "user", "url", "tags", "mtime", "note", "password"];

/// Columns `find` substring-matches against when no `column:` prefix is
/// given.
const SEARCHABLE_COLUMNS: &[&str] = &["site", "user", "url", "tags", "note"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown column '{0}' would be dropped by this header change; pass force to allow")]
    UnknownColumnDataLoss(String),

    #[error("record not found")]
    NotFound,

    #[error(transparent)]
    Table(#[from] table::TableError),

    #[error("field '{column}' contains a tab or newline character")]
    IllegalFieldCharacter { column: String },
}

/// An opaque handle to a record. Equality is by identity (arena slot +
/// generation), never by field contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    index: usize,
    generation: u32,
}

/// One row of the table: an ordered mapping from lowercase column name to
/// string value. Deliberately not a fixed struct, so columns this crate
/// doesn't know about still survive a read-modify-write cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn get(&self, column: &str) -> &str {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
            .unwrap_or("")
    }

    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(entry) = self.fields.iter_mut().find(|(name, _)| name == column) {
            entry.1 = value;
        } else {
            self.fields.push((column.to_string(), value));
        }
    }

    /// Values in the order of `header`; missing columns are empty strings.
    pub fn ordered_values(&self, header: &[String]) -> Vec<String> {
        header.iter().map(|col| self.get(col).to_string()).collect()
    }

    fn from_row(header: &[String], values: &[String]) -> Self {
        let mut fields = Vec::with_capacity(header.len());
        for (col, val) in header.iter().zip(values.iter()) {
            fields.push((col.clone(), val.clone()));
        }
        Self { fields }
    }
}

struct Slot {
    generation: u32,
    record: Option<Record>,
}

/// `(ordered column list, list of records)`, per spec DESIGN NOTES — the
/// header is data, not hidden metadata.
pub struct RecordStore {
    header: Vec<String>,
    slots: Vec<Slot>,
    /// Insertion order of live records, by arena index.
    order: Vec<usize>,
}

impl RecordStore {
    /// A new, empty store with the default column order.
    pub fn new() -> Self {
        Self {
            header: KNOWN_COLUMNS.iter().map(|s| s.to_string()).collect(),
            slots: Vec::new(),
            order: Vec::new(),
        }
    }

    pub fn with_header(header: Vec<String>) -> Self {
        Self {
            header,
            slots: Vec::new(),
            order: Vec::new(),
        }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Load rows parsed from the table codec, in file order, without
    /// touching their `mtime`.
    pub fn load_rows(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let mut store = Self::with_header(header.clone());
        for values in rows {
            let record = Record::from_row(&header, &values);
            store.insert(record);
        }
        store
    }

    fn insert(&mut self, record: Record) -> RecordId {
        let index = self.slots.len();
        self.slots.push(Slot {
            generation: 0,
            record: Some(record),
        });
        self.order.push(index);
        RecordId {
            index,
            generation: 0,
        }
    }

    fn slot(&self, id: RecordId) -> Option<&Record> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.record.as_ref())
    }

    fn slot_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        let generation = id.generation;
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.record.as_mut())
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.slot(id)
    }

    /// Append a new record in stable insertion order. `mtime` is set to
    /// now. Returns the new record's id.
    pub fn add(&mut self, fields: &[(&str, &str)]) -> Result<RecordId, StoreError> {
        for (column, value) in fields {
            if table::validate_field(value).is_err() {
                return Err(StoreError::IllegalFieldCharacter {
                    column: (*column).to_string(),
                });
            }
        }

        let mut record = Record::default();
        for col in &self.header {
            record.set(col, "");
        }
        for (column, value) in fields {
            record.set(column, *value);
        }
        record.set("mtime", mtime::now());

        Ok(self.insert(record))
    }

    /// Update the named fields on an existing record and refresh `mtime`.
    pub fn modify(&mut self, id: RecordId, fields: &[(&str, &str)]) -> Result<(), StoreError> {
        for (column, value) in fields {
            if table::validate_field(value).is_err() {
                return Err(StoreError::IllegalFieldCharacter {
                    column: (*column).to_string(),
                });
            }
        }

        let record = self.slot_mut(id).ok_or(StoreError::NotFound)?;
        for (column, value) in fields {
            record.set(column, *value);
        }
        record.set("mtime", mtime::now());
        Ok(())
    }

    /// Replace a single field's stored value without refreshing `mtime`.
    /// Used when the underlying ciphertext changes but the record's logical
    /// content did not (e.g. re-encrypting a password under a new key on
    /// `change_passphrase`).
    pub fn set_field_without_touching_mtime(
        &mut self,
        id: RecordId,
        column: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        if table::validate_field(value).is_err() {
            return Err(StoreError::IllegalFieldCharacter {
                column: column.to_string(),
            });
        }
        let record = self.slot_mut(id).ok_or(StoreError::NotFound)?;
        record.set(column, value);
        Ok(())
    }

    /// Remove a record by identity.
    pub fn delete(&mut self, id: RecordId) -> Result<(), StoreError> {
        let slot = self.slots.get_mut(id.index).ok_or(StoreError::NotFound)?;
        if slot.generation != id.generation || slot.record.is_none() {
            return Err(StoreError::NotFound);
        }
        slot.record = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.order.retain(|&idx| idx != id.index);
        Ok(())
    }

    /// All live records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &Record)> {
        self.order.iter().map(move |&index| {
            let slot = &self.slots[index];
            (
                RecordId {
                    index,
                    generation: slot.generation,
                },
                slot.record.as_ref().expect("order only tracks live slots"),
            )
        })
    }

    /// Substring-match across `site|user|url|tags|note`, or restrict to one
    /// of those columns with a `column:value` query. Ties broken by
    /// insertion order. Empty query matches everything.
    pub fn find(&self, query: &str) -> Vec<(RecordId, &Record)> {
        if query.is_empty() {
            return self.iter().collect();
        }

        let (column, needle) = match query.split_once(':') {
            Some((col, rest)) if SEARCHABLE_COLUMNS.contains(&col) => (Some(col), rest),
            _ => (None, query),
        };
        let needle = needle.to_lowercase();

        self.iter()
            .filter(|(_, record)| match column {
                Some(col) => record.get(col).to_lowercase().contains(&needle),
                None => SEARCHABLE_COLUMNS
                    .iter()
                    .any(|col| record.get(col).to_lowercase().contains(&needle)),
            })
            .collect()
    }

    /// Redefine the active column order. Existing records keep their
    /// values; new columns start empty. Dropping a column that still has a
    /// non-empty value on any record is rejected unless `force` is set.
    pub fn set_header(&mut self, columns: Vec<String>, force: bool) -> Result<(), StoreError> {
        let new_set: HashSet<&str> = columns.iter().map(String::as_str).collect();
        if !force {
            for removed in self.header.iter().filter(|c| !new_set.contains(c.as_str())) {
                let any_nonempty = self.iter().any(|(_, record)| !record.get(removed).is_empty());
                if any_nonempty {
                    return Err(StoreError::UnknownColumnDataLoss(removed.clone()));
                }
            }
        }

        self.header = columns;
        Ok(())
    }

    /// Encode the current header + records as table plaintext via
    /// `table::encode`.
    pub fn to_table_plaintext(&self) -> String {
        let rows: Vec<Vec<String>> = self
            .iter()
            .map(|(_, record)| record.ordered_values(&self.header))
            .collect();
        table::encode(&self.header, &rows)
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn add_appends_in_insertion_order_and_sets_mtime() {
        let mut store = RecordStore::new();
        let a = store.add(&[("site", "a.example")]).unwrap();
        let b = store.add(&[("site", "b.example")]).unwrap();

        let ids: Vec<RecordId> = store.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![a, b]);

        let record = store.get(a).unwrap();
        assert_eq!(record.get("mtime").len(), "YYYY-MM-DD HH:MM:SS".len());
    }

    #[test]
    fn modify_refreshes_mtime_and_preserves_identity() {
        let mut store = RecordStore::new();
        let id = store.add(&[("site", "a.example"), ("user", "alice")]).unwrap();

        store.modify(id, &[("user", "alice2")]).unwrap();
        let record = store.get(id).unwrap();
        assert_eq!(record.get("user"), "alice2");
        assert_eq!(record.get("site"), "a.example");
    }

    #[test]
    fn set_field_without_touching_mtime_leaves_mtime_unchanged() {
        let mut store = RecordStore::new();
        let id = store.add(&[("site", "a.example"), ("password", "old-cipher")]).unwrap();
        let mtime_before = store.get(id).unwrap().get("mtime").to_string();

        store
            .set_field_without_touching_mtime(id, "password", "new-cipher")
            .unwrap();
        let record = store.get(id).unwrap();
        assert_eq!(record.get("password"), "new-cipher");
        assert_eq!(record.get("mtime"), mtime_before);
    }

    #[test]
    fn delete_removes_by_identity_and_id_is_not_reused() {
        let mut store = RecordStore::new();
        let a = store.add(&[("site", "a.example")]).unwrap();
        store.delete(a).unwrap();

        assert!(store.get(a).is_none());
        assert!(store.iter().next().is_none());

        let b = store.add(&[("site", "b.example")]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn two_records_with_identical_fields_are_distinct_and_both_found() {
        let mut store = RecordStore::new();
        let a = store.add(&[("site", "Example"), ("user", "dup")]).unwrap();
        let b = store.add(&[("site", "Example"), ("user", "dup")]).unwrap();
        assert_ne!(a, b);

        let found: Vec<RecordId> = store.find("Example").into_iter().map(|(id, _)| id).collect();
        assert_eq!(found, vec![a, b]);
    }

    #[test]
    fn find_is_case_insensitive_and_supports_column_prefix() {
        let mut store = RecordStore::new();
        store.add(&[("site", "Example.com"), ("user", "johny")]).unwrap();
        store.add(&[("site", "other.com"), ("user", "jane")]).unwrap();

        assert_eq!(store.find("example").len(), 1);
        assert_eq!(store.find("user:johny").len(), 1);
        assert_eq!(store.find("user:jane").len(), 1);
        assert_eq!(store.find("").len(), 2);
    }

    #[test]
    fn set_header_rejects_data_loss_unless_forced() {
        let mut store = RecordStore::new();
        store.add(&[("note", "keep me")]).unwrap();

        let err = store.set_header(cols(&["site", "user", "password"]), false).unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumnDataLoss(_)));

        store
            .set_header(cols(&["site", "user", "password"]), true)
            .unwrap();
        assert_eq!(store.header(), &cols(&["site", "user", "password"]));
    }

    #[test]
    fn unknown_columns_round_trip_through_the_table_codec() {
        let header = cols(&["site", "custom_field"]);
        let rows = vec![vec!["example.com".to_string(), "keep-me".to_string()]];
        let store = RecordStore::load_rows(header.clone(), rows.clone());

        let encoded = store.to_table_plaintext();
        let parsed = table::parse(&encoded).unwrap();
        assert_eq!(parsed.header, header);
        assert_eq!(parsed.rows, rows);
    }
}
